use chrono::{DateTime, Utc};

const BASE_STYLE: &str = r#"
body { margin: 0; background: #efeae2; font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; }
.backscroll-header { position: sticky; top: 0; z-index: 10; padding: 12px 20px; background: #008069; color: #fff; }
.backscroll-header h1 { margin: 0; font-size: 18px; }
.backscroll-header p { margin: 4px 0 0; font-size: 12px; opacity: 0.8; }
.backscroll-sticky-date { position: sticky; top: 64px; z-index: 9; text-align: center; pointer-events: none; }
.backscroll-sticky-date span { display: inline-block; padding: 4px 12px; border-radius: 8px; background: #fff; font-size: 12px; box-shadow: 0 1px 1px rgba(0,0,0,.15); }
.backscroll-sticky-date:empty { display: none; }
#backscroll-transcript { max-width: 960px; margin: 0 auto; padding: 12px 20px 40px; }
#backscroll-transcript [role="row"] { position: static !important; transform: none !important; }
"#;

/// Sticky date header and click-to-play for audio bubbles.
const SCRIPT: &str = r#"
(() => {
  const pattern = /^\s*(\d{1,2}[\/.\-]\d{1,2}[\/.\-]\d{2,4}|today|yesterday)\s*$/i;
  const rows = Array.from(document.querySelectorAll('#backscroll-transcript [role="row"]'));
  const separators = rows.filter(row => pattern.test(row.textContent || ''));
  const sticky = document.getElementById('backscroll-sticky-date');
  const update = () => {
    let current = null;
    for (const row of separators) {
      if (row.getBoundingClientRect().top <= 80) current = row;
      else break;
    }
    sticky.innerHTML = current ? '<span>' + current.textContent.trim() + '</span>' : '';
  };
  document.addEventListener('scroll', update, { passive: true });
  update();

  document.querySelectorAll('#backscroll-transcript audio').forEach(audio => {
    audio.controls = true;
    audio.preload = 'none';
  });
  document.querySelectorAll('#backscroll-transcript [data-icon="audio-play"]').forEach(button => {
    const audio = button.closest('[role="row"]')?.querySelector('audio');
    if (!audio) return;
    button.style.cursor = 'pointer';
    button.addEventListener('click', () => audio.paused ? audio.play() : audio.pause());
  });
})();
"#;

/// Wrap transcript markup in a standalone HTML document.
pub fn render_document(
    title: &str,
    stylesheet: &str,
    body_html: &str,
    exported_at: DateTime<Utc>,
) -> String {
    let title = html_escape::encode_text(title);
    // captured rules must not terminate the style element early
    let stylesheet = stylesheet.replace("</style", "<\\/style");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="generator" content="backscroll {version}">
<title>{title}</title>
<style>{stylesheet}</style>
<style>{base}</style>
</head>
<body>
<header class="backscroll-header"><h1>{title}</h1><p>Exported {exported}</p></header>
<div class="backscroll-sticky-date" id="backscroll-sticky-date"></div>
<main id="backscroll-transcript">
{body_html}
</main>
<script>{script}</script>
</body>
</html>
"#,
        version = env!("CARGO_PKG_VERSION"),
        base = BASE_STYLE,
        exported = exported_at.format("%Y-%m-%d %H:%M UTC"),
        script = SCRIPT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_is_escaped() {
        let html = render_document("<b>Family</b>", "", "", Utc::now());
        assert!(html.contains("<title>&lt;b&gt;Family&lt;/b&gt;</title>"));
        assert!(!html.contains("<title><b>"));
    }

    #[test]
    fn test_stylesheet_cannot_close_style_tag() {
        let html = render_document("t", "a{}</style><script>x()</script>", "", Utc::now());
        assert!(html.contains("a{}<\\/style><script>x()</script>"));
        assert_eq!(html.matches("</style>").count(), 2);
    }

    #[test]
    fn test_body_is_embedded_verbatim() {
        let body = r#"<div role="row"><div class="message-in">hi</div></div>"#;
        let html = render_document("t", "", body, Utc::now());
        assert!(html.contains(body));
        assert!(html.contains("backscroll-sticky-date"));
    }
}
