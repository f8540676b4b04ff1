use crate::browser::{ScrollCommand, SelectorTable};
use crate::domain::MediaKind;

/// Marker attribute used to turn elements into [`ElementHandle`]s.
///
/// [`ElementHandle`]: crate::domain::ElementHandle
pub const REF_ATTRIBUTE: &str = "data-backscroll-ref";

const SAMPLE_SIZE: usize = 8;

/// Shared helpers installed once per document.
const PRELUDE: &str = r#"
const __bs = window.__backscroll || (window.__backscroll = {
    seq: 0,
    mark(el) {
        if (!el.hasAttribute('data-backscroll-ref')) {
            el.setAttribute('data-backscroll-ref', String(++this.seq));
        }
        return el.getAttribute('data-backscroll-ref');
    },
    byRef(ref) {
        return document.querySelector('[data-backscroll-ref="' + ref + '"]');
    },
    visible(el) {
        const r = el.getBoundingClientRect();
        return r.width > 0 && r.height > 0 && r.bottom > 0 && r.right > 0
            && r.top < window.innerHeight && r.left < window.innerWidth;
    },
    text(el) {
        return ((el && el.textContent) || '').trim();
    },
});
"#;

/// Quote a value as a JavaScript string literal.
fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "''".to_string())
}

/// Generates the JavaScript evaluated in the chat page.
///
/// Every script is a self-contained expression returning JSON-serializable
/// data; async scripts evaluate to a promise.
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    selectors: SelectorTable,
}

impl ScriptBuilder {
    pub fn new(selectors: SelectorTable) -> Self {
        Self { selectors }
    }

    pub fn selectors(&self) -> &SelectorTable {
        &self.selectors
    }

    fn wrap(body: &str) -> String {
        format!("(() => {{\n{PRELUDE}\n{body}\n}})()")
    }

    fn container(&self) -> String {
        format!(
            "const container = document.querySelector({});",
            js_str(&self.selectors.scroll_container)
        )
    }

    pub fn find_visible(&self, selector: &str) -> String {
        Self::wrap(&format!(
            r#"
            for (const el of document.querySelectorAll({sel})) {{
                if (__bs.visible(el)) return __bs.mark(el);
            }}
            return null;
            "#,
            sel = js_str(selector)
        ))
    }

    /// Resolves `true` on the first body mutation or `false` on timeout;
    /// the observer is disconnected on both paths.
    pub fn await_mutation(&self, timeout_ms: u64) -> String {
        format!(
            r#"
            new Promise((resolve) => {{
                const target = document.body;
                if (!target) {{ resolve(false); return; }}
                let done = false;
                let timer = null;
                const observer = new MutationObserver(() => finish(true));
                function finish(value) {{
                    if (done) return;
                    done = true;
                    observer.disconnect();
                    if (timer !== null) clearTimeout(timer);
                    resolve(value);
                }}
                observer.observe(target, {{ childList: true, subtree: true, attributes: true }});
                timer = setTimeout(() => finish(false), {timeout_ms});
            }})
            "#
        )
    }

    pub fn bounding_box(&self, handle: &str) -> String {
        Self::wrap(&format!(
            r#"
            const el = __bs.byRef({handle});
            if (!el || !el.isConnected) return null;
            const r = el.getBoundingClientRect();
            if (r.width <= 0 || r.height <= 0) return null;
            return {{ x: r.left, y: r.top, width: r.width, height: r.height }};
            "#,
            handle = js_str(handle)
        ))
    }

    pub fn list_conversations(&self) -> String {
        Self::wrap(&format!(
            r#"
            const out = [];
            for (const el of document.querySelectorAll({item})) {{
                const holder = el.querySelector({title});
                const title = holder ? (holder.getAttribute('title') || __bs.text(holder)) : __bs.text(el);
                if (title && title.trim()) {{
                    out.push({{ title: title.trim(), handle: __bs.mark(el) }});
                }}
            }}
            return out;
            "#,
            item = js_str(&self.selectors.chat_list_item),
            title = js_str(&self.selectors.chat_title)
        ))
    }

    pub fn open_conversation_title(&self) -> String {
        Self::wrap(&format!(
            r#"
            const holder = document.querySelector({header});
            if (!holder) return null;
            const title = holder.getAttribute('title') || __bs.text(holder);
            return title && title.trim() ? title.trim() : null;
            "#,
            header = js_str(&self.selectors.header_title)
        ))
    }

    pub fn scroll_conversation_list(&self) -> String {
        Self::wrap(&format!(
            r#"
            const pane = document.querySelector({list});
            if (!pane) return false;
            const before = pane.scrollTop;
            pane.scrollTop = before + Math.max(pane.clientHeight * 0.8, 200);
            pane.dispatchEvent(new Event('scroll'));
            return pane.scrollTop !== before;
            "#,
            list = js_str(&self.selectors.chat_list)
        ))
    }

    pub fn message_count(&self) -> String {
        Self::wrap(&format!(
            "return document.querySelectorAll({}).length;",
            js_str(&self.selectors.message)
        ))
    }

    pub fn scroll_metrics(&self) -> String {
        Self::wrap(&format!(
            r#"
            {container}
            if (!container) return null;
            return {{
                scroll_top: container.scrollTop,
                scroll_height: container.scrollHeight,
                client_height: container.clientHeight,
            }};
            "#,
            container = self.container()
        ))
    }

    pub fn scroll(&self, command: ScrollCommand) -> String {
        let action = match command {
            ScrollCommand::FirstMessageIntoView { smooth } => format!(
                r#"
                const first = document.querySelector({msg});
                if (first) {{
                    first.scrollIntoView({{ behavior: '{behavior}', block: 'start' }});
                }} else if (container) {{
                    container.scrollTop = 0;
                }}
                "#,
                msg = js_str(&self.selectors.message),
                behavior = if smooth { "smooth" } else { "auto" }
            ),
            ScrollCommand::SetScrollTop(value) => {
                format!("if (container) container.scrollTop = {value};")
            }
            ScrollCommand::ScrollBy(delta) => {
                format!("if (container) container.scrollBy(0, {delta});")
            }
            ScrollCommand::ToBottom => {
                "if (container) container.scrollTop = container.scrollHeight;".to_string()
            }
        };

        Self::wrap(&format!(
            r#"
            {container}
            {action}
            if (container) container.dispatchEvent(new Event('scroll'));
            return true;
            "#,
            container = self.container()
        ))
    }

    pub fn force_reflow(&self) -> String {
        Self::wrap(&format!(
            r#"
            {container}
            if (!container) return false;
            const height = container.style.height;
            const overflow = container.style.overflow;
            container.style.height = Math.max(container.clientHeight - 1, 1) + 'px';
            container.style.overflow = 'hidden';
            void container.offsetHeight;
            container.style.height = height;
            container.style.overflow = overflow;
            void container.offsetHeight;
            container.scrollTop = 0;
            container.dispatchEvent(new Event('scroll'));
            return true;
            "#,
            container = self.container()
        ))
    }

    pub fn last_resort_nudge(&self) -> String {
        Self::wrap(&format!(
            r#"
            {container}
            if (!container) return false;
            const display = container.style.display;
            container.style.display = 'none';
            void container.offsetHeight;
            container.style.display = display;
            const zoom = document.body.style.zoom;
            document.body.style.zoom = '0.99';
            void document.body.offsetHeight;
            document.body.style.zoom = zoom;
            window.dispatchEvent(new Event('resize'));
            const r = container.getBoundingClientRect();
            const x = r.left + r.width / 2;
            const y = r.top + 40;
            container.dispatchEvent(new MouseEvent('mousemove', {{ bubbles: true, clientX: x, clientY: y }}));
            container.dispatchEvent(new WheelEvent('wheel', {{ bubbles: true, deltaY: -600, clientX: x, clientY: y }}));
            container.scrollTop = 0;
            container.dispatchEvent(new Event('scroll'));
            return true;
            "#,
            container = self.container()
        ))
    }

    pub fn date_evidence(&self) -> String {
        Self::wrap(&format!(
            r#"
            const out = {{ timestamp_attributes: [], separator_texts: [], sibling_texts: [] }};
            const messages = Array.from(document.querySelectorAll({msg}));
            for (const m of messages.slice(0, {sample})) {{
                const holder = m.matches({holder}) ? m : m.querySelector({holder});
                const value = holder && holder.getAttribute({attr});
                if (value) out.timestamp_attributes.push(value);
            }}
            const separators = Array.from(document.querySelectorAll({sep}));
            for (const s of separators.slice(0, {sample})) {{
                const text = __bs.text(s);
                if (text) out.separator_texts.push(text);
            }}
            if (messages.length) {{
                let sibling = (messages[0].closest({row}) || messages[0]).previousElementSibling;
                let steps = 0;
                while (sibling && steps < {sample}) {{
                    const text = __bs.text(sibling);
                    if (text) out.sibling_texts.push(text.slice(0, 120));
                    sibling = sibling.previousElementSibling;
                    steps++;
                }}
            }}
            return out;
            "#,
            msg = js_str(&self.selectors.message),
            holder = js_str(&self.selectors.timestamp_holder),
            attr = js_str(&self.selectors.timestamp_attribute),
            sep = js_str(&self.selectors.date_separator),
            row = js_str(&self.selectors.row),
            sample = SAMPLE_SIZE
        ))
    }

    pub fn media_candidates(&self, kind: MediaKind) -> String {
        let body = match kind {
            MediaKind::Image => format!(
                r#"
                return Array.from(document.querySelectorAll({sel}))
                    .map(el => ({{ url: el.currentSrc || el.src || el.getAttribute('src') }}))
                    .filter(c => c.url);
                "#,
                sel = js_str(&self.selectors.image)
            ),
            MediaKind::Video => format!(
                r#"
                return Array.from(document.querySelectorAll({sel}))
                    .map(el => ({{ url: el.src || el.getAttribute('src') }}))
                    .filter(c => c.url);
                "#,
                sel = js_str(&self.selectors.video)
            ),
            MediaKind::Link => format!(
                r#"
                return Array.from(document.querySelectorAll({sel}))
                    .map(el => ({{ url: el.href }}))
                    .filter(c => c.url);
                "#,
                sel = js_str(&self.selectors.link)
            ),
            MediaKind::Document => format!(
                r#"
                {container}
                const base = container ? container.getBoundingClientRect().top : 0;
                const scroll = container ? container.scrollTop : 0;
                const out = [];
                for (const el of document.querySelectorAll({sel})) {{
                    const block = el.closest({row}) || el.parentElement || el;
                    const labelEl = block.querySelector({label});
                    const label = labelEl ? (labelEl.getAttribute('title') || __bs.text(labelEl)) : __bs.text(block);
                    const control = block.querySelector({download});
                    const r = block.getBoundingClientRect();
                    out.push({{
                        label: (label || '').slice(0, 200),
                        offset: scroll + r.top - base,
                        download_control: control ? __bs.mark(control) : null,
                    }});
                }}
                return out;
                "#,
                container = self.container(),
                sel = js_str(&self.selectors.document),
                row = js_str(&self.selectors.row),
                label = js_str(&self.selectors.document_label),
                download = js_str(&self.selectors.document_download)
            ),
        };

        Self::wrap(&body)
    }

    /// Resolves to the base64 payload of the resource behind `url`.
    pub fn fetch_blob(&self, url: &str) -> String {
        format!(
            r#"
            (async () => {{
                const response = await fetch({url});
                const blob = await response.blob();
                return await new Promise((resolve, reject) => {{
                    const reader = new FileReader();
                    reader.onloadend = () => resolve(String(reader.result).split(',')[1] || '');
                    reader.onerror = () => reject(reader.error);
                    reader.readAsDataURL(blob);
                }});
            }})()
            "#,
            url = js_str(url)
        )
    }

    pub fn snapshot_transcript(&self) -> String {
        Self::wrap(&format!(
            r#"
            const source = document.querySelector({sel});
            if (!source) return null;
            const clone = source.cloneNode(true);
            clone.querySelectorAll('[{attr}]').forEach(el => el.removeAttribute('{attr}'));
            const blobs = new Set();
            clone.querySelectorAll('img[src^="blob:"]').forEach(img => blobs.add(img.getAttribute('src')));
            let css = '';
            for (const sheet of Array.from(document.styleSheets)) {{
                try {{
                    for (const rule of Array.from(sheet.cssRules)) css += rule.cssText + '\n';
                }} catch (e) {{
                    // cross-origin sheet
                }}
            }}
            return {{ html: clone.outerHTML, blob_images: Array.from(blobs), stylesheet: css }};
            "#,
            sel = js_str(&self.selectors.transcript_container),
            attr = REF_ATTRIBUTE
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ScriptBuilder {
        ScriptBuilder::new(SelectorTable::default())
    }

    #[test]
    fn test_js_str_escapes_quotes() {
        assert_eq!(js_str(r#"a[title="x"]"#), r#""a[title=\"x\"]""#);
    }

    #[test]
    fn test_find_visible_embeds_selector() {
        let script = builder().find_visible("#main");
        assert!(script.contains(r##""#main""##));
        assert!(script.contains("__bs.visible"));
        assert!(script.contains("data-backscroll-ref"));
    }

    #[test]
    fn test_await_mutation_disconnects_on_both_paths() {
        let script = builder().await_mutation(2500);
        assert!(script.contains("MutationObserver"));
        assert!(script.contains("observer.disconnect()"));
        assert!(script.contains("finish(false), 2500"));
    }

    #[test]
    fn test_open_title_reads_pane_header() {
        let script = builder().open_conversation_title();
        assert!(script.contains(&js_str(&SelectorTable::default().header_title)));
        assert!(script.contains("getAttribute('title')"));
    }

    #[test]
    fn test_scroll_commands() {
        let b = builder();
        assert!(b
            .scroll(ScrollCommand::FirstMessageIntoView { smooth: true })
            .contains("behavior: 'smooth'"));
        assert!(b
            .scroll(ScrollCommand::FirstMessageIntoView { smooth: false })
            .contains("behavior: 'auto'"));
        assert!(b
            .scroll(ScrollCommand::SetScrollTop(120.0))
            .contains("container.scrollTop = 120"));
        assert!(b
            .scroll(ScrollCommand::ScrollBy(-640.0))
            .contains("container.scrollBy(0, -640)"));
    }

    #[test]
    fn test_media_scripts_use_kind_selectors() {
        let b = builder();
        let table = SelectorTable::default();
        assert!(b
            .media_candidates(MediaKind::Image)
            .contains(&js_str(&table.image)));
        assert!(b
            .media_candidates(MediaKind::Document)
            .contains(&js_str(&table.document_download)));
    }

    #[test]
    fn test_snapshot_strips_ref_markers() {
        let script = builder().snapshot_transcript();
        assert!(script.contains("removeAttribute('data-backscroll-ref')"));
        assert!(script.contains("cssRules"));
    }
}
