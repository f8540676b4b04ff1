use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use super::{parse_selector, template, TranscriptConfig};
use crate::app::Result;
use crate::dates::{self, parse_separator};
use crate::domain::{ExtractedTranscript, MonthKey, MonthSegment};

fn row_text(row: &ElementRef<'_>) -> String {
    row.text().collect::<String>()
}

/// Group message rows by the date separators interleaved among them.
///
/// Returns every group, sorted chronologically, with `is_complete` set.
/// Rows before the first separator have no known month and are skipped.
pub fn partition_by_month(
    body_html: &str,
    config: &TranscriptConfig,
    today: NaiveDate,
) -> Result<Vec<MonthSegment>> {
    let rows = parse_selector(&config.row_selector)?;
    let messages = parse_selector(&config.message_selector)?;
    let fragment = Html::parse_fragment(body_html);

    let mut groups: Vec<MonthSegment> = Vec::new();
    let mut index: HashMap<MonthKey, usize> = HashMap::new();
    let mut current: Option<usize> = None;
    let mut orphaned = 0usize;

    for row in fragment.select(&rows) {
        let message_nodes = row.select(&messages).count();

        if message_nodes == 0 {
            if let Some(date) = parse_separator(&row_text(&row), today) {
                let month = MonthKey::from_date(date);
                let slot = *index.entry(month).or_insert_with(|| {
                    groups.push(MonthSegment {
                        month,
                        rows: Vec::new(),
                        message_count: 0,
                        is_complete: false,
                    });
                    groups.len() - 1
                });
                current = Some(slot);
            }
        }

        match current {
            Some(slot) => {
                let group = &mut groups[slot];
                group.rows.push(row.html());
                group.message_count += message_nodes;
            }
            None => orphaned += message_nodes,
        }
    }

    if orphaned > 0 {
        warn!("{} messages before the first date separator were skipped", orphaned);
    }

    groups.sort_by_key(|g| g.month);
    let present: HashSet<MonthKey> = groups.iter().map(|g| g.month).collect();
    let last = groups.len().saturating_sub(1);
    for (i, group) in groups.iter_mut().enumerate() {
        group.is_complete = present.contains(&group.month.previous())
            || (i == last && group.message_count >= config.min_recent_messages);
    }

    Ok(groups)
}

/// Month segments of `transcript` that are safe to export on their own.
pub fn split_by_month(
    transcript: &ExtractedTranscript,
    config: &TranscriptConfig,
) -> Result<Vec<MonthSegment>> {
    let groups = partition_by_month(&transcript.body_html, config, dates::today())?;

    let (complete, dropped): (Vec<_>, Vec<_>) = groups.into_iter().partition(|g| g.is_complete);
    for group in &dropped {
        warn!(
            "{}: skipping {} ({} messages), start of month not confirmed",
            transcript.title,
            group.month.display_name(),
            group.message_count
        );
    }
    debug!("{}: {} complete month segments", transcript.title, complete.len());

    Ok(complete)
}

/// Standalone document for one month.
pub fn render_segment(transcript: &ExtractedTranscript, segment: &MonthSegment) -> String {
    let title = format!("{} - {}", transcript.title, segment.month.display_name());
    template::render_document(
        &title,
        &transcript.stylesheet,
        &segment.rows.join("\n"),
        transcript.exported_at,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn separator(text: &str) -> String {
        format!(r#"<div role="row"><div class="date"><span dir="auto">{}</span></div></div>"#, text)
    }

    fn message(text: &str) -> String {
        format!(
            r#"<div role="row"><div class="message-in"><span class="copyable-text">{}</span></div></div>"#,
            text
        )
    }

    fn month(label: &str, date: &str, count: usize) -> String {
        let mut html = separator(date);
        for i in 0..count {
            html.push_str(&message(&format!("{} #{}", label, i)));
        }
        html
    }

    fn transcript(body: String) -> ExtractedTranscript {
        ExtractedTranscript {
            title: "Family".to_string(),
            stylesheet: String::new(),
            body_html: body,
            message_count: 0,
            exported_at: Utc::now(),
        }
    }

    #[test]
    fn test_earliest_month_without_predecessor_is_dropped() {
        let body = [
            month("jan", "03/01/2024", 5),
            month("feb", "01/02/2024", 20),
            month("mar", "02/03/2024", 12),
        ]
        .concat();

        let segments = split_by_month(&transcript(body), &TranscriptConfig::default()).unwrap();
        let months: Vec<_> = segments.iter().map(|s| s.month).collect();
        assert_eq!(months, vec![MonthKey::new(2024, 2), MonthKey::new(2024, 3)]);
        assert_eq!(segments[0].message_count, 20);
        assert_eq!(segments[1].message_count, 12);
    }

    #[test]
    fn test_recent_month_needs_minimum_messages() {
        let config = TranscriptConfig::default();

        let small = partition_by_month(&month("mar", "02/03/2024", 9), &config, today()).unwrap();
        assert!(!small[0].is_complete);

        let large = partition_by_month(&month("mar", "02/03/2024", 10), &config, today()).unwrap();
        assert!(large[0].is_complete);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let config = TranscriptConfig {
            min_recent_messages: 3,
            ..Default::default()
        };
        let groups = partition_by_month(&month("mar", "02/03/2024", 3), &config, today()).unwrap();
        assert!(groups[0].is_complete);
    }

    #[test]
    fn test_groups_sorted_chronologically_and_merged() {
        // separators out of order, with March appearing twice
        let body = [
            month("mar", "30/03/2024", 2),
            month("feb", "01/02/2024", 1),
            month("mar", "31/03/2024", 3),
        ]
        .concat();

        let groups = partition_by_month(&body, &TranscriptConfig::default(), today()).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].month, MonthKey::new(2024, 2));
        assert_eq!(groups[1].month, MonthKey::new(2024, 3));
        assert_eq!(groups[1].message_count, 5);
        assert!(groups[1].is_complete);
        assert!(!groups[0].is_complete);
    }

    #[test]
    fn test_year_boundary_counts_as_adjacent() {
        let body = [month("dec", "20/12/2023", 1), month("jan", "02/01/2024", 1)].concat();
        let groups = partition_by_month(&body, &TranscriptConfig::default(), today()).unwrap();
        assert!(groups[1].is_complete);
    }

    #[test]
    fn test_rows_before_first_separator_are_skipped() {
        let body = [message("orphan"), month("jun", "Today", 10)].concat();
        let groups = partition_by_month(&body, &TranscriptConfig::default(), today()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].month, MonthKey::new(2024, 6));
        assert_eq!(groups[0].message_count, 10);
        assert!(groups[0].rows.iter().all(|r| !r.contains("orphan")));
    }

    #[test]
    fn test_rendered_segment_contains_only_its_rows() {
        let body = [month("feb", "01/02/2024", 2), month("mar", "02/03/2024", 10)].concat();
        let t = transcript(body);
        let segments = split_by_month(&t, &TranscriptConfig::default()).unwrap();
        let march = render_segment(&t, segments.last().unwrap());

        assert!(march.contains("<title>Family - March 2024</title>"));
        assert!(march.contains("mar #9"));
        assert!(!march.contains("feb #0"));
    }
}
