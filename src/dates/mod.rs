//! Inferring the date of the oldest rendered message.
//!
//! The host UI exposes dates in several unreliable places. Each place is read
//! by an independent probe; probes run in priority order and the first one
//! that yields a date wins.

use std::sync::LazyLock;

use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use regex::Regex;
use tracing::{debug, warn};

use crate::browser::{ChatSurface, DateEvidence};

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d])(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})(?:[^\d]|$)")
        .expect("date pattern is valid")
});

static SEPARATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})\s*$")
        .expect("separator pattern is valid")
});

/// A date probe over scraped evidence. `today` resolves relative labels.
pub type DateProbe = fn(&DateEvidence, NaiveDate) -> Option<NaiveDate>;

/// Probes in priority order.
pub const PROBES: [(&str, DateProbe); 3] = [
    ("timestamp attribute", probe_timestamp_attribute),
    ("separator text", probe_separator_text),
    ("sibling text", probe_sibling_text),
];

fn build_date(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    let day: u32 = day.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_relative(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    match text.trim().to_lowercase().as_str() {
        "today" => Some(today),
        "yesterday" => today.checked_sub_signed(ChronoDuration::days(1)),
        _ => None,
    }
}

/// Find a `DD/MM/YYYY`-style date anywhere in `text`.
pub fn parse_date_text(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(date) = parse_relative(text, today) {
        return Some(date);
    }

    DATE_PATTERN
        .captures_iter(text)
        .find_map(|caps| build_date(&caps[1], &caps[2], &caps[3]))
}

/// Parse a date separator label: the whole text must be a date.
pub fn parse_separator(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(date) = parse_relative(text, today) {
        return Some(date);
    }

    let caps = SEPARATOR_PATTERN.captures(text)?;
    build_date(&caps[1], &caps[2], &caps[3])
}

pub fn probe_timestamp_attribute(evidence: &DateEvidence, today: NaiveDate) -> Option<NaiveDate> {
    evidence
        .timestamp_attributes
        .iter()
        .filter_map(|attr| parse_date_text(attr, today))
        .min()
}

pub fn probe_separator_text(evidence: &DateEvidence, today: NaiveDate) -> Option<NaiveDate> {
    evidence
        .separator_texts
        .iter()
        .filter_map(|text| parse_separator(text, today))
        .min()
}

/// Nearest preceding row whose text contains a date.
pub fn probe_sibling_text(evidence: &DateEvidence, today: NaiveDate) -> Option<NaiveDate> {
    evidence
        .sibling_texts
        .iter()
        .find_map(|text| parse_date_text(text, today))
}

/// Run the probes in order, returning the first date and the probe name.
pub fn infer_oldest_date(
    evidence: &DateEvidence,
    today: NaiveDate,
) -> Option<(NaiveDate, &'static str)> {
    PROBES
        .iter()
        .find_map(|(name, probe)| probe(evidence, today).map(|date| (date, *name)))
}

fn sample(values: &[String]) -> Vec<&str> {
    values
        .iter()
        .take(3)
        .map(|v| v.get(..60).unwrap_or(v.as_str()))
        .collect()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Date of the oldest message currently rendered, if any probe can tell.
///
/// `None` means "unknown, keep scrolling".
pub async fn find_oldest_visible_date(surface: &dyn ChatSurface) -> Option<NaiveDate> {
    let evidence = match surface.date_evidence().await {
        Ok(evidence) => evidence,
        Err(e) => {
            warn!("Could not read date evidence: {}", e);
            return None;
        }
    };

    match infer_oldest_date(&evidence, today()) {
        Some((date, probe)) => {
            debug!("Oldest visible date {} (from {})", date, probe);
            Some(date)
        }
        None => {
            debug!(
                "No date found; attributes={:?} separators={:?} siblings={:?}",
                sample(&evidence.timestamp_attributes),
                sample(&evidence.separator_texts),
                sample(&evidence.sibling_texts)
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_text_formats() {
        assert_eq!(parse_date_text("12/03/2024", today()), Some(ymd(2024, 3, 12)));
        assert_eq!(parse_date_text("1.2.2023", today()), Some(ymd(2023, 2, 1)));
        assert_eq!(parse_date_text("05-11-22", today()), Some(ymd(2022, 11, 5)));
    }

    #[test]
    fn test_parse_date_text_inside_timestamp() {
        assert_eq!(
            parse_date_text("[10:30, 12/03/2024] Alice: ", today()),
            Some(ymd(2024, 3, 12))
        );
    }

    #[test]
    fn test_parse_date_text_rejects_invalid_calendar_dates() {
        assert_eq!(parse_date_text("31/02/2024", today()), None);
        assert_eq!(parse_date_text("no date here", today()), None);
    }

    #[test]
    fn test_relative_labels() {
        assert_eq!(parse_separator("Today", today()), Some(today()));
        assert_eq!(parse_separator(" YESTERDAY ", today()), Some(ymd(2024, 6, 14)));
    }

    #[test]
    fn test_separator_must_be_whole_text() {
        assert_eq!(parse_separator("12/03/2024", today()), Some(ymd(2024, 3, 12)));
        assert_eq!(parse_separator("see you 12/03/2024", today()), None);
    }

    #[test]
    fn test_timestamp_probe_takes_oldest() {
        let evidence = DateEvidence {
            timestamp_attributes: vec![
                "[09:00, 14/03/2024] Bob: ".into(),
                "[08:00, 12/03/2024] Alice: ".into(),
            ],
            ..Default::default()
        };
        assert_eq!(
            infer_oldest_date(&evidence, today()),
            Some((ymd(2024, 3, 12), "timestamp attribute"))
        );
    }

    #[test]
    fn test_probes_fall_back_in_order() {
        let evidence = DateEvidence {
            timestamp_attributes: vec!["garbage".into()],
            separator_texts: vec!["not a date".into()],
            sibling_texts: vec!["hello".into(), "Meeting moved to 02/01/2024".into()],
        };
        assert_eq!(
            infer_oldest_date(&evidence, today()),
            Some((ymd(2024, 1, 2), "sibling text"))
        );
    }

    #[test]
    fn test_no_evidence_yields_none() {
        assert_eq!(infer_oldest_date(&DateEvidence::default(), today()), None);
    }

    #[tokio::test]
    async fn test_surface_failure_is_not_an_error() {
        let surface = crate::browser::fake::FakeSurface::new();
        surface.fail_date_evidence();
        assert_eq!(find_oldest_visible_date(&surface).await, None);
    }
}
