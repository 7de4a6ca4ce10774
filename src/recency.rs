//! Freshness classification of listing-page relative time text.
//!
//! The classifier fails open: text it cannot read is treated as fresh, so
//! an unknown age never excludes an article.

use once_cell::sync::Lazy;
use regex::Regex;

static FIRST_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());

const MINUTE_MARKERS: &[&str] = &["minute", "分钟"];
const HOUR_MARKERS: &[&str] = &["hour", "小时"];
const NOW_MARKERS: &[&str] = &["just now", "now", "刚刚", "刚才"];

/// Returns `true` if `raw_time_text` describes something no older than `max_hours`.
///
/// - minute markers are always in window
/// - hour markers compare the first embedded integer against `max_hours`;
///   with no integer ("an hour ago") the text is in window
/// - "now" markers are in window
/// - empty or unrecognized text is in window
pub fn is_within_window(raw_time_text: &str, max_hours: u32) -> bool {
    let text = raw_time_text.trim().to_lowercase();
    if text.is_empty() {
        return true;
    }

    if MINUTE_MARKERS.iter().any(|m| text.contains(m)) {
        return true;
    }

    if HOUR_MARKERS.iter().any(|m| text.contains(m)) {
        return match FIRST_INTEGER.captures(&text) {
            // digits too long for u64 are an age well past any window
            Some(c) => c[1]
                .parse::<u64>()
                .is_ok_and(|hours| hours <= u64::from(max_hours)),
            None => true,
        };
    }

    if NOW_MARKERS.iter().any(|m| text.contains(m)) {
        return true;
    }

    true
}
