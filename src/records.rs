//! Conversion of enriched articles into news-table rows.

use crate::models::{EMBEDDING_PENDING, EnrichedArticle, PersistableRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// Visible timestamp layouts seen on detail pages, all read as UTC.
const DATETIME_FORMATS: &[&str] = &[
    "%a, %b %d, %Y, %I:%M %p",
    "%a, %B %d, %Y, %I:%M %p",
    "%b %d, %Y, %I:%M %p",
    "%B %d, %Y, %I:%M %p",
    "%b %d, %Y at %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%a, %b %d, %Y", "%b %d, %Y", "%B %d, %Y", "%Y-%m-%d"];

/// Parse a raw publish time into RFC 3339, or `None` if no known layout fits.
pub fn parse_publish_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt.and_utc());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// RFC 3339 publish time; unparseable or placeholder values become `now`.
pub fn normalize_publish_time(raw: &str, now: DateTime<Utc>) -> String {
    match parse_publish_time(raw) {
        Some(dt) => dt.to_rfc3339(),
        None => {
            debug!(raw, "Unparseable publish time; using ingestion time");
            now.to_rfc3339()
        }
    }
}

impl PersistableRecord {
    pub fn from_enriched(article: &EnrichedArticle, industry: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: article.candidate.title.clone(),
            url: article.candidate.link.clone(),
            published_at: normalize_publish_time(&article.raw_publish_time, now),
            created_at: now.to_rfc3339(),
            content: article.content.clone(),
            source: article.candidate.source.clone(),
            companies: Vec::new(),
            industries: vec![industry.to_string()],
            embedding_status: EMBEDDING_PENDING.to_string(),
            embedding_vector_id: None,
            embedded_at: None,
            embedding_model: None,
        }
    }
}
