//! Data models for articles as they move through the pipeline.
//!
//! - [`CandidateArticle`]: a listing-page reference (title, link, source)
//! - [`EnrichedArticle`]: a candidate plus its detail-page content and publish time
//! - [`PersistableRecord`]: the row shape written to the news table
//! - [`ExistingKeys`]: snapshot of identities already in the table
//!
//! An article's identity is its link *or* its title: a match on either one
//! makes two articles duplicates.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Placeholder time text assigned at listing time; the detail page supplies
/// the real publish time later.
pub const RECENT: &str = "Recent";

/// A minimally-identified article reference discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateArticle {
    pub title: String,
    pub link: String,
    /// Free-text relative time from the listing ("5 minutes ago", "Recent").
    pub raw_time_text: String,
    /// Human-readable source label, e.g. "Yahoo Finance".
    pub source: String,
}

impl CandidateArticle {
    pub fn new(title: impl Into<String>, link: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            raw_time_text: RECENT.to_string(),
            source: source.into(),
        }
    }
}

/// A candidate after its detail page has been fetched and parsed.
///
/// `content` is never null: any enrichment failure leaves it empty, and an
/// empty `content` keeps the article out of the persistence handoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedArticle {
    #[serde(flatten)]
    pub candidate: CandidateArticle,
    pub content: String,
    pub raw_publish_time: String,
}

impl EnrichedArticle {
    /// Wrap a candidate with empty enrichment fields, ready for a scheduler slot.
    pub fn pending(candidate: CandidateArticle) -> Self {
        Self {
            candidate,
            content: String::new(),
            raw_publish_time: String::new(),
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn title(&self) -> &str {
        &self.candidate.title
    }

    pub fn link(&self) -> &str {
        &self.candidate.link
    }
}

/// Status written for rows that still need a vector embedding.
pub const EMBEDDING_PENDING: &str = "pending";

/// A row of the news table.
///
/// Classification and embedding columns are placeholders filled by later
/// jobs; this crate always writes them empty or pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistableRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    /// RFC 3339 publish time, or the ingestion time if none could be parsed.
    pub published_at: String,
    pub created_at: String,
    pub content: String,
    pub source: String,
    pub companies: Vec<String>,
    pub industries: Vec<String>,
    pub embedding_status: String,
    pub embedding_vector_id: Option<String>,
    pub embedded_at: Option<String>,
    pub embedding_model: Option<String>,
}

/// URLs and titles already present in the persisted store.
///
/// Pulled once per run and only ever read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingKeys {
    pub urls: HashSet<String>,
    pub titles: HashSet<String>,
}

impl ExistingKeys {
    pub fn contains(&self, candidate: &CandidateArticle) -> bool {
        self.urls.contains(&candidate.link) || self.titles.contains(&candidate.title)
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty() && self.titles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_defaults_to_recent() {
        let c = CandidateArticle::new(
            "Stocks rally on jobs data",
            "https://finance.yahoo.com/news/a.html",
            "Yahoo Finance",
        );
        assert_eq!(c.raw_time_text, RECENT);
        assert_eq!(c.source, "Yahoo Finance");
    }

    #[test]
    fn test_pending_article_has_no_content() {
        let c = CandidateArticle::new("Some long headline", "https://x.test/a", "X");
        let e = EnrichedArticle::pending(c);
        assert!(!e.has_content());
        assert_eq!(e.content, "");
        assert_eq!(e.raw_publish_time, "");
    }

    #[test]
    fn test_whitespace_content_is_not_content() {
        let c = CandidateArticle::new("Some long headline", "https://x.test/a", "X");
        let mut e = EnrichedArticle::pending(c);
        e.content = "  \n\n ".to_string();
        assert!(!e.has_content());
    }

    #[test]
    fn test_existing_keys_match_on_link_or_title() {
        let mut keys = ExistingKeys::default();
        keys.urls.insert("https://x.test/a".to_string());
        keys.titles.insert("Known headline here".to_string());

        let by_link = CandidateArticle::new("Fresh headline text", "https://x.test/a", "X");
        let by_title = CandidateArticle::new("Known headline here", "https://x.test/b", "X");
        let neither = CandidateArticle::new("Fresh headline text", "https://x.test/c", "X");

        assert!(keys.contains(&by_link));
        assert!(keys.contains(&by_title));
        assert!(!keys.contains(&neither));
    }

    #[test]
    fn test_record_serializes_null_embedding_fields() {
        let record = PersistableRecord {
            id: "id-1".to_string(),
            title: "T".to_string(),
            url: "https://x.test/a".to_string(),
            published_at: "2025-05-06T10:00:00+00:00".to_string(),
            created_at: "2025-05-06T10:05:00+00:00".to_string(),
            content: "body".to_string(),
            source: "Yahoo Finance".to_string(),
            companies: vec![],
            industries: vec!["Financial News".to_string()],
            embedding_status: EMBEDDING_PENDING.to_string(),
            embedding_vector_id: None,
            embedded_at: None,
            embedding_model: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["embedding_status"], "pending");
        assert!(json["embedding_vector_id"].is_null());
        assert!(json["embedded_at"].is_null());
        assert!(json["embedding_model"].is_null());
        assert_eq!(json["companies"], serde_json::json!([]));
    }
}
