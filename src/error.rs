//! Error taxonomy for the crawler.
//!
//! Every stage owns its failures: fetch and parse errors degrade to a
//! fallback fetch or an empty result, existing-key query errors degrade to
//! "treat everything as new", and persistence errors are reported without
//! rolling the run back. Only [`Error::Configuration`] is fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Network failure, non-success status, or unavailable strategy while
    /// fetching a listing or detail page.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("parse error: {0}")]
    Parse(String),

    /// The persisted store could not be read for duplicate suppression.
    #[error("existing-key query failed: {0}")]
    DedupQuery(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn fetch(url: &str, reason: impl Into<String>) -> Self {
        Error::Fetch {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
