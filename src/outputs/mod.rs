//! Local exports and the end-of-run summary.
//!
//! Interactive runs write the handoff set next to the operator:
//!
//! ```text
//! output_dir/
//! ├── yahoo_multi_news_20251016_150400.jsonl
//! └── yahoo_multi_news_20251016_150400.csv
//! ```
//!
//! Both files carry the same [`ExportRow`] columns.
//!
//! # Submodules
//!
//! - [`json`]: JSON Lines writer
//! - [`csv`]: flat CSV writer
//! - [`summary`]: run and store statistics for the log

pub mod csv;
pub mod json;
pub mod summary;

use crate::error::Result;
use crate::models::EnrichedArticle;
use crate::utils::ensure_writable_dir;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument};

pub const EXPORT_PREFIX: &str = "yahoo_multi_news";

/// One exported article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow<'a> {
    pub title: &'a str,
    pub link: &'a str,
    /// Listing time text.
    pub time: &'a str,
    pub source: &'a str,
    pub content: &'a str,
    /// Publish time as found on the detail page.
    #[serde(rename = "fullTime")]
    pub full_time: &'a str,
}

impl<'a> From<&'a EnrichedArticle> for ExportRow<'a> {
    fn from(article: &'a EnrichedArticle) -> Self {
        Self {
            title: &article.candidate.title,
            link: &article.candidate.link,
            time: &article.candidate.raw_time_text,
            source: &article.candidate.source,
            content: &article.content,
            full_time: &article.raw_publish_time,
        }
    }
}

/// `yahoo_multi_news_<YYYYmmdd_HHMMSS>`
pub fn export_stem(at: DateTime<Local>) -> String {
    format!("{EXPORT_PREFIX}_{}", at.format("%Y%m%d_%H%M%S"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub jsonl: PathBuf,
    pub csv: PathBuf,
}

/// Write both export files into `output_dir`.
#[instrument(level = "info", skip_all, fields(%output_dir, count = articles.len()))]
pub async fn export_local(articles: &[EnrichedArticle], output_dir: &str) -> Result<ExportPaths> {
    ensure_writable_dir(output_dir).await?;
    let stem = export_stem(Local::now());
    let jsonl = json::write_jsonl(articles, output_dir, &stem).await?;
    let csv = self::csv::write_csv(articles, output_dir, &stem).await?;
    info!(jsonl = %jsonl.display(), csv = %csv.display(), "Exported articles locally");
    Ok(ExportPaths { jsonl, csv })
}
