//! JSON Lines export: one [`ExportRow`] object per line.

use super::ExportRow;
use crate::error::Result;
use crate::models::EnrichedArticle;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

pub fn render_jsonl(articles: &[EnrichedArticle]) -> Result<String> {
    let mut out = String::new();
    for article in articles {
        out.push_str(&serde_json::to_string(&ExportRow::from(article))?);
        out.push('\n');
    }
    Ok(out)
}

/// Write `{output_dir}/{stem}.jsonl`.
#[instrument(level = "info", skip_all, fields(%output_dir, %stem))]
pub async fn write_jsonl(articles: &[EnrichedArticle], output_dir: &str, stem: &str) -> Result<PathBuf> {
    let path = Path::new(output_dir).join(format!("{stem}.jsonl"));
    let body = render_jsonl(articles)?;
    fs::write(&path, body).await?;
    info!(path = %path.display(), rows = articles.len(), "Wrote JSON Lines export");
    Ok(path)
}
