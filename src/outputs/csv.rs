//! CSV export with a fixed header row.

use super::ExportRow;
use crate::error::{Error, Result};
use crate::models::EnrichedArticle;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

pub fn render_csv(articles: &[EnrichedArticle]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if articles.is_empty() {
        writer.write_record(["title", "link", "time", "source", "content", "fullTime"])?;
    }
    for article in articles {
        writer.serialize(ExportRow::from(article))?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}

/// Write `{output_dir}/{stem}.csv`.
#[instrument(level = "info", skip_all, fields(%output_dir, %stem))]
pub async fn write_csv(articles: &[EnrichedArticle], output_dir: &str, stem: &str) -> Result<PathBuf> {
    let path = Path::new(output_dir).join(format!("{stem}.csv"));
    let body = render_csv(articles)?;
    fs::write(&path, body).await?;
    info!(path = %path.display(), rows = articles.len(), "Wrote CSV export");
    Ok(path)
}
