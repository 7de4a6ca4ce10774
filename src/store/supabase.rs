//! Supabase (PostgREST) implementation of [`PersistenceGateway`].
//!
//! All calls go to `{url}/rest/v1/{table}` with the project key sent both
//! as `apikey` and as a bearer token. PostgREST caps responses at 1000 rows,
//! so reads that need the whole table page through it.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::models::{ExistingKeys, PersistableRecord};
use crate::store::PersistenceGateway;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Rows requested per page; matches the PostgREST default `max-rows`.
pub const PAGE_SIZE: usize = 1000;

/// Rows listed by title after a successful insert.
const INSERT_PREVIEW: usize = 5;

#[derive(Debug, Deserialize)]
struct KeyRow {
    url: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceRow {
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InsertedRow {
    #[serde(default)]
    title: String,
}

/// Row count and per-source distribution of the news table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub table: String,
    pub total: Option<u64>,
    pub sources: BTreeMap<String, usize>,
}

pub struct SupabaseGateway {
    client: reqwest::Client,
    config: StoreConfig,
}

impl SupabaseGateway {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.key)
            .map_err(|_| Error::Configuration("SUPABASE_ANON_KEY is not a valid header value".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.key))
            .map_err(|_| Error::Configuration("SUPABASE_ANON_KEY is not a valid header value".to_string()))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.url,
            urlencoding::encode(&self.config.table)
        )
    }

    /// GET one page of `select` columns; error bodies are mapped by `on_error`.
    async fn get_page<T, F>(&self, select: &str, offset: usize, limit: usize, on_error: F) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
        F: Fn(String) -> Error,
    {
        let resp = self
            .client
            .get(self.table_url())
            .query(&[
                ("select", select.to_string()),
                ("order", "id.asc".to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| on_error(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| on_error(e.to_string()))?;
        if !status.is_success() {
            return Err(on_error(describe_failure(status.as_u16(), &body, &self.config.table)));
        }
        serde_json::from_str(&body).map_err(|_| on_error(describe_unexpected(&body)))
    }

    /// Page through the whole table collecting `select` rows.
    async fn get_all<T, F>(&self, select: &str, on_error: F) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
        F: Fn(String) -> Error + Copy,
    {
        let mut rows = Vec::new();
        loop {
            let page: Vec<T> = self.get_page(select, rows.len(), PAGE_SIZE, on_error).await?;
            let short = page.len() < PAGE_SIZE;
            rows.extend(page);
            if short {
                return Ok(rows);
            }
            debug!(fetched = rows.len(), "Fetched full page; requesting next");
        }
    }

    /// Total rows and rows per source.
    #[instrument(level = "info", skip(self), fields(table = %self.config.table))]
    pub async fn stats(&self) -> Result<StoreStats> {
        let resp = self
            .client
            .head(self.table_url())
            .query(&[("select", "id")])
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|e| Error::DedupQuery(e.to_string()))?;
        let total = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        let rows: Vec<SourceRow> = self.get_all("source", Error::DedupQuery).await?;
        let mut sources = BTreeMap::new();
        for row in rows {
            let source = row.source.unwrap_or_else(|| "Unknown".to_string());
            *sources.entry(source).or_insert(0) += 1;
        }

        Ok(StoreStats {
            table: self.config.table.clone(),
            total,
            sources,
        })
    }
}

#[async_trait]
impl PersistenceGateway for SupabaseGateway {
    #[instrument(level = "info", skip(self), fields(table = %self.config.table))]
    async fn check_ready(&self) -> Result<()> {
        let _: Vec<KeyRow> = self.get_page("url,title", 0, 1, Error::DedupQuery).await?;
        info!("Store is reachable");
        Ok(())
    }

    #[instrument(level = "info", skip(self), fields(table = %self.config.table))]
    async fn query_existing_keys(&self) -> Result<ExistingKeys> {
        let rows: Vec<KeyRow> = self.get_all("url,title", Error::DedupQuery).await?;
        let row_count = rows.len();
        let mut keys = ExistingKeys::default();
        for row in rows {
            if let Some(url) = row.url.filter(|u| !u.is_empty()) {
                keys.urls.insert(url);
            }
            if let Some(title) = row.title.filter(|t| !t.is_empty()) {
                keys.titles.insert(title);
            }
        }
        info!(
            rows = row_count,
            urls = keys.urls.len(),
            titles = keys.titles.len(),
            "Loaded existing article keys"
        );
        Ok(keys)
    }

    #[instrument(level = "info", skip_all, fields(table = %self.config.table, count = records.len()))]
    async fn insert_batch(&self, records: &[PersistableRecord]) -> Result<usize> {
        if records.is_empty() {
            info!("No records to insert");
            return Ok(0);
        }

        let resp = self
            .client
            .post(self.table_url())
            .header("Prefer", "return=representation")
            .json(records)
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Persistence(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Persistence(describe_failure(
                status.as_u16(),
                &body,
                &self.config.table,
            )));
        }

        let inserted: Vec<InsertedRow> =
            serde_json::from_str(&body).map_err(|_| Error::Persistence(describe_unexpected(&body)))?;
        if inserted.is_empty() {
            return Err(Error::Persistence("insert returned no rows".to_string()));
        }

        info!(inserted = inserted.len(), "Inserted articles");
        for (i, row) in inserted.iter().take(INSERT_PREVIEW).enumerate() {
            info!(n = i + 1, title = %truncate_for_log(&row.title, 50), "Inserted");
        }
        if inserted.len() > INSERT_PREVIEW {
            info!(more = inserted.len() - INSERT_PREVIEW, "…and more");
        }
        Ok(inserted.len())
    }
}

/// Total from a PostgREST `Content-Range` header such as `0-24/3573`.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn describe_failure(status: u16, body: &str, table: &str) -> String {
    let lower = body.to_lowercase();
    let hint = if status == 404 || lower.contains("does not exist") || lower.contains("not found") {
        format!(" (table '{table}' not found)")
    } else if status == 401 || status == 403 {
        " (check the service key and RLS policies)".to_string()
    } else {
        String::new()
    };
    format!("status {status}{hint}: {}", truncate_for_log(body.trim(), 200))
}

/// A 200 whose body is not rows usually means the key cannot see the table
/// and PostgREST answered with its OpenAPI document instead.
fn describe_unexpected(body: &str) -> String {
    let lower = body.to_lowercase();
    if lower.contains("swagger") || lower.contains("openapi") {
        warn!("Store returned its API description instead of rows");
        "API returned its schema document instead of data (check the service key, table name and RLS policies)"
            .to_string()
    } else {
        format!("unexpected response: {}", truncate_for_log(body.trim(), 200))
    }
}
