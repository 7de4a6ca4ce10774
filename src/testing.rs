//! Test doubles for the fetcher and the persistence gateway.

use crate::error::{Error, Result};
use crate::fetch::{FetchMode, PageKind, SourceFetcher};
use crate::models::{ExistingKeys, PersistableRecord};
use crate::store::PersistenceGateway;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A detail page with a body container, one tagged paragraph, and a timestamp.
pub fn article_page(body: &str) -> String {
    format!(
        r#"<html><body>
        <time datetime="2025-05-06T14:30:00Z">May 6, 2025</time>
        <div data-testid="caas-body"><p class="yf-x1">{body}</p></div>
        </body></html>"#
    )
}

/// A listing page whose items are `(title, href)` pairs in the strict tier.
pub fn listing_page(items: &[(&str, &str)]) -> String {
    let lis: String = items
        .iter()
        .map(|(title, href)| {
            format!(r#"<li class="stream-item story-item"><a href="{href}" aria-label="{title}">{title}</a></li>"#)
        })
        .collect();
    format!("<html><body><ul>{lis}</ul></body></html>")
}

#[derive(Debug, Clone)]
pub enum DetailBehavior {
    Page(String),
    PageAfter(String, Duration),
    Fail,
    /// Never answers within any reasonable timeout.
    Hang,
}

struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serves scripted listing and detail pages and counts what it was asked for.
///
/// Unscripted URLs fail with a fetch error.
#[derive(Default)]
pub struct ScriptedFetcher {
    listings: Mutex<HashMap<(String, FetchMode), String>>,
    details: Mutex<HashMap<String, DetailBehavior>>,
    listing_calls: Mutex<Vec<(String, FetchMode)>>,
    detail_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(&self, url: &str, mode: FetchMode, markup: String) {
        self.listings
            .lock()
            .unwrap()
            .insert((url.to_string(), mode), markup);
    }

    pub fn detail(&self, link: &str, behavior: DetailBehavior) {
        self.details
            .lock()
            .unwrap()
            .insert(link.to_string(), behavior);
    }

    pub fn listing_calls(&self) -> Vec<(String, FetchMode)> {
        self.listing_calls.lock().unwrap().clone()
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, mode: FetchMode, kind: PageKind) -> Result<String> {
        match kind {
            PageKind::Listing => {
                self.listing_calls
                    .lock()
                    .unwrap()
                    .push((url.to_string(), mode));
                let markup = self
                    .listings
                    .lock()
                    .unwrap()
                    .get(&(url.to_string(), mode))
                    .cloned();
                markup.ok_or_else(|| Error::fetch(url, format!("{mode} fetch scripted to fail")))
            }
            PageKind::Detail => {
                self.detail_calls.fetch_add(1, Ordering::SeqCst);
                let _guard = InFlight::enter(&self.in_flight, &self.peak);
                let behavior = self.details.lock().unwrap().get(url).cloned();
                match behavior {
                    Some(DetailBehavior::Page(markup)) => Ok(markup),
                    Some(DetailBehavior::PageAfter(markup, delay)) => {
                        tokio::time::sleep(delay).await;
                        Ok(markup)
                    }
                    Some(DetailBehavior::Hang) => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Err(Error::fetch(url, "hung"))
                    }
                    Some(DetailBehavior::Fail) | None => Err(Error::fetch(url, "status 500")),
                }
            }
        }
    }
}

/// In-memory store with switchable failures.
#[derive(Default)]
pub struct MemoryGateway {
    pub keys: ExistingKeys,
    pub fail_query: bool,
    pub fail_insert: bool,
    inserted: Mutex<Vec<PersistableRecord>>,
    insert_calls: AtomicUsize,
}

impl MemoryGateway {
    pub fn with_keys(urls: &[&str], titles: &[&str]) -> Self {
        Self {
            keys: ExistingKeys {
                urls: urls.iter().map(|s| s.to_string()).collect(),
                titles: titles.iter().map(|s| s.to_string()).collect(),
            },
            ..Self::default()
        }
    }

    pub fn failing_query(mut self) -> Self {
        self.fail_query = true;
        self
    }

    pub fn failing_insert(mut self) -> Self {
        self.fail_insert = true;
        self
    }

    pub fn inserted(&self) -> Vec<PersistableRecord> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn check_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn query_existing_keys(&self) -> Result<ExistingKeys> {
        if self.fail_query {
            return Err(Error::DedupQuery("connection refused".to_string()));
        }
        Ok(self.keys.clone())
    }

    async fn insert_batch(&self, records: &[PersistableRecord]) -> Result<usize> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert {
            return Err(Error::Persistence("insert rejected".to_string()));
        }
        self.inserted.lock().unwrap().extend_from_slice(records);
        Ok(records.len())
    }
}
