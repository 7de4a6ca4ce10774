//! Run orchestration: listing, dedup, enrichment, and persistence handoff.
//!
//! Stages run strictly in sequence; only enrichment fans out. Errors from a
//! stage are handled inside it (fallback fetch, fail-open dedup, empty
//! content) and reported as counts on the [`RunReport`]. The run ends in one
//! of three [`RunOutcome`]s.

use crate::config::{PipelineConfig, SourceConfig};
use crate::dedup::{dedup_batch, suppress_existing};
use crate::enrich::{EnrichmentReport, EnrichmentScheduler};
use crate::error::Result;
use crate::extract::extract_candidates;
use crate::fetch::{FetchMode, PageKind, SourceFetcher};
use crate::models::{CandidateArticle, EnrichedArticle, ExistingKeys, PersistableRecord};
use crate::recency::is_within_window;
use crate::store::PersistenceGateway;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// Nothing new to process; not a failure.
    NoData,
    /// Reserved for runs that cannot finish; no stage ends here today.
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunOutcome::Success => "SUCCESS",
            RunOutcome::NoData => "NO_DATA",
            RunOutcome::Failed => "FAILED",
        })
    }
}

/// Counts and results of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub sources_attempted: usize,
    pub sources_with_results: usize,
    pub listed: usize,
    pub after_batch_dedup: usize,
    pub after_freshness: usize,
    /// `false` when the key query failed and every candidate was treated as new.
    pub existing_keys_loaded: bool,
    pub after_store_dedup: usize,
    pub enrichment: EnrichmentReport,
    /// Articles with content, in candidate order, whether or not they were persisted.
    pub handoff: Vec<EnrichedArticle>,
    pub persisted: usize,
    pub persistence_error: Option<String>,
    pub elapsed: Duration,
}

impl RunReport {
    fn new(sources_attempted: usize) -> Self {
        Self {
            outcome: RunOutcome::NoData,
            sources_attempted,
            sources_with_results: 0,
            listed: 0,
            after_batch_dedup: 0,
            after_freshness: 0,
            existing_keys_loaded: false,
            after_store_dedup: 0,
            enrichment: EnrichmentReport::default(),
            handoff: Vec::new(),
            persisted: 0,
            persistence_error: None,
            elapsed: Duration::ZERO,
        }
    }
}

pub struct Pipeline {
    fetcher: Arc<dyn SourceFetcher>,
    store: Arc<dyn PersistenceGateway>,
    scheduler: EnrichmentScheduler,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        store: Arc<dyn PersistenceGateway>,
        config: PipelineConfig,
    ) -> Self {
        let scheduler = EnrichmentScheduler::new(fetcher.clone(), config.enrichment);
        Self {
            fetcher,
            store,
            scheduler,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    async fn fetch_listing(&self, source: &SourceConfig, mode: FetchMode) -> Result<Vec<CandidateArticle>> {
        let markup = self.fetcher.fetch(&source.url, mode, PageKind::Listing).await?;
        Ok(extract_candidates(&markup, &source.url, &source.label))
    }

    /// Primary strategy first, fallback when it errors or finds nothing.
    #[instrument(level = "info", skip_all, fields(source = %source.url))]
    async fn list_source(&self, source: &SourceConfig) -> Vec<CandidateArticle> {
        match self.fetch_listing(source, FetchMode::Primary).await {
            Ok(found) if !found.is_empty() => {
                info!(count = found.len(), mode = %FetchMode::Primary, "Listed candidates");
                return found;
            }
            Ok(_) => warn!(mode = %FetchMode::Primary, "No candidates found; trying fallback"),
            Err(e) => warn!(mode = %FetchMode::Primary, error = %e, "Listing fetch failed; trying fallback"),
        }

        match self.fetch_listing(source, FetchMode::Fallback).await {
            Ok(found) => {
                info!(count = found.len(), mode = %FetchMode::Fallback, "Listed candidates");
                found
            }
            Err(e) => {
                warn!(mode = %FetchMode::Fallback, error = %e, "Listing fetch failed; skipping source");
                Vec::new()
            }
        }
    }

    async fn existing_keys(&self, report: &mut RunReport) -> ExistingKeys {
        match self.store.query_existing_keys().await {
            Ok(keys) => {
                report.existing_keys_loaded = true;
                if keys.is_empty() {
                    info!("Store holds no articles yet");
                }
                keys
            }
            Err(e) => {
                warn!(error = %e, "Existing-key query failed; treating all candidates as new");
                ExistingKeys::default()
            }
        }
    }

    /// Run every stage once and report what happened.
    #[instrument(level = "info", skip_all, fields(sources = self.config.sources.len()))]
    pub async fn run(&self) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new(self.config.sources.len());
        self.run_stages(&mut report).await;
        report.elapsed = started.elapsed();
        info!(
            outcome = %report.outcome,
            persisted = report.persisted,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Run finished"
        );
        report
    }

    async fn run_stages(&self, report: &mut RunReport) {
        // Listing, sources in configured order.
        let mut listed = Vec::new();
        for source in &self.config.sources {
            let found = self.list_source(source).await;
            if !found.is_empty() {
                report.sources_with_results += 1;
            }
            listed.extend(found);
        }
        report.listed = listed.len();
        info!(
            attempted = report.sources_attempted,
            with_results = report.sources_with_results,
            candidates = report.listed,
            "Listing complete"
        );
        if listed.is_empty() {
            warn!("No candidates from any source");
            report.outcome = RunOutcome::NoData;
            return;
        }

        let (mut candidates, batch) = dedup_batch(listed);
        report.after_batch_dedup = batch.survivors;

        if self.config.freshness_filter {
            let before = candidates.len();
            candidates.retain(|c| is_within_window(&c.raw_time_text, self.config.max_hours));
            info!(
                dropped = before - candidates.len(),
                max_hours = self.config.max_hours,
                "Freshness filter applied"
            );
        }
        report.after_freshness = candidates.len();

        let existing = self.existing_keys(report).await;
        let (mut candidates, store) = suppress_existing(candidates, &existing);
        report.after_store_dedup = store.survivors;

        if let Some(cap) = self.config.max_articles
            && candidates.len() > cap
        {
            info!(cap, dropped = candidates.len() - cap, "Capping candidates for enrichment");
            candidates.truncate(cap);
        }
        if candidates.is_empty() {
            info!("Nothing new to enrich");
            report.outcome = RunOutcome::NoData;
            return;
        }

        let mut articles: Vec<EnrichedArticle> =
            candidates.into_iter().map(EnrichedArticle::pending).collect();
        report.enrichment = self.scheduler.enrich(&mut articles).await;

        articles.retain(EnrichedArticle::has_content);
        info!(
            enriched = report.enrichment.attempted,
            with_content = articles.len(),
            "Handoff set ready"
        );
        // Listing produced candidates, so the run succeeds even with nothing to hand off.
        report.outcome = RunOutcome::Success;
        if articles.is_empty() {
            warn!(
                attempted = report.enrichment.attempted,
                empty = report.enrichment.empty,
                timed_out = report.enrichment.timed_out,
                failed = report.enrichment.failed,
                "No article yielded content; nothing to persist"
            );
            return;
        }

        let now = Utc::now();
        let records: Vec<PersistableRecord> = articles
            .iter()
            .map(|a| PersistableRecord::from_enriched(a, &self.config.default_industry, now))
            .collect();
        match self.store.insert_batch(&records).await {
            Ok(count) => report.persisted = count,
            Err(e) => {
                warn!(error = %e, records = records.len(), "Insert failed; keeping enriched set");
                report.persistence_error = Some(e.to_string());
            }
        }
        report.handoff = articles;
        report.outcome = RunOutcome::Success;
    }
}
