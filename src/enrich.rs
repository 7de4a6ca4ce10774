//! Bounded-concurrency enrichment of candidates with detail-page content.
//!
//! Each candidate gets exactly one task. At most `concurrency` tasks are in
//! flight; each one sleeps a random jitter, fetches the detail page, and
//! parses it, all inside a single timeout. A task that times out, errors, or
//! panics leaves its article with empty content and never disturbs the
//! others. [`EnrichmentScheduler::enrich`] returns only once every task has
//! settled.

use crate::config::ExecutionProfile;
use crate::error::Result;
use crate::extract::{DetailFields, extract_details};
use crate::fetch::{FetchMode, PageKind, SourceFetcher};
use crate::models::EnrichedArticle;
use crate::utils::{Jitter, truncate_for_log};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSettings {
    /// Maximum tasks in flight at once.
    pub concurrency: usize,
    /// Budget for one task: jitter, fetch, and parse together.
    pub task_timeout: Duration,
    /// Random delay before each detail fetch.
    pub jitter: Jitter,
}

impl EnrichmentSettings {
    pub fn for_profile(profile: ExecutionProfile) -> Self {
        Self {
            concurrency: profile.enrichment_concurrency(),
            task_timeout: profile.enrichment_task_timeout(),
            jitter: Jitter::detail(),
        }
    }
}

/// How a single candidate's task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Page parsed and produced content.
    Enriched,
    /// Page parsed but had no qualifying content.
    Empty,
    TimedOut,
    /// Fetch error or a panic inside the task.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub attempted: usize,
    pub enriched: usize,
    pub empty: usize,
    pub timed_out: usize,
    pub failed: usize,
}

impl EnrichmentReport {
    fn record(mut self, outcome: TaskOutcome) -> Self {
        self.attempted += 1;
        match outcome {
            TaskOutcome::Enriched => self.enriched += 1,
            TaskOutcome::Empty => self.empty += 1,
            TaskOutcome::TimedOut => self.timed_out += 1,
            TaskOutcome::Failed => self.failed += 1,
        }
        self
    }
}

pub struct EnrichmentScheduler {
    fetcher: Arc<dyn SourceFetcher>,
    settings: EnrichmentSettings,
}

impl EnrichmentScheduler {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, settings: EnrichmentSettings) -> Self {
        Self { fetcher, settings }
    }

    async fn fetch_details(&self, link: &str) -> Result<DetailFields> {
        self.settings.jitter.wait().await;
        let markup = self
            .fetcher
            .fetch(link, FetchMode::Fallback, PageKind::Detail)
            .await?;
        Ok(extract_details(&markup))
    }

    async fn enrich_one(&self, index: usize, total: usize, article: &mut EnrichedArticle) -> TaskOutcome {
        debug!(index, total, title = %truncate_for_log(article.title(), 50), "Fetching content");

        let link = article.link().to_string();
        let task = AssertUnwindSafe(self.fetch_details(&link)).catch_unwind();
        let (fields, outcome) = match timeout(self.settings.task_timeout, task).await {
            Ok(Ok(Ok(fields))) => {
                let outcome = if fields.content.trim().is_empty() {
                    warn!(index, %link, "No content found on detail page");
                    TaskOutcome::Empty
                } else {
                    debug!(index, chars = fields.content.chars().count(), "Fetched content");
                    TaskOutcome::Enriched
                };
                (fields, outcome)
            }
            Ok(Ok(Err(e))) => {
                warn!(index, %link, error = %e, "Detail fetch failed");
                (DetailFields::empty(), TaskOutcome::Failed)
            }
            Ok(Err(_panic)) => {
                error!(index, %link, "Enrichment task panicked");
                (DetailFields::empty(), TaskOutcome::Failed)
            }
            Err(_) => {
                warn!(
                    index,
                    %link,
                    timeout_secs = self.settings.task_timeout.as_secs_f32(),
                    "Detail fetch timed out; skipping"
                );
                (DetailFields::empty(), TaskOutcome::TimedOut)
            }
        };

        article.content = fields.content;
        article.raw_publish_time = fields.raw_publish_time;
        outcome
    }

    /// Enrich every article in place and wait for all tasks to settle.
    ///
    /// Slot `i` of `articles` is only ever written by task `i`, so results
    /// stay in input order whatever order the tasks finish in.
    #[instrument(level = "info", skip_all, fields(count = articles.len(), concurrency = self.settings.concurrency))]
    pub async fn enrich(&self, articles: &mut [EnrichedArticle]) -> EnrichmentReport {
        let total = articles.len();
        if total == 0 {
            return EnrichmentReport::default();
        }
        let limit = self.settings.concurrency.max(1);
        let started = Instant::now();
        info!(total, limit, "Starting content enrichment");

        let report = stream::iter(articles.iter_mut().enumerate())
            .map(|(i, article)| self.enrich_one(i + 1, total, article))
            .buffer_unordered(limit)
            .fold(EnrichmentReport::default(), |report, outcome| async move {
                report.record(outcome)
            })
            .await;

        info!(
            attempted = report.attempted,
            enriched = report.enriched,
            empty = report.empty,
            timed_out = report.timed_out,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Content enrichment complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateArticle;
    use crate::testing::{DetailBehavior, ScriptedFetcher, article_page};

    fn settings(concurrency: usize, timeout_ms: u64) -> EnrichmentSettings {
        EnrichmentSettings {
            concurrency,
            task_timeout: Duration::from_millis(timeout_ms),
            jitter: Jitter::none(),
        }
    }

    fn pending(n: usize) -> Vec<EnrichedArticle> {
        (0..n)
            .map(|i| {
                EnrichedArticle::pending(CandidateArticle::new(
                    format!("Headline number {i}"),
                    format!("https://news.test/a/{i}"),
                    "Test",
                ))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_enriches_in_place_and_keeps_order() {
        let fetcher = ScriptedFetcher::new();
        let articles = pending(6);
        for (i, a) in articles.iter().enumerate() {
            // later items answer faster so completion order is reversed
            fetcher.detail(
                a.link(),
                DetailBehavior::PageAfter(article_page(&format!("Body text for article {i}")), Duration::from_millis(60 - 10 * i as u64)),
            );
        }
        let fetcher = Arc::new(fetcher);
        let scheduler = EnrichmentScheduler::new(fetcher.clone(), settings(3, 2_000));

        let mut articles = articles;
        let report = scheduler.enrich(&mut articles).await;

        assert_eq!(report.enriched, 6);
        for (i, a) in articles.iter().enumerate() {
            assert_eq!(a.content, format!("Body text for article {i}"));
            assert_eq!(a.raw_publish_time, "2025-05-06T14:30:00Z");
        }
    }

    #[tokio::test]
    async fn test_timeout_yields_empty_content() {
        let fetcher = ScriptedFetcher::new();
        let mut articles = pending(2);
        fetcher.detail(articles[0].link(), DetailBehavior::Hang);
        fetcher.detail(articles[1].link(), DetailBehavior::Page(article_page("A perfectly fine article body")));
        let scheduler = EnrichmentScheduler::new(Arc::new(fetcher), settings(2, 100));

        let report = scheduler.enrich(&mut articles).await;

        assert_eq!(report.timed_out, 1);
        assert_eq!(report.enriched, 1);
        assert_eq!(articles[0].content, "");
        assert_eq!(articles[0].raw_publish_time, "");
        assert!(!articles[0].has_content());
        assert!(articles[1].has_content());
    }

    #[tokio::test]
    async fn test_errors_are_isolated() {
        let fetcher = ScriptedFetcher::new();
        let mut articles = pending(3);
        fetcher.detail(articles[0].link(), DetailBehavior::Fail);
        fetcher.detail(articles[1].link(), DetailBehavior::Page("<html><body>nothing</body></html>".to_string()));
        fetcher.detail(articles[2].link(), DetailBehavior::Page(article_page("Third article has a real body")));
        let scheduler = EnrichmentScheduler::new(Arc::new(fetcher), settings(1, 1_000));

        let report = scheduler.enrich(&mut articles).await;

        assert_eq!(
            report,
            EnrichmentReport { attempted: 3, enriched: 1, empty: 1, timed_out: 0, failed: 1 }
        );
        assert_eq!(articles[0].content, "");
        assert_eq!(articles[1].content, "");
        assert_eq!(articles[1].raw_publish_time, "Recent");
        assert_eq!(articles[2].content, "Third article has a real body");
    }

    #[tokio::test]
    async fn test_never_exceeds_concurrency_limit() {
        for (n, limit) in [(1, 3), (7, 3), (20, 4), (9, 1)] {
            let fetcher = ScriptedFetcher::new();
            let mut articles = pending(n);
            for a in &articles {
                fetcher.detail(a.link(), DetailBehavior::PageAfter(article_page("Body of a slow article"), Duration::from_millis(25)));
            }
            let fetcher = Arc::new(fetcher);
            let scheduler = EnrichmentScheduler::new(fetcher.clone(), settings(limit, 2_000));

            let report = scheduler.enrich(&mut articles).await;

            assert_eq!(report.enriched, n);
            assert!(fetcher.peak_in_flight() <= limit, "peak {} > limit {}", fetcher.peak_in_flight(), limit);
            assert_eq!(fetcher.peak_in_flight(), n.min(limit));
            assert_eq!(fetcher.detail_calls(), n);
        }
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_makes_progress() {
        let fetcher = ScriptedFetcher::new();
        let mut articles = pending(2);
        for a in &articles {
            fetcher.detail(a.link(), DetailBehavior::Page(article_page("Some article body content")));
        }
        let scheduler = EnrichmentScheduler::new(Arc::new(fetcher), settings(0, 1_000));
        let report = scheduler.enrich(&mut articles).await;
        assert_eq!(report.enriched, 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let scheduler = EnrichmentScheduler::new(Arc::new(ScriptedFetcher::new()), settings(3, 100));
        let report = scheduler.enrich(&mut []).await;
        assert_eq!(report, EnrichmentReport::default());
    }
}
