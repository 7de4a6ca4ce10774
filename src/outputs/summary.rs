//! End-of-run summary and store statistics, written to the log.

use crate::config::SourceConfig;
use crate::models::EnrichedArticle;
use crate::pipeline::RunReport;
use crate::store::supabase::StoreStats;
use crate::utils::truncate_for_log;
use tracing::{info, warn};

/// Titles listed in the summary.
const TITLE_PREVIEW: usize = 10;

/// How the listing time texts of a set of articles break down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeDistribution {
    pub minutes: usize,
    pub hours: usize,
    pub other: usize,
}

pub fn time_distribution(articles: &[EnrichedArticle]) -> TimeDistribution {
    articles.iter().fold(TimeDistribution::default(), |mut dist, a| {
        let text = a.candidate.raw_time_text.to_lowercase();
        if text.contains("minute") || text.contains("分钟") {
            dist.minutes += 1;
        } else if text.contains("hour") || text.contains("小时") {
            dist.hours += 1;
        } else {
            dist.other += 1;
        }
        dist
    })
}

pub fn log_run_summary(report: &RunReport, sources: &[SourceConfig]) {
    info!(
        outcome = %report.outcome,
        sources = sources.len(),
        listed = report.listed,
        after_batch_dedup = report.after_batch_dedup,
        after_store_dedup = report.after_store_dedup,
        enriched = report.enrichment.enriched,
        timed_out = report.enrichment.timed_out,
        failed = report.enrichment.failed,
        kept = report.handoff.len(),
        persisted = report.persisted,
        elapsed_s = report.elapsed.as_secs_f32(),
        "Run summary"
    );
    for source in sources {
        info!(url = %source.url, label = %source.label, "Configured source");
    }

    let dist = time_distribution(&report.handoff);
    info!(minutes = dist.minutes, hours = dist.hours, other = dist.other, "Time distribution");

    for (i, article) in report.handoff.iter().take(TITLE_PREVIEW).enumerate() {
        info!(n = i + 1, title = %truncate_for_log(article.title(), 60), "Kept");
    }

    if let Some(err) = &report.persistence_error {
        warn!(error = %err, unpersisted = report.handoff.len(), "Articles were not persisted");
    }
}

pub fn log_store_stats(stats: &StoreStats) {
    match stats.total {
        Some(total) => info!(table = %stats.table, total, "Store row count"),
        None => warn!(table = %stats.table, "Store did not report a row count"),
    }
    for (source, count) in &stats.sources {
        info!(%source, count, "Rows per source");
    }
}
