//! # Finance News Crawler
//!
//! Discovers finance articles on listing pages, drops anything already seen,
//! fetches article bodies with bounded concurrency, and stores the new ones
//! in a Supabase table.
//!
//! ## Usage
//!
//! ```sh
//! SUPABASE_URL=https://proj.supabase.co SUPABASE_ANON_KEY=... finance_news_crawler
//! ```
//!
//! ## Architecture
//!
//! 1. **Listing**: each source is fetched (rendered first, direct as fallback)
//!    and parsed into candidates
//! 2. **Dedup**: repeats inside the batch collapse, then stored URLs and
//!    titles are dropped
//! 3. **Enrichment**: detail pages are fetched a few at a time, each under a
//!    timeout
//! 4. **Handoff**: articles with content are inserted as one batch and,
//!    on interactive runs, exported to JSON Lines and CSV

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dedup;
mod enrich;
mod error;
mod extract;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod recency;
mod records;
mod store;
#[cfg(test)]
mod testing;
mod utils;

use cli::Cli;
use config::{ExecutionProfile, FileConfig, PipelineConfig, SourceConfig, StoreConfig};
use fetch::CompositeFetcher;
use fetch::direct::DirectFetcher;
use fetch::render::RenderingClient;
use outputs::summary::{log_run_summary, log_store_stats};
use pipeline::{Pipeline, RunOutcome};
use store::PersistenceGateway;
use store::supabase::SupabaseGateway;

/// Sources in precedence order: CLI flags, config file, built-in defaults.
fn resolve_sources(args: &Cli, file: &FileConfig) -> Vec<SourceConfig> {
    let label = file
        .source_label
        .clone()
        .unwrap_or_else(|| config::DEFAULT_SOURCE_LABEL.to_string());

    if !args.sources.is_empty() {
        return args
            .sources
            .iter()
            .map(|url| SourceConfig::new(url.as_str(), label.as_str()))
            .collect();
    }
    if !file.sources.is_empty() {
        return file.sources.clone();
    }
    SourceConfig::defaults(&label)
}

fn pipeline_config(
    args: &Cli,
    file: &FileConfig,
    profile: ExecutionProfile,
) -> error::Result<PipelineConfig> {
    let mut config = PipelineConfig::for_profile(profile, resolve_sources(args, file))?;
    config.max_hours = args.max_hours;
    config.max_articles = args.max_articles;
    config.freshness_filter = args.freshness_filter;
    if let Some(concurrency) = args.concurrency {
        config.enrichment.concurrency = concurrency;
    }
    if let Some(industry) = &file.default_industry {
        config.default_industry = industry.clone();
    }
    Ok(config)
}

/// Whether a finished run should end the process with a failure status.
///
/// Only a failed run under the automated profile does; `NO_DATA` never does.
fn run_failed(outcome: RunOutcome, profile: ExecutionProfile) -> bool {
    outcome == RunOutcome::Failed && profile.is_automated()
}

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let profile = args.profile.resolve(ExecutionProfile::from_process_env);
    info!(?profile, "finance_news_crawler starting up");

    let file_config = match &args.config {
        Some(path) => match FileConfig::load(path).await {
            Ok(c) => c,
            Err(e) => {
                error!(path = %path, error = %e, "Could not load config file");
                return Ok(ExitCode::FAILURE);
            }
        },
        None => FileConfig::default(),
    };

    // ---- Storage configuration and readiness: fatal before any stage ----
    let store_config = match StoreConfig::from_parts(
        args.supabase_url.as_deref(),
        args.supabase_key.as_deref(),
        &args.table,
    ) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Storage is not configured");
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(url = %store_config.url, table = %store_config.table, "Using store");

    let gateway = Arc::new(SupabaseGateway::new(store_config)?);
    if let Err(e) = gateway.check_ready().await {
        error!(error = %e, table = %gateway.table(), "Store readiness check failed");
        return Ok(ExitCode::FAILURE);
    }

    let config = match pipeline_config(&args, &file_config, profile) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid pipeline configuration");
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(
        sources = config.sources.len(),
        concurrency = config.enrichment.concurrency,
        task_timeout_s = config.enrichment.task_timeout.as_secs(),
        max_articles = ?config.max_articles,
        freshness_filter = config.freshness_filter,
        "Pipeline configured"
    );

    // ---- Fetchers ----
    let renderer = match args.browserless_url.as_deref() {
        Some(url) => Some(RenderingClient::new(url, args.browserless_token.as_deref(), profile)?),
        None => {
            warn!("No rendering engine configured; listing pages use direct fetches only");
            None
        }
    };
    let fetcher = Arc::new(CompositeFetcher::new(renderer, DirectFetcher::new(profile)?));

    // ---- Run ----
    let pipeline = Pipeline::new(fetcher, gateway.clone(), config);
    let report = pipeline.run().await;
    log_run_summary(&report, &pipeline.config().sources);

    // ---- Interactive extras ----
    if profile.exports_locally() && report.outcome == RunOutcome::Success {
        match gateway.stats().await {
            Ok(stats) => log_store_stats(&stats),
            Err(e) => warn!(error = %e, "Could not read store statistics"),
        }
        if args.no_export {
            info!("Local export disabled");
        } else if let Err(e) = outputs::export_local(&report.handoff, &args.output_dir).await {
            warn!(path = %args.output_dir, error = %e, "Local export failed");
        }
    }

    if run_failed(report.outcome, profile) {
        error!(outcome = %report.outcome, "Run failed in automated context");
        return Ok(ExitCode::FAILURE);
    }
    info!(outcome = %report.outcome, "Done");
    Ok(ExitCode::SUCCESS)
}
