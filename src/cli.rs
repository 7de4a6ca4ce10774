//! Command-line interface definitions for the crawler.
//!
//! Every option can also come from an environment variable, so scheduled
//! jobs can be configured without flags.

use crate::config::ExecutionProfile;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    /// Detect CI runners from the environment
    Auto,
    Interactive,
    Automated,
}

impl ProfileArg {
    /// Resolve to a concrete profile; `detect` is only consulted for `Auto`.
    pub fn resolve(self, detect: impl FnOnce() -> ExecutionProfile) -> ExecutionProfile {
        match self {
            ProfileArg::Auto => detect(),
            ProfileArg::Interactive => ExecutionProfile::Interactive,
            ProfileArg::Automated => ExecutionProfile::Automated,
        }
    }
}

/// Crawl finance news listings, enrich new articles, and store them.
///
/// # Examples
///
/// ```sh
/// # Default Yahoo Finance sources, credentials from the environment
/// finance_news_crawler
///
/// # Two explicit sources, at most 20 articles, no local export
/// finance_news_crawler --source https://finance.yahoo.com/news/ \
///     --source https://finance.yahoo.com/topic/tech/ --max-articles 20 --no-export
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Listing page to crawl (repeatable); overrides the config file's sources
    #[arg(short, long = "source", value_name = "URL")]
    pub sources: Vec<String>,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Freshness window in hours
    #[arg(long, env = "INPUT_MAX_HOURS", default_value_t = crate::config::DEFAULT_MAX_HOURS)]
    pub max_hours: u32,

    /// Maximum candidates to enrich per run (unbounded if unset)
    #[arg(long, env = "MAX_ARTICLES")]
    pub max_articles: Option<usize>,

    /// Enrichment concurrency (defaults to the profile's value)
    #[arg(long, env = "ENRICH_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Drop candidates whose listing time falls outside --max-hours
    #[arg(long)]
    pub freshness_filter: bool,

    /// Execution profile
    #[arg(long, value_enum, env = "EXECUTION_PROFILE", default_value_t = ProfileArg::Auto)]
    pub profile: ProfileArg,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase API key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Target table
    #[arg(long, env = "SUPABASE_TABLE_NAME", default_value = crate::config::DEFAULT_TABLE)]
    pub table: String,

    /// Browserless base URL for rendered listing fetches (direct fetches only if unset)
    #[arg(long, env = "BROWSERLESS_URL")]
    pub browserless_url: Option<String>,

    /// Browserless API token
    #[arg(long, env = "BROWSERLESS_TOKEN", hide_env_values = true)]
    pub browserless_token: Option<String>,

    /// Directory for local JSON Lines/CSV exports
    #[arg(short, long, default_value = ".")]
    pub output_dir: String,

    /// Skip local export even on interactive runs
    #[arg(long)]
    pub no_export: bool,
}
