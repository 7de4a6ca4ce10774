//! Run configuration: execution profile, sources, and pipeline settings.
//!
//! The [`ExecutionProfile`] is decided once in `main` (from the CLI or the
//! environment) and handed to everything whose defaults depend on it. Nothing
//! below `main` inspects the process environment.

use crate::enrich::EnrichmentSettings;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Listing pages crawled when neither the CLI nor a config file names any.
pub const DEFAULT_SOURCE_URLS: &[&str] = &[
    "https://finance.yahoo.com/topic/latest-news/",
    "https://finance.yahoo.com/news/",
    "https://finance.yahoo.com/topic/tech/",
];

pub const DEFAULT_SOURCE_LABEL: &str = "Yahoo Finance";
pub const DEFAULT_INDUSTRY: &str = "Financial News";
pub const DEFAULT_TABLE: &str = "news_items";
pub const DEFAULT_MAX_HOURS: u32 = 2;

/// Environment variables set by common CI runners.
const CI_INDICATORS: &[&str] = &[
    "GITHUB_ACTIONS",
    "CI",
    "CONTINUOUS_INTEGRATION",
    "GITLAB_CI",
    "JENKINS_URL",
];

/// Whether the run is unattended (CI, scheduled job) or driven by a person.
///
/// Automated runs are gentler on the target site (fewer concurrent requests)
/// and more patient (longer timeouts) because CI runners sit on slower,
/// more heavily rate-limited networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProfile {
    Interactive,
    Automated,
}

impl ExecutionProfile {
    /// Decide the profile from an environment lookup.
    ///
    /// Any CI indicator holding a non-empty value other than `false`/`0`
    /// selects [`ExecutionProfile::Automated`].
    pub fn detect<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let automated = CI_INDICATORS.iter().any(|name| {
            lookup(name).is_some_and(|v| {
                let v = v.trim();
                !v.is_empty() && !v.eq_ignore_ascii_case("false") && v != "0"
            })
        });
        if automated {
            ExecutionProfile::Automated
        } else {
            ExecutionProfile::Interactive
        }
    }

    pub fn from_process_env() -> Self {
        Self::detect(|name| std::env::var(name).ok())
    }

    pub fn is_automated(self) -> bool {
        self == ExecutionProfile::Automated
    }

    pub fn enrichment_concurrency(self) -> usize {
        match self {
            ExecutionProfile::Interactive => 5,
            ExecutionProfile::Automated => 3,
        }
    }

    /// Upper bound on one candidate's jitter, fetch, and parse.
    pub fn enrichment_task_timeout(self) -> Duration {
        match self {
            ExecutionProfile::Interactive => Duration::from_secs(15),
            ExecutionProfile::Automated => Duration::from_secs(20),
        }
    }

    pub fn listing_fetch_timeout(self) -> Duration {
        match self {
            ExecutionProfile::Interactive => Duration::from_secs(15),
            ExecutionProfile::Automated => Duration::from_secs(20),
        }
    }

    pub fn detail_fetch_timeout(self) -> Duration {
        match self {
            ExecutionProfile::Interactive => Duration::from_secs(10),
            ExecutionProfile::Automated => Duration::from_secs(15),
        }
    }

    /// Local JSON/CSV export only makes sense where someone will read it.
    pub fn exports_locally(self) -> bool {
        self == ExecutionProfile::Interactive
    }
}

/// One listing page to crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_label() -> String {
    DEFAULT_SOURCE_LABEL.to_string()
}

impl SourceConfig {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }

    /// The built-in listing pages, all tagged with `label`.
    pub fn defaults(label: &str) -> Vec<Self> {
        DEFAULT_SOURCE_URLS
            .iter()
            .map(|url| Self::new(*url, label))
            .collect()
    }
}

/// Optional YAML file overriding the built-in source list and labels.
///
/// ```yaml
/// source_label: Yahoo Finance
/// default_industry: Financial News
/// sources:
///   - url: https://finance.yahoo.com/news/
///   - url: https://finance.yahoo.com/topic/tech/
///     label: Yahoo Finance Tech
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    pub source_label: Option<String>,
    pub default_industry: Option<String>,
}

impl FileConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_yaml(&text)?;
        info!(sources = config.sources.len(), "Loaded config file");
        Ok(config)
    }
}

/// Connection parameters for the news table.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: String,
    pub key: String,
    pub table: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("key", &format_args!("<{} chars>", self.key.len()))
            .field("table", &self.table)
            .finish()
    }
}

impl StoreConfig {
    /// Build from optional parts; both the URL and key are required.
    pub fn from_parts(url: Option<&str>, key: Option<&str>, table: &str) -> Result<Self> {
        let url = url.map(str::trim).filter(|s| !s.is_empty());
        let key = key.map(str::trim).filter(|s| !s.is_empty());
        let missing: Vec<&str> = [("SUPABASE_URL", url.is_none()), ("SUPABASE_ANON_KEY", key.is_none())]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
        if let (Some(url), Some(key)) = (url, key) {
            let table = if table.trim().is_empty() { DEFAULT_TABLE } else { table.trim() };
            return Ok(Self {
                url: url.trim_end_matches('/').to_string(),
                key: key.to_string(),
                table: table.to_string(),
            });
        }
        Err(Error::Configuration(format!(
            "missing required storage settings: {}",
            missing.join(", ")
        )))
    }
}

/// Everything the orchestrator needs for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Crawled in this order; at least one.
    pub sources: Vec<SourceConfig>,
    pub max_hours: u32,
    /// Cap on candidates sent to enrichment; `None` is unbounded.
    pub max_articles: Option<usize>,
    /// Drop phase-1 survivors whose listing time falls outside `max_hours`.
    pub freshness_filter: bool,
    pub enrichment: EnrichmentSettings,
    pub default_industry: String,
}

impl PipelineConfig {
    /// Defaults for `profile` crawling `sources`.
    pub fn for_profile(profile: ExecutionProfile, sources: Vec<SourceConfig>) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::Configuration("no source URLs configured".to_string()));
        }
        Ok(Self {
            sources,
            max_hours: DEFAULT_MAX_HOURS,
            max_articles: None,
            freshness_filter: false,
            enrichment: EnrichmentSettings::for_profile(profile),
            default_industry: DEFAULT_INDUSTRY.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_detect_interactive_by_default() {
        assert_eq!(ExecutionProfile::detect(env(&[])), ExecutionProfile::Interactive);
    }

    #[test]
    fn test_detect_ci_indicators() {
        assert_eq!(
            ExecutionProfile::detect(env(&[("GITHUB_ACTIONS", "true")])),
            ExecutionProfile::Automated
        );
        assert_eq!(
            ExecutionProfile::detect(env(&[("JENKINS_URL", "http://ci.local")])),
            ExecutionProfile::Automated
        );
        assert_eq!(
            ExecutionProfile::detect(env(&[("CI", "false"), ("GITLAB_CI", "")])),
            ExecutionProfile::Interactive
        );
    }

    #[test]
    fn test_profile_defaults() {
        let local = ExecutionProfile::Interactive;
        let ci = ExecutionProfile::Automated;
        assert_eq!(local.enrichment_concurrency(), 5);
        assert_eq!(ci.enrichment_concurrency(), 3);
        assert!(ci.enrichment_task_timeout() > local.enrichment_task_timeout());
        assert!(ci.detail_fetch_timeout() > local.detail_fetch_timeout());
        assert!(local.exports_locally());
        assert!(!ci.exports_locally());
    }

    #[tokio::test]
    async fn test_file_config_load_failures() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileConfig::load(dir.path().join("missing.yaml")).await.is_err());

        let bad = dir.path().join("bad.yaml");
        tokio::fs::write(&bad, "sources: [unclosed").await.unwrap();
        assert!(FileConfig::load(&bad).await.is_err());

        let good = dir.path().join("good.yaml");
        tokio::fs::write(&good, "source_label: Wire\n").await.unwrap();
        let config = FileConfig::load(&good).await.unwrap();
        assert_eq!(config.source_label.as_deref(), Some("Wire"));
    }

    #[test]
    fn test_file_config_parsing() {
        let yaml = r#"
source_label: Example Wire
default_industry: Markets
sources:
  - url: https://example.com/news/
  - url: https://example.com/tech/
    label: Example Tech
"#;
        let config = FileConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].label, DEFAULT_SOURCE_LABEL);
        assert_eq!(config.sources[1].label, "Example Tech");
        assert_eq!(config.source_label.as_deref(), Some("Example Wire"));
        assert_eq!(config.default_industry.as_deref(), Some("Markets"));
    }

    #[test]
    fn test_store_config_requires_url_and_key() {
        let err = StoreConfig::from_parts(None, Some("key"), "news_items").unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("SUPABASE_URL")));

        let err = StoreConfig::from_parts(Some("https://x.supabase.co"), Some("  "), "").unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("SUPABASE_ANON_KEY")));

        let ok = StoreConfig::from_parts(Some("https://x.supabase.co/"), Some("key"), "").unwrap();
        assert_eq!(ok.url, "https://x.supabase.co");
        assert_eq!(ok.table, DEFAULT_TABLE);
    }

    #[test]
    fn test_store_config_debug_hides_key() {
        let config = StoreConfig::from_parts(Some("https://x.supabase.co"), Some("secret-key"), "t").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_pipeline_config_requires_sources() {
        assert!(PipelineConfig::for_profile(ExecutionProfile::Interactive, vec![]).is_err());
        let config =
            PipelineConfig::for_profile(ExecutionProfile::Automated, SourceConfig::defaults(DEFAULT_SOURCE_LABEL)).unwrap();
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.enrichment.concurrency, 3);
        assert!(!config.freshness_filter);
        assert_eq!(config.max_hours, 2);
    }
}
