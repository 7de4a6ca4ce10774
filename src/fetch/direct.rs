//! Direct HTTP fetching, used as the listing fallback and for detail pages.

use crate::config::ExecutionProfile;
use crate::error::{Error, Result};
use crate::fetch::PageKind;
use crate::utils::{Jitter, random_browser_headers};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// GETs pages with browser-like headers, a fresh user agent per request,
/// and a profile-dependent timeout.
///
/// Listing requests wait a random 1-3 s first. Detail requests do not: the
/// enrichment scheduler paces those itself so the delay counts against the
/// per-task timeout.
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    client: reqwest::Client,
    listing_timeout: Duration,
    detail_timeout: Duration,
    listing_jitter: Jitter,
}

impl DirectFetcher {
    pub fn new(profile: ExecutionProfile) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            client,
            listing_timeout: profile.listing_fetch_timeout(),
            detail_timeout: profile.detail_fetch_timeout(),
            listing_jitter: Jitter::listing(),
        })
    }

    #[cfg(test)]
    pub fn with_listing_jitter(mut self, jitter: Jitter) -> Self {
        self.listing_jitter = jitter;
        self
    }

    fn timeout_for(&self, kind: PageKind) -> Duration {
        match kind {
            PageKind::Listing => self.listing_timeout,
            PageKind::Detail => self.detail_timeout,
        }
    }

    #[instrument(level = "debug", skip(self), fields(?kind))]
    pub async fn get(&self, url: &str, kind: PageKind) -> Result<String> {
        if kind == PageKind::Listing {
            self.listing_jitter.wait().await;
        }

        let timeout = self.timeout_for(kind);
        let response = self
            .client
            .get(url)
            .headers(random_browser_headers())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| describe(url, e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Direct fetch returned error status");
            return Err(Error::fetch(url, format!("status {}", status.as_u16())));
        }

        let body = response.text().await.map_err(|e| describe(url, e, timeout))?;
        debug!(%url, bytes = body.len(), "Direct fetch succeeded");
        Ok(body)
    }
}

fn describe(url: &str, e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::fetch(url, format!("timed out after {}s", timeout.as_secs()))
    } else {
        Error::fetch(url, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_follow_profile() {
        let local = DirectFetcher::new(ExecutionProfile::Interactive).unwrap();
        assert_eq!(local.timeout_for(PageKind::Listing), Duration::from_secs(15));
        assert_eq!(local.timeout_for(PageKind::Detail), Duration::from_secs(10));

        let ci = DirectFetcher::new(ExecutionProfile::Automated).unwrap();
        assert_eq!(ci.timeout_for(PageKind::Listing), Duration::from_secs(20));
        assert_eq!(ci.timeout_for(PageKind::Detail), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let fetcher = DirectFetcher::new(ExecutionProfile::Interactive)
            .unwrap()
            .with_listing_jitter(Jitter::none());
        let err = fetcher
            .get("http://127.0.0.1:9/listing", PageKind::Listing)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }
}
