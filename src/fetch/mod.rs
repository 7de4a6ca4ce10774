//! Page fetching strategies.
//!
//! Pages come from one of two strategies:
//!
//! | Mode | Implementation | Notes |
//! |------|----------------|-------|
//! | [`FetchMode::Primary`] | [`render::RenderingClient`] | Headless browser, scrolls to trigger lazy loading |
//! | [`FetchMode::Fallback`] | [`direct::DirectFetcher`] | Plain GET with browser headers and jitter |
//!
//! The pipeline only sees the [`SourceFetcher`] trait so tests can script
//! page responses without a network.

pub mod direct;
pub mod render;

use crate::error::{Error, Result};
use async_trait::async_trait;
use direct::DirectFetcher;
use render::RenderingClient;
use std::fmt;
use tracing::{debug, instrument};

/// Which strategy to fetch a page with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    Primary,
    Fallback,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Primary => f.write_str("primary"),
            FetchMode::Fallback => f.write_str("fallback"),
        }
    }
}

/// What kind of page is being fetched; drives timeouts and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Listing,
    Detail,
}

/// Returns raw page markup for a URL.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str, mode: FetchMode, kind: PageKind) -> Result<String>;
}

/// Dispatches each mode to its strategy.
///
/// The rendering engine is optional; without it every primary fetch fails
/// fast so callers move straight to the fallback.
pub struct CompositeFetcher {
    renderer: Option<RenderingClient>,
    direct: DirectFetcher,
}

impl CompositeFetcher {
    pub fn new(renderer: Option<RenderingClient>, direct: DirectFetcher) -> Self {
        Self { renderer, direct }
    }
}

#[async_trait]
impl SourceFetcher for CompositeFetcher {
    #[instrument(level = "debug", skip(self), fields(%mode))]
    async fn fetch(&self, url: &str, mode: FetchMode, kind: PageKind) -> Result<String> {
        let markup = match mode {
            FetchMode::Primary => match &self.renderer {
                Some(renderer) => renderer.content(url).await?,
                None => return Err(Error::fetch(url, "no rendering engine configured")),
            },
            FetchMode::Fallback => self.direct.get(url, kind).await?,
        };
        debug!(bytes = markup.len(), "Fetched page");
        Ok(markup)
    }
}
