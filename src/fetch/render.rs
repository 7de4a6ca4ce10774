//! Rendering-engine client for listing pages.
//!
//! Talks to a Browserless instance over its `/content` HTTP API. The page is
//! loaded in headless Chromium, a script scrolls it one viewport-height at a
//! time so the infinite stream loads more items, and the resulting DOM is
//! returned as HTML.

use crate::config::ExecutionProfile;
use crate::error::{Error, Result};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Chromium flags needed inside CI containers.
const CONTAINER_BROWSER_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-web-security",
    "--disable-features=VizDisplayCompositor",
];

/// How the page is scrolled before its HTML is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollConfig {
    pub scroll_count: u32,
    pub wait_after_scroll: Duration,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            scroll_count: 15,
            wait_after_scroll: Duration::from_millis(1500),
        }
    }
}

impl ScrollConfig {
    /// Total time spent scrolling.
    pub fn duration(&self) -> Duration {
        self.wait_after_scroll * self.scroll_count
    }

    /// Script injected into the page that performs the scrolling.
    pub fn script(&self) -> String {
        format!(
            "(async () => {{ for (let i = 0; i < {count}; i++) {{ \
             window.scrollBy(0, document.documentElement.scrollHeight); \
             await new Promise(r => setTimeout(r, {wait})); }} }})();",
            count = self.scroll_count,
            wait = self.wait_after_scroll.as_millis(),
        )
    }
}

pub struct RenderingClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    scroll: ScrollConfig,
    page_timeout: Duration,
    browser_args: Vec<&'static str>,
}

impl RenderingClient {
    pub fn new(base_url: &str, token: Option<&str>, profile: ExecutionProfile) -> Result<Self> {
        let scroll = ScrollConfig::default();
        let page_timeout = Duration::from_secs(45);
        // the engine needs the page timeout plus the scrolling time; leave headroom
        let client = reqwest::Client::builder()
            .timeout(page_timeout + scroll.duration() + Duration::from_secs(15))
            .build()?;

        let browser_args = if profile.is_automated() {
            CONTAINER_BROWSER_ARGS.to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            scroll,
            page_timeout,
            browser_args,
        })
    }

    fn endpoint(&self) -> String {
        let mut params = Vec::new();
        if let Some(ref token) = self.token {
            params.push(format!("token={}", urlencoding::encode(token)));
        }
        if !self.browser_args.is_empty() {
            let launch = json!({ "headless": true, "args": self.browser_args });
            params.push(format!("launch={}", urlencoding::encode(&launch.to_string())));
        }
        if params.is_empty() {
            format!("{}/content", self.base_url)
        } else {
            format!("{}/content?{}", self.base_url, params.join("&"))
        }
    }

    fn request_body(&self, url: &str) -> serde_json::Value {
        json!({
            "url": url,
            "gotoOptions": {
                "waitUntil": "domcontentloaded",
                "timeout": self.page_timeout.as_millis() as u64,
            },
            "addScriptTag": [{ "content": self.scroll.script() }],
            "waitForTimeout": (self.scroll.duration() + Duration::from_secs(1)).as_millis() as u64,
            "setExtraHTTPHeaders": { "Cache-Control": "no-cache" },
        })
    }

    /// Fetch fully-rendered HTML for a URL after scrolling it.
    #[instrument(level = "info", skip(self))]
    pub async fn content(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&self.request_body(url))
            .send()
            .await
            .map_err(|e| Error::fetch(url, format!("rendering engine unreachable: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Rendering engine returned error status");
            return Err(Error::fetch(
                url,
                format!("rendering engine status {}: {}", status.as_u16(), message.trim()),
            ));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| Error::fetch(url, format!("reading rendered page: {e}")))?;
        debug!(bytes = html.len(), "Rendered page");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_defaults() {
        let scroll = ScrollConfig::default();
        assert_eq!(scroll.duration(), Duration::from_millis(22_500));
        let script = scroll.script();
        assert!(script.contains("i < 15"));
        assert!(script.contains("setTimeout(r, 1500)"));
    }

    #[test]
    fn test_endpoint_without_options() {
        let client =
            RenderingClient::new("http://localhost:3000/", None, ExecutionProfile::Interactive).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:3000/content");
    }

    #[test]
    fn test_endpoint_with_token_and_ci_args() {
        let client =
            RenderingClient::new("http://localhost:3000", Some("t&k"), ExecutionProfile::Automated).unwrap();
        let endpoint = client.endpoint();
        assert!(endpoint.starts_with("http://localhost:3000/content?token=t%26k&launch="));
        assert!(endpoint.contains("no-sandbox"));
    }

    #[test]
    fn test_request_body_carries_url_and_script() {
        let client =
            RenderingClient::new("http://localhost:3000", None, ExecutionProfile::Interactive).unwrap();
        let body = client.request_body("https://finance.yahoo.com/news/");
        assert_eq!(body["url"], "https://finance.yahoo.com/news/");
        assert_eq!(body["gotoOptions"]["timeout"], 45_000);
        assert_eq!(body["waitForTimeout"], 23_500);
        assert!(body["addScriptTag"][0]["content"].as_str().unwrap().contains("scrollBy"));
    }

    /// Serve one request, answering with a body shorter than its declared length.
    async fn serve_truncated_body(listener: tokio::net::TcpListener) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let declared = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if request.len() >= head_end + 4 + declared {
                    break;
                }
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 500\r\n\r\n<html><body>")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_rendered_body_is_fetch_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(serve_truncated_body(listener));

        let client = RenderingClient::new(&base, None, ExecutionProfile::Interactive).unwrap();
        let err = client.content("https://finance.yahoo.com/news/").await.unwrap_err();
        server.await.unwrap();

        match err {
            Error::Fetch { url, reason } => {
                assert_eq!(url, "https://finance.yahoo.com/news/");
                assert!(reason.contains("reading rendered page"), "{reason}");
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }
}
