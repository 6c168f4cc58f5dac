//! Polite HTTP fetching
//!
//! All page loads for a source go through one [`Fetcher`], which enforces a
//! minimum delay between consecutive requests. With the crawl queue draining
//! one task at a time this gives at most one in-flight request per source
//! and a bounded request rate, whatever the page graph looks like.

use crate::{GleanError, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Default minimum delay between requests to the same source
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(1000);

/// A successfully fetched page
#[derive(Debug)]
pub struct FetchedPage {
    /// Final URL after redirects, the base for resolving relative links
    pub url: Url,
    /// Decoded response body
    pub body: String,
}

/// Rate-limited HTTP client for a single source
pub struct Fetcher {
    client: Client,
    delay: Duration,
    last_request: Option<Instant>,
}

impl Fetcher {
    /// Builds a fetcher with the given user agent and inter-request delay
    pub fn new(user_agent: Option<&str>, delay: Duration) -> Result<Self> {
        let user_agent = match user_agent {
            Some(ua) => ua.to_string(),
            None => format!("gleaner/{}", env!("CARGO_PKG_VERSION")),
        };

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            delay,
            last_request: None,
        })
    }

    /// Fetches a page body as text, waiting out the politeness delay first
    ///
    /// Redirects are followed; the returned page carries the final URL.
    /// A non-2xx status is an error.
    pub async fn fetch_text(&mut self, url: &Url) -> Result<FetchedPage> {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }

        let result = self.request(url).await;
        self.last_request = Some(Instant::now());
        result
    }

    async fn request(&self, url: &Url) -> Result<FetchedPage> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| GleanError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(GleanError::HttpStatus {
                url: final_url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| GleanError::Http {
            url: final_url.to_string(),
            source,
        })?;

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }
}
