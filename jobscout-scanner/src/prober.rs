use crate::error::{Result, ScanError};
use crate::result::FetchedPage;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, redirect};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_REDIRECTS: usize = 5;

/// One bounded HTTP GET. Implemented by [`Prober`] and by in-process fakes
/// in tests.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

pub struct Prober {
    client: Client,
    timeout: Duration,
}

impl Prober {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB,en;q=0.9"));

        let client = Client::builder()
            .user_agent(concat!(
                "Mozilla/5.0 (compatible; jobscout/",
                env!("CARGO_PKG_VERSION"),
                "; +https://github.com/trapdoorsec/jobscout)"
            ))
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url`, following redirects. Succeeds on a final 2xx/3xx status
    /// with a non-empty body.
    pub async fn probe(&self, url: &str) -> Result<FetchedPage> {
        let parsed =
            Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;

        debug!("Probing {}", url);
        let start = Instant::now();
        let response = self.client.get(parsed).send().await?;
        let response_time = start.elapsed();

        let status = response.status();
        let final_url = response.url().to_string();
        if !(status.is_success() || status.is_redirection()) {
            return Err(ScanError::BadStatus {
                url: final_url,
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(ScanError::EmptyBody(final_url));
        }

        debug!(
            "{} answered {} in {}ms ({} bytes)",
            final_url,
            status.as_u16(),
            response_time.as_millis(),
            body.len()
        );

        Ok(FetchedPage {
            requested_url: url.to_string(),
            url: final_url,
            status_code: status.as_u16(),
            content_type,
            response_time,
            body,
        })
    }
}

#[async_trait]
impl Fetch for Prober {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.probe(url).await
    }
}

/// Tries candidates in order and returns the first that answers. Network
/// failures move on to the next candidate; any other failure stops the scan.
pub async fn first_reachable<F: Fetch + ?Sized>(
    fetcher: &F,
    candidates: &[String],
) -> Result<Option<FetchedPage>> {
    for candidate in candidates {
        match fetcher.fetch(candidate).await {
            Ok(page) => {
                info!("Reached {} via {}", page.url, candidate);
                return Ok(Some(page));
            }
            Err(e) if e.is_network() => {
                debug!("Candidate {} unreachable: {}", candidate, e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}
