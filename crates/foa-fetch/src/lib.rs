//! HTTP fetch with retry/backoff and the render-then-fetch page loader.

pub mod render;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};

pub use render::{find_chromium, ChromiumRenderer, NoopRenderer, RenderError, Renderer};

pub const CRATE_NAME: &str = "foa-fetch";

pub const MAX_ATTEMPTS: usize = 3;
pub const BACKOFF_FACTOR: f64 = 1.5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RENDER_WAIT: Duration = Duration::from_secs(15);

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
            factor: BACKOFF_FACTOR,
        }
    }
}

impl BackoffPolicy {
    /// `base_delay * factor^attempt_index`, attempt index starting at 0.
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
        self.base_delay.mul_f64(self.factor.powi(exponent))
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub backoff: BackoffPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub final_url: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("failed to fetch {url} after {attempts} attempts: {last}")]
    ConnectionFailure {
        url: String,
        attempts: usize,
        #[source]
        last: Box<FetchError>,
    },
}

/// Browser-like request headers, with the user agent optionally replaced.
pub fn default_headers(user_agent: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let ua = user_agent
        .and_then(|ua| HeaderValue::from_str(ua).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers.insert(USER_AGENT, ua);
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
    headers
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    headers: HeaderMap,
    backoff: BackoffPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            headers: default_headers(config.user_agent.as_deref()),
            backoff: config.backoff,
        })
    }

    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// GET `url`, retrying any network error or non-success status.
    ///
    /// `headers` replaces the default browser headers when given.
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<FetchedPage, FetchError> {
        let headers = headers.unwrap_or(&self.headers);
        let max_attempts = self.backoff.max_attempts.max(1);
        let span = info_span!("http_fetch", url);

        async move {
            let mut last_error: Option<FetchError> = None;

            for attempt in 0..max_attempts {
                match self.fetch_once(url, headers).await {
                    Ok(page) => {
                        debug!(attempt = attempt + 1, bytes = page.body.len(), "fetched");
                        return Ok(page);
                    }
                    Err(err) => {
                        let delay = self.backoff.delay_for_attempt(attempt);
                        warn!(
                            attempt = attempt + 1,
                            max_attempts,
                            error = %err,
                            "request attempt failed; retrying in {:.1}s",
                            delay.as_secs_f64()
                        );
                        last_error = Some(err);
                        if attempt + 1 < max_attempts {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }

            Err(FetchError::ConnectionFailure {
                url: url.to_string(),
                attempts: max_attempts,
                last: Box::new(last_error.unwrap_or(FetchError::HttpStatus {
                    status: 0,
                    url: url.to_string(),
                })),
            })
        }
        .instrument(span)
        .await
    }

    async fn fetch_once(&self, url: &str, headers: &HeaderMap) -> Result<FetchedPage, FetchError> {
        let resp = self.client.get(url).headers(headers.clone()).send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let body = resp.text().await?;
        Ok(FetchedPage {
            status,
            final_url,
            body,
        })
    }
}

/// Obtains page HTML: browser rendering first, plain HTTP as the fallback.
#[derive(Clone)]
pub struct PageLoader {
    renderer: Arc<dyn Renderer>,
    http: HttpFetcher,
    render_wait: Duration,
}

impl PageLoader {
    pub fn new(renderer: Arc<dyn Renderer>, http: HttpFetcher, render_wait: Duration) -> Self {
        Self {
            renderer,
            http,
            render_wait,
        }
    }

    pub fn http(&self) -> &HttpFetcher {
        &self.http
    }

    /// Rendering failures of any kind are logged and absorbed; only a
    /// failure of the plain-HTTP fallback reaches the caller.
    pub async fn load(&self, url: &str) -> Result<String, FetchError> {
        match self.renderer.render_page(url, self.render_wait).await {
            Ok(html) => return Ok(html),
            Err(RenderError::Unavailable(reason)) => {
                warn!(url, %reason, "renderer unavailable; falling back to static HTML");
            }
            Err(err) => {
                warn!(url, error = %err, "rendering failed; falling back to static HTML");
            }
        }

        let page = self.http.fetch_with_retry(url, None).await?;
        Ok(page.body)
    }
}
