//! Headless-browser rendering for JavaScript-driven listing pages.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Element whose presence marks the listing content as rendered.
pub const CONTENT_MARKER: &str = "table tr td";

const MARKER_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum RenderError {
    /// No usable browser; callers fall back to plain HTTP.
    #[error("rendering unavailable: {0}")]
    Unavailable(String),
    #[error("rendering failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Navigate to `url` and return the DOM serialized as HTML.
    async fn render_page(&self, url: &str, wait: Duration) -> Result<String, RenderError>;
}

/// Renderer used when no browser should be launched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn render_page(&self, _url: &str, _wait: Duration) -> Result<String, RenderError> {
        Err(RenderError::Unavailable("browser rendering disabled".to_string()))
    }
}

/// Locate a Chromium/Chrome executable.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("FOA_CHROMIUM_PATH") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

/// Launches a fresh headless Chromium per page.
#[derive(Debug, Clone, Default)]
pub struct ChromiumRenderer {
    executable: Option<PathBuf>,
}

impl ChromiumRenderer {
    pub fn detect() -> Self {
        Self {
            executable: find_chromium(),
        }
    }

    pub fn with_executable(path: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(path.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.executable.is_some()
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render_page(&self, url: &str, wait: Duration) -> Result<String, RenderError> {
        let executable = self
            .executable
            .clone()
            .ok_or_else(|| RenderError::Unavailable("Chromium not found".to_string()))?;

        info!(url, "launching headless Chromium");
        let session = BrowserSession::launch(executable).await?;
        let result = session.render(url, wait).await;
        session.close().await;

        let html = result?;
        info!(url, chars = html.len(), "rendered page");
        Ok(html)
    }
}

/// Exclusively owned browser process plus its CDP event pump.
///
/// Dropping the session aborts the pump and drops the `Browser`, which kills
/// the child process, so every exit path tears the browser down.
struct BrowserSession {
    browser: Option<Browser>,
    _handler: HandlerGuard,
}

/// Aborts the CDP event pump task when dropped.
struct HandlerGuard(JoinHandle<()>);

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl BrowserSession {
    async fn launch(executable: PathBuf) -> Result<Self, RenderError> {
        let config = BrowserConfig::builder()
            .chrome_executable(executable)
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--window-size=1920,1080")
            .arg("--log-level=3")
            .build()
            .map_err(RenderError::Unavailable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Unavailable(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            _handler: HandlerGuard(handler),
        })
    }

    async fn render(&self, url: &str, wait: Duration) -> Result<String, RenderError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| RenderError::Failed("browser already closed".to_string()))?;

        let page = browser
            .new_page(url)
            .await
            .map_err(|e| RenderError::Failed(format!("navigation failed: {e}")))?;

        if !await_marker_or_flat_wait(wait, wait_for_marker(&page)).await {
            debug!(url, "content marker never appeared");
        }

        page.content()
            .await
            .map_err(|e| RenderError::Failed(format!("reading page content failed: {e}")))
    }

    async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(err) = browser.close().await {
                debug!(error = %err, "browser close failed");
            }
            let _ = browser.wait().await;
        }
    }
}

/// Wait up to `wait` for `marker`; on timeout wait a flat `wait` once more.
/// Returns whether the marker resolved.
async fn await_marker_or_flat_wait<F>(wait: Duration, marker: F) -> bool
where
    F: Future<Output = ()>,
{
    if tokio::time::timeout(wait, marker).await.is_ok() {
        return true;
    }
    warn!(marker = CONTENT_MARKER, "timed out waiting for content; using flat wait");
    tokio::time::sleep(wait).await;
    false
}

async fn wait_for_marker(page: &Page) {
    loop {
        if page.find_element(CONTENT_MARKER).await.is_ok() {
            return;
        }
        tokio::time::sleep(MARKER_POLL).await;
    }
}
