//! Source adapter contract, the two built-in adapters and the source registry.

pub mod grants_gov;
pub mod label;
pub mod nsf;

use async_trait::async_trait;
use foa_core::FundingOpportunity;
use foa_fetch::{FetchError, PageLoader};
use thiserror::Error;
use tracing::info;

pub use grants_gov::GrantsGovAdapter;
pub use label::{clean_text, LabelPattern, LabelResolver};
pub use nsf::NsfAdapter;

pub const CRATE_NAME: &str = "foa-adapters";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no ingestor registered for domain: {host}. Supported domains: {}", .supported.join(", "))]
    UnsupportedSource { host: String, supported: Vec<String> },
    #[error("cannot extract opportunity ID from URL: {url}")]
    IdentifierNotFound { url: String },
    #[error("source pattern already registered: {0}")]
    DuplicateSource(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ExtractError {
    /// The URL or registry is outside supported scope; retrying cannot help.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedSource { .. } | Self::IdentifierNotFound { .. } | Self::DuplicateSource(_)
        )
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;

    /// Identifier taken from the listing URL itself.
    fn resolve_identifier(&self, url: &str) -> Result<String, ExtractError>;

    /// Build the validated record from fetched or rendered HTML.
    fn parse_html(&self, html: &str, url: &str, identifier: &str) -> FundingOpportunity;

    async fn extract(
        &self,
        loader: &PageLoader,
        url: &str,
    ) -> Result<FundingOpportunity, ExtractError> {
        let identifier = self.resolve_identifier(url)?;
        let html = loader.load(url).await?;
        Ok(self.parse_html(&html, url, &identifier))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    GrantsGov,
    Nsf,
}

impl SourceKind {
    pub fn adapter(self) -> Box<dyn SourceAdapter> {
        match self {
            Self::GrantsGov => Box::new(GrantsGovAdapter),
            Self::Nsf => Box::new(NsfAdapter),
        }
    }
}

/// Ordered hostname-substring to source mapping; first match wins.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    entries: Vec<(String, SourceKind)>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self {
            entries: vec![
                ("grants.gov".to_string(), SourceKind::GrantsGov),
                ("nsf.gov".to_string(), SourceKind::Nsf),
            ],
        }
    }
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        host_pattern: impl Into<String>,
        kind: SourceKind,
    ) -> Result<(), ExtractError> {
        let host_pattern = host_pattern.into().to_ascii_lowercase();
        if self.entries.iter().any(|(p, _)| *p == host_pattern) {
            return Err(ExtractError::DuplicateSource(host_pattern));
        }
        self.entries.push((host_pattern, kind));
        Ok(())
    }

    pub fn patterns(&self) -> Vec<String> {
        self.entries.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn lookup(&self, url: &str) -> Result<SourceKind, ExtractError> {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .unwrap_or_default();

        self.entries
            .iter()
            .find(|(pattern, _)| !host.is_empty() && host.contains(pattern.as_str()))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| ExtractError::UnsupportedSource {
                host,
                supported: self.patterns(),
            })
    }

    pub fn adapter_for_url(&self, url: &str) -> Result<Box<dyn SourceAdapter>, ExtractError> {
        self.lookup(url).map(SourceKind::adapter)
    }
}

/// Select the adapter for `url` and extract its record.
pub async fn ingest(
    registry: &SourceRegistry,
    loader: &PageLoader,
    url: &str,
) -> Result<FundingOpportunity, ExtractError> {
    let adapter = registry.adapter_for_url(url)?;
    info!(source_id = adapter.source_id(), url, "using adapter");
    adapter.extract(loader, url).await
}
