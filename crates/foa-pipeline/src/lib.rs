//! Single-URL extraction run: select a source, load the page, build the
//! record, tag it and export it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use foa_adapters::{ingest, SourceRegistry};
use foa_core::FundingOpportunity;
use foa_export::{export_all, ExportFormat};
use foa_fetch::{
    BackoffPolicy, ChromiumRenderer, HttpClientConfig, HttpFetcher, NoopRenderer, PageLoader,
    Renderer, DEFAULT_RENDER_WAIT, DEFAULT_TIMEOUT,
};
use foa_tagger::{Classifier, ClassifierConfig, DEFAULT_THRESHOLD};
use serde::Serialize;
use tracing::{debug, info};

pub const CRATE_NAME: &str = "foa-pipeline";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub out_dir: PathBuf,
    pub format: ExportFormat,
    pub user_agent: Option<String>,
    pub http_timeout_secs: u64,
    pub render_wait_secs: u64,
    pub render_enabled: bool,
    pub nlp_enabled: bool,
    pub tfidf_threshold: f64,
    pub backoff: BackoffPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("./out"),
            format: ExportFormat::All,
            user_agent: None,
            http_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            render_wait_secs: DEFAULT_RENDER_WAIT.as_secs(),
            render_enabled: true,
            nlp_enabled: true,
            tfidf_threshold: DEFAULT_THRESHOLD,
            backoff: BackoffPolicy::default(),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True" | "yes")
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset or unparseable values keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            out_dir: lookup("FOA_OUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.out_dir),
            format: defaults.format,
            user_agent: lookup("FOA_USER_AGENT").filter(|v| !v.trim().is_empty()),
            http_timeout_secs: lookup("FOA_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
            render_wait_secs: lookup("FOA_RENDER_WAIT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.render_wait_secs),
            render_enabled: lookup("FOA_RENDER_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.render_enabled),
            nlp_enabled: lookup("FOA_NLP_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.nlp_enabled),
            tfidf_threshold: lookup("FOA_TFIDF_THRESHOLD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tfidf_threshold),
            backoff: defaults.backoff,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub opportunity: FundingOpportunity,
    pub exported: Vec<PathBuf>,
}

pub struct Pipeline {
    config: PipelineConfig,
    registry: SourceRegistry,
    loader: PageLoader,
    classifier: Classifier,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let renderer: Arc<dyn Renderer> = if config.render_enabled {
            let chromium = ChromiumRenderer::detect();
            if !chromium.is_available() {
                info!("no Chromium executable found; pages will be fetched without rendering");
            }
            Arc::new(chromium)
        } else {
            Arc::new(NoopRenderer)
        };
        Self::with_renderer(config, renderer)
    }

    pub fn with_renderer(config: PipelineConfig, renderer: Arc<dyn Renderer>) -> Result<Self> {
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: config.user_agent.clone(),
            backoff: config.backoff,
        })?;
        let loader = PageLoader::new(
            renderer,
            http,
            Duration::from_secs(config.render_wait_secs),
        );
        let classifier = Classifier::new(ClassifierConfig {
            use_vector_pass: config.nlp_enabled,
            threshold: config.tfidf_threshold,
        });
        Ok(Self {
            config,
            registry: SourceRegistry::default(),
            loader,
            classifier,
        })
    }

    pub fn with_registry(mut self, registry: SourceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extract and tag without writing anything.
    pub async fn extract(&self, url: &str) -> Result<FundingOpportunity> {
        let mut opportunity = ingest(&self.registry, &self.loader, url).await?;
        info!(
            foa_id = %opportunity.foa_id,
            title = %opportunity.title,
            agency = %opportunity.agency,
            "extracted opportunity"
        );

        let tags = self
            .classifier
            .classify(&opportunity.title, &opportunity.description);
        opportunity.set_tags(tags);
        info!(tags = ?opportunity.tags, "applied tags");
        Ok(opportunity)
    }

    pub async fn run_once(&self, url: &str) -> Result<RunSummary> {
        info!(
            url,
            out_dir = %self.config.out_dir.display(),
            format = ?self.config.format,
            nlp = self.config.nlp_enabled,
            "starting extraction"
        );
        let opportunity = self.extract(url).await?;
        let exported = export_all(&opportunity, &self.config.out_dir, self.config.format).await?;
        debug!(files = exported.len(), "export complete");
        Ok(RunSummary {
            opportunity,
            exported,
        })
    }
}

pub async fn run_once_from_env(url: &str) -> Result<RunSummary> {
    Pipeline::new(PipelineConfig::from_env())?.run_once(url).await
}
