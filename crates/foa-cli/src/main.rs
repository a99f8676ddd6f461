use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use foa_adapters::ExtractError;
use foa_export::ExportFormat;
use foa_pipeline::{Pipeline, PipelineConfig};
use tracing::{error, info};

const EXIT_INPUT: u8 = 1;
const EXIT_CONNECTION: u8 = 2;
const EXIT_UNEXPECTED: u8 = 3;

#[derive(Debug, Parser)]
#[command(name = "foa-extract")]
#[command(about = "Extract a funding opportunity announcement into JSON/CSV")]
struct Cli {
    /// Grants.gov or NSF opportunity URL.
    #[arg(long)]
    url: String,

    /// Output directory [default: ./out, or FOA_OUT_DIR].
    #[arg(long)]
    out_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FormatArg::All)]
    format: FormatArg,

    /// Keyword tagging only; skip TF-IDF similarity.
    #[arg(long)]
    no_nlp: bool,

    /// Never launch a headless browser.
    #[arg(long)]
    no_render: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Json,
    Csv,
    All,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Json => Self::Json,
            FormatArg::Csv => Self::Csv,
            FormatArg::All => Self::All,
        }
    }
}

impl Cli {
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(out_dir) = &self.out_dir {
            config.out_dir = out_dir.clone();
        }
        config.format = self.format.into();
        if self.no_nlp {
            config.nlp_enabled = false;
        }
        if self.no_render {
            config.render_enabled = false;
        }
        config
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ExtractError>() {
        Some(extract) if extract.is_input_error() => EXIT_INPUT,
        Some(ExtractError::Fetch(_)) => EXIT_CONNECTION,
        _ => EXIT_UNEXPECTED,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_INPUT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(cli.verbose);

    let config = cli.apply(PipelineConfig::from_env());
    let result = match Pipeline::new(config) {
        Ok(pipeline) => pipeline.run_once(&cli.url).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(summary) => {
            for path in &summary.exported {
                println!("{}", path.display());
            }
            info!(
                foa_id = %summary.opportunity.foa_id,
                files = summary.exported.len(),
                "extraction complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}
