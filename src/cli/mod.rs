//! CLI module for the bgswap library
//!
//! This module is only available when the "cli" feature is enabled. It is
//! the in-process stand-in for a serving layer: it validates arguments,
//! builds the process-scoped segmentation handle once, and drives a single
//! pipeline run.

use crate::artifact::ArtifactStore;
use crate::backends::{RemoteBackend, SegmentationBackend};
use crate::config::{MatteOptions, OutputFormat, PipelineConfig};
use crate::pipeline::BackgroundSwapPipeline;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Segmentation backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Remote HTTP segmentation service
    Remote,
    /// Local ONNX model through Tract (requires --model)
    Tract,
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpeg => Self::Jpeg,
        }
    }
}

/// Replace the background of a portrait image
#[derive(Debug, Parser)]
#[command(name = "bgswap", version, about)]
pub struct Cli {
    /// Input image (JPEG or PNG)
    pub input: PathBuf,

    /// Replacement background image
    #[arg(short, long, default_value = "static/default_background.png")]
    pub background: PathBuf,

    /// Directory for persisted composites
    #[arg(short, long, default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Segmentation backend
    #[arg(long, value_enum, default_value_t = BackendKind::Remote)]
    pub backend: BackendKind,

    /// API key for the remote backend
    #[arg(long, env = "REMOVE_BG_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Override the remote service endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Remote request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// ONNX model path for the tract backend
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Skip trimap-based alpha matting refinement
    #[arg(long)]
    pub no_refine: bool,

    /// Definite-foreground alpha threshold (0-255)
    #[arg(long, default_value_t = 240)]
    pub foreground_threshold: u8,

    /// Definite-background alpha threshold (0-255)
    #[arg(long, default_value_t = 10)]
    pub background_threshold: u8,

    /// Erosion radius applied to both definite trimap regions
    #[arg(long, default_value_t = 10)]
    pub erode_size: u32,

    /// Output format
    #[arg(long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 90)]
    pub jpeg_quality: u8,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// CLI entry point
///
/// # Errors
/// - Invalid arguments or configuration
/// - Pipeline failures (decode, extraction, compositing, persistence)
pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli).await
}

/// Execute one pipeline run for the parsed arguments
async fn run(cli: Cli) -> anyhow::Result<()> {
    let matte = MatteOptions::builder()
        .refine(!cli.no_refine)
        .foreground_threshold(cli.foreground_threshold)
        .background_threshold(cli.background_threshold)
        .erode_size(cli.erode_size)
        .build()?;
    let config = PipelineConfig::builder()
        .matte(matte)
        .output_format(cli.format.into())
        .jpeg_quality(cli.jpeg_quality)
        .build()?;

    let backend = build_backend(&cli)?;
    let pipeline = BackgroundSwapPipeline::new(
        backend,
        config,
        ArtifactStore::new(&cli.output_dir)?,
    );

    let source = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("failed to read input '{}'", cli.input.display()))?;

    let artifact = pipeline
        .run_with_background_path(&source, &cli.background)
        .await?;

    println!("{}", pipeline.store().path_for(&artifact).display());
    Ok(())
}

/// Construct the process-scoped segmentation handle
fn build_backend(cli: &Cli) -> anyhow::Result<Arc<dyn SegmentationBackend>> {
    match cli.backend {
        BackendKind::Remote => {
            let api_key = cli
                .api_key
                .clone()
                .context("remote backend requires --api-key or REMOVE_BG_API_KEY")?;
            let mut builder =
                RemoteBackend::builder(api_key).timeout(Duration::from_secs(cli.timeout));
            if let Some(ref endpoint) = cli.endpoint {
                builder = builder.endpoint(endpoint.clone());
            }
            Ok(Arc::new(builder.build()?))
        },
        #[cfg(feature = "tract")]
        BackendKind::Tract => {
            let model = cli
                .model
                .as_ref()
                .context("tract backend requires --model")?;
            Ok(Arc::new(crate::backends::TractBackend::from_model_path(
                model,
            )?))
        },
        #[cfg(not(feature = "tract"))]
        BackendKind::Tract => {
            anyhow::bail!("this binary was built without the `tract` feature")
        },
    }
}

/// Initialize the tracing subscriber for CLI output
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
