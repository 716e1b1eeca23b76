use crate::{
    utils::{format_bytes, format_duration, validate_url},
    BatchOrchestrator, BrowserPool, CaptureOptions, CaptureOverrides, CapturePipeline,
    CaptureRequest, Config, ZipSink,
};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

#[derive(Parser)]
#[command(name = "webshot")]
#[command(about = "Pooled web page capture tool")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Browser pool size")]
    pub pool_size: Option<usize>,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a single URL to an image file
    Single {
        #[arg(short, long, help = "URL to capture")]
        url: String,

        #[arg(short, long, help = "Output file path")]
        output: PathBuf,

        #[arg(long, help = "Viewport width")]
        width: Option<u32>,

        #[arg(long, help = "Viewport height")]
        height: Option<u32>,

        #[arg(long, help = "Capture the full page instead of the viewport")]
        full_page: bool,

        #[arg(long, help = "Output format (png, jpeg, webp)")]
        format: Option<String>,

        #[arg(long, help = "JPEG quality (1-100)")]
        quality: Option<u8>,

        #[arg(long, help = "Navigation timeout in milliseconds")]
        timeout: Option<u64>,

        #[arg(long, help = "Named device profile (phone, tablet)")]
        device: Option<String>,
    },

    /// Capture a list of URLs into one ZIP archive
    Batch {
        #[arg(short, long, help = "Input file containing URLs (one per line)")]
        input: PathBuf,

        #[arg(short, long, help = "Output ZIP file path")]
        output: PathBuf,

        #[arg(short, long, help = "Concurrent captures per group")]
        concurrency: Option<usize>,

        #[arg(long, help = "Viewport width")]
        width: Option<u32>,

        #[arg(long, help = "Viewport height")]
        height: Option<u32>,

        #[arg(long, help = "Capture full pages")]
        full_page: bool,

        #[arg(long, help = "Output format (png, jpeg, webp)")]
        format: Option<String>,

        #[arg(long, help = "JPEG quality (1-100)")]
        quality: Option<u8>,

        #[arg(long, help = "Navigation timeout in milliseconds")]
        timeout: Option<u64>,

        #[arg(long, help = "Named device profile (phone, tablet)")]
        device: Option<String>,
    },
}

pub struct CliRunner {
    config: Config,
    pool: Arc<BrowserPool>,
    pipeline: Arc<CapturePipeline>,
}

impl CliRunner {
    pub fn new(config: Config) -> Self {
        let pool = Arc::new(BrowserPool::new(config.clone()));
        let pipeline = Arc::new(CapturePipeline::new(pool.clone()));
        Self {
            config,
            pool,
            pipeline,
        }
    }

    pub async fn run(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Single {
                url,
                output,
                width,
                height,
                full_page,
                format,
                quality,
                timeout,
                device,
            } => {
                let options = build_options(
                    width,
                    height,
                    full_page,
                    format.as_deref(),
                    quality,
                    timeout,
                    device,
                )?;
                self.run_single(url, output, options).await
            }
            Commands::Batch {
                input,
                output,
                concurrency,
                width,
                height,
                full_page,
                format,
                quality,
                timeout,
                device,
            } => {
                let options = build_options(
                    width,
                    height,
                    full_page,
                    format.as_deref(),
                    quality,
                    timeout,
                    device,
                )?;
                self.run_batch(input, output, concurrency, options).await
            }
        }
    }

    async fn run_single(
        &self,
        url: String,
        output: PathBuf,
        options: CaptureOptions,
    ) -> anyhow::Result<()> {
        validate_url(&url)?;
        let request = CaptureRequest::new(url, options);
        let result = self.pipeline.capture(&request).await?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&output, &result.data).await?;

        println!("Capture saved to {}", output.display());
        println!("  URL:      {}", result.url);
        println!("  Format:   {:?}", result.format);
        println!("  Size:     {}", format_bytes(result.byte_len()));
        println!("  Duration: {}", format_duration(result.duration));
        Ok(())
    }

    async fn run_batch(
        &self,
        input: PathBuf,
        output: PathBuf,
        concurrency: Option<usize>,
        options: CaptureOptions,
    ) -> anyhow::Result<()> {
        let urls = read_urls(&input).await?;
        if urls.is_empty() {
            bail!("no URLs found in {}", input.display());
        }
        info!("Loaded {} URLs from {}", urls.len(), input.display());

        let file = std::fs::File::create(&output)
            .with_context(|| format!("creating {}", output.display()))?;
        let mut sink = ZipSink::new(file);

        let orchestrator = BatchOrchestrator::with_concurrency(
            self.pipeline.clone(),
            concurrency.unwrap_or(self.config.batch_concurrency),
        );
        let summary = orchestrator.run(&urls, &options, &mut sink).await?;

        let stats = self.pool.stats().await;
        println!("Archive written to {}", output.display());
        println!(
            "  Entries: {} ({} ok, {} failed)",
            summary.total, summary.succeeded, summary.failed
        );
        println!(
            "  Pool:    {} total, {} available, {} busy",
            stats.total, stats.available, stats.busy
        );
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.pool.teardown().await;
    }
}

fn build_options(
    width: Option<u32>,
    height: Option<u32>,
    full_page: bool,
    format: Option<&str>,
    quality: Option<u8>,
    timeout_ms: Option<u64>,
    device_profile: Option<String>,
) -> anyhow::Result<CaptureOptions> {
    let format = match format {
        None => None,
        Some("png") => Some(crate::ImageFormat::Png),
        Some("jpeg") | Some("jpg") => Some(crate::ImageFormat::Jpeg),
        Some("webp") => Some(crate::ImageFormat::Webp),
        Some(other) => bail!("unsupported format '{other}' (png, jpeg, webp)"),
    };

    Ok(CaptureOptions::merge_defaults(&CaptureOverrides {
        width,
        height,
        full_page: full_page.then_some(true),
        format,
        quality,
        timeout_ms,
        device_profile,
        ..Default::default()
    }))
}

async fn read_urls(path: &PathBuf) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let mut urls = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        validate_url(line).with_context(|| format!("in {}", path.display()))?;
        urls.push(line.to_string());
    }
    Ok(urls)
}

pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}
