//! # webshot
//!
//! Pooled web-page capture: renders arbitrary URLs into image bytes on
//! demand, one at a time or as a batch packaged into a single ZIP
//! archive.
//!
//! The crate is built around three layers:
//!
//! - [`BrowserPool`] — a fixed set of long-lived headless Chrome
//!   instances with acquire/release semantics and self-healing
//!   replacement of dead instances.
//! - [`CapturePipeline`] — one isolated render per request on a pooled
//!   instance, with unconditional cleanup on every exit path.
//! - [`BatchOrchestrator`] — ordered fan-out in bounded concurrent
//!   groups, streaming per-URL successes and failures into an
//!   [`ArchiveSink`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webshot::{BrowserPool, CaptureOptions, CapturePipeline, CaptureRequest, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = Arc::new(BrowserPool::new(Config::default()));
//!     let pipeline = CapturePipeline::new(pool.clone());
//!
//!     let request = CaptureRequest::new("https://example.com", CaptureOptions::default());
//!     let result = pipeline.capture(&request).await?;
//!     println!("Captured {} bytes", result.byte_len());
//!
//!     pool.teardown().await;
//!     Ok(())
//! }
//! ```

/// Configuration, capture options, and Chrome launch settings
pub mod config;

/// Error types
pub mod error;

/// Fixed-size pool of Chrome instances
pub mod browser_pool;

/// Per-request capture pipeline
pub mod capture;

/// Batch orchestration over an archive sink
pub mod batch;

/// Archive sink trait and ZIP implementation
pub mod archive;

/// Named device presets
pub mod profiles;

/// Command-line interface
pub mod cli;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use archive::{ArchiveSink, ZipSink};
pub use batch::{BatchOrchestrator, BatchSummary, DEFAULT_BATCH_CONCURRENCY};
pub use browser_pool::{BrowserInstance, BrowserPool, PageSession, PoolStats};
pub use capture::{CapturePipeline, Capturer};
pub use cli::{setup_logging, Cli, CliRunner, Commands};
pub use config::{
    browser_config, chrome_args, CaptureOptions, CaptureOverrides, CaptureRequest, CaptureResult,
    Config, ImageFormat, Viewport,
};
pub use error::CaptureError;
pub use profiles::{DeviceProfile, DESKTOP_USER_AGENT};
