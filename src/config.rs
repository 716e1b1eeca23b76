//! Configuration, capture options, and Chrome launch settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service-level configuration.
///
/// Controls the size of the browser pool, batch fan-out, and Chrome
/// launch behavior.
///
/// # Examples
///
/// ```rust
/// use webshot::Config;
///
/// let config = Config {
///     pool_size: 3,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Number of long-lived Chrome instances in the pool (default: 5).
    ///
    /// The pool is fixed-size for its whole lifetime; dead instances
    /// are replaced, never dropped.
    pub pool_size: usize,

    /// Concurrent captures per batch group (default: 3).
    ///
    /// Must be kept <= pool_size, otherwise captures inside one group
    /// will fail with pool exhaustion.
    pub batch_concurrency: usize,

    /// Path to Chrome/Chromium executable (default: auto-detect).
    pub chrome_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: 5,
            batch_concurrency: 3,
            chrome_path: None,
        }
    }
}

/// Viewport dimensions used for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Supported output image formats.
///
/// PNG and JPEG are encoded by Chrome directly; WebP is re-encoded
/// from the PNG capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }

    /// Quality only applies to lossy encodings.
    pub fn is_lossy(&self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }
}

/// Fully resolved rendering options for one capture.
///
/// Produced by [`CaptureOptions::merge_defaults`]; every field carries
/// an effective value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CaptureOptions {
    pub width: u32,
    pub height: u32,
    /// Explicit viewport; takes precedence over width/height when set.
    pub viewport: Option<Viewport>,
    pub full_page: bool,
    pub format: ImageFormat,
    pub quality: u8,
    pub timeout: Duration,
    /// Named device profile, looked up in the preset table. When unset,
    /// a profile is still selected if the dimensions exactly match a
    /// known preset.
    pub device_profile: Option<String>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            viewport: None,
            full_page: false,
            format: ImageFormat::Png,
            quality: 80,
            timeout: Duration::from_millis(30_000),
            device_profile: None,
        }
    }
}

impl CaptureOptions {
    /// Overlays the provided fields onto the fixed defaults.
    pub fn merge_defaults(overrides: &CaptureOverrides) -> Self {
        let defaults = Self::default();
        Self {
            width: overrides.width.unwrap_or(defaults.width),
            height: overrides.height.unwrap_or(defaults.height),
            viewport: overrides.viewport.or(defaults.viewport),
            full_page: overrides.full_page.unwrap_or(defaults.full_page),
            format: overrides.format.unwrap_or(defaults.format),
            quality: overrides.quality.unwrap_or(defaults.quality),
            timeout: overrides
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            device_profile: overrides.device_profile.clone(),
        }
    }

    /// Explicit viewport wins over the width/height pair.
    pub fn effective_viewport(&self) -> Viewport {
        self.viewport.unwrap_or(Viewport {
            width: self.width,
            height: self.height,
        })
    }
}

/// Partial options as supplied by callers; unset fields fall back to
/// the defaults during merging.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CaptureOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub viewport: Option<Viewport>,
    pub full_page: Option<bool>,
    pub format: Option<ImageFormat>,
    pub quality: Option<u8>,
    pub timeout_ms: Option<u64>,
    pub device_profile: Option<String>,
}

/// One capture request: a URL plus resolved options.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub id: String,
    pub url: String,
    pub options: CaptureOptions,
}

impl CaptureRequest {
    pub fn new(url: impl Into<String>, options: CaptureOptions) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            options,
        }
    }
}

/// The encoded image produced by one capture.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub url: String,
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub duration: Duration,
}

impl CaptureResult {
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Chrome command-line arguments for headless capture.
pub fn chrome_args() -> Vec<String> {
    [
        "--headless",
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-accelerated-2d-canvas",
        "--no-first-run",
        "--disable-gpu",
        "--disable-web-security",
        "--disable-features=VizDisplayCompositor",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-renderer-backgrounding",
        "--disable-extensions",
        "--disable-default-apps",
        "--disable-sync",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Builds a chromiumoxide launch configuration for one pool instance.
///
/// Each instance gets its own user data directory so concurrent
/// launches do not trip Chrome's profile singleton.
pub fn browser_config(
    config: &Config,
    instance_id: usize,
) -> Result<chromiumoxide::browser::BrowserConfig, String> {
    use chromiumoxide::browser::BrowserConfig;

    let mut args = chrome_args();
    args.push(format!(
        "--user-data-dir=/tmp/webshot-{}-{}",
        std::process::id(),
        instance_id
    ));

    let mut builder = BrowserConfig::builder().args(args);

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build()
}
