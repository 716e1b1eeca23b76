//! Per-request capture pipeline.
//!
//! One capture is one isolated render: acquire an instance, open a
//! session, navigate, settle, encode, and hand everything back. The
//! cleanup half runs on every exit path so a failed render can never
//! leak pool capacity.

use crate::{
    utils::format_duration, BrowserInstance, BrowserPool, CaptureError, CaptureOptions,
    CaptureRequest, CaptureResult, DeviceProfile, ImageFormat, PageSession,
};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

/// Fixed post-load delay allowing deferred rendering to finish before
/// the screenshot is taken.
const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Capture seam used by the batch orchestrator.
#[async_trait]
pub trait Capturer: Send + Sync {
    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureResult, CaptureError>;
}

pub struct CapturePipeline {
    pool: Arc<BrowserPool>,
}

impl CapturePipeline {
    pub fn new(pool: Arc<BrowserPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<BrowserPool> {
        &self.pool
    }

    /// Renders one URL into image bytes.
    ///
    /// Pool exhaustion propagates unchanged; every other failure is
    /// local to this request and leaves pool health untouched.
    pub async fn capture(&self, request: &CaptureRequest) -> Result<CaptureResult, CaptureError> {
        let started = Instant::now();

        let instance = self.pool.acquire().await?;
        let outcome = self.capture_on(&instance, request).await;
        self.pool.release(instance).await;

        let duration = started.elapsed();
        metrics::histogram!("capture_duration_seconds", duration.as_secs_f64());

        match outcome {
            Ok(data) => {
                metrics::counter!("captures_total", 1);
                info!(
                    "Captured {} ({} bytes) in {}",
                    request.url,
                    data.len(),
                    format_duration(duration)
                );
                Ok(CaptureResult {
                    url: request.url.clone(),
                    data,
                    format: request.options.format,
                    duration,
                })
            }
            Err(e) => {
                metrics::counter!("captures_failed_total", 1);
                Err(e)
            }
        }
    }

    /// The session-scoped half. The session is closed on every exit
    /// path, success or failure.
    async fn capture_on(
        &self,
        instance: &BrowserInstance,
        request: &CaptureRequest,
    ) -> Result<Vec<u8>, CaptureError> {
        if request.url.is_empty() {
            return Err(CaptureError::MissingUrl);
        }

        let options = &request.options;
        let viewport = options.effective_viewport();
        let profile = match &options.device_profile {
            Some(name) => DeviceProfile::by_name(name),
            None => DeviceProfile::for_viewport(viewport),
        };
        if let Some(p) = profile {
            debug!("Using device profile '{}' for {}", p.name, request.url);
        }

        let session = self
            .pool
            .create_session(instance, viewport, profile, options.timeout)
            .await?;
        let result = self.render(&session, request).await;
        self.pool.close_session(session).await;
        result
    }

    async fn render(
        &self,
        session: &PageSession,
        request: &CaptureRequest,
    ) -> Result<Vec<u8>, CaptureError> {
        let page = session.page();
        debug!("Navigating to {} (request {})", request.url, request.id);

        let navigation = async {
            page.goto(request.url.as_str())
                .await
                .map_err(|e| CaptureError::Session(e.to_string()))?;
            page.wait_for_navigation_response()
                .await
                .map_err(|e| CaptureError::Session(e.to_string()))
        };
        let response = timeout(session.timeout(), navigation)
            .await
            .map_err(|_| CaptureError::NavigationTimeout(session.timeout()))??;

        // Missing response maps to status 0.
        let status = response
            .as_ref()
            .and_then(|r| r.response.as_ref())
            .map(|r| r.status as u16)
            .unwrap_or(0);
        if !(200..300).contains(&status) {
            return Err(CaptureError::LoadFailure(status));
        }

        sleep(SETTLE_DELAY).await;

        self.take_screenshot(page, &request.options).await
    }

    async fn take_screenshot(
        &self,
        page: &Page,
        options: &CaptureOptions,
    ) -> Result<Vec<u8>, CaptureError> {
        // WebP is not a CDP encoding; capture PNG and re-encode.
        let cdp_format = match options.format {
            ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
            ImageFormat::Png | ImageFormat::Webp => CaptureScreenshotFormat::Png,
        };

        let mut params = ScreenshotParams::builder()
            .format(cdp_format)
            .full_page(options.full_page);
        if options.format.is_lossy() {
            params = params.quality(options.quality as i64);
        }

        let bytes = timeout(options.timeout, page.screenshot(params.build()))
            .await
            .map_err(|_| {
                CaptureError::CaptureFailed(format!(
                    "screenshot timed out after {:?}",
                    options.timeout
                ))
            })?
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        match options.format {
            ImageFormat::Webp => reencode_webp(&bytes),
            _ => Ok(bytes),
        }
    }
}

#[async_trait]
impl Capturer for CapturePipeline {
    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureResult, CaptureError> {
        CapturePipeline::capture(self, request).await
    }
}

fn reencode_webp(png: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let img = image::load_from_memory(png)
        .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

    let mut webp = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut webp), image::ImageFormat::WebP)
        .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
    Ok(webp)
}
