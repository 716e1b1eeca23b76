use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// No free browser instance in the pool. This is a hard rejection;
    /// the pool never queues callers.
    #[error("browser pool exhausted")]
    PoolExhausted,

    /// A browser failed to launch during pool initialization. Fatal:
    /// the pool is all-or-nothing at boot.
    #[error("browser launch failed: {0}")]
    LaunchFailure(String),

    #[error("request has no URL")]
    MissingUrl,

    /// The URL failed to parse or uses a scheme other than http(s).
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The target returned a non-success status, or no response at all
    /// (status 0).
    #[error("page load failed with status {0}")]
    LoadFailure(u16),

    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    /// Page session setup or CDP command failure.
    #[error("session error: {0}")]
    Session(String),

    #[error("screenshot capture failed: {0}")]
    CaptureFailed(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CaptureError {
    /// Whether a fresh request for the same URL could plausibly succeed.
    /// The core never retries on its own; this is advisory for callers.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CaptureError::PoolExhausted
                | CaptureError::LoadFailure(_)
                | CaptureError::NavigationTimeout(_)
                | CaptureError::Session(_)
        )
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::Serialization(err.to_string())
    }
}

impl From<zip::result::ZipError> for CaptureError {
    fn from(err: zip::result::ZipError) -> Self {
        CaptureError::Archive(err.to_string())
    }
}
