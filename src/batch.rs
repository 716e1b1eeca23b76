//! Bounded-concurrency batch orchestration.
//!
//! URLs run in fixed-size groups: every capture in a group is
//! dispatched concurrently and the whole group settles before the next
//! one starts, so peak engine usage is bounded by the group size on
//! top of the pool's own capacity. Per-URL failures become text
//! entries in the archive; only archive errors fail the run itself.

use crate::{
    utils::archive_entry_name, ArchiveSink, CaptureError, CaptureOptions, CaptureRequest, Capturer,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;

/// Aggregate counters for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct BatchOrchestrator {
    capturer: Arc<dyn Capturer>,
    concurrency_limit: usize,
}

impl BatchOrchestrator {
    pub fn new(capturer: Arc<dyn Capturer>) -> Self {
        Self::with_concurrency(capturer, DEFAULT_BATCH_CONCURRENCY)
    }

    /// The limit is independent of the pool size; deployers must keep
    /// it at or below the pool size or captures inside a group will
    /// surface pool exhaustion as per-item failures.
    pub fn with_concurrency(capturer: Arc<dyn Capturer>, concurrency_limit: usize) -> Self {
        Self {
            capturer,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    /// Captures every URL in order and streams one entry per URL into
    /// the sink: image bytes on success, the error text at the same
    /// position on failure. The sink is finalized exactly once, after
    /// the last group.
    pub async fn run<S: ArchiveSink>(
        &self,
        urls: &[String],
        options: &CaptureOptions,
        sink: &mut S,
    ) -> Result<BatchSummary, CaptureError> {
        let group_size = self.concurrency_limit.min(urls.len()).max(1);
        info!(
            "Starting batch of {} URLs in groups of {}",
            urls.len(),
            group_size
        );

        let mut summary = BatchSummary {
            total: urls.len(),
            ..Default::default()
        };
        // Entry index is global and 1-based, which keeps names unique
        // across the whole batch.
        let mut index = 1usize;

        for group in urls.chunks(group_size) {
            let captures = group.iter().map(|url| {
                let request = CaptureRequest::new(url.clone(), options.clone());
                let capturer = self.capturer.clone();
                async move { capturer.capture(&request).await }
            });

            // Group barrier: every capture settles before entries are
            // appended and before the next group is dispatched.
            let results = join_all(captures).await;

            for (url, result) in group.iter().zip(results) {
                match result {
                    Ok(capture) => {
                        let name = archive_entry_name(url, index, capture.format.extension());
                        sink.append(&name, &capture.data)?;
                        summary.succeeded += 1;
                    }
                    Err(e) => {
                        warn!("Failed to capture {}: {}", url, e);
                        let name = archive_entry_name(url, index, "txt");
                        let message = format!("Error taking screenshot: {e}");
                        sink.append(&name, message.as_bytes())?;
                        summary.failed += 1;
                    }
                }
                index += 1;
            }
        }

        sink.finalize()?;

        metrics::counter!("batch_entries_succeeded_total", summary.succeeded as u64);
        metrics::counter!("batch_entries_failed_total", summary.failed as u64);
        info!(
            "Batch completed. Success: {}, Errors: {}",
            summary.succeeded, summary.failed
        );
        Ok(summary)
    }
}
