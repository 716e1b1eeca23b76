//! Streaming archive output for batch captures.
//!
//! The orchestrator only sees the [`ArchiveSink`] trait; the concrete
//! ZIP writer lives here so the transport of the finished bytes stays
//! the caller's business.

use crate::CaptureError;
use std::io::{Seek, Write};
use tracing::debug;

/// Destination for batch entries. One `append` per URL, `finalize`
/// exactly once after the last group.
pub trait ArchiveSink {
    fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), CaptureError>;
    fn finalize(&mut self) -> Result<(), CaptureError>;
}

/// ZIP-backed sink writing into any `Write + Seek` target (file,
/// in-memory cursor).
pub struct ZipSink<W: Write + Seek> {
    writer: Option<zip::ZipWriter<W>>,
    entry_count: usize,
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(target: W) -> Self {
        Self {
            writer: Some(zip::ZipWriter::new(target)),
            entry_count: 0,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }
}

impl<W: Write + Seek> ArchiveSink for ZipSink<W> {
    fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), CaptureError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CaptureError::Archive("archive already finalized".to_string()))?;

        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        writer.start_file(name, options)?;
        writer.write_all(bytes)?;
        self.entry_count += 1;
        debug!("Appended {} ({} bytes) to archive", name, bytes.len());
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), CaptureError> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| CaptureError::Archive("archive already finalized".to_string()))?;
        writer.finish()?;
        debug!("Archive finalized with {} entries", self.entry_count);
        Ok(())
    }
}
