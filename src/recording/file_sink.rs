// src/recording/file_sink.rs
//! Binary trace file sink
//!
//! Records accumulate in a fixed buffer; each flush is one synchronous
//! write of `[0, offset)` on the caller's thread. Flush frequency is bounded
//! by the buffer capacity, so the blocking write is acceptable.

use crate::observability::record_flush;
use crate::recording::buffer::ByteBuffer;
use crate::recording::encoder::StringEncoding;
use crate::recording::sink::{Completion, Sink};
use crate::utils::errors::{Result, TraceError};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Binary trace file writer
pub struct BinaryFileSink {
    file: File,
    path: PathBuf,
    buffer: ByteBuffer,
}

impl BinaryFileSink {
    /// Create (or truncate) the trace file at `path`
    pub fn create<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| {
            TraceError::WriteFailed(format!("Failed to open {}: {}", path.display(), e))
        })?;

        debug!(
            "Opened binary trace {} with {} byte buffer",
            path.display(),
            capacity
        );

        Ok(Self {
            file,
            path,
            buffer: ByteBuffer::new(capacity, StringEncoding::Bytes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> usize {
        self.buffer.offset()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

impl Sink for BinaryFileSink {
    fn string_length(&self, value: &str) -> usize {
        self.buffer.string_length(value)
    }

    fn ensure_capacity(&mut self, len: usize) -> Result<()> {
        self.buffer.check_record(len)?;
        if !self.buffer.fits(len) {
            self.flush()?;
        }
        Ok(())
    }

    fn write_byte(&mut self, value: u8) {
        self.buffer.write_byte(value);
    }

    fn write_int(&mut self, value: i32) {
        self.buffer.write_int(value);
    }

    fn write_string(&mut self, value: &str) {
        self.buffer.write_string(value);
    }

    fn flush(&mut self) -> Result<()> {
        let len = self.buffer.offset();
        self.file.write_all(self.buffer.as_slice()).map_err(|e| {
            TraceError::WriteFailed(format!("Failed to write {}: {}", self.path.display(), e))
        })?;
        self.buffer.reset();

        record_flush(len);
        debug!("Flushed {} bytes to {}", len, self.path.display());

        Ok(())
    }

    fn end(mut self, completion: Completion) -> Result<()> {
        if !self.buffer.is_empty() {
            self.flush()?;
        }
        self.file.sync_all().map_err(|e| {
            TraceError::WriteFailed(format!("Failed to sync {}: {}", self.path.display(), e))
        })?;
        drop(self.file);

        info!("Done writing trace to {}", self.path.display());
        completion();

        Ok(())
    }
}
