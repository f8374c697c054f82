// src/recording/text_sink.rs
//! Human-readable trace sink for debugging
//!
//! Emits every byte, integer and string as a decimal or raw token followed
//! by a comma. Not a machine format: strings are written unescaped.

use crate::observability::record_flush;
use crate::recording::sink::{Completion, Sink};
use crate::utils::errors::{Result, TraceError};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Comma-separated token writer
pub struct TextFileSink {
    file: File,
    path: PathBuf,
    buffer: String,
    capacity: usize,
}

impl TextFileSink {
    /// Create (or truncate) the text trace at `path`
    pub fn create<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| {
            TraceError::WriteFailed(format!("Failed to open {}: {}", path.display(), e))
        })?;

        Ok(Self {
            file,
            path,
            buffer: String::with_capacity(capacity),
            capacity,
        })
    }

    /// Tokens not yet written to the file
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn push_token(&mut self, token: &str) {
        self.buffer.push_str(token);
        self.buffer.push(',');
    }
}

impl Sink for TextFileSink {
    fn string_length(&self, value: &str) -> usize {
        value.chars().count()
    }

    fn ensure_capacity(&mut self, len: usize) -> Result<()> {
        if !self.buffer.is_empty() && self.buffer.len() + len > self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    fn write_byte(&mut self, value: u8) {
        self.push_token(&value.to_string());
    }

    fn write_int(&mut self, value: i32) {
        self.push_token(&value.to_string());
    }

    fn write_string(&mut self, value: &str) {
        self.push_token(value);
    }

    fn flush(&mut self) -> Result<()> {
        let len = self.buffer.len();
        self.file.write_all(self.buffer.as_bytes()).map_err(|e| {
            TraceError::WriteFailed(format!("Failed to write {}: {}", self.path.display(), e))
        })?;
        self.buffer.clear();

        record_flush(len);
        debug!("Flushed {} text bytes to {}", len, self.path.display());

        Ok(())
    }

    fn end(mut self, completion: Completion) -> Result<()> {
        if !self.buffer.is_empty() {
            self.flush()?;
        }
        drop(self.file);

        info!("Done writing text trace to {}", self.path.display());
        completion();

        Ok(())
    }
}
