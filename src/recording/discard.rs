// src/recording/discard.rs
//! Sinks that never reach a backend
//!
//! Used to separate the cost of analysis from the cost of I/O:
//!
//! - **DiscardSink**: does nothing at all
//! - **NoFlushSink**: encodes like the streaming sink, then drops the buffer

use crate::recording::buffer::ByteBuffer;
use crate::recording::encoder::StringEncoding;
use crate::recording::sink::{Completion, Sink};
use crate::utils::errors::Result;
use tracing::debug;

/// Sink that ignores every operation
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl Sink for DiscardSink {
    fn string_length(&self, value: &str) -> usize {
        value.len()
    }

    fn ensure_capacity(&mut self, _len: usize) -> Result<()> {
        Ok(())
    }

    fn write_byte(&mut self, _value: u8) {}

    fn write_int(&mut self, _value: i32) {}

    fn write_string(&mut self, _value: &str) {}

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn end(self, completion: Completion) -> Result<()> {
        completion();
        Ok(())
    }
}

/// Sink that encodes into a real buffer but resets it instead of flushing
pub struct NoFlushSink {
    buffer: ByteBuffer,
    discarded: u64,
}

impl NoFlushSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: ByteBuffer::new(capacity, StringEncoding::Utf16),
            discarded: 0,
        }
    }

    /// Bytes thrown away so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn offset(&self) -> usize {
        self.buffer.offset()
    }
}

impl Sink for NoFlushSink {
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
        self.discarded += self.buffer.offset() as u64;
        self.buffer.reset();
        Ok(())
    }

    fn end(mut self, completion: Completion) -> Result<()> {
        self.flush()?;
        debug!("No-flush sink discarded {} bytes", self.discarded);
        completion();
        Ok(())
    }
}
