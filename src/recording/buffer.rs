// src/recording/buffer.rs
//! Fixed-capacity, offset-addressed byte buffer
//!
//! Callers must reserve room (see [`ByteBuffer::fits`]) before writing;
//! writes past capacity are a bug and panic.

use crate::recording::encoder::{StringEncoding, INT_LEN};
use crate::utils::errors::{Result, TraceError};
use bytes::Bytes;

/// Fixed-capacity trace buffer
pub struct ByteBuffer {
    bytes: Box<[u8]>,
    offset: usize,
    encoding: StringEncoding,
}

impl ByteBuffer {
    /// Create a zeroed buffer of `capacity` bytes
    pub fn new(capacity: usize, encoding: StringEncoding) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            offset: 0,
            encoding,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Next free byte
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    pub fn encoding(&self) -> StringEncoding {
        self.encoding
    }

    /// Whether `len` more bytes fit without flushing
    pub fn fits(&self, len: usize) -> bool {
        self.offset + len <= self.capacity()
    }

    /// Reject records that could not fit even in an empty buffer
    pub fn check_record(&self, len: usize) -> Result<()> {
        if len > self.capacity() {
            return Err(TraceError::RecordTooLarge {
                needed: len,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    /// Filled region `[0, offset)`
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.offset]
    }

    /// Owned copy of the filled region; the buffer itself can be reused at once
    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_slice())
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    pub fn string_length(&self, value: &str) -> usize {
        self.encoding.payload_len(value)
    }

    pub fn write_byte(&mut self, value: u8) {
        self.bytes[self.offset] = value;
        self.offset += 1;
    }

    /// Big-endian 4-byte integer
    pub fn write_int(&mut self, value: i32) {
        let end = self.offset + INT_LEN;
        self.bytes[self.offset..end].copy_from_slice(&value.to_be_bytes());
        self.offset = end;
    }

    /// Length prefix followed by the payload in this buffer's encoding
    pub fn write_string(&mut self, value: &str) {
        let len = self.encoding.payload_len(value);
        self.write_int(len as i32);
        let end = self.offset + len;
        self.encoding
            .write_payload(value, &mut self.bytes[self.offset..end]);
        self.offset = end;
    }
}
