// src/recording/sink.rs
//! Byte sink contract shared by every trace backend

use crate::utils::errors::Result;

/// Callback invoked once a sink has delivered everything and released its backend
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Destination of encoded records
///
/// Writers call [`Sink::ensure_capacity`] with a record's full length before
/// writing any of its fields, so the individual writes never fail.
pub trait Sink {
    /// Encoded payload length of `value`, excluding the 4-byte length prefix
    fn string_length(&self, value: &str) -> usize;

    /// Flush first if the next `len` bytes would not fit
    fn ensure_capacity(&mut self, len: usize) -> Result<()>;

    fn write_byte(&mut self, value: u8);

    fn write_int(&mut self, value: i32);

    fn write_string(&mut self, value: &str);

    /// Hand the buffered bytes to the backend and reset the cursor
    fn flush(&mut self) -> Result<()>;

    /// Deliver what is left, release the backend, then call `completion`
    fn end(self, completion: Completion) -> Result<()>
    where
        Self: Sized;
}
