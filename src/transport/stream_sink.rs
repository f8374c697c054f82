// src/transport/stream_sink.rs
//! Network-backed trace sink
//!
//! Encodes into a fixed buffer with UTF-16 strings. Each flush copies the
//! filled region into an immutable snapshot, hands it to the delivery
//! protocol and reuses the buffer immediately.

use crate::observability::record_flush;
use crate::recording::buffer::ByteBuffer;
use crate::recording::encoder::StringEncoding;
use crate::recording::sink::{Completion, Sink};
use crate::transport::connection::TcpConnection;
use crate::transport::protocol::{Connection, DeliveryProtocol};
use crate::utils::errors::{Result, TraceError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::debug;

/// Sink that streams snapshots to a collector
pub struct StreamingSink<C: Connection = TcpConnection> {
    buffer: ByteBuffer,
    protocol: Arc<Mutex<DeliveryProtocol<C>>>,
}

impl StreamingSink<TcpConnection> {
    /// Connect to the collector from inside a tokio runtime
    pub fn connect(addr: &str, handshake: &str, capacity: usize) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| {
            TraceError::TransportFailed(format!("Streaming sink needs a tokio runtime: {}", e))
        })?;
        Ok(Self::connect_on(&handle, addr, handshake, capacity))
    }

    /// Connect to the collector using the given runtime
    pub fn connect_on(handle: &Handle, addr: &str, handshake: &str, capacity: usize) -> Self {
        debug!("Streaming trace to {}", addr);
        Self::with_protocol(TcpConnection::open(handle, addr, handshake), capacity)
    }
}

impl<C: Connection> StreamingSink<C> {
    /// Stream through an existing protocol instance
    pub fn with_protocol(protocol: Arc<Mutex<DeliveryProtocol<C>>>, capacity: usize) -> Self {
        Self {
            buffer: ByteBuffer::new(capacity, StringEncoding::Utf16),
            protocol,
        }
    }

    pub fn protocol(&self) -> &Arc<Mutex<DeliveryProtocol<C>>> {
        &self.protocol
    }

    pub fn offset(&self) -> usize {
        self.buffer.offset()
    }

    /// End the sink and wait until the collector acknowledged everything
    pub async fn end_async(self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.end(Box::new(move || {
            let _ = done_tx.send(());
        }))?;

        done_rx.await.map_err(|_| {
            TraceError::TransportFailed(
                "Connection failed before every snapshot was acknowledged".to_string(),
            )
        })
    }
}

impl<C: Connection> Sink for StreamingSink<C> {
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
        let snapshot = self.buffer.snapshot();
        self.buffer.reset();

        record_flush(snapshot.len());
        self.protocol.lock().enqueue(snapshot)
    }

    fn end(mut self, completion: Completion) -> Result<()> {
        if !self.buffer.is_empty() {
            self.flush()?;
        }
        self.protocol.lock().finish(completion)
    }
}

impl<C: Connection> Drop for StreamingSink<C> {
    fn drop(&mut self) {
        // Without `end` nothing would ever tell the driver to hang up
        self.protocol.lock().abandon();
    }
}
