// src/transport/connection.rs
//! TCP connection to the trace collector
//!
//! Sends never block the traced thread: [`TcpConnection`] only pushes frames
//! onto a channel. A driver task owns the socket, writes those frames in
//! order, and reports open, acknowledgment and close events back into the
//! shared [`DeliveryProtocol`].

use crate::transport::codec::{CollectorCodec, Frame, FrameKind};
use crate::transport::entropy;
use crate::transport::protocol::{Connection, DeliveryProtocol};
use crate::utils::errors::{Result, TraceError};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info};

/// Protocol shared between the traced thread and the driver task
pub type SharedProtocol = Arc<Mutex<DeliveryProtocol<TcpConnection>>>;

#[derive(Debug)]
enum Outbound {
    Frame(Frame),
    Close,
}

/// Outbound half of the collector connection
pub struct TcpConnection {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl TcpConnection {
    /// Start connecting to `addr` on `handle` and return the protocol driving it
    pub fn open(handle: &Handle, addr: &str, handshake: &str) -> SharedProtocol {
        let (outbound, rx) = mpsc::unbounded_channel();
        let protocol = Arc::new(Mutex::new(DeliveryProtocol::new(
            TcpConnection { outbound },
            handshake,
        )));

        handle.spawn(drive(addr.to_string(), rx, Arc::clone(&protocol)));
        protocol
    }

    fn push(&self, command: Outbound) -> Result<()> {
        self.outbound.send(command).map_err(|_| {
            TraceError::TransportFailed("Collector connection task has stopped".to_string())
        })
    }

    fn push_frame(&self, kind: FrameKind, payload: Bytes) -> Result<()> {
        // The masking key must not come from the traced program's source
        let mask = entropy::with_pristine_source(entropy::next_u32);
        self.push(Outbound::Frame(Frame::masked(kind, payload, mask)))
    }
}

impl Connection for TcpConnection {
    fn send_text(&mut self, text: &str) -> Result<()> {
        self.push_frame(FrameKind::Text, Bytes::copy_from_slice(text.as_bytes()))
    }

    fn send_binary(&mut self, payload: Bytes) -> Result<()> {
        self.push_frame(FrameKind::Binary, payload)
    }

    fn close(&mut self) -> Result<()> {
        self.push(Outbound::Close)
    }
}

/// Connect, then pump frames out and acknowledgments in until closed
async fn drive(
    addr: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    protocol: Arc<Mutex<DeliveryProtocol<TcpConnection>>>,
) {
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            protocol.lock().on_error(TraceError::TransportFailed(format!(
                "Failed to connect to collector at {}: {}",
                addr, e
            )));
            return;
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle on collector socket: {}", e);
    }
    info!("Connected to collector at {}", addr);

    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, CollectorCodec::new());
    let mut writer = FramedWrite::new(write_half, CollectorCodec::new());

    if protocol.lock().on_open().is_err() {
        return;
    }

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = writer.send(frame).await {
                        protocol.lock().on_error(TraceError::TransportFailed(format!(
                            "Failed to write to collector: {}",
                            e
                        )));
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = writer.close().await {
                        error!("Failed to close collector connection: {}", e);
                    }
                    debug!("Collector connection closed");
                    return;
                }
            },
            inbound = reader.next() => match inbound {
                Some(Ok(_ack)) => {
                    if protocol.lock().on_ack().is_err() {
                        return;
                    }
                }
                Some(Err(e)) => {
                    protocol.lock().on_error(TraceError::TransportFailed(format!(
                        "Failed to read from collector: {}",
                        e
                    )));
                    return;
                }
                None => {
                    let _ = protocol.lock().on_closed();
                    return;
                }
            },
        }
    }
}
