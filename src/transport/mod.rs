// src/transport/mod.rs
//! Streaming delivery of trace buffers to a remote collector
//!
//! - **Protocol**: acknowledgment-gated, in-order delivery state machine
//! - **Codec**: masked length-prefixed frames on the wire
//! - **Connection**: tokio TCP driver feeding the protocol
//! - **Entropy**: keeps the transport off the traced program's random source
//! - **Streaming Sink**: the byte sink that feeds snapshots to the protocol
//!
//! # Architecture
//!
//! ```text
//! log_*() → StreamingSink buffer ──flush──▶ snapshot queue
//!                                              │ (one in flight)
//!                                              ▼
//!                 driver task ◀── channel ── TcpConnection
//!                     │   ▲
//!               frames│   │acks
//!                     ▼   │
//!                   collector
//! ```

pub mod codec;
pub mod connection;
pub mod entropy;
pub mod protocol;
pub mod stream_sink;

// Re-export commonly used types
pub use codec::{CollectorCodec, Frame, FrameKind};
pub use connection::{SharedProtocol, TcpConnection};
pub use protocol::{Connection, DeliveryProtocol, ProtocolState};
pub use stream_sink::StreamingSink;
