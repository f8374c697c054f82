// src/utils/errors.rs
//! Error types for the trace engine
//!
//! Every failure is fatal for the session: a trace with a hole in it cannot
//! be replayed, so nothing here is retried or masked.

use thiserror::Error;

/// Errors raised while producing a trace
#[derive(Debug, Error)]
pub enum TraceError {
    /// `set_flush_iid` was called while a marker was still pending
    #[error("Flush marker {pending} is still pending")]
    FlushMarkerPending { pending: String },

    /// A single record can never fit in the sink's buffer
    #[error("Record of {needed} bytes exceeds buffer capacity of {capacity} bytes")]
    RecordTooLarge { needed: usize, capacity: usize },

    /// The backend refused a buffer flush
    #[error("Trace write failed: {0}")]
    WriteFailed(String),

    /// Connecting to or talking with the collector failed
    #[error("Transport failed: {0}")]
    TransportFailed(String),

    /// The collector broke the acknowledgment protocol
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The session has already been ended
    #[error("Session already ended")]
    SessionEnded,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    ConfigFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for TraceError {
    fn from(e: config::ConfigError) -> Self {
        TraceError::ConfigFailed(e.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TraceError>;
