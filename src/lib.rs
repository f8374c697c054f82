// src/lib.rs
//! Memtrace Engine Library
//!
//! Trace-logging backend for dynamic heap analysis. The instrumentation
//! engine calls one `log_*` operation per observed runtime event; this crate
//! sequences those events, encodes them into a compact binary stream and
//! delivers the stream to a file or a remote collector.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **recording**: logging contract, event sequencing, record encoding, file sinks
//! - **transport**: acknowledgment-gated streaming to a collector
//! - **observability**: tracing subscriber and metrics recorder setup
//! - **utils**: configuration and error types
//!
//! # Example
//!
//! ```no_run
//! use memtrace_engine::recording::{open_logger, NoLastUse, SharedScriptId};
//! use memtrace_engine::TraceConfig;
//!
//! # fn main() -> memtrace_engine::Result<()> {
//! let config = TraceConfig::load()?;
//! let script = SharedScriptId::new(0);
//! let mut logger = open_logger(&config, Box::new(NoLastUse), Box::new(script.clone()))?;
//!
//! logger.log_create_obj(12, 1)?;
//! logger.log_write(13, "x", 1)?;
//! logger.end(Box::new(|| println!("trace written")))?;
//! # Ok(())
//! # }
//! ```

// Public module exports
pub mod observability;
pub mod recording;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use recording::logger::{open_logger, Logger, TraceLogger};
pub use utils::config::{SinkKind, TraceConfig};
pub use utils::errors::{Result, TraceError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
