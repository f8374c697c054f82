// src/recording/mod.rs
//! Trace recording
//!
//! This module turns instrumentation callbacks into a compact record stream:
//!
//! - **Logger**: the logging contract, the sequencing logger and a null logger
//! - **Sequencer**: logical clock, script cache, flush marker, stop flag
//! - **Encoder**: binary layout of every record kind
//! - **Buffer**: fixed-capacity byte buffer shared by the binary sinks
//! - **Sinks**: discard, no-flush, binary file and text file backends
//!   (the streaming backend lives in `transport`)
//!
//! # Architecture
//!
//! ```text
//! instrumentation → log_*() → EventSequencer ──(update-script / top-level-flush)──┐
//!                                  │                                               │
//!                                  └───────────── Event ──▶ encoder ──▶ Sink buffer
//!                                                                        │ full?
//!                                                                        ▼
//!                                                              flush → file / socket
//! ```
//!
//! # Wire format
//!
//! A flat sequence of self-delimiting records, no header or footer:
//! 1-byte tag, 4-byte big-endian integers, length-prefixed strings.

pub mod buffer;
pub mod collaborators;
pub mod discard;
pub mod encoder;
pub mod entry;
pub mod file_sink;
pub mod logger;
pub mod sequencer;
pub mod sink;
pub mod text_sink;

// Re-export commonly used types
pub use buffer::ByteBuffer;
pub use collaborators::{LastUseLog, LastUseTracker, NoLastUse, ScriptRegister, SharedScriptId};
pub use discard::{DiscardSink, NoFlushSink};
pub use encoder::StringEncoding;
pub use entry::{EntryKind, Event, FlushMarker, FreeVars};
pub use file_sink::BinaryFileSink;
pub use logger::{finish, open_logger, Logger, NullLogger, TraceLogger};
pub use sequencer::EventSequencer;
pub use sink::{Completion, Sink};
pub use text_sink::TextFileSink;
