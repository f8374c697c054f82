// src/utils/config.rs
//! Trace session configuration
//!
//! Loaded from an optional `memtrace.{toml,yaml,json}` file in the working
//! directory, then overridden by `MEMTRACE__*` environment variables
//! (e.g. `MEMTRACE__SINK=text_file`, `MEMTRACE__BUFFER_CAPACITY=4096`).

use crate::utils::errors::Result;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;

/// Default size of the fixed trace buffer (bytes)
pub const DEFAULT_BUFFER_CAPACITY: usize = 65_536;

/// Default number of clock ticks between last-use flushes
pub const DEFAULT_LAST_USE_FLUSH_PERIOD: i64 = 10_000;

/// Which backend receives the encoded trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Drop everything; measures analysis overhead alone
    Discard,

    /// Binary records written to `trace_path`
    BinaryFile,

    /// Comma-separated tokens written to `text_trace_path`
    TextFile,

    /// Binary records streamed to the collector at `collector_addr`
    Streaming,

    /// Encode like `Streaming`, then throw the buffer away
    NoFlush,
}

/// Trace session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Backend selection
    pub sink: SinkKind,

    /// Fixed buffer capacity in bytes
    pub buffer_capacity: usize,

    /// Clock ticks between requests to flush last-use data
    pub last_use_flush_period: i64,

    /// Output file of the binary file sink
    pub trace_path: PathBuf,

    /// Output file of the text sink
    pub text_trace_path: PathBuf,

    /// Collector address for the streaming sink
    pub collector_addr: String,

    /// Handshake token sent once the collector connection opens
    pub handshake: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::BinaryFile,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            last_use_flush_period: DEFAULT_LAST_USE_FLUSH_PERIOD,
            trace_path: PathBuf::from("mem-trace"),
            text_trace_path: PathBuf::from("ascii-mem-trace"),
            collector_addr: "127.0.0.1:8080".to_string(),
            handshake: "startup".to_string(),
        }
    }
}

impl TraceConfig {
    /// Load configuration from `memtrace.*` and the environment
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("memtrace").required(false))
            .add_source(
                Environment::with_prefix("MEMTRACE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
