// src/recording/sequencer.rs
//! Event sequencing bookkeeping
//!
//! Owns the state every logger consults before a real event is encoded:
//!
//! - **Logical clock**: value of the *previous* real event, `-1` before the
//!   first. Advances once per real event and once per top-level flush
//!   marker; metadata records leave it unchanged.
//! - **Last-use timer**: clock value at the most recent last-use flush.
//! - **Script cache**: the script id last announced in the trace.
//! - **Flush marker**: at most one pending top-level boundary.
//! - **Stop flag**: once set, every log call is dropped.
//!
//! The sequencer only keeps the books; the logger emits the records.

use crate::recording::entry::FlushMarker;
use crate::utils::config::DEFAULT_LAST_USE_FLUSH_PERIOD;
use crate::utils::errors::{Result, TraceError};

/// Script id cached before any script has been announced
pub const NO_SCRIPT: i32 = -1;

/// Per-session sequencing state
#[derive(Debug, Clone)]
pub struct EventSequencer {
    time: i64,
    last_use_flush_time: i64,
    last_use_flush_period: i64,
    current_script: i32,
    flush_marker: Option<FlushMarker>,
    stopped: bool,
}

impl EventSequencer {
    pub fn new(last_use_flush_period: i64) -> Self {
        Self {
            time: -1,
            last_use_flush_time: 0,
            last_use_flush_period,
            current_script: NO_SCRIPT,
            flush_marker: None,
            stopped: false,
        }
    }

    /// Clock value of the previous real event
    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn current_script(&self) -> i32 {
        self.current_script
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Drop all further events; resources stay open
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Whether enough ticks have passed to ask for buffered last-use data
    pub fn last_use_flush_due(&self) -> bool {
        self.time - self.last_use_flush_time >= self.last_use_flush_period
    }

    /// Restart the last-use timer at the current clock value
    pub fn mark_last_use_flushed(&mut self) {
        self.last_use_flush_time = self.time;
    }

    /// Record the reported script id; `true` when it differs from the cache
    pub fn observe_script(&mut self, script_id: i32) -> bool {
        if script_id == self.current_script {
            return false;
        }
        self.current_script = script_id;
        true
    }

    pub fn flush_marker(&self) -> Option<FlushMarker> {
        self.flush_marker
    }

    /// Arm the top-level flush marker; fails if one is still pending
    pub fn set_flush_marker(&mut self, marker: FlushMarker) -> Result<()> {
        if let Some(pending) = self.flush_marker {
            return Err(TraceError::FlushMarkerPending {
                pending: pending.to_string(),
            });
        }
        self.flush_marker = Some(marker);
        Ok(())
    }

    /// Consume the pending marker, charging one tick for its record
    pub fn take_flush_marker(&mut self) -> Option<FlushMarker> {
        let marker = self.flush_marker.take()?;
        self.time += 1;
        Some(marker)
    }

    /// Charge one tick for the event about to be encoded
    pub fn tick(&mut self) {
        self.time += 1;
    }

    /// Refund the tick of a metadata record
    pub fn untick(&mut self) {
        self.time -= 1;
    }
}

impl Default for EventSequencer {
    fn default() -> Self {
        Self::new(DEFAULT_LAST_USE_FLUSH_PERIOD)
    }
}
