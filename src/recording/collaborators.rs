// src/recording/collaborators.rs
//! Interfaces to the components around the logger
//!
//! - **LastUseTracker**: buffers "object became unreachable" facts and
//!   replays them into the logger when asked
//! - **ScriptRegister**: reports the id of the currently executing script

use crate::utils::errors::Result;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Receiver of last-use records
///
/// Implemented by every logger; handed to [`LastUseTracker::flush_last_use`]
/// so the tracker can write its buffered records back into the trace.
pub trait LastUseLog {
    /// An object was last used at `timestamp` by `source_id`
    fn log_last_use(&mut self, obj_id: i32, timestamp: i32, source_id: &str) -> Result<()>;

    /// Close a block of last-use records
    fn end_last_use(&mut self) -> Result<()>;
}

/// Source of buffered last-use information
pub trait LastUseTracker {
    /// Write all buffered last-use records into `log`
    ///
    /// Calls made on `log` from here never trigger another flush.
    fn flush_last_use(&mut self, log: &mut dyn LastUseLog) -> Result<()>;
}

/// Tracker with nothing to report
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLastUse;

impl LastUseTracker for NoLastUse {
    fn flush_last_use(&mut self, _log: &mut dyn LastUseLog) -> Result<()> {
        Ok(())
    }
}

/// Read-only view of the executing script's id
pub trait ScriptRegister {
    fn current_script_id(&self) -> i32;
}

/// Script id cell shared between the instrumentation and the logger
#[derive(Debug, Clone, Default)]
pub struct SharedScriptId(Arc<AtomicI32>);

impl SharedScriptId {
    pub fn new(script_id: i32) -> Self {
        Self(Arc::new(AtomicI32::new(script_id)))
    }

    pub fn set(&self, script_id: i32) {
        self.0.store(script_id, Ordering::Relaxed);
    }

    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl ScriptRegister for SharedScriptId {
    fn current_script_id(&self) -> i32 {
        self.get()
    }
}
