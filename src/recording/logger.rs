// src/recording/logger.rs
//! The logging contract and its implementations
//!
//! [`TraceLogger`] composes an [`EventSequencer`] with a [`Sink`]. Before a
//! real event is encoded it runs, in order:
//!
//! 1. stop check (drop the call)
//! 2. periodic last-use flush, unless the call came from that flush
//! 3. script-change detection (emits update-current-script, no tick)
//! 4. pending flush marker (emits top-level-flush, one tick)
//! 5. one tick for the event itself
//!
//! Metadata records (last-use, free-vars, source-mapping) run the same steps
//! and then refund their tick. `end_last_use` skips all of it and is written
//! even after tracing stopped.

use crate::recording::collaborators::{LastUseLog, LastUseTracker, ScriptRegister};
use crate::recording::discard::{DiscardSink, NoFlushSink};
use crate::recording::encoder;
use crate::recording::entry::{Event, FlushMarker, FreeVars};
use crate::recording::file_sink::BinaryFileSink;
use crate::recording::sequencer::EventSequencer;
use crate::recording::sink::{Completion, Sink};
use crate::recording::text_sink::TextFileSink;
use crate::transport::stream_sink::StreamingSink;
use crate::utils::config::{SinkKind, TraceConfig, DEFAULT_LAST_USE_FLUSH_PERIOD};
use crate::utils::errors::{Result, TraceError};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// One operation per observed runtime event
///
/// Called from the traced program's single logical thread. After
/// [`Logger::stop_tracing`] every `log_*` call returns `Ok(())` and writes
/// nothing.
pub trait Logger: LastUseLog {
    fn log_declare(&mut self, iid: i32, name: &str, obj_id: i32) -> Result<()>;

    fn log_create_obj(&mut self, iid: i32, obj_id: i32) -> Result<()>;

    /// Object creation attributed to script `sid` rather than the current one
    fn log_create_obj_diff_script(&mut self, sid: i32, iid: i32, obj_id: i32) -> Result<()>;

    fn log_create_fun(&mut self, iid: i32, fun_enter_iid: i32, obj_id: i32) -> Result<()>;

    fn log_put_field(
        &mut self,
        iid: i32,
        base_obj_id: i32,
        prop_name: &str,
        val_obj_id: i32,
    ) -> Result<()>;

    fn log_write(&mut self, iid: i32, name: &str, obj_id: i32) -> Result<()>;

    fn log_function_enter(&mut self, iid: i32, fun_obj_id: i32) -> Result<()>;

    fn log_function_exit(&mut self, iid: i32) -> Result<()>;

    fn log_update_iid(&mut self, obj_id: i32, new_iid: i32) -> Result<()>;

    fn log_debug(&mut self, call_iid: i32, obj_id: i32) -> Result<()>;

    fn log_return(&mut self, obj_id: i32) -> Result<()>;

    fn log_create_dom_node(&mut self, iid: i32, obj_id: i32) -> Result<()>;

    fn log_add_dom_child(&mut self, parent_obj_id: i32, child_obj_id: i32) -> Result<()>;

    fn log_remove_dom_child(&mut self, parent_obj_id: i32, child_obj_id: i32) -> Result<()>;

    fn log_add_to_child_set(
        &mut self,
        iid: i32,
        parent_obj_id: i32,
        name: &str,
        child_obj_id: i32,
    ) -> Result<()>;

    fn log_remove_from_child_set(
        &mut self,
        iid: i32,
        parent_obj_id: i32,
        name: &str,
        child_obj_id: i32,
    ) -> Result<()>;

    fn log_dom_root(&mut self, obj_id: i32) -> Result<()>;

    fn log_call(&mut self, iid: i32, fun_obj_id: i32, fun_enter_iid: i32, fun_sid: i32)
        -> Result<()>;

    fn log_script_enter(&mut self, iid: i32, script_id: i32, filename: &str) -> Result<()>;

    fn log_script_exit(&mut self, iid: i32) -> Result<()>;

    fn log_free_vars(&mut self, iid: i32, names: FreeVars<'_>) -> Result<()>;

    fn log_source_mapping(
        &mut self,
        iid: i32,
        start_line: i32,
        start_column: i32,
        end_line: i32,
        end_column: i32,
    ) -> Result<()>;

    /// Clock value of the most recent real event (`-1` before the first)
    fn time(&self) -> i64;

    /// Top-level flush marker waiting for the next real event
    fn flush_iid(&self) -> Option<FlushMarker>;

    /// Request a top-level-flush record before the next real event
    fn set_flush_iid(&mut self, source_file_id: i32, iid: i32) -> Result<()>;

    /// Drop all further events without releasing anything
    fn stop_tracing(&mut self);

    /// Drain everything, release the backend, then call `completion`
    fn end(self: Box<Self>, completion: Completion) -> Result<()>;
}

/// Logger that writes real records into a sink
pub struct TraceLogger<S: Sink> {
    sink: S,
    sequencer: EventSequencer,
    last_use: Option<Box<dyn LastUseTracker>>,
    scripts: Box<dyn ScriptRegister>,
}

impl<S: Sink> TraceLogger<S> {
    pub fn new(
        sink: S,
        last_use: Box<dyn LastUseTracker>,
        scripts: Box<dyn ScriptRegister>,
    ) -> Self {
        Self {
            sink,
            sequencer: EventSequencer::new(DEFAULT_LAST_USE_FLUSH_PERIOD),
            last_use: Some(last_use),
            scripts,
        }
    }

    /// Ask for last-use data every `period` ticks instead of the default
    pub fn with_last_use_flush_period(mut self, period: i64) -> Self {
        self.sequencer = EventSequencer::new(period);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sequencer(&self) -> &EventSequencer {
        &self.sequencer
    }

    /// Bookkeeping before a record; `false` means the call must be dropped
    fn before_log(&mut self, from_last_use: bool) -> Result<bool> {
        if self.sequencer.is_stopped() {
            return Ok(false);
        }

        if !from_last_use && self.sequencer.last_use_flush_due() {
            self.flush_last_use()?;
            self.sequencer.mark_last_use_flushed();
        }

        let script_id = self.scripts.current_script_id();
        if self.sequencer.observe_script(script_id) {
            self.emit(&Event::UpdateCurrentScript { script_id })?;
        }

        if let Some(marker) = self.sequencer.take_flush_marker() {
            let label = marker.to_string();
            self.emit(&Event::TopLevelFlush { marker: &label })?;
        }

        self.sequencer.tick();
        Ok(true)
    }

    fn flush_last_use(&mut self) -> Result<()> {
        // Absent while the tracker is running; nested requests are skipped
        let Some(mut tracker) = self.last_use.take() else {
            return Ok(());
        };

        debug!("Flushing last-use data at time {}", self.sequencer.time());
        let result = tracker.flush_last_use(self);
        self.last_use = Some(tracker);
        result
    }

    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        encoder::encode(event, &mut self.sink)
    }

    fn log_real(&mut self, event: Event<'_>) -> Result<()> {
        if !self.before_log(false)? {
            return Ok(());
        }
        self.emit(&event)
    }

    fn log_metadata(&mut self, event: Event<'_>, from_last_use: bool) -> Result<()> {
        if !self.before_log(from_last_use)? {
            return Ok(());
        }
        self.emit(&event)?;
        self.sequencer.untick();
        Ok(())
    }
}

impl<S: Sink> LastUseLog for TraceLogger<S> {
    fn log_last_use(&mut self, obj_id: i32, timestamp: i32, source_id: &str) -> Result<()> {
        self.log_metadata(
            Event::LastUse {
                obj_id,
                timestamp,
                source_id,
            },
            true,
        )
    }

    fn end_last_use(&mut self) -> Result<()> {
        self.emit(&Event::EndLastUse)
    }
}

impl<S: Sink> Logger for TraceLogger<S> {
    fn log_declare(&mut self, iid: i32, name: &str, obj_id: i32) -> Result<()> {
        self.log_real(Event::Declare { iid, name, obj_id })
    }

    fn log_create_obj(&mut self, iid: i32, obj_id: i32) -> Result<()> {
        self.log_real(Event::CreateObj { iid, obj_id })
    }

    fn log_create_obj_diff_script(&mut self, sid: i32, iid: i32, obj_id: i32) -> Result<()> {
        if !self.before_log(false)? {
            return Ok(());
        }
        self.emit(&Event::UpdateCurrentScript { script_id: sid })?;
        self.emit(&Event::CreateObj { iid, obj_id })?;
        let current = self.scripts.current_script_id();
        self.emit(&Event::UpdateCurrentScript { script_id: current })
    }

    fn log_create_fun(&mut self, iid: i32, fun_enter_iid: i32, obj_id: i32) -> Result<()> {
        self.log_real(Event::CreateFun {
            iid,
            fun_enter_iid,
            obj_id,
        })
    }

    fn log_put_field(
        &mut self,
        iid: i32,
        base_obj_id: i32,
        prop_name: &str,
        val_obj_id: i32,
    ) -> Result<()> {
        self.log_real(Event::PutField {
            iid,
            base_obj_id,
            prop_name,
            val_obj_id,
        })
    }

    fn log_write(&mut self, iid: i32, name: &str, obj_id: i32) -> Result<()> {
        self.log_real(Event::Write { iid, name, obj_id })
    }

    fn log_function_enter(&mut self, iid: i32, fun_obj_id: i32) -> Result<()> {
        self.log_real(Event::FunctionEnter { iid, fun_obj_id })
    }

    fn log_function_exit(&mut self, iid: i32) -> Result<()> {
        self.log_real(Event::FunctionExit { iid })
    }

    fn log_update_iid(&mut self, obj_id: i32, new_iid: i32) -> Result<()> {
        self.log_real(Event::UpdateIid { obj_id, new_iid })
    }

    fn log_debug(&mut self, call_iid: i32, obj_id: i32) -> Result<()> {
        self.log_real(Event::Debug { call_iid, obj_id })
    }

    fn log_return(&mut self, obj_id: i32) -> Result<()> {
        self.log_real(Event::Return { obj_id })
    }

    fn log_create_dom_node(&mut self, iid: i32, obj_id: i32) -> Result<()> {
        self.log_real(Event::CreateDomNode { iid, obj_id })
    }

    fn log_add_dom_child(&mut self, parent_obj_id: i32, child_obj_id: i32) -> Result<()> {
        self.log_real(Event::AddDomChild {
            parent_obj_id,
            child_obj_id,
        })
    }

    fn log_remove_dom_child(&mut self, parent_obj_id: i32, child_obj_id: i32) -> Result<()> {
        self.log_real(Event::RemoveDomChild {
            parent_obj_id,
            child_obj_id,
        })
    }

    fn log_add_to_child_set(
        &mut self,
        iid: i32,
        parent_obj_id: i32,
        name: &str,
        child_obj_id: i32,
    ) -> Result<()> {
        self.log_real(Event::AddToChildSet {
            iid,
            parent_obj_id,
            name,
            child_obj_id,
        })
    }

    fn log_remove_from_child_set(
        &mut self,
        iid: i32,
        parent_obj_id: i32,
        name: &str,
        child_obj_id: i32,
    ) -> Result<()> {
        self.log_real(Event::RemoveFromChildSet {
            iid,
            parent_obj_id,
            name,
            child_obj_id,
        })
    }

    fn log_dom_root(&mut self, obj_id: i32) -> Result<()> {
        self.log_real(Event::DomRoot { obj_id })
    }

    fn log_call(
        &mut self,
        iid: i32,
        fun_obj_id: i32,
        fun_enter_iid: i32,
        fun_sid: i32,
    ) -> Result<()> {
        self.log_real(Event::Call {
            iid,
            fun_obj_id,
            fun_enter_iid,
            fun_sid,
        })
    }

    fn log_script_enter(&mut self, iid: i32, script_id: i32, filename: &str) -> Result<()> {
        self.log_real(Event::ScriptEnter {
            iid,
            script_id,
            filename,
        })
    }

    fn log_script_exit(&mut self, iid: i32) -> Result<()> {
        self.log_real(Event::ScriptExit { iid })
    }

    fn log_free_vars(&mut self, iid: i32, names: FreeVars<'_>) -> Result<()> {
        self.log_metadata(Event::FreeVars { iid, names }, false)
    }

    fn log_source_mapping(
        &mut self,
        iid: i32,
        start_line: i32,
        start_column: i32,
        end_line: i32,
        end_column: i32,
    ) -> Result<()> {
        self.log_metadata(
            Event::SourceMapping {
                iid,
                start_line,
                start_column,
                end_line,
                end_column,
            },
            false,
        )
    }

    fn time(&self) -> i64 {
        self.sequencer.time()
    }

    fn flush_iid(&self) -> Option<FlushMarker> {
        self.sequencer.flush_marker()
    }

    fn set_flush_iid(&mut self, source_file_id: i32, iid: i32) -> Result<()> {
        self.sequencer.set_flush_marker(FlushMarker {
            source_file_id,
            iid,
        })
    }

    fn stop_tracing(&mut self) {
        info!("Tracing stopped at time {}", self.sequencer.time());
        self.sequencer.stop();
    }

    fn end(self: Box<Self>, completion: Completion) -> Result<()> {
        info!("Ending trace session at time {}", self.sequencer.time());
        let logger = *self;
        logger.sink.end(completion)
    }
}

/// Logger that records nothing and keeps no books
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl LastUseLog for NullLogger {
    fn log_last_use(&mut self, _obj_id: i32, _timestamp: i32, _source_id: &str) -> Result<()> {
        Ok(())
    }

    fn end_last_use(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Logger for NullLogger {
    fn log_declare(&mut self, _iid: i32, _name: &str, _obj_id: i32) -> Result<()> {
        Ok(())
    }

    fn log_create_obj(&mut self, _iid: i32, _obj_id: i32) -> Result<()> {
        Ok(())
    }

    fn log_create_obj_diff_script(&mut self, _sid: i32, _iid: i32, _obj_id: i32) -> Result<()> {
        Ok(())
    }

    fn log_create_fun(&mut self, _iid: i32, _fun_enter_iid: i32, _obj_id: i32) -> Result<()> {
        Ok(())
    }

    fn log_put_field(&mut self, _iid: i32, _base: i32, _prop: &str, _val: i32) -> Result<()> {
        Ok(())
    }

    fn log_write(&mut self, _iid: i32, _name: &str, _obj_id: i32) -> Result<()> {
        Ok(())
    }

    fn log_function_enter(&mut self, _iid: i32, _fun_obj_id: i32) -> Result<()> {
        Ok(())
    }

    fn log_function_exit(&mut self, _iid: i32) -> Result<()> {
        Ok(())
    }

    fn log_update_iid(&mut self, _obj_id: i32, _new_iid: i32) -> Result<()> {
        Ok(())
    }

    fn log_debug(&mut self, _call_iid: i32, _obj_id: i32) -> Result<()> {
        Ok(())
    }

    fn log_return(&mut self, _obj_id: i32) -> Result<()> {
        Ok(())
    }

    fn log_create_dom_node(&mut self, _iid: i32, _obj_id: i32) -> Result<()> {
        Ok(())
    }

    fn log_add_dom_child(&mut self, _parent: i32, _child: i32) -> Result<()> {
        Ok(())
    }

    fn log_remove_dom_child(&mut self, _parent: i32, _child: i32) -> Result<()> {
        Ok(())
    }

    fn log_add_to_child_set(&mut self, _iid: i32, _parent: i32, _name: &str, _child: i32) -> Result<()> {
        Ok(())
    }

    fn log_remove_from_child_set(
        &mut self,
        _iid: i32,
        _parent: i32,
        _name: &str,
        _child: i32,
    ) -> Result<()> {
        Ok(())
    }

    fn log_dom_root(&mut self, _obj_id: i32) -> Result<()> {
        Ok(())
    }

    fn log_call(&mut self, _iid: i32, _fun: i32, _enter_iid: i32, _sid: i32) -> Result<()> {
        Ok(())
    }

    fn log_script_enter(&mut self, _iid: i32, _script_id: i32, _filename: &str) -> Result<()> {
        Ok(())
    }

    fn log_script_exit(&mut self, _iid: i32) -> Result<()> {
        Ok(())
    }

    fn log_free_vars(&mut self, _iid: i32, _names: FreeVars<'_>) -> Result<()> {
        Ok(())
    }

    fn log_source_mapping(&mut self, _iid: i32, _sl: i32, _sc: i32, _el: i32, _ec: i32) -> Result<()> {
        Ok(())
    }

    fn time(&self) -> i64 {
        -1
    }

    fn flush_iid(&self) -> Option<FlushMarker> {
        None
    }

    fn set_flush_iid(&mut self, _source_file_id: i32, _iid: i32) -> Result<()> {
        Ok(())
    }

    fn stop_tracing(&mut self) {}

    fn end(self: Box<Self>, completion: Completion) -> Result<()> {
        completion();
        Ok(())
    }
}

/// Build the logger selected by `config.sink`
///
/// The streaming variant must be opened from inside a tokio runtime.
pub fn open_logger(
    config: &TraceConfig,
    last_use: Box<dyn LastUseTracker>,
    scripts: Box<dyn ScriptRegister>,
) -> Result<Box<dyn Logger>> {
    info!("Opening {:?} trace session", config.sink);
    let period = config.last_use_flush_period;

    let logger: Box<dyn Logger> = match config.sink {
        SinkKind::Discard => Box::new(
            TraceLogger::new(DiscardSink, last_use, scripts).with_last_use_flush_period(period),
        ),
        SinkKind::BinaryFile => {
            let sink = BinaryFileSink::create(&config.trace_path, config.buffer_capacity)?;
            Box::new(TraceLogger::new(sink, last_use, scripts).with_last_use_flush_period(period))
        }
        SinkKind::TextFile => {
            let sink = TextFileSink::create(&config.text_trace_path, config.buffer_capacity)?;
            Box::new(TraceLogger::new(sink, last_use, scripts).with_last_use_flush_period(period))
        }
        SinkKind::Streaming => {
            let sink = StreamingSink::connect(
                &config.collector_addr,
                &config.handshake,
                config.buffer_capacity,
            )?;
            Box::new(TraceLogger::new(sink, last_use, scripts).with_last_use_flush_period(period))
        }
        SinkKind::NoFlush => {
            let sink = NoFlushSink::new(config.buffer_capacity);
            Box::new(TraceLogger::new(sink, last_use, scripts).with_last_use_flush_period(period))
        }
    };

    Ok(logger)
}

/// End `logger` and wait until its completion fires
pub async fn finish(logger: Box<dyn Logger>) -> Result<()> {
    let (done_tx, done_rx) = oneshot::channel();
    logger.end(Box::new(move || {
        let _ = done_tx.send(());
    }))?;

    done_rx.await.map_err(|_| {
        TraceError::TransportFailed("Session failed before delivering its trace".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::collaborators::{NoLastUse, SharedScriptId};

    fn discard_logger() -> TraceLogger<DiscardSink> {
        TraceLogger::new(
            DiscardSink,
            Box::new(NoLastUse),
            Box::new(SharedScriptId::new(1)),
        )
    }

    #[test]
    fn test_clock_counts_real_events() {
        let mut logger = discard_logger();
        assert_eq!(logger.time(), -1);

        logger.log_create_obj(1, 2).unwrap();
        logger.log_write(1, "x", 2).unwrap();
        logger.log_return(2).unwrap();

        assert_eq!(logger.time(), 2);
    }

    #[test]
    fn test_metadata_does_not_tick() {
        let mut logger = discard_logger();
        logger.log_create_obj(1, 2).unwrap();

        logger.log_last_use(2, 0, "1:1").unwrap();
        logger.end_last_use().unwrap();
        logger.log_free_vars(3, FreeVars::Any).unwrap();
        logger.log_source_mapping(3, 1, 1, 2, 2).unwrap();

        assert_eq!(logger.time(), 0);
    }

    #[test]
    fn test_flush_marker_ticks_once() {
        let mut logger = discard_logger();
        logger.set_flush_iid(4, 5).unwrap();
        assert_eq!(
            logger.flush_iid(),
            Some(FlushMarker {
                source_file_id: 4,
                iid: 5
            })
        );

        logger.log_create_obj(1, 2).unwrap();

        assert_eq!(logger.time(), 1);
        assert!(logger.flush_iid().is_none());
        assert!(logger.set_flush_iid(4, 6).is_ok());
    }

    #[test]
    fn test_double_flush_marker_fails() {
        let mut logger = discard_logger();
        logger.set_flush_iid(4, 5).unwrap();

        let err = logger.set_flush_iid(4, 6).unwrap_err();
        assert!(matches!(err, TraceError::FlushMarkerPending { .. }));
    }

    #[test]
    fn test_stopped_logger_keeps_clock() {
        let mut logger = discard_logger();
        logger.log_create_obj(1, 2).unwrap();
        logger.stop_tracing();

        logger.log_create_obj(3, 4).unwrap();
        logger.log_last_use(2, 0, "x").unwrap();

        assert_eq!(logger.time(), 0);
    }

    #[test]
    fn test_null_logger_completes() {
        let mut logger: Box<dyn Logger> = Box::new(NullLogger);
        logger.log_create_obj(1, 2).unwrap();
        assert_eq!(logger.time(), -1);

        let (tx, rx) = std::sync::mpsc::channel();
        logger
            .end(Box::new(move || {
                tx.send(()).unwrap();
            }))
            .unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_open_discard_from_config() {
        let config = TraceConfig {
            sink: SinkKind::Discard,
            ..Default::default()
        };
        let mut logger =
            open_logger(&config, Box::new(NoLastUse), Box::new(SharedScriptId::new(0))).unwrap();
        logger.log_declare(1, "a", 2).unwrap();
        assert_eq!(logger.time(), 0);
    }
}
