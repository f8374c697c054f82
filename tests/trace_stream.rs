//! End-to-end checks of the record stream produced by the sequencing logger

mod common;

use common::{decode, kinds, Field, Record};
use memtrace_engine::recording::{
    finish, open_logger, BinaryFileSink, EntryKind, FreeVars, LastUseLog, LastUseTracker, Logger,
    NoLastUse, SharedScriptId, StringEncoding, TraceLogger,
};
use memtrace_engine::{Result, SinkKind, TraceConfig, TraceError};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

fn file_logger(path: &Path, capacity: usize, script: &SharedScriptId) -> TraceLogger<BinaryFileSink> {
    let sink = BinaryFileSink::create(path, capacity).unwrap();
    TraceLogger::new(sink, Box::new(NoLastUse), Box::new(script.clone()))
}

fn end_and_decode(logger: Box<dyn Logger>, path: &Path) -> Vec<Record> {
    logger.end(Box::new(|| {})).unwrap();
    decode(&std::fs::read(path).unwrap(), StringEncoding::Bytes)
}

/// Replays a fixed batch of last-use facts on every flush
struct ScriptedLastUse {
    flushes: Rc<RefCell<usize>>,
}

impl LastUseTracker for ScriptedLastUse {
    fn flush_last_use(&mut self, log: &mut dyn LastUseLog) -> Result<()> {
        *self.flushes.borrow_mut() += 1;
        log.log_last_use(100, 7, "1:9")?;
        log.end_last_use()
    }
}

#[test]
fn test_two_records_in_call_order() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(-1);
    let mut logger = file_logger(file.path(), 64, &script);

    logger.log_create_obj(1, 2).unwrap();
    logger.log_write(1, "x", 2).unwrap();

    let records = end_and_decode(Box::new(logger), file.path());
    assert_eq!(
        records,
        vec![
            Record {
                kind: EntryKind::CreateObj,
                fields: vec![Field::Int(1), Field::Int(2)],
            },
            Record {
                kind: EntryKind::Write,
                fields: vec![Field::Int(1), Field::Str("x".to_string()), Field::Int(2)],
            },
        ]
    );
}

#[test]
fn test_every_operation_decodes() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(-1);
    let mut logger = file_logger(file.path(), 48, &script);

    logger.log_declare(1, "a", 2).unwrap();
    logger.log_create_obj(3, 4).unwrap();
    logger.log_create_fun(5, 6, 7).unwrap();
    logger.log_put_field(8, 9, "prop", 10).unwrap();
    logger.log_write(11, "b", 12).unwrap();
    logger.log_last_use(13, 14, "2:15").unwrap();
    logger.end_last_use().unwrap();
    logger.log_function_enter(16, 17).unwrap();
    logger.log_function_exit(18).unwrap();
    logger.log_update_iid(19, 20).unwrap();
    logger.log_debug(21, 22).unwrap();
    logger.log_return(23).unwrap();
    logger.log_create_dom_node(24, 25).unwrap();
    logger.log_add_dom_child(26, 27).unwrap();
    logger.log_remove_dom_child(28, 29).unwrap();
    logger.log_add_to_child_set(30, 31, "kids", 32).unwrap();
    logger.log_remove_from_child_set(33, 34, "kids", 35).unwrap();
    logger.log_dom_root(36).unwrap();
    logger.log_call(37, 38, 39, 40).unwrap();
    logger.log_script_enter(41, 42, "lib/app.js").unwrap();
    logger.log_script_exit(43).unwrap();
    logger.log_free_vars(44, FreeVars::Names(&["p", "q"])).unwrap();
    logger.log_free_vars(45, FreeVars::Any).unwrap();
    logger.log_source_mapping(46, 1, 2, 3, 4).unwrap();

    let records = end_and_decode(Box::new(logger), file.path());
    assert_eq!(
        kinds(&records),
        vec![
            EntryKind::Declare,
            EntryKind::CreateObj,
            EntryKind::CreateFun,
            EntryKind::PutField,
            EntryKind::Write,
            EntryKind::LastUse,
            EntryKind::EndLastUse,
            EntryKind::FunctionEnter,
            EntryKind::FunctionExit,
            EntryKind::UpdateIid,
            EntryKind::Debug,
            EntryKind::Return,
            EntryKind::CreateDomNode,
            EntryKind::AddDomChild,
            EntryKind::RemoveDomChild,
            EntryKind::AddToChildSet,
            EntryKind::RemoveFromChildSet,
            EntryKind::DomRoot,
            EntryKind::Call,
            EntryKind::ScriptEnter,
            EntryKind::ScriptExit,
            EntryKind::FreeVars,
            EntryKind::FreeVars,
            EntryKind::SourceMapping,
        ]
    );

    assert_eq!(records[3].string(2), "prop");
    assert_eq!(records[5].string(2), "2:15");
    assert_eq!(records[19].string(2), "lib/app.js");
    assert_eq!(
        records[21].fields[1],
        Field::List(vec!["p".to_string(), "q".to_string()])
    );
    assert_eq!(records[22].fields[1], Field::Any);
    assert_eq!(records[23].int(4), 4);
}

#[test]
fn test_stop_tracing_writes_nothing_more() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(-1);
    let mut logger = file_logger(file.path(), 64, &script);

    logger.log_create_obj(1, 2).unwrap();
    logger.stop_tracing();

    script.set(9);
    logger.log_create_obj(3, 4).unwrap();
    logger.log_write(3, "y", 4).unwrap();
    logger.log_free_vars(3, FreeVars::Any).unwrap();

    let records = end_and_decode(Box::new(logger), file.path());
    assert_eq!(kinds(&records), vec![EntryKind::CreateObj]);
}

#[test]
fn test_end_last_use_written_after_stop() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(-1);
    let mut logger = file_logger(file.path(), 64, &script);

    logger.stop_tracing();
    logger.log_last_use(1, 2, "x").unwrap();
    logger.end_last_use().unwrap();

    let records = end_and_decode(Box::new(logger), file.path());
    assert_eq!(kinds(&records), vec![EntryKind::EndLastUse]);
}

#[test]
fn test_flush_marker_precedes_next_real_event() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(-1);
    let mut logger = file_logger(file.path(), 64, &script);

    logger.set_flush_iid(3, 40).unwrap();
    logger.log_create_obj(1, 2).unwrap();
    logger.set_flush_iid(3, 41).unwrap();
    logger.log_return(2).unwrap();
    assert_eq!(logger.time(), 3);

    let records = end_and_decode(Box::new(logger), file.path());
    assert_eq!(
        kinds(&records),
        vec![
            EntryKind::TopLevelFlush,
            EntryKind::CreateObj,
            EntryKind::TopLevelFlush,
            EntryKind::Return,
        ]
    );
    assert_eq!(records[0].string(0), "3:40");
    assert_eq!(records[2].string(0), "3:41");
}

#[test]
fn test_second_flush_marker_is_a_precondition_violation() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(-1);
    let mut logger = file_logger(file.path(), 64, &script);

    logger.set_flush_iid(1, 1).unwrap();
    let err = logger.set_flush_iid(1, 2).unwrap_err();
    assert!(matches!(err, TraceError::FlushMarkerPending { .. }));
}

#[test]
fn test_script_change_announced_once() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(5);
    let mut logger = file_logger(file.path(), 64, &script);

    logger.log_create_obj(1, 1).unwrap();
    logger.log_create_obj(2, 2).unwrap();
    script.set(6);
    logger.log_create_obj(3, 3).unwrap();
    assert_eq!(logger.time(), 2);

    let records = end_and_decode(Box::new(logger), file.path());
    assert_eq!(
        kinds(&records),
        vec![
            EntryKind::UpdateCurrentScript,
            EntryKind::CreateObj,
            EntryKind::CreateObj,
            EntryKind::UpdateCurrentScript,
            EntryKind::CreateObj,
        ]
    );
    assert_eq!(records[0].int(0), 5);
    assert_eq!(records[3].int(0), 6);
}

#[test]
fn test_create_obj_in_other_script_is_bracketed() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(2);
    let mut logger = file_logger(file.path(), 64, &script);

    logger.log_create_obj_diff_script(7, 11, 12).unwrap();
    logger.log_create_obj(13, 14).unwrap();
    assert_eq!(logger.time(), 1);

    let records = end_and_decode(Box::new(logger), file.path());
    assert_eq!(
        kinds(&records),
        vec![
            EntryKind::UpdateCurrentScript,
            EntryKind::UpdateCurrentScript,
            EntryKind::CreateObj,
            EntryKind::UpdateCurrentScript,
            EntryKind::CreateObj,
        ]
    );
    assert_eq!(records[0].int(0), 2);
    assert_eq!(records[1].int(0), 7);
    assert_eq!(records[3].int(0), 2);
}

#[test]
fn test_last_use_flushed_periodically() {
    let file = NamedTempFile::new().unwrap();
    let flushes = Rc::new(RefCell::new(0));
    let sink = BinaryFileSink::create(file.path(), 256).unwrap();
    let mut logger = TraceLogger::new(
        sink,
        Box::new(ScriptedLastUse {
            flushes: Rc::clone(&flushes),
        }),
        Box::new(SharedScriptId::new(-1)),
    )
    .with_last_use_flush_period(3);

    for i in 0..10 {
        logger.log_create_obj(i, i).unwrap();
    }

    assert_eq!(*flushes.borrow(), 2);
    assert_eq!(logger.time(), 9);

    let records = end_and_decode(Box::new(logger), file.path());
    let positions: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.kind == EntryKind::LastUse)
        .map(|(i, _)| i)
        .collect();

    // before the 5th and the 8th object creation
    assert_eq!(positions, vec![4, 9]);
    assert_eq!(records[5].kind, EntryKind::EndLastUse);
    assert_eq!(records[4].int(0), 100);
    assert_eq!(records.len(), 14);
}

#[test]
fn test_small_buffer_keeps_records_whole() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(-1);
    let mut logger = file_logger(file.path(), 32, &script);

    for i in 0..200 {
        logger.log_put_field(i, i + 1, "field", i + 2).unwrap();
    }

    let records = end_and_decode(Box::new(logger), file.path());
    assert_eq!(records.len(), 200);
    assert!(records
        .iter()
        .enumerate()
        .all(|(i, r)| r.kind == EntryKind::PutField && r.int(0) == i as i32));
}

#[test]
fn test_oversized_record_is_an_error() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(-1);
    let mut logger = file_logger(file.path(), 16, &script);

    let long_name = "n".repeat(64);
    let err = logger.log_write(1, &long_name, 2).unwrap_err();
    assert!(matches!(err, TraceError::RecordTooLarge { .. }));
}

#[test]
fn test_text_sink_from_config() {
    let file = NamedTempFile::new().unwrap();
    let config = TraceConfig {
        sink: SinkKind::TextFile,
        text_trace_path: file.path().to_path_buf(),
        ..Default::default()
    };

    let mut logger =
        open_logger(&config, Box::new(NoLastUse), Box::new(SharedScriptId::new(3))).unwrap();
    logger.log_create_obj(1, 2).unwrap();
    logger.log_write(1, "x", 2).unwrap();
    logger.end(Box::new(|| {})).unwrap();

    assert_eq!(
        std::fs::read_to_string(file.path()).unwrap(),
        "23,3,1,1,2,4,1,x,2,"
    );
}

#[test]
fn test_discard_session_completes_once() {
    let config = TraceConfig {
        sink: SinkKind::Discard,
        ..Default::default()
    };
    let mut logger =
        open_logger(&config, Box::new(NoLastUse), Box::new(SharedScriptId::new(0))).unwrap();
    for i in 0..100 {
        logger.log_call(i, i, i, i).unwrap();
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    logger
        .end(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_finish_waits_for_file_session() {
    let file = NamedTempFile::new().unwrap();
    let script = SharedScriptId::new(-1);
    let mut logger = file_logger(file.path(), 64, &script);
    logger.log_dom_root(1).unwrap();

    finish(Box::new(logger)).await.unwrap();
    assert_eq!(std::fs::read(file.path()).unwrap(), vec![17, 0, 0, 0, 1]);
}
