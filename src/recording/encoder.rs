// src/recording/encoder.rs
//! Binary record encoder
//!
//! Each record is self-delimiting: a 1-byte tag, 4-byte big-endian integers
//! and length-prefixed strings. The encoder computes a record's exact length
//! first, asks the sink to make room for it, then writes it field by field.
//!
//! # Strings
//!
//! - [`StringEncoding::Bytes`]: length = byte count, raw UTF-8 bytes
//! - [`StringEncoding::Utf16`]: length = 2 × UTF-16 unit count, each unit
//!   low byte first. Characters outside the basic plane come out as two
//!   independent surrogate units; readers must not expect anything smarter.
//!
//! Free-variable records write a length of `-1` followed by a single string
//! when the function may capture any variable, and a count followed by that
//! many strings otherwise.

use crate::recording::entry::{Event, FreeVars, ANY_FREE_VAR};
use crate::recording::sink::Sink;
use crate::utils::errors::Result;

/// Size of a record tag
pub const TAG_LEN: usize = 1;

/// Size of an encoded integer
pub const INT_LEN: usize = 4;

/// Count written before a free-variable list that means "any variable"
pub const ANY_FREE_VARS_COUNT: i32 = -1;

/// How strings are laid out on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    /// UTF-8 bytes, used by file sinks
    Bytes,

    /// 16-bit units, low byte first, used by the streaming sink
    Utf16,
}

impl StringEncoding {
    /// Payload length of `value`, excluding its 4-byte length prefix
    pub fn payload_len(self, value: &str) -> usize {
        match self {
            StringEncoding::Bytes => value.len(),
            StringEncoding::Utf16 => value.encode_utf16().count() * 2,
        }
    }

    /// Write `value` (without prefix) into `dst`, which must be exactly `payload_len` long
    pub fn write_payload(self, value: &str, dst: &mut [u8]) {
        match self {
            StringEncoding::Bytes => dst.copy_from_slice(value.as_bytes()),
            StringEncoding::Utf16 => {
                for (unit, pair) in value.encode_utf16().zip(dst.chunks_exact_mut(2)) {
                    pair[0] = unit as u8;
                    pair[1] = (unit >> 8) as u8;
                }
            }
        }
    }
}

fn string_len<S: Sink + ?Sized>(sink: &S, value: &str) -> usize {
    INT_LEN + sink.string_length(value)
}

/// Exact encoded length of `event` for `sink`
pub fn encoded_len<S: Sink + ?Sized>(event: &Event<'_>, sink: &S) -> usize {
    let fields = match event {
        Event::EndLastUse => 0,
        Event::FunctionExit { .. }
        | Event::Return { .. }
        | Event::DomRoot { .. }
        | Event::ScriptExit { .. }
        | Event::UpdateCurrentScript { .. } => INT_LEN,
        Event::CreateObj { .. }
        | Event::FunctionEnter { .. }
        | Event::UpdateIid { .. }
        | Event::Debug { .. }
        | Event::CreateDomNode { .. }
        | Event::AddDomChild { .. }
        | Event::RemoveDomChild { .. } => 2 * INT_LEN,
        Event::CreateFun { .. } => 3 * INT_LEN,
        Event::Call { .. } => 4 * INT_LEN,
        Event::SourceMapping { .. } => 5 * INT_LEN,
        Event::Declare { name, .. } | Event::Write { name, .. } => {
            2 * INT_LEN + string_len(sink, name)
        }
        Event::PutField { prop_name, .. } => 3 * INT_LEN + string_len(sink, prop_name),
        Event::AddToChildSet { name, .. } | Event::RemoveFromChildSet { name, .. } => {
            3 * INT_LEN + string_len(sink, name)
        }
        Event::LastUse { source_id, .. } => 2 * INT_LEN + string_len(sink, source_id),
        Event::ScriptEnter { filename, .. } => 2 * INT_LEN + string_len(sink, filename),
        Event::TopLevelFlush { marker } => string_len(sink, marker),
        Event::FreeVars { names, .. } => {
            let list = match names {
                FreeVars::Any => string_len(sink, ANY_FREE_VAR),
                FreeVars::Names(names) => names.iter().map(|n| string_len(sink, n)).sum(),
            };
            2 * INT_LEN + list
        }
    };

    TAG_LEN + fields
}

/// Append `event` to `sink`, flushing first if it would not fit
pub fn encode<S: Sink + ?Sized>(event: &Event<'_>, sink: &mut S) -> Result<()> {
    let len = encoded_len(event, sink);
    sink.ensure_capacity(len)?;
    sink.write_byte(event.kind().tag());

    match *event {
        Event::EndLastUse => {}
        Event::Declare { iid, name, obj_id } | Event::Write { iid, name, obj_id } => {
            sink.write_int(iid);
            sink.write_string(name);
            sink.write_int(obj_id);
        }
        Event::CreateObj { iid, obj_id }
        | Event::CreateDomNode { iid, obj_id }
        | Event::Debug {
            call_iid: iid,
            obj_id,
        } => {
            sink.write_int(iid);
            sink.write_int(obj_id);
        }
        Event::CreateFun {
            iid,
            fun_enter_iid,
            obj_id,
        } => {
            sink.write_int(iid);
            sink.write_int(fun_enter_iid);
            sink.write_int(obj_id);
        }
        Event::PutField {
            iid,
            base_obj_id: parent,
            prop_name: name,
            val_obj_id: child,
        }
        | Event::AddToChildSet {
            iid,
            parent_obj_id: parent,
            name,
            child_obj_id: child,
        }
        | Event::RemoveFromChildSet {
            iid,
            parent_obj_id: parent,
            name,
            child_obj_id: child,
        } => {
            sink.write_int(iid);
            sink.write_int(parent);
            sink.write_string(name);
            sink.write_int(child);
        }
        Event::LastUse {
            obj_id,
            timestamp,
            source_id,
        } => {
            sink.write_int(obj_id);
            sink.write_int(timestamp);
            sink.write_string(source_id);
        }
        Event::FunctionEnter { iid, fun_obj_id } => {
            sink.write_int(iid);
            sink.write_int(fun_obj_id);
        }
        Event::UpdateIid { obj_id, new_iid } => {
            sink.write_int(obj_id);
            sink.write_int(new_iid);
        }
        Event::AddDomChild {
            parent_obj_id,
            child_obj_id,
        }
        | Event::RemoveDomChild {
            parent_obj_id,
            child_obj_id,
        } => {
            sink.write_int(parent_obj_id);
            sink.write_int(child_obj_id);
        }
        Event::FunctionExit { iid: value }
        | Event::ScriptExit { iid: value }
        | Event::Return { obj_id: value }
        | Event::DomRoot { obj_id: value }
        | Event::UpdateCurrentScript { script_id: value } => {
            sink.write_int(value);
        }
        Event::Call {
            iid,
            fun_obj_id,
            fun_enter_iid,
            fun_sid,
        } => {
            sink.write_int(iid);
            sink.write_int(fun_obj_id);
            sink.write_int(fun_enter_iid);
            sink.write_int(fun_sid);
        }
        Event::ScriptEnter {
            iid,
            script_id,
            filename,
        } => {
            sink.write_int(iid);
            sink.write_int(script_id);
            sink.write_string(filename);
        }
        Event::FreeVars { iid, names } => {
            sink.write_int(iid);
            match names {
                FreeVars::Any => {
                    sink.write_int(ANY_FREE_VARS_COUNT);
                    sink.write_string(ANY_FREE_VAR);
                }
                FreeVars::Names(names) => {
                    sink.write_int(names.len() as i32);
                    for name in names {
                        sink.write_string(name);
                    }
                }
            }
        }
        Event::SourceMapping {
            iid,
            start_line,
            start_column,
            end_line,
            end_column,
        } => {
            sink.write_int(iid);
            sink.write_int(start_line);
            sink.write_int(start_column);
            sink.write_int(end_line);
            sink.write_int(end_column);
        }
        Event::TopLevelFlush { marker } => {
            sink.write_string(marker);
        }
    }

    Ok(())
}
