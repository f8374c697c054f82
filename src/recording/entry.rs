// src/recording/entry.rs
//! Trace record model
//!
//! One [`Event`] per observed runtime action. Events borrow their strings
//! from the caller and live only for the duration of one encode call.

use std::fmt;

/// Wire tag of each record kind
///
/// Values are part of the trace format and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntryKind {
    Declare = 0,
    CreateObj = 1,
    CreateFun = 2,
    PutField = 3,
    Write = 4,
    LastUse = 5,
    FunctionEnter = 6,
    FunctionExit = 7,
    TopLevelFlush = 8,
    UpdateIid = 9,
    Debug = 10,
    Return = 11,
    CreateDomNode = 12,
    AddDomChild = 13,
    RemoveDomChild = 14,
    AddToChildSet = 15,
    RemoveFromChildSet = 16,
    DomRoot = 17,
    Call = 18,
    ScriptEnter = 19,
    ScriptExit = 20,
    FreeVars = 21,
    SourceMapping = 22,
    UpdateCurrentScript = 23,
    EndLastUse = 24,
}

impl EntryKind {
    /// Every kind, in tag order
    pub const ALL: [EntryKind; 25] = [
        EntryKind::Declare,
        EntryKind::CreateObj,
        EntryKind::CreateFun,
        EntryKind::PutField,
        EntryKind::Write,
        EntryKind::LastUse,
        EntryKind::FunctionEnter,
        EntryKind::FunctionExit,
        EntryKind::TopLevelFlush,
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
        EntryKind::SourceMapping,
        EntryKind::UpdateCurrentScript,
        EntryKind::EndLastUse,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }
}

/// Name of the single "any variable" free-variable entry
pub const ANY_FREE_VAR: &str = "ANY";

/// Free variables captured by a function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeVars<'a> {
    /// The function may capture anything (e.g. it calls `eval`)
    Any,

    /// Exactly these names
    Names(&'a [&'a str]),
}

/// Pending top-level expression boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushMarker {
    pub source_file_id: i32,
    pub iid: i32,
}

impl fmt::Display for FlushMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_file_id, self.iid)
    }
}

/// A single trace record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    Declare { iid: i32, name: &'a str, obj_id: i32 },
    CreateObj { iid: i32, obj_id: i32 },
    CreateFun { iid: i32, fun_enter_iid: i32, obj_id: i32 },
    PutField { iid: i32, base_obj_id: i32, prop_name: &'a str, val_obj_id: i32 },
    Write { iid: i32, name: &'a str, obj_id: i32 },
    LastUse { obj_id: i32, timestamp: i32, source_id: &'a str },
    EndLastUse,
    FunctionEnter { iid: i32, fun_obj_id: i32 },
    FunctionExit { iid: i32 },
    UpdateIid { obj_id: i32, new_iid: i32 },
    Debug { call_iid: i32, obj_id: i32 },
    Return { obj_id: i32 },
    CreateDomNode { iid: i32, obj_id: i32 },
    AddDomChild { parent_obj_id: i32, child_obj_id: i32 },
    RemoveDomChild { parent_obj_id: i32, child_obj_id: i32 },
    AddToChildSet { iid: i32, parent_obj_id: i32, name: &'a str, child_obj_id: i32 },
    RemoveFromChildSet { iid: i32, parent_obj_id: i32, name: &'a str, child_obj_id: i32 },
    DomRoot { obj_id: i32 },
    Call { iid: i32, fun_obj_id: i32, fun_enter_iid: i32, fun_sid: i32 },
    ScriptEnter { iid: i32, script_id: i32, filename: &'a str },
    ScriptExit { iid: i32 },
    FreeVars { iid: i32, names: FreeVars<'a> },
    SourceMapping { iid: i32, start_line: i32, start_column: i32, end_line: i32, end_column: i32 },
    UpdateCurrentScript { script_id: i32 },
    TopLevelFlush { marker: &'a str },
}

impl Event<'_> {
    pub fn kind(&self) -> EntryKind {
        match self {
            Event::Declare { .. } => EntryKind::Declare,
            Event::CreateObj { .. } => EntryKind::CreateObj,
            Event::CreateFun { .. } => EntryKind::CreateFun,
            Event::PutField { .. } => EntryKind::PutField,
            Event::Write { .. } => EntryKind::Write,
            Event::LastUse { .. } => EntryKind::LastUse,
            Event::EndLastUse => EntryKind::EndLastUse,
            Event::FunctionEnter { .. } => EntryKind::FunctionEnter,
            Event::FunctionExit { .. } => EntryKind::FunctionExit,
            Event::UpdateIid { .. } => EntryKind::UpdateIid,
            Event::Debug { .. } => EntryKind::Debug,
            Event::Return { .. } => EntryKind::Return,
            Event::CreateDomNode { .. } => EntryKind::CreateDomNode,
            Event::AddDomChild { .. } => EntryKind::AddDomChild,
            Event::RemoveDomChild { .. } => EntryKind::RemoveDomChild,
            Event::AddToChildSet { .. } => EntryKind::AddToChildSet,
            Event::RemoveFromChildSet { .. } => EntryKind::RemoveFromChildSet,
            Event::DomRoot { .. } => EntryKind::DomRoot,
            Event::Call { .. } => EntryKind::Call,
            Event::ScriptEnter { .. } => EntryKind::ScriptEnter,
            Event::ScriptExit { .. } => EntryKind::ScriptExit,
            Event::FreeVars { .. } => EntryKind::FreeVars,
            Event::SourceMapping { .. } => EntryKind::SourceMapping,
            Event::UpdateCurrentScript { .. } => EntryKind::UpdateCurrentScript,
            Event::TopLevelFlush { .. } => EntryKind::TopLevelFlush,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_match_positions() {
        for (i, kind) in EntryKind::ALL.iter().enumerate() {
            assert_eq!(kind.tag() as usize, i);
            assert_eq!(EntryKind::from_tag(i as u8), Some(*kind));
        }
        assert_eq!(EntryKind::from_tag(25), None);
    }

    #[test]
    fn test_flush_marker_label() {
        let marker = FlushMarker {
            source_file_id: 4,
            iid: 1201,
        };
        assert_eq!(marker.to_string(), "4:1201");
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(Event::EndLastUse.kind(), EntryKind::EndLastUse);
        assert_eq!(
            Event::FreeVars {
                iid: 1,
                names: FreeVars::Any
            }
            .kind(),
            EntryKind::FreeVars
        );
    }
}
