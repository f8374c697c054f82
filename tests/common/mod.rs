//! Test-only reader for the binary trace format

#![allow(dead_code)]

use memtrace_engine::recording::{EntryKind, StringEncoding};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Int(i32),
    Str(String),
    /// Free-variable "any" marker
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: EntryKind,
    pub fields: Vec<Field>,
}

impl Record {
    pub fn int(&self, i: usize) -> i32 {
        match &self.fields[i] {
            Field::Int(v) => *v,
            other => panic!("field {} of {:?} is {:?}", i, self.kind, other),
        }
    }

    pub fn string(&self, i: usize) -> &str {
        match &self.fields[i] {
            Field::Str(s) => s,
            other => panic!("field {} of {:?} is {:?}", i, self.kind, other),
        }
    }
}

fn layout(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Declare | EntryKind::Write => "ISI",
        EntryKind::CreateObj
        | EntryKind::FunctionEnter
        | EntryKind::UpdateIid
        | EntryKind::Debug
        | EntryKind::CreateDomNode
        | EntryKind::AddDomChild
        | EntryKind::RemoveDomChild => "II",
        EntryKind::CreateFun => "III",
        EntryKind::PutField | EntryKind::AddToChildSet | EntryKind::RemoveFromChildSet => "IISI",
        EntryKind::LastUse => "IIS",
        EntryKind::FunctionExit
        | EntryKind::Return
        | EntryKind::DomRoot
        | EntryKind::ScriptExit
        | EntryKind::UpdateCurrentScript => "I",
        EntryKind::TopLevelFlush => "S",
        EntryKind::Call => "IIII",
        EntryKind::ScriptEnter => "IIS",
        EntryKind::SourceMapping => "IIIII",
        EntryKind::EndLastUse => "",
        EntryKind::FreeVars => "I",
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    encoding: StringEncoding,
}

impl Reader<'_> {
    fn byte(&mut self) -> u8 {
        let b = self.bytes[self.pos];
        self.pos += 1;
        b
    }

    fn int(&mut self) -> i32 {
        let raw: [u8; 4] = self.bytes[self.pos..self.pos + 4].try_into().unwrap();
        self.pos += 4;
        i32::from_be_bytes(raw)
    }

    fn string(&mut self) -> String {
        let len = self.int() as usize;
        let raw = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        match self.encoding {
            StringEncoding::Bytes => String::from_utf8(raw.to_vec()).unwrap(),
            StringEncoding::Utf16 => {
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).unwrap()
            }
        }
    }
}

/// Decode every record; panics on malformed input or trailing bytes
pub fn decode(bytes: &[u8], encoding: StringEncoding) -> Vec<Record> {
    let mut reader = Reader {
        bytes,
        pos: 0,
        encoding,
    };
    let mut records = Vec::new();

    while reader.pos < bytes.len() {
        let tag = reader.byte();
        let kind = EntryKind::from_tag(tag).unwrap_or_else(|| panic!("unknown tag {}", tag));
        let mut fields = Vec::new();

        for field in layout(kind).chars() {
            match field {
                'I' => fields.push(Field::Int(reader.int())),
                'S' => fields.push(Field::Str(reader.string())),
                _ => unreachable!(),
            }
        }

        if kind == EntryKind::FreeVars {
            let count = reader.int();
            if count == -1 {
                assert_eq!(reader.string(), "ANY");
                fields.push(Field::Any);
            } else {
                let names = (0..count).map(|_| reader.string()).collect();
                fields.push(Field::List(names));
            }
        }

        records.push(Record { kind, fields });
    }

    assert_eq!(reader.pos, bytes.len());
    records
}

pub fn kinds(records: &[Record]) -> Vec<EntryKind> {
    records.iter().map(|r| r.kind).collect()
}
