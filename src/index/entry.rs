use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// First field of the single line written for a source with no header at all.
pub const HEADERLESS_MARKER: &str = "<_-_>";

/// A run of sequence bytes: absolute offset of its first byte and the number
/// of non-newline bytes it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: u64,
    pub length: u64,
}

/// A complete index record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub identifier: String,
    pub header_offset: u64,
    pub body_offset: u64,
    pub body_length: u64,
    /// Partition whose byte range holds the header
    pub partition: u32,
}

/// Text in front of a partition's first header, or the whole partition when
/// it holds no header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadingText {
    /// First line up to the first space or tab. May be empty. Kept as raw
    /// bytes because a partition edge can cut a multi-byte character.
    pub token: Vec<u8>,
    /// Whether `token` was ended by a space or tab rather than by the end of
    /// the line or the partition.
    pub token_terminated: bool,
    /// Measured from the partition start.
    pub whole: Span,
    /// Measured from the byte after the first newline; `None` when the text
    /// holds no newline.
    pub after_first_line: Option<Span>,
    /// Absolute offset one past the last byte of the text.
    pub end: u64,
    /// The text runs to the end of the object.
    pub reaches_end: bool,
    pub partition: u32,
}

/// A header line cut by the end of its partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIdentifier {
    /// Identifier bytes seen so far, without the marker.
    pub fragment: Vec<u8>,
    /// The fragment is followed by a separator, so it is the full identifier.
    pub complete: bool,
    pub header_offset: u64,
    pub partition: u32,
}

impl SplitIdentifier {
    /// Identifier once `continuation` (the first token after the cut) is known.
    pub fn resolve_identifier(&self, continuation: &[u8]) -> String {
        if self.complete {
            String::from_utf8_lossy(&self.fragment).into_owned()
        } else {
            let mut joined = self.fragment.clone();
            joined.extend_from_slice(continuation);
            String::from_utf8_lossy(&joined).into_owned()
        }
    }
}

/// One output item of a partition scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Record(Record),
    SplitHeader(LeadingText),
    SplitIdentifier(SplitIdentifier),
    Continuation(LeadingText),
}

impl Entry {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Entry::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn partition(&self) -> u32 {
        match self {
            Entry::Record(r) => r.partition,
            Entry::SplitHeader(t) | Entry::Continuation(t) => t.partition,
            Entry::SplitIdentifier(m) => m.partition,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Entry::Record(_) => "record",
            Entry::SplitHeader(_) => "split-header",
            Entry::SplitIdentifier(_) => "split-identifier",
            Entry::Continuation(_) => "continuation",
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.identifier, self.header_offset, self.body_offset, self.body_length, self.partition
        )
    }
}

impl FromStr for Record {
    type Err = Error;

    /// Parse one index line. The reported line number is 0; callers that
    /// know it rewrite the error.
    fn from_str(line: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidIndex { line: 0, reason };

        let fields: Vec<&str> = line.trim_end_matches(['\n', '\r']).split(' ').collect();
        if fields.len() != 5 {
            return Err(invalid(format!("expected 5 fields, found {}", fields.len())));
        }

        let number = |i: usize| {
            fields[i]
                .parse::<u64>()
                .map_err(|e| invalid(format!("field {}: {}", i + 1, e)))
        };

        Ok(Record {
            identifier: fields[0].to_string(),
            header_offset: number(1)?,
            body_offset: number(2)?,
            body_length: number(3)?,
            partition: u32::try_from(number(4)?)
                .map_err(|e| invalid(format!("field 5: {}", e)))?,
        })
    }
}
