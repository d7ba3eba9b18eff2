//! Per-partition scan.
//!
//! A partition is an arbitrary byte range of the source, so its edges know
//! nothing about record structure. The scan emits complete [`Record`]s for
//! every header it sees in full and a boundary entry wherever a record is cut:
//!
//! - text before the first header of a non-first partition becomes a
//!   [`Entry::SplitHeader`] (tail of the previous partition's last record, or
//!   the rest of a header line cut there);
//! - a header line without its newline becomes a [`Entry::SplitIdentifier`];
//! - a partition with no header at all becomes a single
//!   [`Entry::Continuation`].
//!
//! Scanning is pure and never fails. Rescanning the same bytes yields the
//! same entries, so a failed task can always be rerun.

use super::entry::{Entry, LeadingText, Record, Span, SplitIdentifier};
use crate::partition::Partition;

/// First byte of every header line.
pub const MARKER: u8 = b'>';

/// Scan the bytes of `partition`.
pub fn scan(partition: &Partition, data: &[u8]) -> Vec<Entry> {
    if data.is_empty() {
        return Vec::new();
    }

    let headers = header_positions(data);
    let Some(&first) = headers.first() else {
        return vec![Entry::Continuation(leading_text(partition, data, data.len()))];
    };

    let mut state = ScanState::default();
    // Partition 0 starts at the top of the file; anything before its first
    // header is not part of a record.
    if !partition.is_first() && first > 0 {
        state
            .entries
            .push(Entry::SplitHeader(leading_text(partition, data, first)));
    }

    headers
        .iter()
        .fold(state, |state, &pos| state.header(partition, data, pos))
        .finish(partition, data)
}

/// Offsets of marker bytes at the start of a line.
///
/// Position 0 always counts as a line start. A marker in the middle of a
/// line (possible inside header free text) is never a candidate.
fn header_positions(data: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    if data[0] == MARKER {
        positions.push(0);
    }
    positions.extend(
        data.windows(2)
            .enumerate()
            .filter(|(_, w)| w[0] == b'\n' && w[1] == MARKER)
            .map(|(i, _)| i + 1),
    );
    positions
}

/// Record whose header has been seen but whose body end is not known yet.
struct OpenRecord {
    identifier: String,
    header_offset: u64,
    body_start: usize,
}

#[derive(Default)]
struct ScanState {
    entries: Vec<Entry>,
    open: Option<OpenRecord>,
}

impl ScanState {
    fn header(mut self, partition: &Partition, data: &[u8], pos: usize) -> Self {
        self.close(partition, data, pos);

        let base = partition.min_range;
        let line = &data[pos + 1..];
        match line.iter().position(|&b| b == b'\n') {
            Some(len) => {
                let (identifier, _) = identifier_token(&line[..len]);
                self.open = Some(OpenRecord {
                    identifier: String::from_utf8_lossy(identifier).into_owned(),
                    header_offset: base + pos as u64,
                    body_start: pos + 1 + len + 1,
                });
            }
            None if partition.is_last() => {
                // The file itself ends inside this header line
                let (identifier, _) = identifier_token(line);
                self.entries.push(Entry::Record(Record {
                    identifier: String::from_utf8_lossy(identifier).into_owned(),
                    header_offset: base + pos as u64,
                    body_offset: base + data.len() as u64,
                    body_length: 0,
                    partition: partition.id,
                }));
            }
            None => {
                let (fragment, complete) = identifier_token(line);
                self.entries.push(Entry::SplitIdentifier(SplitIdentifier {
                    fragment: fragment.to_vec(),
                    complete,
                    header_offset: base + pos as u64,
                    partition: partition.id,
                }));
            }
        }
        self
    }

    /// Emit the open record with its body ending at `end`.
    fn close(&mut self, partition: &Partition, data: &[u8], end: usize) {
        if let Some(open) = self.open.take() {
            self.entries.push(Entry::Record(Record {
                identifier: open.identifier,
                header_offset: open.header_offset,
                body_offset: partition.min_range + open.body_start as u64,
                body_length: count_bases(&data[open.body_start..end]),
                partition: partition.id,
            }));
        }
    }

    fn finish(mut self, partition: &Partition, data: &[u8]) -> Vec<Entry> {
        self.close(partition, data, data.len());
        self.entries
    }
}

fn leading_text(partition: &Partition, data: &[u8], end: usize) -> LeadingText {
    let base = partition.min_range;
    let text = &data[..end];
    let newline = text.iter().position(|&b| b == b'\n');
    let (token, token_terminated) = identifier_token(&text[..newline.unwrap_or(end)]);

    LeadingText {
        token: token.to_vec(),
        token_terminated,
        whole: Span {
            offset: base,
            length: count_bases(text),
        },
        after_first_line: newline.map(|nl| Span {
            offset: base + nl as u64 + 1,
            length: count_bases(&text[nl + 1..]),
        }),
        end: base + end as u64,
        reaches_end: partition.is_last() && end == data.len(),
        partition: partition.id,
    }
}

/// Text up to the first space or tab, and whether a separator was found.
fn identifier_token(line: &[u8]) -> (&[u8], bool) {
    match line.iter().position(|&b| b == b' ' || b == b'\t') {
        Some(end) => (&line[..end], true),
        None => (line, false),
    }
}

pub(crate) fn count_bases(bytes: &[u8]) -> u64 {
    bytes.iter().filter(|&&b| b != b'\n').count() as u64
}
