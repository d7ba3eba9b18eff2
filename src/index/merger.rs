//! Boundary merge over the per-partition scan outputs.
//!
//! Partitions are visited in id order. Each step looks at the last entry of
//! the nearest previous non-empty partition and the first entry of the
//! current one; when they are two halves of one record they are replaced by
//! a single resolved entry, which is placed at the head of the current
//! partition so that a following partition can keep extending it.

use super::entry::{Entry, LeadingText, Record, Span, SplitIdentifier};

/// Result of merging one adjacent pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeStep {
    /// Entry that replaces the consumed pair, if the pair belonged together
    pub resolved: Option<Entry>,
    /// Previous partition without its consumed last entry
    pub prev: Vec<Entry>,
    /// Current partition without its consumed first entry
    pub curr: Vec<Entry>,
}

impl MergeStep {
    /// The two partitions after the step, with the resolved entry leading
    /// the current one.
    pub fn into_partitions(self) -> (Vec<Entry>, Vec<Entry>) {
        let mut curr = self.curr;
        if let Some(entry) = self.resolved {
            curr.insert(0, entry);
        }
        (self.prev, curr)
    }
}

/// Merge the boundary between two adjacent, non-empty partitions.
pub fn merge_pair(mut prev: Vec<Entry>, mut curr: Vec<Entry>) -> MergeStep {
    let resolved = match (prev.last(), curr.first()) {
        (Some(last), Some(first)) => resolve(last, first),
        _ => None,
    };

    if resolved.is_some() {
        prev.pop();
        curr.remove(0);
    }

    MergeStep {
        resolved,
        prev,
        curr,
    }
}

fn resolve(last: &Entry, first: &Entry) -> Option<Entry> {
    match (last, first) {
        // Body of the previous record runs into this partition
        (Entry::Record(record), Entry::SplitHeader(text) | Entry::Continuation(text)) => {
            Some(Entry::Record(Record {
                body_length: record.body_length + text.whole.length,
                ..record.clone()
            }))
        }

        // Rest of a cut header line, then (part of) its body
        (Entry::SplitIdentifier(marker), Entry::SplitHeader(text) | Entry::Continuation(text)) => {
            match text.after_first_line {
                Some(body) => Some(Entry::Record(Record {
                    identifier: marker.resolve_identifier(&text.token),
                    header_offset: marker.header_offset,
                    body_offset: body.offset,
                    body_length: body.length,
                    partition: marker.partition,
                })),
                // The object ends inside the header line
                None if text.reaches_end => Some(Entry::Record(Record {
                    identifier: marker.resolve_identifier(&text.token),
                    header_offset: marker.header_offset,
                    body_offset: text.end,
                    body_length: 0,
                    partition: marker.partition,
                })),
                // The header line runs through the whole partition
                None => Some(Entry::SplitIdentifier(extend(
                    marker,
                    &text.token,
                    text.token_terminated,
                ))),
            }
        }

        // A marker right after a cut header line is header text, not a new
        // header: the previous partition did not end at a line start.
        (Entry::SplitIdentifier(marker), Entry::Record(inner)) => Some(Entry::Record(Record {
            identifier: marker.resolve_identifier(format!(">{}", inner.identifier).as_bytes()),
            header_offset: marker.header_offset,
            body_offset: inner.body_offset,
            body_length: inner.body_length,
            partition: marker.partition,
        })),
        (Entry::SplitIdentifier(marker), Entry::SplitIdentifier(inner)) => {
            let mut continuation = vec![super::scanner::MARKER];
            continuation.extend_from_slice(&inner.fragment);
            Some(Entry::SplitIdentifier(extend(marker, &continuation, inner.complete)))
        }

        // Text in front of the first header of the file
        (Entry::Continuation(lead), Entry::SplitHeader(text) | Entry::Continuation(text)) => {
            Some(Entry::Continuation(LeadingText {
                whole: Span {
                    offset: lead.whole.offset,
                    length: lead.whole.length + text.whole.length,
                },
                end: text.end,
                reaches_end: text.reaches_end,
                ..lead.clone()
            }))
        }

        _ => None,
    }
}

fn extend(marker: &SplitIdentifier, continuation: &[u8], terminated: bool) -> SplitIdentifier {
    let mut fragment = marker.fragment.clone();
    if !marker.complete {
        fragment.extend_from_slice(continuation);
    }
    SplitIdentifier {
        fragment,
        complete: marker.complete || terminated,
        ..marker.clone()
    }
}

/// Scan outputs after the boundary merge, still grouped by partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedIndex {
    partitions: Vec<Vec<Entry>>,
}

impl MergedIndex {
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.partitions.iter().flatten()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries().filter_map(Entry::as_record)
    }

    /// Text before the first header, when the source starts without one.
    pub fn leading_text(&self) -> Option<&LeadingText> {
        match self.entries().next() {
            Some(Entry::Continuation(text)) => Some(text),
            _ => None,
        }
    }

    /// Boundary entries the merge could not pair up. Leading header-less
    /// text is not counted.
    pub fn unresolved(&self) -> Vec<&Entry> {
        self.entries()
            .enumerate()
            .filter(|(i, entry)| match entry {
                Entry::Record(_) => false,
                Entry::Continuation(_) => *i > 0,
                Entry::SplitHeader(_) | Entry::SplitIdentifier(_) => true,
            })
            .map(|(_, entry)| entry)
            .collect()
    }
}

/// Merge every partition boundary. `partitions` must be in id order.
pub fn merge(mut partitions: Vec<Vec<Entry>>) -> MergedIndex {
    let mut prev: Option<usize> = None;

    for i in 0..partitions.len() {
        if partitions[i].is_empty() {
            continue;
        }
        if let Some(p) = prev {
            let step = merge_pair(
                std::mem::take(&mut partitions[p]),
                std::mem::take(&mut partitions[i]),
            );
            let (prev_entries, curr_entries) = step.into_partitions();
            partitions[p] = prev_entries;
            partitions[i] = curr_entries;
        }
        prev = Some(i);
    }

    MergedIndex { partitions }
}
