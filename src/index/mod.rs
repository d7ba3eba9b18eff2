//! Offset index over a record/body (FASTA) file.
//!
//! Building the index is split in two phases so the expensive part can run
//! in parallel:
//!
//! - [`scan`] - runs once per partition, independently, and produces
//!   [`Entry`] values: complete records plus boundary fragments wherever a
//!   record is cut by the partition's edges.
//! - [`merge`] - runs once, sequentially and in partition order, pairing up
//!   the fragments on each side of every boundary.
//!
//! The merged result is rendered by [`render`] as one line per record:
//!
//! ```text
//! identifier header_offset body_offset body_length partition
//! ```
//!
//! and read back with [`IndexReader`].

mod entry;
mod merger;
mod reader;
mod scanner;
mod writer;

pub use entry::{Entry, HEADERLESS_MARKER, LeadingText, Record, Span, SplitIdentifier};
pub use merger::{MergeStep, MergedIndex, merge, merge_pair};
pub use reader::{IndexReader, SequenceInfo};
pub use scanner::{MARKER, scan};
pub use writer::{index_key, render, write_index};
