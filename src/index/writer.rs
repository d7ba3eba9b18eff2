use super::entry::HEADERLESS_MARKER;
use super::merger::MergedIndex;
use crate::Result;
use crate::storage::Storage;
use bytes::Bytes;
use std::path::Path;

/// Render the merged index, one newline-terminated line per record.
///
/// Text ahead of the first header is not indexed. A source with no header
/// at all renders as a single `<_-_> <bases>` line.
pub fn render(index: &MergedIndex) -> String {
    let mut out = String::new();
    for record in index.records() {
        out.push_str(&record.to_string());
        out.push('\n');
    }

    if out.is_empty() {
        if let Some(text) = index.leading_text() {
            out = format!("{} {}\n", HEADERLESS_MARKER, text.whole.length);
        }
    }
    out
}

/// Key of the index for `source_key` built with `partitions` partitions,
/// e.g. `faidx/hg19_8.fai` for `fasta/hg19.fa`.
pub fn index_key(prefix: &str, source_key: &str, partitions: u32) -> String {
    let stem = Path::new(source_key)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_key.to_string());
    format!("{}{}_{}.fai", prefix, stem, partitions)
}

/// Render and store the index. Returns the number of bytes written.
pub async fn write_index(
    storage: &dyn Storage,
    bucket: &str,
    key: &str,
    index: &MergedIndex,
) -> Result<usize> {
    let body = render(index);
    let len = body.len();
    storage.put_object(bucket, key, Bytes::from(body)).await?;
    Ok(len)
}
