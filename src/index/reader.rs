//! Lookups over a finished index.
//!
//! Both lookups are linear scans of the index text. The index is small
//! compared to the source (one line per record) and is read once per
//! process, so no secondary structure is built over it.

use super::entry::{HEADERLESS_MARKER, Record};
use crate::storage::Storage;
use crate::{Error, Result};
use serde::Serialize;

/// Location of one sequence in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequenceInfo {
    pub length: u64,
    pub header_offset: u64,
    pub body_offset: u64,
}

impl From<&Record> for SequenceInfo {
    fn from(record: &Record) -> Self {
        Self {
            length: record.body_length,
            header_offset: record.header_offset,
            body_offset: record.body_offset,
        }
    }
}

pub struct IndexReader {
    text: String,
}

impl IndexReader {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Load a stored index.
    pub async fn open(storage: &dyn Storage, bucket: &str, key: &str) -> Result<Self> {
        let body = storage.get_object(bucket, key).await?;
        let text = String::from_utf8(body.to_vec())
            .map_err(|e| Error::InvalidInput(format!("index {} is not UTF-8: {}", key, e)))?;
        Ok(Self::from_text(text))
    }

    /// Non-empty lines with their 1-based line numbers.
    fn lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .filter(|(_, line)| !line.is_empty())
    }

    /// Look up the first line containing `identifier`.
    ///
    /// Matching is substring containment on the whole line, not equality on
    /// the identifier field, so `chr1` also matches `chr10`. Lengths of the
    /// lines directly following the match that also contain `identifier` are
    /// added to the result. Returns `None` for an empty identifier or when
    /// nothing matches.
    pub fn lookup_by_identifier(&self, identifier: &str) -> Result<Option<SequenceInfo>> {
        self.lookup_with(identifier, |line| line.contains(identifier))
    }

    /// Like [`lookup_by_identifier`](Self::lookup_by_identifier) but only
    /// lines whose identifier field equals `identifier` match.
    pub fn lookup_exact(&self, identifier: &str) -> Result<Option<SequenceInfo>> {
        self.lookup_with(identifier, |line| line.split(' ').next() == Some(identifier))
    }

    fn lookup_with<F>(&self, identifier: &str, matches: F) -> Result<Option<SequenceInfo>>
    where
        F: Fn(&str) -> bool,
    {
        if identifier.is_empty() {
            return Ok(None);
        }

        let mut lines = self.lines();
        while let Some((number, line)) = lines.next() {
            if !matches(line) {
                continue;
            }
            let Some(record) = parse_line(number, line)? else {
                continue;
            };

            let mut info = SequenceInfo::from(&record);
            for (number, line) in lines.by_ref() {
                if !matches(line) {
                    break;
                }
                if let Some(more) = parse_line(number, line)? {
                    info.length += more.body_length;
                }
            }
            return Ok(Some(info));
        }
        Ok(None)
    }

    /// Records whose body offset lies in `[min, max)`, in index order.
    ///
    /// The index is expected in ascending body offset order: the scan stops at
    /// the first line at or past `max`.
    pub fn lookup_by_range(&self, min: u64, max: u64) -> Result<Vec<Record>> {
        if max < min {
            return Err(Error::InvalidRange(format!("{}-{}", min, max)));
        }

        let mut found = Vec::new();
        for (number, line) in self.lines() {
            let Some(record) = parse_line(number, line)? else {
                continue;
            };
            if record.body_offset < min {
                continue;
            }
            if record.body_offset >= max {
                break;
            }
            found.push(record);
        }
        Ok(found)
    }

    /// Every record of the index.
    pub fn records(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for (number, line) in self.lines() {
            if let Some(record) = parse_line(number, line)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Parse an index line; the header-less placeholder line yields `None`.
fn parse_line(number: usize, line: &str) -> Result<Option<Record>> {
    if line.starts_with(HEADERLESS_MARKER) {
        return Ok(None);
    }
    line.parse::<Record>().map(Some).map_err(|e| match e {
        Error::InvalidIndex { reason, .. } => Error::InvalidIndex {
            line: number,
            reason,
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    const INDEX: &str = "\
chr1 0 6 100 0
chr10 110 117 50 0
chr2 170 176 30 1
chr2 206 206 12 2
chrX 220 226 8 2
";

    #[test]
    fn test_lookup_by_identifier() {
        let reader = IndexReader::from_text(INDEX);
        let info = reader.lookup_by_identifier("chrX").unwrap().unwrap();
        assert_eq!(
            info,
            SequenceInfo {
                length: 8,
                header_offset: 220,
                body_offset: 226
            }
        );
    }

    #[test]
    fn test_lookup_accumulates_following_lines() {
        let reader = IndexReader::from_text(INDEX);
        let info = reader.lookup_by_identifier("chr2").unwrap().unwrap();
        assert_eq!(info.length, 42);
        assert_eq!(info.header_offset, 170);
        assert_eq!(info.body_offset, 176);
    }

    #[test]
    fn test_substring_match_hits_longer_identifier() {
        // "chr1" is a substring of "chr10", so both lines accumulate
        let reader = IndexReader::from_text(INDEX);
        let info = reader.lookup_by_identifier("chr1").unwrap().unwrap();
        assert_eq!(info.length, 150);

        let exact = reader.lookup_exact("chr1").unwrap().unwrap();
        assert_eq!(exact.length, 100);
    }

    #[test]
    fn test_lookup_absent() {
        let reader = IndexReader::from_text(INDEX);
        assert_eq!(reader.lookup_by_identifier("chrY").unwrap(), None);
        assert_eq!(reader.lookup_by_identifier("").unwrap(), None);
        assert_eq!(reader.lookup_exact("chr").unwrap(), None);
    }

    #[test]
    fn test_lookup_by_range_is_half_open() {
        let reader = IndexReader::from_text(INDEX);
        let found = reader.lookup_by_range(117, 206).unwrap();
        let ids: Vec<_> = found.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["chr10", "chr2"]);

        let found = reader.lookup_by_range(0, 1000).unwrap();
        assert_eq!(found.len(), 5);
        assert!(reader.lookup_by_range(300, 400).unwrap().is_empty());
        assert!(reader.lookup_by_range(6, 6).unwrap().is_empty());
    }

    #[test]
    fn test_lookup_by_range_rejects_inverted_bounds() {
        let reader = IndexReader::from_text(INDEX);
        assert!(matches!(
            reader.lookup_by_range(10, 5),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn test_headerless_line_is_skipped() {
        let reader = IndexReader::from_text("<_-_> 8\n");
        assert!(reader.records().unwrap().is_empty());
        assert!(reader.lookup_by_range(0, 100).unwrap().is_empty());
        assert_eq!(reader.lookup_by_identifier("8").unwrap(), None);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let reader = IndexReader::from_text("chr1 0 6 100 0\nchr2 oops\n");
        match reader.lookup_by_range(0, 100) {
            Err(Error::InvalidIndex { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected invalid index, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_from_storage() {
        let storage = MemoryStorage::new();
        storage.insert("b", "faidx/hg_2.fai", INDEX.as_bytes().to_vec());

        let reader = IndexReader::open(&storage, "b", "faidx/hg_2.fai")
            .await
            .unwrap();
        assert_eq!(reader.records().unwrap().len(), 5);
        assert!(IndexReader::open(&storage, "b", "missing").await.is_err());
    }
}
