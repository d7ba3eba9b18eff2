//! Blob storage abstraction for source FASTA files and finished indexes.
//!
//! The index builder only needs a handful of object operations: the size of
//! the source object, ranged reads of it, and a whole-object write for the
//! index. Backends are interchangeable behind the [`Storage`] trait.
//!
//! # Implementations
//!
//! - [`LocalStorage`] - buckets are directories under a root directory
//! - [`MemoryStorage`] - in-process map, for tests and embedding
//! - [`S3Storage`] - Amazon S3 and compatible services (feature `s3`)
//!
//! # Example
//!
//! ```no_run
//! use faipart::storage::{ByteRange, LocalStorage, Storage};
//! use std::path::PathBuf;
//!
//! # async fn run() -> faipart::Result<()> {
//! let storage = LocalStorage::new(PathBuf::from("./data"));
//! let head = storage
//!     .get_range("genomes", "hg19.fa", ByteRange::new(0, 1024)?)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod local;
mod memory;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// Half-open byte range `[start, end)` within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidRange(format!("{}-{}", start, end)));
        }
        Ok(Self { start, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// HTTP `Range` header value. HTTP ranges are inclusive, so the last
    /// byte is `end - 1`. Only meaningful for non-empty ranges.
    pub fn http_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

/// Object storage consumed by the index builder and reader.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Size of an object in bytes
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64>;

    /// Read `range` of an object. Ranges reaching past the end are truncated.
    async fn get_range(&self, bucket: &str, key: &str, range: ByteRange) -> Result<Bytes>;

    /// Read a whole object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Create or replace an object
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;

    /// Keys starting with `prefix`, sorted
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Delete objects; missing keys are ignored
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()>;
}
