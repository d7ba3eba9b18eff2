//! Splitting a source object into contiguous byte-range partitions.

use crate::storage::ByteRange;
use crate::{Error, Result};

/// One contiguous byte range of the source, scanned by a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub id: u32,
    /// Total number of partitions of the object
    pub count: u32,
    pub min_range: u64,
    pub max_range: u64,
}

impl Partition {
    /// Partition `id` of `count` over an object of `object_size` bytes.
    ///
    /// Every partition spans `object_size / count` bytes except the last,
    /// which also takes the remainder.
    pub fn new(id: u32, count: u32, object_size: u64) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidInput("partition count must be positive".into()));
        }
        if id >= count {
            return Err(Error::InvalidInput(format!(
                "partition {} out of range for {} partitions",
                id, count
            )));
        }

        let chunk_size = object_size / u64::from(count);
        let min_range = u64::from(id) * chunk_size;
        let max_range = if id == count - 1 {
            object_size
        } else {
            (u64::from(id) + 1) * chunk_size
        };

        Ok(Self {
            id,
            count,
            min_range,
            max_range,
        })
    }

    /// All partitions of an object, in id order.
    pub fn plan(count: u32, object_size: u64) -> Result<Vec<Self>> {
        (0..count)
            .map(|id| Self::new(id, count, object_size))
            .collect()
    }

    pub fn range(&self) -> ByteRange {
        ByteRange {
            start: self.min_range,
            end: self.max_range,
        }
    }

    pub fn is_first(&self) -> bool {
        self.id == 0
    }

    /// The last partition ends at the end of the object.
    pub fn is_last(&self) -> bool {
        self.id + 1 == self.count
    }
}
