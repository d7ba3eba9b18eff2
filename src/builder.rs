//! End-to-end index build: partition, scan in parallel, merge, write.

use crate::executor::Executor;
use crate::index::{Entry, MergedIndex, index_key, merge, scan, write_index};
use crate::partition::Partition;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::storage::Storage;
use crate::{Error, Result};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which object to index and where to put the result.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub bucket: String,
    pub key: String,
    pub partitions: u32,
    /// Prepended to the index object name, e.g. `faidx/`
    pub index_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub index_key: String,
    pub object_size: u64,
    pub partitions: u32,
    pub records: usize,
    pub bytes_written: usize,
    /// Boundary fragments left over after the merge
    pub unresolved: usize,
}

type ScanFuture = Pin<Box<dyn Future<Output = Result<Vec<Entry>>> + Send>>;

pub struct IndexBuilder<E> {
    storage: Arc<dyn Storage>,
    executor: E,
    retry: RetryPolicy,
    allow_unresolved: bool,
}

impl<E: Executor> IndexBuilder<E> {
    pub fn new(storage: Arc<dyn Storage>, executor: E) -> Self {
        Self {
            storage,
            executor,
            retry: RetryPolicy::default(),
            allow_unresolved: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Write the index even when boundary fragments remain unresolved.
    pub fn allow_unresolved(mut self, allow: bool) -> Self {
        self.allow_unresolved = allow;
        self
    }

    /// Scan every partition of an object. The result holds one entry list
    /// per partition, in partition order.
    pub async fn scan_partitions(
        &self,
        bucket: &str,
        key: &str,
        partitions: u32,
    ) -> Result<Vec<Vec<Entry>>> {
        let (_, plan) = self.plan(bucket, key, partitions).await?;
        self.executor.map(plan, self.scan_task(bucket, key)).await
    }

    /// Scan and merge an object without writing anything.
    pub async fn index(&self, bucket: &str, key: &str, partitions: u32) -> Result<MergedIndex> {
        let (_, index) = self.scan_and_merge(bucket, key, partitions).await?;
        Ok(index)
    }

    async fn scan_and_merge(
        &self,
        bucket: &str,
        key: &str,
        partitions: u32,
    ) -> Result<(u64, MergedIndex)> {
        let (object_size, plan) = self.plan(bucket, key, partitions).await?;
        let index = self
            .executor
            .map_reduce(plan, self.scan_task(bucket, key), merge)
            .await?;
        Ok((object_size, index))
    }

    async fn plan(
        &self,
        bucket: &str,
        key: &str,
        partitions: u32,
    ) -> Result<(u64, Vec<Partition>)> {
        let object_size = self.storage.object_size(bucket, key).await?;
        let plan = Partition::plan(partitions, object_size)?;
        info!(
            "Scanning {}/{} ({} bytes) in {} partitions",
            bucket, key, object_size, partitions
        );
        Ok((object_size, plan))
    }

    fn scan_task(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Fn(Partition) -> ScanFuture + Send + Sync + 'static {
        let storage = Arc::clone(&self.storage);
        let bucket = bucket.to_string();
        let key = key.to_string();
        let retry = self.retry.clone();
        move |partition| -> ScanFuture {
            Box::pin(scan_remote(
                Arc::clone(&storage),
                bucket.clone(),
                key.clone(),
                partition,
                retry.clone(),
            ))
        }
    }

    /// Build and store the index for `request.key`.
    pub async fn build(&self, request: &BuildRequest) -> Result<BuildSummary> {
        let (object_size, index) = self
            .scan_and_merge(&request.bucket, &request.key, request.partitions)
            .await?;

        let unresolved = index.unresolved();
        for entry in &unresolved {
            warn!(
                "Unresolved {} fragment from partition {}",
                entry.kind(),
                entry.partition()
            );
        }
        if !unresolved.is_empty() && !self.allow_unresolved {
            return Err(Error::UnresolvedFragments(unresolved.len()));
        }
        let unresolved = unresolved.len();

        let key = index_key(&request.index_prefix, &request.key, request.partitions);
        let bytes_written =
            write_index(self.storage.as_ref(), &request.bucket, &key, &index).await?;
        let records = index.records().count();
        info!(
            "Wrote {} records to {}/{} ({} bytes)",
            records, request.bucket, key, bytes_written
        );

        Ok(BuildSummary {
            index_key: key,
            object_size,
            partitions: request.partitions,
            records,
            bytes_written,
            unresolved,
        })
    }

    /// Delete every object under `prefix`. Returns the number deleted.
    pub async fn clean(&self, bucket: &str, prefix: &str) -> Result<usize> {
        let keys = self.storage.list_keys(bucket, prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.storage.delete_objects(bucket, &keys).await?;
        info!("Deleted {} objects under {}/{}", keys.len(), bucket, prefix);
        Ok(keys.len())
    }
}

async fn scan_remote(
    storage: Arc<dyn Storage>,
    bucket: String,
    key: String,
    partition: Partition,
    retry: RetryPolicy,
) -> Result<Vec<Entry>> {
    let range = partition.range();
    if range.is_empty() {
        return Ok(Vec::new());
    }

    let data = retry_with_backoff(&retry, "get_range", || {
        storage.get_range(&bucket, &key, range)
    })
    .await?;

    let entries = tokio::task::spawn_blocking(move || scan(&partition, &data))
        .await
        .map_err(|e| {
            Error::Internal(format!("scan of partition {} failed: {}", partition.id, e))
        })?;

    debug!(
        partition = partition.id,
        start = range.start,
        end = range.end,
        entries = entries.len(),
        "scanned partition"
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{SequentialExecutor, TokioExecutor};
    use crate::index::IndexReader;
    use crate::storage::MemoryStorage;

    const SOURCE: &[u8] = b">seqA\nACGT\nACGT\n>seqB\nTTTT\n";

    fn request(partitions: u32) -> BuildRequest {
        BuildRequest {
            bucket: "genomes".into(),
            key: "fasta/toy.fa".into(),
            partitions,
            index_prefix: "faidx/".into(),
        }
    }

    fn storage_with(source: &[u8]) -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage.insert("genomes", "fasta/toy.fa", source.to_vec());
        storage
    }

    #[tokio::test]
    async fn test_build_writes_index() {
        let storage = storage_with(SOURCE);
        let builder = IndexBuilder::new(Arc::new(storage.clone()), TokioExecutor::new(2));

        let summary = builder.build(&request(2)).await.unwrap();
        assert_eq!(
            summary,
            BuildSummary {
                index_key: "faidx/toy_2.fai".into(),
                object_size: 27,
                partitions: 2,
                records: 2,
                bytes_written: 28,
                unresolved: 0,
            }
        );

        let body = storage.get_object("genomes", "faidx/toy_2.fai").await.unwrap();
        assert_eq!(&body[..], b"seqA 0 6 8 0\nseqB 16 22 4 1\n");
    }

    #[tokio::test]
    async fn test_every_partition_count_gives_same_records() {
        let storage = storage_with(SOURCE);
        let builder = IndexBuilder::new(Arc::new(storage), SequentialExecutor);

        let offsets = |index: &MergedIndex| -> Vec<(String, u64, u64, u64)> {
            index
                .records()
                .map(|r| {
                    (
                        r.identifier.clone(),
                        r.header_offset,
                        r.body_offset,
                        r.body_length,
                    )
                })
                .collect()
        };

        let expected = offsets(&builder.index("genomes", "fasta/toy.fa", 1).await.unwrap());
        for n in 2..=SOURCE.len() as u32 {
            let index = builder.index("genomes", "fasta/toy.fa", n).await.unwrap();
            assert_eq!(offsets(&index), expected, "partitions = {}", n);
            assert!(index.unresolved().is_empty(), "partitions = {}", n);
        }
    }

    #[tokio::test]
    async fn test_rescanning_gives_identical_entries() {
        let builder = IndexBuilder::new(Arc::new(storage_with(SOURCE)), TokioExecutor::new(4));
        let first = builder.scan_partitions("genomes", "fasta/toy.fa", 5).await.unwrap();
        let second = builder.scan_partitions("genomes", "fasta/toy.fa", 5).await.unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_source() {
        let builder = IndexBuilder::new(Arc::new(MemoryStorage::new()), SequentialExecutor);
        assert!(matches!(
            builder.build(&request(2)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_partitions_rejected() {
        let builder = IndexBuilder::new(Arc::new(storage_with(SOURCE)), SequentialExecutor);
        assert!(matches!(
            builder.build(&request(0)).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_more_partitions_than_bytes() {
        let storage = storage_with(b">a\nAC\n");
        let builder = IndexBuilder::new(Arc::new(storage.clone()), TokioExecutor::new(4));

        let summary = builder.build(&request(10)).await.unwrap();
        assert_eq!(summary.records, 1);
        let body = storage.get_object("genomes", "faidx/toy_10.fai").await.unwrap();
        // Every partition but the last is empty, so the last one holds the header
        assert_eq!(&body[..], b"a 0 3 2 9\n");
    }

    #[tokio::test]
    async fn test_build_then_lookup() {
        let storage = storage_with(SOURCE);
        let builder = IndexBuilder::new(Arc::new(storage.clone()), TokioExecutor::new(3));
        let summary = builder.build(&request(3)).await.unwrap();

        let reader = IndexReader::open(&storage, "genomes", &summary.index_key)
            .await
            .unwrap();
        let info = reader.lookup_by_identifier("seqB").unwrap().unwrap();
        assert_eq!((info.header_offset, info.body_offset, info.length), (16, 22, 4));
    }

    #[tokio::test]
    async fn test_clean_removes_prefix() {
        let storage = storage_with(SOURCE);
        storage.insert("genomes", "faidx/a_1.fai", b"a 0 3 2 0\n".to_vec());
        storage.insert("genomes", "faidx/b_2.fai", b"b 0 3 2 0\n".to_vec());
        let builder = IndexBuilder::new(Arc::new(storage.clone()), SequentialExecutor);

        assert_eq!(builder.clean("genomes", "faidx/").await.unwrap(), 2);
        assert_eq!(builder.clean("genomes", "faidx/").await.unwrap(), 0);
        assert!(storage.get_object("genomes", "fasta/toy.fa").await.is_ok());
    }
}
