use super::{ByteRange, Storage};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// In-memory storage keyed by `(bucket, key)`.
///
/// Cloning shares the underlying map, so a test can keep a handle while the
/// builder owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<BTreeMap<(String, String), Bytes>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object without going through the async trait
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        self.objects
            .write()
            .expect("RwLock poisoned")
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.objects
            .read()
            .expect("RwLock poisoned")
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{}/{}", bucket, key)))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        Ok(self.get(bucket, key)?.len() as u64)
    }

    async fn get_range(&self, bucket: &str, key: &str, range: ByteRange) -> Result<Bytes> {
        let body = self.get(bucket, key)?;
        let len = body.len() as u64;
        let start = range.start.min(len) as usize;
        let end = range.end.min(len) as usize;
        Ok(body.slice(start..end))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.get(bucket, key)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.insert(bucket, key, body);
        Ok(())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().expect("RwLock poisoned");
        Ok(objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        let mut objects = self.objects.write().expect("RwLock poisoned");
        for key in keys {
            objects.remove(&(bucket.to_string(), key.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_range_is_clamped() {
        let storage = MemoryStorage::new();
        storage.insert("b", "k", &b">seqA\nACGT\n"[..]);

        let bytes = storage
            .get_range("b", "k", ByteRange::new(6, 64).unwrap())
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ACGT\n");

        let empty = storage
            .get_range("b", "k", ByteRange::new(40, 64).unwrap())
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let storage = MemoryStorage::new();
        storage.insert("a", "x", &b"1"[..]);
        storage.insert("b", "x", &b"2"[..]);

        assert_eq!(storage.list_keys("a", "").await.unwrap(), vec!["x"]);
        storage.delete_objects("a", &["x".to_string()]).await.unwrap();
        assert!(storage.get_object("a", "x").await.is_err());
        assert_eq!(&storage.get_object("b", "x").await.unwrap()[..], b"2");
    }
}
