use super::{ByteRange, Storage};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Filesystem-backed storage. A bucket is a directory under `root` and a
/// key is a relative path inside it.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        check_relative(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        check_relative(key)?;
        Ok(self.bucket_path(bucket)?.join(key))
    }
}

/// Reject keys that would escape the bucket directory.
fn check_relative(name: &str) -> Result<()> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || escapes {
        return Err(Error::InvalidInput(format!("invalid object name: {}", name)));
    }
    Ok(())
}

#[async_trait]
impl Storage for LocalStorage {
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        let path = self.object_path(bucket, key)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|_| Error::NotFound(format!("{}/{}", bucket, key)))?;
        Ok(metadata.len())
    }

    async fn get_range(&self, bucket: &str, key: &str, range: ByteRange) -> Result<Bytes> {
        let path = self.object_path(bucket, key)?;
        let mut file = fs::File::open(&path)
            .await
            .map_err(|_| Error::NotFound(format!("{}/{}", bucket, key)))?;

        file.seek(std::io::SeekFrom::Start(range.start)).await?;
        let mut buf = Vec::with_capacity(range.len() as usize);
        file.take(range.len()).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.object_path(bucket, key)?;
        let buf = fs::read(&path)
            .await
            .map_err(|_| Error::NotFound(format!("{}/{}", bucket, key)))?;
        Ok(Bytes::from(buf))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &body).await?;
        Ok(())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let bucket_dir = self.bucket_path(bucket)?;
        if !bucket_dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![bucket_dir.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&bucket_dir) else {
                    continue;
                };
                // Keys always use '/' regardless of platform
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        for key in keys {
            let path = self.object_path(bucket, key)?;
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_read_range() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());

        storage
            .put_object("genomes", "ref/tiny.fa", Bytes::from_static(b">a\nACGT\n"))
            .await
            .unwrap();

        assert_eq!(storage.object_size("genomes", "ref/tiny.fa").await.unwrap(), 8);
        let bytes = storage
            .get_range("genomes", "ref/tiny.fa", ByteRange::new(3, 7).unwrap())
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ACGT");
    }

    #[tokio::test]
    async fn test_range_past_end_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        storage
            .put_object("b", "x.fa", Bytes::from_static(b">a\nAC\n"))
            .await
            .unwrap();

        let bytes = storage
            .get_range("b", "x.fa", ByteRange::new(3, 100).unwrap())
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"AC\n");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        let err = storage.object_size("b", "missing.fa").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        for key in ["faidx/hg19_4.fai", "faidx/hg38_4.fai", "fasta/hg19.fa"] {
            storage
                .put_object("b", key, Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        let keys = storage.list_keys("b", "faidx/").await.unwrap();
        assert_eq!(keys, vec!["faidx/hg19_4.fai", "faidx/hg38_4.fai"]);

        storage.delete_objects("b", &keys).await.unwrap();
        assert!(storage.list_keys("b", "faidx/").await.unwrap().is_empty());
        assert_eq!(storage.list_keys("b", "").await.unwrap(), vec!["fasta/hg19.fa"]);
    }

    #[test]
    fn test_rejects_escaping_keys() {
        assert!(check_relative("../etc/passwd").is_err());
        assert!(check_relative("/abs").is_err());
        assert!(check_relative("").is_err());
        assert!(check_relative("fasta/hg19.fa").is_ok());
    }
}
