use crate::ports::storage::{ObjectBody, ObjectStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

const READ_CHUNK: usize = 64 * 1024;

/// Object store backed by a local directory: key `a/b/c` lives at `<root>/a/b/c`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        // Prevent directory traversal
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    async fn open(&self, key: &str) -> Result<(File, u64), StoreError> {
        let path = self.path_for(key)?;
        let file = File::open(&path).await.map_err(|e| not_found_or_io(e, key))?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok((file, metadata.len()))
    }
}

fn not_found_or_io(e: std::io::Error, key: &str) -> StoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io(e)
    }
}

/// Resolve a single-range `Range` header value against an object size.
///
/// Supports `bytes=0-499`, `bytes=500-` and `bytes=-500`. Returns the inclusive
/// `(start, end)` pair, or `None` when the value is malformed or unsatisfiable.
pub fn resolve_range(value: &str, size: u64) -> Option<(u64, u64)> {
    let ranges = value.trim().strip_prefix("bytes=")?;
    if ranges.contains(',') || size == 0 {
        return None;
    }
    let (start, end) = ranges.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        (true, false) => {
            let suffix: u64 = end.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            Some((size.saturating_sub(suffix), size - 1))
        }
        (false, true) => {
            let start: u64 = start.parse().ok()?;
            (start < size).then_some((start, size - 1))
        }
        (false, false) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            if start >= size || start > end {
                return None;
            }
            Some((start, end.min(size - 1)))
        }
        (true, true) => None,
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<ObjectBody, StoreError> {
        let (file, size) = self.open(key).await?;

        Ok(ObjectBody {
            body: ReaderStream::with_capacity(file, READ_CHUNK).boxed(),
            content_length: size,
            content_range: None,
            accept_ranges: Some("bytes".to_string()),
        })
    }

    async fn get_range(&self, key: &str, range: &str) -> Result<ObjectBody, StoreError> {
        let (mut file, size) = self.open(key).await?;
        let (start, end) =
            resolve_range(range, size).ok_or_else(|| StoreError::RangeNotSatisfiable {
                range: range.to_string(),
                size,
            })?;

        file.seek(SeekFrom::Start(start)).await?;
        let length = end - start + 1;

        Ok(ObjectBody {
            body: ReaderStream::with_capacity(file.take(length), READ_CHUNK).boxed(),
            content_length: length,
            content_range: Some(format!("bytes {start}-{end}/{size}")),
            accept_ranges: Some("bytes".to_string()),
        })
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tracing::debug!(key, bytes = body.len(), "storing object");
        tokio::fs::write(&path, &body).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(e, key))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
