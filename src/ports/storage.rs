use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;

pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// A fetched object, or a byte range of one, with the metadata the store reported.
pub struct ObjectBody {
    pub body: ByteStream,
    /// Length of `body`: the whole object, or only the requested range.
    pub content_length: u64,
    pub content_range: Option<String>,
    pub accept_ranges: Option<String>,
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .field("accept_ranges", &self.accept_ranges)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("range '{range}' not satisfiable for an object of {size} bytes")]
    RangeNotSatisfiable { range: String, size: u64 },
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a whole object.
    async fn get(&self, key: &str) -> Result<ObjectBody, StoreError>;

    /// Fetch the byte range named by a `Range` header value (`bytes=...`).
    async fn get_range(&self, key: &str, range: &str) -> Result<ObjectBody, StoreError>;

    async fn put(&self, key: &str, body: Bytes) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Download an object to a local path
    async fn download(&self, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let object = self.get(key).await?;
        let mut body_reader = StreamReader::new(object.body);

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = BufWriter::new(File::create(local_path).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;
        file.flush().await?;
        Ok(())
    }

    /// Upload a local file as an object
    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), StoreError> {
        let data = tokio::fs::read(local_path).await?;
        self.put(key, Bytes::from(data)).await
    }
}
