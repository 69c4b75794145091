use crate::ports::storage::{ObjectBody, ObjectStore, StoreError};
use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::io::ReaderStream;

/// ObjectStore over an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS configuration (env, profile, IMDS).
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket)
    }

    async fn fetch(&self, key: &str, range: Option<&str>) -> Result<ObjectBody, StoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range.map(str::to_string))
            .send()
            .await
            .map_err(|e| {
                let e = e.into_service_error();
                if e.is_no_such_key() {
                    StoreError::NotFound(key.to_string())
                } else if e.code() == Some("InvalidRange") {
                    StoreError::RangeNotSatisfiable {
                        range: range.unwrap_or_default().to_string(),
                        size: 0,
                    }
                } else {
                    StoreError::Backend(e.to_string())
                }
            });

        let resp = match resp {
            Ok(resp) => resp,
            Err(StoreError::RangeNotSatisfiable { range, .. }) => {
                let size = self.size_of(key).await?;
                return Err(StoreError::RangeNotSatisfiable { range, size });
            }
            Err(e) => return Err(e),
        };

        Ok(ObjectBody {
            content_length: resp.content_length().unwrap_or_default().max(0) as u64,
            content_range: resp.content_range().map(str::to_string),
            accept_ranges: resp.accept_ranges().map(str::to_string),
            body: ReaderStream::new(resp.body.into_async_read()).boxed(),
        })
    }

    async fn size_of(&self, key: &str) -> Result<u64, StoreError> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.into_service_error().to_string()))?;
        Ok(head.content_length().unwrap_or_default().max(0) as u64)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> Result<ObjectBody, StoreError> {
        self.fetch(key, None).await
    }

    async fn get_range(&self, key: &str, range: &str) -> Result<ObjectBody, StoreError> {
        self.fetch(key, Some(range)).await
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), StoreError> {
        tracing::debug!(bucket = %self.bucket, key, bytes = body.len(), "uploading object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.into_service_error().to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.into_service_error().to_string()))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let e = e.into_service_error();
                if e.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Backend(e.to_string()))
                }
            }
        }
    }
}
