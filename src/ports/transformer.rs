use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::io;

/// Body of a streaming transformation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    pub video_path: String,
    pub filter_chain: Vec<String>,
}

/// Chunks in arrival order; the stream ends only after the remote end-of-stream.
pub type ChunkStream = BoxStream<'static, Result<Bytes, RpcError>>;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("cannot connect to transformation service at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("transformation stream io error: {0}")]
    Io(#[from] io::Error),
    #[error("transformation service error: {0}")]
    Remote(String),
    #[error("transformation stream closed before end-of-stream")]
    UnexpectedEof,
    #[error("transformation protocol error: {0}")]
    Protocol(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransformerClient: Send + Sync {
    /// Open one streaming call against the service at `addr`.
    async fn transform(&self, addr: &str, request: TransformRequest)
        -> Result<ChunkStream, RpcError>;
}
