//! Segment transformation: discovery, one streaming call, chunk reassembly.

use crate::domain::video::SegmentRequest;
use crate::error::ApiError;
use crate::ports::discovery::{DiscoveryError, ServiceDiscovery};
use crate::ports::metrics::MetricsSink;
use crate::ports::transformer::{RpcError, TransformRequest, TransformerClient};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchLimits {
    /// Largest transformed segment accepted, in bytes.
    pub max_bytes: Option<usize>,
    /// Deadline for the whole call, connection included.
    pub timeout: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("empty filter chain")]
    EmptyChain,
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("transformed segment exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("transformation did not finish within {0:?}")]
    TimedOut(Duration),
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

pub struct TransformationDispatcher {
    discovery: Arc<dyn ServiceDiscovery>,
    client: Arc<dyn TransformerClient>,
    metrics: Arc<dyn MetricsSink>,
    limits: DispatchLimits,
}

impl TransformationDispatcher {
    pub fn new(
        discovery: Arc<dyn ServiceDiscovery>,
        client: Arc<dyn TransformerClient>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            discovery,
            client,
            metrics,
            limits: DispatchLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: DispatchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Run the request's filter chain and return the whole transformed segment.
    ///
    /// The call is routed to the service owning the last filter in the chain;
    /// that service drives the rest of the pipeline.
    pub async fn dispatch(&self, request: &SegmentRequest) -> Result<Bytes, DispatchError> {
        let service = request
            .filter_chain
            .last()
            .ok_or(DispatchError::EmptyChain)?;

        for filter in &request.filter_chain {
            self.metrics.filter_used(filter);
        }

        let started = Instant::now();
        let call = self.call(service, request);
        let output = match self.limits.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| DispatchError::TimedOut(limit))??,
            None => call.await?,
        };

        let elapsed = started.elapsed();
        tracing::debug!(
            video_id = %request.video_id,
            filters = ?request.filter_chain,
            bytes = output.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "segment transformed"
        );
        self.metrics
            .transformation_completed(&request.filter_chain, elapsed);
        Ok(output)
    }

    async fn call(&self, service: &str, request: &SegmentRequest) -> Result<Bytes, DispatchError> {
        let addr = self.discovery.resolve(service).await.inspect_err(|e| {
            tracing::error!(service, error = %e, "cannot resolve transformation service");
        })?;

        let mut chunks = self
            .client
            .transform(
                &addr,
                TransformRequest {
                    video_path: request.key(),
                    filter_chain: request.filter_chain.clone(),
                },
            )
            .await?;

        let mut buffer = BytesMut::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if let Some(limit) = self.limits.max_bytes {
                if buffer.len() + chunk.len() > limit {
                    return Err(DispatchError::TooLarge { limit });
                }
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }
}
