//! vidstream server - HTTP delivery of stored videos with on-demand segment filters.
//!
//! Wires up:
//! - Object store (local directory, or S3 with the `s3` feature)
//! - In-memory catalog seeded from `CATALOG_PATH`
//! - Static discovery and the pooled streaming RPC client for filter services
//! - The axum router

use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vidstream::adapters::local::{
    FsObjectStore, InMemoryRepository, StaticDiscovery, TracingMetrics,
};
use vidstream::adapters::rpc::{ConnectionPool, RpcTransformerClient};
use vidstream::application::{CatalogService, Delivery, TransformationDispatcher};
use vidstream::http::{router, AppState};
use vidstream::ports::storage::ObjectStore;
use vidstream::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = ServerConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 1. Adapters
    let store = object_store(&config).await;
    let repo = match &config.catalog_path {
        Some(path) => InMemoryRepository::from_catalog(path).await?,
        None => InMemoryRepository::new(),
    };
    let discovery = StaticDiscovery::parse(&config.transformers)?;
    for name in discovery.names() {
        tracing::info!(filter = name, "transformation service registered");
    }
    let pool = Arc::new(
        ConnectionPool::new(config.rpc_pool_max_idle)
            .with_max_frame_length(config.rpc_max_frame_bytes),
    );

    // 2. Application services
    let dispatcher = TransformationDispatcher::new(
        Arc::new(discovery),
        Arc::new(RpcTransformerClient::new(pool.clone())),
        Arc::new(TracingMetrics::new()),
    )
    .with_limits(config.dispatch_limits());

    let state = AppState {
        delivery: Delivery::new(store.clone()),
        dispatcher: Arc::new(dispatcher),
        catalog: CatalogService::new(store, Arc::new(repo)),
    };

    // 3. HTTP
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.shutdown();
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(feature = "s3")]
async fn object_store(config: &ServerConfig) -> Arc<dyn ObjectStore> {
    match &config.s3_bucket {
        Some(bucket) => {
            tracing::info!(bucket, "serving objects from S3");
            Arc::new(vidstream::adapters::aws::S3ObjectStore::from_env(bucket.as_str()).await)
        }
        None => Arc::new(FsObjectStore::new(&config.storage_dir)),
    }
}

#[cfg(not(feature = "s3"))]
async fn object_store(config: &ServerConfig) -> Arc<dyn ObjectStore> {
    if config.s3_bucket.is_some() {
        tracing::warn!("S3_BUCKET is set but the s3 feature is disabled, using STORAGE_DIR");
    }
    tracing::info!(root = %config.storage_dir.display(), "serving objects from local storage");
    Arc::new(FsObjectStore::new(&config.storage_dir))
}
