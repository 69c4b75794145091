use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("no address registered for transformation service '{0}'")]
    UnknownService(String),
    #[error("service discovery error: {0}")]
    Backend(String),
}

/// Resolves a filter name to the `host:port` of the service implementing it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    async fn resolve(&self, service: &str) -> Result<String, DiscoveryError>;
}
