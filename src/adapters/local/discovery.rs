use crate::ports::discovery::{DiscoveryError, ServiceDiscovery};
use async_trait::async_trait;
use std::collections::HashMap;

/// Service addresses fixed at startup, e.g. `gray=127.0.0.1:50051,flip=127.0.0.1:50052`.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    services: HashMap<String, String>,
}

impl StaticDiscovery {
    pub fn new(services: HashMap<String, String>) -> Self {
        Self { services }
    }

    pub fn parse(entries: &str) -> Result<Self, DiscoveryError> {
        let mut services = HashMap::new();
        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, addr) = entry.split_once('=').ok_or_else(|| {
                DiscoveryError::Backend(format!("invalid service entry '{entry}'"))
            })?;
            services.insert(name.trim().to_string(), addr.trim().to_string());
        }
        Ok(Self { services })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn resolve(&self, service: &str) -> Result<String, DiscoveryError> {
        self.services
            .get(service)
            .cloned()
            .ok_or_else(|| DiscoveryError::UnknownService(service.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_and_resolve() {
        let discovery =
            StaticDiscovery::parse("gray=127.0.0.1:50051, flip = 10.0.0.2:50052,").unwrap();
        assert_eq!(discovery.resolve("flip").await.unwrap(), "10.0.0.2:50052");
        assert_eq!(discovery.resolve("gray").await.unwrap(), "127.0.0.1:50051");
        assert!(matches!(
            discovery.resolve("blur").await,
            Err(DiscoveryError::UnknownService(name)) if name == "blur"
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(StaticDiscovery::parse("gray").is_err());
        assert_eq!(StaticDiscovery::parse("").unwrap().names().count(), 0);
    }
}
