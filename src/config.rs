//! Configuration for the server and the encoder, read from the environment.

use crate::adapters::rpc::DEFAULT_MAX_FRAME_LENGTH;
use crate::application::DispatchLimits;
use crate::domain::resolution::{ParseResolutionError, Resolution};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}: cannot parse '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("{name}: {source}")]
    Resolution {
        name: &'static str,
        #[source]
        source: ParseResolutionError,
    },
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| String::from(default))
}

fn parsed<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(None),
    }
}

/// Configuration of the `vidstream` HTTP server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Root directory of the local object store
    pub storage_dir: PathBuf,
    /// JSON file seeding the video catalog
    pub catalog_path: Option<PathBuf>,
    /// Transformation services, `name=host:port` pairs separated by commas
    pub transformers: String,
    pub transform_timeout: Option<Duration>,
    pub max_transformed_bytes: Option<usize>,
    /// Idle RPC connections kept per transformation service
    pub rpc_pool_max_idle: usize,
    /// Largest single response frame accepted from a transformation service
    pub rpc_max_frame_bytes: usize,
    /// Serve objects from this S3 bucket instead of `storage_dir`
    pub s3_bucket: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        Ok(Self {
            addr: var_or("ADDR", "127.0.0.1"),
            port: var_or("PORT", "3000"),
            storage_dir: PathBuf::from(var_or("STORAGE_DIR", "./storage")),
            catalog_path: parsed("CATALOG_PATH")?,
            transformers: var_or("TRANSFORMERS", ""),
            transform_timeout: parsed("TRANSFORM_TIMEOUT_SECS")?.map(Duration::from_secs),
            max_transformed_bytes: parsed("MAX_TRANSFORMED_BYTES")?,
            rpc_pool_max_idle: parsed("RPC_POOL_MAX_IDLE")?.unwrap_or(8),
            rpc_max_frame_bytes: parsed("RPC_MAX_FRAME_BYTES")?
                .unwrap_or(DEFAULT_MAX_FRAME_LENGTH),
            s3_bucket: parsed("S3_BUCKET")?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn dispatch_limits(&self) -> DispatchLimits {
        DispatchLimits {
            max_bytes: self.max_transformed_bytes,
            timeout: self.transform_timeout,
        }
    }
}

/// Rendition produced when no target is configured.
pub const DEFAULT_TARGET: Resolution = Resolution::new(854, 480).with_bitrate(800_000);

/// Configuration of the `vidstream-encoder` CLI. Flags override these values.
#[derive(Clone, Debug)]
pub struct EncoderConfig {
    pub storage_dir: PathBuf,
    /// Scratch space for downloads and encoder output
    pub work_dir: PathBuf,
    /// GPU rendition targets, `WxH@bitrate` separated by commas
    pub targets: Vec<Resolution>,
    pub s3_bucket: Option<String>,
}

impl EncoderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let targets = match env::var("ENCODER_TARGETS") {
            Ok(value) if !value.trim().is_empty() => parse_targets(&value)
                .map_err(|source| ConfigError::Resolution {
                    name: "ENCODER_TARGETS",
                    source,
                })?,
            _ => vec![DEFAULT_TARGET],
        };

        Ok(Self {
            storage_dir: PathBuf::from(var_or("STORAGE_DIR", "./storage")),
            work_dir: PathBuf::from(var_or("WORK_DIR", "./tmp")),
            targets,
            s3_bucket: parsed("S3_BUCKET")?,
        })
    }
}

pub fn parse_targets(value: &str) -> Result<Vec<Resolution>, ParseResolutionError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!(
            parse_targets("854x480@800000, 1280x720@2500000").unwrap(),
            vec![
                Resolution::new(854, 480).with_bitrate(800_000),
                Resolution::new(1280, 720).with_bitrate(2_500_000),
            ]
        );
        assert!(parse_targets("854by480").is_err());
        assert!(parse_targets("").unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_limits() {
        let config = ServerConfig {
            addr: "0.0.0.0".to_string(),
            port: "8080".to_string(),
            storage_dir: PathBuf::from("/srv"),
            catalog_path: None,
            transformers: String::new(),
            transform_timeout: Some(Duration::from_secs(30)),
            max_transformed_bytes: None,
            rpc_pool_max_idle: 8,
            rpc_max_frame_bytes: DEFAULT_MAX_FRAME_LENGTH,
            s3_bucket: None,
        };
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(
            config.dispatch_limits(),
            DispatchLimits {
                max_bytes: None,
                timeout: Some(Duration::from_secs(30)),
            }
        );
    }
}
