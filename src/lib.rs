//! vidstream - Video delivery and on-demand segment transformation
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (resolutions, ladder, manifests, assets)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (local, streaming RPC, S3)
//! - application/: Services (delivery, dispatcher, catalog, encoder)
//! - http/: axum router
//! - config: Environment configuration
//!
//! # Features
//! - `s3`: serve and publish objects through an S3 bucket

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod ports;

pub use config::{EncoderConfig, ServerConfig};
pub use error::ApiError;
