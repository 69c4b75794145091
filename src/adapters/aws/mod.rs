//! AWS adapters, behind the `s3` feature.

pub mod s3;

pub use s3::S3ObjectStore;
