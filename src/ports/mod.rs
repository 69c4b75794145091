//! Ports - Trait definitions for the collaborators the core depends on.

pub mod discovery;
pub mod encoder;
pub mod metrics;
pub mod repository;
pub mod storage;
pub mod transformer;
