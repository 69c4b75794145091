//! Domain layer - Pure business logic.

pub mod ladder;
pub mod manifest;
pub mod resolution;
pub mod video;
