//! Local adapters: everything needed to run a single node without external services.

pub mod discovery;
pub mod ffmpeg;
pub mod fs;
pub mod memory;
pub mod metrics;

pub use discovery::StaticDiscovery;
pub use ffmpeg::FfmpegRunner;
pub use fs::FsObjectStore;
pub use memory::InMemoryRepository;
pub use metrics::TracingMetrics;
