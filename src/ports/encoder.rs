use crate::domain::ladder::TranscodeInvocation;
use crate::domain::resolution::Resolution;
use async_trait::async_trait;
use std::io;
use std::path::Path;

/// What the encoder needs to know about a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceProbe {
    pub resolution: Resolution,
    pub has_audio: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("unexpected ffprobe output: '{0}'")]
    Probe(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EncoderRunner: Send + Sync {
    async fn probe(&self, source: &Path) -> Result<SourceProbe, EncoderError>;

    async fn run(&self, invocation: &TranscodeInvocation) -> Result<(), EncoderError>;
}
