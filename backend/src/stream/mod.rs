//! Per-viewer pipeline supervision.

pub mod backoff;
pub mod process;
mod supervisor;

pub use backoff::RestartBackoff;
pub use process::{PipelineProcess, StderrLog, Teardown};
pub use supervisor::{ActiveStream, ChannelLaunch, LaunchSource, StreamSupervisor};

use crate::pipeline::PipelineError;
use camtuner_types::ChannelId;

/// Error type for stream operations.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Channel {0} not found")]
    NotFound(ChannelId),

    #[error("Channel {0} has no resolvable source")]
    Unresolvable(ChannelId),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Pipeline output ended")]
    Interrupted,

    #[error("Server is shutting down")]
    ShuttingDown,
}

impl StreamError {
    /// The transcoder could not be located at all.
    pub fn transcoder_missing() -> Self {
        Self::Spawn {
            program: "ffmpeg".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "executable not found"),
        }
    }
}

impl From<PipelineError> for StreamError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::UnresolvableSource(id) => Self::Unresolvable(id),
        }
    }
}
