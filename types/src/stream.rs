//! Active stream bookkeeping types.

use crate::channel::ChannelId;
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Identifier of one viewer's stream (unique per process lifetime).
pub type StreamId = u64;

/// Lifecycle state of an active stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum StreamState {
    /// External pipeline is being started
    #[default]
    Spawning,
    /// Output is being relayed to the viewer
    Streaming,
    /// Waiting out the backoff delay before respawning
    Restarting,
    /// Viewer left, pipeline is being torn down
    Draining,
    /// Pipeline is gone
    Terminated,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawning => write!(f, "SPAWNING"),
            Self::Streaming => write!(f, "STREAMING"),
            Self::Restarting => write!(f, "RESTARTING"),
            Self::Draining => write!(f, "DRAINING"),
            Self::Terminated => write!(f, "TERMINATED"),
        }
    }
}

/// Snapshot of one active stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StreamInfo {
    pub id: StreamId,
    pub channel_id: ChannelId,
    pub state: StreamState,
    /// PID of the current pipeline process, if one is running
    pub pid: Option<u32>,
    /// Number of times the pipeline was respawned
    pub restarts: u32,
    /// Total bytes relayed to the viewer
    pub bytes_relayed: u64,
    /// Unix timestamp (seconds) when the viewer tuned in
    pub started_at: u64,
}
