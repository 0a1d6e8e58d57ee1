//! Events for real-time updates to operator clients.

use crate::channel::{ChannelId, ProbeState};
use crate::stream::StreamId;
use serde::{Deserialize, Serialize};

/// Event types that can be broadcast to all connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TunerEvent {
    /// A channel was added
    ChannelCreated { channel_id: ChannelId },
    /// A channel's source or metadata was edited
    ChannelUpdated { channel_id: ChannelId },
    /// A channel was removed
    ChannelDeleted { channel_id: ChannelId },
    /// A channel number was changed
    ChannelRenumbered { old_id: ChannelId, new_id: ChannelId },
    /// A channel was moved within the lineup
    ChannelsReordered { from: usize, to: usize },
    /// The whole lineup was replaced (configuration load)
    LineupReplaced { count: usize },
    /// A probe finished
    ChannelProbed {
        channel_id: ChannelId,
        state: ProbeState,
        detail: String,
    },
    /// A viewer tuned in
    StreamStarted {
        stream_id: StreamId,
        channel_id: ChannelId,
    },
    /// A pipeline ended and will be respawned after a delay
    StreamRestarting {
        stream_id: StreamId,
        channel_id: ChannelId,
        delay_ms: u64,
    },
    /// A viewer's stream was torn down
    StreamStopped {
        stream_id: StreamId,
        channel_id: ChannelId,
    },
    /// Ping event to keep connection alive
    Ping,
}

impl TunerEvent {
    /// Get a human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            Self::ChannelCreated { channel_id } => format!("Channel {} created", channel_id),
            Self::ChannelUpdated { channel_id } => format!("Channel {} updated", channel_id),
            Self::ChannelDeleted { channel_id } => format!("Channel {} deleted", channel_id),
            Self::ChannelRenumbered { old_id, new_id } => {
                format!("Channel {} renumbered to {}", old_id, new_id)
            }
            Self::ChannelsReordered { from, to } => {
                format!("Lineup position {} moved to {}", from, to)
            }
            Self::LineupReplaced { count } => format!("Lineup replaced ({} channels)", count),
            Self::ChannelProbed {
                channel_id, state, ..
            } => format!("Channel {} probed: {:?}", channel_id, state),
            Self::StreamStarted {
                stream_id,
                channel_id,
            } => format!("Stream {} started on channel {}", stream_id, channel_id),
            Self::StreamRestarting {
                stream_id,
                channel_id,
                delay_ms,
            } => format!(
                "Stream {} on channel {} restarting in {}ms",
                stream_id, channel_id, delay_ms
            ),
            Self::StreamStopped {
                stream_id,
                channel_id,
            } => format!("Stream {} on channel {} stopped", stream_id, channel_id),
            Self::Ping => "Ping".to_string(),
        }
    }
}
