//! Shared types for the camtuner virtual tuner.
//!
//! This crate contains the channel model and API types shared between
//! the HTTP surface and persisted configuration.

/// Default port for the tuner HTTP server.
pub const DEFAULT_PORT: u16 = 8000;

/// Default friendly name of the tuner device.
pub const DEFAULT_SERVER_NAME: &str = "CamIPTV";

pub mod api;
pub mod channel;
pub mod events;
pub mod stream;

// Re-export commonly used types
pub use channel::{
    is_supported_source_url, is_valid_channel_number, AuthMode, Channel, ChannelId, ProbeState,
    ProbeStatus, Transport, MAX_MOSAIC_SOURCES, MIN_MOSAIC_SOURCES,
};
pub use events::TunerEvent;
pub use stream::{StreamId, StreamInfo, StreamState};
