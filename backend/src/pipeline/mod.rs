//! Transcoder pipeline construction.
//!
//! Turns a channel (plus a lineup snapshot for mosaics) into a typed
//! [`PipelineSpec`]. Nothing in this module spawns processes.

mod builder;
pub mod mosaic;
pub mod source;
pub mod spec;

pub use builder::{resolve_members, PipelineBuilder};
pub use spec::{LaunchCommand, PipelineSpec};

use camtuner_types::ChannelId;

/// Error type for pipeline construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("Channel {0} has no resolvable source")]
    UnresolvableSource(ChannelId),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
