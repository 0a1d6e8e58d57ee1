//! API request and response types.

use crate::channel::{AuthMode, Channel, ChannelId, ProbeStatus, Transport};
use crate::stream::StreamInfo;
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

// ============================================================================
// Tuner discovery (HDHomeRun-compatible) documents
// ============================================================================

/// Scan status embedded in the discovery document and served on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "PascalCase")]
pub struct LineupStatus {
    pub scan_in_progress: u8,
    pub scan_possible: u8,
    pub source: String,
    pub source_list: Vec<String>,
}

impl Default for LineupStatus {
    fn default() -> Self {
        Self {
            scan_in_progress: 0,
            scan_possible: 1,
            source: "Cable".to_string(),
            source_list: vec!["Cable".to_string()],
        }
    }
}

/// Device descriptor returned by `/discover.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "PascalCase")]
pub struct DiscoverResponse {
    pub friendly_name: String,
    pub model_number: String,
    pub firmware_name: String,
    pub firmware_version: String,
    #[serde(rename = "DeviceID")]
    pub device_id: String,
    pub device_auth: String,
    #[serde(rename = "BaseURL")]
    pub base_url: String,
    #[serde(rename = "LineupURL")]
    pub lineup_url: String,
    pub lineup_status: LineupStatus,
    pub tuner_count: u32,
}

/// One row of `/lineup.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "PascalCase")]
pub struct LineupEntry {
    pub guide_number: String,
    pub guide_name: String,
    #[serde(rename = "URL")]
    pub url: String,
}

// ============================================================================
// Channel API Types
// ============================================================================

/// Request to create a single-source channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CreateChannelRequest {
    /// Channel number; the next free number is assigned when omitted
    #[serde(default)]
    pub id: Option<ChannelId>,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub auth_mode: AuthMode,
    #[serde(default)]
    pub transcode_audio: Option<bool>,
    #[serde(default)]
    pub tvg_id: Option<String>,
    #[serde(default)]
    pub tvg_logo: Option<String>,
    #[serde(default)]
    pub epg_title: Option<String>,
    #[serde(default)]
    pub epg_desc: Option<String>,
}

/// Request to create a mosaic channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CreateMosaicRequest {
    #[serde(default)]
    pub id: Option<ChannelId>,
    #[serde(default)]
    pub name: Option<String>,
    /// Member channel numbers, 2 or more (only the first 4 are used)
    pub sources: Vec<ChannelId>,
    /// Audio policy; defaults to the first member's policy
    #[serde(default)]
    pub transcode_audio: Option<bool>,
}

/// Request to edit a channel. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub transport: Option<Transport>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_mode: Option<AuthMode>,
    pub transcode_audio: Option<bool>,
    pub tvg_id: Option<String>,
    pub tvg_logo: Option<String>,
    pub epg_title: Option<String>,
    pub epg_desc: Option<String>,
    pub mosaic_sources: Option<Vec<ChannelId>>,
}

/// Request to change a channel number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SetChannelNumberRequest {
    pub number: ChannelId,
}

/// Request to move a lineup entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ReorderChannelsRequest {
    pub from: usize,
    pub to: usize,
}

/// Response containing a single channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ChannelResponse {
    pub channel: Channel,
}

/// Response containing the lineup in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ChannelListResponse {
    pub channels: Vec<Channel>,
}

/// Response for a probe request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ProbeResponse {
    pub channel_id: ChannelId,
    pub status: ProbeStatus,
}

/// Response listing active streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StreamListResponse {
    pub streams: Vec<StreamInfo>,
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}
