//! Channel definitions.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Numeric-string channel number, used both as the lineup guide number and as
/// the lookup key in the registry.
pub type ChannelId = String;

/// Maximum number of tiles a mosaic can composite.
pub const MAX_MOSAIC_SOURCES: usize = 4;

/// Minimum number of live members a mosaic needs to be composited.
pub const MIN_MOSAIC_SOURCES: usize = 2;

/// URL scheme used for the placeholder source of mosaic channels.
pub const MOSAIC_SCHEME: &str = "mosaic://";

/// RTSP transport preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum Transport {
    /// Let the transcoder negotiate
    #[default]
    Auto,
    /// Interleaved RTP over the RTSP TCP connection
    #[serde(rename = "TCP")]
    Tcp,
    /// RTP over UDP
    #[serde(rename = "UDP")]
    Udp,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "Auto"),
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
        }
    }
}

/// How credentials are presented to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum AuthMode {
    /// Credentials are injected into RTSP URLs when missing
    #[default]
    Auto,
    /// Credentials are sent as an `Authorization: Basic` request header
    #[serde(rename = "Header-Basic")]
    HeaderBasic,
}

/// Outcome of the last connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum ProbeState {
    #[default]
    Idle,
    #[serde(rename = "OK")]
    Ok,
    Error,
}

/// Ephemeral probe status shown to operators. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ProbeStatus {
    pub state: ProbeState,
    #[serde(default)]
    pub detail: String,
}

impl ProbeStatus {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            state: ProbeState::Ok,
            detail: detail.into(),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            state: ProbeState::Error,
            detail: detail.into(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == ProbeState::Idle && self.detail.is_empty()
    }
}

/// A tunable channel.
///
/// A channel is either a single source (RTSP or HTTP(S) URL) or a mosaic of
/// 2-4 other channels, referenced by channel number. Mosaic channels carry a
/// `mosaic://` placeholder in `url`, which never resolves to a stream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Channel {
    /// Channel number
    pub id: ChannelId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Source URL (`rtsp` is accepted for configuration written by older releases)
    #[serde(default, alias = "rtsp")]
    pub url: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub auth_mode: AuthMode,
    /// Transcode audio to stereo AAC instead of copying it
    #[serde(default = "default_true")]
    pub transcode_audio: bool,
    /// Electronic programme guide id (defaults to `cam.<id>`)
    #[serde(default)]
    pub tvg_id: Option<String>,
    #[serde(default)]
    pub tvg_logo: String,
    /// Guide title (defaults to the display name)
    #[serde(default)]
    pub epg_title: Option<String>,
    #[serde(default = "default_epg_desc")]
    pub epg_desc: String,
    /// Member channel numbers of a mosaic, in tile order
    #[serde(default)]
    pub mosaic_sources: Vec<ChannelId>,
    #[serde(default, skip_serializing_if = "ProbeStatus::is_idle")]
    pub status: ProbeStatus,
}

fn default_true() -> bool {
    true
}

fn default_epg_desc() -> String {
    "Live feed".to_string()
}

impl Channel {
    /// Create a single-source channel with default settings.
    pub fn new(id: impl Into<ChannelId>, name: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        let name = name.into();
        Self {
            name: if name.is_empty() {
                format!("Channel {}", id)
            } else {
                name
            },
            id,
            url: url.into(),
            transport: Transport::Auto,
            username: String::new(),
            password: String::new(),
            auth_mode: AuthMode::Auto,
            transcode_audio: true,
            tvg_id: None,
            tvg_logo: String::new(),
            epg_title: None,
            epg_desc: default_epg_desc(),
            mosaic_sources: Vec::new(),
            status: ProbeStatus::default(),
        }
    }

    /// Create a mosaic channel over the given member channel numbers.
    ///
    /// Members beyond [`MAX_MOSAIC_SOURCES`] are dropped.
    pub fn mosaic(
        id: impl Into<ChannelId>,
        name: impl Into<String>,
        sources: Vec<ChannelId>,
        transcode_audio: bool,
    ) -> Self {
        let sources: Vec<ChannelId> = sources.into_iter().take(MAX_MOSAIC_SOURCES).collect();
        let url = format!("{}{}", MOSAIC_SCHEME, sources.join(","));
        let mut channel = Self::new(id, name, url);
        channel.transcode_audio = transcode_audio;
        channel.mosaic_sources = sources;
        channel
    }

    /// Builder-style credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Builder-style transport preference.
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// True when the channel declares enough members to be composited.
    pub fn is_mosaic(&self) -> bool {
        self.mosaic_sources.len() >= MIN_MOSAIC_SOURCES
    }

    /// The single-source URL, if this channel has one that a transcoder can open.
    pub fn stream_url(&self) -> Option<&str> {
        if is_supported_source_url(&self.url) {
            Some(self.url.as_str())
        } else {
            None
        }
    }

    pub fn guide_id(&self) -> String {
        match &self.tvg_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("cam.{}", self.id),
        }
    }

    pub fn guide_title(&self) -> &str {
        match &self.epg_title {
            Some(title) if !title.is_empty() => title,
            _ => &self.name,
        }
    }

    pub fn guide_description(&self) -> &str {
        if !self.epg_desc.is_empty() {
            &self.epg_desc
        } else if self.is_mosaic() {
            "Mosaic feed"
        } else {
            "Live feed"
        }
    }

    /// Fill in defaults that depend on the channel number (used after loading
    /// hand-written configuration).
    pub fn fill_defaults(&mut self) {
        if self.name.trim().is_empty() {
            self.name = format!("Channel {}", self.id);
        }
        self.mosaic_sources.truncate(MAX_MOSAIC_SOURCES);
    }

    /// Copy of the channel without its ephemeral status, as it is persisted.
    pub fn without_status(&self) -> Self {
        Self {
            status: ProbeStatus::default(),
            ..self.clone()
        }
    }
}

/// True for URL schemes the transcoder can open as a channel source.
pub fn is_supported_source_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    ["rtsp://", "rtsps://", "http://", "https://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

/// True for channel numbers an operator may assign: digits only, 1-99999.
pub fn is_valid_channel_number(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 5
        && id.bytes().all(|b| b.is_ascii_digit())
        && id.parse::<u32>().map(|n| n >= 1).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_id_and_name() {
        let ch = Channel::new("101", "", "rtsp://cam/stream");
        assert_eq!(ch.name, "Channel 101");
        assert_eq!(ch.guide_id(), "cam.101");
        assert_eq!(ch.guide_title(), "Channel 101");
        assert_eq!(ch.guide_description(), "Live feed");
        assert!(ch.transcode_audio);
    }

    #[test]
    fn test_mosaic_url_is_not_a_stream_source() {
        let ch = Channel::mosaic(
            "200",
            "Grid",
            vec!["1".into(), "2".into(), "3".into(), "4".into(), "5".into()],
            false,
        );
        assert!(ch.is_mosaic());
        assert_eq!(ch.mosaic_sources.len(), 4);
        assert_eq!(ch.url, "mosaic://1,2,3,4");
        assert_eq!(ch.stream_url(), None);
    }

    #[test]
    fn test_legacy_rtsp_field_and_defaults() {
        let ch: Channel =
            serde_json::from_str(r#"{"id": "7", "rtsp": "rtsp://10.0.0.2/live", "transport": "TCP", "auth_mode": "Header-Basic"}"#)
                .unwrap();
        assert_eq!(ch.url, "rtsp://10.0.0.2/live");
        assert_eq!(ch.transport, Transport::Tcp);
        assert_eq!(ch.auth_mode, AuthMode::HeaderBasic);
        assert!(ch.transcode_audio);
        assert_eq!(ch.epg_desc, "Live feed");
        assert!(ch.mosaic_sources.is_empty());
    }

    #[test]
    fn test_status_is_not_serialized_when_idle() {
        let mut ch = Channel::new("1", "Door", "rtsp://door/live");
        let json = serde_json::to_value(&ch).unwrap();
        assert!(json.get("status").is_none());

        ch.status = ProbeStatus::ok("probe rtsp ok");
        let json = serde_json::to_value(ch.without_status()).unwrap();
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_channel_number_validation() {
        assert!(is_valid_channel_number("1"));
        assert!(is_valid_channel_number("99999"));
        assert!(!is_valid_channel_number("0"));
        assert!(!is_valid_channel_number("100000"));
        assert!(!is_valid_channel_number("12a"));
        assert!(!is_valid_channel_number(""));
    }

    #[test]
    fn test_source_url_validation() {
        assert!(is_supported_source_url("rtsp://10.0.0.5:554/h264"));
        assert!(is_supported_source_url("HTTPS://example.com/live.m3u8"));
        assert!(!is_supported_source_url("mosaic://1,2"));
        assert!(!is_supported_source_url("rtsp://"));
        assert!(!is_supported_source_url(""));
    }
}
