//! Configuration management.

use crate::paths::{DataPaths, PathConfig};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// User agent presented to cameras. Some firmware only serves known players.
pub const DEFAULT_USER_AGENT: &str = "LibVLC/3.0.20 (LIVE555 Streaming Media v2021.12.30)";

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerSettings,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    transcoder: TranscoderSettings,
    #[serde(default)]
    stream: StreamSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StorageConfig {
    data_dir: Option<PathBuf>,
    channels_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    log_level: Option<String>,
}

/// `[server]` section: how the tuner presents itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Friendly name, also used as the MPEG-TS service provider
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Fixed device id (8 hex digits); derived from the host name when unset
    pub device_id: Option<String>,
    /// Tuner count advertised to clients
    pub tuner_count: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: camtuner_types::DEFAULT_SERVER_NAME.to_string(),
            host: "0.0.0.0".to_string(),
            port: camtuner_types::DEFAULT_PORT,
            device_id: None,
            tuner_count: 1,
        }
    }
}

/// `[transcoder]` section: external executables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderSettings {
    /// Explicit transcoder executable
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit prober executable
    pub ffprobe_path: Option<PathBuf>,
    /// Bundled executables directory (defaults to the directory of the running binary)
    pub bin_dir: Option<PathBuf>,
    pub user_agent: String,
    pub probe_timeout_secs: u64,
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            bin_dir: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            probe_timeout_secs: 12,
        }
    }
}

impl TranscoderSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

/// `[stream]` section: relay and restart tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Bytes read from the transcoder per chunk (7 TS packets)
    pub chunk_size: usize,
    pub backoff_floor_ms: u64,
    pub backoff_cap_ms: u64,
    pub backoff_factor: f64,
    /// Time a pipeline gets to exit after SIGINT before it is killed
    pub teardown_grace_ms: u64,
    /// Chunks buffered between the pipeline and a slow viewer
    pub buffer_chunks: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1316,
            backoff_floor_ms: 1000,
            backoff_cap_ms: 10_000,
            backoff_factor: 1.7,
            teardown_grace_ms: 2000,
            buffer_chunks: 32,
        }
    }
}

impl StreamSettings {
    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerSettings,
    /// Path to the persisted channel lineup
    pub channels_path: PathBuf,
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// Log level (if set, overrides RUST_LOG environment variable)
    pub log_level: Option<String>,
    pub transcoder: TranscoderSettings,
    pub stream: StreamSettings,
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are searched in this order:
    /// 1. `.camtuner.toml` in current directory
    /// 2. `config.toml` in user config directory (~/.config/camtuner/ on Linux)
    pub fn from_figment(
        host: Option<String>,
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        channels_path: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".camtuner.toml"));
        let user_config = directories::ProjectDirs::from("", "", "camtuner")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // defaults < user config < local config < env vars < CLI args
        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile::default()));

        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // CAMTUNER_SERVER__PORT=9000, CAMTUNER_STREAM__CHUNK_SIZE=1880
        figment = figment.merge(Env::prefixed("CAMTUNER_").split("__"));

        if let Some(ref h) = host {
            figment = figment.merge(Serialized::default("server.host", h));
        }
        if let Some(p) = port {
            figment = figment.merge(Serialized::default("server.port", p));
        }
        if let Some(ref dd) = data_dir {
            figment = figment.merge(Serialized::default("storage.data_dir", dd));
        }
        if let Some(ref cp) = channels_path {
            figment = figment.merge(Serialized::default("storage.channels_path", cp));
        }

        let config_file: ConfigFile = figment.extract()?;
        Self::from_file(config_file)
    }

    /// Create configuration from explicit values, everything else at defaults.
    pub fn new(
        port: u16,
        data_dir: Option<PathBuf>,
        channels_path: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let mut config_file = ConfigFile::default();
        config_file.server.port = port;
        config_file.storage = StorageConfig {
            data_dir,
            channels_path,
        };
        Self::from_file(config_file)
    }

    fn from_file(config_file: ConfigFile) -> anyhow::Result<Self> {
        let data_paths = DataPaths::resolve(PathConfig {
            data_dir: config_file.storage.data_dir,
            channels_path: config_file.storage.channels_path,
        })?;

        Ok(Self {
            server: config_file.server,
            channels_path: data_paths.channels_path,
            log_file: config_file.logging.log_file,
            log_level: config_file.logging.log_level,
            transcoder: config_file.transcoder,
            stream: config_file.stream,
        })
    }
}
