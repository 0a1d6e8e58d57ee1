//! Cross-platform data path resolution.
//!
//! Decides where the channel lineup (`channels.json`) lives, based on
//! platform conventions and Docker detection.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CHANNELS_FILE: &str = "channels.json";

/// Resolved paths for application data storage.
#[derive(Debug, Clone)]
pub struct DataPaths {
    /// Path to the persisted channel lineup
    pub channels_path: PathBuf,
}

/// Configuration for path resolution.
#[derive(Debug, Default)]
pub struct PathConfig {
    /// Explicit data directory (channels.json will be inside)
    pub data_dir: Option<PathBuf>,
    /// Explicit path to the channel lineup file
    pub channels_path: Option<PathBuf>,
}

impl DataPaths {
    /// Resolve data paths based on configuration.
    ///
    /// Priority (highest to lowest):
    /// 1. Explicit channels_path
    /// 2. Explicit data_dir
    /// 3. Default directory (platform-specific or Docker-detected)
    pub fn resolve(config: PathConfig) -> anyhow::Result<Self> {
        if let Some(path) = config.channels_path {
            info!("Using custom channels path: {}", path.display());
            return Ok(Self {
                channels_path: path,
            });
        }

        let base_dir = match config.data_dir {
            Some(dir) => dir,
            None => Self::default_data_dir(),
        };

        if !base_dir.exists() {
            std::fs::create_dir_all(&base_dir)?;
            info!("Created data directory: {}", base_dir.display());
        }

        let channels_path = base_dir.join(CHANNELS_FILE);
        Self::check_stray_lineup(&channels_path);
        info!("Channel lineup: {}", channels_path.display());

        Ok(Self { channels_path })
    }

    /// Determine the default data directory based on platform and environment.
    fn default_data_dir() -> PathBuf {
        if Self::is_docker() {
            info!("Docker environment detected, using ./data/ for storage");
            return PathBuf::from("./data");
        }

        match ProjectDirs::from("", "", "camtuner") {
            Some(proj_dirs) => proj_dirs.data_dir().to_path_buf(),
            None => {
                warn!("Could not determine user data directory, falling back to ./data/");
                PathBuf::from("./data")
            }
        }
    }

    /// Detect if running inside a Docker container.
    fn is_docker() -> bool {
        if Path::new("/.dockerenv").exists() {
            return true;
        }

        if let Ok(cgroup) = std::fs::read_to_string("/proc/self/cgroup") {
            if cgroup.contains("docker") || cgroup.contains("containerd") {
                return true;
            }
        }

        false
    }

    /// Warn when a lineup file in the working directory is being ignored.
    fn check_stray_lineup(channels_path: &Path) {
        let cwd_channels = Path::new("./channels.json");
        if cwd_channels.exists()
            && cwd_channels.canonicalize().ok() != channels_path.canonicalize().ok()
        {
            warn!(
                "Found channels.json in current directory, but using: {}",
                channels_path.display()
            );
        }
    }
}
