//! Locating the external transcoder and prober.
//!
//! Lookup order for each tool: explicit configured path, the bundled
//! directory (configured `bin_dir`, else the directory of the running
//! executable), then `PATH`. A missing tool is reported as `None`; callers
//! turn that into an error when the tool is actually needed.

use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::TranscoderSettings;

pub const TRANSCODER: &str = "ffmpeg";
pub const PROBER: &str = "ffprobe";

/// Resolved external executables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Executables {
    pub transcoder: Option<PathBuf>,
    pub prober: Option<PathBuf>,
}

impl Executables {
    pub fn discover(settings: &TranscoderSettings) -> Self {
        let bundled = settings.bin_dir.clone().or_else(current_exe_dir);
        let path_var = env::var_os("PATH");
        let search: Vec<PathBuf> = path_var
            .as_deref()
            .map(|p| env::split_paths(p).collect())
            .unwrap_or_default();

        let found = Self {
            transcoder: locate(
                TRANSCODER,
                settings.ffmpeg_path.as_deref(),
                bundled.as_deref(),
                &search,
            ),
            prober: locate(
                PROBER,
                settings.ffprobe_path.as_deref(),
                bundled.as_deref(),
                &search,
            ),
        };

        match &found.transcoder {
            Some(path) => info!("Transcoder: {}", path.display()),
            None => warn!("{} not found; tune requests will fail until it is installed", TRANSCODER),
        }
        match &found.prober {
            Some(path) => info!("Prober: {}", path.display()),
            None => warn!("{} not found; channel probes are disabled", PROBER),
        }
        found
    }
}

fn current_exe_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Find `name` by explicit path, bundled directory, then search path.
pub fn locate(
    name: &str,
    explicit: Option<&Path>,
    bundled: Option<&Path>,
    search: &[PathBuf],
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!("Configured {} path {} does not exist", name, path.display());
    }

    let file_name = format!("{}{}", name, env::consts::EXE_SUFFIX);
    bundled
        .into_iter()
        .chain(search.iter().map(PathBuf::as_path))
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(format!("{}{}", name, env::consts::EXE_SUFFIX));
        fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_bundled_dir_wins_over_search_path() {
        let bundled = TempDir::new().unwrap();
        let system = TempDir::new().unwrap();
        let expected = touch(bundled.path(), "ffmpeg");
        touch(system.path(), "ffmpeg");

        let found = locate(
            "ffmpeg",
            None,
            Some(bundled.path()),
            &[system.path().to_path_buf()],
        );
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_falls_back_to_search_path() {
        let bundled = TempDir::new().unwrap();
        let system = TempDir::new().unwrap();
        let expected = touch(system.path(), "ffprobe");

        let found = locate(
            "ffprobe",
            None,
            Some(bundled.path()),
            &[PathBuf::from("/nonexistent"), system.path().to_path_buf()],
        );
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_explicit_path() {
        let dir = TempDir::new().unwrap();
        let custom = touch(dir.path(), "my-ffmpeg");

        assert_eq!(locate("ffmpeg", Some(&custom), None, &[]), Some(custom));
    }

    #[test]
    fn test_missing_tool_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            locate("ffmpeg", Some(Path::new("/nonexistent/ffmpeg")), Some(dir.path()), &[]),
            None
        );
    }
}
