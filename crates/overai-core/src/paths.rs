use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::{Error, Result};

pub const APP_NAME: &str = "OverAI";

/// Per-user files the application reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_file: PathBuf,
    pub state_file: PathBuf,
    pub crash_file: PathBuf,
    pub session_marker: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Resolve the platform locations for the current user.
    pub fn discover() -> Result<Self> {
        let project = ProjectDirs::from("com", "overai", APP_NAME).ok_or_else(|| {
            Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not find home directory",
            ))
        })?;

        let log_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .map(|home| home.join("Library").join("Logs").join(APP_NAME))
                .unwrap_or_else(|| project.data_dir().join("logs"))
        } else {
            project.data_dir().join("logs")
        };

        let data = project.data_dir();
        Ok(Self {
            config_file: project.config_dir().join("config.json"),
            state_file: data.join("window_state.json"),
            crash_file: data.join("crash_history.json"),
            session_marker: data.join("session.lock"),
            log_dir,
        })
    }

    /// Everything under a single directory.
    pub fn in_dir(root: &Path) -> Self {
        Self {
            config_file: root.join("config.json"),
            state_file: root.join("window_state.json"),
            crash_file: root.join("crash_history.json"),
            session_marker: root.join("session.lock"),
            log_dir: root.join("logs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_dir_keeps_files_together() {
        let paths = AppPaths::in_dir(Path::new("/tmp/overai"));
        assert_eq!(paths.state_file, Path::new("/tmp/overai/window_state.json"));
        assert_eq!(paths.session_marker, Path::new("/tmp/overai/session.lock"));
    }
}
