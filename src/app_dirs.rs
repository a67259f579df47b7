//! Where Soundromeda keeps its configuration and logs.
//!
//! Everything lives in one `.soundromeda` folder under the OS config
//! directory, or under `$SOUNDROMEDA_CONFIG_HOME` when that is set.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

/// Name of the application folder created under the base directory.
pub const APP_DIR_NAME: &str = ".soundromeda";
/// Environment variable that replaces the OS config directory as the base.
pub const CONFIG_HOME_ENV: &str = "SOUNDROMEDA_CONFIG_HOME";

const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum AppDirError {
    /// Neither the override variable nor the OS provided a base directory.
    #[error("No suitable base config directory available for application files")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolved application folder. Directories are created lazily, on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    root: PathBuf,
}

impl AppDirs {
    /// Resolve the folder from `SOUNDROMEDA_CONFIG_HOME` or the OS config directory.
    pub fn resolve() -> Result<Self, AppDirError> {
        let base = std::env::var_os(CONFIG_HOME_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
            .ok_or(AppDirError::NoBaseDir)?;
        Ok(Self::under(&base))
    }

    /// The application folder inside an explicit base directory.
    pub fn under(base: &Path) -> Self {
        Self {
            root: base.join(APP_DIR_NAME),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `path` of a file directly inside the application folder.
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// The log directory, created if missing.
    pub fn logs_dir(&self) -> Result<PathBuf, AppDirError> {
        let path = self.root.join(LOGS_DIR_NAME);
        std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
