//! TOML configuration for corpus builds and sample projection.
//!
//! Every section is optional; missing keys fall back to defaults so a config
//! file only needs to list what it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::ExtractorConfig;
use crate::app_dirs;
use crate::fs_util;
use crate::layout::{LayoutOptions, UmapParams};

/// File name of the configuration inside the application directory.
pub const CONFIG_FILE_NAME: &str = "soundromeda.toml";

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No application directory could be resolved.
    #[error("No suitable config directory found: {0}")]
    NoConfigDir(#[from] app_dirs::AppDirError),
    /// Failed to read a config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to write a config file.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Path that failed to write.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`LayoutConfig`].
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        /// Offending file.
        path: PathBuf,
        /// Parser error.
        source: toml::de::Error,
    },
    /// The configuration could not be rendered as TOML.
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        /// Destination path.
        path: PathBuf,
        /// Serializer error.
        source: toml::ser::Error,
    },
}

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub extractor: ExtractorConfig,
    pub layout: LayoutSection,
    pub paths: PathsSection,
}

/// Reducer and scheduling knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutSection {
    pub n_neighbors: usize,
    pub min_dist: f32,
    pub seed: u64,
    /// Extraction workers; 0 means one per available core.
    pub worker_count: usize,
}

impl Default for LayoutSection {
    fn default() -> Self {
        let umap = UmapParams::default();
        Self {
            n_neighbors: umap.n_neighbors,
            min_dist: umap.min_dist,
            seed: umap.seed,
            worker_count: 0,
        }
    }
}

/// Artifact locations, relative to the working directory unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsSection {
    /// Placement model written by builds and read by projection.
    pub model: PathBuf,
    /// Galaxy metadata JSON written by builds.
    pub meta: PathBuf,
    /// Prefix prepended to every point's `audio_path`.
    pub base_audio_path: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            model: PathBuf::from("static/meta/umap_model.json"),
            meta: PathBuf::from("static/meta/builtin.json"),
            base_audio_path: "audio/".to_string(),
        }
    }
}

impl LayoutConfig {
    /// Reducer and worker options for a fit with `n_components` outputs.
    pub fn layout_options(&self, n_components: usize) -> LayoutOptions {
        LayoutOptions {
            umap: UmapParams {
                n_components,
                n_neighbors: self.layout.n_neighbors,
                min_dist: self.layout.min_dist,
                seed: self.layout.seed,
                ..UmapParams::default()
            },
            worker_count: (self.layout.worker_count > 0).then_some(self.layout.worker_count),
        }
    }
}

/// Default configuration file path inside the application directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::AppDirs::resolve()?.file(CONFIG_FILE_NAME))
}

/// Load configuration from `path`, returning defaults if the file is missing.
pub fn load_or_default(path: &Path) -> Result<LayoutConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}; using defaults", path.display());
        return Ok(LayoutConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the configuration as pretty TOML, atomically.
pub fn save_to_path(config: &LayoutConfig, path: &Path) -> Result<(), ConfigError> {
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    fs_util::atomic_write(path, data.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, LayoutConfig::default());
        assert_eq!(config.paths.model, PathBuf::from("static/meta/umap_model.json"));
        assert_eq!(config.extractor.sample_rate, 22_050);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("soundromeda.toml");
        std::fs::write(
            &path,
            "[layout]\nn_neighbors = 8\n\n[paths]\nbase_audio_path = \"samples/\"\n",
        )
        .unwrap();
        let config = load_or_default(&path).unwrap();
        assert_eq!(config.layout.n_neighbors, 8);
        assert_eq!(config.layout.min_dist, 0.1);
        assert_eq!(config.paths.base_audio_path, "samples/");
        assert_eq!(config.paths.meta, PathBuf::from("static/meta/builtin.json"));
    }

    #[test]
    fn save_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("soundromeda.toml");
        let mut config = LayoutConfig::default();
        config.layout.seed = 7;
        config.layout.worker_count = 3;
        config.extractor.n_mels = 40;
        save_to_path(&config, &path).unwrap();
        assert_eq!(load_or_default(&path).unwrap(), config);
    }

    #[test]
    fn malformed_file_is_reported_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[layout\nseed = ").unwrap();
        match load_or_default(&path) {
            Err(ConfigError::ParseToml { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn layout_options_map_zero_workers_to_auto() {
        let config = LayoutConfig::default();
        let options = config.layout_options(3);
        assert_eq!(options.umap.n_components, 3);
        assert_eq!(options.umap.n_neighbors, 15);
        assert_eq!(options.worker_count, None);
    }
}
