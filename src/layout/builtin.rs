//! Built-in library export: fit a corpus in 3D and write galaxy metadata.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::pipeline::{LayoutOptions, SkippedSource, fit_corpus};
use crate::analysis::FeatureExtractor;
use crate::error::LayoutError;
use crate::fs_util;

/// One sample on the galaxy map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalaxyPoint {
    pub id: String,
    pub coords_2d: [f32; 2],
    pub coords_3d: [f32; 3],
    pub name: String,
    pub audio_path: String,
}

/// The metadata document consumed by the galaxy API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GalaxyMeta {
    pub points: Vec<GalaxyPoint>,
}

impl GalaxyMeta {
    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let bytes = std::fs::read(path).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| LayoutError::Serialize {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write pretty-printed JSON atomically, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), LayoutError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|source| LayoutError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        fs_util::atomic_write(path, &bytes).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Inputs for [`build_builtin_library`].
#[derive(Debug, Clone)]
pub struct BuiltinRequest {
    pub files: Vec<PathBuf>,
    pub meta_path: PathBuf,
    /// Where to persist the placement model, if anywhere.
    pub model_path: Option<PathBuf>,
    /// Prefix for every `audio_path`, e.g. `audio/`.
    pub base_audio_path: String,
    /// Paths under this root keep their relative directories in `audio_path`.
    pub audio_root: Option<PathBuf>,
}

/// What a built-in library build produced.
#[derive(Debug)]
pub struct BuiltinSummary {
    pub points: usize,
    pub skipped: Vec<SkippedSource>,
    pub meta_path: PathBuf,
    /// Set only when a model was actually written.
    pub model_path: Option<PathBuf>,
    /// Set when too few files survived and an older model was deleted.
    pub removed_model: Option<PathBuf>,
}

/// Fit the files in 3D and write the galaxy metadata document.
pub fn build_builtin_library(
    request: &BuiltinRequest,
    extractor: &FeatureExtractor,
    options: &LayoutOptions,
) -> Result<BuiltinSummary, LayoutError> {
    let mut options = options.clone();
    options.umap.n_components = 3;
    let files: Vec<PathBuf> = request.files.iter().map(|path| absolutize(path)).collect();
    let root = request.audio_root.as_deref().map(absolutize);

    let layout = fit_corpus(&files, extractor, &options, request.model_path.as_deref())?;
    let points: Vec<GalaxyPoint> = layout
        .sources
        .iter()
        .zip(layout.coords.rows())
        .enumerate()
        .map(|(index, (path, row))| {
            let (x, y, z) = (row[0], row[1], row[2]);
            GalaxyPoint {
                id: format!("builtin-{index}"),
                coords_2d: [x, y],
                coords_3d: [x, y, z],
                name: display_name(path),
                audio_path: audio_reference(path, root.as_deref(), &request.base_audio_path),
            }
        })
        .collect();

    let meta = GalaxyMeta { points };
    meta.save(&request.meta_path)?;
    tracing::info!(
        "Wrote {} points to {}",
        meta.points.len(),
        request.meta_path.display()
    );
    Ok(BuiltinSummary {
        points: meta.points.len(),
        skipped: layout.skipped,
        meta_path: request.meta_path.clone(),
        model_path: layout
            .model
            .as_ref()
            .and(request.model_path.clone()),
        removed_model: layout.removed_model,
    })
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .or_else(|| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

/// `base` followed by the path relative to `root` with `/` separators, or by
/// the bare file name when there is no root or the file lies outside it.
fn audio_reference(path: &Path, root: Option<&Path>, base: &str) -> String {
    let relative = root
        .and_then(|root| path.strip_prefix(root).ok())
        .map(|rel| {
            rel.components()
                .map(|part| part.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .filter(|rel| !rel.is_empty())
        .unwrap_or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
    format!("{base}{relative}")
}
