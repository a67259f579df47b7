//! Batch corpus fitting and single-sample projection.

use std::path::{Path, PathBuf};

use ndarray::{Array2, Axis};

use super::model::PlacementModel;
use super::normalize::NormalizationStats;
use super::umap::{UmapModel, UmapParams};
use super::workers;
use crate::analysis::FeatureExtractor;
use crate::config::LayoutConfig;
use crate::error::{LayoutError, ProjectError};
use crate::fs_util;

/// Reducer parameters plus extraction scheduling for one corpus build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutOptions {
    pub umap: UmapParams,
    /// Extraction workers; `None` uses one per available core.
    pub worker_count: Option<usize>,
}

/// An input that was left out of the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of fitting a corpus.
#[derive(Debug)]
pub struct CorpusLayout {
    /// One centered coordinate per entry of [`CorpusLayout::sources`].
    pub coords: Array2<f32>,
    /// Inputs that produced a feature vector, in input order.
    pub sources: Vec<PathBuf>,
    /// Fitted model; absent when fewer than two inputs survived extraction.
    pub model: Option<PlacementModel>,
    pub skipped: Vec<SkippedSource>,
    /// A model left at the save path by an earlier build, deleted because this
    /// build could not fit a replacement.
    pub removed_model: Option<PathBuf>,
}

impl CorpusLayout {
    fn degenerate(
        sources: Vec<PathBuf>,
        n_components: usize,
        skipped: Vec<SkippedSource>,
        save_model: Option<&Path>,
    ) -> Result<Self, LayoutError> {
        Ok(Self {
            coords: Array2::zeros((sources.len(), n_components)),
            sources,
            model: None,
            skipped,
            removed_model: retire_stale_model(save_model)?,
        })
    }
}

/// Delete the model at `save_model` so projection cannot use a space the new
/// metadata no longer matches.
fn retire_stale_model(save_model: Option<&Path>) -> Result<Option<PathBuf>, LayoutError> {
    let Some(path) = save_model else {
        return Ok(None);
    };
    let removed = fs_util::remove_if_exists(path).map_err(|source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if removed {
        tracing::warn!(
            "Fewer than two usable files; removed stale layout model {}",
            path.display()
        );
        Ok(Some(path.to_path_buf()))
    } else {
        tracing::warn!(
            "Fewer than two usable files; not writing a layout model to {}",
            path.display()
        );
        Ok(None)
    }
}

/// Extract, normalize, fit and center a corpus, optionally persisting the model.
///
/// Files that fail extraction are skipped and reported. With one surviving
/// file the result is the origin and no model is fitted or written; a model
/// already at `save_model` is deleted and reported in
/// [`CorpusLayout::removed_model`].
pub fn fit_corpus(
    paths: &[PathBuf],
    extractor: &FeatureExtractor,
    options: &LayoutOptions,
    save_model: Option<&Path>,
) -> Result<CorpusLayout, LayoutError> {
    options.umap.validate()?;
    let n_components = options.umap.n_components;
    if paths.is_empty() {
        return CorpusLayout::degenerate(Vec::new(), n_components, Vec::new(), save_model);
    }

    let workers = workers::worker_count(options.worker_count, paths.len());
    tracing::info!("Extracting features from {} files with {workers} workers", paths.len());
    let results = workers::run_ordered(paths, workers, |path| extractor.extract(path));
    let results = paths.iter().zip(results).map(|(path, outcome)| {
        outcome.unwrap_or_else(|reason| {
            Err(LayoutError::Extraction {
                path: path.clone(),
                reason,
            })
        })
    });

    let mut sources = Vec::with_capacity(paths.len());
    let mut rows = Vec::with_capacity(paths.len() * extractor.feature_len());
    let mut skipped = Vec::new();
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(features) => {
                rows.extend_from_slice(&features);
                sources.push(path.clone());
            }
            Err(err) => {
                tracing::warn!("Skipping {}: {err}", path.display());
                skipped.push(SkippedSource {
                    path: path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    if sources.len() < 2 {
        if sources.is_empty() {
            tracing::warn!("No files survived feature extraction");
        }
        return CorpusLayout::degenerate(sources, n_components, skipped, save_model);
    }

    let matrix = Array2::from_shape_vec((sources.len(), extractor.feature_len()), rows)
        .map_err(|err| LayoutError::Reduce(format!("Feature matrix shape: {err}")))?;
    tracing::debug!("Normalizing {} x {} feature matrix", matrix.nrows(), matrix.ncols());
    let normalization = NormalizationStats::fit(matrix.view())?;
    let normalized = normalization.apply(matrix.view())?;

    tracing::info!("Fitting {n_components}D layout over {} files", sources.len());
    let (mut coords, reducer) = UmapModel::fit(normalized.view(), &options.umap)?;

    let centroid = coords
        .mean_axis(Axis(0))
        .ok_or_else(|| LayoutError::Reduce("Empty embedding".to_string()))?;
    coords -= &centroid;
    tracing::debug!("Centered layout on {:?}", centroid.as_slice());

    let model = PlacementModel::new(
        FeatureExtractor::new(extractor.config().clone())?,
        normalization,
        reducer,
        Some(centroid.to_vec()),
    );
    if let Some(path) = save_model {
        model.save(path)?;
    }
    Ok(CorpusLayout {
        coords,
        sources,
        model: Some(model),
        skipped,
        removed_model: None,
    })
}

/// Project one audio file with the persisted model.
///
/// The model path defaults to `config.paths.model`. A missing model is
/// reported separately from every other failure.
pub fn project_sample(
    path: &Path,
    model_path: Option<&Path>,
    config: &LayoutConfig,
) -> Result<Vec<f32>, ProjectError> {
    let model_path = model_path.unwrap_or(&config.paths.model);
    let model = match PlacementModel::load(model_path) {
        Ok(model) => model,
        Err(LayoutError::ModelMissing { path }) => return Err(ProjectError::NoModel { path }),
        Err(source) => {
            return Err(ProjectError::TransformFailed {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    model
        .project(path)
        .map_err(|source| ProjectError::TransformFailed {
            path: path.to_path_buf(),
            source,
        })
}
