//! The fitted placement model and its on-disk artifact.
//!
//! The artifact is a single JSON document with an explicit format tag and
//! version so stale or foreign files are rejected instead of misread.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::normalize::NormalizationStats;
use super::umap::UmapModel;
use crate::analysis::{ExtractorConfig, FeatureExtractor};
use crate::error::LayoutError;
use crate::fs_util;

/// Format tag written at the top of every model artifact.
pub const MODEL_FORMAT: &str = "soundromeda.placement-model";
/// Current artifact layout version.
pub const MODEL_VERSION: u32 = 1;

/// Everything needed to place a new sample in an existing galaxy.
///
/// Immutable once built; share it behind an `Arc` between request handlers.
#[derive(Debug)]
pub struct PlacementModel {
    extractor: FeatureExtractor,
    normalization: NormalizationStats,
    reducer: UmapModel,
    centroid: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct ArtifactHeader {
    format: String,
    version: u32,
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    format: &'static str,
    version: u32,
    extractor: &'a ExtractorConfig,
    normalization: &'a NormalizationStats,
    reducer: &'a UmapModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    centroid: Option<&'a [f32]>,
}

#[derive(Deserialize)]
struct ArtifactBody {
    extractor: ExtractorConfig,
    normalization: NormalizationStats,
    reducer: UmapModel,
    #[serde(default)]
    centroid: Option<Vec<f32>>,
}

impl PlacementModel {
    pub(crate) fn new(
        extractor: FeatureExtractor,
        normalization: NormalizationStats,
        reducer: UmapModel,
        centroid: Option<Vec<f32>>,
    ) -> Self {
        Self {
            extractor,
            normalization,
            reducer,
            centroid,
        }
    }

    pub fn extractor_config(&self) -> &ExtractorConfig {
        self.extractor.config()
    }

    pub fn normalization(&self) -> &NormalizationStats {
        &self.normalization
    }

    pub fn reducer(&self) -> &UmapModel {
        &self.reducer
    }

    pub fn centroid(&self) -> Option<&[f32]> {
        self.centroid.as_deref()
    }

    pub fn n_components(&self) -> usize {
        self.reducer.n_components()
    }

    /// Extract features from `path` with the model's own extractor settings and
    /// place them in the galaxy.
    pub fn project(&self, path: &Path) -> Result<Vec<f32>, LayoutError> {
        let features = self.extractor.extract(path)?;
        self.transform_features(&features)
    }

    /// Normalize, reduce and center one raw feature vector.
    pub fn transform_features(&self, features: &[f32]) -> Result<Vec<f32>, LayoutError> {
        let normalized = self.normalization.apply_row(features)?;
        let mut coords = self.reducer.transform(&normalized)?;
        if let Some(centroid) = &self.centroid {
            for (value, center) in coords.iter_mut().zip(centroid) {
                *value -= center;
            }
        }
        Ok(coords)
    }

    /// Write the artifact atomically, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), LayoutError> {
        let artifact = ArtifactRef {
            format: MODEL_FORMAT,
            version: MODEL_VERSION,
            extractor: self.extractor.config(),
            normalization: &self.normalization,
            reducer: &self.reducer,
            centroid: self.centroid.as_deref(),
        };
        let bytes = serde_json::to_vec(&artifact).map_err(|source| LayoutError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        fs_util::atomic_write(path, &bytes).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Saved layout model to {}", path.display());
        Ok(())
    }

    /// Read and validate an artifact written by [`PlacementModel::save`].
    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(LayoutError::ModelMissing {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(LayoutError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let corrupt = |source| LayoutError::ModelCorrupt {
            path: path.to_path_buf(),
            source,
        };
        let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(corrupt)?;
        let header: ArtifactHeader = serde_json::from_value(value.clone()).map_err(corrupt)?;
        if header.format != MODEL_FORMAT || header.version != MODEL_VERSION {
            return Err(LayoutError::ModelSchema {
                path: path.to_path_buf(),
                found: format!("{} v{}", header.format, header.version),
            });
        }
        let body: ArtifactBody = serde_json::from_value(value).map_err(corrupt)?;
        Self::from_body(body).map_err(|reason| LayoutError::ModelInvalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn from_body(body: ArtifactBody) -> Result<Self, String> {
        body.normalization.validate()?;
        body.reducer.validate()?;
        let expected = body.extractor.feature_len();
        if body.normalization.dim() != expected {
            return Err(format!(
                "normalization covers {} features but the extractor yields {expected}",
                body.normalization.dim()
            ));
        }
        if body.reducer.input_dim() != expected {
            return Err(format!(
                "reducer expects {} features but the extractor yields {expected}",
                body.reducer.input_dim()
            ));
        }
        if let Some(centroid) = &body.centroid {
            if centroid.len() != body.reducer.n_components() {
                return Err(format!(
                    "centroid has {} values for a {}-component layout",
                    centroid.len(),
                    body.reducer.n_components()
                ));
            }
            if centroid.iter().any(|v| !v.is_finite()) {
                return Err("centroid contains non-finite values".to_string());
            }
        }
        let extractor = FeatureExtractor::new(body.extractor).map_err(|err| err.to_string())?;
        Ok(Self::new(
            extractor,
            body.normalization,
            body.reducer,
            body.centroid,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::umap::UmapParams;
    use ndarray::Array2;
    use tempfile::tempdir;

    fn tiny_model(centroid: Option<Vec<f32>>) -> PlacementModel {
        let config = ExtractorConfig {
            n_mels: 2,
            n_mfcc: 1,
            mfcc_mel_bands: 4,
            ..ExtractorConfig::default()
        };
        let dim = config.feature_len();
        let rows: Vec<f32> = (0..5 * dim).map(|i| ((i * 7) % 11) as f32).collect();
        let data = Array2::from_shape_vec((5, dim), rows).unwrap();
        let normalization = NormalizationStats::fit(data.view()).unwrap();
        let normalized = normalization.apply(data.view()).unwrap();
        let params = UmapParams {
            n_epochs: Some(30),
            ..UmapParams::default()
        };
        let (_, reducer) = UmapModel::fit(normalized.view(), &params).unwrap();
        PlacementModel::new(
            FeatureExtractor::new(config).unwrap(),
            normalization,
            reducer,
            centroid,
        )
    }

    #[test]
    fn save_then_load_transforms_identically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta").join("umap_model.json");
        let model = tiny_model(Some(vec![0.5, -0.25]));
        model.save(&path).unwrap();
        let loaded = PlacementModel::load(&path).unwrap();

        let features: Vec<f32> = (0..6).map(|i| i as f32 * 1.5).collect();
        assert_eq!(
            model.transform_features(&features).unwrap(),
            loaded.transform_features(&features).unwrap()
        );
        assert_eq!(loaded.centroid(), Some(&[0.5, -0.25][..]));
    }

    #[test]
    fn centroid_is_subtracted_only_when_present() {
        let centered = tiny_model(Some(vec![1.0, 2.0]));
        let plain = tiny_model(None);
        let features = vec![3.0_f32; 6];
        let a = centered.transform_features(&features).unwrap();
        let b = plain.transform_features(&features).unwrap();
        assert!((b[0] - a[0] - 1.0).abs() < 1e-5);
        assert!((b[1] - a[1] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn missing_corrupt_and_foreign_files_are_distinguished() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            PlacementModel::load(&missing),
            Err(LayoutError::ModelMissing { .. })
        ));

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, b"{ not json").unwrap();
        assert!(matches!(
            PlacementModel::load(&corrupt),
            Err(LayoutError::ModelCorrupt { .. })
        ));

        let foreign = dir.path().join("foreign.json");
        std::fs::write(&foreign, br#"{"format": "joblib", "version": 3}"#).unwrap();
        assert!(matches!(
            PlacementModel::load(&foreign),
            Err(LayoutError::ModelSchema { .. })
        ));

        let truncated = dir.path().join("truncated.json");
        std::fs::write(
            &truncated,
            format!(r#"{{"format": "{MODEL_FORMAT}", "version": {MODEL_VERSION}}}"#),
        )
        .unwrap();
        assert!(matches!(
            PlacementModel::load(&truncated),
            Err(LayoutError::ModelCorrupt { .. })
        ));
    }

    #[test]
    fn inconsistent_centroid_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        tiny_model(Some(vec![0.0, 0.0])).save(&path).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        value["centroid"] = serde_json::json!([0.0, 0.0, 0.0]);
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
        assert!(matches!(
            PlacementModel::load(&path),
            Err(LayoutError::ModelInvalid { .. })
        ));
    }
}
