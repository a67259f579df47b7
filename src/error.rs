//! Error types shared by the layout pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while extracting features, fitting, persisting or projecting layouts.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Requested output dimensionality is not 2 or 3.
    #[error("n_components must be 2 or 3, got {0}")]
    InvalidComponents(usize),
    /// Extractor or reducer parameters are unusable.
    #[error("Invalid layout configuration: {0}")]
    Config(String),
    /// An audio file could not be decoded or summarized.
    #[error("Feature extraction failed for {path}: {reason}")]
    Extraction {
        /// Audio file that failed.
        path: PathBuf,
        /// Decoder or DSP failure message.
        reason: String,
    },
    /// The manifold reducer rejected its input or produced unusable output.
    #[error("Manifold reduction failed: {0}")]
    Reduce(String),
    /// No placement model has been written at the given location yet.
    #[error("No layout model at {path}; build the corpus with a model path first")]
    ModelMissing {
        /// Location that was probed.
        path: PathBuf,
    },
    /// The model file exists but could not be deserialized.
    #[error("Layout model at {path} is unreadable: {source}")]
    ModelCorrupt {
        /// Model file path.
        path: PathBuf,
        /// Deserialization error.
        source: serde_json::Error,
    },
    /// The model file carries an unknown format tag or version.
    #[error("Layout model at {path} has unsupported format {found}")]
    ModelSchema {
        /// Model file path.
        path: PathBuf,
        /// Format tag and version found in the file.
        found: String,
    },
    /// The model file parsed but its contents are inconsistent.
    #[error("Layout model at {path} is inconsistent: {reason}")]
    ModelInvalid {
        /// Model file path.
        path: PathBuf,
        /// Which shape check failed.
        reason: String,
    },
    /// Filesystem access failed.
    #[error("I/O failed for {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// A JSON document could not be produced.
    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        /// Destination path.
        path: PathBuf,
        /// Serialization error.
        source: serde_json::Error,
    },
}

/// Failures surfaced to callers that project a single uploaded sample.
///
/// A missing model is an operational problem (the corpus was never built),
/// while a transform failure usually means the uploaded audio is bad.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// No placement model exists at the resolved location.
    #[error("No layout model at {path}; build the corpus with a model path first")]
    NoModel {
        /// Resolved model location.
        path: PathBuf,
    },
    /// Loading the model, extracting features or transforming failed.
    #[error("Failed to transform {path} with model: {source}")]
    TransformFailed {
        /// Audio file being projected.
        path: PathBuf,
        /// Original cause.
        #[source]
        source: LayoutError,
    },
}

impl ProjectError {
    /// Whether the failure is an operational/config issue rather than bad input audio.
    pub fn is_operational(&self) -> bool {
        match self {
            ProjectError::NoModel { .. } => true,
            ProjectError::TransformFailed { source, .. } => matches!(
                source,
                LayoutError::ModelCorrupt { .. }
                    | LayoutError::ModelSchema { .. }
                    | LayoutError::ModelInvalid { .. }
                    | LayoutError::Io { .. }
            ),
        }
    }
}
