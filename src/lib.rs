//! Layout core for the Soundromeda sample galaxy.
//!
//! Audio files are summarized into fixed-length spectral descriptors, fitted
//! into a 2D or 3D map with a seeded manifold reducer, and later projected one
//! at a time through the persisted placement model.

/// Feature extraction from audio files.
pub mod analysis;
/// Application directory helpers.
pub mod app_dirs;
/// TOML configuration for builds and projection.
pub mod config;
/// Error types shared across the crate.
pub mod error;
pub(crate) mod fs_util;
/// Normalization, reduction, persistence and corpus orchestration.
pub mod layout;
/// Tracing subscriber setup.
pub mod logging;

pub use analysis::{ExtractorConfig, FeatureExtractor};
pub use config::LayoutConfig;
pub use error::{LayoutError, ProjectError};
pub use layout::{
    BuiltinRequest, BuiltinSummary, CorpusLayout, GalaxyMeta, GalaxyPoint, LayoutOptions,
    PlacementModel, UmapParams, build_builtin_library, collect_audio_files, fit_corpus,
    project_sample,
};
