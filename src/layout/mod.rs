//! Corpus layout: normalization, manifold reduction, model persistence and
//! the batch/single-sample orchestration built on top of them.

pub mod builtin;
pub mod collect;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod umap;
mod workers;

pub use builtin::{BuiltinRequest, BuiltinSummary, GalaxyMeta, GalaxyPoint, build_builtin_library};
pub use collect::collect_audio_files;
pub use model::PlacementModel;
pub use normalize::NormalizationStats;
pub use pipeline::{CorpusLayout, LayoutOptions, SkippedSource, fit_corpus, project_sample};
pub use umap::{UmapModel, UmapParams, effective_neighbors};
