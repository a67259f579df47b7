//! Audio analysis: decoding, spectral summaries and fixed-length feature vectors.

pub(crate) mod audio;
pub mod features;
pub(crate) mod fft;
pub(crate) mod frequency_domain;

pub use features::{ExtractorConfig, FeatureExtractor};
