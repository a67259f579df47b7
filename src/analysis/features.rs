use std::path::Path;

use serde::{Deserialize, Serialize};

use super::audio;
use super::frequency_domain::{FrequencyDomainAnalyzer, SpectralLayout};
use crate::error::LayoutError;

/// Parameters that define the feature space. Stored with each placement model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Analysis sample rate in Hz.
    pub sample_rate: u32,
    /// Only the first this-many seconds of each file are analyzed.
    pub max_duration_seconds: f32,
    /// STFT frame length in samples.
    pub n_fft: usize,
    /// STFT hop in samples.
    pub hop_length: usize,
    /// Number of mel bands summarized directly.
    pub n_mels: usize,
    /// Upper edge of the summarized mel bank in Hz.
    pub fmax_hz: f32,
    /// Number of cepstral coefficients kept.
    pub n_mfcc: usize,
    /// Mel bands feeding the cepstral transform.
    pub mfcc_mel_bands: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            max_duration_seconds: 30.0,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 32,
            fmax_hz: 8_000.0,
            n_mfcc: 13,
            mfcc_mel_bands: 128,
        }
    }
}

impl ExtractorConfig {
    /// Length of every feature vector produced with this configuration.
    pub fn feature_len(&self) -> usize {
        2 * self.n_mels + 2 * self.n_mfcc
    }

    /// Reject configurations that cannot produce a meaningful summary.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let problem = if self.sample_rate == 0 {
            Some("sample_rate must be positive".to_string())
        } else if !(self.max_duration_seconds.is_finite() && self.max_duration_seconds > 0.0) {
            Some(format!(
                "max_duration_seconds must be positive, got {}",
                self.max_duration_seconds
            ))
        } else if self.n_fft < 2 {
            Some(format!("n_fft must be at least 2, got {}", self.n_fft))
        } else if self.hop_length == 0 {
            Some("hop_length must be positive".to_string())
        } else if self.n_mels == 0 || self.mfcc_mel_bands == 0 || self.n_mfcc == 0 {
            Some("band counts must be positive".to_string())
        } else if self.n_mfcc > self.mfcc_mel_bands {
            Some(format!(
                "n_mfcc ({}) cannot exceed mfcc_mel_bands ({})",
                self.n_mfcc, self.mfcc_mel_bands
            ))
        } else if !(self.fmax_hz.is_finite() && self.fmax_hz > 0.0) {
            Some(format!("fmax_hz must be positive, got {}", self.fmax_hz))
        } else {
            None
        };
        match problem {
            Some(reason) => Err(LayoutError::Config(reason)),
            None => Ok(()),
        }
    }

    fn spectral_layout(&self) -> SpectralLayout {
        SpectralLayout {
            sample_rate: self.sample_rate,
            n_fft: self.n_fft,
            hop_length: self.hop_length,
            n_mels: self.n_mels,
            fmax_hz: self.fmax_hz,
            n_mfcc: self.n_mfcc,
            mfcc_mel_bands: self.mfcc_mel_bands,
        }
    }
}

/// Turns audio files into fixed-length descriptors.
///
/// Immutable after construction and safe to share between extraction workers.
pub struct FeatureExtractor {
    config: ExtractorConfig,
    analyzer: FrequencyDomainAnalyzer,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, LayoutError> {
        config.validate()?;
        let analyzer = FrequencyDomainAnalyzer::new(config.spectral_layout());
        Ok(Self { config, analyzer })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn feature_len(&self) -> usize {
        self.analyzer.feature_len()
    }

    /// Decode `path` and summarize it into a vector of [`Self::feature_len`] values.
    pub fn extract(&self, path: &Path) -> Result<Vec<f32>, LayoutError> {
        let to_error = |reason: String| LayoutError::Extraction {
            path: path.to_path_buf(),
            reason,
        };
        let samples = audio::load_mono(
            path,
            self.config.sample_rate,
            self.config.max_duration_seconds,
        )
        .map_err(to_error)?;
        self.analyzer.summarize(&samples).map_err(to_error)
    }
}
