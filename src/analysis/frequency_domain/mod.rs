//! Frequency-domain summaries: log-mel band statistics and MFCC statistics.

mod mel;
mod stats;
mod stft;

use mel::MelBank;

use crate::analysis::fft::SpectrumPlan;

const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Reference level for power-to-decibel conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum DbReference {
    /// Relative to the loudest cell of the spectrogram.
    Max,
    /// Relative to unit power.
    Unit,
}

/// Frame layout shared by both spectral summaries.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SpectralLayout {
    pub(crate) sample_rate: u32,
    pub(crate) n_fft: usize,
    pub(crate) hop_length: usize,
    pub(crate) n_mels: usize,
    pub(crate) fmax_hz: f32,
    pub(crate) n_mfcc: usize,
    pub(crate) mfcc_mel_bands: usize,
}

/// Precomputed filter banks and DCT basis for one [`SpectralLayout`].
pub(crate) struct FrequencyDomainAnalyzer {
    layout: SpectralLayout,
    mel: MelBank,
    mfcc_mel: MelBank,
    dct: Vec<Vec<f32>>,
}

impl FrequencyDomainAnalyzer {
    pub(crate) fn new(layout: SpectralLayout) -> Self {
        let nyquist = layout.sample_rate as f32 * 0.5;
        let mel = MelBank::new(layout.sample_rate, layout.n_fft, layout.n_mels, 0.0, layout.fmax_hz);
        let mfcc_mel = MelBank::new(
            layout.sample_rate,
            layout.n_fft,
            layout.mfcc_mel_bands,
            0.0,
            nyquist,
        );
        let dct = dct_ortho_basis(layout.mfcc_mel_bands, layout.n_mfcc);
        Self {
            layout,
            mel,
            mfcc_mel,
            dct,
        }
    }

    /// Length of the vector produced by [`Self::summarize`].
    pub(crate) fn feature_len(&self) -> usize {
        2 * self.layout.n_mels + 2 * self.layout.n_mfcc
    }

    /// Summarize mono samples into `[mel_mean | mel_std | mfcc_mean | mfcc_std]`.
    pub(crate) fn summarize(&self, samples: &[f32]) -> Result<Vec<f32>, String> {
        let mut plan = SpectrumPlan::new(self.layout.n_fft)?;
        let frames = stft::frame_count(samples.len(), self.layout.hop_length);
        let mut mel_frames = Vec::with_capacity(frames);
        let mut mfcc_mel_frames = Vec::with_capacity(frames);
        stft::for_each_power_frame(samples, self.layout.hop_length, &mut plan, |power| {
            let mut mel = Vec::with_capacity(self.mel.bands());
            self.mel.apply_into(power, &mut mel);
            mel_frames.push(mel);
            let mut mfcc_mel = Vec::with_capacity(self.mfcc_mel.bands());
            self.mfcc_mel.apply_into(power, &mut mfcc_mel);
            mfcc_mel_frames.push(mfcc_mel);
        });

        power_to_db_in_place(&mut mel_frames, DbReference::Max);
        power_to_db_in_place(&mut mfcc_mel_frames, DbReference::Unit);
        let mfcc_frames: Vec<Vec<f32>> = mfcc_mel_frames
            .iter()
            .map(|frame| apply_dct(&self.dct, frame))
            .collect();

        let mel_stats = stats::band_stats(&mel_frames, self.layout.n_mels);
        let mfcc_stats = stats::band_stats(&mfcc_frames, self.layout.n_mfcc);
        let mut features = Vec::with_capacity(self.feature_len());
        features.extend_from_slice(&mel_stats.mean);
        features.extend_from_slice(&mel_stats.std);
        features.extend_from_slice(&mfcc_stats.mean);
        features.extend_from_slice(&mfcc_stats.std);
        if let Some(idx) = features.iter().position(|v| !v.is_finite()) {
            return Err(format!("Non-finite spectral feature at index {idx}"));
        }
        Ok(features)
    }
}

/// Convert power frames to decibels with an 80 dB dynamic range floor.
pub(crate) fn power_to_db_in_place(frames: &mut [Vec<f32>], reference: DbReference) {
    let ref_power = match reference {
        DbReference::Unit => 1.0,
        DbReference::Max => frames
            .iter()
            .flat_map(|frame| frame.iter().copied())
            .fold(0.0_f32, f32::max),
    };
    let ref_db = 10.0 * ref_power.max(AMIN).log10();
    let mut peak = f32::NEG_INFINITY;
    for value in frames.iter_mut().flat_map(|frame| frame.iter_mut()) {
        *value = 10.0 * value.max(AMIN).log10() - ref_db;
        peak = peak.max(*value);
    }
    let floor = peak - TOP_DB;
    for value in frames.iter_mut().flat_map(|frame| frame.iter_mut()) {
        *value = value.max(floor);
    }
}

fn dct_ortho_basis(inputs: usize, outputs: usize) -> Vec<Vec<f32>> {
    let n = inputs.max(1) as f64;
    (0..outputs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..inputs)
                .map(|m| {
                    let angle = std::f64::consts::PI * k as f64 * (2.0 * m as f64 + 1.0) / (2.0 * n);
                    (scale * angle.cos()) as f32
                })
                .collect()
        })
        .collect()
}

fn apply_dct(basis: &[Vec<f32>], values: &[f32]) -> Vec<f32> {
    basis
        .iter()
        .map(|row| {
            row.iter()
                .zip(values)
                .map(|(&w, &v)| w as f64 * v as f64)
                .sum::<f64>() as f32
        })
        .collect()
}
