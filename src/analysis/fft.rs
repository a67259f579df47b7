use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Periodic Hann window (the `fftbins=True` variant used for spectral analysis).
pub(crate) fn hann_window(length: usize) -> Vec<f32> {
    if length <= 1 {
        return vec![1.0_f32; length.max(1)];
    }
    let denom = length as f32;
    (0..length)
        .map(|n| 0.5_f32 * (1.0 - (2.0 * PI * n as f32 / denom).cos()))
        .collect()
}

/// Reusable window + forward FFT for fixed-size power spectra.
pub(crate) struct SpectrumPlan {
    len: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumPlan {
    pub(crate) fn new(len: usize) -> Result<Self, String> {
        if len == 0 {
            return Err("FFT length must be positive".to_string());
        }
        let fft = FftPlanner::<f32>::new().plan_fft_forward(len);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Ok(Self {
            len,
            window: hann_window(len),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); len],
            scratch,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Number of non-negative frequency bins, `len / 2 + 1`.
    pub(crate) fn bins(&self) -> usize {
        self.len / 2 + 1
    }

    /// Window `frame`, transform it and write `|X|^2` for each bin into `power`.
    pub(crate) fn power_into(&mut self, frame: &[f32], power: &mut Vec<f32>) {
        for (i, cell) in self.buffer.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            *cell = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        power.clear();
        power.extend(self.buffer[..self.bins()].iter().map(|c| c.norm_sqr()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_hann_starts_at_zero_and_peaks_mid_frame() {
        let w = hann_window(8);
        assert!(w[0].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!((w[1] - w[7]).abs() < 1e-6);
    }

    #[test]
    fn sine_energy_lands_in_matching_bin() {
        let len = 64;
        let mut plan = SpectrumPlan::new(len).unwrap();
        let frame: Vec<f32> = (0..len)
            .map(|i| (2.0 * PI * 8.0 * i as f32 / len as f32).sin())
            .collect();
        let mut power = Vec::new();
        plan.power_into(&frame, &mut power);
        assert_eq!(power.len(), 33);
        let peak = power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
            .unwrap();
        assert_eq!(peak, 8);
    }

    #[test]
    fn non_power_of_two_lengths_are_supported() {
        let mut plan = SpectrumPlan::new(300).unwrap();
        let mut power = Vec::new();
        plan.power_into(&[1.0; 300], &mut power);
        assert_eq!(power.len(), 151);
        assert!(power[0] > power[10]);
    }
}
