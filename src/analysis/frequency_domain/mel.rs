/// Triangular mel filter bank on the Slaney mel scale with area normalization.
pub(super) struct MelBank {
    filters: Vec<Vec<(usize, f32)>>,
}

impl MelBank {
    pub(super) fn new(sample_rate: u32, fft_len: usize, mel_bands: usize, f_min: f32, f_max: f32) -> Self {
        let sr = sample_rate.max(1) as f64;
        let nyquist = sr * 0.5;
        let f_max = (f_max as f64).min(nyquist).max(f_min as f64);
        let mel_points = mel_points(mel_bands, f_min as f64, f_max);
        let bins = fft_len / 2 + 1;
        let fft_freqs: Vec<f64> = (0..bins).map(|k| k as f64 * sr / fft_len.max(1) as f64).collect();
        let filters = (0..mel_bands)
            .map(|m| build_filter(&fft_freqs, mel_points[m], mel_points[m + 1], mel_points[m + 2]))
            .collect();
        Self { filters }
    }

    pub(super) fn bands(&self) -> usize {
        self.filters.len()
    }

    pub(super) fn apply_into(&self, power: &[f32], out: &mut Vec<f32>) {
        out.clear();
        for filter in &self.filters {
            let mut sum = 0.0_f64;
            for &(bin, weight) in filter {
                let p = power.get(bin).copied().unwrap_or(0.0).max(0.0) as f64;
                sum += p * weight as f64;
            }
            out.push(sum as f32);
        }
    }

    #[cfg(test)]
    fn is_empty_band(&self, band: usize) -> bool {
        self.filters.get(band).is_none_or(|filter| filter.is_empty())
    }
}

fn mel_points(mel_bands: usize, f_min: f64, f_max: f64) -> Vec<f64> {
    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);
    (0..mel_bands + 2)
        .map(|i| {
            let t = i as f64 / (mel_bands + 1) as f64;
            mel_to_hz(mel_min + (mel_max - mel_min) * t)
        })
        .collect()
}

fn build_filter(fft_freqs: &[f64], left: f64, center: f64, right: f64) -> Vec<(usize, f32)> {
    let lower_width = center - left;
    let upper_width = right - center;
    if lower_width <= 0.0 || upper_width <= 0.0 {
        return Vec::new();
    }
    let norm = 2.0 / (right - left);
    fft_freqs
        .iter()
        .enumerate()
        .filter_map(|(bin, &freq)| {
            let rising = (freq - left) / lower_width;
            let falling = (right - freq) / upper_width;
            let weight = rising.min(falling).max(0.0) * norm;
            (weight > 0.0).then_some((bin, weight as f32))
        })
        .collect()
}

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1_000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}
