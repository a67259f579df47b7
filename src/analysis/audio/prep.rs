/// Average interleaved channels into a mono buffer.
pub(crate) fn downmix_to_mono_into(out: &mut Vec<f32>, samples: &[f32], channels: u16) {
    let channels = channels.max(1) as usize;
    out.clear();
    if channels == 1 {
        out.extend_from_slice(samples);
        return;
    }
    let frames = samples.len() / channels;
    out.reserve(frames);
    for frame in samples.chunks_exact(channels) {
        let sum: f32 = frame.iter().copied().sum();
        out.push(sum / channels as f32);
    }
}

#[cfg(test)]
pub(crate) fn resample_linear(samples: &[f32], input_rate: u32, output_rate: u32) -> Vec<f32> {
    let mut out = Vec::new();
    resample_linear_into(&mut out, samples, input_rate, output_rate);
    out
}

/// Linearly interpolate `samples` from `input_rate` to `output_rate`.
pub(crate) fn resample_linear_into(
    out: &mut Vec<f32>,
    samples: &[f32],
    input_rate: u32,
    output_rate: u32,
) {
    let input_rate = input_rate.max(1);
    let output_rate = output_rate.max(1);
    out.clear();
    if samples.is_empty() || input_rate == output_rate {
        out.extend_from_slice(samples);
        return;
    }
    let out_len = ((samples.len() as f64 * output_rate as f64) / input_rate as f64)
        .round()
        .max(1.0) as usize;
    out.reserve(out_len);
    let step = input_rate as f64 / output_rate as f64;
    for i in 0..out_len {
        out.push(lerp_sample(samples, i as f64 * step));
    }
}

/// Replace non-finite samples with silence.
pub(crate) fn sanitize_in_place(samples: &mut [f32]) {
    for sample in samples.iter_mut() {
        if !sample.is_finite() {
            *sample = 0.0;
        }
    }
}

fn lerp_sample(samples: &[f32], pos: f64) -> f32 {
    let last = samples.len().saturating_sub(1);
    let idx0 = (pos.floor().max(0.0) as usize).min(last);
    let idx1 = (idx0 + 1).min(last);
    let frac = (pos - idx0 as f64).clamp(0.0, 1.0) as f32;
    let a = samples[idx0];
    let b = samples[idx1];
    a + (b - a) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels_and_drops_partial_frame() {
        let mut out = Vec::new();
        downmix_to_mono_into(&mut out, &[1.0, 0.0, 0.5, 0.5, 0.25], 2);
        assert_eq!(out, vec![0.5, 0.5]);
    }

    #[test]
    fn resample_doubles_length_and_keeps_ramp_monotonic() {
        let input: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let out = resample_linear(&input, 11_025, 22_050);
        assert_eq!(out.len(), 200);
        assert!(out.windows(2).all(|pair| pair[1] >= pair[0]));
        assert!((out[2] - input[1]).abs() < 1e-6);
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let input = vec![0.1_f32, -0.2, 0.3];
        assert_eq!(resample_linear(&input, 22_050, 22_050), input);
    }

    #[test]
    fn sanitize_zeroes_nan_and_inf() {
        let mut samples = vec![f32::NAN, 0.5, f32::INFINITY];
        sanitize_in_place(&mut samples);
        assert_eq!(samples, vec![0.0, 0.5, 0.0]);
    }
}
