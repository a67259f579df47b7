/// Per-band mean and population standard deviation across frames.
pub(super) struct BandStats {
    pub(super) mean: Vec<f32>,
    pub(super) std: Vec<f32>,
}

pub(super) fn band_stats(frames: &[Vec<f32>], bands: usize) -> BandStats {
    let mean = mean_vec(frames, bands);
    let std = std_vec(frames, &mean);
    BandStats { mean, std }
}

fn mean_vec(frames: &[Vec<f32>], bands: usize) -> Vec<f32> {
    if frames.is_empty() {
        return vec![0.0; bands];
    }
    let mut sum = vec![0.0_f64; bands];
    for frame in frames {
        for (acc, &v) in sum.iter_mut().zip(frame) {
            *acc += v as f64;
        }
    }
    sum.into_iter()
        .map(|v| (v / frames.len() as f64) as f32)
        .collect()
}

fn std_vec(frames: &[Vec<f32>], mean: &[f32]) -> Vec<f32> {
    if frames.is_empty() {
        return vec![0.0; mean.len()];
    }
    let mut var = vec![0.0_f64; mean.len()];
    for frame in frames {
        for ((acc, &v), &m) in var.iter_mut().zip(frame).zip(mean) {
            let d = v as f64 - m as f64;
            *acc += d * d;
        }
    }
    var.into_iter()
        .map(|v| (v / frames.len() as f64).sqrt() as f32)
        .collect()
}
