mod decode;
mod prep;

use std::path::Path;

pub(crate) use prep::{downmix_to_mono_into, resample_linear_into};

/// Decode `path`, downmix to mono, resample to `target_rate` and cap the length
/// at `max_seconds`.
pub(crate) fn load_mono(path: &Path, target_rate: u32, max_seconds: f32) -> Result<Vec<f32>, String> {
    let decoded = decode::decode_audio(path, Some(max_seconds))?;
    let mut mono = Vec::new();
    downmix_to_mono_into(&mut mono, &decoded.samples, decoded.channels);
    let mut resampled = Vec::new();
    resample_linear_into(&mut resampled, &mono, decoded.sample_rate, target_rate);
    let cap = (max_seconds.max(0.0) as f64 * target_rate as f64).floor() as usize;
    if cap > 0 {
        resampled.truncate(cap);
    }
    prep::sanitize_in_place(&mut resampled);
    if resampled.is_empty() {
        return Err(format!("No audio samples left in {}", path.display()));
    }
    Ok(resampled)
}
