use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

/// Rate fixtures are written at; matches the default analysis rate.
pub const FIXTURE_RATE: u32 = 22_050;

pub fn write_wav(path: &Path, sample_rate: u32, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    for &sample in samples {
        writer.write_sample(sample).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}

pub fn tone(freq_hz: f32, amplitude: f32, seconds: f32) -> Vec<f32> {
    let len = (FIXTURE_RATE as f32 * seconds) as usize;
    (0..len)
        .map(|i| amplitude * (TAU * freq_hz * i as f32 / FIXTURE_RATE as f32).sin())
        .collect()
}

/// Write a sine tone under `dir` and return its path.
pub fn write_tone(dir: &Path, name: &str, freq_hz: f32, amplitude: f32, seconds: f32) -> PathBuf {
    let path = dir.join(name);
    write_wav(&path, FIXTURE_RATE, &tone(freq_hz, amplitude, seconds));
    path
}
