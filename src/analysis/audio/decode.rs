use std::fs::File;
use std::path::Path;

use hound::SampleFormat;
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
    io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};

/// Raw decoded audio in interleaved `f32` samples.
pub(crate) struct DecodedAudio {
    pub(crate) samples: Vec<f32>,
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
}

impl DecodedAudio {
    fn frame_limit(sample_rate: u32, channels: u16, max_seconds: Option<f32>) -> Option<usize> {
        max_seconds.filter(|limit| *limit > 0.0).map(|limit| {
            let frames = (limit * sample_rate.max(1) as f32).ceil().max(1.0);
            (frames as usize).saturating_mul(channels.max(1) as usize).max(1)
        })
    }
}

/// Decode audio into interleaved `f32` samples, stopping after `max_seconds`.
///
/// WAV files go through `hound`; everything else (and WAV variants hound
/// rejects) goes through symphonia.
pub(crate) fn decode_audio(path: &Path, max_seconds: Option<f32>) -> Result<DecodedAudio, String> {
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    let decoded = if is_wav {
        decode_wav(path, max_seconds).or_else(|wav_err| {
            decode_with_symphonia(path, max_seconds)
                .map_err(|err| format!("{wav_err}; fallback decoder: {err}"))
        })
    } else {
        decode_with_symphonia(path, max_seconds)
    };
    match decoded {
        Ok(audio) if audio.samples.is_empty() => {
            Err(format!("Decoded 0 samples for {}", path.display()))
        }
        Ok(audio) => Ok(audio),
        Err(err) => Err(format!("Audio decode failed for {}: {err}", path.display())),
    }
}

fn decode_wav(path: &Path, max_seconds: Option<f32>) -> Result<DecodedAudio, String> {
    let mut reader = hound::WavReader::open(path).map_err(|err| format!("WAV open: {err}"))?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate.max(1);
    let channels = spec.channels.max(1);
    let limit = DecodedAudio::frame_limit(sample_rate, channels, max_seconds).unwrap_or(usize::MAX);
    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .take(limit)
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|err| format!("WAV sample read: {err}"))?,
        SampleFormat::Int => {
            let scale = (1i64 << spec.bits_per_sample.saturating_sub(1)).max(1) as f32;
            reader
                .samples::<i32>()
                .take(limit)
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|err| format!("WAV sample read: {err}"))?
        }
    };
    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn decode_with_symphonia(path: &Path, max_seconds: Option<f32>) -> Result<DecodedAudio, String> {
    let file = File::open(path).map_err(|err| format!("Open {}: {err}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| format!("Symphonia probe failed: {err}"))?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| "No default track".to_string())?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| "Missing sample rate".to_string())?;
    let channels = codec_params
        .channels
        .ok_or_else(|| "Missing channel count".to_string())?
        .count() as u16;
    let max_samples = DecodedAudio::frame_limit(sample_rate, channels, max_seconds);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|err| format!("Symphonia decoder failed: {err}"))?;

    let mut samples = Vec::new();
    loop {
        if max_samples.is_some_and(|limit| samples.len() >= limit) {
            break;
        }
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break,
            Err(err) => return Err(format!("Symphonia packet read failed: {err}")),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            Err(Error::DecodeError(_)) => continue,
            Err(err) => return Err(format!("Symphonia decode failed: {err}")),
        };
        let spec = *audio_buf.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }
    if let Some(limit) = max_samples {
        samples.truncate(limit);
    }

    Ok(DecodedAudio {
        samples,
        sample_rate: sample_rate.max(1),
        channels: channels.max(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::TempDir;

    #[test]
    fn int_wav_is_scaled_to_unit_range_and_capped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("int.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..8_000 {
            writer.write_sample::<i16>(i16::MAX / 2).unwrap();
            writer.write_sample::<i16>(-(i16::MAX / 2)).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_audio(&path, Some(0.25)).unwrap();
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 8_000);
        assert_eq!(decoded.samples.len(), 2 * 2_000);
        assert!((decoded.samples[0] - 0.5).abs() < 1e-3);
        assert!((decoded.samples[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn garbage_bytes_fail_with_path_in_message() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let err = decode_audio(&path, None).err().unwrap();
        assert!(err.contains("broken.wav"));
    }

    #[test]
    fn empty_wav_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        WavWriter::create(&path, spec).unwrap().finalize().unwrap();
        assert!(decode_audio(&path, None).is_err());
    }
}
