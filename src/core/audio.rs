//! Audio normalization: decode, downmix, resample, pad.
//!
//! Output is always mono, 16 kHz, at least 1.5 s long.

use crate::domain::model::AudioClip;
use crate::utils::error::{GuardError, Result};
use rubato::{FftFixedInOut, Resampler};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

pub const TARGET_SAMPLE_RATE: u32 = 16_000;
/// 1.5 秒
pub const MIN_SAMPLES: usize = 24_000;

const RESAMPLER_CHUNK: usize = 1024;

/// A canonical clip plus what the source looked like before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAudio {
    pub clip: AudioClip,
    pub source_sample_rate: u32,
    pub source_channels: u16,
}

pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<AudioClip> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| GuardError::decode(format!("cannot open {}: {}", path.display(), e)))?;
    let extension = path.extension().and_then(|e| e.to_str());
    decode_source(Box::new(file), extension)
}

pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioClip> {
    decode_source(Box::new(Cursor::new(bytes)), extension)
}

fn decode_source(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<AudioClip> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| GuardError::decode(format!("unrecognized audio container: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| GuardError::decode("no audio track found"))?;
    let track_id = track.id;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| GuardError::decode(format!("unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);
    let mut skipped = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(GuardError::decode(format!("read failed: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                sample_rate = decoded.spec().rate;
                channels = decoded.spec().channels.count() as u16;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // 單一壞封包跳過，不讓整段失敗
            Err(SymphoniaError::DecodeError(e)) => {
                skipped += 1;
                debug!("Skipping corrupt packet: {}", e);
            }
            Err(e) => return Err(GuardError::decode(format!("decode failed: {}", e))),
        }
    }

    if skipped > 0 {
        warn!("⚠️ Skipped {} corrupt audio packets", skipped);
    }
    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(GuardError::decode("no audio samples decoded"));
    }

    debug!(
        "🎧 Decoded audio: sample_rate={}, channels={}, samples={}",
        sample_rate,
        channels,
        samples.len()
    );

    Ok(AudioClip {
        samples,
        sample_rate,
        channels,
    })
}

/// Averages interleaved channels into one.
pub fn downmix(clip: &AudioClip) -> AudioClip {
    let channels = usize::from(clip.channels.max(1));
    if channels == 1 {
        return AudioClip::mono(clip.samples.clone(), clip.sample_rate);
    }
    let samples = clip
        .samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    AudioClip::mono(samples, clip.sample_rate)
}

/// FFT resampling of a mono signal; output has exactly `round(n * to / from)` samples.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let expected = (samples.len() as f64 * f64::from(to) / f64::from(from)).round() as usize;

    let mut resampler = FftFixedInOut::<f32>::new(from as usize, to as usize, RESAMPLER_CHUNK, 1)
        .map_err(|e| GuardError::decode(format!("resampler setup failed: {}", e)))?;
    let delay = resampler.output_delay();

    let mut output: Vec<f32> = Vec::with_capacity(expected + delay + RESAMPLER_CHUNK);
    let mut position = 0;

    while samples.len() - position >= resampler.input_frames_next() {
        let need = resampler.input_frames_next();
        let frame: &[&[f32]] = &[&samples[position..position + need]];
        let chunk = resampler
            .process(frame, None)
            .map_err(|e| GuardError::decode(format!("resampling failed: {}", e)))?;
        output.extend_from_slice(&chunk[0]);
        position += need;
    }

    if position < samples.len() {
        let tail: &[&[f32]] = &[&samples[position..]];
        let chunk = resampler
            .process_partial(Some(tail), None)
            .map_err(|e| GuardError::decode(format!("resampling failed: {}", e)))?;
        output.extend_from_slice(&chunk[0]);
    }

    // 把延遲的尾巴推出來
    while output.len() < delay + expected {
        let chunk = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| GuardError::decode(format!("resampling failed: {}", e)))?;
        if chunk[0].is_empty() {
            break;
        }
        output.extend_from_slice(&chunk[0]);
    }

    let mut trimmed: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
    trimmed.resize(expected, 0.0);
    Ok(trimmed)
}

pub fn pad_to_min(mut samples: Vec<f32>, min_len: usize) -> Vec<f32> {
    if samples.len() < min_len {
        samples.resize(min_len, 0.0);
    }
    samples
}

/// Downmix, resample and pad an already decoded clip.
pub fn normalize_clip(clip: &AudioClip) -> Result<NormalizedAudio> {
    let mono = downmix(clip);
    let resampled = resample(&mono.samples, mono.sample_rate, TARGET_SAMPLE_RATE)?;
    let samples = pad_to_min(resampled, MIN_SAMPLES);

    Ok(NormalizedAudio {
        clip: AudioClip::mono(samples, TARGET_SAMPLE_RATE),
        source_sample_rate: clip.sample_rate,
        source_channels: clip.channels,
    })
}

pub fn normalize_file<P: AsRef<Path>>(path: P) -> Result<NormalizedAudio> {
    normalize_clip(&decode_file(path)?)
}

pub fn normalize_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<NormalizedAudio> {
    normalize_clip(&decode_bytes(bytes, extension)?)
}

/// 16-bit PCM WAV, same layout the detector expects on disk.
pub fn write_wav<P: AsRef<Path>>(path: P, clip: &AudioClip) -> Result<()> {
    let spec = hound::WavSpec {
        channels: clip.channels,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let wav_error = |e: hound::Error| GuardError::processing(format!("WAV write failed: {}", e));
    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
    for sample in &clip.samples {
        let s = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_channels() {
        let clip = AudioClip {
            samples: vec![1.0, 0.0, 0.5, 0.5],
            sample_rate: 8000,
            channels: 2,
        };
        let mono = downmix(&clip);
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.samples, vec![0.5, 0.5]);
    }

    #[test]
    fn test_resample_length_is_exact() {
        let input: Vec<f32> = (0..44_100).map(|i| (i as f32 * 0.01).sin()).collect();
        let output = resample(&input, 44_100, 16_000).unwrap();
        assert_eq!(output.len(), 16_000);

        let input = vec![0.0f32; 4000];
        let output = resample(&input, 8000, 16_000).unwrap();
        assert_eq!(output.len(), 8000);
    }

    #[test]
    fn test_short_clip_is_padded() {
        let clip = AudioClip::mono(vec![0.1; 4000], 8000);
        let normalized = normalize_clip(&clip).unwrap();
        assert_eq!(normalized.clip.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(normalized.clip.samples.len(), MIN_SAMPLES);
        assert_eq!(normalized.source_sample_rate, 8000);
    }

    #[test]
    fn test_canonical_clip_is_unchanged() {
        let samples: Vec<f32> = (0..32_000).map(|i| (i % 100) as f32 / 100.0).collect();
        let clip = AudioClip::mono(samples.clone(), TARGET_SAMPLE_RATE);
        let normalized = normalize_clip(&clip).unwrap();
        assert_eq!(normalized.clip, clip);
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let err = decode_bytes(b"definitely not audio".to_vec(), Some("mp3")).unwrap_err();
        assert_eq!(err.category(), crate::utils::error::ErrorCategory::Decode);
    }
}
