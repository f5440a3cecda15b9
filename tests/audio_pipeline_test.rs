use anyhow::Result;
use phishguard::core::audio::{
    decode_bytes, normalize_bytes, normalize_clip, normalize_file, write_wav, MIN_SAMPLES,
    TARGET_SAMPLE_RATE,
};
use phishguard::core::deepfake::{DeepfakeScorer, WaveformNormalizer};
use phishguard::domain::model::AudioClip;
use phishguard::domain::ports::AudioClassifier;
use phishguard::utils::error::ErrorCategory;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// 寫一段正弦波 WAV 測試檔
fn write_tone(path: &Path, sample_rate: u32, channels: u16, frames: usize) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
        for _ in 0..channels {
            writer.write_sample((value * i16::MAX as f32) as i16)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// 固定 logits 的假分類器，順便記下收到的輸入長度
struct StubClassifier {
    labels: Vec<String>,
    logits: Vec<f32>,
    seen_len: Mutex<Option<usize>>,
}

impl StubClassifier {
    fn new(labels: &[&str], logits: &[f32]) -> Self {
        Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            logits: logits.to_vec(),
            seen_len: Mutex::new(None),
        }
    }
}

impl AudioClassifier for StubClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn logits(&self, input: &[f32]) -> phishguard::Result<Vec<f32>> {
        *self.seen_len.lock().unwrap() = Some(input.len());
        Ok(self.logits.clone())
    }
}

#[test]
fn test_stereo_44k_becomes_mono_16k() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("stereo.wav");
    let frames = 88_200;
    write_tone(&path, 44_100, 2, frames)?;

    let normalized = normalize_file(&path)?;
    let expected = (frames as f64 * 16_000.0 / 44_100.0).round() as usize;

    assert_eq!(normalized.clip.channels, 1);
    assert_eq!(normalized.clip.sample_rate, TARGET_SAMPLE_RATE);
    assert_eq!(normalized.clip.samples.len(), expected);
    assert!(normalized.clip.samples.len() >= MIN_SAMPLES);
    assert_eq!(normalized.source_sample_rate, 44_100);
    assert_eq!(normalized.source_channels, 2);

    // 重採樣後仍是有內容的訊號
    let peak = normalized
        .clip
        .samples
        .iter()
        .fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak > 0.3 && peak < 0.7, "peak was {}", peak);
    Ok(())
}

#[test]
fn test_short_clip_is_padded() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("short.wav");
    write_tone(&path, 8_000, 1, 4_000)?;

    let normalized = normalize_file(&path)?;
    assert_eq!(normalized.clip.samples.len(), MIN_SAMPLES);
    // 8000 個重採樣樣本之後全是補零
    assert!(normalized.clip.samples[8_000..].iter().all(|s| *s == 0.0));
    Ok(())
}

#[test]
fn test_canonical_clip_is_unchanged() -> Result<()> {
    let samples: Vec<f32> = (0..32_000).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect();
    let clip = AudioClip::mono(samples, TARGET_SAMPLE_RATE);

    let normalized = normalize_clip(&clip)?;
    assert_eq!(normalized.clip, clip);
    Ok(())
}

#[test]
fn test_bytes_and_file_paths_agree() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tone.wav");
    write_tone(&path, 22_050, 1, 33_075)?;

    let from_file = normalize_file(&path)?;
    let from_bytes = normalize_bytes(std::fs::read(&path)?, Some("wav"))?;
    assert_eq!(from_file, from_bytes);
    Ok(())
}

#[test]
fn test_written_wav_decodes_back() -> Result<()> {
    let dir = TempDir::new()?;
    let source = dir.path().join("source.wav");
    let output = dir.path().join("normalized.wav");
    write_tone(&source, 48_000, 2, 48_000)?;

    let normalized = normalize_file(&source)?;
    write_wav(&output, &normalized.clip)?;

    let reader = hound::WavReader::open(&output)?;
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, TARGET_SAMPLE_RATE);
    assert_eq!(reader.len() as usize, normalized.clip.samples.len());
    Ok(())
}

#[test]
fn test_garbage_bytes_are_decode_errors() {
    let err = decode_bytes(b"definitely not audio".to_vec(), Some("mp3")).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Decode);

    let err = normalize_file("/nonexistent/clip.wav").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Decode);
}

#[test]
fn test_stub_classifier_fake_and_spoof_labels() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("voice.wav");
    write_tone(&path, 16_000, 1, 16_000)?;
    let normalized = normalize_file(&path)?;

    let fake = Arc::new(StubClassifier::new(&["real", "fake"], &[0.0, 2.0]));
    let scorer = DeepfakeScorer::new(Arc::new(WaveformNormalizer), fake.clone());
    assert!(scorer.is_available());

    let result = scorer.score(&normalized.clip)?;
    assert_eq!(result.prediction, "fake");
    assert!(result.is_fake);
    let expected = 1.0 / (1.0 + (-2.0f64).exp());
    assert!((result.confidence - expected).abs() < 1e-5);
    assert_eq!(*fake.seen_len.lock().unwrap(), Some(MIN_SAMPLES));

    let spoof = Arc::new(StubClassifier::new(&["bonafide", "Spoof"], &[-1.0, 1.0]));
    let result = DeepfakeScorer::new(Arc::new(WaveformNormalizer), spoof).score(&normalized.clip)?;
    assert!(result.is_fake);

    let real = Arc::new(StubClassifier::new(&["real", "fake"], &[3.0, 0.0]));
    let result = DeepfakeScorer::new(Arc::new(WaveformNormalizer), real).score(&normalized.clip)?;
    assert_eq!(result.prediction, "real");
    assert!(!result.is_fake);
    Ok(())
}

#[test]
fn test_missing_label_falls_back_to_index_name() -> Result<()> {
    let clip = AudioClip::mono(vec![0.1; MIN_SAMPLES], TARGET_SAMPLE_RATE);
    let classifier = Arc::new(StubClassifier::new(&["real"], &[0.0, 5.0]));

    let result = DeepfakeScorer::new(Arc::new(WaveformNormalizer), classifier).score(&clip)?;
    assert_eq!(result.prediction, "LABEL_1");
    assert!(!result.is_fake);
    Ok(())
}
