//! Deepfake scoring over a normalized clip.

use crate::domain::model::{AudioClip, DetectionResult};
use crate::domain::ports::{AudioClassifier, AudioFrontEnd};
use crate::utils::error::{GuardError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const NORMALIZE_EPSILON: f32 = 1e-7;

/// Zero-mean / unit-variance normalization, as the wav2vec2 feature extractor does it.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveformNormalizer;

impl AudioFrontEnd for WaveformNormalizer {
    fn prepare(&self, waveform: &[f32], _sample_rate: u32) -> Result<Vec<f32>> {
        if waveform.is_empty() {
            return Err(GuardError::inference("empty waveform"));
        }
        let n = waveform.len() as f32;
        let mean = waveform.iter().sum::<f32>() / n;
        let variance = waveform.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
        let scale = (variance + NORMALIZE_EPSILON).sqrt();
        Ok(waveform.iter().map(|x| (x - mean) / scale).collect())
    }
}

enum Detector {
    Ready {
        front_end: Arc<dyn AudioFrontEnd>,
        classifier: Arc<dyn AudioClassifier>,
    },
    Unavailable {
        reason: String,
    },
}

pub struct DeepfakeScorer {
    detector: Detector,
}

impl DeepfakeScorer {
    pub fn new(front_end: Arc<dyn AudioFrontEnd>, classifier: Arc<dyn AudioClassifier>) -> Self {
        Self {
            detector: Detector::Ready {
                front_end,
                classifier,
            },
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            detector: Detector::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.detector, Detector::Ready { .. })
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.detector {
            Detector::Unavailable { reason } => Some(reason),
            Detector::Ready { .. } => None,
        }
    }

    /// 模型沒載入時回傳 Error 結果，不是錯誤
    pub fn score(&self, clip: &AudioClip) -> Result<DetectionResult> {
        let (front_end, classifier) = match &self.detector {
            Detector::Ready {
                front_end,
                classifier,
            } => (front_end, classifier),
            Detector::Unavailable { reason } => return Ok(DetectionResult::error(reason.clone())),
        };

        let input = front_end.prepare(&clip.samples, clip.sample_rate)?;
        let logits = classifier.logits(&input)?;
        let probabilities = softmax(&logits);
        let (index, confidence) = argmax(&probabilities)
            .ok_or_else(|| GuardError::inference("classifier returned no logits"))?;

        let label = classifier
            .labels()
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{}", index));
        debug!("Deepfake verdict: {} ({:.3})", label, confidence);

        Ok(DetectionResult::new(label, f64::from(confidence)))
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}

fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
}

/// Label vocabulary from a Hugging Face `config.json` (`id2label`) or a plain JSON array.
pub fn parse_labels(text: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(text)?;

    let map = match &value {
        Value::Array(items) => {
            return items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| GuardError::inference("label array must contain strings"))
                })
                .collect();
        }
        Value::Object(obj) => match obj.get("id2label") {
            Some(Value::Object(id2label)) => id2label,
            _ => obj,
        },
        _ => return Err(GuardError::inference("unrecognized label file format")),
    };

    let mut by_id = BTreeMap::new();
    for (key, label) in map {
        let id: usize = key
            .parse()
            .map_err(|_| GuardError::inference(format!("label id `{}` is not a number", key)))?;
        let label = label
            .as_str()
            .ok_or_else(|| GuardError::inference(format!("label {} is not a string", id)))?;
        by_id.insert(id, label.to_string());
    }
    if by_id.is_empty() {
        return Err(GuardError::inference("label map is empty"));
    }
    Ok(by_id.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizer_zero_mean_unit_variance() {
        let out = WaveformNormalizer.prepare(&[1.0, 2.0, 3.0, 4.0], 16_000).unwrap();
        let mean: f32 = out.iter().sum::<f32>() / out.len() as f32;
        let var: f32 = out.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / out.len() as f32;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert_eq!(argmax(&probs).map(|(i, _)| i), Some(2));
    }

    #[test]
    fn test_parse_labels_formats() {
        let hf = r#"{"architectures": ["Wav2Vec2ForSequenceClassification"], "id2label": {"1": "real", "0": "fake"}}"#;
        assert_eq!(parse_labels(hf).unwrap(), vec!["fake", "real"]);
        assert_eq!(parse_labels(r#"["bonafide", "spoof"]"#).unwrap(), vec!["bonafide", "spoof"]);
        assert!(parse_labels("42").is_err());
    }

    #[test]
    fn test_unavailable_detector_returns_error_result() {
        let scorer = DeepfakeScorer::unavailable("model file missing");
        let clip = AudioClip::mono(vec![0.0; 24_000], 16_000);
        let result = scorer.score(&clip).unwrap();
        assert_eq!(result.prediction, "Error");
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_fake);
        assert_eq!(result.error.as_deref(), Some("model file missing"));
    }
}
