//! Loads both classifiers once at startup and remembers how that went.

use crate::adapters::forest::ForestClassifier;
use crate::adapters::onnx::load_audio_classifier;
use crate::config::TomlConfig;
use crate::core::deepfake::{parse_labels, DeepfakeScorer, WaveformNormalizer};
use crate::domain::ports::PhishingClassifier;
use crate::utils::error::{GuardError, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LoadOutcome {
    Loaded,
    Unavailable { reason: String },
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            LoadOutcome::Loaded => None,
            LoadOutcome::Unavailable { reason } => Some(reason),
        }
    }
}

pub struct ModelRegistry {
    phishing: Option<Arc<dyn PhishingClassifier>>,
    phishing_outcome: LoadOutcome,
    deepfake: Arc<DeepfakeScorer>,
    deepfake_outcome: LoadOutcome,
}

impl ModelRegistry {
    /// 只在啟動時呼叫一次，失敗不重試
    pub fn load(config: &TomlConfig) -> Self {
        let (phishing, phishing_outcome) = match load_phishing(&config.phishing.model_path) {
            Ok(classifier) => {
                info!(
                    "✅ Phishing model loaded from {} (schema: {})",
                    config.phishing.model_path,
                    classifier.layout().schema().as_str()
                );
                (Some(classifier), LoadOutcome::Loaded)
            }
            Err(e) => {
                warn!("⚠️ Phishing model unavailable, denylist fallback active: {}", e);
                (None, LoadOutcome::Unavailable { reason: e.to_string() })
            }
        };

        let labels_path = config.labels_path();
        let deepfake = match load_deepfake(Path::new(&config.deepfake.model_path), &labels_path) {
            Ok(scorer) => {
                info!("✅ Deepfake detector loaded from {}", config.deepfake.model_path);
                scorer
            }
            Err(e) => {
                warn!("⚠️ Deepfake detector unavailable: {}", e);
                DeepfakeScorer::unavailable(e.to_string())
            }
        };

        Self::new(phishing, phishing_outcome, deepfake)
    }

    pub fn new(
        phishing: Option<Arc<dyn PhishingClassifier>>,
        phishing_outcome: LoadOutcome,
        deepfake: DeepfakeScorer,
    ) -> Self {
        let deepfake_outcome = match deepfake.unavailable_reason() {
            Some(reason) => LoadOutcome::Unavailable {
                reason: reason.to_string(),
            },
            None => LoadOutcome::Loaded,
        };
        Self {
            phishing,
            phishing_outcome,
            deepfake: Arc::new(deepfake),
            deepfake_outcome,
        }
    }

    pub fn phishing(&self) -> Option<Arc<dyn PhishingClassifier>> {
        self.phishing.clone()
    }

    pub fn phishing_outcome(&self) -> &LoadOutcome {
        &self.phishing_outcome
    }

    pub fn deepfake(&self) -> Arc<DeepfakeScorer> {
        Arc::clone(&self.deepfake)
    }

    pub fn deepfake_outcome(&self) -> &LoadOutcome {
        &self.deepfake_outcome
    }
}

fn load_phishing(model_path: &str) -> Result<Arc<dyn PhishingClassifier>> {
    if !Path::new(model_path).exists() {
        return Err(GuardError::ModelUnavailableError {
            model: "phishing model".to_string(),
            reason: format!("{} not found", model_path),
        });
    }
    let forest = ForestClassifier::from_path(model_path).map_err(|e| {
        GuardError::ModelUnavailableError {
            model: "phishing model".to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(Arc::new(forest))
}

fn load_deepfake(model_path: &Path, labels_path: &Path) -> Result<DeepfakeScorer> {
    let unavailable = |reason: String| GuardError::ModelUnavailableError {
        model: "deepfake detector".to_string(),
        reason,
    };

    if !model_path.exists() {
        return Err(unavailable(format!("{} not found", model_path.display())));
    }
    let label_text = std::fs::read_to_string(labels_path).map_err(|e| {
        unavailable(format!("cannot read labels {}: {}", labels_path.display(), e))
    })?;
    let labels = parse_labels(&label_text)?;

    let classifier = load_audio_classifier(model_path, labels)?;
    Ok(DeepfakeScorer::new(Arc::new(WaveformNormalizer), classifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_models_are_unavailable() {
        let mut config = TomlConfig::default();
        config.phishing.model_path = "/nonexistent/forest.json".to_string();
        config.deepfake.model_path = "/nonexistent/model.onnx".to_string();

        let registry = ModelRegistry::load(&config);
        assert!(registry.phishing().is_none());
        assert!(!registry.phishing_outcome().is_loaded());
        assert!(registry
            .phishing_outcome()
            .reason()
            .unwrap()
            .contains("not found"));
        assert!(!registry.deepfake().is_available());
        assert!(!registry.deepfake_outcome().is_loaded());
    }
}
