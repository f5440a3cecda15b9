use crate::domain::model::{FeatureRecord, FeatureSchema, PhishingVerdict, VerdictSource};
use crate::domain::ports::PhishingClassifier;
use crate::utils::error::{GuardError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DENYLIST_MATCH_CONFIDENCE: f64 = 0.9;
pub const DENYLIST_MISS_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_PHISHING_CLASS: i64 = 1;

pub struct PhishingScorer {
    classifier: Option<Arc<dyn PhishingClassifier>>,
    denylist_path: PathBuf,
    phishing_class: i64,
}

impl PhishingScorer {
    pub fn new(
        classifier: Option<Arc<dyn PhishingClassifier>>,
        denylist_path: impl Into<PathBuf>,
        phishing_class: i64,
    ) -> Self {
        Self {
            classifier,
            denylist_path: denylist_path.into(),
            phishing_class,
        }
    }

    pub fn has_model(&self) -> bool {
        self.classifier.is_some()
    }

    pub async fn score(&self, url: &str, record: &FeatureRecord) -> Result<PhishingVerdict> {
        match &self.classifier {
            Some(classifier) => self.score_with_model(classifier.as_ref(), record),
            None => self.score_with_denylist(url, record.schema()).await,
        }
    }

    fn score_with_model(
        &self,
        classifier: &dyn PhishingClassifier,
        record: &FeatureRecord,
    ) -> Result<PhishingVerdict> {
        let rows = vec![record.to_row(classifier.layout())?];

        let class_id = classifier
            .predict(&rows)?
            .into_iter()
            .next()
            .ok_or_else(|| GuardError::inference("classifier returned no prediction"))?;
        let confidence = classifier
            .predict_proba(&rows)?
            .into_iter()
            .next()
            .and_then(|probs| probs.into_iter().reduce(f64::max))
            .ok_or_else(|| GuardError::inference("classifier returned no probabilities"))?;

        let verdict = PhishingVerdict::new(
            class_id == self.phishing_class,
            confidence,
            VerdictSource::Model,
            record.schema(),
        );
        debug!(
            "Model verdict: {} (class {}, confidence {:.3})",
            verdict.label, class_id, confidence
        );
        Ok(verdict)
    }

    async fn score_with_denylist(&self, url: &str, schema: FeatureSchema) -> Result<PhishingVerdict> {
        let listed = denylist_contains(&self.denylist_path, url).await?;
        let confidence = if listed {
            DENYLIST_MATCH_CONFIDENCE
        } else {
            DENYLIST_MISS_CONFIDENCE
        };
        warn!(
            "🚧 No phishing model loaded, denylist fallback for {} (listed: {})",
            url, listed
        );
        Ok(PhishingVerdict::new(
            listed,
            confidence,
            VerdictSource::Denylist,
            schema,
        ))
    }
}

/// 每次請求重新讀檔；檔案不存在等同空清單
pub async fn denylist_contains(path: &Path, url: &str) -> Result<bool> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let needle = url.trim();
    Ok(content.lines().any(|line| line.trim() == needle))
}
