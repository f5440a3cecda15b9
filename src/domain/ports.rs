use crate::domain::model::FeatureLayout;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Pretrained URL classifier. Immutable once loaded, safe to share across requests.
pub trait PhishingClassifier: Send + Sync {
    fn layout(&self) -> &FeatureLayout;
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<i64>>;
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;
}

/// Turns a canonical waveform into the tensor the audio classifier consumes.
pub trait AudioFrontEnd: Send + Sync {
    fn prepare(&self, waveform: &[f32], sample_rate: u32) -> Result<Vec<f32>>;
}

pub trait AudioClassifier: Send + Sync {
    /// Label vocabulary, indexed by class id.
    fn labels(&self) -> &[String];
    fn logits(&self, input: &[f32]) -> Result<Vec<f32>>;
}

/// 單次、有時限的網頁抓取
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String>;
}
