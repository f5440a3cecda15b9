use crate::utils::error::{GuardError, Result};
use serde::Serialize;

/// 30 格向量的長度，跟訓練資料的欄位數一致
pub const VECTOR_SLOTS: usize = 30;

/// named schema 的欄位，順序即預設的列順序
pub const NAMED_FEATURE_KEYS: [&str; 22] = [
    "url_length",
    "has_ip",
    "has_at_symbol",
    "has_double_slash",
    "domain_length",
    "has_hyphen",
    "subdomain_count",
    "tld_length",
    "path_length",
    "path_depth",
    "has_query",
    "query_length",
    "has_https",
    "has_http",
    "has_www",
    "has_suspicious_terms",
    "has_form",
    "form_count",
    "external_link_ratio",
    "link_count",
    "script_count",
    "image_count",
];

/// Fixed-order vector of 30 values, each in {-1, 0, 1}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StructuralVector([i8; VECTOR_SLOTS]);

impl StructuralVector {
    pub fn new(slots: [i8; VECTOR_SLOTS]) -> Self {
        Self(slots)
    }

    pub fn zeros() -> Self {
        Self([0; VECTOR_SLOTS])
    }

    pub fn slots(&self) -> &[i8; VECTOR_SLOTS] {
        &self.0
    }

    /// 1-based slot access, matching the slot numbering of the training schema.
    pub fn slot(&self, number: usize) -> i8 {
        self.0[number - 1]
    }

    pub fn set_slot(&mut self, number: usize, value: i8) {
        self.0[number - 1] = value;
    }

    pub fn to_row(&self) -> Vec<f64> {
        self.0.iter().map(|v| f64::from(*v)).collect()
    }
}

/// Signals derived from the fetched HTML. All zero when the page was not fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentFeatures {
    pub fetched: bool,
    pub has_form: bool,
    pub form_count: usize,
    pub link_count: usize,
    pub external_link_ratio: f64,
    pub script_count: usize,
    pub image_count: usize,
    pub resource_count: usize,
    pub external_resource_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedFeatures {
    pub url_length: usize,
    pub has_ip: bool,
    pub has_at_symbol: bool,
    pub has_double_slash: bool,
    pub domain_length: usize,
    pub has_hyphen: bool,
    pub subdomain_count: usize,
    pub tld_length: usize,
    pub path_length: usize,
    pub path_depth: usize,
    pub has_query: bool,
    pub query_length: usize,
    pub has_https: bool,
    pub has_http: bool,
    pub has_www: bool,
    pub has_suspicious_terms: bool,
    pub has_form: bool,
    pub form_count: usize,
    pub external_link_ratio: f64,
    pub link_count: usize,
    pub script_count: usize,
    pub image_count: usize,
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl NamedFeatures {
    /// 以欄位名稱取值，布林值轉成 0/1
    pub fn get(&self, key: &str) -> Option<f64> {
        let value = match key {
            "url_length" => self.url_length as f64,
            "has_ip" => flag(self.has_ip),
            "has_at_symbol" => flag(self.has_at_symbol),
            "has_double_slash" => flag(self.has_double_slash),
            "domain_length" => self.domain_length as f64,
            "has_hyphen" => flag(self.has_hyphen),
            "subdomain_count" => self.subdomain_count as f64,
            "tld_length" => self.tld_length as f64,
            "path_length" => self.path_length as f64,
            "path_depth" => self.path_depth as f64,
            "has_query" => flag(self.has_query),
            "query_length" => self.query_length as f64,
            "has_https" => flag(self.has_https),
            "has_http" => flag(self.has_http),
            "has_www" => flag(self.has_www),
            "has_suspicious_terms" => flag(self.has_suspicious_terms),
            "has_form" => flag(self.has_form),
            "form_count" => self.form_count as f64,
            "external_link_ratio" => self.external_link_ratio,
            "link_count" => self.link_count as f64,
            "script_count" => self.script_count as f64,
            "image_count" => self.image_count as f64,
            _ => return None,
        };
        Some(value)
    }

    pub fn apply_content(&mut self, content: &ContentFeatures) {
        self.has_form = content.has_form;
        self.form_count = content.form_count;
        self.external_link_ratio = content.external_link_ratio;
        self.link_count = content.link_count;
        self.script_count = content.script_count;
        self.image_count = content.image_count;
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, f64)> {
        NAMED_FEATURE_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|v| (*key, v)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSchema {
    Vector,
    Named,
}

impl FeatureSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSchema::Vector => "vector",
            FeatureSchema::Named => "named",
        }
    }
}

/// Column layout a loaded classifier was trained on.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureLayout {
    Vector,
    Named(Vec<String>),
}

impl FeatureLayout {
    pub fn schema(&self) -> FeatureSchema {
        match self {
            FeatureLayout::Vector => FeatureSchema::Vector,
            FeatureLayout::Named(_) => FeatureSchema::Named,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            FeatureLayout::Vector => VECTOR_SLOTS,
            FeatureLayout::Named(names) => names.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtractionStrategy {
    #[serde(rename = "fast")]
    Fast,
    #[serde(rename = "content-aware")]
    ContentAware,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::Fast => "fast",
            ExtractionStrategy::ContentAware => "content-aware",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureRecord {
    Vector(StructuralVector),
    Named(NamedFeatures),
}

impl FeatureRecord {
    pub fn schema(&self) -> FeatureSchema {
        match self {
            FeatureRecord::Vector(_) => FeatureSchema::Vector,
            FeatureRecord::Named(_) => FeatureSchema::Named,
        }
    }

    /// 依模型的欄位配置轉成一列；schema 不符直接報錯，不做任何轉換
    pub fn to_row(&self, layout: &FeatureLayout) -> Result<Vec<f64>> {
        match (self, layout) {
            (FeatureRecord::Vector(vector), FeatureLayout::Vector) => Ok(vector.to_row()),
            (FeatureRecord::Named(named), FeatureLayout::Named(names)) => names
                .iter()
                .map(|name| {
                    named.get(name).ok_or_else(|| {
                        GuardError::extraction(format!("model expects unknown feature `{}`", name))
                    })
                })
                .collect(),
            (record, layout) => Err(GuardError::extraction(format!(
                "feature record uses the {} schema but the classifier expects {}",
                record.schema().as_str(),
                layout.schema().as_str()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictSource {
    Model,
    Denylist,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhishingVerdict {
    pub is_phishing: bool,
    pub label: String,
    pub confidence: f64,
    pub source: VerdictSource,
    pub schema: FeatureSchema,
}

pub const PHISHY_LABEL: &str = "Phishy URL";
pub const LEGITIMATE_LABEL: &str = "Legitimate URL";

impl PhishingVerdict {
    pub fn new(is_phishing: bool, confidence: f64, source: VerdictSource, schema: FeatureSchema) -> Self {
        let label = if is_phishing {
            PHISHY_LABEL
        } else {
            LEGITIMATE_LABEL
        };
        Self {
            is_phishing,
            label: label.to_string(),
            confidence,
            source,
            schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Interleaved when `channels > 1`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

pub const ERROR_PREDICTION: &str = "Error";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub prediction: String,
    pub confidence: f64,
    pub is_fake: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl DetectionResult {
    pub fn new(prediction: impl Into<String>, confidence: f64) -> Self {
        let prediction = prediction.into();
        let is_fake = label_is_fake(&prediction);
        Self {
            prediction,
            confidence,
            is_fake,
            error: None,
            sample_rate: None,
            duration_seconds: None,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            prediction: ERROR_PREDICTION.to_string(),
            confidence: 0.0,
            is_fake: false,
            error: Some(reason.into()),
            sample_rate: None,
            duration_seconds: None,
        }
    }

    pub fn with_audio_metadata(mut self, source_sample_rate: u32, clip: &AudioClip) -> Self {
        self.sample_rate = Some(source_sample_rate);
        self.duration_seconds = Some(clip.duration_seconds());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// 標籤字彙由模型決定，只看是否含 fake / spoof
pub fn label_is_fake(label: &str) -> bool {
    let lower = label.to_lowercase();
    lower.contains("fake") || lower.contains("spoof")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_features_expose_every_key() {
        let named = NamedFeatures::default();
        for key in NAMED_FEATURE_KEYS {
            assert_eq!(named.get(key), Some(0.0), "missing key {}", key);
        }
        assert_eq!(named.get("unknown"), None);
        assert_eq!(named.to_pairs().len(), NAMED_FEATURE_KEYS.len());
    }

    #[test]
    fn test_record_rejects_mismatched_layout() {
        let record = FeatureRecord::Vector(StructuralVector::zeros());
        let layout = FeatureLayout::Named(vec!["url_length".to_string()]);
        assert!(record.to_row(&layout).is_err());

        let record = FeatureRecord::Named(NamedFeatures::default());
        assert!(record.to_row(&FeatureLayout::Vector).is_err());
    }

    #[test]
    fn test_named_row_follows_layout_order() {
        let named = NamedFeatures {
            url_length: 42,
            has_https: true,
            ..Default::default()
        };
        let layout = FeatureLayout::Named(vec!["has_https".to_string(), "url_length".to_string()]);
        let row = FeatureRecord::Named(named).to_row(&layout).unwrap();
        assert_eq!(row, vec![1.0, 42.0]);
    }

    #[test]
    fn test_fake_label_matching() {
        assert!(label_is_fake("FAKE"));
        assert!(label_is_fake("spoofed speech"));
        assert!(!label_is_fake("real"));
        assert!(!label_is_fake("bonafide"));

        let result = DetectionResult::new("Fake", 0.8);
        assert!(result.is_fake);

        let unavailable = DetectionResult::error("model missing");
        assert_eq!(unavailable.prediction, "Error");
        assert_eq!(unavailable.confidence, 0.0);
        assert!(!unavailable.is_fake);
    }

    #[test]
    fn test_clip_duration() {
        let clip = AudioClip {
            samples: vec![0.0; 32000],
            sample_rate: 16000,
            channels: 2,
        };
        assert_eq!(clip.frames(), 16000);
        assert!((clip.duration_seconds() - 1.0).abs() < 1e-9);
    }
}
