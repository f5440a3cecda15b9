pub mod assembler;
pub mod audio;
pub mod content;
pub mod deepfake;
pub mod heuristics;
pub mod scorer;
pub mod structural;
pub mod suffix;
pub mod url_parts;

pub use crate::domain::model::{DetectionResult, FeatureRecord, PhishingVerdict};
pub use crate::domain::ports::{AudioClassifier, AudioFrontEnd, PageFetcher, PhishingClassifier};
pub use crate::utils::error::Result;
