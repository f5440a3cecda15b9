use crate::adapters::ffmpeg::FfmpegExtractor;
use crate::adapters::fetcher::{MediaDownloader, ReqwestPageFetcher};
use crate::adapters::registry::{LoadOutcome, ModelRegistry};
use crate::app::media::MediaIntake;
use crate::config::TomlConfig;
use crate::core::assembler::FeatureAssembler;
use crate::core::content::ContentExtractor;
use crate::core::scorer::PhishingScorer;
use crate::core::structural::StructuralExtractor;
use crate::core::suffix::SuffixList;
use crate::domain::model::FeatureLayout;
use crate::domain::ports::PageFetcher;
use crate::utils::error::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Process-wide, immutable after startup.
pub struct AppState {
    pub config: TomlConfig,
    pub assembler: FeatureAssembler,
    pub scorer: PhishingScorer,
    pub media: MediaIntake,
    phishing_outcome: LoadOutcome,
    deepfake_outcome: LoadOutcome,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub phishing_model: bool,
    pub deepfake_detector: bool,
    pub details: HealthDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub feature_schema: &'static str,
    pub feature_strategy: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phishing_model_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deepfake_detector_error: Option<String>,
}

impl AppState {
    /// 正式啟動用：頁面抓取走 reqwest
    pub fn build(config: TomlConfig, registry: ModelRegistry) -> Result<Self> {
        let fetcher: Option<Arc<dyn PageFetcher>> =
            match ReqwestPageFetcher::new(config.fetch_timeout()) {
                Ok(fetcher) => Some(Arc::new(fetcher)),
                Err(e) => {
                    warn!("⚠️ Page fetcher unavailable: {}", e);
                    None
                }
            };
        Self::build_with_fetcher(config, registry, fetcher)
    }

    pub fn build_with_fetcher(
        config: TomlConfig,
        registry: ModelRegistry,
        fetcher: Option<Arc<dyn PageFetcher>>,
    ) -> Result<Self> {
        let suffixes = match &config.phishing.public_suffix_list {
            Some(path) => {
                info!("📚 Loading public suffix list from {}", path);
                Arc::new(SuffixList::from_file(path)?)
            }
            None => SuffixList::bundled(),
        };

        let content = fetcher.map(|fetcher| {
            ContentExtractor::new(fetcher, Arc::clone(&suffixes), config.fetch_timeout())
        });

        let classifier = registry.phishing();
        let layout = classifier
            .as_ref()
            .map(|c| c.layout().clone())
            .unwrap_or(FeatureLayout::Vector);

        let assembler = FeatureAssembler::new(
            StructuralExtractor::new(suffixes),
            content,
            layout,
            config.strategy_choice()?,
        );
        let scorer = PhishingScorer::new(
            classifier,
            config.phishing.denylist_path.clone(),
            config.phishing.phishing_class,
        );

        let media = MediaIntake::new(
            registry.deepfake(),
            FfmpegExtractor::new(config.deepfake.ffmpeg_path.clone()),
            MediaDownloader::new(config.media_timeout(), config.max_media_bytes())?,
            config.deepfake.temp_dir.as_ref().map(PathBuf::from),
            config.deepfake.max_media_per_scan,
        );

        Ok(Self {
            phishing_outcome: registry.phishing_outcome().clone(),
            deepfake_outcome: registry.deepfake_outcome().clone(),
            config,
            assembler,
            scorer,
            media,
        })
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            phishing_model: self.phishing_outcome.is_loaded(),
            deepfake_detector: self.deepfake_outcome.is_loaded(),
            details: HealthDetails {
                feature_schema: self.assembler.schema().as_str(),
                feature_strategy: self.assembler.strategy().as_str(),
                phishing_model_error: self.phishing_outcome.reason().map(str::to_string),
                deepfake_detector_error: self.deepfake_outcome.reason().map(str::to_string),
            },
        }
    }
}
