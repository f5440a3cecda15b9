//! Builds the feature record in the schema the loaded classifier expects.

use crate::core::content::ContentExtractor;
use crate::core::structural::StructuralExtractor;
use crate::domain::model::{
    ContentFeatures, ExtractionStrategy, FeatureLayout, FeatureRecord, FeatureSchema,
};
use crate::utils::error::{GuardError, Result};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Request-URL slot (12): share of sub-resources loaded from other domains.
const REQUEST_URL_SLOT: usize = 12;
const REQUEST_URL_LOW: f64 = 0.22;
const REQUEST_URL_HIGH: f64 = 0.61;

/// Anchor slot (13): share of anchors pointing to other domains.
const ANCHOR_SLOT: usize = 13;
const ANCHOR_LOW: f64 = 0.31;
const ANCHOR_HIGH: f64 = 0.67;

/// Strategy as written in the config, before the schema is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyChoice {
    Auto,
    Fast,
    ContentAware,
}

impl FromStr for StrategyChoice {
    type Err = GuardError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(StrategyChoice::Auto),
            "fast" => Ok(StrategyChoice::Fast),
            "content-aware" | "content_aware" => Ok(StrategyChoice::ContentAware),
            other => Err(GuardError::InvalidConfigValueError {
                field: "phishing.strategy".to_string(),
                value: other.to_string(),
                reason: "expected auto, fast or content-aware".to_string(),
            }),
        }
    }
}

/// 啟動時決定一次，之後每個請求都用同一個策略
pub fn resolve_strategy(
    choice: StrategyChoice,
    schema: FeatureSchema,
    fetcher_available: bool,
) -> ExtractionStrategy {
    let wanted = match choice {
        StrategyChoice::Fast => ExtractionStrategy::Fast,
        StrategyChoice::ContentAware => ExtractionStrategy::ContentAware,
        StrategyChoice::Auto => match schema {
            FeatureSchema::Named => ExtractionStrategy::ContentAware,
            FeatureSchema::Vector => ExtractionStrategy::Fast,
        },
    };

    if wanted == ExtractionStrategy::ContentAware && !fetcher_available {
        warn!("⚠️ Content-aware extraction requested but no page fetcher is available, falling back to fast");
        return ExtractionStrategy::Fast;
    }
    wanted
}

pub struct FeatureAssembler {
    structural: StructuralExtractor,
    content: Option<ContentExtractor>,
    layout: FeatureLayout,
    strategy: ExtractionStrategy,
}

impl FeatureAssembler {
    pub fn new(
        structural: StructuralExtractor,
        content: Option<ContentExtractor>,
        layout: FeatureLayout,
        choice: StrategyChoice,
    ) -> Self {
        let strategy = resolve_strategy(choice, layout.schema(), content.is_some());
        info!(
            "🧩 Feature assembler ready (schema: {}, strategy: {})",
            layout.schema().as_str(),
            strategy.as_str()
        );
        Self {
            structural,
            content,
            layout,
            strategy,
        }
    }

    pub fn schema(&self) -> FeatureSchema {
        self.layout.schema()
    }

    pub fn strategy(&self) -> ExtractionStrategy {
        self.strategy
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Record for one URL, already checked against the active layout.
    pub async fn assemble(&self, url: &str) -> Result<FeatureRecord> {
        let content = self.content_for(url).await;

        let record = match self.layout {
            FeatureLayout::Vector => {
                let mut vector = self.structural.extract(url);
                if let Some(content) = content.as_ref().filter(|c| c.fetched) {
                    if content.resource_count > 0 {
                        vector.set_slot(
                            REQUEST_URL_SLOT,
                            tier(content.external_resource_ratio, REQUEST_URL_LOW, REQUEST_URL_HIGH),
                        );
                    }
                    if content.link_count > 0 {
                        vector.set_slot(
                            ANCHOR_SLOT,
                            tier(content.external_link_ratio, ANCHOR_LOW, ANCHOR_HIGH),
                        );
                    }
                }
                FeatureRecord::Vector(vector)
            }
            FeatureLayout::Named(_) => {
                let mut named = self.structural.extract_named(url);
                if let Some(content) = content.as_ref() {
                    named.apply_content(content);
                }
                FeatureRecord::Named(named)
            }
        };

        let row = record.to_row(&self.layout)?;
        if row.is_empty() {
            return Err(GuardError::extraction("feature record is empty"));
        }
        debug!("Assembled {} features for {}", row.len(), url);
        Ok(record)
    }

    async fn content_for(&self, url: &str) -> Option<ContentFeatures> {
        match (self.strategy, self.content.as_ref()) {
            (ExtractionStrategy::ContentAware, Some(extractor)) => {
                Some(extractor.extract_content(url).await)
            }
            _ => None,
        }
    }
}

fn tier(ratio: f64, low: f64, high: f64) -> i8 {
    if ratio < low {
        1
    } else if ratio <= high {
        0
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_resolution() {
        assert_eq!(
            resolve_strategy(StrategyChoice::Auto, FeatureSchema::Named, true),
            ExtractionStrategy::ContentAware
        );
        assert_eq!(
            resolve_strategy(StrategyChoice::Auto, FeatureSchema::Vector, true),
            ExtractionStrategy::Fast
        );
        assert_eq!(
            resolve_strategy(StrategyChoice::ContentAware, FeatureSchema::Vector, false),
            ExtractionStrategy::Fast
        );
        assert_eq!(
            resolve_strategy(StrategyChoice::Fast, FeatureSchema::Named, true),
            ExtractionStrategy::Fast
        );
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("AUTO".parse::<StrategyChoice>().unwrap(), StrategyChoice::Auto);
        assert_eq!(
            "content-aware".parse::<StrategyChoice>().unwrap(),
            StrategyChoice::ContentAware
        );
        assert!("slow".parse::<StrategyChoice>().is_err());
    }

    #[test]
    fn test_ratio_tiers() {
        assert_eq!(tier(0.1, REQUEST_URL_LOW, REQUEST_URL_HIGH), 1);
        assert_eq!(tier(0.61, REQUEST_URL_LOW, REQUEST_URL_HIGH), 0);
        assert_eq!(tier(0.9, ANCHOR_LOW, ANCHOR_HIGH), -1);
    }

    #[tokio::test]
    async fn test_fast_vector_assembly() {
        let assembler = FeatureAssembler::new(
            StructuralExtractor::default(),
            None,
            FeatureLayout::Vector,
            StrategyChoice::Auto,
        );
        let record = assembler.assemble("https://example.com").await.unwrap();
        assert_eq!(record.schema(), FeatureSchema::Vector);
        assert_eq!(record.to_row(&FeatureLayout::Vector).unwrap().len(), 30);
    }
}
