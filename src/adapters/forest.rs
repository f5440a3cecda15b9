//! Random-forest classifier evaluated from exported scikit-learn tree arrays.

use crate::domain::model::{FeatureLayout, NAMED_FEATURE_KEYS, VECTOR_SLOTS};
use crate::domain::ports::PhishingClassifier;
use crate::utils::error::{GuardError, Result};
use serde::Deserialize;
use std::path::Path;

const LEAF: i64 = -1;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NodeValue {
    /// `[n_classes]`
    Flat(Vec<f64>),
    /// `[n_outputs][n_classes]`, as `tree_.value` is shaped; only the first output is used.
    Nested(Vec<Vec<f64>>),
}

impl NodeValue {
    fn class_weights(&self) -> &[f64] {
        match self {
            NodeValue::Flat(values) => values,
            NodeValue::Nested(outputs) => outputs.first().map(Vec::as_slice).unwrap_or(&[]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TreeArrays {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<NodeValue>,
}

#[derive(Debug, Clone, Deserialize)]
struct ForestArtifact {
    n_features: usize,
    classes: Vec<i64>,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    trees: Vec<TreeArrays>,
}

#[derive(Debug, Clone)]
struct Tree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<usize>,
    threshold: Vec<f64>,
    /// 每個節點已正規化的類別機率
    probabilities: Vec<Vec<f64>>,
}

impl Tree {
    fn from_arrays(index: usize, arrays: TreeArrays, n_features: usize, n_classes: usize) -> Result<Self> {
        let invalid = |message: String| GuardError::ConfigValidationError {
            field: format!("trees[{}]", index),
            message,
        };

        let nodes = arrays.children_left.len();
        if nodes == 0 {
            return Err(invalid("tree has no nodes".to_string()));
        }
        if arrays.children_right.len() != nodes
            || arrays.feature.len() != nodes
            || arrays.threshold.len() != nodes
            || arrays.value.len() != nodes
        {
            return Err(invalid("node arrays have different lengths".to_string()));
        }

        let mut feature = Vec::with_capacity(nodes);
        for node in 0..nodes {
            let (left, right) = (arrays.children_left[node], arrays.children_right[node]);
            if left == LEAF {
                feature.push(0);
                continue;
            }
            let in_range = |child: i64| child > node as i64 && (child as usize) < nodes;
            if !in_range(left) || !in_range(right) {
                return Err(invalid(format!("node {} has out-of-range children", node)));
            }
            let f = arrays.feature[node];
            if f < 0 || f as usize >= n_features {
                return Err(invalid(format!("node {} splits on unknown feature {}", node, f)));
            }
            feature.push(f as usize);
        }

        let probabilities = arrays
            .value
            .iter()
            .enumerate()
            .map(|(node, value)| {
                let weights = value.class_weights();
                if weights.len() != n_classes {
                    return Err(invalid(format!(
                        "node {} has {} class weights, expected {}",
                        node,
                        weights.len(),
                        n_classes
                    )));
                }
                let total: f64 = weights.iter().sum();
                Ok(if total > 0.0 {
                    weights.iter().map(|w| w / total).collect()
                } else {
                    vec![1.0 / n_classes as f64; n_classes]
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            children_left: arrays.children_left,
            children_right: arrays.children_right,
            feature,
            threshold: arrays.threshold,
            probabilities,
        })
    }

    fn leaf_probabilities(&self, row: &[f64]) -> &[f64] {
        let mut node = 0usize;
        // 子節點索引一定比父節點大，所以一定會走到葉子
        while self.children_left[node] != LEAF {
            node = if row[self.feature[node]] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        &self.probabilities[node]
    }
}

pub struct ForestClassifier {
    layout: FeatureLayout,
    n_features: usize,
    classes: Vec<i64>,
    trees: Vec<Tree>,
}

impl ForestClassifier {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let artifact: ForestArtifact = serde_json::from_str(content)?;
        if artifact.classes.is_empty() {
            return Err(GuardError::ConfigValidationError {
                field: "classes".to_string(),
                message: "model declares no classes".to_string(),
            });
        }
        if artifact.trees.is_empty() {
            return Err(GuardError::ConfigValidationError {
                field: "trees".to_string(),
                message: "model contains no trees".to_string(),
            });
        }

        let layout = resolve_layout(artifact.n_features, artifact.feature_names)?;
        let n_classes = artifact.classes.len();
        let trees = artifact
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, arrays)| Tree::from_arrays(i, arrays, artifact.n_features, n_classes))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            layout,
            n_features: artifact.n_features,
            classes: artifact.classes,
            trees,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn check_row(&self, row: &[f64]) -> Result<()> {
        if row.len() != self.n_features {
            return Err(GuardError::extraction(format!(
                "row has {} features, model expects {}",
                row.len(),
                self.n_features
            )));
        }
        Ok(())
    }
}

/// 有 feature_names 且全部是已知欄位 → named；否則必須是 30 格向量
fn resolve_layout(n_features: usize, feature_names: Option<Vec<String>>) -> Result<FeatureLayout> {
    if let Some(names) = feature_names {
        if names.len() != n_features {
            return Err(GuardError::ConfigValidationError {
                field: "feature_names".to_string(),
                message: format!("{} names for {} features", names.len(), n_features),
            });
        }
        if names.iter().all(|n| NAMED_FEATURE_KEYS.contains(&n.as_str())) {
            return Ok(FeatureLayout::Named(names));
        }
    }
    if n_features == VECTOR_SLOTS {
        return Ok(FeatureLayout::Vector);
    }
    Err(GuardError::ConfigValidationError {
        field: "n_features".to_string(),
        message: format!(
            "model expects {} unnamed features; only the {}-slot vector or named features are supported",
            n_features, VECTOR_SLOTS
        ),
    })
}

impl PhishingClassifier for ForestClassifier {
    fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<i64>> {
        Ok(self
            .predict_proba(rows)?
            .iter()
            .map(|probs| {
                let best = probs
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, p)| if *p > probs[best] { i } else { best });
                self.classes[best]
            })
            .collect())
    }

    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let n_classes = self.classes.len();
        let n_trees = self.trees.len() as f64;
        rows.iter()
            .map(|row| {
                self.check_row(row)?;
                let mut sums = vec![0.0; n_classes];
                for tree in &self.trees {
                    for (sum, p) in sums.iter_mut().zip(tree.leaf_probabilities(row)) {
                        *sum += p;
                    }
                }
                Ok(sums.into_iter().map(|s| s / n_trees).collect())
            })
            .collect()
    }
}
