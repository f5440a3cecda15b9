use phishguard::adapters::ForestClassifier;
use phishguard::core::assembler::{FeatureAssembler, StrategyChoice};
use phishguard::core::scorer::PhishingScorer;
use phishguard::core::structural::StructuralExtractor;
use phishguard::domain::model::{FeatureLayout, FeatureSchema, VerdictSource};
use phishguard::domain::ports::PhishingClassifier;
use std::sync::Arc;
use tempfile::TempDir;

/// named 模型：看 has_at_symbol（欄 0）與 url_length（欄 1）
const NAMED_FOREST: &str = r#"{
    "n_features": 2,
    "classes": [0, 1],
    "feature_names": ["has_at_symbol", "url_length"],
    "trees": [
        {"children_left": [1, -1, -1], "children_right": [2, -1, -1],
         "feature": [0, -2, -2], "threshold": [0.5, -2.0, -2.0],
         "value": [[10, 10], [9, 1], [1, 9]]},
        {"children_left": [1, 3, -1, -1, -1], "children_right": [2, 4, -1, -1, -1],
         "feature": [1, 0, -2, -2, -2], "threshold": [40.0, 0.5, -2.0, -2.0, -2.0],
         "value": [[10, 10], [6, 4], [0, 10], [10, 0], [3, 7]]}
    ]
}"#;

fn write_model(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("forest.json");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_named_forest_from_file() {
    let dir = TempDir::new().unwrap();
    let forest = ForestClassifier::from_path(write_model(&dir, NAMED_FOREST)).unwrap();

    assert_eq!(forest.tree_count(), 2);
    assert_eq!(
        forest.layout(),
        &FeatureLayout::Named(vec!["has_at_symbol".to_string(), "url_length".to_string()])
    );

    // 短、無 @：樹一 [0.9, 0.1]，樹二 [1.0, 0.0]
    let proba = forest.predict_proba(&[vec![0.0, 20.0]]).unwrap();
    assert!((proba[0][0] - 0.95).abs() < 1e-9);
    assert_eq!(forest.predict(&[vec![0.0, 20.0]]).unwrap(), vec![0]);

    // 長且有 @：樹一 [0.1, 0.9]，樹二 [0.0, 1.0]
    assert_eq!(forest.predict(&[vec![1.0, 80.0]]).unwrap(), vec![1]);

    assert!(forest.predict(&[vec![1.0]]).is_err());
}

#[test]
fn test_invalid_artifacts_are_rejected() {
    // 未命名又不是 30 欄
    let unnamed = NAMED_FOREST.replace(
        r#""feature_names": ["has_at_symbol", "url_length"],"#,
        "",
    );
    assert!(ForestClassifier::from_json(&unnamed).is_err());

    // 子節點指向自己
    let cyclic = NAMED_FOREST.replace(r#""children_left": [1, -1, -1]"#, r#""children_left": [0, -1, -1]"#);
    assert!(ForestClassifier::from_json(&cyclic).is_err());

    assert!(ForestClassifier::from_json("{\"n_features\": 30}").is_err());
    assert!(ForestClassifier::from_path("/nonexistent/forest.json").is_err());
}

#[tokio::test]
async fn test_named_model_scores_through_assembler() {
    let dir = TempDir::new().unwrap();
    let forest = ForestClassifier::from_path(write_model(&dir, NAMED_FOREST)).unwrap();
    let classifier: Arc<dyn PhishingClassifier> = Arc::new(forest);

    let assembler = FeatureAssembler::new(
        StructuralExtractor::default(),
        None,
        classifier.layout().clone(),
        StrategyChoice::Auto,
    );
    assert_eq!(assembler.schema(), FeatureSchema::Named);

    let scorer = PhishingScorer::new(Some(classifier), dir.path().join("unused.txt"), 1);
    assert!(scorer.has_model());

    let url = "https://www.paypal.com@secure-login.example.net/verify/account/session";
    let record = assembler.assemble(url).await.unwrap();
    let verdict = scorer.score(url, &record).await.unwrap();
    assert!(verdict.is_phishing);
    assert_eq!(verdict.label, "Phishy URL");
    assert_eq!(verdict.source, VerdictSource::Model);
    assert_eq!(verdict.schema, FeatureSchema::Named);
    assert!((verdict.confidence - 0.95).abs() < 1e-9);

    let record = assembler.assemble("https://example.com/").await.unwrap();
    let verdict = scorer.score("https://example.com/", &record).await.unwrap();
    assert!(!verdict.is_phishing);
    assert_eq!(verdict.label, "Legitimate URL");
}
