use super::*;
use crate::clusterer::{fit, KMeansConfig, Metric};
use crate::error::EngineError;
use crate::preprocess::{featurize, FeaturePipeline, MissingFeaturePolicy};
use crate::table::{Column, FeatureTable, Matrix, CLUSTER_ID};
use indexmap::IndexMap;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn labeled_blobs() -> FeatureTable {
    FeatureTable::from_columns([
        ("energy", Column::Float(vec![1.0, 0.9, 0.95, 0.0, 0.1, 0.05])),
        ("valence", Column::Float(vec![0.0, 0.1, 0.05, 1.0, 0.9, 0.95])),
        (CLUSTER_ID, Column::Integer(vec![0, 0, 0, 1, 1, 1])),
    ])
    .unwrap()
}

fn pipeline() -> FeaturePipeline {
    let mut col_mapper = IndexMap::new();
    col_mapper.insert("name".to_string(), "title".to_string());
    FeaturePipeline {
        col_mapper,
        clean_features: names(&["title", "energy", "valence"]),
        features: names(&["energy", "valence"]),
        on_missing_feature: MissingFeaturePolicy::Error,
    }
}

#[test]
fn test_silhouette_hand_computed() {
    let points = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![10.0], vec![11.0]]).unwrap();
    let s = silhouette_score(&points, &[0, 0, 1, 1]).unwrap();
    let expected = (9.5 / 10.5 + 8.5 / 9.5) / 2.0;
    assert!((s - expected).abs() < 1e-12);
}

#[test]
fn test_silhouette_undefined_cases() {
    let points = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![10.0]]).unwrap();
    assert!(matches!(
        silhouette_score(&points, &[0, 0, 0]),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        silhouette_score(&points, &[0, 0, 1]),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        silhouette_score(&points, &[0, 1]),
        Err(EngineError::InvalidInput(_))
    ));
}

#[test]
fn test_score_well_separated() {
    let table = labeled_blobs();
    let s = score(&table).unwrap();
    assert!(s > 0.8 && s <= 1.0);
    assert_eq!(score(&table).unwrap(), s);
}

#[test]
fn test_score_requires_cluster_id() {
    let table = labeled_blobs().without_column(CLUSTER_ID);
    assert_eq!(
        score(&table).unwrap_err(),
        EngineError::MissingFeature(CLUSTER_ID.into())
    );
}

#[test]
fn test_score_rejects_text_and_label_only() {
    let mut with_text = labeled_blobs();
    with_text
        .push_column(
            "title",
            Column::Text((0..6).map(|i| format!("song {}", i)).collect()),
        )
        .unwrap();
    assert!(matches!(score(&with_text), Err(EngineError::InvalidInput(_))));

    let only_label =
        FeatureTable::from_columns([(CLUSTER_ID, Column::Integer(vec![0, 0, 1, 1]))]).unwrap();
    assert!(matches!(score(&only_label), Err(EngineError::InvalidInput(_))));
}

#[test]
fn test_assign_labels_replaces_old_labels() {
    let table = labeled_blobs();
    let features = table.without_column(CLUSTER_ID);
    let model = fit(
        &features,
        &names(&["energy", "valence"]),
        2,
        &KMeansConfig::default(),
        MissingFeaturePolicy::Error,
    )
    .unwrap();

    let labeled = assign_labels(&table, &model).unwrap();
    assert_eq!(labeled.n_cols(), 3);
    assert_eq!(labeled.column_names().last().unwrap(), CLUSTER_ID);

    let catalog = LabeledCatalog::new(labeled, &model).unwrap();
    assert_eq!(catalog.labels().unwrap(), model.labels());
    assert_eq!(catalog.k(), 2);
    assert!(score_catalog(&catalog).unwrap() > 0.8);
}

#[test]
fn test_assign_labels_row_mismatch() {
    let table = labeled_blobs().without_column(CLUSTER_ID);
    let model = fit(
        &table,
        &names(&["energy"]),
        2,
        &KMeansConfig::default(),
        MissingFeaturePolicy::Error,
    )
    .unwrap();

    let fewer = table.take_rows(&[0, 1, 2]);
    assert!(matches!(
        assign_labels(&fewer, &model),
        Err(EngineError::ModelMismatch(_))
    ));
}

#[test]
fn test_labeled_catalog_checks_ids() {
    let table = labeled_blobs();
    let model = fit(
        &table.without_column(CLUSTER_ID),
        &names(&["energy", "valence"]),
        2,
        &KMeansConfig::default(),
        MissingFeaturePolicy::Error,
    )
    .unwrap();

    let mut bad = table.without_column(CLUSTER_ID);
    bad.push_column(CLUSTER_ID, Column::Integer(vec![0, 0, 0, 1, 1, 5]))
        .unwrap();
    assert!(matches!(
        LabeledCatalog::new(bad, &model),
        Err(EngineError::ModelMismatch(_))
    ));

    assert_eq!(
        LabeledCatalog::new(table.without_column(CLUSTER_ID), &model).unwrap_err(),
        EngineError::MissingFeature(CLUSTER_ID.into())
    );
}

#[test]
fn test_assign_new_labels_uses_catalog_params() {
    let catalog = FeatureTable::from_columns([
        (
            "title",
            Column::Text((0..6).map(|i| format!("song {}", i)).collect()),
        ),
        ("energy", Column::Float(vec![1.0, 0.9, 0.95, 0.0, 0.1, 0.05])),
        ("valence", Column::Float(vec![0.0, 0.1, 0.05, 1.0, 0.9, 0.95])),
    ])
    .unwrap();
    let pipeline = pipeline();
    let (scaled, params) =
        featurize(&catalog, &pipeline.features, MissingFeaturePolicy::Error).unwrap();
    let model = fit(
        &scaled,
        &pipeline.features,
        2,
        &KMeansConfig::default(),
        MissingFeaturePolicy::Error,
    )
    .unwrap();

    let raw = FeatureTable::from_columns([
        ("name", Column::Text(vec!["new".into()])),
        ("energy", Column::Float(vec![0.97])),
        ("valence", Column::Float(vec![0.02])),
    ])
    .unwrap();

    let labeled =
        assign_new_labels(&raw, &params, &model, &pipeline, Metric::Euclidean).unwrap();
    let ids = crate::search::cluster_ids(&labeled).unwrap();
    assert_eq!(ids, vec![model.labels()[0]]);

    let empty = raw.take_rows(&[]);
    assert!(matches!(
        assign_new_labels(&empty, &params, &model, &pipeline, Metric::Euclidean),
        Err(EngineError::InvalidInput(_))
    ));
}
