use super::*;
use crate::error::EngineError;
use crate::preprocess::MissingFeaturePolicy;
use crate::table::{Column, FeatureTable, Matrix};
use std::collections::BTreeSet;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn two_blobs() -> FeatureTable {
    FeatureTable::from_columns([
        ("energy", Column::Float(vec![1.0, 0.9, 0.95, 0.0, 0.1, 0.05])),
        ("valence", Column::Float(vec![0.0, 0.1, 0.05, 1.0, 0.9, 0.95])),
        (
            "title",
            Column::Text(vec![
                "a".into(),
                "b".into(),
                "c".into(),
                "d".into(),
                "e".into(),
                "f".into(),
            ]),
        ),
    ])
    .unwrap()
}

fn spread(n: usize) -> FeatureTable {
    let xs: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64).collect();
    let ys: Vec<f64> = (0..n).map(|i| ((i * 5) % 13) as f64 * 0.5).collect();
    FeatureTable::from_columns([("x", Column::Float(xs)), ("y", Column::Float(ys))]).unwrap()
}

#[test]
fn test_simple_kmeans() {
    let points = Matrix::from_rows(&[
        vec![1.0, 0.0],
        vec![0.9, 0.1],
        vec![0.0, 1.0],
        vec![0.1, 0.9],
    ])
    .unwrap();

    let res = kmeans(&points, 2, &KMeansConfig::default()).unwrap();

    assert_eq!(res.centroids.len(), 2);
    assert_eq!(res.labels[0], res.labels[1]);
    assert_eq!(res.labels[2], res.labels[3]);
    assert_ne!(res.labels[0], res.labels[2]);
}

#[test]
fn test_fit_labels_cover_every_cluster() {
    let table = spread(40);
    for k in 1..=8 {
        let model = fit(
            &table,
            &names(&["x", "y"]),
            k,
            &KMeansConfig::default(),
            MissingFeaturePolicy::Error,
        )
        .unwrap();

        assert_eq!(model.k(), k);
        assert_eq!(model.labels().len(), 40);
        let used: BTreeSet<u32> = model.labels().iter().copied().collect();
        assert_eq!(used, (0..k as u32).collect::<BTreeSet<_>>());
        model.validate().unwrap();
    }
}

#[test]
fn test_fit_k_equals_rows_with_duplicates() {
    let table = FeatureTable::from_columns([("x", Column::Float(vec![1.0, 1.0, 1.0]))]).unwrap();
    let model = fit(
        &table,
        &names(&["x"]),
        3,
        &KMeansConfig::default(),
        MissingFeaturePolicy::Error,
    )
    .unwrap();

    let used: BTreeSet<u32> = model.labels().iter().copied().collect();
    assert_eq!(used.len(), 3);
    assert_eq!(model.inertia(), 0.0);
}

#[test]
fn test_fit_is_reproducible() {
    let table = spread(30);
    let config = KMeansConfig::default().with_seed(7);
    let cols = names(&["x", "y"]);

    let a = fit(&table, &cols, 4, &config, MissingFeaturePolicy::Error).unwrap();
    let b = fit(&table, &cols, 4, &config, MissingFeaturePolicy::Error).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.seed(), 7);
}

#[test]
fn test_fit_separates_blobs() {
    let model = fit(
        &two_blobs(),
        &names(&["energy", "valence"]),
        2,
        &KMeansConfig::default(),
        MissingFeaturePolicy::Error,
    )
    .unwrap();

    let labels = model.labels();
    assert!(labels[..3].iter().all(|&l| l == labels[0]));
    assert!(labels[3..].iter().all(|&l| l == labels[3]));
    assert_ne!(labels[0], labels[3]);
}

#[test]
fn test_fit_rejects_bad_k() {
    let table = spread(5);
    let cols = names(&["x", "y"]);
    let config = KMeansConfig::default();

    let err = fit(&table, &cols, 6, &config, MissingFeaturePolicy::Error).unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    let err = fit(&table, &cols, 0, &config, MissingFeaturePolicy::Error).unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[test]
fn test_kmeans_rejects_non_finite() {
    let points = Matrix::from_rows(&[vec![1.0], vec![f64::NAN]]).unwrap();
    let err = kmeans(&points, 1, &KMeansConfig::default()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[test]
fn test_get_train_data_narrows_to_numeric() {
    let data = get_train_data(
        &two_blobs(),
        &names(&["title", "energy"]),
        MissingFeaturePolicy::Error,
    )
    .unwrap();
    assert_eq!(data.column_names(), &names(&["energy"]));
}

#[test]
fn test_get_train_data_fallback() {
    let data = get_train_data(
        &two_blobs(),
        &names(&["energy", "tempo"]),
        MissingFeaturePolicy::FallbackToAll,
    )
    .unwrap();
    assert_eq!(data.column_names(), &names(&["energy", "valence"]));

    let err = get_train_data(
        &two_blobs(),
        &names(&["energy", "tempo"]),
        MissingFeaturePolicy::Error,
    )
    .unwrap_err();
    assert_eq!(err, EngineError::MissingFeature("tempo".into()));
}

#[test]
fn test_get_train_data_fallback_skips_labels() {
    let mut labeled = two_blobs();
    labeled
        .push_column(
            crate::table::CLUSTER_ID,
            Column::Integer(vec![0, 0, 0, 1, 1, 1]),
        )
        .unwrap();

    let data = get_train_data(
        &labeled,
        &names(&["energy", "tempo"]),
        MissingFeaturePolicy::FallbackToAll,
    )
    .unwrap();
    assert_eq!(data.column_names(), &names(&["energy", "valence"]));
}

#[test]
fn test_get_train_data_text_only() {
    let err = get_train_data(
        &two_blobs(),
        &names(&["title"]),
        MissingFeaturePolicy::FallbackToAll,
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[test]
fn test_fit_many_is_independent_per_k() {
    let table = spread(20);
    let cols = names(&["x", "y"]);
    let config = KMeansConfig::default();

    let models = fit_many(&table, &cols, 2..=4, &config, MissingFeaturePolicy::Error).unwrap();
    assert_eq!(models.keys().copied().collect::<Vec<_>>(), vec![2, 3, 4]);

    let single = fit(&table, &cols, 3, &config, MissingFeaturePolicy::Error).unwrap();
    assert_eq!(models[&3], single);

    assert!(fit_many(&table, &cols, 3..3, &config, MissingFeaturePolicy::Error).is_err());
}

#[test]
fn test_diagnose_blobs() {
    let table = two_blobs();
    let model = fit(
        &table,
        &names(&["energy", "valence"]),
        2,
        &KMeansConfig::default(),
        MissingFeaturePolicy::Error,
    )
    .unwrap();

    let diag = diagnose(&table, &model).unwrap();
    assert_eq!(diag.k, 2);
    assert_eq!(diag.cluster_sizes, vec![3, 3]);
    assert!(diag.inertia > 0.0);
    assert!(*diag.silhouette.as_ref().unwrap() > 0.8);
}

#[test]
fn test_diagnose_single_cluster_has_no_silhouette() {
    let table = two_blobs();
    let cols = names(&["energy", "valence"]);
    let models = fit_many(
        &table,
        &cols,
        [1, 2],
        &KMeansConfig::default(),
        MissingFeaturePolicy::Error,
    )
    .unwrap();

    let diags = diagnose_many(&table, &models).unwrap();
    assert_eq!(diags.len(), 2);
    assert!(matches!(diags[0].silhouette, Err(EngineError::InvalidInput(_))));
    assert!(diags[1].silhouette.is_ok());
    assert!(diags[0].inertia > diags[1].inertia);
}

#[test]
fn test_diagnose_rejects_other_table() {
    let table = two_blobs();
    let model = fit(
        &table,
        &names(&["energy"]),
        2,
        &KMeansConfig::default(),
        MissingFeaturePolicy::Error,
    )
    .unwrap();

    let err = diagnose(&spread(6), &model).unwrap_err();
    assert!(matches!(err, EngineError::ModelMismatch(_)));
}

#[test]
fn test_predict_matches_training_labels() {
    let table = spread(25);
    let cols = names(&["x", "y"]);
    let model = fit(&table, &cols, 3, &KMeansConfig::default(), MissingFeaturePolicy::Error)
        .unwrap();

    let points = table.matrix(&cols).unwrap();
    assert_eq!(model.predict(&points).unwrap(), model.labels());

    let narrow = table.matrix(&names(&["x"])).unwrap();
    assert!(matches!(
        model.predict(&narrow),
        Err(EngineError::ModelMismatch(_))
    ));
}

#[test]
fn test_centroid_table_layout() {
    let model = fit(
        &two_blobs(),
        &names(&["energy", "valence"]),
        2,
        &KMeansConfig::default(),
        MissingFeaturePolicy::Error,
    )
    .unwrap();

    let table = model.centroid_table().unwrap();
    assert_eq!(
        table.column_names(),
        &names(&[crate::table::CLUSTER_ID, "energy", "valence"])
    );
    assert_eq!(table.n_rows(), 2);
    assert_eq!(model.centroid_vector(1).unwrap().len(), 2);
    assert!(model.centroid(2).is_none());
}

#[test]
fn test_metric_scores() {
    let a = [1.0, 0.0];
    let b = [0.0, 1.0];
    assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-12);
    assert!(cosine_similarity(&a, &b).abs() < 1e-12);
    assert_eq!(cosine_similarity(&a, &[0.0, 0.0]), 0.0);
    assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-12);
    assert!((euclidean(&a, &b) - 2f64.sqrt()).abs() < 1e-12);
    assert_eq!(Metric::Euclidean.score(&a, &b), -2.0);
    assert_eq!(Metric::default(), Metric::Cosine);
    assert_eq!(Metric::Euclidean.to_string(), "euclidean");
}
