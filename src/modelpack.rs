use anyhow::{bail, Context, Result};
use chrono::{Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::clusterer::{ClusterModel, Metric};
use crate::preprocess::NormalizationParams;

const MODEL_ENTRY: &str = "model.json";
const SCALER_ENTRY: &str = "scaler.json";
const MANIFEST_ENTRY: &str = "manifest.json";
const README_ENTRY: &str = "readme.md";
const EXTENSION: &str = "modelpack";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub pack_id: Uuid,
    pub created_at: String,
    pub generator: String,
    pub stats: ManifestStats,
    pub checksums: Checksums,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestStats {
    pub k: usize,
    pub features: Vec<String>,
    pub metric: Metric,
    pub inertia: f64,
    pub catalog_size: usize,
}

/// Hex SHA-256 of each payload entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checksums {
    pub model: String,
    pub scaler: String,
}

/// Everything needed to score queries against one trained catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPack {
    pub manifest: Manifest,
    pub model: ClusterModel,
    pub params: NormalizationParams,
}

impl ModelPack {
    pub fn metric(&self) -> Metric {
        self.manifest.stats.metric
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub struct ModelPackWriter {
    manifest: Manifest,
    model_json: Vec<u8>,
    scaler_json: Vec<u8>,
}

impl ModelPackWriter {
    pub fn new(
        version: impl Into<String>,
        model: &ClusterModel,
        params: &NormalizationParams,
        metric: Metric,
    ) -> Result<Self> {
        let model_json = serde_json::to_vec_pretty(model).context("Failed to serialize model")?;
        let scaler_json =
            serde_json::to_vec_pretty(params).context("Failed to serialize normalization params")?;

        let manifest = Manifest {
            version: version.into(),
            pack_id: Uuid::new_v4(),
            created_at: Utc::now().to_rfc3339(),
            generator: format!("anisong v{}", env!("CARGO_PKG_VERSION")),
            stats: ManifestStats {
                k: model.k(),
                features: model.features().to_vec(),
                metric,
                inertia: model.inertia(),
                catalog_size: model.labels().len(),
            },
            checksums: Checksums {
                model: sha256_hex(&model_json),
                scaler: sha256_hex(&scaler_json),
            },
        };

        Ok(Self {
            manifest,
            model_json,
            scaler_json,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Write the pack to a new file; an existing file is never replaced
    pub fn write_to_file(&self, output_path: &Path) -> Result<()> {
        debug!(path = %output_path.display(), "Writing model pack");

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(output_path)
            .context(format!(
                "Failed to create output file: {}",
                output_path.display()
            ))?;
        let mut zip = ZipWriter::new(file);
        let now = chrono::Local::now();
        let options: FileOptions<'_, ()> = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644)
            .last_modified_time(
                zip::DateTime::from_date_and_time(
                    now.year() as u16,
                    now.month() as u8,
                    now.day() as u8,
                    now.hour() as u8,
                    now.minute() as u8,
                    now.second() as u8,
                )
                .unwrap_or_default(),
            );

        let manifest_json = serde_json::to_string_pretty(&self.manifest)
            .context("Failed to serialize manifest")?;
        let readme = self.generate_readme();
        let entries: [(&str, &[u8]); 4] = [
            (MANIFEST_ENTRY, manifest_json.as_bytes()),
            (MODEL_ENTRY, &self.model_json),
            (SCALER_ENTRY, &self.scaler_json),
            (README_ENTRY, readme.as_bytes()),
        ];
        for (name, bytes) in entries {
            zip.start_file(name, options)
                .context(format!("Failed to start {} in ZIP", name))?;
            zip.write_all(bytes)
                .context(format!("Failed to write {} to ZIP", name))?;
        }

        zip.finish().context("Failed to finalize ZIP file")?;

        info!(
            path = %output_path.display(),
            version = %self.manifest.version,
            k = self.manifest.stats.k,
            "Model pack written"
        );
        Ok(())
    }

    fn generate_readme(&self) -> String {
        format!(
            r#"# Model pack

Song clustering model generated by {}.

## Metadata

- **Version**: {}
- **Created**: {}
- **Clusters**: {}
- **Metric**: {}
- **Catalog size**: {}
- **Inertia**: {:.4}

## Features

{}

## Structure

```
manifest.json  - Metadata and payload checksums
model.json     - Centroids and training labels
scaler.json    - Normalization mean and scale per feature
readme.md      - This file
```
"#,
            self.manifest.generator,
            self.manifest.version,
            self.manifest.created_at,
            self.manifest.stats.k,
            self.manifest.stats.metric,
            self.manifest.stats.catalog_size,
            self.manifest.stats.inertia,
            self.manifest
                .stats
                .features
                .iter()
                .map(|f| format!("- {}", f))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

pub struct ModelPackReader;

impl ModelPackReader {
    /// Open a pack and verify both payload checksums
    pub fn open(path: &Path) -> Result<ModelPack> {
        debug!(path = %path.display(), "Opening model pack");

        let file =
            File::open(path).context(format!("Failed to open model pack: {}", path.display()))?;
        let mut archive = ZipArchive::new(file).context("Failed to read ZIP archive")?;

        let manifest_bytes = read_entry(&mut archive, MANIFEST_ENTRY)?;
        let manifest: Manifest =
            serde_json::from_slice(&manifest_bytes).context("Failed to parse manifest.json")?;

        let model_bytes = read_entry(&mut archive, MODEL_ENTRY)?;
        let scaler_bytes = read_entry(&mut archive, SCALER_ENTRY)?;
        verify(MODEL_ENTRY, &model_bytes, &manifest.checksums.model)?;
        verify(SCALER_ENTRY, &scaler_bytes, &manifest.checksums.scaler)?;

        let model: ClusterModel =
            serde_json::from_slice(&model_bytes).context("Failed to parse model.json")?;
        model.validate().context("Stored model is inconsistent")?;
        let params: NormalizationParams =
            serde_json::from_slice(&scaler_bytes).context("Failed to parse scaler.json")?;
        params
            .validate()
            .context("Stored normalization params are inconsistent")?;
        check_stats(&manifest.stats, &model, &params)?;

        info!(version = %manifest.version, k = model.k(), "Model pack loaded");
        Ok(ModelPack {
            manifest,
            model,
            params,
        })
    }
}

/// The manifest must describe the model it ships, and the params must scale
/// every model feature
fn check_stats(
    stats: &ManifestStats,
    model: &ClusterModel,
    params: &NormalizationParams,
) -> Result<()> {
    if stats.k != model.k() {
        bail!("Manifest says k={}, model.json has {} centroids", stats.k, model.k());
    }
    if stats.features != model.features() {
        bail!(
            "Manifest features {:?} differ from model features {:?}",
            stats.features,
            model.features()
        );
    }
    if let Some(f) = model
        .features()
        .iter()
        .find(|f| !params.features().contains(f))
    {
        bail!("Normalization params do not cover model feature '{}'", f);
    }
    Ok(())
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .context(format!("{} not found in model pack", name))?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .context(format!("Failed to read {}", name))?;
    Ok(bytes)
}

fn verify(name: &str, bytes: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_hex(bytes);
    if actual != expected {
        bail!(
            "Checksum mismatch for {}: manifest says {}, contents hash to {}",
            name,
            expected,
            actual
        );
    }
    Ok(())
}

/// Directory of versioned model packs, one `<version>.modelpack` each
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, version: &str) -> PathBuf {
        self.root.join(format!("{}.{}", version, EXTENSION))
    }

    /// Save under a fresh timestamp version and return it. Versions sort in
    /// save order.
    pub fn save(
        &self,
        model: &ClusterModel,
        params: &NormalizationParams,
        metric: Metric,
    ) -> Result<String> {
        std::fs::create_dir_all(&self.root)
            .context(format!("Failed to create model dir {}", self.root.display()))?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string();
        let mut version = stamp.clone();
        for attempt in 1.. {
            let writer = ModelPackWriter::new(version.clone(), model, params, metric)?;
            match writer.write_to_file(&self.path_for(&version)) {
                Ok(()) => break,
                Err(e)
                    if e.downcast_ref::<std::io::Error>()
                        .is_some_and(|io| io.kind() == ErrorKind::AlreadyExists) =>
                {
                    version = format!("{}-{}", stamp, attempt);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(version)
    }

    pub fn load(&self, version: &str) -> Result<ModelPack> {
        let path = self.path_for(version);
        if !path.is_file() {
            bail!("No model version {} in {}", version, self.root.display());
        }
        ModelPackReader::open(&path)
    }

    /// Most recently saved pack
    pub fn latest(&self) -> Result<ModelPack> {
        let versions = self.list_versions()?;
        match versions.last() {
            Some(v) => self.load(v),
            None => bail!("No model packs in {}", self.root.display()),
        }
    }

    /// Stored versions, oldest first
    pub fn list_versions(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(vec![]);
        }

        let mut versions = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.context("Failed to read model dir")?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(EXTENSION)
            {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    versions.push(stem.to_string());
                }
            }
        }
        versions.sort();
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusterer::{fit, KMeansConfig};
    use crate::preprocess::MissingFeaturePolicy;
    use crate::table::{Column, FeatureTable};

    fn trained() -> (ClusterModel, NormalizationParams) {
        let table = FeatureTable::from_columns([
            ("energy", Column::Float(vec![1.0, 0.9, 0.0, 0.1])),
            ("valence", Column::Float(vec![0.0, 0.1, 1.0, 0.9])),
        ])
        .unwrap();
        let params = NormalizationParams::fit(&table).unwrap();
        let scaled = params.transform(&table).unwrap();
        let model = fit(
            &scaled,
            params.features(),
            2,
            &KMeansConfig::default(),
            MissingFeaturePolicy::Error,
        )
        .unwrap();
        (model, params)
    }

    #[test]
    fn test_pack_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1.modelpack");
        let (model, params) = trained();

        let writer = ModelPackWriter::new("v1", &model, &params, Metric::Euclidean).unwrap();
        writer.write_to_file(&path).unwrap();

        let pack = ModelPackReader::open(&path).unwrap();
        assert_eq!(pack.model, model);
        assert_eq!(pack.params, params);
        assert_eq!(pack.metric(), Metric::Euclidean);
        assert_eq!(&pack.manifest, writer.manifest());
        assert_eq!(pack.manifest.stats.catalog_size, 4);
    }

    #[test]
    fn test_writer_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1.modelpack");
        let (model, params) = trained();

        let writer = ModelPackWriter::new("v1", &model, &params, Metric::Cosine).unwrap();
        writer.write_to_file(&path).unwrap();
        assert!(writer.write_to_file(&path).is_err());
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.modelpack");
        let (model, params) = trained();

        let mut writer = ModelPackWriter::new("bad", &model, &params, Metric::Cosine).unwrap();
        writer.manifest.checksums.scaler = sha256_hex(b"something else");
        writer.write_to_file(&path).unwrap();

        let err = ModelPackReader::open(&path).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
    }

    #[test]
    fn test_short_scaler_vectors_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.modelpack");
        let (model, params) = trained();

        let mut writer = ModelPackWriter::new("short", &model, &params, Metric::Cosine).unwrap();
        let mut scaler: serde_json::Value = serde_json::from_slice(&writer.scaler_json).unwrap();
        scaler["scale"] = serde_json::json!([1.0]);
        writer.scaler_json = serde_json::to_vec(&scaler).unwrap();
        writer.manifest.checksums.scaler = sha256_hex(&writer.scaler_json);
        writer.write_to_file(&path).unwrap();

        let err = ModelPackReader::open(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("normalization params are inconsistent"));
    }

    #[test]
    fn test_manifest_must_describe_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.modelpack");
        let (model, params) = trained();

        let mut writer = ModelPackWriter::new("stats", &model, &params, Metric::Cosine).unwrap();
        writer.manifest.stats.k = 5;
        writer.write_to_file(&path).unwrap();
        assert!(ModelPackReader::open(&path)
            .unwrap_err()
            .to_string()
            .contains("Manifest says k=5"));

        let path = dir.path().join("features.modelpack");
        let mut writer = ModelPackWriter::new("features", &model, &params, Metric::Cosine).unwrap();
        writer.manifest.stats.features = vec!["energy".to_string()];
        writer.write_to_file(&path).unwrap();
        assert!(ModelPackReader::open(&path).is_err());
    }

    #[test]
    fn test_store_versions() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models"));
        assert!(store.list_versions().unwrap().is_empty());
        assert!(store.latest().is_err());

        let (model, params) = trained();
        let first = store.save(&model, &params, Metric::Cosine).unwrap();
        let second = store.save(&model, &params, Metric::Euclidean).unwrap();
        assert_ne!(first, second);

        assert_eq!(store.list_versions().unwrap(), vec![first.clone(), second]);
        assert_eq!(store.latest().unwrap().metric(), Metric::Euclidean);
        assert_eq!(store.load(&first).unwrap().metric(), Metric::Cosine);
        assert!(store.load("19700101T000000000Z").is_err());
    }
}
