//! Primary classifier backed by a SpeciesNet runner subprocess.

use super::normalize::species_from_taxonomy;
use super::{LocalImage, PrimaryClassifier, RawEntry};
use crate::config::{ClassifierConfig, RegionConfig};
use crate::constants::ALTERNATES_TOP_K;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Invokes the SpeciesNet runner in folder mode and parses its
/// predictions JSON.
///
/// The runner itself is a black box; this type only owns the process
/// invocation and the output schema.
pub struct SpeciesNetClassifier {
    config: ClassifierConfig,
}

impl SpeciesNetClassifier {
    /// Create a classifier from configuration.
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    fn build_command(
        &self,
        folders: &[PathBuf],
        output_json: &Path,
        region: &RegionConfig,
    ) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.config.command);
        cmd.args(&self.config.args);
        for folder in folders {
            cmd.arg("--folders").arg(folder);
        }
        cmd.arg("--predictions_json").arg(output_json);
        cmd.arg("--country").arg(&region.country);
        if !region.admin1_region.is_empty() {
            cmd.arg("--admin1_region").arg(&region.admin1_region);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl PrimaryClassifier for SpeciesNetClassifier {
    async fn classify(
        &self,
        images: &[LocalImage],
        region: &RegionConfig,
    ) -> Result<HashMap<String, Vec<RawEntry>>> {
        if images.is_empty() {
            return Ok(HashMap::new());
        }

        // One folder per staged image; the runner scans whole directories.
        let mut folders: Vec<PathBuf> = Vec::new();
        for image in images {
            if let Some(parent) = image.path.parent()
                && !folders.iter().any(|f| f == parent)
            {
                folders.push(parent.to_path_buf());
            }
        }

        let output_dir = tempfile::tempdir()?;
        let output_json = output_dir.path().join("predictions.json");

        debug!(
            "Running SpeciesNet on {} image(s) ({} {})",
            images.len(),
            region.country,
            region.admin1_region
        );

        let output = self
            .build_command(&folders, &output_json, region)
            .output()
            .await
            .map_err(|e| Error::ClassifierLaunch {
                command: self.config.command.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(Error::ClassifierFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        if !output_json.exists() {
            return Err(Error::PredictionsMissing { path: output_json });
        }

        let contents = tokio::fs::read_to_string(&output_json).await?;
        let parsed: PredictionsFile =
            serde_json::from_str(&contents).map_err(|e| Error::PredictionsParse {
                path: output_json.clone(),
                source: e,
            })?;

        Ok(collect_entries(&parsed, images))
    }
}

/// Group parsed prediction entries by image id.
fn collect_entries(
    parsed: &PredictionsFile,
    images: &[LocalImage],
) -> HashMap<String, Vec<RawEntry>> {
    let by_path: HashMap<String, &str> = images
        .iter()
        .map(|img| (img.path.to_string_lossy().into_owned(), img.image_id.as_str()))
        .collect();

    let mut per_image: HashMap<String, Vec<RawEntry>> = HashMap::new();

    for entry in &parsed.predictions {
        let Some(filepath) = entry.filepath.as_deref() else {
            continue;
        };
        let Some(image_id) = by_path
            .get(filepath)
            .copied()
            .or_else(|| match_by_stem(filepath, images))
        else {
            warn!("Prediction for unknown file {filepath}, skipping");
            continue;
        };

        let entries = per_image.entry(image_id.to_string()).or_default();

        if let Some(label) = entry.prediction.as_deref() {
            entries.push(RawEntry {
                species: Some(species_from_taxonomy(label)),
                confidence: entry.prediction_score,
                detail: Some(serde_json::json!({ "label": label })),
            });
        }

        // Alternate classifications are only trustworthy when the
        // classifier stage itself did not fail.
        if entry.failures.iter().any(|f| f == "CLASSIFIER") {
            continue;
        }
        if let Some(cls) = &entry.classifications {
            for (label, score) in cls.classes.iter().zip(&cls.scores).take(ALTERNATES_TOP_K) {
                entries.push(RawEntry {
                    species: Some(species_from_taxonomy(label)),
                    confidence: Some(*score),
                    detail: Some(serde_json::json!({ "label": label, "alternate": true })),
                });
            }
        }
    }

    per_image
}

/// Fall back to matching the file stem against image ids; the runner may
/// rewrite paths (e.g. absolute vs. relative) between input and output.
fn match_by_stem<'a>(filepath: &str, images: &'a [LocalImage]) -> Option<&'a str> {
    let stem = Path::new(filepath).file_stem()?.to_str()?;
    images
        .iter()
        .find(|img| img.image_id == stem)
        .map(|img| img.image_id.as_str())
}

#[derive(Debug, Deserialize)]
struct PredictionsFile {
    #[serde(default)]
    predictions: Vec<PredictionEntry>,
}

#[derive(Debug, Deserialize)]
struct PredictionEntry {
    filepath: Option<String>,
    prediction: Option<String>,
    prediction_score: Option<f64>,
    #[serde(default)]
    failures: Vec<String>,
    classifications: Option<Classifications>,
}

#[derive(Debug, Deserialize)]
struct Classifications {
    #[serde(default)]
    classes: Vec<String>,
    #[serde(default)]
    scores: Vec<f64>,
}
