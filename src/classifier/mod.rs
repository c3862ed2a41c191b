use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::app::config::Settings;

pub const FEATURE_COUNT: usize = 5;

/// Column names of the training dataset, in the exact order the model
/// consumes them. The same order is the wire contract of [FeatureVector].
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "Flow Duration",
    "Total Fwd Packets",
    "Total Backward Packets",
    "Total Length of Fwd Packets",
    "Total Length of Bwd Packets",
];

pub const LABEL_COLUMN: &str = "Label";

/// Fixed-order numeric summary of a flow.
///
/// Index order: flow duration, total fwd packets, total bwd packets,
/// total fwd bytes, total bwd bytes. Reordering the fields corrupts
/// predictions silently, so the vector is only ever built through
/// [FeatureVector] constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

#[derive(Debug)]
pub enum ModelError {
    ArtifactMissing(String),
    ArtifactRead(std::io::Error),
    ArtifactWrite(std::io::Error),
    ArtifactFormat(serde_json::Error),
    DatasetMissing(String),
    Dataset(csv::Error),
    MissingColumn(String),
    EmptyDataset,
    EmptyModel,
}

/// On-disk model: per-label centroids in scaled feature space plus the
/// scaling parameters and the label list (the label encoder).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    pub labels: Vec<String>,
    pub centroids: Vec<[f64; FEATURE_COUNT]>,
    pub feature_means: [f64; FEATURE_COUNT],
    pub feature_stds: [f64; FEATURE_COUNT],
}

/// Nearest-centroid classifier, stateless after load.
#[derive(Debug, Clone)]
pub struct Classifier {
    artifact: ModelArtifact,
}

impl Classifier {
    pub fn new(artifact: ModelArtifact) -> Result<Self, ModelError> {
        if artifact.labels.is_empty() || artifact.labels.len() != artifact.centroids.len() {
            return Err(ModelError::EmptyModel);
        }

        Ok(Self { artifact })
    }

    /// Read the artifact file eagerly. Absence is an error here; the
    /// explicit bootstrap path lives in [Classifier::load_or_bootstrap].
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::ArtifactMissing(path.display().to_string()));
        }

        let raw = fs::read_to_string(path).map_err(ModelError::ArtifactRead)?;
        let artifact = serde_json::from_str(&raw).map_err(ModelError::ArtifactFormat)?;

        Self::new(artifact)
    }

    /// Startup entrypoint: load the artifact, or train one from the
    /// configured dataset when `bootstrap_train` is set. A missing artifact
    /// without the bootstrap switch is fatal, a deployment problem is not
    /// papered over with a silent retrain.
    pub fn load_or_bootstrap(settings: &Settings) -> Result<Self, ModelError> {
        let path = Path::new(&settings.model_path);
        if path.exists() {
            let classifier = Self::load(path)?;
            info!(
                "loaded model artifact {} with {} labels",
                settings.model_path,
                classifier.artifact.labels.len()
            );
            return Ok(classifier);
        }

        if !settings.bootstrap_train {
            return Err(ModelError::ArtifactMissing(settings.model_path.clone()));
        }

        let dataset = settings
            .dataset_path
            .as_deref()
            .ok_or_else(|| ModelError::DatasetMissing("dataset_path not configured".to_owned()))?;

        warn!(
            "model artifact {} missing, bootstrap training from {}",
            settings.model_path, dataset
        );
        Self::train(Path::new(dataset), path)
    }

    /// Fit per-label centroids from a labeled CSV and persist the artifact.
    ///
    /// Rows with unparsable feature cells or an empty label are skipped,
    /// training data tends to be dirty.
    pub fn train(dataset_path: &Path, artifact_path: &Path) -> Result<Self, ModelError> {
        if !dataset_path.exists() {
            return Err(ModelError::DatasetMissing(
                dataset_path.display().to_string(),
            ));
        }

        let mut reader = csv::Reader::from_path(dataset_path).map_err(ModelError::Dataset)?;
        let headers = reader.headers().map_err(ModelError::Dataset)?.clone();

        let feature_idx = FEATURE_COLUMNS
            .iter()
            .map(|column| {
                headers
                    .iter()
                    .position(|h| h.trim() == *column)
                    .ok_or_else(|| ModelError::MissingColumn((*column).to_owned()))
            })
            .collect::<Result<Vec<usize>, ModelError>>()?;
        let label_idx = headers
            .iter()
            .position(|h| h.trim() == LABEL_COLUMN)
            .ok_or_else(|| ModelError::MissingColumn(LABEL_COLUMN.to_owned()))?;

        let mut rows: Vec<([f64; FEATURE_COUNT], String)> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(ModelError::Dataset)?;

            let label = match record.get(label_idx).map(str::trim) {
                Some(l) if !l.is_empty() => l.to_owned(),
                _ => continue,
            };

            let mut features = [0.0; FEATURE_COUNT];
            let mut valid = true;
            for (slot, idx) in features.iter_mut().zip(feature_idx.iter()) {
                match record.get(*idx).and_then(|v| v.trim().parse::<f64>().ok()) {
                    Some(v) if v.is_finite() => *slot = v,
                    _ => {
                        valid = false;
                        break;
                    }
                }
            }

            if valid {
                rows.push((features, label));
            }
        }

        if rows.is_empty() {
            return Err(ModelError::EmptyDataset);
        }

        let (feature_means, feature_stds) = scaling_parameters(&rows);

        // BTreeMap keeps the label ordering stable between training runs
        let mut grouped: BTreeMap<String, (usize, [f64; FEATURE_COUNT])> = BTreeMap::new();
        for (features, label) in &rows {
            let scaled = scale(features, &feature_means, &feature_stds);
            let entry = grouped.entry(label.clone()).or_insert((0, [0.0; FEATURE_COUNT]));
            entry.0 += 1;
            for (sum, v) in entry.1.iter_mut().zip(scaled.iter()) {
                *sum += v;
            }
        }

        let mut labels = Vec::with_capacity(grouped.len());
        let mut centroids = Vec::with_capacity(grouped.len());
        for (label, (count, sums)) in grouped {
            labels.push(label);
            centroids.push(sums.map(|s| s / count as f64));
        }

        let artifact = ModelArtifact {
            labels,
            centroids,
            feature_means,
            feature_stds,
        };

        let serialized =
            serde_json::to_string_pretty(&artifact).map_err(ModelError::ArtifactFormat)?;
        fs::write(artifact_path, serialized).map_err(ModelError::ArtifactWrite)?;
        info!(
            "trained model on {} rows, artifact written to {}",
            rows.len(),
            artifact_path.display()
        );

        Self::new(artifact)
    }

    /// Deterministic inference: nearest centroid in scaled feature space,
    /// ties resolved to the first label.
    pub fn classify(&self, features: &FeatureVector) -> Result<&str, ModelError> {
        if self.artifact.labels.is_empty() {
            return Err(ModelError::EmptyModel);
        }

        let scaled = scale(
            &features.0,
            &self.artifact.feature_means,
            &self.artifact.feature_stds,
        );

        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, centroid) in self.artifact.centroids.iter().enumerate() {
            let dist = squared_distance(&scaled, centroid);
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }

        Ok(&self.artifact.labels[best])
    }
}

fn scaling_parameters(
    rows: &[([f64; FEATURE_COUNT], String)],
) -> ([f64; FEATURE_COUNT], [f64; FEATURE_COUNT]) {
    let n = rows.len() as f64;

    let mut means = [0.0; FEATURE_COUNT];
    for (features, _) in rows {
        for (mean, v) in means.iter_mut().zip(features.iter()) {
            *mean += v;
        }
    }
    for mean in means.iter_mut() {
        *mean /= n;
    }

    let mut stds = [0.0; FEATURE_COUNT];
    for (features, _) in rows {
        for ((std, v), mean) in stds.iter_mut().zip(features.iter()).zip(means.iter()) {
            let diff = v - mean;
            *std += diff * diff;
        }
    }
    for std in stds.iter_mut() {
        *std = (*std / n).sqrt();
    }

    (means, stds)
}

fn scale(
    features: &[f64; FEATURE_COUNT],
    means: &[f64; FEATURE_COUNT],
    stds: &[f64; FEATURE_COUNT],
) -> [f64; FEATURE_COUNT] {
    let mut scaled = [0.0; FEATURE_COUNT];
    for i in 0..FEATURE_COUNT {
        // constant columns scale to zero offset instead of dividing by zero
        let std = if stds[i] == 0.0 { 1.0 } else { stds[i] };
        scaled[i] = (features[i] - means[i]) / std;
    }
    scaled
}

fn squared_distance(a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}
