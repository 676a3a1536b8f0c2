//! On-disk artifact bundle
//!
//! A bundle is a directory of JSON files that are always used together. Saving
//! writes a complete staging directory beside the target and renames it into
//! place, so readers never observe a half-written bundle. Loading reads every
//! file and cross-checks them before anything is handed to a predictor.

use crate::error::{AdaptError, Result};
use crate::preprocessing::{CategoryEncoder, StandardScaler, TargetEncoder};
use crate::schema::FeatureSchema;
use crate::training::TrainedModel;
use super::metadata::ModelMetadata;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const METADATA_FILE: &str = "model_metadata.json";
pub const MODEL_FILE: &str = "best_model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const ENCODERS_FILE: &str = "label_encoders.json";
pub const TARGET_ENCODER_FILE: &str = "target_encoder.json";

/// How long `load` waits out a concurrent `save` swap
const SWAP_RETRIES: u32 = 50;
const SWAP_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Every file a complete bundle contains
pub const ARTIFACT_FILES: [&str; 5] = [
    METADATA_FILE,
    MODEL_FILE,
    SCALER_FILE,
    ENCODERS_FILE,
    TARGET_ENCODER_FILE,
];

/// Matched encoder, scaler, target encoder, model and metadata
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub metadata: ModelMetadata,
    pub encoder: CategoryEncoder,
    pub target_encoder: TargetEncoder,
    pub scaler: StandardScaler,
    pub model: TrainedModel,
}

impl ArtifactBundle {
    /// Persist the bundle to `dir`, replacing any previous bundle there
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let start = Instant::now();
        let dir = dir.as_ref();
        let name = dir
            .file_name()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("artifact directory has no name: {}", dir.display()),
                )
            })?
            .to_string_lossy()
            .into_owned();
        let parent = match dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let pid = std::process::id();
        let staging = parent.join(format!(".{name}.staging-{pid}"));
        let previous = parent.join(format!("{}{pid}", previous_prefix(&name)));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        if let Err(e) = self.write_files(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        // From here until the second rename `dir` is absent; `load` waits for
        // the previous-bundle marker to clear.
        if dir.exists() {
            if previous.exists() {
                fs::remove_dir_all(&previous)?;
            }
            fs::rename(dir, &previous)?;
        }
        if let Err(e) = fs::rename(&staging, dir) {
            warn!(path = %dir.display(), error = %e, "Failed to move bundle into place, restoring previous");
            if previous.exists() {
                let _ = fs::rename(&previous, dir);
            }
            let _ = fs::remove_dir_all(&staging);
            return Err(e.into());
        }
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }

        info!(
            path = %dir.display(),
            model = %self.metadata.model_name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Saved artifact bundle"
        );
        Ok(())
    }

    fn write_files(&self, dir: &Path) -> Result<()> {
        write_json(&dir.join(METADATA_FILE), &self.metadata)?;
        write_json(&dir.join(MODEL_FILE), &self.model)?;
        write_json(&dir.join(SCALER_FILE), &self.scaler)?;
        write_json(&dir.join(ENCODERS_FILE), &self.encoder)?;
        write_json(&dir.join(TARGET_ENCODER_FILE), &self.target_encoder)?;
        Ok(())
    }

    /// Load and cross-check a bundle; every failure is `ArtifactLoad`.
    ///
    /// `save` leaves a short window in which `dir` does not exist, between
    /// moving the old bundle aside and renaming the new one in. A load that
    /// lands in that window, or whose files were replaced while it read them,
    /// waits and reads again instead of failing.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let start = Instant::now();
        let dir = dir.as_ref();

        for attempt in 0..=SWAP_RETRIES {
            let last = attempt == SWAP_RETRIES;
            if !dir.is_dir() {
                if !last && swap_in_progress(dir) {
                    thread::sleep(SWAP_RETRY_DELAY);
                    continue;
                }
                return Err(AdaptError::ArtifactLoad(format!(
                    "artifact directory not found: {}",
                    dir.display()
                )));
            }

            let read = Self::read_files(dir).and_then(|bundle| {
                let settled: ModelMetadata = read_json(dir, METADATA_FILE)?;
                Ok((bundle, settled))
            });
            match read {
                Ok((bundle, settled)) if settled == bundle.metadata => {
                    bundle.validate(&FeatureSchema::riverbank())?;
                    info!(
                        path = %dir.display(),
                        model = %bundle.metadata.model_name,
                        accuracy = bundle.metadata.accuracy,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Loaded artifact bundle"
                    );
                    return Ok(bundle);
                }
                Ok(_) => debug!(path = %dir.display(), "Bundle replaced while loading, reading again"),
                Err(e) if last || !swap_in_progress(dir) => return Err(e),
                Err(_) => debug!(path = %dir.display(), "Bundle swap in progress, reading again"),
            }
            thread::sleep(SWAP_RETRY_DELAY);
        }

        Err(AdaptError::ArtifactLoad(format!(
            "artifact directory kept changing while loading: {}",
            dir.display()
        )))
    }

    fn read_files(dir: &Path) -> Result<Self> {
        Ok(Self {
            metadata: read_json(dir, METADATA_FILE)?,
            model: read_json(dir, MODEL_FILE)?,
            scaler: read_json(dir, SCALER_FILE)?,
            encoder: read_json(dir, ENCODERS_FILE)?,
            target_encoder: read_json(dir, TARGET_ENCODER_FILE)?,
        })
    }

    /// Check that the parts agree with each other and with the schema
    pub fn validate(&self, schema: &FeatureSchema) -> Result<()> {
        let meta = &self.metadata;

        if meta.feature_columns != schema.names() {
            return Err(inconsistent("feature columns do not match the schema"));
        }
        if meta.categorical_columns != schema.categorical_columns() {
            return Err(inconsistent("categorical columns do not match the schema"));
        }

        if !self.target_encoder.is_canonical() {
            return Err(inconsistent("target encoder classes are not sorted and unique"));
        }
        if meta.target_classes.as_slice() != self.target_encoder.classes() {
            return Err(inconsistent("metadata target classes differ from the target encoder"));
        }
        if let Some(label) = self
            .target_encoder
            .classes()
            .iter()
            .find(|c| !schema.target_classes().contains(&c.as_str()))
        {
            return Err(inconsistent(&format!("unknown target class {label:?}")));
        }

        let columns: BTreeSet<&str> = self.encoder.columns().collect();
        let expected = schema.categorical_columns();
        if columns != expected.iter().map(String::as_str).collect::<BTreeSet<_>>() {
            return Err(inconsistent("label encoders do not cover the categorical columns"));
        }
        for spec in schema.features().iter().filter(|s| s.is_categorical()) {
            let classes = self.encoder.classes(spec.name).unwrap_or_default();
            let domain = spec.domain().unwrap_or_default();
            let sorted = classes.windows(2).all(|w| w[0] < w[1]);
            if classes.is_empty() || !sorted || classes.iter().any(|c| !domain.contains(&c.as_str())) {
                return Err(inconsistent(&format!("invalid label encoder for {}", spec.name)));
            }
        }

        if self.scaler.n_features() != schema.len() || !self.scaler.is_well_formed() {
            return Err(inconsistent(&format!(
                "scaler has {} features, expected {}",
                self.scaler.n_features(),
                schema.len()
            )));
        }

        if self.model.n_classes() != self.target_encoder.n_classes() {
            return Err(inconsistent(&format!(
                "model predicts {} classes, target encoder has {}",
                self.model.n_classes(),
                self.target_encoder.n_classes()
            )));
        }
        if self.model.name() != meta.model_name {
            return Err(inconsistent(&format!(
                "metadata names {} but the model is {}",
                meta.model_name,
                self.model.name()
            )));
        }
        self.model
            .check_structure(schema.len(), self.target_encoder.n_classes())
            .map_err(|reason| inconsistent(&format!("malformed model: {reason}")))?;

        debug!(model = %meta.model_name, "Artifact bundle is consistent");
        Ok(())
    }
}

/// Name prefix of the directory an old bundle is parked in during `save`
fn previous_prefix(name: &str) -> String {
    format!(".{name}.previous-")
}

/// Whether some `save` has moved the bundle at `dir` aside and not finished
fn swap_in_progress(dir: &Path) -> bool {
    let Some(name) = dir.file_name() else {
        return false;
    };
    let prefix = previous_prefix(&name.to_string_lossy());
    let parent = match dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::read_dir(parent)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.file_name().to_string_lossy().starts_with(&prefix))
        })
        .unwrap_or(false)
}

fn inconsistent(reason: &str) -> AdaptError {
    AdaptError::ArtifactLoad(format!("inconsistent bundle: {reason}"))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    let file = File::open(&path).map_err(|e| {
        AdaptError::ArtifactLoad(format!("failed to open {}: {}", path.display(), e))
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        AdaptError::ArtifactLoad(format!("failed to parse {}: {}", path.display(), e))
    })
}
