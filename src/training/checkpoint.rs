//! Checkpoint persistence.
//!
//! Two record files live in the output directory: `best_model`,
//! overwritten whenever the test accuracy strictly improves, and
//! `final_model`, written once after the last epoch. Each record gets a
//! JSON metadata sidecar describing the epoch it was taken from. Writes
//! are plain file writes with no atomicity guarantee.

use std::fs;
use std::path::{Path, PathBuf};

use burn::{module::Module, record::CompactRecorder, tensor::backend::Backend};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::Classifier;
use crate::utils::error::{Error, Result};

/// File stem of the best-accuracy checkpoint
pub const BEST_CHECKPOINT: &str = "best_model";

/// File stem of the end-of-training checkpoint
pub const FINAL_CHECKPOINT: &str = "final_model";

/// Metadata stored beside each checkpoint record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub epoch: usize,
    pub test_loss: f64,
    pub test_accuracy: f64,
    pub learning_rate: f64,
    pub timestamp: String,
}

impl CheckpointMeta {
    /// Create metadata stamped with the current time
    pub fn new(epoch: usize, test_loss: f64, test_accuracy: f64, learning_rate: f64) -> Self {
        Self {
            epoch,
            test_loss,
            test_accuracy,
            learning_rate,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Save metadata as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load metadata from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let meta = serde_json::from_str(&json)?;
        Ok(meta)
    }
}

/// Path of the record file written for checkpoint `name`
pub fn record_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.mpk", name))
}

/// Path of the metadata sidecar for checkpoint `name`
pub fn meta_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", name))
}

/// Write the model's parameters and metadata under `dir` as `name`
pub fn save_model<B: Backend>(
    model: &Classifier<B>,
    dir: &Path,
    name: &str,
    meta: &CheckpointMeta,
) -> Result<()> {
    fs::create_dir_all(dir)?;

    let record_target = dir.join(name);
    model
        .clone()
        .save_file(record_target.clone(), &CompactRecorder::new())
        .map_err(|e| {
            Error::Serialization(format!(
                "failed to write checkpoint {}: {:?}",
                record_target.display(),
                e
            ))
        })?;

    meta.save(&meta_path(dir, name))?;
    info!("Checkpoint '{}' saved to {}", name, dir.display());

    Ok(())
}

/// Load the parameters of checkpoint `name` into `model`
pub fn load_model<B: Backend>(
    model: Classifier<B>,
    dir: &Path,
    name: &str,
    device: &B::Device,
) -> Result<Classifier<B>> {
    model
        .load_file(dir.join(name), &CompactRecorder::new(), device)
        .map_err(|e| Error::Model(format!("failed to load checkpoint '{}': {:?}", name, e)))
}
