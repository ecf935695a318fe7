//! Checkpoint save/restore for the orchestrator's own state.
//!
//! A resumed run must make the same cadence decisions and controller moves
//! as an uninterrupted one, so everything that feeds those decisions is
//! persisted: the configuration, the [`TrainingState`] (step counter,
//! augmentation probability, sign accumulator) and the path-length
//! regularizer's running target.
//!
//! # Format
//!
//! Scalar state serializes with `bincode`. The EMA shadow tensors are *not*
//! in this file; they persist as a sibling safetensors file written by
//! [`crate::ema::ParameterEma::save`], so the shadow set remains loadable
//! independently of any optimizer or trainer state.
//!
//! # What's NOT checkpointed
//!
//! Network weights and optimizer moments belong to the collaborator
//! modules and their framework; checkpoint them there.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::config::TrainerConfig;
use crate::error::{TrainResult, TrainingError};
use crate::state::TrainingState;

/// Current checkpoint format version.
const CHECKPOINT_VERSION: u32 = 1;

/// Serialized orchestrator state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerCheckpoint {
    /// Format version for compatibility checking.
    pub version: u32,
    /// The run's configuration (cadences are fixed per run, so a resumed
    /// run inherits them from here).
    pub config: TrainerConfig,
    /// Step counter, augmentation probability, sign accumulator.
    pub state: TrainingState,
    /// Path-length regularizer running target.
    pub path_length_target: Option<f64>,
}

impl TrainerCheckpoint {
    /// Bundles the current orchestrator state.
    #[must_use]
    pub fn new(
        config: TrainerConfig,
        state: TrainingState,
        path_length_target: Option<f64>,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            config,
            state,
            path_length_target,
        }
    }

    /// Writes the checkpoint to `path`.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error if the file cannot be created or
    /// serialization fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TrainResult<()> {
        let file = File::create(path.as_ref()).map_err(|e| {
            TrainingError::checkpoint(format!(
                "failed to create {}: {e}",
                path.as_ref().display()
            ))
        })?;
        bincode::serialize_into(BufWriter::new(file), self)
            .map_err(|e| TrainingError::checkpoint(format!("serialization failed: {e}")))?;
        tracing::info!(
            path = %path.as_ref().display(),
            step = self.state.global_step,
            "trainer checkpoint saved"
        );
        Ok(())
    }

    /// Reads a checkpoint from `path`, rejecting unknown format versions.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error on I/O failure, deserialization failure,
    /// or a version mismatch.
    pub fn load<P: AsRef<Path>>(path: P) -> TrainResult<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            TrainingError::checkpoint(format!("failed to open {}: {e}", path.as_ref().display()))
        })?;
        let checkpoint: Self = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| TrainingError::checkpoint(format!("deserialization failed: {e}")))?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(TrainingError::checkpoint(format!(
                "unsupported checkpoint version {} (expected {CHECKPOINT_VERSION})",
                checkpoint.version
            )));
        }
        tracing::info!(
            path = %path.as_ref().display(),
            step = checkpoint.state.global_step,
            "trainer checkpoint loaded"
        );
        Ok(checkpoint)
    }
}
