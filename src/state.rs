//! Shared, versioned training state.
//!
//! All cross-iteration bookkeeping that the orchestrator and its sub-steps
//! mutate lives in one explicit [`TrainingState`] struct; there are no
//! process-wide globals. The struct is owned by the trainer, mutated only by
//! the step scheduler and its direct sub-calls, and serialized wholesale
//! into checkpoints so a resumed run continues with identical cadence and
//! controller behavior.
//!
//! Two pieces of state that conceptually belong here live elsewhere for
//! mechanical reasons: optimizer moments stay inside each
//! `candle_nn::AdamW`, and the shadow parameter tensors stay in
//! [`crate::ema::ParameterEma`] (tensors are persisted as safetensors, not
//! serde).

use serde::{Deserialize, Serialize};

use crate::ada::SignAccumulator;
use crate::config::TrainerConfig;

/// Mutable state shared across training iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingState {
    /// Iteration counter; increases by exactly 1 per [`run_iteration`] call
    /// and is the sole driver of all cadence decisions.
    ///
    /// [`run_iteration`]: crate::AdversarialTrainer::run_iteration
    pub global_step: u64,

    /// Current augmentation probability, always clamped to `[0, 1]`.
    pub augmentation_probability: f32,

    /// Running statistic over the signs of real-sample critic outputs.
    pub sign_accumulator: SignAccumulator,
}

impl TrainingState {
    /// Creates fresh state for a new run.
    #[must_use]
    pub fn new(config: &TrainerConfig) -> Self {
        Self {
            global_step: 0,
            augmentation_probability: config.ada.initial_probability,
            sign_accumulator: SignAccumulator::default(),
        }
    }

    /// Advances the iteration counter. Called exactly once per iteration,
    /// as the final act of the step scheduler.
    pub fn advance(&mut self) {
        self.global_step += 1;
    }
}
