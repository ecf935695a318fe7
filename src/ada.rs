//! Adaptive augmentation control from critic sign statistics.
//!
//! An overfitting critic scores real images increasingly confidently
//! positive. The controller watches the fraction of positive-sign critic
//! outputs on real samples and nudges the augmentation probability up when
//! that fraction overshoots a target, down when it undershoots. This is a
//! closed control loop that replaces manual augmentation tuning.
//!
//! The loop is kept trivially stable: output is clamped to `[0, 1]` and the
//! adjustment responds only to the *sign* of the error, with a step size
//! proportional to the update cadence, so the probability can never react
//! faster than `speed` per iteration regardless of how extreme the
//! statistic gets.
//!
//! # Windowing
//!
//! The "recent" statistic is an accumulate-and-reset window: every critic
//! step adds the batch's signs, and each cadence firing consumes the mean
//! and clears the window. Memory use is two scalars regardless of run
//! length, and the controller's view always spans exactly one cadence
//! period.

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::config::AdaConfig;
use crate::error::TrainResult;
use crate::state::TrainingState;

/// Bounded-memory running statistic over critic output signs.
///
/// Accumulates `signum(score)` for every real-sample critic output between
/// consecutive augmentation-cadence firings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignAccumulator {
    sum: f64,
    count: u64,
}

impl SignAccumulator {
    /// Accumulates the signs of a batch of per-sample critic scores.
    ///
    /// Scores are detached from any autograd graph by construction; only
    /// host-side scalars are read.
    ///
    /// # Errors
    ///
    /// Returns a tensor error if the scores cannot be read back to host
    /// memory.
    pub fn accumulate(&mut self, scores: &Tensor) -> TrainResult<()> {
        let values = scores.flatten_all()?.to_dtype(candle_core::DType::F32)?;
        for v in values.to_vec1::<f32>()? {
            // NaN scores contribute nothing rather than poisoning the mean.
            if !v.is_nan() {
                self.sum += f64::from(v.signum());
                self.count += 1;
            }
        }
        Ok(())
    }

    /// Current estimate of the mean sign, or `None` if nothing has been
    /// accumulated since the last reset.
    #[must_use]
    pub fn estimate(&self) -> Option<f32> {
        if self.count == 0 {
            None
        } else {
            Some((self.sum / self.count as f64) as f32)
        }
    }

    /// Number of scores accumulated since the last reset.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Clears the window.
    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}

/// Controller operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AugmentMode {
    /// Probability pinned to its initial value; sign statistics ignored.
    Fixed,
    /// Probability steered by the sign statistic.
    Adaptive,
}

/// Closed-loop augmentation strength controller.
///
/// Holds only configuration; the mutable pieces (probability, accumulator)
/// live in [`TrainingState`] so they serialize with the rest of the run.
#[derive(Debug, Clone)]
pub struct AugmentController {
    mode: AugmentMode,
    target: f32,
    speed: f32,
    interval: u64,
}

impl AugmentController {
    /// Builds the controller from a validated configuration.
    #[must_use]
    pub fn new(config: &AdaConfig) -> Self {
        Self {
            mode: if config.fixed {
                AugmentMode::Fixed
            } else {
                AugmentMode::Adaptive
            },
            target: config.target,
            speed: config.speed,
            interval: config.interval,
        }
    }

    /// The controller's operating mode.
    #[must_use]
    pub fn mode(&self) -> AugmentMode {
        self.mode
    }

    /// Records real-sample critic scores into the state's accumulator.
    ///
    /// Called on every critic adversarial step. A no-op in fixed mode.
    ///
    /// # Errors
    ///
    /// Returns a tensor error if the scores cannot be read back.
    pub fn record_real_scores(&self, state: &mut TrainingState, scores: &Tensor) -> TrainResult<()> {
        if self.mode == AugmentMode::Fixed {
            return Ok(());
        }
        state.sign_accumulator.accumulate(scores)
    }

    /// Consumes the accumulated statistic and adjusts the augmentation
    /// probability. Called only when the augmentation cadence fires.
    ///
    /// An empty accumulator (no critic step ran since the last firing)
    /// leaves the probability unchanged.
    pub fn update(&self, state: &mut TrainingState) {
        if self.mode == AugmentMode::Fixed {
            return;
        }
        let Some(estimate) = state.sign_accumulator.estimate() else {
            return;
        };
        let adjust = (estimate - self.target).signum() * self.speed * self.interval as f32;
        let updated = (state.augmentation_probability + adjust).clamp(0.0, 1.0);
        tracing::debug!(
            estimate,
            target = self.target,
            probability = updated,
            "augmentation probability adjusted"
        );
        state.augmentation_probability = updated;
        state.sign_accumulator.reset();
    }
}
