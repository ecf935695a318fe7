//! Scalar metrics collection and non-fatal event counters.
//!
//! Two kinds of observability live here:
//!
//! - **Per-iteration scalars**: the loss values each sub-step produced,
//!   mirrored back to the caller in [`crate::IterationResult`] and
//!   optionally retained as history for experiment-logging collaborators.
//! - **Non-fatal event counters**: sanitized gradient entries and skipped
//!   regularizer sub-steps. These events are recovered locally and never
//!   halt training, so counting them is the only way repeated occurrences
//!   stay diagnosable over a long-running job.

use serde::{Deserialize, Serialize};

/// Scalar values produced by one training iteration.
///
/// `None` fields correspond to sub-steps that did not run this iteration
/// (cadence did not fire, no patch critic configured, or the sub-step was
/// skipped after a NaN penalty).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationScalars {
    /// The iteration this row describes.
    pub step: u64,
    /// Full-image generator adversarial loss.
    pub generator_loss: f32,
    /// Patch-critic component of the generator loss.
    pub generator_patch_loss: Option<f32>,
    /// Full-image critic adversarial loss (real + fake terms).
    pub critic_loss: f32,
    /// Patch critic adversarial loss.
    pub patch_critic_loss: Option<f32>,
    /// Gradient penalty value for the full-image critic.
    pub gradient_penalty: Option<f32>,
    /// Gradient penalty value for the patch critic.
    pub patch_gradient_penalty: Option<f32>,
    /// Path-length penalty value.
    pub path_length_penalty: Option<f32>,
    /// Augmentation probability after this iteration.
    pub augmentation_probability: f32,
}

/// Aggregate view over the collected history and counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStatistics {
    /// Number of iterations recorded.
    pub iterations: usize,
    /// Mean generator loss over the recorded history.
    pub mean_generator_loss: f32,
    /// Mean critic loss over the recorded history.
    pub mean_critic_loss: f32,
    /// Total gradient entries rewritten by sanitization.
    pub sanitized_gradient_entries: u64,
    /// Number of optimizer steps that needed sanitization.
    pub sanitized_gradient_steps: u64,
    /// Number of regularizer sub-steps skipped after a NaN penalty.
    pub skipped_regularizer_steps: u64,
}

/// Collects per-iteration scalars and non-fatal event counters.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    enabled: bool,
    history: Vec<IterationScalars>,
    sanitized_gradient_entries: u64,
    sanitized_gradient_steps: u64,
    skipped_regularizer_steps: u64,
}

impl MetricsCollector {
    /// Creates a collector; when `enabled` is false, scalar history is
    /// dropped but event counters are still maintained.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    /// Records one iteration's scalars.
    pub fn record_iteration(&mut self, scalars: IterationScalars) {
        if self.enabled {
            self.history.push(scalars);
        }
    }

    /// Records a sanitization event (`entries` rewritten gradient values).
    pub fn record_sanitized(&mut self, entries: usize) {
        if entries > 0 {
            self.sanitized_gradient_entries += entries as u64;
            self.sanitized_gradient_steps += 1;
        }
    }

    /// Records a regularizer sub-step skipped for a non-finite penalty.
    pub fn record_skipped_regularizer(&mut self, which: &'static str) {
        self.skipped_regularizer_steps += 1;
        tracing::warn!(regularizer = which, "regularizer sub-step skipped: non-finite penalty");
    }

    /// The recorded scalar history (empty when collection is disabled).
    #[must_use]
    pub fn history(&self) -> &[IterationScalars] {
        &self.history
    }

    /// Number of optimizer steps that needed gradient sanitization.
    #[must_use]
    pub fn sanitized_gradient_steps(&self) -> u64 {
        self.sanitized_gradient_steps
    }

    /// Number of regularizer sub-steps skipped after a NaN penalty.
    #[must_use]
    pub fn skipped_regularizer_steps(&self) -> u64 {
        self.skipped_regularizer_steps
    }

    /// Aggregates the recorded history and counters.
    #[must_use]
    pub fn statistics(&self) -> TrainingStatistics {
        let iterations = self.history.len();
        let (mut g_sum, mut c_sum) = (0.0f64, 0.0f64);
        for row in &self.history {
            g_sum += f64::from(row.generator_loss);
            c_sum += f64::from(row.critic_loss);
        }
        let denom = iterations.max(1) as f64;
        TrainingStatistics {
            iterations,
            mean_generator_loss: (g_sum / denom) as f32,
            mean_critic_loss: (c_sum / denom) as f32,
            sanitized_gradient_entries: self.sanitized_gradient_entries,
            sanitized_gradient_steps: self.sanitized_gradient_steps,
            skipped_regularizer_steps: self.skipped_regularizer_steps,
        }
    }
}
