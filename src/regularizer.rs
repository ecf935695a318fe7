//! Lazily-scheduled regularizers and gradient sanitization.
//!
//! Both regularizers run on their own cadences rather than every step, so
//! their losses are scaled by the interval length to keep the expected
//! per-step magnitude comparable to running them every iteration (the
//! caller applies that scaling; see [`crate::AdversarialTrainer`]).
//!
//! Numerical failure policy, in order of severity:
//!
//! - Adversarial-step gradients containing NaN/Inf are **sanitized** in
//!   place before the optimizer consumes them; skipping the main step
//!   would stall training.
//! - A NaN *path-length* measurement **skips** that sub-step entirely; a
//!   zero division in the Jacobian estimate is expected on degenerate
//!   batches and must not move the running target.

use candle_core::backprop::GradStore;
use candle_core::{DType, Tensor, Var};

use crate::config::PathLengthConfig;
use crate::error::{TrainResult, TrainingError};

/// Finite bound substituted for infinite gradient entries.
pub const GRAD_CLAMP_BOUND: f64 = 1e5;

/// Replaces NaN gradient entries with 0 and clamps entries outside
/// `±`[`GRAD_CLAMP_BOUND`] before an optimizer step.
///
/// Only entries for the given variables are touched; untracked gradients in
/// the store are left alone. Returns the number of entries that were
/// rewritten so callers can count and log the event.
///
/// # Errors
///
/// Returns a tensor error if a mask or clamp operation fails.
pub fn sanitize_gradients(grads: &mut GradStore, vars: &[Var]) -> TrainResult<usize> {
    let mut rewritten = 0usize;
    for var in vars {
        let Some(grad) = grads.get(var) else {
            continue;
        };
        let nan_mask = grad.ne(grad)?;
        let oversized = grad.abs()?.gt(GRAD_CLAMP_BOUND)?;
        // One host read-back per parameter; the count is what makes repeated
        // instability diagnosable without halting the run.
        let bad = (nan_mask.to_dtype(DType::F32)?.sum_all()?
            + oversized.to_dtype(DType::F32)?.sum_all()?)?
        .to_scalar::<f32>()?;
        if bad > 0.0 {
            let zeros = grad.zeros_like()?;
            let cleaned = nan_mask
                .where_cond(&zeros, grad)?
                .clamp(-GRAD_CLAMP_BOUND, GRAD_CLAMP_BOUND)?;
            grads.insert(var, cleaned);
            rewritten += bad as usize;
        }
    }
    Ok(rewritten)
}

/// Zero-centered gradient penalty on the critic.
///
/// Scores the input batch through `score_fn`, backprops the score sum to
/// the input image, and returns the mean squared per-sample gradient norm.
/// Discourages sharp score gradients near the real-data manifold.
///
/// The input is re-wrapped as a fresh [`Var`] so the gradient is taken with
/// respect to the image itself, not whatever produced it.
///
/// # Errors
///
/// Returns [`TrainingError::MissingGradient`] if `score_fn` never touched
/// the traced input, or a tensor error from the backend.
pub fn gradient_penalty<F>(images: &Tensor, score_fn: F) -> TrainResult<Tensor>
where
    F: FnOnce(&Tensor) -> TrainResult<Tensor>,
{
    let input = Var::from_tensor(&images.detach())?;
    let scores = score_fn(input.as_tensor())?;
    let grads = scores.sum_all()?.backward()?;
    let grad = grads.get(&input).ok_or(TrainingError::MissingGradient {
        what: "critic input image",
    })?;
    let per_sample = grad.sqr()?.flatten_from(1)?.sum(1)?;
    Ok(per_sample.mean_all()?)
}

/// Path-length regularizer for the generator.
///
/// Perturbs the rendered image with unit Gaussian noise scaled by
/// `1/sqrt(H*W)`, measures the Jacobian-vector-product magnitude between
/// the style code and the image, and penalizes squared deviation from a
/// running target norm. The target follows measurements with
/// `target += decay * (measured - target)` and seeds itself on the first
/// finite measurement.
#[derive(Debug)]
pub struct PathLengthPenalty {
    decay: f64,
    batch_shrink: usize,
    target: Option<f64>,
}

impl PathLengthPenalty {
    /// Builds the regularizer from a validated configuration.
    #[must_use]
    pub fn new(config: &PathLengthConfig) -> Self {
        Self {
            decay: config.decay,
            batch_shrink: config.batch_shrink,
            target: None,
        }
    }

    /// Divisor applied to the latent batch size when this penalty runs.
    #[must_use]
    pub fn batch_shrink(&self) -> usize {
        self.batch_shrink
    }

    /// The current running target norm, `None` before the first finite
    /// measurement.
    #[must_use]
    pub fn target(&self) -> Option<f64> {
        self.target
    }

    /// Restores a running target from a checkpoint.
    pub fn set_target(&mut self, target: Option<f64>) {
        self.target = target;
    }

    /// Computes the penalty for a rendered image batch against the style
    /// code it was synthesized from.
    ///
    /// `styles` must be the [`Var`] the synthesis pass actually consumed,
    /// so the style-space gradient exists in the backward graph.
    ///
    /// Returns `Ok(None)`, leaving the running target untouched, when
    /// the measured path length is not finite. This is the one place a NaN
    /// is dropped rather than sanitized.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::MissingGradient`] if the image does not
    /// depend on `styles`, or a tensor error from the backend.
    pub fn penalty(&mut self, images: &Tensor, styles: &Var) -> TrainResult<Option<Tensor>> {
        let (_batch, _channels, height, width) = images.dims4()?;
        let scale = 1.0 / ((height * width) as f64).sqrt();
        let noise = (images.randn_like(0.0, 1.0)? * scale)?;

        let grads = images.mul(&noise)?.sum_all()?.backward()?;
        let grad = grads.get(styles).ok_or(TrainingError::MissingGradient {
            what: "style code",
        })?;
        let lengths = grad.sqr()?.flatten_from(1)?.sum(1)?.sqrt()?;

        let measured = f64::from(lengths.mean_all()?.to_scalar::<f32>()?);
        if !measured.is_finite() {
            return Ok(None);
        }

        let target = self.target.unwrap_or(measured);
        let penalty = lengths.affine(1.0, -target)?.sqr()?.mean_all()?;
        self.target = Some(target + self.decay * (measured - target));
        Ok(Some(penalty))
    }
}
