//! Error types for the adversarial training orchestrator.
//!
//! The error taxonomy mirrors how failures are handled at runtime:
//!
//! - **Numerical instability** in adversarial-step gradients is never
//!   surfaced as an error at all; it is sanitized in place (see
//!   [`crate::regularizer::sanitize_gradients`]) and counted.
//! - **Degenerate regularizer input** (a NaN penalty) skips only that
//!   sub-step; the iteration continues and the event is counted.
//! - **Insufficient valid sampling region** is a hard error: silently
//!   reducing the patch count would invalidate downstream shape
//!   assumptions, so the caller must decide.
//! - **Configuration errors** are rejected at construction time and never
//!   occur mid-iteration.
//!
//! Everything the tensor backend can fail with is forwarded transparently
//! through the [`TrainingError::Tensor`] variant, so `?` composes across
//! the whole crate.

use thiserror::Error;

/// The main error type for the adversarial trainer.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// The patch sampler could not find enough valid patch centers.
    ///
    /// Raised when an image's mask region is too small or too thin for the
    /// requested patch count and size. Callers must guarantee masks are
    /// large enough, or reduce `count`/`size`; the trainer never guesses a
    /// smaller count on its own.
    #[error("insufficient valid region in image {image_index}: {available} valid patch centers for {requested} requested patches")]
    InsufficientValidRegion {
        /// Index of the offending image within the batch.
        image_index: usize,
        /// Number of patches that were requested.
        requested: usize,
        /// Number of valid centers actually available.
        available: usize,
    },

    /// Invalid configuration (bad interval, decay, probability, size, ...).
    #[error("configuration error: {detail}")]
    Config {
        /// Description of the configuration issue.
        detail: String,
    },

    /// Checkpoint save or load failed.
    #[error("checkpoint error: {reason}")]
    Checkpoint {
        /// Description of the checkpoint failure.
        reason: String,
    },

    /// Shadow parameter bookkeeping failed.
    ///
    /// Typically a `restore` without a prior `store`, or a parameter set
    /// that does not line up with the tracked shadow set.
    #[error("shadow parameter error: {detail}")]
    ShadowParameter {
        /// Description of the mismatch.
        detail: String,
    },

    /// A gradient expected from the autograd pass was missing.
    ///
    /// Indicates a detached input or a collaborator whose forward pass did
    /// not involve the traced tensor.
    #[error("missing gradient for {what}")]
    MissingGradient {
        /// What the gradient was expected for.
        what: &'static str,
    },

    /// Error from the tensor backend.
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

impl TrainingError {
    /// Convenience constructor for configuration errors.
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    /// Convenience constructor for checkpoint errors.
    pub fn checkpoint(reason: impl Into<String>) -> Self {
        Self::Checkpoint {
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type TrainResult<T> = Result<T, TrainingError>;
