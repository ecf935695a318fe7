//! Named module/optimizer bindings.
//!
//! Every sub-step the scheduler runs updates exactly one trainable module
//! through exactly one optimizer. The pairing is fixed once at setup as an
//! explicit [`ModuleOptimizer`] binding, never resolved positionally at
//! call time, so a sub-step can never step the wrong parameter set.
//!
//! Each binding owns the backward pass for its losses: gradients are
//! computed, sanitized (NaN → 0, Inf clamped), and applied in one call, so
//! no optimizer step can consume unsanitized gradients.

use candle_core::Var;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};

use crate::error::TrainResult;
use crate::regularizer::sanitize_gradients;

/// A trainable module's parameter set bound to its optimizer.
pub struct ModuleOptimizer {
    name: &'static str,
    vars: Vec<Var>,
    optimizer: AdamW,
}

impl ModuleOptimizer {
    /// Binds `vars` to a fresh Adam optimizer.
    ///
    /// Uses `beta1 = 0.0, beta2 = 0.99`; momentum-free first moments keep
    /// the lazily-regularized updates from smearing across sub-steps.
    ///
    /// # Errors
    ///
    /// Returns a tensor error if the optimizer rejects the parameter set.
    pub fn new(name: &'static str, vars: Vec<Var>, learning_rate: f64) -> TrainResult<Self> {
        let params = ParamsAdamW {
            lr: learning_rate,
            beta1: 0.0,
            beta2: 0.99,
            eps: 1e-8,
            weight_decay: 0.0,
        };
        let optimizer = AdamW::new(vars.clone(), params)?;
        Ok(Self {
            name,
            vars,
            optimizer,
        })
    }

    /// The sub-step name this binding serves.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The bound parameter set.
    #[must_use]
    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    /// Current learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    /// Adjusts the learning rate (for external schedules).
    pub fn set_learning_rate(&mut self, lr: f64) {
        self.optimizer.set_learning_rate(lr);
    }

    /// Backpropagates `loss`, sanitizes the gradients of the bound
    /// parameters, and applies the optimizer update.
    ///
    /// Returns the number of gradient entries that had to be rewritten, so
    /// the caller can record the event.
    ///
    /// # Errors
    ///
    /// Returns a tensor error if backpropagation or the update fails.
    pub fn backward_step(&mut self, loss: &candle_core::Tensor) -> TrainResult<usize> {
        let mut grads = loss.backward()?;
        let rewritten = sanitize_gradients(&mut grads, &self.vars)?;
        if rewritten > 0 {
            tracing::warn!(
                module = self.name,
                entries = rewritten,
                "sanitized non-finite gradient entries before optimizer step"
            );
        }
        self.optimizer.step(&grads)?;
        Ok(rewritten)
    }
}

impl std::fmt::Debug for ModuleOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleOptimizer")
            .field("name", &self.name)
            .field("params", &self.vars.len())
            .field("lr", &self.learning_rate())
            .finish()
    }
}
