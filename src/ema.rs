//! Shadow (exponential-moving-average) parameter tracking.
//!
//! The shadow set is an exponentially-averaged snapshot of the generator's
//! live parameters, updated once per iteration right after the generator
//! optimizer step:
//!
//! ```text
//! shadow = shadow + (1 - decay) * (live - shadow)
//! ```
//!
//! The smoothed weights are typically higher quality for inference than the
//! live, noisier training weights, so evaluation and export run under the
//! shadow values via the `store` → `copy_to` → `restore` swap. The swap
//! must be exception-safe: [`ParameterEma::with_shadow`] restores the live
//! values even when the evaluation closure fails.
//!
//! Shadow tensors carry no autograd history (every update detaches its
//! result) and persist independently of optimizer state as a safetensors
//! file, so training can resume from a saved snapshot and replace the
//! current shadow entirely.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor, Var};

use crate::error::{TrainResult, TrainingError};

/// Exponential moving average over a set of named parameters.
///
/// The shadow set is lazily initialized: the first `update` for a parameter
/// name seeds its shadow with the live value.
#[derive(Debug)]
pub struct ParameterEma {
    decay: f64,
    shadow: HashMap<String, Tensor>,
    stored: Option<HashMap<String, Tensor>>,
    num_updates: u64,
}

impl ParameterEma {
    /// Creates a tracker with the given decay rate.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless `decay` lies in `(0, 1)`.
    pub fn new(decay: f64) -> TrainResult<Self> {
        if decay <= 0.0 || decay >= 1.0 {
            return Err(TrainingError::config("ema decay must be in (0, 1)"));
        }
        Ok(Self {
            decay,
            shadow: HashMap::new(),
            stored: None,
            num_updates: 0,
        })
    }

    /// The configured decay rate.
    #[must_use]
    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Number of `update` calls performed.
    #[must_use]
    pub fn num_updates(&self) -> u64 {
        self.num_updates
    }

    /// Number of tracked parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shadow.len()
    }

    /// Returns whether the shadow set is still empty (no update yet).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shadow.is_empty()
    }

    /// Read access to the shadow tensors, e.g. for checkpoint collaborators.
    #[must_use]
    pub fn shadow_tensors(&self) -> &HashMap<String, Tensor> {
        &self.shadow
    }

    /// Moves every shadow parameter toward its live counterpart.
    ///
    /// Parameters seen for the first time are seeded with a detached copy
    /// of the live value. Results are detached so the shadow never
    /// accumulates autograd history across iterations.
    ///
    /// # Errors
    ///
    /// Returns a tensor error on shape mismatch or backend failure.
    pub fn update(&mut self, params: &[(String, Var)]) -> TrainResult<()> {
        for (name, var) in params {
            let live = var.as_tensor();
            match self.shadow.get(name) {
                None => {
                    self.shadow.insert(name.clone(), live.copy()?);
                }
                Some(shadow) => {
                    let delta = (live - shadow)?;
                    let updated = (shadow + (delta * (1.0 - self.decay))?)?.detach();
                    self.shadow.insert(name.clone(), updated);
                }
            }
        }
        self.num_updates += 1;
        Ok(())
    }

    /// Saves the current live parameter values aside for a later
    /// [`restore`](Self::restore).
    ///
    /// # Errors
    ///
    /// Returns a tensor error if a live value cannot be copied.
    pub fn store(&mut self, params: &[(String, Var)]) -> TrainResult<()> {
        let mut stored = HashMap::with_capacity(params.len());
        for (name, var) in params {
            stored.insert(name.clone(), var.as_tensor().copy()?);
        }
        self.stored = Some(stored);
        Ok(())
    }

    /// Overwrites the live parameters with the shadow values.
    ///
    /// # Errors
    ///
    /// Returns a shadow-parameter error if a parameter has no shadow entry,
    /// or a tensor error if the copy fails.
    pub fn copy_to(&self, params: &[(String, Var)]) -> TrainResult<()> {
        for (name, var) in params {
            let shadow = self.shadow.get(name).ok_or_else(|| {
                TrainingError::ShadowParameter {
                    detail: format!("no shadow entry for parameter `{name}`"),
                }
            })?;
            var.set(shadow)?;
        }
        Ok(())
    }

    /// Reinstates the live values saved by the last [`store`](Self::store).
    ///
    /// # Errors
    ///
    /// Returns a shadow-parameter error if `store` was not called first or
    /// if a stored entry is missing.
    pub fn restore(&mut self, params: &[(String, Var)]) -> TrainResult<()> {
        let stored = self.stored.take().ok_or(TrainingError::ShadowParameter {
            detail: "restore called without a prior store".to_string(),
        })?;
        for (name, var) in params {
            let saved = stored.get(name).ok_or_else(|| TrainingError::ShadowParameter {
                detail: format!("no stored value for parameter `{name}`"),
            })?;
            var.set(saved)?;
        }
        Ok(())
    }

    /// Runs `f` with the live parameters temporarily replaced by the shadow
    /// values, restoring the live values afterwards even if `f` fails.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error if it fails (restoration still runs);
    /// otherwise any store/copy/restore failure.
    pub fn with_shadow<T>(
        &mut self,
        params: &[(String, Var)],
        f: impl FnOnce() -> TrainResult<T>,
    ) -> TrainResult<T> {
        self.store(params)?;
        self.copy_to(params)?;
        let result = f();
        let restored = self.restore(params);
        match result {
            Ok(value) => restored.map(|()| value),
            // The closure's failure is the interesting one; restoration ran
            // regardless and its error (if any) is dropped in its favor.
            Err(e) => Err(e),
        }
    }

    /// Writes the shadow set to a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error if the shadow set is empty, or a tensor
    /// error on I/O failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TrainResult<()> {
        if self.shadow.is_empty() {
            return Err(TrainingError::checkpoint(
                "refusing to save an empty shadow parameter set",
            ));
        }
        candle_core::safetensors::save(&self.shadow, path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), params = self.shadow.len(), "shadow parameters saved");
        Ok(())
    }

    /// Loads a shadow set from a safetensors file and installs it,
    /// replacing the current shadow entirely.
    ///
    /// # Errors
    ///
    /// Returns a tensor error if the file cannot be read.
    pub fn load<P: AsRef<Path>>(&mut self, path: P, device: &Device) -> TrainResult<()> {
        let loaded = candle_core::safetensors::load(path.as_ref(), device)?;
        tracing::info!(path = %path.as_ref().display(), params = loaded.len(), "shadow parameters loaded");
        self.replace(loaded);
        Ok(())
    }

    /// Installs `shadow` wholesale, discarding the current shadow set.
    pub fn replace(&mut self, shadow: HashMap<String, Tensor>) {
        self.shadow = shadow;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn named_var(name: &str, values: &[f32]) -> (String, Var) {
        let t = Tensor::new(values, &Device::Cpu).unwrap();
        (name.to_string(), Var::from_tensor(&t).unwrap())
    }

    #[test]
    fn test_decay_range_enforced() {
        assert!(ParameterEma::new(0.0).is_err());
        assert!(ParameterEma::new(1.0).is_err());
        assert!(ParameterEma::new(0.995).is_ok());
    }

    #[test]
    fn test_first_update_seeds_shadow_with_live() {
        let mut ema = ParameterEma::new(0.5).unwrap();
        let params = vec![named_var("w", &[2.0, -3.0])];
        ema.update(&params).unwrap();
        let shadow = ema.shadow_tensors().get("w").unwrap();
        assert_eq!(shadow.to_vec1::<f32>().unwrap(), vec![2.0, -3.0]);
    }

    #[test]
    fn test_shadow_converges_monotonically_without_overshoot() {
        let mut ema = ParameterEma::new(0.9).unwrap();
        let zero = vec![named_var("w", &[0.0])];
        ema.update(&zero).unwrap();

        // Hold the live value constant at 1.0 and watch the shadow climb.
        let target = vec![named_var("w", &[1.0])];
        let mut previous = 0.0f32;
        for _ in 0..200 {
            ema.update(&target).unwrap();
            let current = ema.shadow_tensors().get("w").unwrap().to_vec1::<f32>().unwrap()[0];
            assert!(current >= previous, "shadow regressed: {current} < {previous}");
            assert!(current <= 1.0, "shadow overshot the live value: {current}");
            previous = current;
        }
        assert!(previous > 0.99, "shadow failed to approach the live value");
    }

    #[test]
    fn test_store_copy_restore_is_identity() {
        let mut ema = ParameterEma::new(0.5).unwrap();
        let params = vec![named_var("w", &[1.5, -2.5, 0.125])];
        // Give the shadow a very different value than the live weights.
        ema.update(&params).unwrap();
        params[0].1.set(&Tensor::new(&[9.0f32, 8.0, 7.0], &Device::Cpu).unwrap()).unwrap();
        ema.update(&params).unwrap();

        let before = params[0].1.as_tensor().to_vec1::<f32>().unwrap();
        ema.store(&params).unwrap();
        ema.copy_to(&params).unwrap();
        let swapped = params[0].1.as_tensor().to_vec1::<f32>().unwrap();
        assert_ne!(before, swapped, "copy_to should change the live values");
        ema.restore(&params).unwrap();
        let after = params[0].1.as_tensor().to_vec1::<f32>().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_restore_without_store_fails() {
        let mut ema = ParameterEma::new(0.5).unwrap();
        let params = vec![named_var("w", &[1.0])];
        ema.update(&params).unwrap();
        assert!(matches!(
            ema.restore(&params),
            Err(TrainingError::ShadowParameter { .. })
        ));
    }

    #[test]
    fn test_with_shadow_restores_on_failure() {
        let mut ema = ParameterEma::new(0.5).unwrap();
        let params = vec![named_var("w", &[4.0])];
        ema.update(&params).unwrap();
        params[0].1.set(&Tensor::new(&[6.0f32], &Device::Cpu).unwrap()).unwrap();

        let result: TrainResult<()> = ema.with_shadow(&params, || {
            Err(TrainingError::checkpoint("evaluation exploded"))
        });
        assert!(result.is_err());
        // Live value must be back despite the failure.
        assert_eq!(params[0].1.as_tensor().to_vec1::<f32>().unwrap(), vec![6.0]);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow.safetensors");

        let mut ema = ParameterEma::new(0.5).unwrap();
        let params = vec![named_var("w", &[1.0, 2.0]), named_var("b", &[0.5])];
        ema.update(&params).unwrap();
        ema.save(&path).unwrap();

        let mut resumed = ParameterEma::new(0.5).unwrap();
        resumed.load(&path, &Device::Cpu).unwrap();
        assert_eq!(resumed.len(), 2);
        assert_eq!(
            resumed.shadow_tensors().get("w").unwrap().to_vec1::<f32>().unwrap(),
            vec![1.0, 2.0]
        );
        assert_eq!(
            resumed.shadow_tensors().get("w").unwrap().dtype(),
            DType::F32
        );
    }

    #[test]
    fn test_empty_save_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ema = ParameterEma::new(0.5).unwrap();
        assert!(ema.save(dir.path().join("empty.safetensors")).is_err());
    }
}
