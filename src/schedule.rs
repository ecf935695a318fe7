//! Cadence arithmetic for lazily-scheduled sub-steps.
//!
//! Every periodic action in the trainer (generator regularization, critic
//! regularization, augmentation updates) is driven by the global step
//! counter alone, never by wall-clock time, so a run is exactly
//! reproducible with respect to *which* iterations performed *which*
//! sub-steps.
//!
//! A [`Cadence`] with interval `N` fires on iteration `step` iff
//! `(step + 1) % N == 0`, optionally gated behind a warm-up threshold
//! (`step > warmup`). With `N = 4`, `warmup = 0` the firing steps are
//! `3, 7, 11, …`: the end of every block of `N` iterations.

use serde::{Deserialize, Serialize};

use crate::config::TrainerConfig;
use crate::error::{TrainResult, TrainingError};

/// A fixed-interval schedule over the global step counter.
///
/// Interval values are fixed for the lifetime of a run; the constructor is
/// the only place they are checked, so an invalid interval can never
/// surface mid-iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    interval: u64,
    warmup: u64,
}

impl Cadence {
    /// Creates a cadence firing every `interval` iterations once
    /// `step > warmup`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `interval` is zero.
    pub fn new(interval: u64, warmup: u64) -> TrainResult<Self> {
        if interval == 0 {
            return Err(TrainingError::config("cadence interval must be > 0"));
        }
        Ok(Self { interval, warmup })
    }

    /// Returns whether the scheduled action runs on iteration `step`.
    #[must_use]
    pub fn fires(&self, step: u64) -> bool {
        step > self.warmup && (step + 1) % self.interval == 0
    }

    /// The cadence interval in iterations.
    #[must_use]
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// The warm-up threshold; the action is disabled until `step` exceeds it.
    #[must_use]
    pub fn warmup(&self) -> u64 {
        self.warmup
    }
}

/// The named cadences the scheduler consults each iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CadenceSchedule {
    /// Generator (path-length) regularization.
    pub generator_reg: Cadence,
    /// Critic (gradient penalty) regularization.
    pub critic_reg: Cadence,
    /// Augmentation controller update.
    pub augment: Cadence,
}

impl CadenceSchedule {
    /// Builds the schedule from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any interval is zero.
    pub fn from_config(config: &TrainerConfig) -> TrainResult<Self> {
        Ok(Self {
            generator_reg: Cadence::new(
                config.generator_reg_interval,
                config.generator_reg_warmup,
            )?,
            critic_reg: Cadence::new(config.critic_reg_interval, 0)?,
            augment: Cadence::new(config.ada.interval, 0)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_rejected() {
        assert!(Cadence::new(0, 0).is_err());
        assert!(Cadence::new(1, 0).is_ok());
    }

    #[test]
    fn test_fires_on_block_boundaries() {
        let cadence = Cadence::new(4, 0).unwrap();
        let fired: Vec<u64> = (0..16).filter(|&s| cadence.fires(s)).collect();
        assert_eq!(fired, vec![3, 7, 11, 15]);
    }

    #[test]
    fn test_firing_count_over_long_run() {
        let cadence = Cadence::new(7, 0).unwrap();
        let count = (0..7000).filter(|&s| cadence.fires(s)).count();
        assert_eq!(count, 1000);
    }

    #[test]
    fn test_warmup_gates_firing() {
        let cadence = Cadence::new(4, 10).unwrap();
        // Step 3, 7 are below the threshold; step 11 is the first firing.
        assert!(!cadence.fires(3));
        assert!(!cadence.fires(7));
        assert!(cadence.fires(11));
        // Warm-up is strict: a step equal to the threshold does not fire.
        let at_boundary = Cadence::new(4, 11).unwrap();
        assert!(!at_boundary.fires(11));
        assert!(at_boundary.fires(15));
    }

    #[test]
    fn test_interval_one_fires_after_warmup() {
        let cadence = Cadence::new(1, 2).unwrap();
        let fired: Vec<u64> = (0..6).filter(|&s| cadence.fires(s)).collect();
        assert_eq!(fired, vec![3, 4, 5]);
    }

    #[test]
    fn test_schedule_from_config() {
        let config = crate::config::TrainerConfig::builder()
            .generator_reg_interval(4)
            .critic_reg_interval(16)
            .build();
        let schedule = CadenceSchedule::from_config(&config).unwrap();
        assert_eq!(schedule.generator_reg.interval(), 4);
        assert_eq!(schedule.critic_reg.interval(), 16);
    }
}
