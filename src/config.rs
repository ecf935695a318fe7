//! Configuration for the adversarial training orchestrator.
//!
//! The configuration system follows three rules:
//!
//! - **Serializable**: load/save from TOML, so a run's hyperparameters can
//!   be versioned next to its checkpoints.
//! - **Validated**: invalid settings (a zero cadence interval, a decay
//!   outside `(0,1)`) are rejected by [`TrainerConfig::validate`] before any
//!   training iteration runs.
//! - **Fixed for a run**: cadence intervals are never mutated after
//!   construction; changing them requires a new run.
//!
//! # Example
//!
//! ```rust
//! use adversarial_trainer_rs::config::TrainerConfig;
//!
//! let config = TrainerConfig::builder()
//!     .batch_size(8)
//!     .generator_reg_interval(4)
//!     .critic_reg_interval(16)
//!     .ema_decay(0.995)
//!     .build();
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{TrainResult, TrainingError};

/// Main configuration for the adversarial trainer.
///
/// # Defaults
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `batch_size` | 16 | Latent batch size per iteration |
/// | `latent_dim` | 512 | Generator latent dimensionality |
/// | `style_mixing_prob` | 0.9 | Probability of two-latent style mixing |
/// | `generator_reg_interval` | 4 | Path-length penalty cadence |
/// | `critic_reg_interval` | 16 | Gradient penalty cadence |
/// | `ema_decay` | 0.995 | Shadow parameter decay |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Number of latent samples drawn per generator/critic step.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Dimensionality of the generator's latent space.
    #[serde(default = "default_latent_dim")]
    pub latent_dim: usize,

    /// Probability of assembling the style code from two latents split at a
    /// random crossover layer.
    #[serde(default = "default_style_mixing_prob")]
    pub style_mixing_prob: f32,

    /// Learning rate for the generator optimizer.
    #[serde(default = "default_lr")]
    pub lr_generator: f64,

    /// Learning rate for the critic optimizer(s).
    #[serde(default = "default_lr")]
    pub lr_critic: f64,

    /// Decay rate for the shadow (EMA) generator parameters. Must lie in
    /// `(0, 1)`.
    #[serde(default = "default_ema_decay")]
    pub ema_decay: f64,

    /// Generator regularization fires on iterations where
    /// `(step + 1) % interval == 0`. Must be positive.
    #[serde(default = "default_generator_reg_interval")]
    pub generator_reg_interval: u64,

    /// Generator regularization is disabled until `step > warmup`.
    #[serde(default)]
    pub generator_reg_warmup: u64,

    /// Critic regularization fires on iterations where
    /// `(step + 1) % interval == 0`. Must be positive.
    #[serde(default = "default_critic_reg_interval")]
    pub critic_reg_interval: u64,

    /// Adaptive augmentation controller settings.
    #[serde(default)]
    pub ada: AdaConfig,

    /// Path-length penalty settings.
    #[serde(default)]
    pub path_length: PathLengthConfig,

    /// Gradient penalty settings.
    #[serde(default)]
    pub gradient_penalty: GradientPenaltyConfig,

    /// Patch critic settings (used only when a patch critic is configured).
    #[serde(default)]
    pub patch: PatchConfig,

    /// Whether to retain per-iteration scalar history in the metrics
    /// collector. Counters for non-fatal numerical events are kept either
    /// way.
    #[serde(default = "default_collect_metrics")]
    pub collect_metrics: bool,
}

fn default_batch_size() -> usize {
    16
}
fn default_latent_dim() -> usize {
    512
}
fn default_style_mixing_prob() -> f32 {
    0.9
}
fn default_lr() -> f64 {
    0.002
}
fn default_ema_decay() -> f64 {
    0.995
}
fn default_generator_reg_interval() -> u64 {
    4
}
fn default_critic_reg_interval() -> u64 {
    16
}
fn default_collect_metrics() -> bool {
    true
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            latent_dim: default_latent_dim(),
            style_mixing_prob: default_style_mixing_prob(),
            lr_generator: default_lr(),
            lr_critic: default_lr(),
            ema_decay: default_ema_decay(),
            generator_reg_interval: default_generator_reg_interval(),
            generator_reg_warmup: 0,
            critic_reg_interval: default_critic_reg_interval(),
            ada: AdaConfig::default(),
            path_length: PathLengthConfig::default(),
            gradient_penalty: GradientPenaltyConfig::default(),
            patch: PatchConfig::default(),
            collect_metrics: default_collect_metrics(),
        }
    }
}

impl TrainerConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> TrainerConfigBuilder {
        TrainerConfigBuilder::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> TrainResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TrainingError::config(format!("failed to read config file: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| TrainingError::config(format!("failed to parse config: {e}")))
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if serialization or writing fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> TrainResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TrainingError::config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| TrainingError::config(format!("failed to write config file: {e}")))
    }

    /// Validates the configuration.
    ///
    /// All cadence intervals must be positive, decays and probabilities must
    /// lie in their documented ranges, and patch geometry must be non-empty.
    /// Called by the trainer constructor; invalid configurations never reach
    /// a training iteration.
    ///
    /// # Errors
    ///
    /// Returns a [`TrainingError::Config`] naming the offending field.
    pub fn validate(&self) -> TrainResult<()> {
        if self.batch_size == 0 {
            return Err(TrainingError::config("batch_size must be > 0"));
        }
        if self.latent_dim == 0 {
            return Err(TrainingError::config("latent_dim must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.style_mixing_prob) {
            return Err(TrainingError::config("style_mixing_prob must be in [0, 1]"));
        }
        if self.lr_generator <= 0.0 || self.lr_critic <= 0.0 {
            return Err(TrainingError::config("learning rates must be > 0"));
        }
        if self.ema_decay <= 0.0 || self.ema_decay >= 1.0 {
            return Err(TrainingError::config("ema_decay must be in (0, 1)"));
        }
        if self.generator_reg_interval == 0 {
            return Err(TrainingError::config("generator_reg_interval must be > 0"));
        }
        if self.critic_reg_interval == 0 {
            return Err(TrainingError::config("critic_reg_interval must be > 0"));
        }
        self.ada.validate()?;
        self.path_length.validate()?;
        self.gradient_penalty.validate()?;
        self.patch.validate()?;
        Ok(())
    }
}

/// Builder for [`TrainerConfig`].
#[derive(Debug, Default)]
pub struct TrainerConfigBuilder {
    batch_size: Option<usize>,
    latent_dim: Option<usize>,
    style_mixing_prob: Option<f32>,
    lr_generator: Option<f64>,
    lr_critic: Option<f64>,
    ema_decay: Option<f64>,
    generator_reg_interval: Option<u64>,
    generator_reg_warmup: Option<u64>,
    critic_reg_interval: Option<u64>,
    ada: Option<AdaConfig>,
    path_length: Option<PathLengthConfig>,
    gradient_penalty: Option<GradientPenaltyConfig>,
    patch: Option<PatchConfig>,
    collect_metrics: Option<bool>,
}

impl TrainerConfigBuilder {
    /// Sets the latent batch size.
    #[must_use]
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = Some(n);
        self
    }

    /// Sets the latent dimensionality.
    #[must_use]
    pub fn latent_dim(mut self, n: usize) -> Self {
        self.latent_dim = Some(n);
        self
    }

    /// Sets the style mixing probability.
    #[must_use]
    pub fn style_mixing_prob(mut self, p: f32) -> Self {
        self.style_mixing_prob = Some(p);
        self
    }

    /// Sets the generator learning rate.
    #[must_use]
    pub fn lr_generator(mut self, lr: f64) -> Self {
        self.lr_generator = Some(lr);
        self
    }

    /// Sets the critic learning rate.
    #[must_use]
    pub fn lr_critic(mut self, lr: f64) -> Self {
        self.lr_critic = Some(lr);
        self
    }

    /// Sets the EMA decay for shadow parameters.
    #[must_use]
    pub fn ema_decay(mut self, decay: f64) -> Self {
        self.ema_decay = Some(decay);
        self
    }

    /// Sets the generator regularization interval.
    #[must_use]
    pub fn generator_reg_interval(mut self, interval: u64) -> Self {
        self.generator_reg_interval = Some(interval);
        self
    }

    /// Sets the generator regularization warm-up threshold.
    #[must_use]
    pub fn generator_reg_warmup(mut self, warmup: u64) -> Self {
        self.generator_reg_warmup = Some(warmup);
        self
    }

    /// Sets the critic regularization interval.
    #[must_use]
    pub fn critic_reg_interval(mut self, interval: u64) -> Self {
        self.critic_reg_interval = Some(interval);
        self
    }

    /// Sets the adaptive augmentation configuration.
    #[must_use]
    pub fn ada(mut self, ada: AdaConfig) -> Self {
        self.ada = Some(ada);
        self
    }

    /// Sets the path-length penalty configuration.
    #[must_use]
    pub fn path_length(mut self, plp: PathLengthConfig) -> Self {
        self.path_length = Some(plp);
        self
    }

    /// Sets the gradient penalty configuration.
    #[must_use]
    pub fn gradient_penalty(mut self, gp: GradientPenaltyConfig) -> Self {
        self.gradient_penalty = Some(gp);
        self
    }

    /// Sets the patch critic configuration.
    #[must_use]
    pub fn patch(mut self, patch: PatchConfig) -> Self {
        self.patch = Some(patch);
        self
    }

    /// Sets whether scalar history is retained.
    #[must_use]
    pub fn collect_metrics(mut self, collect: bool) -> Self {
        self.collect_metrics = Some(collect);
        self
    }

    /// Builds the configuration with defaults for unset values.
    #[must_use]
    pub fn build(self) -> TrainerConfig {
        TrainerConfig {
            batch_size: self.batch_size.unwrap_or_else(default_batch_size),
            latent_dim: self.latent_dim.unwrap_or_else(default_latent_dim),
            style_mixing_prob: self
                .style_mixing_prob
                .unwrap_or_else(default_style_mixing_prob),
            lr_generator: self.lr_generator.unwrap_or_else(default_lr),
            lr_critic: self.lr_critic.unwrap_or_else(default_lr),
            ema_decay: self.ema_decay.unwrap_or_else(default_ema_decay),
            generator_reg_interval: self
                .generator_reg_interval
                .unwrap_or_else(default_generator_reg_interval),
            generator_reg_warmup: self.generator_reg_warmup.unwrap_or(0),
            critic_reg_interval: self
                .critic_reg_interval
                .unwrap_or_else(default_critic_reg_interval),
            ada: self.ada.unwrap_or_default(),
            path_length: self.path_length.unwrap_or_default(),
            gradient_penalty: self.gradient_penalty.unwrap_or_default(),
            patch: self.patch.unwrap_or_default(),
            collect_metrics: self.collect_metrics.unwrap_or_else(default_collect_metrics),
        }
    }
}

/// Adaptive augmentation (ADA) controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaConfig {
    /// When `true`, the augmentation probability is pinned to
    /// `initial_probability` and the controller is inert.
    #[serde(default)]
    pub fixed: bool,

    /// Starting augmentation probability, in `[0, 1]`.
    #[serde(default)]
    pub initial_probability: f32,

    /// Target fraction of real-sample critic outputs with positive sign.
    #[serde(default = "default_ada_target")]
    pub target: f32,

    /// Controller update cadence in iterations. Must be positive.
    #[serde(default = "default_ada_interval")]
    pub interval: u64,

    /// Per-iteration adjustment speed; the probability moves by
    /// `speed * interval` each time the cadence fires.
    #[serde(default = "default_ada_speed")]
    pub speed: f32,
}

fn default_ada_target() -> f32 {
    0.6
}
fn default_ada_interval() -> u64 {
    4
}
fn default_ada_speed() -> f32 {
    1e-4
}

impl Default for AdaConfig {
    fn default() -> Self {
        Self {
            fixed: false,
            initial_probability: 0.0,
            target: default_ada_target(),
            interval: default_ada_interval(),
            speed: default_ada_speed(),
        }
    }
}

impl AdaConfig {
    fn validate(&self) -> TrainResult<()> {
        if !(0.0..=1.0).contains(&self.initial_probability) {
            return Err(TrainingError::config(
                "ada.initial_probability must be in [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.target) {
            return Err(TrainingError::config("ada.target must be in [0, 1]"));
        }
        if self.interval == 0 {
            return Err(TrainingError::config("ada.interval must be > 0"));
        }
        if self.speed <= 0.0 {
            return Err(TrainingError::config("ada.speed must be > 0"));
        }
        Ok(())
    }
}

/// Path-length penalty settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathLengthConfig {
    /// Loss weight applied to the penalty (before interval scaling).
    #[serde(default = "default_plp_weight")]
    pub weight: f64,

    /// Decay of the running target norm: `target += decay * (measured - target)`.
    #[serde(default = "default_plp_decay")]
    pub decay: f64,

    /// Divisor applied to the batch size for the penalty's latent batch.
    #[serde(default = "default_plp_batch_shrink")]
    pub batch_shrink: usize,
}

fn default_plp_weight() -> f64 {
    2.0
}
fn default_plp_decay() -> f64 {
    0.01
}
fn default_plp_batch_shrink() -> usize {
    2
}

impl Default for PathLengthConfig {
    fn default() -> Self {
        Self {
            weight: default_plp_weight(),
            decay: default_plp_decay(),
            batch_shrink: default_plp_batch_shrink(),
        }
    }
}

impl PathLengthConfig {
    fn validate(&self) -> TrainResult<()> {
        if self.weight < 0.0 {
            return Err(TrainingError::config("path_length.weight must be >= 0"));
        }
        if self.decay <= 0.0 || self.decay > 1.0 {
            return Err(TrainingError::config("path_length.decay must be in (0, 1]"));
        }
        if self.batch_shrink == 0 {
            return Err(TrainingError::config(
                "path_length.batch_shrink must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Gradient penalty settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientPenaltyConfig {
    /// Loss weight applied to the penalty (before interval scaling).
    #[serde(default = "default_gp_weight")]
    pub weight: f64,
}

fn default_gp_weight() -> f64 {
    1.0
}

impl Default for GradientPenaltyConfig {
    fn default() -> Self {
        Self {
            weight: default_gp_weight(),
        }
    }
}

impl GradientPenaltyConfig {
    fn validate(&self) -> TrainResult<()> {
        if self.weight < 0.0 {
            return Err(TrainingError::config("gradient_penalty.weight must be >= 0"));
        }
        Ok(())
    }
}

/// Patch critic settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfig {
    /// Side length of each square patch in pixels.
    #[serde(default = "default_patch_size")]
    pub size: usize,

    /// Number of patches sampled per image.
    #[serde(default = "default_patch_count")]
    pub count: usize,

    /// Weight of the patch-critic term in the generator loss.
    #[serde(default = "default_lambda_patch")]
    pub lambda_patch: f64,
}

fn default_patch_size() -> usize {
    64
}
fn default_patch_count() -> usize {
    4
}
fn default_lambda_patch() -> f64 {
    1.0
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            size: default_patch_size(),
            count: default_patch_count(),
            lambda_patch: default_lambda_patch(),
        }
    }
}

impl PatchConfig {
    fn validate(&self) -> TrainResult<()> {
        if self.size == 0 {
            return Err(TrainingError::config("patch.size must be > 0"));
        }
        if self.count == 0 {
            return Err(TrainingError::config("patch.count must be > 0"));
        }
        if self.lambda_patch < 0.0 {
            return Err(TrainingError::config("patch.lambda_patch must be >= 0"));
        }
        Ok(())
    }
}
