//! # adversarial-trainer-rs
//!
//! Multi-cadence training orchestrator for a generative-adversarial pair:
//! an image/texture synthesizer and one or two critics, trained with
//! manual, explicitly-sequenced optimization.
//!
//! ## Overview
//!
//! The orchestrator owns the control loop and nothing else. Networks, the
//! differentiable renderer, the augmentation pipeline, and the data
//! pipeline are external collaborators behind traits; the orchestrator
//! sequences their interactions, injects lazily-scheduled regularizers,
//! steers augmentation strength from critic statistics, and maintains a
//! shadow (EMA) copy of the generator parameters for evaluation and export.
//!
//! ## One iteration
//!
//! ```text
//!  ┌────────────────────────────────────────────────────────┐
//!  │ generator adversarial step (full image + patches)      │
//!  │   └─ every Ng steps, past warm-up: path-length penalty │
//!  │ EMA update of shadow generator parameters              │
//!  │ critic adversarial step (records real-score signs)     │
//!  │ patch-critic adversarial step (if configured)          │
//!  │   └─ every Nc steps: gradient penalty per critic       │
//!  │ every Na steps: augmentation probability update        │
//!  │ global_step += 1                                       │
//!  └────────────────────────────────────────────────────────┘
//! ```
//!
//! All cadences are pure functions of `global_step`; nothing in the loop
//! consults the clock, so the decision sequence of a run is reproducible
//! and resumable.
//!
//! ## Failure policy
//!
//! Adversarial-step gradients are sanitized (NaN → 0, Inf clamped) before
//! every optimizer step. A NaN in a *regularizer* penalty skips only that
//! sub-step. An undersized patch sampling region is a hard error: shapes
//! downstream depend on the patch count, so it is never silently reduced.
//! All recovered events are counted by the metrics collector.
//!
//! ## Concurrency model
//!
//! One logical thread of control: sub-steps run strictly sequentially and
//! no sub-step begins before the previous optimizer update completes.
//! Tensor-level parallelism belongs to the backend. Multi-replica training
//! is out of scope; a distributed harness must elect one authoritative
//! copy of the training state and broadcast augmentation-probability
//! changes before the next iteration consumes them.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
// Precision-loss casts are routine in ML numerical code.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]

pub mod ada;
pub mod checkpoint;
pub mod config;
pub mod ema;
pub mod error;
pub mod loss;
pub mod metrics;
pub mod optim;
pub mod patches;
pub mod regularizer;
pub mod schedule;
pub mod state;

pub use ada::{AugmentController, AugmentMode, SignAccumulator};
pub use config::TrainerConfig;
pub use ema::ParameterEma;
pub use error::{TrainResult, TrainingError};
pub use metrics::{IterationScalars, MetricsCollector, TrainingStatistics};
pub use patches::{PatchBatch, PatchSampler};
pub use regularizer::PathLengthPenalty;
pub use schedule::{Cadence, CadenceSchedule};
pub use state::TrainingState;

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor, Var};
use rand::Rng;

use crate::checkpoint::TrainerCheckpoint;
use crate::optim::ModuleOptimizer;

/// File name for the scalar trainer state inside a checkpoint directory.
pub const CHECKPOINT_STATE_FILE: &str = "trainer_state.bin";
/// File name for the EMA shadow set inside a checkpoint directory.
pub const CHECKPOINT_SHADOW_FILE: &str = "shadow_params.safetensors";

/// One batch from the external data pipeline.
///
/// Beyond real images and their validity masks, a batch may carry
/// arbitrary geometry/feature tensors for the renderer and generator;
/// those are passed through unexamined.
#[derive(Debug, Clone)]
pub struct TrainBatch {
    /// Real images, `[batch, channels, height, width]`.
    pub real: Tensor,
    /// Validity masks, `[batch, 1, height, width]`, non-zero where the
    /// image shows actual surface.
    pub mask: Tensor,
    /// Opaque collaborator payload (mesh geometry, shape codes, ranges…).
    pub geometry: HashMap<String, Tensor>,
}

impl TrainBatch {
    /// Creates a batch without geometry payload.
    #[must_use]
    pub fn new(real: Tensor, mask: Tensor) -> Self {
        Self {
            real,
            mask,
            geometry: HashMap::new(),
        }
    }

    /// Attaches a geometry tensor under `key`.
    #[must_use]
    pub fn with_geometry(mut self, key: impl Into<String>, tensor: Tensor) -> Self {
        self.geometry.insert(key.into(), tensor);
        self
    }

    /// Number of samples in the batch.
    pub fn batch_size(&self) -> TrainResult<usize> {
        Ok(self.real.dim(0)?)
    }
}

/// Output of the differentiable renderer.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Rendered image, `[batch, channels, height, width]`.
    pub image: Tensor,
    /// Coverage mask, `[batch, 1, height, width]`, non-zero where geometry
    /// is visible. Used as the critic's mask channel and as the validity
    /// mask for fake-side patch sampling.
    pub coverage: Tensor,
}

impl Rendered {
    /// The critic's input layout: image with the coverage mask
    /// concatenated as an extra channel.
    pub fn critic_input(&self) -> TrainResult<Tensor> {
        Ok(Tensor::cat(&[&self.image, &self.coverage], 1)?)
    }
}

/// The synthesizer network.
///
/// Implementations expose the latent-to-style mapping and the
/// style-to-output synthesis separately so the orchestrator can mix styles
/// and regularize in style space.
pub trait Generator {
    /// Maps a latent batch `[batch, latent_dim]` to a per-layer style code
    /// `[batch, style_layers, style_dim]`.
    fn mapping(&self, latent: &Tensor) -> TrainResult<Tensor>;

    /// Synthesizes raw output (e.g. per-face surface colors) from a style
    /// code. The style batch may be smaller than the data batch (the
    /// path-length penalty runs on a shrunken latent batch).
    fn synthesize(&self, style: &Tensor, batch: &TrainBatch) -> TrainResult<Tensor>;

    /// The trainable parameters, with stable names. Names key both the
    /// optimizer binding and the EMA shadow set, so they must not change
    /// across calls or runs.
    fn parameters(&self) -> Vec<(String, Var)>;
}

/// A critic network scoring how real its input looks.
pub trait Critic {
    /// Scores an input batch; one scalar per sample, shape `[batch]`.
    fn score(&self, images: &Tensor) -> TrainResult<Tensor>;

    /// The trainable parameters.
    fn parameters(&self) -> Vec<Var>;
}

/// The differentiable renderer turning raw generator output into images.
pub trait Renderer {
    /// Renders raw output against the batch's geometry.
    fn render(&self, raw: &Tensor, batch: &TrainBatch) -> TrainResult<Rendered>;
}

/// The augmentation pipeline applied to critic inputs.
pub trait AugmentPipeline {
    /// Applies augmentations with the given per-sample probability.
    fn apply(&self, images: &Tensor, probability: f32) -> TrainResult<Tensor>;
}

/// Scalar results of one [`AdversarialTrainer::run_iteration`] call.
///
/// `None` marks sub-steps that did not run this iteration: cadence did not
/// fire, no patch critic is configured, or the sub-step was skipped after
/// a non-finite penalty.
#[derive(Debug, Clone)]
pub struct IterationResult {
    /// The step this iteration ran as (pre-increment value).
    pub step: u64,
    /// Full-image generator adversarial loss.
    pub generator_loss: f32,
    /// Patch component of the generator loss.
    pub generator_patch_loss: Option<f32>,
    /// Full-image critic loss (real + fake terms).
    pub critic_loss: f32,
    /// Patch critic loss.
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

/// A patch critic paired with its optimizer.
///
/// Kept as one unit so the critic and its optimizer can never be
/// configured separately.
struct PatchCriticSlot<P> {
    critic: P,
    optimizer: ModuleOptimizer,
}

/// The adversarial training orchestrator.
///
/// Owns the [`TrainingState`], the cadence schedule, the per-module
/// optimizer bindings, the EMA shadow set and the adaptive-augmentation
/// controller; drives one full iteration per [`run_iteration`] call.
///
/// [`run_iteration`]: Self::run_iteration
pub struct AdversarialTrainer<G, C, P, R, A> {
    config: TrainerConfig,
    device: Device,
    state: TrainingState,
    schedule: CadenceSchedule,
    generator: G,
    critic: C,
    patch_critic: Option<PatchCriticSlot<P>>,
    renderer: R,
    augment: A,
    ada: AugmentController,
    ema: ParameterEma,
    path_length: PathLengthPenalty,
    patch_sampler: PatchSampler,
    generator_opt: ModuleOptimizer,
    critic_opt: ModuleOptimizer,
    metrics: MetricsCollector,
}

impl<G, C, P, R, A> AdversarialTrainer<G, C, P, R, A>
where
    G: Generator,
    C: Critic,
    P: Critic,
    R: Renderer,
    A: AugmentPipeline,
{
    /// Creates a trainer for the given collaborators.
    ///
    /// The sub-step → (module, optimizer) mapping is fixed here, once; no
    /// sub-step resolves its optimizer positionally at call time.
    ///
    /// # Errors
    ///
    /// Fails fast on an invalid configuration; no error of this kind can
    /// occur during a training iteration.
    pub fn new(
        generator: G,
        critic: C,
        patch_critic: Option<P>,
        renderer: R,
        augment: A,
        config: TrainerConfig,
        device: Device,
    ) -> TrainResult<Self> {
        config.validate()?;
        let schedule = CadenceSchedule::from_config(&config)?;
        let state = TrainingState::new(&config);
        let ada = AugmentController::new(&config.ada);
        let ema = ParameterEma::new(config.ema_decay)?;
        let path_length = PathLengthPenalty::new(&config.path_length);
        let patch_sampler = PatchSampler::new(config.patch.size)?;

        let generator_vars: Vec<Var> = generator
            .parameters()
            .into_iter()
            .map(|(_, var)| var)
            .collect();
        let generator_opt =
            ModuleOptimizer::new("generator", generator_vars, config.lr_generator)?;
        let critic_opt = ModuleOptimizer::new("critic", critic.parameters(), config.lr_critic)?;
        let patch_critic = match patch_critic {
            Some(pc) => {
                let optimizer =
                    ModuleOptimizer::new("patch_critic", pc.parameters(), config.lr_critic)?;
                Some(PatchCriticSlot {
                    critic: pc,
                    optimizer,
                })
            }
            None => None,
        };

        let metrics = MetricsCollector::new(config.collect_metrics);
        Ok(Self {
            config,
            device,
            state,
            schedule,
            generator,
            critic,
            patch_critic,
            renderer,
            augment,
            ada,
            ema,
            path_length,
            patch_sampler,
            generator_opt,
            critic_opt,
            metrics,
        })
    }

    /// Executes one full training iteration in the fixed sub-step order.
    ///
    /// # Errors
    ///
    /// Returns hard errors only: backend failures and an insufficient patch
    /// sampling region. Numerical instability is recovered internally.
    pub fn run_iteration(&mut self, batch: &TrainBatch) -> TrainResult<IterationResult> {
        let step = self.state.global_step;

        let (generator_loss, generator_patch_loss) = self.generator_step(batch)?;

        let path_length_penalty = if self.schedule.generator_reg.fires(step) {
            self.generator_regularization(batch)?
        } else {
            None
        };

        self.ema.update(&self.generator.parameters())?;

        let critic_loss = self.critic_step(batch)?;
        let patch_critic_loss = self.patch_critic_step(batch)?;

        let (gradient_penalty, patch_gradient_penalty) = if self.schedule.critic_reg.fires(step) {
            let gp = self.critic_regularization(batch)?;
            let patch_gp = self.patch_critic_regularization(batch)?;
            (gp, patch_gp)
        } else {
            (None, None)
        };

        if self.schedule.augment.fires(step) {
            self.ada.update(&mut self.state);
        }

        self.state.advance();

        let result = IterationResult {
            step,
            generator_loss,
            generator_patch_loss,
            critic_loss,
            patch_critic_loss,
            gradient_penalty,
            patch_gradient_penalty,
            path_length_penalty,
            augmentation_probability: self.state.augmentation_probability,
        };
        self.metrics.record_iteration(IterationScalars {
            step,
            generator_loss,
            generator_patch_loss,
            critic_loss,
            patch_critic_loss,
            gradient_penalty,
            patch_gradient_penalty,
            path_length_penalty,
            augmentation_probability: self.state.augmentation_probability,
        });
        Ok(result)
    }

    /// Generator adversarial step: full-image loss plus the weighted patch
    /// term, one backward pass, one sanitized optimizer step.
    fn generator_step(&mut self, batch: &TrainBatch) -> TrainResult<(f32, Option<f32>)> {
        let probability = self.state.augmentation_probability;

        let style = self.mixed_style(self.config.batch_size)?;
        let raw = self.generator.synthesize(&style, batch)?;
        let rendered = self.renderer.render(&raw, batch)?;
        let critic_input = self.augment.apply(&rendered.critic_input()?, probability)?;
        let fake_scores = self.critic.score(&critic_input)?;
        let adversarial = loss::generator_loss(&fake_scores)?;
        let generator_loss = adversarial.to_scalar::<f32>()?;

        let (total, patch_loss) = match &self.patch_critic {
            Some(slot) => {
                let fake_patches = self.patch_sampler.sample(
                    &rendered.image,
                    &rendered.coverage,
                    self.config.patch.count,
                )?;
                let patch_scores = slot.critic.score(&fake_patches.stacked_channels()?)?;
                let patch_adversarial = loss::generator_loss(&patch_scores)?;
                let patch_loss = patch_adversarial.to_scalar::<f32>()?;
                let total =
                    (adversarial + (patch_adversarial * self.config.patch.lambda_patch)?)?;
                (total, Some(patch_loss))
            }
            None => (adversarial, None),
        };

        let rewritten = self.generator_opt.backward_step(&total)?;
        self.metrics.record_sanitized(rewritten);
        Ok((generator_loss, patch_loss))
    }

    /// Path-length regularization on a shrunken latent batch. Skipped
    /// entirely when the measured penalty is not finite.
    fn generator_regularization(&mut self, batch: &TrainBatch) -> TrainResult<Option<f32>> {
        let shrink = self.path_length.batch_shrink();
        let reg_batch = (self.config.batch_size / shrink).max(1);

        // The style code is re-wrapped as a leaf so the JVP is measured in
        // style space, exactly at the mapping output.
        let style = self.mixed_style(reg_batch)?;
        let style_var = Var::from_tensor(&style.detach())?;
        let raw = self.generator.synthesize(style_var.as_tensor(), batch)?;
        let rendered = self.renderer.render(&raw, batch)?;

        let Some(penalty) = self.path_length.penalty(&rendered.image, &style_var)? else {
            self.metrics.record_skipped_regularizer("path_length");
            return Ok(None);
        };
        let value = penalty.to_scalar::<f32>()?;
        if !value.is_finite() {
            self.metrics.record_skipped_regularizer("path_length");
            return Ok(None);
        }

        let scale =
            self.config.path_length.weight * self.schedule.generator_reg.interval() as f64;
        let rewritten = self.generator_opt.backward_step(&(penalty * scale)?)?;
        self.metrics.record_sanitized(rewritten);
        Ok(Some(value))
    }

    /// Critic adversarial step. The fake side uses a detached synthesis so
    /// no gradient reaches the generator; the real side feeds the sign
    /// accumulator for ADA.
    fn critic_step(&mut self, batch: &TrainBatch) -> TrainResult<f32> {
        let probability = self.state.augmentation_probability;

        let style = self.mixed_style(self.config.batch_size)?;
        let raw = self.generator.synthesize(&style, batch)?;
        let rendered = self.renderer.render(&raw.detach(), batch)?;
        let fake_input = self.augment.apply(&rendered.critic_input()?, probability)?;
        let fake_scores = self.critic.score(&fake_input)?;
        let fake_loss = loss::critic_fake_loss(&fake_scores)?;

        let real_input = Tensor::cat(&[&batch.real, &batch.mask], 1)?;
        let real_input = self.augment.apply(&real_input, probability)?;
        let real_scores = self.critic.score(&real_input)?;
        self.ada
            .record_real_scores(&mut self.state, &real_scores.detach())?;
        let real_loss = loss::critic_real_loss(&real_scores)?;

        let total = (fake_loss + real_loss)?;
        let critic_loss = total.to_scalar::<f32>()?;
        let rewritten = self.critic_opt.backward_step(&total)?;
        self.metrics.record_sanitized(rewritten);
        Ok(critic_loss)
    }

    /// Patch-critic adversarial step over fake and real patches. A no-op
    /// returning `None` when no patch critic is configured.
    fn patch_critic_step(&mut self, batch: &TrainBatch) -> TrainResult<Option<f32>> {
        if self.patch_critic.is_none() {
            return Ok(None);
        }
        let count = self.config.patch.count;

        let style = self.mixed_style(self.config.batch_size)?;
        let raw = self.generator.synthesize(&style, batch)?;
        let rendered = self.renderer.render(&raw.detach(), batch)?;
        let fake_patches =
            self.patch_sampler
                .sample(&rendered.image, &rendered.coverage, count)?;
        let real_patches = self.patch_sampler.sample(&batch.real, &batch.mask, count)?;

        let Some(slot) = self.patch_critic.as_mut() else {
            return Ok(None);
        };
        let fake_scores = slot.critic.score(&fake_patches.stacked_channels()?)?;
        let fake_loss = loss::critic_fake_loss(&fake_scores)?;
        let real_scores = slot.critic.score(&real_patches.stacked_channels()?)?;
        let real_loss = loss::critic_real_loss(&real_scores)?;

        let total = (fake_loss + real_loss)?;
        let patch_loss = total.to_scalar::<f32>()?;
        let rewritten = slot.optimizer.backward_step(&total)?;
        self.metrics.record_sanitized(rewritten);
        Ok(Some(patch_loss))
    }

    /// Gradient penalty for the full-image critic on the real batch.
    fn critic_regularization(&mut self, batch: &TrainBatch) -> TrainResult<Option<f32>> {
        let probability = self.state.augmentation_probability;
        let real_input = Tensor::cat(&[&batch.real, &batch.mask], 1)?;

        let critic = &self.critic;
        let augment = &self.augment;
        let penalty = regularizer::gradient_penalty(&real_input, |traced| {
            critic.score(&augment.apply(traced, probability)?)
        })?;
        let value = penalty.to_scalar::<f32>()?;
        if !value.is_finite() {
            self.metrics.record_skipped_regularizer("gradient_penalty");
            return Ok(None);
        }

        let scale = self.config.gradient_penalty.weight * self.schedule.critic_reg.interval() as f64;
        let rewritten = self.critic_opt.backward_step(&(penalty * scale)?)?;
        self.metrics.record_sanitized(rewritten);
        Ok(Some(value))
    }

    /// Gradient penalty for the patch critic on real patches. A no-op
    /// returning `None` when no patch critic is configured.
    fn patch_critic_regularization(&mut self, batch: &TrainBatch) -> TrainResult<Option<f32>> {
        if self.patch_critic.is_none() {
            return Ok(None);
        }
        let real_patches =
            self.patch_sampler
                .sample(&batch.real, &batch.mask, self.config.patch.count)?;
        let stacked = real_patches.stacked_channels()?;

        let Some(slot) = self.patch_critic.as_mut() else {
            return Ok(None);
        };
        let penalty = regularizer::gradient_penalty(&stacked, |traced| slot.critic.score(traced))?;
        let value = penalty.to_scalar::<f32>()?;
        if !value.is_finite() {
            self.metrics
                .record_skipped_regularizer("patch_gradient_penalty");
            return Ok(None);
        }

        let scale = self.config.gradient_penalty.weight * self.schedule.critic_reg.interval() as f64;
        let rewritten = slot.optimizer.backward_step(&(penalty * scale)?)?;
        self.metrics.record_sanitized(rewritten);
        Ok(Some(value))
    }

    /// Draws a style code, mixing two independent latents at a random
    /// crossover layer with the configured probability.
    fn mixed_style(&self, batch_size: usize) -> TrainResult<Tensor> {
        let shape = (batch_size, self.config.latent_dim);
        let z1 = Tensor::randn(0f32, 1f32, shape, &self.device)?;
        let w1 = self.generator.mapping(&z1)?;

        let mut rng = rand::thread_rng();
        if rng.gen::<f32>() >= self.config.style_mixing_prob {
            return Ok(w1);
        }

        let layers = w1.dim(1)?;
        let crossover = rng.gen_range(0..layers);
        let z2 = Tensor::randn(0f32, 1f32, shape, &self.device)?;
        let w2 = self.generator.mapping(&z2)?;
        if crossover == 0 {
            return Ok(w2);
        }
        Ok(Tensor::cat(
            &[
                &w1.narrow(1, 0, crossover)?,
                &w2.narrow(1, crossover, layers - crossover)?,
            ],
            1,
        )?)
    }

    /// The current global step.
    #[must_use]
    pub fn current_step(&self) -> u64 {
        self.state.global_step
    }

    /// The current augmentation probability.
    #[must_use]
    pub fn augmentation_probability(&self) -> f32 {
        self.state.augmentation_probability
    }

    /// Read access to the shared training state.
    #[must_use]
    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    /// The run's configuration.
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// The EMA shadow parameter set (for persistence collaborators).
    #[must_use]
    pub fn ema(&self) -> &ParameterEma {
        &self.ema
    }

    /// Read access to the generator collaborator.
    #[must_use]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Read access to the full-image critic collaborator.
    #[must_use]
    pub fn critic(&self) -> &C {
        &self.critic
    }

    /// The metrics collector (history and non-fatal event counters).
    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Aggregated training statistics.
    #[must_use]
    pub fn statistics(&self) -> TrainingStatistics {
        self.metrics.statistics()
    }

    /// Runs `f` against the generator with its live parameters temporarily
    /// replaced by the EMA shadow values (evaluation/export under smoothed
    /// weights). The live values are restored even when `f` fails.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error; restoration runs regardless.
    pub fn with_shadow_parameters<T>(
        &mut self,
        f: impl FnOnce(&G) -> TrainResult<T>,
    ) -> TrainResult<T> {
        let params = self.generator.parameters();
        let generator = &self.generator;
        self.ema.with_shadow(&params, || f(generator))
    }

    /// Writes the orchestrator state (and, when initialized, the EMA
    /// shadow set) into `dir`.
    ///
    /// Network weights and optimizer moments are the collaborators'
    /// responsibility and are not written here.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error on I/O failure.
    pub fn save_checkpoint<Q: AsRef<Path>>(&self, dir: Q) -> TrainResult<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            TrainingError::checkpoint(format!("failed to create {}: {e}", dir.display()))
        })?;
        TrainerCheckpoint::new(
            self.config.clone(),
            self.state.clone(),
            self.path_length.target(),
        )
        .save(dir.join(CHECKPOINT_STATE_FILE))?;
        if !self.ema.is_empty() {
            self.ema.save(dir.join(CHECKPOINT_SHADOW_FILE))?;
        }
        Ok(())
    }

    /// Restores orchestrator state from a checkpoint directory written by
    /// [`save_checkpoint`](Self::save_checkpoint): the step counter,
    /// augmentation probability, sign accumulator, path-length target and
    /// (when present) the EMA shadow set, which replaces the current
    /// shadow entirely.
    ///
    /// Cadence intervals come from the constructor's configuration; they
    /// are fixed per run and a checkpoint does not override them.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error on I/O or format failure.
    pub fn restore_checkpoint<Q: AsRef<Path>>(&mut self, dir: Q) -> TrainResult<()> {
        let dir = dir.as_ref();
        let checkpoint = TrainerCheckpoint::load(dir.join(CHECKPOINT_STATE_FILE))?;
        self.state = checkpoint.state;
        self.path_length.set_target(checkpoint.path_length_target);
        let shadow_path = dir.join(CHECKPOINT_SHADOW_FILE);
        if shadow_path.exists() {
            self.ema.load(shadow_path, &self.device)?;
        }
        Ok(())
    }
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use adversarial_trainer_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AdversarialTrainer, AugmentPipeline, Critic, Generator, IterationResult, Rendered,
        Renderer, TrainBatch, TrainResult, TrainerConfig, TrainingError, TrainingState,
    };
}
