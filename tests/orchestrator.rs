//! End-to-end tests for the training orchestrator with mock collaborators.
//!
//! The mocks are small linear maps so every loss, penalty, and gradient in
//! the loop is exact and finite; the tests pin down scheduling behavior,
//! not model quality.

use adversarial_trainer_rs::config::{AdaConfig, PatchConfig, PathLengthConfig};
use adversarial_trainer_rs::prelude::*;
use candle_core::{DType, Device, Tensor, Var};

const HEIGHT: usize = 16;
const WIDTH: usize = 16;
const CHANNELS: usize = 3;
const LATENT: usize = 8;
const STYLE: usize = 8;
const STYLE_LAYERS: usize = 2;
const PATCH_SIZE: usize = 4;
const PATCH_COUNT: usize = 2;

/// Two-layer style generator: a linear mapping followed by a linear
/// synthesis from the layer-averaged style code.
struct LinearGenerator {
    mapping_weight: Var,
    synthesis_weight: Var,
}

impl LinearGenerator {
    fn new(device: &Device) -> TrainResult<Self> {
        let mapping = Tensor::randn(0f32, 0.05f32, (LATENT, STYLE), device)?;
        let synthesis =
            Tensor::randn(0f32, 0.05f32, (STYLE, CHANNELS * HEIGHT * WIDTH), device)?;
        Ok(Self {
            mapping_weight: Var::from_tensor(&mapping)?,
            synthesis_weight: Var::from_tensor(&synthesis)?,
        })
    }
}

impl Generator for LinearGenerator {
    fn mapping(&self, latent: &Tensor) -> TrainResult<Tensor> {
        let w = latent.matmul(self.mapping_weight.as_tensor())?;
        // Broadcast the single style across both layers.
        Ok(Tensor::stack(&[&w, &w], 1)?)
    }

    fn synthesize(&self, style: &Tensor, _batch: &TrainBatch) -> TrainResult<Tensor> {
        let batch = style.dim(0)?;
        let pooled = style.mean(1)?;
        let flat = pooled.matmul(self.synthesis_weight.as_tensor())?;
        Ok(flat.reshape((batch, CHANNELS, HEIGHT, WIDTH))?)
    }

    fn parameters(&self) -> Vec<(String, Var)> {
        vec![
            ("mapping.weight".to_string(), self.mapping_weight.clone()),
            ("synthesis.weight".to_string(), self.synthesis_weight.clone()),
        ]
    }
}

/// Linear critic over flattened inputs.
struct LinearCritic {
    weight: Var,
}

impl LinearCritic {
    fn new(features: usize, device: &Device) -> TrainResult<Self> {
        let weight = Tensor::randn(0f32, 0.01f32, (features, 1), device)?;
        Ok(Self {
            weight: Var::from_tensor(&weight)?,
        })
    }
}

impl Critic for LinearCritic {
    fn score(&self, images: &Tensor) -> TrainResult<Tensor> {
        Ok(images
            .flatten_from(1)?
            .matmul(self.weight.as_tensor())?
            .squeeze(1)?)
    }

    fn parameters(&self) -> Vec<Var> {
        vec![self.weight.clone()]
    }
}

/// Passthrough renderer: the raw output already is the image; coverage
/// comes from the batch's validity mask (trimmed to the style batch, since
/// the path-length penalty uses a shrunken latent batch).
struct PassthroughRenderer;

impl Renderer for PassthroughRenderer {
    fn render(&self, raw: &Tensor, batch: &TrainBatch) -> TrainResult<Rendered> {
        let rows = raw.dim(0)?;
        Ok(Rendered {
            image: raw.clone(),
            coverage: batch.mask.narrow(0, 0, rows)?,
        })
    }
}

/// Identity augmentation pipeline.
struct IdentityAugment;

impl AugmentPipeline for IdentityAugment {
    fn apply(&self, images: &Tensor, _probability: f32) -> TrainResult<Tensor> {
        Ok(images.clone())
    }
}

/// A batch whose mask is an interior rectangle, leaving plenty of valid
/// patch centers.
fn batch(device: &Device, batch_size: usize) -> TrainBatch {
    let real = Tensor::rand(
        0.0f32,
        1.0,
        (batch_size, CHANNELS, HEIGHT, WIDTH),
        device,
    )
    .unwrap();
    let mut mask = vec![0.0f32; HEIGHT * WIDTH];
    for y in 1..HEIGHT - 1 {
        for x in 1..WIDTH - 1 {
            mask[y * WIDTH + x] = 1.0;
        }
    }
    let plane = Tensor::from_vec(mask, (1, 1, HEIGHT, WIDTH), device).unwrap();
    let mask = plane
        .repeat((batch_size, 1, 1, 1))
        .unwrap()
        .to_dtype(DType::F32)
        .unwrap();
    TrainBatch::new(real, mask)
}

fn config(generator_reg_interval: u64, generator_reg_warmup: u64) -> TrainerConfig {
    TrainerConfig::builder()
        .batch_size(2)
        .latent_dim(LATENT)
        .lr_generator(1e-3)
        .lr_critic(1e-3)
        .generator_reg_interval(generator_reg_interval)
        .generator_reg_warmup(generator_reg_warmup)
        .critic_reg_interval(16)
        .ada(AdaConfig {
            fixed: false,
            initial_probability: 0.0,
            target: 0.6,
            interval: 4,
            speed: 1e-3,
        })
        .path_length(PathLengthConfig {
            weight: 2.0,
            decay: 0.01,
            batch_shrink: 2,
        })
        .patch(PatchConfig {
            size: PATCH_SIZE,
            count: PATCH_COUNT,
            lambda_patch: 1.0,
        })
        .build()
}

type TestTrainer = AdversarialTrainer<
    LinearGenerator,
    LinearCritic,
    LinearCritic,
    PassthroughRenderer,
    IdentityAugment,
>;

fn trainer(config: TrainerConfig, with_patch_critic: bool) -> TestTrainer {
    let device = Device::Cpu;
    let generator = LinearGenerator::new(&device).unwrap();
    let critic = LinearCritic::new((CHANNELS + 1) * HEIGHT * WIDTH, &device).unwrap();
    let patch_critic = if with_patch_critic {
        Some(
            LinearCritic::new(PATCH_COUNT * (CHANNELS + 1) * PATCH_SIZE * PATCH_SIZE, &device)
                .unwrap(),
        )
    } else {
        None
    };
    AdversarialTrainer::new(
        generator,
        critic,
        patch_critic,
        PassthroughRenderer,
        IdentityAugment,
        config,
        device,
    )
    .unwrap()
}

#[test]
fn test_ten_iterations_fire_exactly_two_generator_regularizations() {
    let mut trainer = trainer(config(4, 0), true);
    let batch = batch(&Device::Cpu, 2);

    let mut plp_count = 0;
    for _ in 0..10 {
        let result = trainer.run_iteration(&batch).unwrap();
        if result.path_length_penalty.is_some() {
            plp_count += 1;
        }
        assert!((0.0..=1.0).contains(&result.augmentation_probability));
        assert!(result.generator_loss.is_finite());
        assert!(result.critic_loss.is_finite());
    }
    assert_eq!(plp_count, 2, "interval 4, warm-up 0 over 10 iterations");
    assert_eq!(trainer.current_step(), 10);
    assert_eq!(trainer.metrics().skipped_regularizer_steps(), 0);
}

#[test]
fn test_warmup_suppresses_generator_regularization() {
    let mut trainer = trainer(config(4, 100), true);
    let batch = batch(&Device::Cpu, 2);
    for _ in 0..10 {
        let result = trainer.run_iteration(&batch).unwrap();
        assert!(result.path_length_penalty.is_none());
    }
}

#[test]
fn test_patch_critic_sub_steps_run_when_configured() {
    let mut trainer = trainer(config(4, 0), true);
    let batch = batch(&Device::Cpu, 2);

    let mut saw_gradient_penalties = false;
    for _ in 0..16 {
        let result = trainer.run_iteration(&batch).unwrap();
        assert!(result.generator_patch_loss.is_some());
        assert!(result.patch_critic_loss.is_some());
        // Critic regularization fires once, on step 15, for both critics.
        if result.step == 15 {
            assert!(result.gradient_penalty.is_some());
            assert!(result.patch_gradient_penalty.is_some());
            saw_gradient_penalties = true;
        } else {
            assert!(result.gradient_penalty.is_none());
            assert!(result.patch_gradient_penalty.is_none());
        }
    }
    assert!(saw_gradient_penalties);
}

#[test]
fn test_without_patch_critic_patch_fields_stay_none() {
    let mut trainer = trainer(config(4, 0), false);
    let batch = batch(&Device::Cpu, 2);
    for _ in 0..16 {
        let result = trainer.run_iteration(&batch).unwrap();
        assert!(result.generator_patch_loss.is_none());
        assert!(result.patch_critic_loss.is_none());
        assert!(result.patch_gradient_penalty.is_none());
    }
}

#[test]
fn test_ema_tracks_generator_after_first_iteration() {
    let mut trainer = trainer(config(4, 0), false);
    let batch = batch(&Device::Cpu, 2);
    assert!(trainer.ema().is_empty());
    trainer.run_iteration(&batch).unwrap();
    assert_eq!(trainer.ema().len(), 2);
    assert_eq!(trainer.ema().num_updates(), 1);
}

fn live_snapshot(trainer: &TestTrainer) -> Vec<Vec<f32>> {
    trainer
        .generator()
        .parameters()
        .into_iter()
        .map(|(_, var)| var.as_tensor().flatten_all().unwrap().to_vec1().unwrap())
        .collect()
}

#[test]
fn test_shadow_evaluation_restores_live_parameters() {
    let mut trainer = trainer(config(4, 0), false);
    let batch = batch(&Device::Cpu, 2);
    for _ in 0..3 {
        trainer.run_iteration(&batch).unwrap();
    }

    let live_before = live_snapshot(&trainer);
    let eval = trainer.with_shadow_parameters(|generator| Ok(generator.parameters().len()));
    assert_eq!(eval.unwrap(), 2);
    assert_eq!(live_before, live_snapshot(&trainer));

    // A failing evaluation closure must also restore.
    let failed: TrainResult<()> = trainer.with_shadow_parameters(|_| {
        Err(TrainingError::Checkpoint {
            reason: "export failed".to_string(),
        })
    });
    assert!(failed.is_err());
    assert_eq!(live_before, live_snapshot(&trainer));
}

#[test]
fn test_checkpoint_roundtrip_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer = trainer(config(4, 0), true);
    let batch = batch(&Device::Cpu, 2);
    for _ in 0..6 {
        trainer.run_iteration(&batch).unwrap();
    }
    let step = trainer.current_step();
    let probability = trainer.augmentation_probability();
    trainer.save_checkpoint(dir.path()).unwrap();

    let mut resumed = self::trainer(config(4, 0), true);
    resumed.restore_checkpoint(dir.path()).unwrap();
    assert_eq!(resumed.current_step(), step);
    assert!((resumed.augmentation_probability() - probability).abs() < f32::EPSILON);
    assert_eq!(resumed.ema().len(), 2);

    // The resumed run continues the cadence sequence: steps 6..10 contain
    // exactly one generator-regularization firing (step 7).
    let mut plp_count = 0;
    for _ in 0..4 {
        let result = resumed.run_iteration(&batch).unwrap();
        if result.path_length_penalty.is_some() {
            plp_count += 1;
        }
    }
    assert_eq!(plp_count, 1);
}

#[test]
fn test_metrics_history_matches_iterations() {
    let mut trainer = trainer(config(4, 0), true);
    let batch = batch(&Device::Cpu, 2);
    for _ in 0..5 {
        trainer.run_iteration(&batch).unwrap();
    }
    let stats = trainer.statistics();
    assert_eq!(stats.iterations, 5);
    assert!(stats.mean_generator_loss.is_finite());
    assert_eq!(trainer.metrics().history().len(), 5);
    assert_eq!(trainer.metrics().history()[4].step, 4);
}
