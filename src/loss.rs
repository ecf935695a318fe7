//! Non-saturating adversarial losses.
//!
//! Both networks train against the softplus form of the logistic loss: the
//! generator minimizes `softplus(-score)` on fake samples, the critic
//! minimizes `softplus(score)` on fakes and `softplus(-score)` on reals.
//! All three reduce to a scalar mean over the batch.

use candle_core::Tensor;

use crate::error::TrainResult;

/// Numerically stable `softplus`, `ln(1 + e^x)`.
///
/// Computed as `relu(x) + ln(1 + e^{-|x|})` so large positive inputs do not
/// overflow the exponential.
pub fn softplus(xs: &Tensor) -> TrainResult<Tensor> {
    let linear = xs.relu()?;
    let curved = ((xs.abs()?.neg()?.exp()? + 1.0)?).log()?;
    Ok((linear + curved)?)
}

/// Generator adversarial loss: `mean(softplus(-score))` over fake-sample
/// critic scores.
pub fn generator_loss(fake_scores: &Tensor) -> TrainResult<Tensor> {
    Ok(softplus(&fake_scores.neg()?)?.mean_all()?)
}

/// Critic loss on fake samples: `mean(softplus(score))`.
pub fn critic_fake_loss(fake_scores: &Tensor) -> TrainResult<Tensor> {
    Ok(softplus(fake_scores)?.mean_all()?)
}

/// Critic loss on real samples: `mean(softplus(-score))`.
pub fn critic_real_loss(real_scores: &Tensor) -> TrainResult<Tensor> {
    Ok(softplus(&real_scores.neg()?)?.mean_all()?)
}
