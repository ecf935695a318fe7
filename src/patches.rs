//! Validity-constrained random patch sampling.
//!
//! The patch critic judges small crops rather than whole images, but a crop
//! is only meaningful where the image actually shows rendered surface. The
//! sampler therefore restricts patch centers to pixels that are (a)
//! non-zero in the validity mask and (b) far enough inside the mask's
//! non-zero bounding box that the whole crop fits, not merely that the
//! center pixel is valid.
//!
//! Crops are taken with `narrow`, so fake-image patches stay connected to
//! the generator's autograd graph. Center selection reads only the mask,
//! which never needs gradients.

use candle_core::{IndexOp, Tensor};
use rand::seq::index::sample as sample_without_replacement;

use crate::error::{TrainResult, TrainingError};

/// A batch of patches and their coincident mask crops.
#[derive(Debug)]
pub struct PatchBatch {
    /// Image crops, `[batch, count, channels, size, size]`.
    pub images: Tensor,
    /// Mask crops, `[batch, count, 1, size, size]`.
    pub masks: Tensor,
}

impl PatchBatch {
    /// Stacks image and mask crops channel-wise and flattens the patch axis
    /// into channels: `[batch, count * (channels + 1), size, size]`.
    ///
    /// This is the layout the patch critic consumes.
    ///
    /// # Errors
    ///
    /// Returns a tensor error on shape mismatch.
    pub fn stacked_channels(&self) -> TrainResult<Tensor> {
        let (batch, count, channels, size, _) = self.images.dims5()?;
        let combined = Tensor::cat(&[&self.images, &self.masks], 2)?;
        Ok(combined.reshape((batch, count * (channels + 1), size, size))?)
    }
}

/// Uniform sampler over interior-valid patch positions.
#[derive(Debug, Clone, Copy)]
pub struct PatchSampler {
    size: usize,
    margin: usize,
}

impl PatchSampler {
    /// Creates a sampler producing `size x size` crops.
    ///
    /// Candidate centers must be strictly more than `size/2 + 1` pixels
    /// inside the mask's bounding box, which guarantees the full crop lies
    /// inside the box.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `size` is zero or odd (crops are
    /// taken symmetrically around the center).
    pub fn new(size: usize) -> TrainResult<Self> {
        if size == 0 {
            return Err(TrainingError::config("patch size must be > 0"));
        }
        if size % 2 != 0 {
            return Err(TrainingError::config("patch size must be even"));
        }
        Ok(Self {
            size,
            margin: size / 2 + 1,
        })
    }

    /// The patch side length.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Samples `count` patches per image, without replacement among the
    /// valid centers of each image.
    ///
    /// `images` is `[batch, channels, height, width]`, `masks` is
    /// `[batch, 1, height, width]` with non-zero marking validity.
    ///
    /// Sampling draws from the process RNG, sequentially per image, so
    /// patch positions are independent across images; reproducibility
    /// across runs is not a goal.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InsufficientValidRegion`] naming the first
    /// image with fewer than `count` valid centers. Callers must guarantee
    /// masks are large and connected enough, or reduce `count`/`size`; the
    /// count is never silently reduced.
    pub fn sample(&self, images: &Tensor, masks: &Tensor, count: usize) -> TrainResult<PatchBatch> {
        let (batch, _channels, _height, _width) = images.dims4()?;
        let half = self.size / 2;
        let mut rng = rand::thread_rng();

        let mut image_crops = Vec::with_capacity(batch);
        let mut mask_crops = Vec::with_capacity(batch);
        for idx in 0..batch {
            let mask_plane = masks
                .i((idx, 0))?
                .to_dtype(candle_core::DType::F32)?
                .to_vec2::<f32>()?;
            let centers = self.valid_centers(&mask_plane);
            if centers.len() < count {
                return Err(TrainingError::InsufficientValidRegion {
                    image_index: idx,
                    requested: count,
                    available: centers.len(),
                });
            }

            let chosen = sample_without_replacement(&mut rng, centers.len(), count);
            let image = images.i(idx)?;
            let mask = masks.i(idx)?;
            let mut per_image = Vec::with_capacity(count);
            let mut per_mask = Vec::with_capacity(count);
            for pick in chosen.iter() {
                let (y, x) = centers[pick];
                per_image.push(
                    image
                        .narrow(1, y - half, self.size)?
                        .narrow(2, x - half, self.size)?,
                );
                per_mask.push(
                    mask.narrow(1, y - half, self.size)?
                        .narrow(2, x - half, self.size)?,
                );
            }
            image_crops.push(Tensor::stack(&per_image, 0)?);
            mask_crops.push(Tensor::stack(&per_mask, 0)?);
        }

        Ok(PatchBatch {
            images: Tensor::stack(&image_crops, 0)?,
            masks: Tensor::stack(&mask_crops, 0)?,
        })
    }

    /// Non-zero mask pixels strictly more than `margin` inside the mask's
    /// non-zero bounding box.
    fn valid_centers(&self, mask: &[Vec<f32>]) -> Vec<(usize, usize)> {
        let mut y_min = usize::MAX;
        let mut y_max = 0usize;
        let mut x_min = usize::MAX;
        let mut x_max = 0usize;
        let mut nonzero = Vec::new();
        for (y, row) in mask.iter().enumerate() {
            for (x, &value) in row.iter().enumerate() {
                if value > 0.0 {
                    y_min = y_min.min(y);
                    y_max = y_max.max(y);
                    x_min = x_min.min(x);
                    x_max = x_max.max(x);
                    nonzero.push((y, x));
                }
            }
        }
        if nonzero.is_empty() {
            return nonzero;
        }
        nonzero
            .into_iter()
            .filter(|&(y, x)| {
                y > y_min + self.margin
                    && y + self.margin < y_max
                    && x > x_min + self.margin
                    && x + self.margin < x_max
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};

    /// Mask with ones in `[y0, y1) x [x0, x1)` and zeros elsewhere.
    fn rect_mask(h: usize, w: usize, y0: usize, y1: usize, x0: usize, x1: usize) -> Tensor {
        let mut data = vec![0.0f32; h * w];
        for y in y0..y1 {
            for x in x0..x1 {
                data[y * w + x] = 1.0;
            }
        }
        Tensor::from_vec(data, (1, 1, h, w), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_odd_or_zero_size_rejected() {
        assert!(PatchSampler::new(0).is_err());
        assert!(PatchSampler::new(7).is_err());
        assert!(PatchSampler::new(8).is_ok());
    }

    #[test]
    fn test_patches_lie_inside_the_valid_region() {
        let sampler = PatchSampler::new(8).unwrap();
        let masks = rect_mask(48, 48, 4, 44, 4, 44);
        let images = Tensor::rand(0.0f32, 1.0, (1, 3, 48, 48), &Device::Cpu).unwrap();

        let patches = sampler.sample(&images, &masks, 6).unwrap();
        assert_eq!(patches.images.dims(), &[1, 6, 3, 8, 8]);
        assert_eq!(patches.masks.dims(), &[1, 6, 1, 8, 8]);

        // Every pixel of every mask crop must be inside the non-zero
        // region, i.e. identically one for a rectangular mask.
        let flat = patches
            .masks
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert!(flat.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_insufficient_region_is_a_hard_error() {
        let sampler = PatchSampler::new(8).unwrap();
        // Valid region barely larger than one patch: no interior centers.
        let masks = rect_mask(32, 32, 10, 19, 10, 19);
        let images = Tensor::zeros((1, 3, 32, 32), DType::F32, &Device::Cpu).unwrap();

        let err = sampler.sample(&images, &masks, 2).unwrap_err();
        match err {
            TrainingError::InsufficientValidRegion {
                image_index,
                requested,
                available,
            } => {
                assert_eq!(image_index, 0);
                assert_eq!(requested, 2);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_mask_reports_zero_available() {
        let sampler = PatchSampler::new(4).unwrap();
        let masks = Tensor::zeros((1, 1, 16, 16), DType::F32, &Device::Cpu).unwrap();
        let images = Tensor::zeros((1, 3, 16, 16), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            sampler.sample(&images, &masks, 1),
            Err(TrainingError::InsufficientValidRegion { available: 0, .. })
        ));
    }

    #[test]
    fn test_sampling_without_replacement_yields_distinct_centers() {
        let sampler = PatchSampler::new(4).unwrap();
        let masks = rect_mask(32, 32, 2, 30, 2, 30);
        // Encode the pixel position in the image so crops reveal centers.
        let mut data = vec![0.0f32; 32 * 32];
        for (i, v) in data.iter_mut().enumerate() {
            *v = i as f32;
        }
        let images = Tensor::from_vec(data, (1, 1, 32, 32), &Device::Cpu).unwrap();

        let patches = sampler.sample(&images, &masks, 8).unwrap();
        // The top-left value of each crop identifies its position.
        let mut corners = Vec::new();
        for p in 0..8 {
            let corner = patches
                .images
                .i((0, p, 0, 0, 0))
                .unwrap()
                .to_scalar::<f32>()
                .unwrap();
            corners.push(corner as u32);
        }
        corners.sort_unstable();
        corners.dedup();
        assert_eq!(corners.len(), 8, "duplicate patch centers");
    }

    #[test]
    fn test_stacked_channels_layout() {
        let sampler = PatchSampler::new(4).unwrap();
        let masks = rect_mask(24, 24, 2, 22, 2, 22);
        let images = Tensor::rand(0.0f32, 1.0, (2, 3, 24, 24), &Device::Cpu).unwrap();
        let masks = Tensor::cat(&[&masks, &masks], 0).unwrap();

        let patches = sampler.sample(&images, &masks, 3).unwrap();
        let stacked = patches.stacked_channels().unwrap();
        assert_eq!(stacked.dims(), &[2, 3 * 4, 4, 4]);
    }
}
