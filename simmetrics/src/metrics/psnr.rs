//! Peak Signal-to-Noise Ratio on signed image batches.

use burn::prelude::*;

use super::{ensure_same_shape, to_unit_range};
use crate::error::Result;

/// Epsilon added to the MSE before taking the logarithm.
pub const DEFAULT_PSNR_EPSILON: f64 = 1e-6;

/// Compute Peak Signal-to-Noise Ratio between two image tensors.
///
/// Both tensors should be `[N, C, H, W]` with values in `[-1, 1]`; they are
/// mapped to `[0, 1]` first, so the peak value is 1. Returns PSNR in decibels:
///
///   10 · log10(1 / (MSE + ε))
///
/// The result is always finite. Identical inputs give the ceiling
/// [`psnr_ceiling`]`(epsilon)` (60 dB for ε = 1e-6), not infinity.
pub fn psnr<B: Backend>(x: Tensor<B, 4>, y: Tensor<B, 4>, epsilon: f64) -> Result<f64> {
    ensure_same_shape(x.dims(), y.dims())?;

    let diff = to_unit_range(x) - to_unit_range(y);
    let mse: f64 = (diff.clone() * diff).mean().into_scalar().elem();

    Ok(10.0 * (1.0 / (mse + epsilon)).log10())
}

/// [`psnr`] with [`DEFAULT_PSNR_EPSILON`].
pub fn psnr_default<B: Backend>(x: Tensor<B, 4>, y: Tensor<B, 4>) -> Result<f64> {
    psnr(x, y, DEFAULT_PSNR_EPSILON)
}

/// Highest value [`psnr`] can return for a given epsilon (reached at MSE = 0).
pub fn psnr_ceiling(epsilon: f64) -> f64 {
    10.0 * (1.0 / epsilon).log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricError;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray;

    #[test]
    fn identical_images_hit_the_ceiling() {
        let device = Default::default();
        let x = Tensor::<B, 4>::zeros([1, 1, 8, 8], &device);
        let value = psnr_default(x.clone(), x).unwrap();
        assert!(value.is_finite());
        assert!((value - psnr_ceiling(DEFAULT_PSNR_EPSILON)).abs() < 1e-9);
        assert!((value - 60.0).abs() < 1e-9);
    }

    #[test]
    fn maximal_difference_is_zero_db() {
        let device = Default::default();
        let x = Tensor::<B, 4>::full([1, 3, 16, 16], -1.0, &device);
        let y = Tensor::<B, 4>::ones([1, 3, 16, 16], &device);
        let value = psnr_default(x, y).unwrap();
        let expected = 10.0 * (1.0 / (1.0 + DEFAULT_PSNR_EPSILON)).log10();
        assert!((value - expected).abs() < 1e-9);
        assert!(value.abs() < 1e-5);
    }

    #[test]
    fn symmetric() {
        let device = Default::default();
        let x = Tensor::<B, 4>::random([2, 3, 12, 12], Distribution::Uniform(-1.0, 1.0), &device);
        let y = Tensor::<B, 4>::random([2, 3, 12, 12], Distribution::Uniform(-1.0, 1.0), &device);
        let xy = psnr_default(x.clone(), y.clone()).unwrap();
        let yx = psnr_default(y, x).unwrap();
        assert!((xy - yx).abs() < 1e-9);
    }

    #[test]
    fn known_mse() {
        let device = Default::default();
        // Signed difference of 0.2 is 0.1 after normalization: MSE = 0.01, 20 dB.
        let x = Tensor::<B, 4>::full([1, 1, 4, 4], 0.2, &device);
        let y = Tensor::<B, 4>::zeros([1, 1, 4, 4], &device);
        let value = psnr(x, y, 0.0).unwrap();
        assert!((value - 20.0).abs() < 1e-4, "psnr = {value}");
    }

    #[test]
    fn larger_epsilon_lowers_the_ceiling() {
        assert!((psnr_ceiling(1e-4) - 40.0).abs() < 1e-9);
        assert!(psnr_ceiling(1e-4) < psnr_ceiling(1e-8));
    }

    #[test]
    fn shape_mismatch() {
        let device = Default::default();
        let x = Tensor::<B, 4>::zeros([1, 3, 8, 8], &device);
        let y = Tensor::<B, 4>::zeros([1, 3, 8, 9], &device);
        assert_eq!(
            psnr_default(x, y),
            Err(MetricError::ShapeMismatch {
                left: [1, 3, 8, 8],
                right: [1, 3, 8, 9],
            })
        );
    }
}
