//! Quality metrics for comparing generated and reference images.
//!
//! Provides PSNR on signed `[-1, 1]` data and Gaussian-windowed SSIM, both
//! over `[N, C, H, W]` batches.

pub mod fast_conv;
pub mod psnr;
pub mod ssim;
pub mod stats;
pub mod window;

use burn::prelude::*;

use crate::error::{MetricError, Result};

/// Map signed image data in `[-1, 1]` to `[0, 1]`.
///
/// No clamping: values outside the nominal range map linearly outside `[0, 1]`.
pub fn to_unit_range<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.mul_scalar(0.5).add_scalar(0.5)
}

pub(crate) fn ensure_same_shape(left: [usize; 4], right: [usize; 4]) -> Result<()> {
    if left == right {
        Ok(())
    } else {
        Err(MetricError::ShapeMismatch { left, right })
    }
}

pub(crate) fn ensure_valid_window(window_size: usize) -> Result<()> {
    if window_size % 2 == 1 {
        Ok(())
    } else {
        Err(MetricError::InvalidWindowSize(window_size))
    }
}

pub(crate) fn ensure_window_fits(window_size: usize, [_, _, height, width]: [usize; 4]) -> Result<()> {
    if window_size <= height.min(width) {
        Ok(())
    } else {
        Err(MetricError::WindowTooLarge {
            window_size,
            height,
            width,
        })
    }
}
