//! Windowed local statistics of two image batches.
//!
//! With `F(x)` the depthwise convolution of `x` by the Gaussian window
//! (padding `k / 2`, so the output keeps the input size):
//!
//!   μ₁  = F(x₁)              μ₂  = F(x₂)
//!   σ₁² = F(x₁²) − μ₁²       σ₂² = F(x₂²) − μ₂²
//!   σ₁₂ = F(x₁·x₂) − μ₁·μ₂
//!
//! These are biased (window-weighted) moments, with no Bessel correction.

use burn::prelude::*;

use super::fast_conv::{depthwise_conv2d, DepthwiseConv};
use super::{ensure_same_shape, ensure_valid_window, ensure_window_fits};
use crate::error::Result;

/// Per-pixel local moments, each shaped like the input batch.
#[derive(Debug, Clone)]
pub struct LocalStats<B: Backend> {
    pub mu1: Tensor<B, 4>,
    pub mu2: Tensor<B, 4>,
    pub var1: Tensor<B, 4>,
    pub var2: Tensor<B, 4>,
    pub covar: Tensor<B, 4>,
}

/// Compute local means, variances and covariance of `im1` and `im2`.
///
/// `window` must be `[C, 1, window_size, window_size]` where `C` is the
/// channel count of the images.
pub fn local_stats<B: DepthwiseConv>(
    im1: Tensor<B, 4>,
    im2: Tensor<B, 4>,
    window: Tensor<B, 4>,
    window_size: usize,
) -> Result<LocalStats<B>> {
    let dims = im1.dims();
    ensure_same_shape(dims, im2.dims())?;
    ensure_valid_window(window_size)?;
    ensure_same_shape([dims[1], 1, window_size, window_size], window.dims())?;
    ensure_window_fits(window_size, dims)?;

    let padding = window_size / 2;
    let filter = |x: Tensor<B, 4>| depthwise_conv2d(x, window.clone(), padding);

    let mu1 = filter(im1.clone());
    let mu2 = filter(im2.clone());

    let mu1_sq = mu1.clone() * mu1.clone();
    let mu2_sq = mu2.clone() * mu2.clone();
    let mu1_mu2 = mu1.clone() * mu2.clone();

    let var1 = filter(im1.clone() * im1.clone()) - mu1_sq;
    let var2 = filter(im2.clone() * im2.clone()) - mu2_sq;
    let covar = filter(im1 * im2) - mu1_mu2;

    Ok(LocalStats {
        mu1,
        mu2,
        var1,
        var2,
        covar,
    })
}
