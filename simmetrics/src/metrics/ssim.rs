//! Structural Similarity Index (SSIM) over Gaussian-windowed statistics.
//!
//! Per pixel, from the local moments of [`local_stats`]:
//!
//!   SSIM = ((2·μ₁·μ₂ + C₁)(2·σ₁₂ + C₂)) / ((μ₁² + μ₂² + C₁)(σ₁² + σ₂² + C₂))
//!
//! with C₁ = 0.01² and C₂ = 0.03² (dynamic range 1). The map is then averaged
//! over the whole batch, or per sample.
//!
//! Reference: Wang, Bovik, Sheikh, Simoncelli, "Image quality assessment:
//! from error visibility to structural similarity" (IEEE TIP 2004).

use burn::config::Config;
use burn::prelude::*;

use super::fast_conv::DepthwiseConv;
use super::stats::{local_stats, LocalStats};
use super::window::WindowCache;
use super::{ensure_same_shape, ensure_valid_window, ensure_window_fits};
use crate::error;

/// Side of the Gaussian window used when none is given.
pub const DEFAULT_WINDOW_SIZE: usize = 11;

const C1: f64 = 0.01 * 0.01;
const C2: f64 = 0.03 * 0.03;

/// Reduced SSIM value.
#[derive(Debug, Clone, PartialEq)]
pub enum SsimScore {
    /// Mean over every sample, channel and pixel.
    Scalar(f64),
    /// One mean per sample, in batch order.
    PerSample(Vec<f64>),
}

impl SsimScore {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::PerSample(_) => None,
        }
    }

    pub fn per_sample(&self) -> Option<&[f64]> {
        match self {
            Self::Scalar(_) => None,
            Self::PerSample(v) => Some(v),
        }
    }

    /// Mean over the batch, whichever reduction produced the score.
    pub fn mean(&self) -> f64 {
        match self {
            Self::Scalar(v) => *v,
            Self::PerSample(v) if v.is_empty() => f64::NAN,
            Self::PerSample(v) => v.iter().sum::<f64>() / v.len() as f64,
        }
    }
}

/// Per-pixel SSIM map, shaped like the inputs.
///
/// Inputs are validated before any convolution runs: shapes first, then the
/// window size, then whether the window fits the image.
pub fn ssim_map_with_cache<B: DepthwiseConv>(
    im1: Tensor<B, 4>,
    im2: Tensor<B, 4>,
    window_size: usize,
    cache: &WindowCache<B>,
) -> error::Result<Tensor<B, 4>> {
    let dims = im1.dims();
    ensure_same_shape(dims, im2.dims())?;
    ensure_valid_window(window_size)?;
    ensure_window_fits(window_size, dims)?;

    let [_, channels, _, _] = dims;
    let window = cache.get_or_build(window_size, channels, &im1.device())?;
    let stats = local_stats(im1, im2, window, window_size)?;
    Ok(combine(stats))
}

/// [`ssim_map_with_cache`] with a throwaway window cache.
pub fn ssim_map<B: DepthwiseConv>(
    im1: Tensor<B, 4>,
    im2: Tensor<B, 4>,
    window_size: usize,
) -> error::Result<Tensor<B, 4>> {
    ssim_map_with_cache(im1, im2, window_size, &WindowCache::new())
}

/// SSIM reduced on the device: shape `[1]` if `size_average`, else `[N]`.
pub fn ssim_tensor_with_cache<B: DepthwiseConv>(
    im1: Tensor<B, 4>,
    im2: Tensor<B, 4>,
    window_size: usize,
    size_average: bool,
    cache: &WindowCache<B>,
) -> error::Result<Tensor<B, 1>> {
    let map = ssim_map_with_cache(im1, im2, window_size, cache)?;
    Ok(reduce(map, size_average))
}

/// SSIM between two batches, reusing windows from `cache`.
pub fn ssim_with_cache<B: DepthwiseConv>(
    im1: Tensor<B, 4>,
    im2: Tensor<B, 4>,
    window_size: usize,
    size_average: bool,
    cache: &WindowCache<B>,
) -> error::Result<SsimScore> {
    let reduced = ssim_tensor_with_cache(im1, im2, window_size, size_average, cache)?;
    Ok(if size_average {
        SsimScore::Scalar(reduced.into_scalar().elem())
    } else {
        SsimScore::PerSample(reduced.into_data().iter::<f64>().collect())
    })
}

/// SSIM between two `[N, C, H, W]` batches.
///
/// `window_size` must be odd, positive and no larger than `min(H, W)`.
/// With `size_average` the result is a single mean; otherwise one score per
/// sample is returned.
pub fn ssim<B: DepthwiseConv>(
    im1: Tensor<B, 4>,
    im2: Tensor<B, 4>,
    window_size: usize,
    size_average: bool,
) -> error::Result<SsimScore> {
    ssim_with_cache(im1, im2, window_size, size_average, &WindowCache::new())
}

fn combine<B: Backend>(stats: LocalStats<B>) -> Tensor<B, 4> {
    let LocalStats {
        mu1,
        mu2,
        var1,
        var2,
        covar,
    } = stats;

    let mu1_sq = mu1.clone() * mu1.clone();
    let mu2_sq = mu2.clone() * mu2.clone();
    let mu1_mu2 = mu1 * mu2;

    let numerator = (mu1_mu2.mul_scalar(2.0).add_scalar(C1)) * (covar.mul_scalar(2.0).add_scalar(C2));
    let denominator = (mu1_sq + mu2_sq).add_scalar(C1) * (var1 + var2).add_scalar(C2);
    numerator / denominator
}

fn reduce<B: Backend>(map: Tensor<B, 4>, size_average: bool) -> Tensor<B, 1> {
    if size_average {
        map.mean()
    } else {
        let [n, c, h, w] = map.dims();
        map.reshape([n, c * h * w]).mean_dim(1).reshape([n])
    }
}

// ── Stateful variant ─────────────────────────────────────────────────────────

/// Configuration for [`Ssim`].
#[derive(Config, Debug)]
pub struct SsimConfig {
    /// Side of the Gaussian window (odd).
    #[config(default = 11)]
    pub window_size: usize,
    /// Average over the whole batch instead of per sample.
    #[config(default = true)]
    pub size_average: bool,
}

impl SsimConfig {
    /// Initialize an [`Ssim`] metric, rejecting even or zero window sizes.
    pub fn init<B: DepthwiseConv>(&self) -> error::Result<Ssim<B>> {
        ensure_valid_window(self.window_size)?;
        Ok(Ssim {
            window_size: self.window_size,
            size_average: self.size_average,
            windows: WindowCache::new(),
        })
    }
}

/// SSIM with fixed window size and reduction, keeping its windows between
/// calls.
#[derive(Debug)]
pub struct Ssim<B: Backend> {
    window_size: usize,
    size_average: bool,
    windows: WindowCache<B>,
}

impl<B: DepthwiseConv> Default for Ssim<B> {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            size_average: true,
            windows: WindowCache::new(),
        }
    }
}

impl<B: DepthwiseConv> Ssim<B> {
    /// Same as [`ssim`] with this metric's configuration.
    pub fn forward(&self, im1: Tensor<B, 4>, im2: Tensor<B, 4>) -> error::Result<SsimScore> {
        ssim_with_cache(im1, im2, self.window_size, self.size_average, &self.windows)
    }

    /// Device-side variant of [`Ssim::forward`].
    pub fn forward_tensor(&self, im1: Tensor<B, 4>, im2: Tensor<B, 4>) -> error::Result<Tensor<B, 1>> {
        ssim_tensor_with_cache(im1, im2, self.window_size, self.size_average, &self.windows)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn size_average(&self) -> bool {
        self.size_average
    }
}
