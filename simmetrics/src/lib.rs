//! PSNR and SSIM similarity metrics for batches of images held in burn tensors.
//!
//! Inputs are `[N, C, H, W]` float tensors on any burn backend. PSNR expects
//! signed data in `[-1, 1]` and normalizes it internally; SSIM works on the
//! values as given.

pub mod config;
pub mod error;
pub mod metrics;
pub mod sweep;

pub use error::{MetricError, Result};
pub use metrics::fast_conv::DepthwiseConv;
pub use metrics::psnr::{psnr, psnr_ceiling, psnr_default, DEFAULT_PSNR_EPSILON};
pub use metrics::ssim::{ssim, Ssim, SsimConfig, SsimScore, DEFAULT_WINDOW_SIZE};
pub use metrics::to_unit_range;
pub use metrics::window::{build_window, WindowCache};
