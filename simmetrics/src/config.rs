use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::metrics::psnr::DEFAULT_PSNR_EPSILON;
use crate::metrics::ssim::DEFAULT_WINDOW_SIZE;

/// Compute backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// NdArray on the CPU, with the GEMM depthwise convolution.
    Cpu,
    /// Wgpu (Metal on macOS, Vulkan/DX12 elsewhere).
    Gpu,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of a synthetic noise sweep.
///
/// A random signed reference batch is degraded with uniform noise of each
/// amplitude in `noise_levels`, and PSNR/SSIM are averaged over `trials`
/// fresh reference batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Images per batch.
    pub batch: usize,
    /// Channels per image.
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    /// Half-width of the uniform noise added to the signed reference.
    pub noise_levels: Vec<f64>,
    /// Reference batches drawn per noise level.
    pub trials: u32,
    /// Seed for the backend RNG.
    pub seed: u64,
    /// SSIM window side (odd).
    pub window_size: usize,
    /// PSNR epsilon.
    pub epsilon: f64,
    /// Compute device.
    pub device: DeviceKind,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch: 4,
            channels: 3,
            height: 64,
            width: 64,
            noise_levels: vec![0.0, 0.05, 0.1, 0.2, 0.4, 0.8],
            trials: 4,
            seed: 0,
            window_size: DEFAULT_WINDOW_SIZE,
            epsilon: DEFAULT_PSNR_EPSILON,
            device: DeviceKind::Cpu,
        }
    }
}

impl SweepConfig {
    /// Shape of each generated batch.
    pub fn shape(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.batch > 0 && self.channels > 0,
            "batch and channels must be positive, got {}x{}",
            self.batch,
            self.channels
        );
        anyhow::ensure!(
            self.window_size % 2 == 1,
            "window size must be a positive odd integer, got {}",
            self.window_size
        );
        anyhow::ensure!(
            self.window_size <= self.height.min(self.width),
            "window size {} does not fit {}x{} images",
            self.window_size,
            self.height,
            self.width
        );
        anyhow::ensure!(
            !self.noise_levels.is_empty(),
            "at least one noise level is required"
        );
        anyhow::ensure!(
            self.noise_levels.iter().all(|l| l.is_finite() && *l >= 0.0),
            "noise levels must be finite and non-negative, got {:?}",
            self.noise_levels
        );
        anyhow::ensure!(self.trials > 0, "trials must be at least 1");
        anyhow::ensure!(
            self.epsilon > 0.0 && self.epsilon.is_finite(),
            "epsilon must be positive, got {}",
            self.epsilon
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        SweepConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_window() {
        let even = SweepConfig {
            window_size: 8,
            ..Default::default()
        };
        assert!(even.validate().is_err());

        let too_large = SweepConfig {
            height: 8,
            ..Default::default()
        };
        let err = too_large.validate().unwrap_err();
        assert!(err.to_string().contains("does not fit"), "{err}");
    }

    #[test]
    fn rejects_negative_noise() {
        let config = SweepConfig {
            noise_levels: vec![0.1, -0.2],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_roundtrip() {
        let config = SweepConfig {
            device: DeviceKind::Gpu,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"device\":\"gpu\""));
        let back: SweepConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.shape(), config.shape());
        assert_eq!(back.noise_levels, config.noise_levels);
        assert_eq!(back.device, DeviceKind::Gpu);
    }
}
