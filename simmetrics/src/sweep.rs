//! Synthetic noise sweep: how PSNR and SSIM degrade as noise grows.
//!
//! Every trial draws a fresh signed reference batch in `[-1, 1]`, adds uniform
//! noise of each configured amplitude (clamped back into range) and scores
//! the pair. Everything stays in memory.

use anyhow::{Context, Result};
use burn::prelude::*;
use burn::tensor::Distribution;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::config::SweepConfig;
use crate::metrics::fast_conv::DepthwiseConv;
use crate::metrics::psnr::psnr;
use crate::metrics::ssim::{Ssim, SsimConfig};
use crate::metrics::to_unit_range;

/// Aggregated scores for one noise amplitude.
#[derive(Debug, Clone, Serialize)]
pub struct SweepRow {
    pub noise: f64,
    pub psnr_mean: f64,
    pub psnr_min: f64,
    pub ssim_mean: f64,
    pub ssim_min: f64,
}

/// Result of a sweep, one row per noise level in configuration order.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub config: SweepConfig,
    pub rows: Vec<SweepRow>,
}

impl SweepReport {
    /// Whether both mean scores never increase as the noise amplitude grows.
    pub fn is_monotonic(&self) -> bool {
        let mut rows: Vec<&SweepRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| a.noise.total_cmp(&b.noise));
        rows.windows(2)
            .all(|w| w[1].psnr_mean <= w[0].psnr_mean && w[1].ssim_mean <= w[0].ssim_mean)
    }
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [n, c, h, w] = self.config.shape();
        writeln!(
            f,
            "Noise sweep: {n}x{c}x{h}x{w}, {} trials, window {}, ε={:e}",
            self.config.trials, self.config.window_size, self.config.epsilon
        )?;
        writeln!(f, "  {:>8}  {:>10}  {:>10}  {:>8}  {:>8}", "noise", "PSNR (dB)", "min", "SSIM", "min")?;
        for row in &self.rows {
            writeln!(
                f,
                "  {:>8.3}  {:>10.2}  {:>10.2}  {:>8.4}  {:>8.4}",
                row.noise, row.psnr_mean, row.psnr_min, row.ssim_mean, row.ssim_min
            )?;
        }
        write!(
            f,
            "  monotonic: {}",
            if self.is_monotonic() { "yes" } else { "no" }
        )
    }
}

/// Sweep engine, generic over the Burn compute backend.
pub struct NoiseSweep<B: DepthwiseConv> {
    pub config: SweepConfig,
    metric: Ssim<B>,
    device: B::Device,
}

impl<B: DepthwiseConv> NoiseSweep<B> {
    pub fn new(config: SweepConfig, device: B::Device) -> Result<Self> {
        config.validate()?;
        let metric = SsimConfig::new()
            .with_window_size(config.window_size)
            .init::<B>()
            .context("invalid SSIM configuration")?;
        Ok(Self {
            config,
            metric,
            device,
        })
    }

    /// Run every trial at every noise level.
    pub fn run(&self) -> Result<SweepReport> {
        B::seed(self.config.seed);

        let levels = &self.config.noise_levels;
        let trials = self.config.trials as usize;
        let mut psnr_scores = vec![Vec::with_capacity(trials); levels.len()];
        let mut ssim_scores = vec![Vec::with_capacity(trials); levels.len()];

        let pb = ProgressBar::new((trials * levels.len()) as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Sweep [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=>-"),
        );

        for trial in 0..trials {
            let reference = Tensor::<B, 4>::random(self.config.shape(), Distribution::Uniform(-1.0, 1.0), &self.device);

            for (i, &level) in levels.iter().enumerate() {
                let candidate = self.degrade(reference.clone(), level);

                let p = psnr(reference.clone(), candidate.clone(), self.config.epsilon)
                    .with_context(|| format!("PSNR failed at noise {level}"))?;
                let s = self
                    .metric
                    .forward(to_unit_range(reference.clone()), to_unit_range(candidate))
                    .with_context(|| format!("SSIM failed at noise {level}"))?
                    .mean();

                log::debug!("trial {trial} noise {level}: psnr={p:.3} ssim={s:.5}");
                psnr_scores[i].push(p);
                ssim_scores[i].push(s);

                pb.set_message(format!("noise={level:.3} PSNR={p:.1}dB SSIM={s:.3}"));
                pb.inc(1);
            }
        }
        pb.finish_and_clear();

        let rows = levels
            .iter()
            .zip(psnr_scores.iter().zip(&ssim_scores))
            .map(|(&noise, (p, s))| SweepRow {
                noise,
                psnr_mean: mean(p),
                psnr_min: p.iter().copied().fold(f64::INFINITY, f64::min),
                ssim_mean: mean(s),
                ssim_min: s.iter().copied().fold(f64::INFINITY, f64::min),
            })
            .collect();

        Ok(SweepReport {
            config: self.config.clone(),
            rows,
        })
    }

    fn degrade(&self, reference: Tensor<B, 4>, level: f64) -> Tensor<B, 4> {
        if level == 0.0 {
            return reference;
        }
        let noise = Tensor::<B, 4>::random(reference.dims(), Distribution::Uniform(-level, level), &self.device);
        (reference + noise).clamp(-1.0, 1.0)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
