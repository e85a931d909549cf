//! Gaussian averaging window for the windowed SSIM statistics.
//!
//! The window is a separable 2-D Gaussian (σ = 1.5) built as the outer
//! product of a normalized 1-D kernel with itself, replicated once per
//! channel so that it can drive a depthwise convolution:
//!
//!   g[i]    = exp(-(i - k/2)² / (2σ²)) / Σ exp(...)
//!   w[i, j] = g[i] · g[j]
//!
//! Weights are non-negative and sum to 1 within each channel.

use std::sync::{PoisonError, RwLock};

use burn::prelude::*;
use burn::tensor::{DType, Element};

use super::ensure_valid_window;
use crate::error::Result;

/// Standard deviation of the Gaussian window.
pub const WINDOW_SIGMA: f64 = 1.5;

/// Normalized 1-D Gaussian taps for an odd `window_size`.
pub fn gaussian_1d(window_size: usize) -> Result<Vec<f64>> {
    ensure_valid_window(window_size)?;

    let center = (window_size / 2) as f64;
    let denom = 2.0 * WINDOW_SIGMA * WINDOW_SIGMA;
    let mut taps: Vec<f64> = (0..window_size)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / denom).exp()
        })
        .collect();

    let sum: f64 = taps.iter().sum();
    for t in &mut taps {
        *t /= sum;
    }
    Ok(taps)
}

/// Build the `[channels, 1, k, k]` depthwise Gaussian window.
pub fn build_window<B: Backend>(window_size: usize, channels: usize, device: &B::Device) -> Result<Tensor<B, 4>> {
    let taps = gaussian_1d(window_size)?;

    let plane: Vec<f64> = taps
        .iter()
        .flat_map(|&row| taps.iter().map(move |&col| row * col))
        .collect();
    let data: Vec<f64> = std::iter::repeat_n(plane.iter().copied(), channels)
        .flatten()
        .collect();

    Ok(Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([channels, 1, window_size, window_size]))
}

// ── Window cache ─────────────────────────────────────────────────────────────

/// Identifies a built window. Together with the device it fully determines
/// the tensor, so a cached window never has to be converted before use.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowKey {
    pub window_size: usize,
    pub channels: usize,
    pub dtype: DType,
}

impl WindowKey {
    pub fn new<B: Backend>(window_size: usize, channels: usize) -> Self {
        Self {
            window_size,
            channels,
            dtype: <B::FloatElem as Element>::dtype(),
        }
    }
}

struct CachedWindow<B: Backend> {
    key: WindowKey,
    device: B::Device,
    window: Tensor<B, 4>,
}

/// Lazily populated store of Gaussian windows, owned by the caller.
///
/// Entries are inserted once and never mutated, so a shared reference can be
/// used from several threads at the same time.
pub struct WindowCache<B: Backend> {
    entries: RwLock<Vec<CachedWindow<B>>>,
}

impl<B: Backend> Default for WindowCache<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> std::fmt::Debug for WindowCache<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowCache").field("len", &self.len()).finish()
    }
}

impl<B: Backend> WindowCache<B> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Return the window for `(window_size, channels)` on `device`, building
    /// and caching it on first use.
    pub fn get_or_build(&self, window_size: usize, channels: usize, device: &B::Device) -> Result<Tensor<B, 4>> {
        let key = WindowKey::new::<B>(window_size, channels);

        if let Some(window) = self.lookup(&key, device) {
            log::trace!("window cache hit: {key:?}");
            return Ok(window);
        }

        let window = build_window::<B>(window_size, channels, device)?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have inserted the same window meanwhile.
        if let Some(existing) = entries.iter().find(|e| e.key == key && &e.device == device) {
            return Ok(existing.window.clone());
        }
        log::debug!("built gaussian window {key:?} on {device:?}");
        entries.push(CachedWindow {
            key,
            device: device.clone(),
            window: window.clone(),
        });
        Ok(window)
    }

    /// Number of cached windows.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &WindowKey, device: &B::Device) -> Option<Tensor<B, 4>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| &e.key == key && &e.device == device)
            .map(|e| e.window.clone())
    }
}
