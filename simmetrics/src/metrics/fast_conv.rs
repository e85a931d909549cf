//! Depthwise Conv2d using im2col + ndarray GEMM (→ BLAS).
//!
//! The windowed statistics only ever need a stride-1 grouped convolution
//! where every channel is filtered by its own `[1, k, k]` kernel. Burn's
//! NdArray backend runs that as a naive loop, so this module:
//!   - Restructures each (sample, channel) plane as im2col → `general_mat_mul`.
//!   - Extracts/creates tensors via direct ndarray access (memcpy, not iterator).
//!   - Uses a `DepthwiseConv` trait so f32 NdArray gets the fast path while
//!     other backends (f64 NdArray, Wgpu) fall back to Burn's built-in
//!     grouped conv.

use burn::backend::wgpu::Wgpu;
use burn::backend::NdArray;
use burn::prelude::*;
use burn::tensor::module::conv2d;
use burn::tensor::ops::ConvOptions;
use burn::tensor::TensorPrimitive;
use burn_ndarray::{NdArrayTensor, NdArrayTensorFloat};
use ndarray::{ArcArray, ArrayView2, ArrayViewMut2, IxDyn};

// ── DepthwiseConv trait ──────────────────────────────────────────────────────

/// Backend-specific depthwise convolution dispatch.
///
/// `weight` is `[C, 1, k, k]`, `input` is `[N, C, H, W]`; stride and dilation
/// are 1 and the same `padding` is applied on both spatial axes.
pub trait DepthwiseConv: Backend {
    fn depthwise_conv2d(input: Tensor<Self, 4>, weight: Tensor<Self, 4>, padding: usize) -> Tensor<Self, 4>;
}

impl DepthwiseConv for NdArray {
    fn depthwise_conv2d(input: Tensor<Self, 4>, weight: Tensor<Self, 4>, padding: usize) -> Tensor<Self, 4> {
        depthwise_ndarray(input, weight, padding)
    }
}

impl DepthwiseConv for NdArray<f64> {
    fn depthwise_conv2d(input: Tensor<Self, 4>, weight: Tensor<Self, 4>, padding: usize) -> Tensor<Self, 4> {
        depthwise_burn(input, weight, padding)
    }
}

impl DepthwiseConv for Wgpu {
    fn depthwise_conv2d(input: Tensor<Self, 4>, weight: Tensor<Self, 4>, padding: usize) -> Tensor<Self, 4> {
        depthwise_burn(input, weight, padding)
    }
}

/// Convenience wrapper: dispatches to fast NdArray path or Burn fallback.
pub fn depthwise_conv2d<B: DepthwiseConv>(
    input: Tensor<B, 4>,
    weight: Tensor<B, 4>,
    padding: usize,
) -> Tensor<B, 4> {
    B::depthwise_conv2d(input, weight, padding)
}

/// Grouped convolution through Burn's own `conv2d`, one group per channel.
pub fn depthwise_burn<B: Backend>(input: Tensor<B, 4>, weight: Tensor<B, 4>, padding: usize) -> Tensor<B, 4> {
    let [channels, _, _, _] = weight.dims();
    let options = ConvOptions::new([1, 1], [padding, padding], [1, 1], channels);
    conv2d(input, weight, None, options)
}

// ── NdArray fast tensor access ───────────────────────────────────────────────

/// Extract f32 data from a Tensor<NdArray, 4> by direct ndarray access.
fn nd_extract(tensor: Tensor<NdArray, 4>) -> Vec<f32> {
    match tensor.into_primitive().tensor() {
        NdArrayTensorFloat::F32(t) => arc_to_vec_f32(t.array),
        NdArrayTensorFloat::F64(t) => t.array.iter().map(|&v| v as f32).collect(),
    }
}

/// Extract ArcArray<f32> to Vec<f32> via memcpy (not iterator).
fn arc_to_vec_f32(arr: ArcArray<f32, IxDyn>) -> Vec<f32> {
    if arr.is_standard_layout() {
        match arr.try_into_owned_nocopy() {
            Ok(owned) => owned.into_raw_vec_and_offset().0,
            Err(arr) => arr.iter().copied().collect(),
        }
    } else {
        // Broadcast windows (expand) and permuted views land here
        arr.iter().copied().collect()
    }
}

/// Create a Tensor<NdArray, 4> from Vec<f32> without extra copies.
fn nd_create(data: Vec<f32>, shape: [usize; 4]) -> Tensor<NdArray, 4> {
    let array = ndarray::ArrayD::from_shape_vec(IxDyn(&shape), data)
        .expect("output buffer length matches its shape")
        .into_shared();
    let nd_tensor = NdArrayTensor::new(array);
    Tensor::from_primitive(TensorPrimitive::Float(NdArrayTensorFloat::F32(nd_tensor)))
}

// ── Depthwise Conv2d (NdArray) ───────────────────────────────────────────────

fn depthwise_ndarray(input: Tensor<NdArray, 4>, weight: Tensor<NdArray, 4>, padding: usize) -> Tensor<NdArray, 4> {
    let [batch, channels, h, w] = input.dims();
    let [w_channels, _, kh, kw] = weight.dims();
    debug_assert_eq!(channels, w_channels, "one kernel per channel");

    let out_h = (h + 2 * padding + 1).saturating_sub(kh);
    let out_w = (w + 2 * padding + 1).saturating_sub(kw);
    let col_k = kh * kw;
    let spatial_total = out_h * out_w;

    let weight_data = nd_extract(weight);
    let input_data = nd_extract(input);

    let mut output_flat = vec![0.0f32; batch * channels * spatial_total];
    if spatial_total == 0 {
        return nd_create(output_flat, [batch, channels, out_h, out_w]);
    }

    // Tile by output rows.  128 MiB per tile.
    let max_floats = 32 * 1024 * 1024;
    let tile_rows = (max_floats / (col_k * out_w)).max(1).min(out_h);
    let mut col_buf = vec![0.0f32; col_k * tile_rows * out_w];

    for plane in 0..batch * channels {
        let c = plane % channels;
        let in_base = plane * h * w;
        let kernel = ArrayView2::from_shape((1, col_k), &weight_data[c * col_k..(c + 1) * col_k])
            .expect("kernel row is kh * kw long");

        for tile_start in (0..out_h).step_by(tile_rows) {
            let tile_end = (tile_start + tile_rows).min(out_h);
            let tile_spatial = (tile_end - tile_start) * out_w;

            col_buf[..col_k * tile_spatial].fill(0.0);

            // ── im2col (one input channel per plane) ──────────────
            for kkh in 0..kh {
                let oh_lo = padding.saturating_sub(kkh).max(tile_start);
                let oh_hi = (h + padding).saturating_sub(kkh).min(tile_end);

                for kkw in 0..kw {
                    let ow_lo = padding.saturating_sub(kkw);
                    let ow_hi = (w + padding).saturating_sub(kkw).min(out_w);
                    if ow_lo >= ow_hi {
                        continue;
                    }
                    let col_row = (kkh * kw + kkw) * tile_spatial;
                    let run = ow_hi - ow_lo;

                    for oh in oh_lo..oh_hi {
                        let ih = oh + kkh - padding;
                        let src = in_base + ih * w + ow_lo + kkw - padding;
                        let dst = col_row + (oh - tile_start) * out_w + ow_lo;
                        col_buf[dst..dst + run].copy_from_slice(&input_data[src..src + run]);
                    }
                }
            }

            // ── GEMM via ndarray → BLAS ───────────────────────────
            let col_view = ArrayView2::from_shape((col_k, tile_spatial), &col_buf[..col_k * tile_spatial])
                .expect("column buffer sized for the tile");
            let dst = plane * spatial_total + tile_start * out_w;
            let mut out_view = ArrayViewMut2::from_shape((1, tile_spatial), &mut output_flat[dst..dst + tile_spatial])
                .expect("output slice sized for the tile");
            ndarray::linalg::general_mat_mul(1.0f32, &kernel, &col_view, 0.0f32, &mut out_view);
        }
    }

    nd_create(output_flat, [batch, channels, out_h, out_w])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;

    type B = NdArray;

    fn to_vec(t: Tensor<B, 4>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    #[test]
    fn fast_path_matches_burn_conv() {
        let device = Default::default();
        let input = Tensor::<B, 4>::random([2, 3, 13, 9], Distribution::Uniform(-1.0, 1.0), &device);
        let weight = Tensor::<B, 4>::random([3, 1, 5, 5], Distribution::Uniform(0.0, 1.0), &device);

        let fast = depthwise_conv2d(input.clone(), weight.clone(), 2);
        let reference = depthwise_burn(input, weight, 2);
        assert_eq!(fast.dims(), [2, 3, 13, 9]);
        assert_eq!(reference.dims(), [2, 3, 13, 9]);

        for (a, b) in to_vec(fast).iter().zip(to_vec(reference)) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn channels_do_not_mix() {
        let device = Default::default();
        // Channel 0 is all ones, channel 1 all zeros.
        let ones = Tensor::<B, 4>::ones([1, 1, 6, 6], &device);
        let zeros = Tensor::<B, 4>::zeros([1, 1, 6, 6], &device);
        let input = Tensor::cat(vec![ones, zeros], 1);
        let weight = Tensor::<B, 4>::ones([2, 1, 3, 3], &device).div_scalar(9.0);

        let out = to_vec(depthwise_conv2d(input, weight, 1));
        let (c0, c1) = out.split_at(36);
        // Center pixels see the full 3x3 neighbourhood, corners only 4 taps.
        assert!((c0[7] - 1.0).abs() < 1e-6);
        assert!((c0[0] - 4.0 / 9.0).abs() < 1e-6);
        assert!(c1.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn double_precision_matches_fast_path() {
        let device = Default::default();
        let input = Tensor::<B, 4>::random([1, 2, 10, 7], Distribution::Uniform(-1.0, 1.0), &device);
        let weight = Tensor::<B, 4>::random([2, 1, 3, 3], Distribution::Uniform(0.0, 1.0), &device);
        let input64 = Tensor::<NdArray<f64>, 4>::from_data(input.to_data().convert::<f64>(), &device);
        let weight64 = Tensor::<NdArray<f64>, 4>::from_data(weight.to_data().convert::<f64>(), &device);

        let fast = to_vec(depthwise_conv2d(input, weight, 1));
        let double: Vec<f64> = depthwise_conv2d(input64, weight64, 1).into_data().iter::<f64>().collect();
        assert_eq!(fast.len(), double.len());
        for (a, b) in fast.iter().zip(double) {
            assert!((*a as f64 - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn unpadded_output_shrinks() {
        let device = Default::default();
        let input = Tensor::<B, 4>::ones([1, 2, 7, 8], &device);
        let weight = Tensor::<B, 4>::ones([2, 1, 3, 3], &device);
        let out = depthwise_conv2d(input, weight, 0);
        assert_eq!(out.dims(), [1, 2, 5, 6]);
        assert!(to_vec(out).iter().all(|&v| (v - 9.0).abs() < 1e-5));
    }
}
