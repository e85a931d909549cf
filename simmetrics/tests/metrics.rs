//! End-to-end checks of the public metric API on the NdArray backend.

use burn::backend::NdArray;
use burn::prelude::*;
use burn::tensor::Distribution;

use simmetrics::metrics::ssim::ssim_with_cache;
use simmetrics::{
    psnr, psnr_ceiling, psnr_default, ssim, to_unit_range, MetricError, SsimConfig, SsimScore, WindowCache,
    DEFAULT_PSNR_EPSILON, DEFAULT_WINDOW_SIZE,
};

type B = NdArray;

fn signed(shape: [usize; 4]) -> Tensor<B, 4> {
    Tensor::random(shape, Distribution::Uniform(-1.0, 1.0), &Default::default())
}

#[test]
fn constant_gray_pair() {
    let device = Default::default();
    let x = Tensor::<B, 4>::zeros([1, 1, 8, 8], &device);
    let y = Tensor::<B, 4>::zeros([1, 1, 8, 8], &device);

    let p = psnr_default(x.clone(), y.clone()).unwrap();
    assert!((p - psnr_ceiling(DEFAULT_PSNR_EPSILON)).abs() < 1e-9);

    // The default 11x11 window does not fit an 8x8 image.
    assert!(matches!(
        ssim(x.clone(), y.clone(), DEFAULT_WINDOW_SIZE, true),
        Err(MetricError::WindowTooLarge { .. })
    ));
    let s = ssim(to_unit_range(x), to_unit_range(y), 7, true).unwrap();
    assert!((s.mean() - 1.0).abs() < 1e-6);
}

#[test]
fn noise_lowers_both_metrics_on_average() {
    let amplitudes = [0.05, 0.2, 0.6];
    let trials = 3;
    let mut psnr_means = [0.0; 3];
    let mut ssim_means = [0.0; 3];

    let cache = WindowCache::<B>::new();
    for _ in 0..trials {
        let x = signed([2, 3, 32, 32]);
        for (i, &a) in amplitudes.iter().enumerate() {
            let noise = Tensor::<B, 4>::random(x.dims(), Distribution::Uniform(-a, a), &x.device());
            let y = x.clone() + noise;
            psnr_means[i] += psnr(x.clone(), y.clone(), DEFAULT_PSNR_EPSILON).unwrap() / trials as f64;
            ssim_means[i] += ssim_with_cache(to_unit_range(x.clone()), to_unit_range(y), 11, true, &cache)
                .unwrap()
                .mean()
                / trials as f64;
        }
    }
    assert_eq!(cache.len(), 1);

    for i in 1..amplitudes.len() {
        assert!(psnr_means[i] < psnr_means[i - 1], "{psnr_means:?}");
        assert!(ssim_means[i] < ssim_means[i - 1], "{ssim_means:?}");
    }
}

#[test]
fn batch_reduction_modes_agree() {
    let x = to_unit_range(signed([5, 3, 16, 16]));
    let y = to_unit_range(signed([5, 3, 16, 16]));

    let overall = ssim(x.clone(), y.clone(), 9, true).unwrap();
    let per_sample = ssim(x, y, 9, false).unwrap();

    assert!(matches!(overall, SsimScore::Scalar(_)));
    assert_eq!(per_sample.per_sample().map(<[f64]>::len), Some(5));
    assert!((overall.mean() - per_sample.mean()).abs() < 1e-5);
}

#[test]
fn stateful_and_functional_agree() {
    let metric = SsimConfig::new().init::<B>().unwrap();
    let x = to_unit_range(signed([2, 1, 24, 24]));
    let y = to_unit_range(signed([2, 1, 24, 24]));

    let a = metric.forward(x.clone(), y.clone()).unwrap();
    let b = ssim(y, x, DEFAULT_WINDOW_SIZE, true).unwrap();
    assert!((a.mean() - b.mean()).abs() < 1e-6);
}

#[test]
fn even_window_is_an_error() {
    let x = signed([1, 3, 16, 16]);
    assert_eq!(
        ssim(x.clone(), x, 4, true).unwrap_err(),
        MetricError::InvalidWindowSize(4)
    );
}
