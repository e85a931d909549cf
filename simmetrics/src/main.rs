use anyhow::Result;
use burn::backend::wgpu::{Wgpu, WgpuDevice};
use burn::backend::NdArray;
use clap::{Parser, Subcommand};

use simmetrics::config::{DeviceKind, SweepConfig};
use simmetrics::metrics::window::{gaussian_1d, WINDOW_SIGMA};
use simmetrics::sweep::NoiseSweep;
use simmetrics::{psnr_ceiling, DepthwiseConv, DEFAULT_PSNR_EPSILON, DEFAULT_WINDOW_SIZE};

/// Image similarity metrics (PSNR, SSIM) on Burn tensors.
///
/// Diagnostics for the metrics engine. Nothing is read from disk: the sweep
/// scores synthetic batches generated in memory.
#[derive(Parser)]
#[command(name = "simmetrics", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score random batches against noisy copies at increasing noise levels.
    Sweep {
        /// Images per batch.
        #[arg(long, default_value_t = 4)]
        batch: usize,

        /// Channels per image.
        #[arg(long, default_value_t = 3)]
        channels: usize,

        /// Image height in pixels.
        #[arg(long, default_value_t = 64)]
        height: usize,

        /// Image width in pixels.
        #[arg(long, default_value_t = 64)]
        width: usize,

        /// Comma-separated noise amplitudes (signed range).
        #[arg(long, value_delimiter = ',', default_value = "0,0.05,0.1,0.2,0.4,0.8")]
        levels: Vec<f64>,

        /// Reference batches drawn per noise level.
        #[arg(long, default_value_t = 4)]
        trials: u32,

        /// RNG seed.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// SSIM window size (odd).
        #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
        window_size: usize,

        /// PSNR epsilon (sets the ceiling for identical images).
        #[arg(long, default_value_t = DEFAULT_PSNR_EPSILON)]
        epsilon: f64,

        /// Compute device (cpu or gpu).
        #[arg(long, default_value = "cpu", value_enum)]
        device: DeviceKind,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the 1-D Gaussian taps of a window.
    Window {
        /// Window size (odd).
        #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
        window_size: usize,
    },
}

/// Run the sweep command with a specific backend.
fn run_sweep<B: DepthwiseConv>(config: SweepConfig, json: bool, device: B::Device) -> Result<()> {
    let sweep = NoiseSweep::<B>::new(config, device)?;
    let report = sweep.run()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
        println!("  PSNR ceiling: {:.2} dB", psnr_ceiling(report.config.epsilon));
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sweep {
            batch,
            channels,
            height,
            width,
            levels,
            trials,
            seed,
            window_size,
            epsilon,
            device,
            json,
        } => {
            let config = SweepConfig {
                batch,
                channels,
                height,
                width,
                noise_levels: levels,
                trials,
                seed,
                window_size,
                epsilon,
                device,
            };
            match device {
                DeviceKind::Cpu => {
                    run_sweep::<NdArray>(config, json, Default::default())?;
                }
                DeviceKind::Gpu => {
                    eprintln!("Using GPU (WGPU/Metal)");
                    run_sweep::<Wgpu>(config, json, WgpuDevice::default())?;
                }
            }
        }

        Commands::Window { window_size } => {
            let taps = gaussian_1d(window_size)?;
            let sum: f64 = taps.iter().sum();
            println!("Gaussian window: size={window_size} sigma={WINDOW_SIGMA}");
            for (i, tap) in taps.iter().enumerate() {
                let offset = i as i64 - (window_size / 2) as i64;
                println!("  {offset:>+3}  {tap:.6}");
            }
            println!("  sum={sum:.9}");
        }
    }

    Ok(())
}
