//! pixsched - time a sharpen + tone-curve pipeline under two schedules
//!
//! Runs the baseline (CPU strips) schedule, then the accelerated (GPU tiles)
//! schedule when an accelerator is present, and checks that both agree.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pixsched_compute::{
    accelerator_available, accelerator_available_for, compile, describe_backends, measure, policy,
    verify, ComputeError, DeviceApi, Feature, LutIndexing, MeasureConfig, OutputBuffer, Pipeline,
    Target,
};
use pixsched_core::Image;

#[derive(Parser)]
#[command(name = "pixsched")]
#[command(author, version, about = "Compare CPU and GPU schedules of a sharpen + tone-curve pipeline")]
#[command(long_about = "
Loads an RGB image, sharpens it and applies a gamma curve under two schedules:
a baseline CPU schedule and an accelerated GPU schedule. Prints the best
per-run time of each and checks the GPU output against the CPU output.

Examples:
  pixsched                              # images/rgb.png, native GPU API
  pixsched --data-dir assets -i city.png
  pixsched --device emulated -vv        # device semantics on the CPU
  pixsched --save curved.png --trials 5 --repeats 100
")]
struct Cli {
    /// Directory holding the input image
    #[arg(long, env = "PIXSCHED_DATA_DIR", default_value = "images")]
    data_dir: PathBuf,

    /// Input image, relative to the data directory
    #[arg(short, long, default_value = "rgb.png")]
    input: PathBuf,

    /// Timed trials per schedule (best is reported)
    #[arg(long, default_value_t = 3)]
    trials: u32,

    /// Runs per trial
    #[arg(long, default_value_t = 1000)]
    repeats: u32,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, default_value_t = 0)]
    threads: usize,

    /// Device API for the accelerated schedule
    #[arg(long, value_enum, default_value_t = DeviceArg::Auto)]
    device: DeviceArg,

    /// Run the accelerated schedule on the emulated device when no accelerator is found
    #[arg(long)]
    emulate: bool,

    /// Log every device call
    #[arg(long)]
    debug_device: bool,

    /// How sharpened values outside 0..=255 index the curve
    #[arg(long, value_enum, default_value_t = IndexingArg::Clamp)]
    indexing: IndexingArg,

    /// Write the baseline output as PNG
    #[arg(long)]
    save: Option<PathBuf>,

    /// List execution backends and exit
    #[arg(long)]
    backends: bool,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DeviceArg {
    Auto,
    Vulkan,
    Metal,
    Dx12,
    Gl,
    Emulated,
}

impl DeviceArg {
    fn api(self) -> DeviceApi {
        match self {
            Self::Auto => DeviceApi::native(),
            Self::Vulkan => DeviceApi::Vulkan,
            Self::Metal => DeviceApi::Metal,
            Self::Dx12 => DeviceApi::Dx12,
            Self::Gl => DeviceApi::Gl,
            Self::Emulated => DeviceApi::Emulated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IndexingArg {
    Clamp,
    Wrap16,
}

impl From<IndexingArg> for LutIndexing {
    fn from(arg: IndexingArg) -> Self {
        match arg {
            IndexingArg::Clamp => LutIndexing::Clamp,
            IndexingArg::Wrap16 => LutIndexing::Wrap16,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_time(t: Duration) {
    println!("{:.4} milliseconds", t.as_secs_f64() * 1000.0);
}

/// Device API to run the accelerated schedule on, `None` to skip it.
fn pick_device(cli: &Cli) -> Option<DeviceApi> {
    let api = cli.device.api();
    let found = match cli.device {
        DeviceArg::Auto => accelerator_available() && accelerator_available_for(api),
        _ => accelerator_available_for(api),
    };
    if found {
        Some(api)
    } else if cli.emulate {
        info!("no {api} accelerator, falling back to the emulated device");
        Some(DeviceApi::Emulated)
    } else {
        None
    }
}

fn run(cli: &Cli) -> Result<()> {
    let path = cli.data_dir.join(&cli.input);
    let input: Image = pixsched_io::load_image(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!(path = %path.display(), extent = %input.extent(), "loaded input");

    let config = MeasureConfig::new(cli.trials, cli.repeats);
    let indexing = LutIndexing::from(cli.indexing);

    let pipeline = Pipeline::new(input.clone()).with_indexing(indexing);
    let baseline = compile(&pipeline, &policy::baseline(), &Target::host())
        .context("Failed to compile the baseline schedule")?;
    debug!(plan = %baseline.plan(), "baseline");

    let mut out = OutputBuffer::like(&input)?;
    println!("Testing performance on CPU:");
    print_time(measure(&baseline, &mut out, &config)?);
    let reference = out.into_image()?;

    if let Some(save) = &cli.save {
        pixsched_io::save_image(save, &reference)
            .with_context(|| format!("Failed to write {}", save.display()))?;
        info!(path = %save.display(), "saved baseline output");
    }

    let Some(api) = pick_device(cli) else {
        println!("Not testing performance on GPU, because I can't find an accelerator");
        return Ok(());
    };
    let mut target = Target::for_device(api);
    if cli.debug_device {
        target = target.with_feature(Feature::Debug);
    }

    // fresh pipeline per schedule
    let pipeline = Pipeline::new(input.clone()).with_indexing(indexing);
    let accelerated = compile(&pipeline, &policy::accelerated(), &target)
        .with_context(|| format!("Failed to compile the accelerated schedule for {target}"))?;
    debug!(plan = %accelerated.plan(), "accelerated");

    let mut out = OutputBuffer::like(&input)?;
    println!("Testing performance on GPU:");
    print_time(measure(&accelerated, &mut out, &config)?);

    verify(&accelerated, &input, &reference)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    if cli.backends {
        print!("{}", describe_backends());
        return Ok(());
    }

    match run(&cli) {
        Err(e) => match exit_code(&e) {
            Some(code) => {
                eprintln!("{e}");
                std::process::exit(code);
            }
            None => Err(e),
        },
        ok => ok,
    }
}

/// Process status for errors that bypass the default exit path; a mismatch
/// between the schedules exits with -1.
fn exit_code(err: &anyhow::Error) -> Option<i32> {
    err.downcast_ref::<ComputeError>()
        .and_then(ComputeError::as_mismatch)
        .map(|_| -1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixsched_compute::{MismatchError, RuntimeError};
    use pixsched_core::Extent;

    #[test]
    fn test_mismatch_exits_minus_one() {
        let m = MismatchError { x: 5, y: 7, c: 1, output: 3, reference: 4 };
        let err = anyhow::Error::from(ComputeError::from(m));
        assert_eq!(exit_code(&err), Some(-1));

        let wrapped = err.context("verify failed");
        assert_eq!(exit_code(&wrapped), Some(-1));
    }

    #[test]
    fn test_other_errors_use_default_exit() {
        let runtime = ComputeError::from(RuntimeError::ExtentMismatch {
            expected: Extent::new(2, 2, 3),
            actual: Extent::new(1, 1, 3),
        });
        assert_eq!(exit_code(&anyhow::Error::from(runtime)), None);
        assert_eq!(exit_code(&anyhow::anyhow!("Failed to load rgb.png")), None);
    }
}
