//! Timing and correctness harnesses.

use std::time::{Duration, Instant};

use pixsched_core::Image;
use tracing::{debug, trace};

use crate::buffer::OutputBuffer;
use crate::compile::Realize;
use crate::error::{ComputeError, ComputeResult, MismatchError, RuntimeError};

/// Repetition counts for [`measure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureConfig {
    /// Untimed runs before the first trial.
    pub warmup: u32,
    /// Timed trials; the fastest one is reported.
    pub trials: u32,
    /// Runs per trial, averaged.
    pub repeats_per_trial: u32,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            warmup: 1,
            trials: 3,
            repeats_per_trial: 1000,
        }
    }
}

impl MeasureConfig {
    pub fn new(trials: u32, repeats_per_trial: u32) -> Self {
        Self {
            trials,
            repeats_per_trial,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ComputeResult<()> {
        if self.trials == 0 {
            return Err(ComputeError::InvalidConfig("trials must be at least 1".into()));
        }
        if self.repeats_per_trial == 0 {
            return Err(ComputeError::InvalidConfig("repeats_per_trial must be at least 1".into()));
        }
        Ok(())
    }
}

/// Best per-run time of `artifact` over `config.trials` trials.
///
/// Every trial ends with [`OutputBuffer::copy_to_host`] inside the timed
/// region, so device work is fully accounted for.
pub fn measure<R: Realize + ?Sized>(
    artifact: &R,
    out: &mut OutputBuffer,
    config: &MeasureConfig,
) -> ComputeResult<Duration> {
    config.validate()?;
    trace!(?config, "measure");

    for _ in 0..config.warmup {
        artifact.realize(out)?;
    }
    out.copy_to_host()?;

    let mut best = Duration::MAX;
    for trial in 0..config.trials {
        let start = Instant::now();
        for _ in 0..config.repeats_per_trial {
            artifact.realize(out)?;
        }
        out.copy_to_host()?;
        let per_run = start.elapsed() / config.repeats_per_trial;
        debug!(trial, ?per_run, "trial finished");
        best = best.min(per_run);
    }
    Ok(best)
}

/// Realizes `artifact` over `input`'s extent and compares with `reference`.
///
/// # Errors
///
/// [`ComputeError::Mismatch`] at the first differing sample, scanning
/// channels outermost, then rows, then columns.
pub fn verify<R: Realize + ?Sized>(artifact: &R, input: &Image, reference: &Image) -> ComputeResult<()> {
    trace!("verify");
    if reference.extent() != input.extent() {
        return Err(RuntimeError::ExtentMismatch {
            expected: input.extent(),
            actual: reference.extent(),
        }
        .into());
    }
    let mut out = OutputBuffer::like(input)?;
    artifact.realize(&mut out)?;
    out.copy_to_host()?;
    let output = out.into_image()?;

    match first_mismatch(&output, reference)? {
        Some(m) => Err(m.into()),
        None => Ok(()),
    }
}

/// First `(x, y, c)` where `output` and `reference` differ, in `c, y, x`
/// order.
pub fn first_mismatch(output: &Image, reference: &Image) -> ComputeResult<Option<MismatchError>> {
    let extent = output.extent();
    if reference.extent() != extent {
        return Err(RuntimeError::ExtentMismatch {
            expected: extent,
            actual: reference.extent(),
        }
        .into());
    }
    for c in 0..extent.channels {
        for y in 0..extent.height {
            for x in 0..extent.width {
                let (o, r) = (output.get(x, y, c), reference.get(x, y, c));
                if o != r {
                    return Ok(Some(MismatchError { x, y, c, output: o, reference: r }));
                }
            }
        }
    }
    Ok(None)
}
