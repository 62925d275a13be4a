//! Compiling a scheduled pipeline into a runnable artifact.

use std::fmt;

use pixsched_core::{Extent, Image};
use tracing::{debug, trace};

use crate::backend::cpu_backend::StripExecutor;
use crate::backend::tiled_backend::TileExecutor;
#[cfg(feature = "wgpu")]
use crate::backend::wgpu_backend::WgpuExecutor;
use crate::backend::Backend;
use crate::buffer::OutputBuffer;
use crate::error::{ComputeResult, RuntimeError};
use crate::pipeline::{Pipeline, StageId};
use crate::plan::{lower, Plan};
use crate::schedule::{Schedule, Var};
use crate::target::Target;

/// Something that computes the pipeline output into a buffer.
pub trait Realize {
    /// Extent the output buffer must have.
    fn extent(&self) -> Extent;

    /// Computes the output into `out`.
    ///
    /// Device artifacts may return before the device has finished; call
    /// [`OutputBuffer::copy_to_host`] before reading.
    fn realize(&self, out: &mut OutputBuffer) -> ComputeResult<()>;

    /// Realizes into a fresh buffer and returns its host copy.
    fn realize_image(&self) -> ComputeResult<Image> {
        let mut out = OutputBuffer::new(self.extent())?;
        self.realize(&mut out)?;
        out.copy_to_host()?;
        out.into_image()
    }
}

enum Engine {
    Strips(StripExecutor),
    Tiles { exec: TileExecutor, debug: bool },
    #[cfg(feature = "wgpu")]
    Wgpu(WgpuExecutor),
}

/// A pipeline lowered for one schedule and target.
pub struct Artifact {
    name: String,
    plan: Plan,
    target: Target,
    extent: Extent,
    engine: Engine,
}

/// Validates `schedule`, lowers it for `target` and prepares the backend.
///
/// # Errors
///
/// [`ScheduleError`](crate::ScheduleError) for contradictory or unsupported
/// directives; [`RuntimeError`] when the target's device cannot be opened or
/// a kernel fails to compile.
pub fn compile(pipeline: &Pipeline, schedule: &Schedule, target: &Target) -> ComputeResult<Artifact> {
    trace!(schedule = schedule.name(), %target, extent = %pipeline.extent(), "compile");
    let plan = lower(schedule, target)?;
    debug!(schedule = schedule.name(), %plan, "lowered");

    let engine = match plan {
        Plan::Strips(p) => Engine::Strips(StripExecutor::new(p, pipeline.clone())),
        Plan::Tiles(p) => match target.device_api() {
            Some(api) if api.is_emulated() => Engine::Tiles {
                exec: TileExecutor::new(p, pipeline.clone()),
                debug: target.is_debug(),
            },
            #[cfg(feature = "wgpu")]
            Some(api) => Engine::Wgpu(WgpuExecutor::new(p, pipeline, api, target.is_debug())?),
            #[cfg(not(feature = "wgpu"))]
            Some(api) => return Err(RuntimeError::NoAdapter { api }.into()),
            // lower() rejects device plans on host targets
            None => return Err(crate::ScheduleError::DeviceScheduleOnHost { stage: StageId::Curved }.into()),
        },
    };

    Ok(Artifact {
        name: schedule.name().to_string(),
        plan,
        target: target.clone(),
        extent: pipeline.extent(),
        engine,
    })
}

impl Artifact {
    /// Name of the schedule this was compiled from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Backend that runs this artifact.
    pub fn backend(&self) -> Backend {
        match self.engine {
            Engine::Strips(_) => Backend::HostStrips,
            Engine::Tiles { .. } => Backend::HostTiles,
            #[cfg(feature = "wgpu")]
            Engine::Wgpu(_) => Backend::Wgpu,
        }
    }

    fn check_bounds(&self, actual: Extent) -> ComputeResult<()> {
        if actual != self.extent {
            return Err(RuntimeError::ExtentMismatch { expected: self.extent, actual }.into());
        }
        match self.plan.channels().bound {
            Some(bound) if bound != actual.channels => Err(RuntimeError::BoundViolation {
                stage: StageId::Curved,
                var: Var::C,
                bound,
                actual: actual.channels,
            }
            .into()),
            _ => Ok(()),
        }
    }
}

impl Realize for Artifact {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn realize(&self, out: &mut OutputBuffer) -> ComputeResult<()> {
        trace!(artifact = %self.name, "realize");
        self.check_bounds(out.extent())?;
        match &self.engine {
            Engine::Strips(exec) => {
                exec.run(out.host_mut());
                Ok(())
            }
            Engine::Tiles { exec, debug } => exec.realize_emulated(out, *debug),
            #[cfg(feature = "wgpu")]
            Engine::Wgpu(exec) => exec.realize(out),
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("name", &self.name)
            .field("target", &self.target.to_string())
            .field("backend", &self.backend().name())
            .field("plan", &self.plan.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Location;
    use crate::policy;
    use crate::target::DeviceApi;

    fn input(channels: u32) -> Image {
        Image::from_fn(10, 9, channels, |x, y, c| ((x * 61 + y * 17 + c * 5) % 256) as u8).unwrap()
    }

    #[test]
    fn test_baseline_runs_on_host() {
        let pipeline = Pipeline::new(input(3));
        let artifact = compile(&pipeline, &policy::baseline(), &Target::host()).unwrap();
        assert_eq!(artifact.backend(), Backend::HostStrips);
        assert_eq!(artifact.name(), "baseline");

        let mut out = OutputBuffer::like(pipeline.input()).unwrap();
        artifact.realize(&mut out).unwrap();
        assert_eq!(out.location(), Location::Host);
        assert_eq!(out.host().unwrap(), pipeline.realize_reference().unwrap().data());
    }

    #[test]
    fn test_accelerated_emulated() {
        let pipeline = Pipeline::new(input(3));
        let target = Target::for_device(DeviceApi::Emulated);
        let artifact = compile(&pipeline, &policy::accelerated(), &target).unwrap();
        assert_eq!(artifact.backend(), Backend::HostTiles);
        assert!(artifact.plan().is_device());
        assert_eq!(artifact.realize_image().unwrap(), pipeline.realize_reference().unwrap());
    }

    #[test]
    fn test_extent_mismatch() {
        let pipeline = Pipeline::new(input(3));
        let artifact = compile(&pipeline, &policy::baseline(), &Target::host()).unwrap();
        let mut out = OutputBuffer::new(Extent::new(3, 3, 3)).unwrap();
        let err = artifact.realize(&mut out).unwrap_err();
        assert!(matches!(err, crate::ComputeError::Runtime(RuntimeError::ExtentMismatch { .. })));
    }

    #[test]
    fn test_channel_bound_violation() {
        let pipeline = Pipeline::new(input(4));
        let artifact = compile(&pipeline, &policy::baseline(), &Target::host()).unwrap();
        let err = artifact.realize_image().unwrap_err();
        assert!(matches!(
            err,
            crate::ComputeError::Runtime(RuntimeError::BoundViolation { bound: 3, actual: 4, .. })
        ));
    }

    #[test]
    fn test_accelerated_needs_device() {
        let pipeline = Pipeline::new(input(3));
        let err = compile(&pipeline, &policy::accelerated(), &Target::host()).unwrap_err();
        assert!(matches!(err, crate::ComputeError::Schedule(_)));
    }
}
