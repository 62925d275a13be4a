//! Error taxonomy for compiling and running scheduled pipelines.
//!
//! - [`ScheduleError`] - contradictory or unsupported directives, raised by `compile`
//! - [`RuntimeError`] - device, allocation or buffer failures while running
//! - [`MismatchError`] - correctness failure found by `verify`
//!
//! All three fold into [`ComputeError`].

use pixsched_core::Extent;
use thiserror::Error;

use crate::pipeline::StageId;
use crate::schedule::Var;
use crate::target::DeviceApi;

/// Schedule directives that cannot be lowered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("{stage}: no axis named '{var}' at this point in the schedule")]
    UnknownVar { stage: StageId, var: Var },

    #[error("{stage}: axis '{var}' already exists")]
    DuplicateVar { stage: StageId, var: Var },

    #[error("{stage}: split factor for '{var}' must be non-zero")]
    ZeroSplit { stage: StageId, var: Var },

    #[error("{stage}: unsupported vector width {width} for '{var}' (expected 1, 2, 4, 8, 16 or 32)")]
    VectorWidth { stage: StageId, var: Var, width: u32 },

    #[error("{stage}: bound on '{var}' must name a pure dimension with non-zero extent")]
    InvalidBound { stage: StageId, var: Var },

    #[error("{stage}: cannot unroll '{var}' without a constant extent (add a bound or split it)")]
    UnrollWithoutBound { stage: StageId, var: Var },

    #[error("{stage}: {consumer} does not consume it")]
    NotAConsumer { stage: StageId, consumer: StageId },

    #[error("{stage}: the output stage is always computed at root")]
    OutputNotRoot { stage: StageId },

    #[error("{stage}: storage level is inside its compute level")]
    StoreInsideCompute { stage: StageId },

    #[error("{stage}: storage level set on an inlined stage")]
    StoreWithoutCompute { stage: StageId },

    #[error("{stage}: gpu threads require gpu blocks on the stage or a gpu-block compute level")]
    ThreadsWithoutBlocks { stage: StageId },

    #[error("{stage}: parallel loops cannot be mixed with gpu mapping")]
    ParallelOnDevice { stage: StageId },

    #[error("{stage}: too many gpu {kind} dimensions ({count}, at most 3)")]
    TooManyGpuDims { stage: StageId, kind: &'static str, count: usize },

    #[error("{stage}: shared memory requires a gpu-block compute level")]
    SharedOutsideBlocks { stage: StageId },

    #[error("{stage}: {consumer} has no gpu blocks to compute at")]
    ConsumerNotOnDevice { stage: StageId, consumer: StageId },

    #[error("schedule maps {stage} to a device but the target has no device API")]
    DeviceScheduleOnHost { stage: StageId },

    #[error("{stage}: {reason}")]
    Unsupported { stage: StageId, reason: String },
}

/// Failures while executing a compiled artifact.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no {api} adapter found")]
    NoAdapter { api: DeviceApi },

    #[error("failed to create {api} device: {reason}")]
    DeviceCreation { api: DeviceApi, reason: String },

    #[error("device kernel failed to compile: {0}")]
    ShaderCompilation(String),

    #[error("device operation failed: {0}")]
    Device(String),

    #[error("output buffer {actual} does not match pipeline extent {expected}")]
    ExtentMismatch { expected: Extent, actual: Extent },

    #[error("{stage}: bound {var} = [0, {bound}) violated by buffer extent {actual}")]
    BoundViolation {
        stage: StageId,
        var: Var,
        bound: u32,
        actual: u32,
    },

    #[error("host view is stale: buffer was written on the device, call copy_to_host first")]
    StaleHost,

    #[error(transparent)]
    Image(#[from] pixsched_core::Error),
}

/// First element where an output disagrees with its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Mismatch between output ({output}) and reference output ({reference}) at {x}, {y}, {c}")]
pub struct MismatchError {
    pub x: u32,
    pub y: u32,
    pub c: u32,
    pub output: u8,
    pub reference: u8,
}

/// Any failure from compile, run, measure or verify.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Mismatch(#[from] MismatchError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ComputeError {
    /// The mismatch, if this is a correctness failure.
    pub fn as_mismatch(&self) -> Option<&MismatchError> {
        match self {
            Self::Mismatch(m) => Some(m),
            _ => None,
        }
    }
}

impl From<pixsched_core::Error> for ComputeError {
    fn from(e: pixsched_core::Error) -> Self {
        Self::Runtime(RuntimeError::Image(e))
    }
}

pub type ComputeResult<T> = Result<T, ComputeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message() {
        let m = MismatchError { x: 3, y: 1, c: 2, output: 10, reference: 11 };
        assert_eq!(
            m.to_string(),
            "Mismatch between output (10) and reference output (11) at 3, 1, 2"
        );
        let err: ComputeError = m.into();
        assert_eq!(err.as_mismatch(), Some(&m));
    }

    #[test]
    fn test_schedule_error_names_stage() {
        let err = ScheduleError::UnknownVar { stage: StageId::Curved, var: Var::new("zz") };
        assert!(err.to_string().starts_with("curved:"));
        assert!(err.to_string().contains("zz"));
    }
}
