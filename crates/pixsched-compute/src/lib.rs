//! Scheduled execution of a small sharpen + tone-curve pipeline.
//!
//! The pipeline is declared once ([`Pipeline`]); how it runs is a separate,
//! plain-data [`Schedule`]. A schedule is validated and lowered against a
//! [`Target`] by [`compile`], and the resulting [`Artifact`] realizes into an
//! [`OutputBuffer`]. Schedules never change output values.
//!
//! # Architecture
//!
//! ```text
//! Pipeline + Schedule + Target
//!     └── compile ──> Plan (strips | tiles)
//!             └── Artifact: Realize
//!                     ├── StripExecutor (rayon strips)
//!                     ├── TileExecutor  (emulated device)
//!                     └── WgpuExecutor  (WGSL kernels, `wgpu` feature)
//! ```
//!
//! # Example
//!
//! ```
//! use pixsched_compute::{compile, policy, verify, Pipeline, Realize, Target};
//! use pixsched_core::Image;
//!
//! let input = Image::filled(4, 4, 3, 128)?;
//! let reference = Pipeline::new(input.clone()).realize_reference()?;
//!
//! let artifact = compile(&Pipeline::new(input.clone()), &policy::baseline(), &Target::host())?;
//! verify(&artifact, &input, &reference)?;
//! assert_eq!(artifact.realize_image()?.get(0, 0, 0), pixsched_compute::pipeline::lut_value(128));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod buffer;
pub mod compile;
pub mod error;
pub mod harness;
pub mod pipeline;
pub mod plan;
pub mod policy;
pub mod schedule;
pub mod target;
mod shaders;

pub use backend::{accelerator_available, accelerator_available_for, describe_backends, Backend};
pub use buffer::{Location, OutputBuffer};
pub use compile::{compile, Artifact, Realize};
pub use error::{ComputeError, ComputeResult, MismatchError, RuntimeError, ScheduleError};
pub use harness::{measure, verify, MeasureConfig};
pub use pipeline::{LutIndexing, Pipeline, StageId};
pub use plan::Plan;
pub use schedule::{Schedule, Var};
pub use target::{DeviceApi, Feature, Target};
