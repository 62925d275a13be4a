//! Execution backends for lowered plans.
//!
//! # Architecture
//!
//! ```text
//! Plan::Strips ──> StripExecutor  (rayon strips, host buffer)
//! Plan::Tiles  ──> TileExecutor   (emulated blocks, emulated device storage)
//!              └─> WgpuExecutor   (WGSL kernels, wgpu storage buffer)
//! ```
//!
//! Device executors leave their result in device storage attached to the
//! [`OutputBuffer`](crate::OutputBuffer); the host view is refreshed by
//! `copy_to_host`.

mod lut_table;
mod tiling;
mod detect;
pub(crate) mod cpu_backend;
pub(crate) mod tiled_backend;

#[cfg(feature = "wgpu")]
pub(crate) mod wgpu_backend;

pub use tiling::{Tile, generate_tiles, grid};
pub use detect::{
    detect_backends, describe_backends, accelerator_available, accelerator_available_for,
    Backend, BackendInfo,
};

/// Tracing target for per-call device logging (`Feature::Debug`).
pub(crate) const DEVICE_TARGET: &str = "pixsched::device";
