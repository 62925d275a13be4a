//! # pixsched-core
//!
//! Core types shared by the pixsched crates:
//!
//! - [`Image`] - immutable 3-D array of `u8` samples indexed by `(x, y, channel)`
//! - [`Extent`] - width/height/channel dimensions and interleaved indexing
//! - [`Error`] - bounds and construction errors
//!
//! ## Crate Structure
//!
//! ```text
//! pixsched-core (this crate)
//!    ^
//!    +-- pixsched-io (PNG decode/encode)
//!    +-- pixsched-compute (pipeline, schedules, backends, harness)
//!    +-- pixsched-cli
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod image;

pub use error::{Error, Result};
pub use image::{Extent, Image};
