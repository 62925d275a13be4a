//! The two schedules compared by the demo.
//!
//! Both produce bit-identical output; they differ only in locality and
//! parallelism.

use crate::pipeline::StageId;
use crate::schedule::{MemoryType, Schedule, Var};

/// Host schedule: parallel strips of 16 rows.
///
/// - `lut` is computed once, before anything else.
/// - `curved` walks `(c, x, y)` innermost first with `c` bounded to three
///   channels and unrolled; `y` is split into strips of 16 that run in parallel.
/// - `sharpen` is materialized one row at a time, 8 lanes wide.
/// - `padded` is computed one row at a time, 16 lanes wide, into a window
///   that lives for the whole strip so each input row is widened once.
pub fn baseline() -> Schedule {
    let (yo, yi) = (Var::new("yo"), Var::new("yi"));
    Schedule::builder("baseline")
        .stage(StageId::Lut, |s| s.compute_root())
        .stage(StageId::Curved, |s| {
            s.reorder([Var::C, Var::X, Var::Y])
                .bound(Var::C, 0, 3)
                .unroll(Var::C)
                .split(Var::Y, yo.clone(), yi.clone(), 16)
                .parallel(yo.clone())
        })
        .stage(StageId::Sharpen, |s| {
            s.compute_at(StageId::Curved, yi.clone()).vectorize(Var::X, 8)
        })
        .stage(StageId::Padded, |s| {
            s.store_at(StageId::Curved, yo.clone())
                .compute_at(StageId::Curved, yi.clone())
                .vectorize(Var::X, 16)
        })
        .build()
}

/// Device schedule: 8x8 tiles of threads.
///
/// `lut` is computed up front by blocks of 16 threads. Each block of `curved`
/// stages its padded neighbourhood in shared memory and `sharpen` is folded
/// into `curved`.
pub fn accelerated() -> Schedule {
    let (block, thread) = (Var::new("block"), Var::new("thread"));
    Schedule::builder("accelerated")
        .stage(StageId::Lut, |s| {
            s.split(Var::I, block.clone(), thread.clone(), 16)
                .compute_root()
                .gpu_blocks([block.clone()])
                .gpu_threads([thread.clone()])
        })
        .stage(StageId::Curved, |s| {
            s.reorder([Var::C, Var::X, Var::Y])
                .bound(Var::C, 0, 3)
                .unroll(Var::C)
                .gpu_tile(Var::X, Var::Y, 8, 8)
        })
        .stage(StageId::Padded, |s| {
            s.compute_at_gpu_blocks(StageId::Curved)
                .store_in(MemoryType::GpuShared)
                .gpu_threads([Var::X, Var::Y])
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies_leave_sharpen_and_padded16_inline_where_expected() {
        let accel = accelerated();
        assert!(accel.stage(StageId::Sharpen).is_empty());
        assert!(accel.stage(StageId::Padded16).is_empty());
        assert!(baseline().stage(StageId::Padded16).is_empty());
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(baseline().name(), "baseline");
        assert_eq!(accelerated().name(), "accelerated");
    }
}
