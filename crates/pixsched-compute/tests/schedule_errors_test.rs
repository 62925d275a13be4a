//! Contradictory or unsupported schedules are rejected by `compile`.

use pixsched_compute::schedule::{MemoryType, Schedule, ScheduleBuilder, Var};
use pixsched_compute::{compile, policy, ComputeError, DeviceApi, Pipeline, ScheduleError, StageId, Target};
use pixsched_core::Image;

fn compile_err(schedule: Schedule, target: &Target) -> ScheduleError {
    let input = Image::filled(8, 8, 3, 10).unwrap();
    match compile(&Pipeline::new(input), &schedule, target) {
        Err(ComputeError::Schedule(e)) => e,
        Err(e) => panic!("{}: expected a schedule error, got {e}", schedule.name()),
        Ok(_) => panic!("{}: expected a schedule error", schedule.name()),
    }
}

fn host_err(f: impl FnOnce(ScheduleBuilder) -> ScheduleBuilder) -> ScheduleError {
    compile_err(f(Schedule::builder("bad")).build(), &Target::host())
}

fn device_err(f: impl FnOnce(ScheduleBuilder) -> ScheduleBuilder) -> ScheduleError {
    compile_err(f(Schedule::builder("bad")).build(), &Target::for_device(DeviceApi::Emulated))
}

#[test]
fn test_unknown_axis() {
    let err = host_err(|b| b.stage(StageId::Curved, |s| s.parallel(Var::new("z"))));
    assert_eq!(err, ScheduleError::UnknownVar { stage: StageId::Curved, var: Var::new("z") });

    // y is gone after being split
    let err = host_err(|b| {
        b.stage(StageId::Curved, |s| s.split(Var::Y, Var::new("yo"), Var::new("yi"), 4).parallel(Var::Y))
    });
    assert_eq!(err, ScheduleError::UnknownVar { stage: StageId::Curved, var: Var::Y });
}

#[test]
fn test_zero_split_and_bad_vector_width() {
    let err = host_err(|b| b.stage(StageId::Curved, |s| s.split(Var::Y, Var::new("yo"), Var::new("yi"), 0)));
    assert!(matches!(err, ScheduleError::ZeroSplit { .. }));

    for width in [0, 3, 64] {
        let err = host_err(|b| b.stage(StageId::Sharpen, |s| s.vectorize(Var::X, width)));
        assert_eq!(err, ScheduleError::VectorWidth { stage: StageId::Sharpen, var: Var::X, width });
    }
}

#[test]
fn test_duplicate_split_names() {
    let err = host_err(|b| b.stage(StageId::Curved, |s| s.split(Var::Y, Var::X, Var::new("yi"), 4)));
    assert_eq!(err, ScheduleError::DuplicateVar { stage: StageId::Curved, var: Var::X });
}

#[test]
fn test_compute_at_non_consumer() {
    let err = host_err(|b| b.stage(StageId::Lut, |s| s.compute_at(StageId::Padded, Var::Y)));
    assert_eq!(err, ScheduleError::NotAConsumer { stage: StageId::Lut, consumer: StageId::Padded });
}

#[test]
fn test_output_is_root() {
    let err = host_err(|b| b.stage(StageId::Curved, |s| s.compute_at(StageId::Curved, Var::Y)));
    assert_eq!(err, ScheduleError::OutputNotRoot { stage: StageId::Curved });
}

#[test]
fn test_store_levels() {
    let err = host_err(|b| b.stage(StageId::Padded, |s| s.compute_root().store_at(StageId::Curved, Var::Y)));
    assert_eq!(err, ScheduleError::StoreInsideCompute { stage: StageId::Padded });

    let err = host_err(|b| {
        b.stage(StageId::Padded, |s| s.compute_at(StageId::Curved, Var::Y).store_at(StageId::Curved, Var::X))
    });
    assert_eq!(err, ScheduleError::StoreInsideCompute { stage: StageId::Padded });

    let err = host_err(|b| b.stage(StageId::Sharpen, |s| s.store_root()));
    assert_eq!(err, ScheduleError::StoreWithoutCompute { stage: StageId::Sharpen });
}

#[test]
fn test_unroll_needs_bound() {
    let err = host_err(|b| b.stage(StageId::Curved, |s| s.unroll(Var::C)));
    assert_eq!(err, ScheduleError::UnrollWithoutBound { stage: StageId::Curved, var: Var::C });
}

#[test]
fn test_invalid_bound() {
    let err = host_err(|b| b.stage(StageId::Curved, |s| s.bound(Var::C, 0, 0)));
    assert!(matches!(err, ScheduleError::InvalidBound { .. }));
}

#[test]
fn test_gpu_mapping_rules() {
    let err = device_err(|b| b.stage(StageId::Curved, |s| s.gpu_threads([Var::X])));
    assert_eq!(err, ScheduleError::ThreadsWithoutBlocks { stage: StageId::Curved });

    let err = device_err(|b| b.stage(StageId::Curved, |s| s.gpu_blocks([Var::Y]).parallel(Var::X)));
    assert_eq!(err, ScheduleError::ParallelOnDevice { stage: StageId::Curved });

    let err = device_err(|b| b.stage(StageId::Padded, |s| s.compute_root().store_in(MemoryType::GpuShared)));
    assert_eq!(err, ScheduleError::SharedOutsideBlocks { stage: StageId::Padded });

    let err = device_err(|b| b.stage(StageId::Padded, |s| s.compute_at_gpu_blocks(StageId::Curved)));
    assert_eq!(
        err,
        ScheduleError::ConsumerNotOnDevice { stage: StageId::Padded, consumer: StageId::Curved }
    );
}

#[test]
fn test_device_schedule_on_host_target() {
    let err = compile_err(policy::accelerated(), &Target::host());
    assert_eq!(err, ScheduleError::DeviceScheduleOnHost { stage: StageId::Lut });
}

#[test]
fn test_unsupported_shapes() {
    // sharpen cannot be materialized inside device tiles
    let err = device_err(|b| {
        b.stage(StageId::Curved, |s| s.gpu_tile(Var::X, Var::Y, 8, 8))
            .stage(StageId::Sharpen, |s| s.compute_root())
    });
    assert!(matches!(err, ScheduleError::Unsupported { stage: StageId::Sharpen, .. }));

    let err = device_err(|b| b.stage(StageId::Curved, |s| s.gpu_tile(Var::X, Var::Y, 32, 32)));
    assert!(matches!(err, ScheduleError::Unsupported { stage: StageId::Curved, .. }));
}
