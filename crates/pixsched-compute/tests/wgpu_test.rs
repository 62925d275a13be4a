//! Accelerated schedule on a real device; skipped without an adapter.

#![cfg(feature = "wgpu")]

use pixsched_compute::{
    accelerator_available_for, compile, policy, verify, DeviceApi, Location, LutIndexing,
    OutputBuffer, Pipeline, Realize, Target,
};
use pixsched_core::Image;

fn device() -> Option<DeviceApi> {
    let api = DeviceApi::native();
    if accelerator_available_for(api) {
        Some(api)
    } else {
        eprintln!("no {api} adapter, skipping");
        None
    }
}

#[test]
fn test_accelerated_matches_reference_on_device() {
    let Some(api) = device() else { return };
    let input = Image::from_fn(37, 21, 3, |x, y, c| ((x * 71 + y * 13 + c * 97) % 256) as u8).unwrap();
    for indexing in [LutIndexing::Clamp, LutIndexing::Wrap16] {
        let pipeline = Pipeline::new(input.clone()).with_indexing(indexing);
        let reference = pipeline.realize_reference().unwrap();
        let artifact = compile(&pipeline, &policy::accelerated(), &Target::for_device(api)).unwrap();
        verify(&artifact, &input, &reference).unwrap();
    }
}

#[test]
fn test_device_buffer_sync() {
    let Some(api) = device() else { return };
    let input = Image::filled(16, 16, 3, 200).unwrap();
    let pipeline = Pipeline::new(input.clone());
    let artifact = compile(&pipeline, &policy::accelerated(), &Target::for_device(api)).unwrap();
    let mut out = OutputBuffer::like(&input).unwrap();

    artifact.realize(&mut out).unwrap();
    assert_eq!(out.location(), Location::Device);
    assert_eq!(out.device_api(), Some(api));
    assert!(out.host().is_err());
    out.copy_to_host().unwrap();
    assert_eq!(out.to_image().unwrap(), pipeline.realize_reference().unwrap());
}
