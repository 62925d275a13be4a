//! Runs the binary end to end on a generated image.

use std::process::Command;

use pixsched_core::Image;

fn write_input(dir: &std::path::Path) {
    let image = Image::from_fn(24, 18, 3, |x, y, c| ((x * 11 + y * 23 + c * 70) % 256) as u8).unwrap();
    pixsched_io::save_image(dir.join("rgb.png"), &image).unwrap();
}

fn pixsched(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pixsched"));
    cmd.arg("--data-dir").arg(dir).args(["--trials", "1", "--repeats", "2"]);
    cmd
}

#[test]
fn test_emulated_run_reports_both_variants() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path());
    let saved = dir.path().join("curved.png");

    let output = pixsched(dir.path())
        .args(["--device", "emulated", "--save"])
        .arg(&saved)
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "Testing performance on CPU:");
    assert!(lines[1].ends_with(" milliseconds"));
    assert_eq!(lines[2], "Testing performance on GPU:");
    assert!(lines[3].ends_with(" milliseconds"));

    let curved = pixsched_io::load_image(&saved).unwrap();
    assert_eq!(curved.extent(), pixsched_core::Extent::new(24, 18, 3));
}

#[test]
fn test_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = pixsched(dir.path()).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("rgb.png"));
}

#[test]
fn test_backend_listing() {
    let output = Command::new(env!("CARGO_BIN_EXE_pixsched")).arg("--backends").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("[+] host strips"));
}

// Metal adapters only exist on Apple platforms.
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
#[test]
fn test_missing_accelerator_skips_gpu_run() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path());

    let output = pixsched(dir.path()).args(["--device", "metal"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "stdout: {stdout}");
    assert_eq!(lines[0], "Testing performance on CPU:");
    assert_eq!(lines[2], "Not testing performance on GPU, because I can't find an accelerator");
}
