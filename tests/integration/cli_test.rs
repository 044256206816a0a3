// Integration tests for the jpeg-filter binary
//
// Tests verify that:
// - A JPEG fed through the CLI comes back re-encoded with the route's effects
// - Non-JPEG input is written back unchanged
// - --check validates the configuration without reading input
// - Configuration and filter failures exit non-zero

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::process::Command;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_jpeg-filter"))
}

fn write_jpeg(dir: &Path) -> PathBuf {
    let path = dir.join("in.jpg");
    RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 90]))
        .save(&path)
        .unwrap();
    path
}

fn write_config(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("filter.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

const DARKEN_CONFIG: &str = r#"
routes:
  - path_prefix: /img
    effects:
      - type: effect
        name: darken
        value: "{{arg.dark}}"
"#;

#[test]
fn test_cli_transforms_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), DARKEN_CONFIG);
    let input = write_jpeg(dir.path());
    let output = dir.path().join("out.jpg");

    let status = binary()
        .arg("--config")
        .arg(&config)
        .args(["--path", "/img/in.jpg", "--chunk-size", "100", "--arg", "dark=40"])
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let original = std::fs::read(&input).unwrap();
    let filtered = std::fs::read(&output).unwrap();
    assert_ne!(original, filtered);
    assert_eq!(&filtered[..2], &[0xFF, 0xD8]);
    assert_eq!(image::load_from_memory(&filtered).unwrap().width(), 40);
}

#[test]
fn test_cli_passes_non_jpeg_through() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), DARKEN_CONFIG);
    let input = dir.path().join("notes.txt");
    std::fs::write(&input, "not an image, just some text").unwrap();
    let output = dir.path().join("out.txt");

    let status = binary()
        .arg("--config")
        .arg(&config)
        .args(["--path", "/img/notes.txt"])
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(
        std::fs::read(&output).unwrap(),
        b"not an image, just some text"
    );
}

#[test]
fn test_cli_check_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), DARKEN_CONFIG);

    let out = binary()
        .arg("--config")
        .arg(&config)
        .arg("--check")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("1 route"));
}

#[test]
fn test_cli_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "routes:\n  - path_prefix: /img\n    effects:\n      - type: effect\n        name: sepia\n",
    );

    let out = binary()
        .arg("--config")
        .arg(&config)
        .arg("--check")
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("sepia"));
}

#[test]
fn test_cli_strict_failure_exits_with_415() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), DARKEN_CONFIG);
    let input = dir.path().join("broken.jpg");
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.resize(256, 0x11);
    std::fs::write(&input, &data).unwrap();

    let out = binary()
        .arg("--config")
        .arg(&config)
        .args(["--path", "/img/broken.jpg"])
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(dir.path().join("out.jpg"))
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("HTTP 415"));
}
