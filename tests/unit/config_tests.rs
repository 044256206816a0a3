// Configuration unit tests
// YAML loading, compilation into routes, overlay assets and hot reload

use http::StatusCode;
use image::{Rgb, Rgba, RgbaImage};
use jpeg_body_filter::config::{CompiledConfig, Config, FilterHandle};
use jpeg_body_filter::pipeline::{CollectingSink, FilterChain};
use jpeg_body_filter::JpegFilter;
use std::path::Path;
use std::sync::Arc;

use super::support::{decode, exchange, head_with_length, run, sample_jpeg, split};

fn write_config(dir: &Path, yaml: &str) -> std::path::PathBuf {
    let path = dir.join("filter.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

fn write_overlay(dir: &Path, w: u32, h: u32) -> std::path::PathBuf {
    let path = dir.join("logo.png");
    RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255]))
        .save(&path)
        .unwrap();
    path
}

fn chain_from(handle: FilterHandle) -> FilterChain {
    FilterChain::new().with(Arc::new(JpegFilter::new(handle)))
}

fn is_red(p: &Rgb<u8>) -> bool {
    p[0] > 200 && p[1] < 60 && p[2] < 60
}

// Test: Overlay placed bottom/right with offsets from the request
#[test]
fn test_overlay_bottom_right_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let logo = write_overlay(dir.path(), 16, 16);
    let yaml = format!(
        r#"
routes:
  - path_prefix: /photos
    quality: 100
    effects:
      - type: dropon_align
        vertical: bottom
        horizontal: right
      - type: dropon_offset
        dy: "{{{{arg.dy}}}}"
        dx: 8
      - type: dropon
        file: {}
"#,
        logo.display()
    );
    let handle = FilterHandle::from_file(write_config(dir.path(), &yaml)).unwrap();
    let chain = chain_from(handle);
    let data = sample_jpeg(96, 64);

    let (sink, result) = run(&chain, "/photos/a.jpg?dy=8", head_with_length(None), &data, 700);
    result.unwrap();

    // Anchor: x = 96 - 16 - 8 = 72, y = 64 - 16 - 8 = 40
    let out = decode(sink.body());
    assert!(is_red(out.get_pixel(80, 48)));
    assert!(!is_red(out.get_pixel(68, 48)));
    assert!(!is_red(out.get_pixel(80, 60)));
}

// Test: Default alignment centers the overlay
#[test]
fn test_overlay_centered_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let logo = write_overlay(dir.path(), 16, 16);
    let yaml = format!(
        "routes:\n  - path_prefix: /\n    quality: 100\n    effects:\n      - type: dropon\n        file: {}\n",
        logo.display()
    );
    let handle = FilterHandle::from_file(write_config(dir.path(), &yaml)).unwrap();
    let chain = chain_from(handle);
    let data = sample_jpeg(64, 64);

    let (sink, result) = run(&chain, "/a.jpg", head_with_length(None), &data, 4096);
    result.unwrap();

    // Anchor: (64 - 16) / 2 = 24 on both axes
    let out = decode(sink.body());
    assert!(is_red(out.get_pixel(32, 32)));
    assert!(!is_red(out.get_pixel(20, 32)));
    assert!(!is_red(out.get_pixel(32, 44)));
}

// Test: Effect order is honored ([tint, grayscale] differs from [grayscale, tint])
#[test]
fn test_effect_order_is_significant() {
    let yaml_for = |order: &str| {
        format!(
            "routes:\n  - path_prefix: /\n    effects:\n{}",
            order
        )
    };
    let tint = "      - type: effect\n        name: tint\n        args: [40, 30]\n";
    let gray = "      - type: effect\n        name: grayscale\n";

    let compile = |yaml: String| {
        let config = Config::from_yaml_with_env(&yaml).unwrap();
        chain_from(FilterHandle::new(CompiledConfig::compile(&config).unwrap()))
    };
    let tint_then_gray = compile(yaml_for(&format!("{}{}", tint, gray)));
    let gray_then_tint = compile(yaml_for(&format!("{}{}", gray, tint)));

    let data = sample_jpeg(32, 32);
    let (a, result) = run(&tint_then_gray, "/a.jpg", head_with_length(None), &data, 4096);
    result.unwrap();
    let (b, result) = run(&gray_then_tint, "/a.jpg", head_with_length(None), &data, 4096);
    result.unwrap();

    assert_ne!(a.body(), b.body());
    let p = *decode(a.body()).get_pixel(16, 16);
    assert!((p[0] as i32 - p[2] as i32).abs() <= 3);
    let q = *decode(b.body()).get_pixel(16, 16);
    assert!(q[2] as i32 - q[1] as i32 > 20);
}

// Test: Routes pick their own settings by longest prefix
#[test]
fn test_routes_by_longest_prefix() {
    let yaml = r#"
routes:
  - path_prefix: /photos
    effects:
      - type: effect
        name: darken
        value: 80
  - path_prefix: /photos/raw
    enabled: false
"#;
    let config = Config::from_yaml_with_env(yaml).unwrap();
    let chain = chain_from(FilterHandle::new(CompiledConfig::compile(&config).unwrap()));
    let data = sample_jpeg(32, 32);

    let (raw, result) = run(&chain, "/photos/raw/a.jpg", head_with_length(None), &data, 4096);
    result.unwrap();
    assert_eq!(raw.body(), data.as_slice());

    let (dark, result) = run(&chain, "/photos/a.jpg", head_with_length(None), &data, 4096);
    result.unwrap();
    assert_ne!(dark.body(), data.as_slice());

    let (other, result) = run(&chain, "/other/a.jpg", head_with_length(None), &data, 4096);
    result.unwrap();
    assert_eq!(other.body(), data.as_slice());
}

// Test: A reload does not affect a request that already received its header
#[test]
fn test_reload_during_request_keeps_old_settings() {
    let yaml = "routes:\n  - path_prefix: /\n    effects:\n      - type: effect\n        name: darken\n        value: 90\n";
    let handle = FilterHandle::new(
        CompiledConfig::compile(&Config::from_yaml_with_env(yaml).unwrap()).unwrap(),
    );
    let chain = chain_from(handle.clone());
    let data = sample_jpeg(32, 32);

    let mut ex = exchange("/a.jpg");
    let mut sink = CollectingSink::new();
    chain.header(&mut ex, head_with_length(None), &mut sink).unwrap();

    let disabled = Config::from_yaml_with_env("routes:\n  - path_prefix: /\n    enabled: false\n").unwrap();
    assert_eq!(handle.reload(disabled).unwrap(), 1);

    for chunk in split(&data, 256) {
        chain.body(&mut ex, Some(chunk), &mut sink).unwrap();
    }
    assert_ne!(sink.body(), data.as_slice());
    assert_eq!(sink.head().unwrap().status, StatusCode::OK);

    // The next request sees the new generation
    let (next, result) = run(&chain, "/a.jpg", head_with_length(None), &data, 256);
    result.unwrap();
    assert_eq!(next.body(), data.as_slice());
}

// Test: Environment variables are substituted before parsing
#[test]
fn test_env_substitution_in_file() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("JPEG_FILTER_UNIT_BUFFER", "1024");
    let path = write_config(
        dir.path(),
        "routes:\n  - path_prefix: /\n    buffer_size: ${JPEG_FILTER_UNIT_BUFFER}\n    graceful: true\n",
    );

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.routes[0].transform.buffer_size, Some(1024));

    let chain = chain_from(FilterHandle::from_file(&path).unwrap());
    let data = sample_jpeg(128, 128);
    assert!(data.len() > 1024);

    // Declared length above the buffer on a graceful route: untouched
    let (sink, result) = run(&chain, "/a.jpg", head_with_length(Some(data.len())), &data, 1024);
    result.unwrap();
    assert_eq!(sink.body(), data.as_slice());
}

// Test: Wrong effect arity is rejected at compile time
#[test]
fn test_invalid_config_rejected() {
    let yaml = "routes:\n  - path_prefix: /\n    effects:\n      - type: effect\n        name: tint\n        value: 3\n";
    let config = Config::from_yaml_with_env(yaml).unwrap();
    let err = CompiledConfig::compile(&config).unwrap_err();
    assert!(err.contains("tint"));
}
