// JPEG body filter unit tests
// Phase state machine, buffering limits, output decision and buffer release

use http::header::{ACCEPT_RANGES, CONTENT_TYPE};
use http::StatusCode;
use jpeg_body_filter::error::FilterError;
use jpeg_body_filter::filter::{JpegFilter, Phase};
use jpeg_body_filter::pipeline::{
    Chunk, CollectingSink, Downstream, FilterChain, Outcome, ResponseHead,
};
use jpeg_body_filter::transform::{EffectChain, EffectSpec, Expr, TransformSettings};
use rstest::rstest;
use std::sync::Arc;

use super::support::{corrupt_jpeg, decode, exchange, head_with_length, run, sample_jpeg, split};

fn darken_settings() -> TransformSettings {
    TransformSettings::default().with_effects(EffectChain::new(vec![EffectSpec::named(
        "darken",
        vec![Expr::parse("{{arg.dark}}").unwrap()],
    )
    .unwrap()]))
}

fn chain_with(settings: TransformSettings) -> (FilterChain, Arc<JpegFilter>) {
    let filter = Arc::new(JpegFilter::with_settings(settings));
    (FilterChain::new().with(filter.clone()), filter)
}

// Test: A first chunk shorter than the sniff lookahead is passed through
// byte-identical, even when the whole body is a JPEG
#[rstest]
#[case(1)]
#[case(8)]
#[case(15)]
fn test_short_first_chunk_passes_through(#[case] chunk_size: usize) {
    let (chain, filter) = chain_with(darken_settings());
    let data = sample_jpeg(32, 32);

    let (sink, result) = run(&chain, "/a.jpg?dark=50", head_with_length(None), &data, chunk_size);
    result.unwrap();

    assert_eq!(sink.body(), data.as_slice());
    assert_eq!(
        sink.head().unwrap().content_type(),
        Some("application/octet-stream")
    );
    assert_eq!(sink.end_markers(), 1);
    assert_eq!(filter.ledger().allocated(), 0);
}

// Test: The emitted body does not depend on how the input was chunked
#[rstest]
#[case(16)]
#[case(17)]
#[case(100)]
#[case(1024)]
#[case(usize::MAX)]
fn test_chunk_boundaries_do_not_change_output(#[case] chunk_size: usize) {
    let (chain, _) = chain_with(darken_settings());
    let data = sample_jpeg(48, 40);

    let (reference, result) = run(&chain, "/a.jpg?dark=30", head_with_length(None), &data, data.len());
    result.unwrap();
    let (sink, result) = run(&chain, "/a.jpg?dark=30", head_with_length(None), &data, chunk_size);
    result.unwrap();

    assert_eq!(sink.body(), reference.body());
    assert_ne!(sink.body(), data.as_slice());
}

// Test: The emitted header carries image/jpeg and the exact body length
#[test]
fn test_output_header_is_exact() {
    let (chain, _) = chain_with(darken_settings());
    let data = sample_jpeg(32, 32);
    let mut head = head_with_length(Some(data.len()));
    head.headers.insert(ACCEPT_RANGES, "bytes".parse().unwrap());

    let (sink, result) = run(&chain, "/a.jpg?dark=10", head, &data, 64);
    result.unwrap();

    let head = sink.head().unwrap();
    assert_eq!(head.content_type(), Some("image/jpeg"));
    assert_eq!(head.content_length(), Some(sink.body().len() as u64));
    assert!(head.headers.get(ACCEPT_RANGES).is_none());
    assert_eq!(head.headers.get_all(CONTENT_TYPE).iter().count(), 1);
    assert_eq!(sink.end_markers(), 1);
}

// Test: Darken actually darkens
#[test]
fn test_darken_effect_applied() {
    let (chain, _) = chain_with(darken_settings());
    let data = sample_jpeg(32, 32);

    let (sink, result) = run(&chain, "/a.jpg?dark=60", head_with_length(None), &data, 512);
    result.unwrap();

    let before = decode(&data);
    let after = decode(sink.body());
    let luma = |img: &image::RgbImage| img.pixels().map(|p| p[0] as u64 + p[1] as u64 + p[2] as u64).sum::<u64>();
    assert!(luma(&after) < luma(&before));
}

// Test: An append that would overflow fails before any excess byte is kept
#[test]
fn test_overflow_fails_with_415() {
    let data = sample_jpeg(64, 64);
    let (chain, _) = chain_with(darken_settings().with_buffer_size(data.len() - 1));

    let (sink, result) = run(&chain, "/a.jpg", head_with_length(None), &data, 128);
    let err = result.unwrap_err();

    assert!(matches!(err, FilterError::CapacityExceeded { capacity, .. } if capacity == data.len() - 1));
    assert_eq!(err.to_http_status(), 415);
    assert!(sink.head().is_none());
    assert!(sink.body().is_empty());
}

// Test: Overflow in Read is fatal even on graceful routes
#[test]
fn test_overflow_is_fatal_even_when_graceful() {
    let data = sample_jpeg(64, 64);
    let (chain, _) = chain_with(
        darken_settings()
            .with_buffer_size(100)
            .with_graceful(true),
    );

    let (_, result) = run(&chain, "/a.jpg", head_with_length(None), &data, 64);
    assert_eq!(result.unwrap_err().to_http_status(), 415);
}

// Test: Graceful route emits the original payload when decoding fails
#[test]
fn test_graceful_decode_failure_emits_original() {
    let (chain, filter) = chain_with(darken_settings().with_graceful(true));
    let data = corrupt_jpeg(300);

    let (sink, result) = run(&chain, "/a.jpg", head_with_length(Some(data.len())), &data, 50);
    result.unwrap();

    assert_eq!(sink.body(), data.as_slice());
    let head = sink.head().unwrap();
    assert_eq!(head.content_length(), Some(300));
    assert_eq!(head.content_type(), Some("image/jpeg"));
    assert_eq!(filter.ledger().allocated(), 1);
    assert_eq!(filter.ledger().released(), 1);
}

// Test: Strict route answers a decoding failure with 415 and no body
#[test]
fn test_strict_decode_failure_is_415() {
    let (chain, _) = chain_with(darken_settings());
    let data = corrupt_jpeg(300);

    let (sink, result) = run(&chain, "/a.jpg", head_with_length(Some(data.len())), &data, 50);
    let err = result.unwrap_err();

    assert!(matches!(err, FilterError::Unsupported(_)));
    assert_eq!(err.to_http_status(), 415);
    assert!(sink.head().is_none());
    assert_eq!(sink.body_calls(), 0);
}

// Test: Dimension guard failure follows the graceful policy
#[rstest]
#[case(true)]
#[case(false)]
fn test_dimension_guard(#[case] graceful: bool) {
    let settings = darken_settings()
        .with_max_dimensions(16, 16)
        .with_graceful(graceful);
    let (chain, _) = chain_with(settings);
    let data = sample_jpeg(32, 32);

    let (sink, result) = run(&chain, "/a.jpg?dark=10", head_with_length(None), &data, 4096);
    if graceful {
        result.unwrap();
        assert_eq!(sink.body(), data.as_slice());
    } else {
        assert_eq!(result.unwrap_err().to_http_status(), 415);
    }
}

// Test: Declared length above the buffer skips processing on graceful routes
#[test]
fn test_declared_length_too_large_graceful_skips() {
    let data = sample_jpeg(64, 64);
    let (chain, filter) = chain_with(
        darken_settings()
            .with_buffer_size(64)
            .with_graceful(true),
    );
    let mut head = head_with_length(Some(data.len()));
    head.headers.insert(ACCEPT_RANGES, "bytes".parse().unwrap());

    let (sink, result) = run(&chain, "/a.jpg?dark=40", head, &data, 1000);
    result.unwrap();

    assert_eq!(sink.body(), data.as_slice());
    let head = sink.head().unwrap();
    assert_eq!(head.content_type(), Some("application/octet-stream"));
    assert!(head.headers.get(ACCEPT_RANGES).is_some());
    assert_eq!(filter.ledger().allocated(), 0);
}

// Test: Declared length above the buffer fails at header time on strict routes
#[test]
fn test_declared_length_too_large_strict_fails() {
    let (chain, _) = chain_with(darken_settings().with_buffer_size(64));
    let mut ex = exchange("/a.jpg");
    let mut sink = CollectingSink::new();

    let err = chain
        .header(&mut ex, head_with_length(Some(65)), &mut sink)
        .unwrap_err();
    assert!(matches!(err, FilterError::CapacityExceeded { attempted: 65, capacity: 64 }));
    assert!(sink.head().is_none());
}

// Test: Declared length sizes the accumulator
#[test]
fn test_body_longer_than_declared_length_fails() {
    let data = sample_jpeg(32, 32);
    let (chain, _) = chain_with(darken_settings());

    let (_, result) = run(&chain, "/a.jpg", head_with_length(Some(data.len() - 10)), &data, 256);
    assert!(matches!(result.unwrap_err(), FilterError::CapacityExceeded { .. }));
}

// Test: Multipart streaming responses are refused
#[test]
fn test_multipart_response_is_an_error() {
    let (chain, _) = chain_with(darken_settings());
    let mut ex = exchange("/cam");
    let mut sink = CollectingSink::new();
    let mut head = ResponseHead::new(StatusCode::OK);
    head.headers.insert(
        CONTENT_TYPE,
        "multipart/x-mixed-replace; boundary=frame".parse().unwrap(),
    );

    let err = chain.header(&mut ex, head, &mut sink).unwrap_err();
    assert!(matches!(err, FilterError::MultipartResponse(_)));
    assert_eq!(err.to_http_status(), 500);
}

// Test: 304 responses and disabled routes pass untouched
#[test]
fn test_not_modified_and_disabled_pass_untouched() {
    let data = sample_jpeg(16, 16);

    let (chain, _) = chain_with(darken_settings());
    let mut head = ResponseHead::new(StatusCode::NOT_MODIFIED);
    head.set_content_length(data.len());
    let (sink, result) = run(&chain, "/a.jpg?dark=30", head, &data, 4096);
    result.unwrap();
    assert_eq!(sink.body(), data.as_slice());

    let mut disabled = darken_settings();
    disabled.enabled = false;
    let (chain, _) = chain_with(disabled);
    let (sink, result) = run(&chain, "/a.jpg?dark=30", head_with_length(None), &data, 4096);
    result.unwrap();
    assert_eq!(sink.body(), data.as_slice());
}

// Test: Non-JPEG bodies are forwarded chunk by chunk with the original header
#[test]
fn test_non_jpeg_forwarded_verbatim() {
    let (chain, _) = chain_with(darken_settings());
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.resize(200, 7);
    let mut head = head_with_length(Some(png.len()));
    head.headers.insert(ACCEPT_RANGES, "bytes".parse().unwrap());

    let mut ex = exchange("/a.png");
    let mut sink = CollectingSink::new();
    chain.run(&mut ex, head, split(&png, 50), &mut sink).unwrap();

    assert_eq!(sink.body(), png.as_slice());
    assert_eq!(sink.body_calls(), 4);
    assert!(sink.head().unwrap().headers.get(ACCEPT_RANGES).is_some());
    assert_eq!(JpegFilter::phase(&ex), Some(Phase::Done));
}

// Test: Empty bodies pass through
#[test]
fn test_empty_body() {
    let (chain, _) = chain_with(darken_settings());
    let (sink, result) = run(&chain, "/a.jpg", head_with_length(Some(0)), &[], 16);
    result.unwrap();
    assert!(sink.body().is_empty());
    assert!(sink.is_complete());
}

// Test: Flushes before any data keep the header held
#[test]
fn test_flush_in_start_is_pending() {
    let (chain, _) = chain_with(darken_settings());
    let mut ex = exchange("/a.jpg");
    let mut sink = CollectingSink::new();

    chain.header(&mut ex, head_with_length(None), &mut sink).unwrap();
    let outcome = chain.body(&mut ex, None, &mut sink).unwrap();
    assert_eq!(outcome, Outcome::Pending);
    assert!(sink.head().is_none());
    assert_eq!(JpegFilter::phase(&ex), Some(Phase::Start));
}

// Test: Running the filter on its own output works
#[test]
fn test_reprocessing_own_output() {
    let (chain, _) = chain_with(darken_settings());
    let data = sample_jpeg(40, 24);

    let (first, result) = run(&chain, "/a.jpg?dark=20", head_with_length(None), &data, 333);
    result.unwrap();
    let (second, result) = run(&chain, "/a.jpg?dark=20", head_with_length(None), first.body(), 333);
    result.unwrap();

    assert_eq!(decode(second.body()).dimensions(), (40, 24));
}

// Test: Aborting an exchange mid-read releases everything without output
#[test]
fn test_abort_during_read() {
    let (chain, filter) = chain_with(darken_settings());
    let data = sample_jpeg(32, 32);
    let mut sink = CollectingSink::new();

    {
        let mut ex = exchange("/a.jpg");
        chain.header(&mut ex, head_with_length(None), &mut sink).unwrap();
        chain
            .body(&mut ex, Some(Chunk::data(data[..64].to_vec())), &mut sink)
            .unwrap();
        assert_eq!(JpegFilter::phase(&ex), Some(Phase::Read));
    }

    assert_eq!(filter.ledger().allocated(), 0);
    assert!(sink.head().is_none());
}

/// Downstream that accepts the header but fails every body call
struct FailingBody {
    headers: usize,
}

impl Downstream for FailingBody {
    fn send_header(&mut self, _head: ResponseHead) -> Result<(), FilterError> {
        self.headers += 1;
        Ok(())
    }

    fn send_body(&mut self, _chunk: Option<Chunk>) -> Result<(), FilterError> {
        Err(FilterError::Downstream("connection reset".to_string()))
    }
}

// Test: The output buffer is released exactly once when the exchange is
// dropped after a downstream failure
#[test]
fn test_output_released_once_on_abort() {
    let (chain, filter) = chain_with(darken_settings());
    let data = sample_jpeg(32, 32);
    let mut sink = FailingBody { headers: 0 };

    {
        let mut ex = exchange("/a.jpg?dark=5");
        let err = chain
            .run(&mut ex, head_with_length(None), split(&data, 100), &mut sink)
            .unwrap_err();
        assert!(matches!(err, FilterError::Downstream(_)));
        assert_eq!(filter.ledger().outstanding(), 1);
    }

    assert_eq!(sink.headers, 1);
    assert_eq!(filter.ledger().allocated(), 1);
    assert_eq!(filter.ledger().released(), 1);
}

// Test: Explicit teardown followed by drop still releases once
#[test]
fn test_teardown_then_drop_releases_once() {
    let (chain, filter) = chain_with(darken_settings());
    let data = sample_jpeg(16, 16);

    let mut ex = exchange("/a.jpg");
    let mut sink = CollectingSink::new();
    chain
        .run(&mut ex, head_with_length(None), split(&data, 64), &mut sink)
        .unwrap();
    assert_eq!(filter.ledger().outstanding(), 1);

    ex.teardown();
    assert_eq!(filter.ledger().released(), 1);
    drop(ex);
    assert_eq!(filter.ledger().released(), 1);
}
