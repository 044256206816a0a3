// Constants module - centralized default values for configuration
//
// Defaults used by the config layer and the filter itself live here so that
// the YAML defaults, the compiled config and the tests agree on one value.

// =============================================================================
// Buffering defaults
// =============================================================================

/// Default accumulator capacity when the response does not declare a length (2 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Bytes of lookahead the signature sniffer needs from the first chunk
pub const SNIFF_LOOKAHEAD: usize = 16;

/// JPEG start-of-image marker
pub const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];

/// Media type forced onto every emitted body
pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";

/// Content type of streamed multipart responses, which the filter refuses
pub const MULTIPART_REPLACE: &str = "multipart/x-mixed-replace";

// =============================================================================
// Encoding defaults
// =============================================================================

/// Default re-encode quality (1-100)
pub const DEFAULT_QUALITY: u8 = 90;

/// Edge length of the blocks averaged by the pixelate effect
pub const PIXELATE_BLOCK: u32 = 8;

// =============================================================================
// Overlay defaults
// =============================================================================

/// Default overlay opacity
pub const DEFAULT_OPACITY: f32 = 1.0;
