//! Image engine abstraction
//!
//! The codec work (entropy decoding, DCT, re-encoding) is delegated to an
//! engine behind the [`ImageEngine`] trait so the filter only ever handles
//! decoded RGB pixels. The default engine is backed by the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder as _, ImageFormat, RgbImage};

use super::error::TransformError;
use crate::constants::DEFAULT_QUALITY;

/// Re-encode settings taken from the route configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// JPEG quality (1-100)
    pub quality: u8,
    /// Request optimized Huffman tables
    pub optimize: bool,
    /// Request progressive scan layout
    pub progressive: bool,
    /// Request arithmetic coding
    pub arithmetic: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            optimize: false,
            progressive: false,
            arithmetic: false,
        }
    }
}

impl EncodeOptions {
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }
}

/// Trait for codec engines
///
/// Implementations must be shareable across requests; they hold no
/// per-request state.
pub trait ImageEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Decode a complete JPEG payload into RGB pixels
    fn decode(&self, data: &[u8]) -> Result<RgbImage, TransformError>;

    /// Encode RGB pixels back into a JPEG payload
    fn encode(&self, image: &RgbImage, options: &EncodeOptions) -> Result<Vec<u8>, TransformError>;

    /// Names of the flags in `options` this engine ignores
    fn unsupported_flags(&self, _options: &EncodeOptions) -> Vec<&'static str> {
        Vec::new()
    }
}

/// JPEG engine using the image crate
///
/// The image crate always writes baseline, Huffman-coded scans; the
/// optimize/progressive/arithmetic flags are reported as unsupported and do
/// not change the output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateEngine;

impl ImageEngine for ImageCrateEngine {
    fn name(&self) -> &'static str {
        "image"
    }

    fn decode(&self, data: &[u8]) -> Result<RgbImage, TransformError> {
        image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map(|img| img.to_rgb8())
            .map_err(|e| TransformError::decode_failed(e.to_string()))
    }

    fn encode(&self, image: &RgbImage, options: &EncodeOptions) -> Result<Vec<u8>, TransformError> {
        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, options.quality.clamp(1, 100))
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgb8,
            )
            .map_err(|e| TransformError::encode_failed(e.to_string()))?;

        Ok(output)
    }

    fn unsupported_flags(&self, options: &EncodeOptions) -> Vec<&'static str> {
        [
            ("optimize", options.optimize),
            ("progressive", options.progressive),
            ("arithmetic", options.arithmetic),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}
