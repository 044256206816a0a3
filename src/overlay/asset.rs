//! Overlay (dropon) assets.
//!
//! Assets are decoded once while the configuration is compiled and shared
//! read-only by every request through an `Arc`. They are released when the
//! last configuration generation referencing them is dropped, which can only
//! happen after every request holding that generation has finished.

use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::position::ImageDimensions;
use super::OverlayError;

/// How overlay pixels are mixed into the base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Overlay pixels replace base pixels (scaled by opacity only)
    Replace,
    /// The overlay's own alpha channel weights each pixel
    Alpha,
    /// A separate grayscale mask weights each pixel (white = overlay)
    Mask,
}

impl BlendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Replace => "replace",
            BlendMode::Alpha => "alpha",
            BlendMode::Mask => "mask",
        }
    }
}

/// A decoded overlay with its optional mask.
pub struct OverlayAsset {
    image: RgbaImage,
    mask: Option<GrayImage>,
    blend: BlendMode,
    opacity: f32,
    source: PathBuf,
}

impl std::fmt::Debug for OverlayAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayAsset")
            .field("source", &self.source)
            .field("dimensions", &(self.image.width(), self.image.height()))
            .field("mask", &self.mask.is_some())
            .field("blend", &self.blend)
            .field("opacity", &self.opacity)
            .finish()
    }
}

fn read_image(path: &Path) -> Result<image::DynamicImage, OverlayError> {
    image::open(path).map_err(|e| OverlayError::LoadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

impl OverlayAsset {
    /// Load an overlay file and optional mask file.
    ///
    /// `blend` defaults to `Mask` when a mask is given and `Alpha` otherwise.
    pub fn load(
        file: &Path,
        mask: Option<&Path>,
        blend: Option<BlendMode>,
        opacity: f32,
    ) -> Result<Self, OverlayError> {
        let image = read_image(file)?.to_rgba8();
        let mask = mask.map(|m| read_image(m).map(|img| img.to_luma8())).transpose()?;

        let asset = Self::from_images(image, mask, blend, opacity)?.with_source(file);
        tracing::info!(
            source = %file.display(),
            width = asset.image.width(),
            height = asset.image.height(),
            mask = asset.mask.is_some(),
            blend = asset.blend.as_str(),
            "Overlay asset loaded"
        );
        Ok(asset)
    }

    /// Build an asset from already decoded pixels.
    pub fn from_images(
        image: RgbaImage,
        mask: Option<GrayImage>,
        blend: Option<BlendMode>,
        opacity: f32,
    ) -> Result<Self, OverlayError> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(OverlayError::ConfigError(format!(
                "opacity must be between 0.0 and 1.0, got {}",
                opacity
            )));
        }

        if let Some(mask) = &mask {
            if mask.dimensions() != image.dimensions() {
                return Err(OverlayError::MaskMismatch {
                    overlay: image.dimensions(),
                    mask: mask.dimensions(),
                });
            }
        }

        let blend = match (blend, mask.is_some()) {
            (Some(BlendMode::Mask), false) => {
                return Err(OverlayError::ConfigError(
                    "blend mode 'mask' requires a mask file".to_string(),
                ))
            }
            (Some(mode), _) => mode,
            (None, true) => BlendMode::Mask,
            (None, false) => BlendMode::Alpha,
        };

        Ok(Self {
            image,
            mask,
            blend,
            opacity,
            source: PathBuf::new(),
        })
    }

    fn with_source(mut self, source: &Path) -> Self {
        self.source = source.to_path_buf();
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn mask(&self) -> Option<&GrayImage> {
        self.mask.as_ref()
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn dimensions(&self) -> ImageDimensions {
        ImageDimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }
}

impl Drop for OverlayAsset {
    fn drop(&mut self) {
        tracing::debug!(source = %self.source.display(), "Overlay asset released");
    }
}
