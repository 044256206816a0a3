//! Overlay error types.
//!
//! Defines errors that can occur while loading overlay (dropon) assets at
//! configuration time. Per-request compositing itself cannot fail: overlays
//! are clipped to the base image.

use std::fmt;

/// Errors that can occur while loading an overlay asset.
#[derive(Debug)]
pub enum OverlayError {
    /// Failed to read or decode the overlay or mask file
    LoadError { path: String, message: String },

    /// Mask dimensions differ from the overlay's
    MaskMismatch {
        overlay: (u32, u32),
        mask: (u32, u32),
    },

    /// Invalid overlay configuration
    ConfigError(String),
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadError { path, message } => {
                write!(f, "Failed to load overlay '{}': {}", path, message)
            }
            Self::MaskMismatch { overlay, mask } => write!(
                f,
                "Overlay mask is {}x{} but the overlay is {}x{}",
                mask.0, mask.1, overlay.0, overlay.1
            ),
            Self::ConfigError(msg) => write!(f, "Overlay configuration error: {}", msg),
        }
    }
}

impl std::error::Error for OverlayError {}
