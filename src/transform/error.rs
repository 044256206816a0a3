//! Transformation error types
//!
//! Provides structured error handling with HTTP status mapping, consistent
//! with the filter error pattern. Every variant here is a recoverable
//! processing failure: graceful routes answer it with the original payload.

use std::fmt;

/// Errors that can occur while decoding, transforming or encoding a payload
#[derive(Debug, Clone)]
pub enum TransformError {
    // === Decoding Errors ===
    /// Failed to decode image data
    DecodeFailed { message: String },

    // === Guard Errors ===
    /// Decoded image exceeds the route's configured dimensions
    DimensionsExceeded {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    // === Encoding Errors ===
    /// Encoding the result failed
    EncodeFailed { message: String },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            TransformError::DimensionsExceeded {
                width,
                height,
                max_width,
                max_height,
            } => {
                write!(
                    f,
                    "Image dimensions {}x{} exceed limit of {}x{} (0 = unlimited)",
                    width, height, max_width, max_height
                )
            }
            TransformError::EncodeFailed { message } => {
                write!(f, "Failed to encode jpeg: {}", message)
            }
        }
    }
}

impl std::error::Error for TransformError {}

impl TransformError {
    /// Maps transformation errors to HTTP status codes
    ///
    /// Status mapping:
    /// - DecodeFailed, DimensionsExceeded → 415 (Unsupported Media Type)
    /// - EncodeFailed → 500 (Internal Server Error)
    pub fn to_http_status(&self) -> u16 {
        match self {
            TransformError::DecodeFailed { .. } | TransformError::DimensionsExceeded { .. } => 415,
            TransformError::EncodeFailed { .. } => 500,
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        TransformError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(message: impl Into<String>) -> Self {
        TransformError::EncodeFailed {
            message: message.into(),
        }
    }
}
