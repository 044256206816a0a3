// Error types module

use thiserror::Error;

use crate::filter::Phase;
use crate::transform::TransformError;

/// Centralized error type for the filter chain
///
/// Every variant maps onto an HTTP status the host uses to finalize the
/// exchange. Recoverable processing failures never reach this type when the
/// route runs in graceful mode; they are absorbed by the output decision.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Payload could not be transformed and graceful mode is off
    #[error("Unsupported payload: {0}")]
    Unsupported(#[from] TransformError),

    /// Declared or accumulated body size exceeds the configured buffer
    #[error("Payload of {attempted} bytes exceeds buffer capacity of {capacity} bytes")]
    CapacityExceeded { attempted: usize, capacity: usize },

    /// Streaming multipart responses cannot be buffered
    #[error("Refusing to buffer {0} response")]
    MultipartResponse(String),

    /// Buffer allocation failed; never absorbed by graceful mode
    #[error("Failed to allocate {requested} bytes")]
    Allocation { requested: usize },

    /// Data arrived after the stream was finished
    #[error("Protocol violation in phase {phase}: {message}")]
    ProtocolViolation { phase: Phase, message: String },

    /// The downstream sink rejected a header or body
    #[error("Downstream error: {0}")]
    Downstream(String),

    /// Configuration could not be loaded or compiled
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FilterError {
    /// Maps filter errors to HTTP status codes
    ///
    /// Status mapping:
    /// - Unsupported, CapacityExceeded → 415 (Unsupported Media Type)
    /// - everything else → 500 (Internal Server Error)
    pub fn to_http_status(&self) -> u16 {
        match self {
            FilterError::Unsupported(_) | FilterError::CapacityExceeded { .. } => 415,
            FilterError::MultipartResponse(_)
            | FilterError::Allocation { .. }
            | FilterError::ProtocolViolation { .. }
            | FilterError::Downstream(_)
            | FilterError::Config(_) => 500,
        }
    }

    pub fn protocol(phase: Phase, message: impl Into<String>) -> Self {
        FilterError::ProtocolViolation {
            phase,
            message: message.into(),
        }
    }
}
