//! Image transformation module
//!
//! Turns a complete JPEG payload into a modified one:
//! - Per-request parameter expressions (`Expr`)
//! - YCbCr color effects, tinting, pixelation
//! - Overlay placement through the overlay module
//! - Codec work delegated to an `ImageEngine`

pub mod chain;
pub mod effects;
pub mod engine;
pub mod error;
pub mod expr;
pub mod processor;

pub use chain::{EffectChain, EffectName, EffectSpec, ParamEffect, SimpleEffect};
pub use engine::{EncodeOptions, ImageCrateEngine, ImageEngine};
pub use error::TransformError;
pub use expr::Expr;
pub use processor::{process_payload, validate_dimensions, TransformSettings};
