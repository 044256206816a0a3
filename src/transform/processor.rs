//! Payload processing
//!
//! Handles the one-shot transformation of a fully accumulated payload:
//! decode → dimension guard → effect chain → encode.

use std::sync::Arc;

use super::chain::EffectChain;
use super::engine::{EncodeOptions, ImageCrateEngine, ImageEngine};
use super::error::TransformError;
use crate::constants::DEFAULT_BUFFER_SIZE;
use crate::pipeline::RequestContext;

/// Compiled per-route processing settings
///
/// Built once when the configuration is compiled and shared read-only by
/// every request on the route.
#[derive(Clone)]
pub struct TransformSettings {
    pub enabled: bool,
    /// 0 = unlimited
    pub max_width: u32,
    /// 0 = unlimited
    pub max_height: u32,
    /// On processing failure, emit the original payload instead of failing
    pub graceful: bool,
    /// Accumulator cap in bytes
    pub buffer_size: usize,
    pub encode: EncodeOptions,
    pub effects: EffectChain,
    pub engine: Arc<dyn ImageEngine>,
}

impl std::fmt::Debug for TransformSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformSettings")
            .field("enabled", &self.enabled)
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("graceful", &self.graceful)
            .field("buffer_size", &self.buffer_size)
            .field("encode", &self.encode)
            .field("effects", &self.effects)
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_width: 0,
            max_height: 0,
            graceful: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            encode: EncodeOptions::default(),
            effects: EffectChain::default(),
            engine: Arc::new(ImageCrateEngine),
        }
    }
}

impl TransformSettings {
    pub fn with_effects(mut self, effects: EffectChain) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_graceful(mut self, graceful: bool) -> Self {
        self.graceful = graceful;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_max_dimensions(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn ImageEngine>) -> Self {
        self.engine = engine;
        self
    }
}

/// Validate decoded dimensions against the route limits (0 = unlimited)
pub fn validate_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> Result<(), TransformError> {
    let too_wide = max_width != 0 && width > max_width;
    let too_tall = max_height != 0 && height > max_height;
    if too_wide || too_tall {
        return Err(TransformError::DimensionsExceeded {
            width,
            height,
            max_width,
            max_height,
        });
    }
    Ok(())
}

/// Run the full transformation on `payload`
///
/// # Returns
/// * `Ok(Vec<u8>)` - The re-encoded JPEG
/// * `Err(TransformError)` - Decode, guard or encode failure
pub fn process_payload(
    payload: &[u8],
    settings: &TransformSettings,
    ctx: &RequestContext,
) -> Result<Vec<u8>, TransformError> {
    let engine = settings.engine.as_ref();

    // 1. Decode
    let mut image = engine.decode(payload)?;

    // 2. Guard
    validate_dimensions(
        image.width(),
        image.height(),
        settings.max_width,
        settings.max_height,
    )?;

    // 3. Effects
    settings.effects.apply(&mut image, ctx);

    // 4. Encode
    let encoded = engine.encode(&image, &settings.encode)?;

    tracing::debug!(
        request_id = %ctx.request_id(),
        engine = engine.name(),
        width = image.width(),
        height = image.height(),
        steps = settings.effects.len(),
        input_len = payload.len(),
        output_len = encoded.len(),
        "Payload transformed"
    );

    Ok(encoded)
}
