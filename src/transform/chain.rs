//! Effect chain
//!
//! An [`EffectChain`] is the ordered list of steps configured for a route.
//! Steps are applied strictly in declared order; each step's parameters are
//! resolved against the request immediately before it runs. Overlay
//! alignment and offset steps update the placement state used by every later
//! overlay step in the same run.

use image::RgbImage;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::effects;
use super::expr::Expr;
use crate::constants::PIXELATE_BLOCK;
use crate::overlay::{
    calculate_anchor, composite, Alignment, HorizontalAlign, ImageDimensions, Offset,
    OverlayAsset, VerticalAlign,
};
use crate::pipeline::RequestContext;

/// Effects that take no arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleEffect {
    Grayscale,
    Pixelate,
}

/// Effects that take per-request arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEffect {
    Darken,
    Brighten,
    TintBlue,
    TintYellow,
    TintRed,
    TintGreen,
    /// Signed (cb, cr) shift
    Tint,
}

impl ParamEffect {
    /// Number of parameters the effect expects
    pub fn arity(&self) -> usize {
        match self {
            ParamEffect::Tint => 2,
            _ => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamEffect::Darken => "darken",
            ParamEffect::Brighten => "brighten",
            ParamEffect::TintBlue => "tintblue",
            ParamEffect::TintYellow => "tintyellow",
            ParamEffect::TintRed => "tintred",
            ParamEffect::TintGreen => "tintgreen",
            ParamEffect::Tint => "tint",
        }
    }
}

impl SimpleEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimpleEffect::Grayscale => "grayscale",
            SimpleEffect::Pixelate => "pixelate",
        }
    }
}

/// A named effect before its arguments are attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectName {
    Simple(SimpleEffect),
    Param(ParamEffect),
}

impl FromStr for EffectName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = match s.trim().to_ascii_lowercase().as_str() {
            "grayscale" | "greyscale" => EffectName::Simple(SimpleEffect::Grayscale),
            "pixelate" => EffectName::Simple(SimpleEffect::Pixelate),
            "darken" => EffectName::Param(ParamEffect::Darken),
            "brighten" => EffectName::Param(ParamEffect::Brighten),
            "tintblue" => EffectName::Param(ParamEffect::TintBlue),
            "tintyellow" => EffectName::Param(ParamEffect::TintYellow),
            "tintred" => EffectName::Param(ParamEffect::TintRed),
            "tintgreen" => EffectName::Param(ParamEffect::TintGreen),
            "tint" => EffectName::Param(ParamEffect::Tint),
            other => return Err(format!("unknown effect '{}'", other)),
        };
        Ok(name)
    }
}

/// One configured step of the chain
#[derive(Clone)]
pub enum EffectSpec {
    Simple(SimpleEffect),
    Parametrized { effect: ParamEffect, params: Vec<Expr> },
    OverlayAlign { vertical: Expr, horizontal: Expr },
    OverlayOffset { dy: Expr, dx: Expr },
    OverlayApply { asset: Arc<OverlayAsset> },
}

impl fmt::Debug for EffectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectSpec::Simple(effect) => write!(f, "Simple({})", effect.as_str()),
            EffectSpec::Parametrized { effect, params } => f
                .debug_struct("Parametrized")
                .field("effect", &effect.as_str())
                .field("params", params)
                .finish(),
            EffectSpec::OverlayAlign {
                vertical,
                horizontal,
            } => f
                .debug_struct("OverlayAlign")
                .field("vertical", vertical)
                .field("horizontal", horizontal)
                .finish(),
            EffectSpec::OverlayOffset { dy, dx } => f
                .debug_struct("OverlayOffset")
                .field("dy", dy)
                .field("dx", dx)
                .finish(),
            EffectSpec::OverlayApply { asset } => f
                .debug_struct("OverlayApply")
                .field("source", &asset.source())
                .finish(),
        }
    }
}

impl EffectSpec {
    /// Build a named effect step, checking the argument count.
    pub fn named(name: &str, params: Vec<Expr>) -> Result<Self, String> {
        match name.parse::<EffectName>()? {
            EffectName::Simple(effect) => {
                if !params.is_empty() {
                    return Err(format!(
                        "effect '{}' takes no arguments, got {}",
                        effect.as_str(),
                        params.len()
                    ));
                }
                Ok(EffectSpec::Simple(effect))
            }
            EffectName::Param(effect) => {
                if params.len() != effect.arity() {
                    return Err(format!(
                        "effect '{}' takes {} argument(s), got {}",
                        effect.as_str(),
                        effect.arity(),
                        params.len()
                    ));
                }
                Ok(EffectSpec::Parametrized { effect, params })
            }
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            EffectSpec::Simple(effect) => effect.as_str(),
            EffectSpec::Parametrized { effect, .. } => effect.as_str(),
            EffectSpec::OverlayAlign { .. } => "dropon_align",
            EffectSpec::OverlayOffset { .. } => "dropon_offset",
            EffectSpec::OverlayApply { .. } => "dropon",
        }
    }
}

/// Overlay placement state carried across one chain run
#[derive(Debug, Clone, Copy, Default)]
struct Placement {
    alignment: Alignment,
    offset: Offset,
}

/// Intensity parameter: unresolvable → 0, negative → 0.
fn intensity(expr: &Expr, ctx: &RequestContext) -> i32 {
    expr.resolve_int_or(ctx, 0).clamp(0, i32::MAX as i64) as i32
}

fn signed(expr: &Expr, ctx: &RequestContext) -> i32 {
    expr.resolve_int_or(ctx, 0)
        .clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn alignment_or_center<T>(expr: &Expr, ctx: &RequestContext) -> T
where
    T: FromStr<Err = String> + Default,
{
    match expr.resolve(ctx).map(|v| v.parse::<T>()) {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            tracing::debug!(request_id = %ctx.request_id(), error = %e, "Using center alignment");
            T::default()
        }
        None => {
            tracing::debug!(request_id = %ctx.request_id(), expr = ?expr, "Alignment unresolved, using center");
            T::default()
        }
    }
}

/// Ordered, immutable list of effect steps for a route
#[derive(Debug, Clone, Default)]
pub struct EffectChain {
    steps: Vec<EffectSpec>,
}

impl EffectChain {
    pub fn new(steps: Vec<EffectSpec>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[EffectSpec] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every step in order to `image`.
    pub fn apply(&self, image: &mut RgbImage, ctx: &RequestContext) {
        let mut placement = Placement::default();

        for step in &self.steps {
            tracing::trace!(request_id = %ctx.request_id(), step = step.label(), "Applying effect");
            match step {
                EffectSpec::Simple(SimpleEffect::Grayscale) => effects::grayscale(image),
                EffectSpec::Simple(SimpleEffect::Pixelate) => {
                    effects::pixelate(image, PIXELATE_BLOCK)
                }
                EffectSpec::Parametrized { effect, params } => {
                    apply_param(image, *effect, params, ctx)
                }
                EffectSpec::OverlayAlign {
                    vertical,
                    horizontal,
                } => {
                    placement.alignment = Alignment {
                        vertical: alignment_or_center::<VerticalAlign>(vertical, ctx),
                        horizontal: alignment_or_center::<HorizontalAlign>(horizontal, ctx),
                    };
                }
                EffectSpec::OverlayOffset { dy, dx } => {
                    placement.offset = Offset {
                        dy: signed(dy, ctx) as i64,
                        dx: signed(dx, ctx) as i64,
                    };
                }
                EffectSpec::OverlayApply { asset } => {
                    let base = ImageDimensions {
                        width: image.width(),
                        height: image.height(),
                    };
                    let position = calculate_anchor(
                        placement.alignment,
                        placement.offset,
                        &base,
                        &asset.dimensions(),
                    );
                    composite(image, asset, position);
                }
            }
        }
    }
}

fn apply_param(image: &mut RgbImage, effect: ParamEffect, params: &[Expr], ctx: &RequestContext) {
    let first = || params.first().map(|p| intensity(p, ctx)).unwrap_or(0);
    match effect {
        ParamEffect::Darken => effects::luminance(image, -first()),
        ParamEffect::Brighten => effects::luminance(image, first()),
        ParamEffect::TintBlue => effects::chroma(image, first(), 0),
        ParamEffect::TintYellow => effects::chroma(image, -first(), 0),
        ParamEffect::TintRed => effects::chroma(image, 0, first()),
        ParamEffect::TintGreen => effects::chroma(image, 0, -first()),
        ParamEffect::Tint => {
            let cb = params.first().map(|p| signed(p, ctx)).unwrap_or(0);
            let cr = params.get(1).map(|p| signed(p, ctx)).unwrap_or(0);
            effects::chroma(image, cb, cr);
        }
    }
}
