// Effect chain configuration
//
// Entries are internally tagged by `type`:
//
//   - type: effect            # named effect with 0, 1 or 2 arguments
//     name: darken
//     value: "{{arg.dark}}"
//   - type: effect
//     name: tint
//     args: [10, -5]
//   - type: dropon_align
//     vertical: bottom
//     horizontal: right
//   - type: dropon_offset
//     dy: 10
//     dx: "{{arg.margin}}"
//   - type: dropon
//     file: /etc/filter/logo.png
//     mask: /etc/filter/logo-mask.png

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::constants::DEFAULT_OPACITY;
use crate::overlay::BlendMode;

/// A scalar config value; numbers and strings are both accepted and kept as
/// text until the expression is compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

fn default_center() -> Scalar {
    Scalar::Text("center".to_string())
}

fn default_zero() -> Scalar {
    Scalar::Int(0)
}

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectConfig {
    /// Named effect (grayscale, pixelate, darken, brighten, tintblue,
    /// tintyellow, tintred, tintgreen, tint)
    Effect {
        name: String,
        /// Single argument shorthand
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Scalar>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Scalar>,
    },
    DroponAlign {
        #[serde(default = "default_center")]
        vertical: Scalar,
        #[serde(default = "default_center")]
        horizontal: Scalar,
    },
    DroponOffset {
        #[serde(default = "default_zero")]
        dy: Scalar,
        #[serde(default = "default_zero")]
        dx: Scalar,
    },
    Dropon {
        file: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mask: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        blend: Option<BlendMode>,
        #[serde(default = "default_opacity")]
        opacity: f32,
    },
}

impl EffectConfig {
    /// Arguments of a named effect, `value` first
    pub fn arguments(&self) -> Vec<Scalar> {
        match self {
            EffectConfig::Effect { value, args, .. } => {
                value.iter().chain(args.iter()).cloned().collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EffectConfig::Effect { .. } => "effect",
            EffectConfig::DroponAlign { .. } => "dropon_align",
            EffectConfig::DroponOffset { .. } => "dropon_offset",
            EffectConfig::Dropon { .. } => "dropon",
        }
    }

    /// Structural checks that need no file access
    pub fn validate(&self) -> Result<(), String> {
        match self {
            EffectConfig::Effect { name, value, args } => {
                if name.trim().is_empty() {
                    return Err("effect entry has empty name".to_string());
                }
                if value.is_some() && !args.is_empty() {
                    return Err(format!(
                        "effect '{}' sets both 'value' and 'args'; use one",
                        name
                    ));
                }
                Ok(())
            }
            EffectConfig::Dropon { file, opacity, .. } => {
                if file.as_os_str().is_empty() {
                    return Err("dropon entry has empty file".to_string());
                }
                if !(0.0..=1.0).contains(opacity) {
                    return Err(format!(
                        "dropon '{}' opacity must be between 0.0 and 1.0, got {}",
                        file.display(),
                        opacity
                    ));
                }
                Ok(())
            }
            EffectConfig::DroponAlign { .. } | EffectConfig::DroponOffset { .. } => Ok(()),
        }
    }
}
