// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub mod compiled;
pub mod effects;

pub use compiled::{CompiledConfig, FilterHandle};
pub use effects::{EffectConfig, Scalar};

use crate::constants::{DEFAULT_BUFFER_SIZE, DEFAULT_QUALITY};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Accumulator cap for routes that do not set their own
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Re-encode quality for routes that do not set their own
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(skip)]
    pub generation: u64, // Config version, increments on reload
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_true() -> bool {
    true
}

/// Transformation settings for one path prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub path_prefix: String,
    #[serde(flatten)]
    pub transform: TransformConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum decoded width (0 = unlimited)
    #[serde(default)]
    pub max_width: u32,
    /// Maximum decoded height (0 = unlimited)
    #[serde(default)]
    pub max_height: u32,
    #[serde(default)]
    pub optimize: bool,
    #[serde(default)]
    pub progressive: bool,
    #[serde(default)]
    pub arithmetic: bool,
    /// Emit the original payload when processing fails
    #[serde(default)]
    pub graceful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(default)]
    pub effects: Vec<EffectConfig>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_width: 0,
            max_height: 0,
            optimize: false,
            progressive: false,
            arithmetic: false,
            graceful: false,
            buffer_size: None,
            quality: None,
            effects: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        let mut missing = Vec::new();
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| {
                missing.push(caps[1].to_string());
                String::new()
            })
        });

        if let Some(var_name) = missing.first() {
            return Err(format!(
                "Environment variable '{}' is referenced but not set",
                var_name
            ));
        }

        let mut config: Config = serde_yaml::from_str(&substituted).map_err(|e| e.to_string())?;
        config.generation = 0;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_size == 0 {
            return Err("buffer_size must be greater than 0".to_string());
        }
        validate_quality("top level", self.quality)?;

        let mut seen_prefixes = HashSet::new();

        for route in &self.routes {
            if route.path_prefix.is_empty() {
                return Err("Route has empty path_prefix".to_string());
            }

            if !route.path_prefix.starts_with('/') {
                return Err(format!(
                    "Route path_prefix '{}' does not start with /",
                    route.path_prefix
                ));
            }

            if !seen_prefixes.insert(&route.path_prefix) {
                return Err(format!("Duplicate path_prefix '{}'", route.path_prefix));
            }

            let transform = &route.transform;
            if transform.buffer_size == Some(0) {
                return Err(format!(
                    "Route '{}': buffer_size must be greater than 0",
                    route.path_prefix
                ));
            }
            if let Some(quality) = transform.quality {
                validate_quality(&route.path_prefix, quality)?;
            }

            for effect in &transform.effects {
                effect
                    .validate()
                    .map_err(|e| format!("Route '{}': {}", route.path_prefix, e))?;
            }
        }

        Ok(())
    }
}

fn validate_quality(scope: &str, quality: u8) -> Result<(), String> {
    if !(1..=100).contains(&quality) {
        return Err(format!(
            "{}: quality must be between 1 and 100, got {}",
            scope, quality
        ));
    }
    Ok(())
}
