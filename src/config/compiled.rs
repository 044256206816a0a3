//! Compiled configuration and its reload handle.
//!
//! [`CompiledConfig::compile`] turns the YAML model into per-route
//! [`TransformSettings`]: expressions are parsed, effect names and arities
//! checked, and every overlay asset is decoded exactly once (entries that
//! name the same files share one `Arc<OverlayAsset>`).
//!
//! [`FilterHandle`] publishes the current generation through `arc-swap`. A
//! request loads the generation once at header time and keeps that `Arc` for
//! its whole lifetime, so a reload never changes settings or releases
//! overlay assets under an in-flight request.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::effects::{EffectConfig, Scalar};
use super::Config;
use crate::error::FilterError;
use crate::overlay::{BlendMode, OverlayAsset};
use crate::router::{Route, Router};
use crate::transform::{
    EffectChain, EffectSpec, EncodeOptions, Expr, ImageCrateEngine, ImageEngine,
    TransformSettings,
};

#[derive(Debug)]
pub struct CompiledConfig {
    generation: u64,
    router: Router,
}

/// Key identifying one loaded overlay asset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AssetKey {
    file: PathBuf,
    mask: Option<PathBuf>,
    blend: Option<BlendMode>,
    opacity_bits: u32,
}

fn expr(route: &str, value: &Scalar) -> Result<Expr, String> {
    Expr::parse(&value.to_string()).map_err(|e| format!("Route '{}': {}", route, e))
}

impl CompiledConfig {
    /// Compile `config` with the default image engine.
    pub fn compile(config: &Config) -> Result<Self, String> {
        Self::compile_with_engine(config, Arc::new(ImageCrateEngine))
    }

    pub fn compile_with_engine(
        config: &Config,
        engine: Arc<dyn ImageEngine>,
    ) -> Result<Self, String> {
        config.validate()?;

        let mut assets: HashMap<AssetKey, Arc<OverlayAsset>> = HashMap::new();
        let mut routes = Vec::with_capacity(config.routes.len());

        for route in &config.routes {
            let prefix = route.path_prefix.as_str();
            let transform = &route.transform;

            let mut steps = Vec::with_capacity(transform.effects.len());
            for effect in &transform.effects {
                let step = match effect {
                    EffectConfig::Effect { name, .. } => {
                        let params = effect
                            .arguments()
                            .iter()
                            .map(|arg| expr(prefix, arg))
                            .collect::<Result<Vec<_>, _>>()?;
                        EffectSpec::named(name, params)
                            .map_err(|e| format!("Route '{}': {}", prefix, e))?
                    }
                    EffectConfig::DroponAlign {
                        vertical,
                        horizontal,
                    } => EffectSpec::OverlayAlign {
                        vertical: expr(prefix, vertical)?,
                        horizontal: expr(prefix, horizontal)?,
                    },
                    EffectConfig::DroponOffset { dy, dx } => EffectSpec::OverlayOffset {
                        dy: expr(prefix, dy)?,
                        dx: expr(prefix, dx)?,
                    },
                    EffectConfig::Dropon {
                        file,
                        mask,
                        blend,
                        opacity,
                    } => {
                        let key = AssetKey {
                            file: file.clone(),
                            mask: mask.clone(),
                            blend: *blend,
                            opacity_bits: opacity.to_bits(),
                        };
                        let asset = match assets.get(&key) {
                            Some(asset) => Arc::clone(asset),
                            None => {
                                let asset = OverlayAsset::load(
                                    file,
                                    mask.as_deref(),
                                    *blend,
                                    *opacity,
                                )
                                .map(Arc::new)
                                .map_err(|e| format!("Route '{}': {}", prefix, e))?;
                                assets.insert(key, Arc::clone(&asset));
                                asset
                            }
                        };
                        EffectSpec::OverlayApply { asset }
                    }
                };
                steps.push(step);
            }

            let encode = EncodeOptions {
                optimize: transform.optimize,
                progressive: transform.progressive,
                arithmetic: transform.arithmetic,
                ..EncodeOptions::default()
            }
            .with_quality(transform.quality.unwrap_or(config.quality));

            let ignored = engine.unsupported_flags(&encode);
            if !ignored.is_empty() {
                tracing::warn!(
                    path_prefix = %prefix,
                    engine = engine.name(),
                    flags = ?ignored,
                    "Encoder flags not supported by engine, output will be baseline JPEG"
                );
            }

            let settings = TransformSettings {
                enabled: transform.enabled,
                max_width: transform.max_width,
                max_height: transform.max_height,
                graceful: transform.graceful,
                buffer_size: transform.buffer_size.unwrap_or(config.buffer_size),
                encode,
                effects: EffectChain::new(steps),
                engine: Arc::clone(&engine),
            };

            routes.push(Route {
                path_prefix: route.path_prefix.clone(),
                settings: Arc::new(settings),
            });
        }

        tracing::info!(
            generation = config.generation,
            routes = routes.len(),
            overlay_assets = assets.len(),
            "Filter configuration compiled"
        );

        Ok(Self {
            generation: config.generation,
            router: Router::new(routes),
        })
    }

    /// One route covering every path.
    pub fn single(settings: TransformSettings) -> Self {
        Self {
            generation: 0,
            router: Router::new(vec![Route {
                path_prefix: "/".to_string(),
                settings: Arc::new(settings),
            }]),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Settings for `path`, if any route matches.
    pub fn settings_for(&self, path: &str) -> Option<Arc<TransformSettings>> {
        self.router
            .route(path)
            .map(|route| Arc::clone(&route.settings))
    }
}

/// Shared, atomically replaceable compiled configuration.
#[derive(Clone)]
pub struct FilterHandle {
    current: Arc<ArcSwap<CompiledConfig>>,
}

impl FilterHandle {
    pub fn new(config: CompiledConfig) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Load, validate and compile a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FilterError> {
        let config = Config::from_file(path).map_err(FilterError::Config)?;
        let compiled = CompiledConfig::compile(&config).map_err(FilterError::Config)?;
        Ok(Self::new(compiled))
    }

    /// The current generation; hold the returned `Arc` for a whole request.
    pub fn load(&self) -> Arc<CompiledConfig> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Replace the configuration with `config`, compiled as the next
    /// generation. On error the current configuration stays in place.
    pub fn reload(&self, mut config: Config) -> Result<u64, FilterError> {
        let generation = self.generation() + 1;
        config.generation = generation;
        let compiled = CompiledConfig::compile(&config).map_err(FilterError::Config)?;
        self.current.store(Arc::new(compiled));
        tracing::info!(generation = generation, "Filter configuration reloaded");
        Ok(generation)
    }

    pub fn reload_from_file<P: AsRef<Path>>(&self, path: P) -> Result<u64, FilterError> {
        let path = path.as_ref();
        Config::from_file(path)
            .map_err(FilterError::Config)
            .and_then(|config| self.reload(config))
            .map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "Configuration reload failed");
                e
            })
    }
}

impl std::fmt::Debug for FilterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterHandle")
            .field("generation", &self.generation())
            .finish()
    }
}
