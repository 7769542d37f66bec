//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{num::NonZeroUsize, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    ClassifyArgs, CliArgs, Command, LoggingOverrides, RenderArgs, RenderOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tutor-render";
const ENV_PREFIX: &str = "TUTOR_RENDER";

const DEFAULT_BATCH_SIZE: u64 = 5;
const DEFAULT_PRIORITY_PAUSE_MS: u64 = 10;
const DEFAULT_BATCH_PAUSE_MS: u64 = 30;
const DEFAULT_READY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_SLOW_RENDER_MS: u64 = 100;
const DEFAULT_SLOW_ANALYSIS_MS: u64 = 10;
const DEFAULT_ENGINE_SCALE: f64 = 1.0;
const DEFAULT_ENGINE_MIN_SCALE: f64 = 0.5;
const DEFAULT_CONTENT_CACHE_LIMIT: u64 = 1024;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub render: RenderSettings,
    pub engine: EngineSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Scheduler pacing and diagnostic thresholds.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub default_batch_size: NonZeroUsize,
    pub priority_pause: Duration,
    pub batch_pause: Duration,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
    pub slow_render: Duration,
    pub slow_analysis: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            default_batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE as usize)
                .unwrap_or(NonZeroUsize::MIN),
            priority_pause: Duration::from_millis(DEFAULT_PRIORITY_PAUSE_MS),
            batch_pause: Duration::from_millis(DEFAULT_BATCH_PAUSE_MS),
            ready_timeout: Duration::from_millis(DEFAULT_READY_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            slow_render: Duration::from_millis(DEFAULT_SLOW_RENDER_MS),
            slow_analysis: Duration::from_millis(DEFAULT_SLOW_ANALYSIS_MS),
        }
    }
}

/// Font caching mode handed to the typesetting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontCache {
    #[default]
    Global,
    Local,
    None,
}

impl FromStr for FontCache {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "local" => Ok(Self::Local),
            "none" => Ok(Self::None),
            other => Err(format!("expected global, local or none, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub scale: f64,
    pub min_scale: f64,
    pub automatic_linebreaks: bool,
    pub font_cache: FontCache,
    pub process_escapes: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scale: DEFAULT_ENGINE_SCALE,
            min_scale: DEFAULT_ENGINE_MIN_SCALE,
            automatic_linebreaks: false,
            font_cache: FontCache::Global,
            process_escapes: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub content_cache_limit: NonZeroUsize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            content_cache_limit: NonZeroUsize::new(DEFAULT_CONTENT_CACHE_LIMIT as usize)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_logging_overrides(&cli.logging);
    if let Command::Render(args) = &cli.command {
        raw.apply_render_overrides(&args.overrides);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    render: RawRenderSettings,
    engine: RawEngineSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(size) = overrides.batch_size {
            self.render.default_batch_size = Some(size);
        }
        if let Some(timeout) = overrides.ready_timeout_ms {
            self.render.ready_timeout_ms = Some(timeout);
        }
        if let Some(scale) = overrides.engine_scale {
            self.engine.scale = Some(scale);
        }
        if let Some(limit) = overrides.content_cache_limit {
            self.cache.content_cache_limit = Some(limit);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            render,
            engine,
            cache,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let render = build_render_settings(render)?;
        let engine = build_engine_settings(engine)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self {
            logging,
            render,
            engine,
            cache,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let default_batch_size = non_zero_usize(
        render.default_batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        "render.default_batch_size",
    )?;

    let ready_timeout_ms = render.ready_timeout_ms.unwrap_or(DEFAULT_READY_TIMEOUT_MS);
    if ready_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "render.ready_timeout_ms",
            "must be greater than zero",
        ));
    }

    let poll_interval_ms = render.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if poll_interval_ms == 0 {
        return Err(LoadError::invalid(
            "render.poll_interval_ms",
            "must be greater than zero",
        ));
    }
    if poll_interval_ms > ready_timeout_ms {
        return Err(LoadError::invalid(
            "render.poll_interval_ms",
            "must not exceed render.ready_timeout_ms",
        ));
    }

    let millis = |value: Option<u64>, default: u64| Duration::from_millis(value.unwrap_or(default));

    Ok(RenderSettings {
        default_batch_size,
        priority_pause: millis(render.priority_pause_ms, DEFAULT_PRIORITY_PAUSE_MS),
        batch_pause: millis(render.batch_pause_ms, DEFAULT_BATCH_PAUSE_MS),
        ready_timeout: Duration::from_millis(ready_timeout_ms),
        poll_interval: Duration::from_millis(poll_interval_ms),
        slow_render: millis(render.slow_render_ms, DEFAULT_SLOW_RENDER_MS),
        slow_analysis: millis(render.slow_analysis_ms, DEFAULT_SLOW_ANALYSIS_MS),
    })
}

fn build_engine_settings(engine: RawEngineSettings) -> Result<EngineSettings, LoadError> {
    let scale = engine.scale.unwrap_or(DEFAULT_ENGINE_SCALE);
    if !scale.is_finite() || scale <= 0.0 {
        return Err(LoadError::invalid(
            "engine.scale",
            "must be a positive number",
        ));
    }

    let min_scale = engine.min_scale.unwrap_or(DEFAULT_ENGINE_MIN_SCALE);
    if !min_scale.is_finite() || min_scale <= 0.0 {
        return Err(LoadError::invalid(
            "engine.min_scale",
            "must be a positive number",
        ));
    }
    if min_scale > scale {
        return Err(LoadError::invalid(
            "engine.min_scale",
            format!("must not exceed engine.scale ({scale})"),
        ));
    }

    let font_cache = match engine.font_cache {
        Some(mode) => FontCache::from_str(&mode)
            .map_err(|reason| LoadError::invalid("engine.font_cache", reason))?,
        None => FontCache::default(),
    };

    Ok(EngineSettings {
        scale,
        min_scale,
        automatic_linebreaks: engine.automatic_linebreaks.unwrap_or(false),
        font_cache,
        process_escapes: engine.process_escapes.unwrap_or(true),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let content_cache_limit = non_zero_usize(
        cache
            .content_cache_limit
            .unwrap_or(DEFAULT_CONTENT_CACHE_LIMIT),
        "cache.content_cache_limit",
    )?;
    Ok(CacheSettings {
        content_cache_limit,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    default_batch_size: Option<u64>,
    priority_pause_ms: Option<u64>,
    batch_pause_ms: Option<u64>,
    ready_timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    slow_render_ms: Option<u64>,
    slow_analysis_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEngineSettings {
    scale: Option<f64>,
    min_scale: Option<f64>,
    automatic_linebreaks: Option<bool>,
    font_cache: Option<String>,
    process_escapes: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    content_cache_limit: Option<u64>,
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
