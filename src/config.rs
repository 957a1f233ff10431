// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process configuration from an optional TOML file and `MONOINFER_*`
//! environment variables.
//!
//! Environment variables override the file, the file overrides the defaults.
//! Invalid values fall back without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `MONOINFER_CONFIG` | unset | Path of a TOML config file |
//! | `MONOINFER_NUM_THREADS` | 0 | Kernel threads (0 = auto) |
//! | `MONOINFER_INPUT_LAYOUT` | nchw | `nchw` or `nhwc` |
//! | `MONOINFER_REJECT_NON_FINITE` | true | Fail on NaN/inf outputs |
//! | `MONOINFER_MAX_ACTIVATION_BYTES` | 1073741824 | Peak activations per call (floor 1 MiB) |
//! | `MONOINFER_MAX_MODEL_BYTES` | 1073741824 | Largest model file accepted |
//! | `MONOINFER_POOL_BUFFERS` | 16 | Scratch buffers kept per engine |
//! | `MONOINFER_LOG` | warn | Log filter directive |
//! | `MONOINFER_LOG_FORMAT` | json | `json` or `pretty` |

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineConfig, InputLayout, MIN_ACTIVATION_BYTES};
use crate::models::LoaderConfig;
use crate::telemetry::{LogConfig, LogFormat};

pub const ENV_CONFIG: &str = "MONOINFER_CONFIG";
pub const ENV_NUM_THREADS: &str = "MONOINFER_NUM_THREADS";
pub const ENV_INPUT_LAYOUT: &str = "MONOINFER_INPUT_LAYOUT";
pub const ENV_REJECT_NON_FINITE: &str = "MONOINFER_REJECT_NON_FINITE";
pub const ENV_MAX_ACTIVATION_BYTES: &str = "MONOINFER_MAX_ACTIVATION_BYTES";
pub const ENV_MAX_MODEL_BYTES: &str = "MONOINFER_MAX_MODEL_BYTES";
pub const ENV_POOL_BUFFERS: &str = "MONOINFER_POOL_BUFFERS";
pub const ENV_LOG: &str = "MONOINFER_LOG";
pub const ENV_LOG_FORMAT: &str = "MONOINFER_LOG_FORMAT";

/// Keys accepted in the TOML file. All optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub num_threads: Option<usize>,
    pub input_layout: Option<InputLayout>,
    pub reject_non_finite: Option<bool>,
    pub max_activation_bytes: Option<usize>,
    pub max_model_bytes: Option<u64>,
    pub pool_buffers: Option<usize>,
    pub log: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        toml::from_str(&text).map_err(|e| format!("invalid {}: {}", path.display(), e))
    }
}

/// Everything the crate reads from its environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub engine: EngineConfig,
    pub loader: LoaderConfig,
    pub log: LogConfig,
    /// Config file that was applied, if any.
    pub config_file: Option<PathBuf>,
    /// Why the config file was ignored, if it was.
    pub config_file_error: Option<String>,
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub num_threads: usize,
    pub effective_threads: usize,
    pub input_layout: InputLayout,
    pub reject_non_finite: bool,
    pub max_activation_bytes: usize,
    pub max_model_bytes: u64,
    pub pool_buffers: usize,
    pub log: String,
    pub log_format: LogFormat,
    pub config_file: Option<PathBuf>,
    pub config_file_error: Option<String>,
    pub parallel: bool,
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    env(key)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    env(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

/// Parse a boolean env var (`1/true/yes/on`, `0/false/no/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match env(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn parse_with<T: std::str::FromStr>(key: &str, default: T) -> T {
    env(key).and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}

/// Apply file values on top of the defaults.
fn apply_file(config: &mut EnvConfig, file: FileConfig) {
    let engine = &mut config.engine;
    engine.threads = file.num_threads.unwrap_or(engine.threads);
    engine.input_layout = file.input_layout.unwrap_or(engine.input_layout);
    engine.reject_non_finite = file.reject_non_finite.unwrap_or(engine.reject_non_finite);
    engine.max_activation_bytes = file.max_activation_bytes.unwrap_or(engine.max_activation_bytes);
    engine.pool_buffers = file.pool_buffers.unwrap_or(engine.pool_buffers);
    config.loader.max_model_bytes = file.max_model_bytes.unwrap_or(config.loader.max_model_bytes);
    if let Some(level) = file.log {
        config.log.level = level;
    }
    config.log.format = file.log_format.unwrap_or(config.log.format);
}

/// Load all configuration.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let mut config = EnvConfig::default();

    if let Some(path) = env(ENV_CONFIG).map(PathBuf::from) {
        match FileConfig::from_path(&path) {
            Ok(file) => {
                apply_file(&mut config, file);
                config.config_file = Some(path);
            }
            Err(e) => config.config_file_error = Some(e),
        }
    }

    let engine = &mut config.engine;
    engine.threads = parse_usize(ENV_NUM_THREADS, engine.threads);
    engine.input_layout = parse_with(ENV_INPUT_LAYOUT, engine.input_layout);
    engine.reject_non_finite = parse_bool(ENV_REJECT_NON_FINITE, engine.reject_non_finite);
    engine.max_activation_bytes =
        parse_usize(ENV_MAX_ACTIVATION_BYTES, engine.max_activation_bytes).max(MIN_ACTIVATION_BYTES);
    engine.pool_buffers = parse_usize(ENV_POOL_BUFFERS, engine.pool_buffers);

    config.loader.max_model_bytes = parse_u64(ENV_MAX_MODEL_BYTES, config.loader.max_model_bytes).max(1);
    if let Some(level) = env(ENV_LOG) {
        config.log.level = level;
    }
    config.log.format = parse_with(ENV_LOG_FORMAT, config.log.format);

    config
}

static GLOBAL: OnceLock<EnvConfig> = OnceLock::new();

/// Configuration read once per process, on first use.
pub fn global() -> &'static EnvConfig {
    GLOBAL.get_or_init(load)
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            num_threads: self.engine.threads,
            effective_threads: self.engine.effective_threads(),
            input_layout: self.engine.input_layout,
            reject_non_finite: self.engine.reject_non_finite,
            max_activation_bytes: self.engine.max_activation_bytes,
            max_model_bytes: self.loader.max_model_bytes,
            pool_buffers: self.engine.pool_buffers,
            log: self.log.level.clone(),
            log_format: self.log.format,
            config_file: self.config_file.clone(),
            config_file_error: self.config_file_error.clone(),
            parallel: cfg!(feature = "parallel"),
        }
    }
}
