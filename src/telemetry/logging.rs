// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Logging configuration and initialization.
//!
//! Supports JSON and pretty-printed formats. The host application may have
//! installed its own subscriber already; that is not an error for the
//! boundary, which only installs one when none exists.

use std::str::FromStr;
use std::sync::Once;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON structured logging (default for embedding hosts).
    #[default]
    Json,
    /// Human-readable pretty printing (for development).
    Pretty,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(LogError::InvalidFormat(other.to_string())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub format: LogFormat,
    /// EnvFilter directive (e.g., "warn", "monoinfer=debug").
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "warn".to_string(),
        }
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Unknown log format: {0}")]
    InvalidFormat(String),
    #[error("Subscriber already initialized")]
    AlreadyInitialized,
}

/// Install the tracing subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter =
        EnvFilter::try_new(&config.level).map_err(|e| LogError::InvalidFilter(e.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|_| LogError::AlreadyInitialized)
}

static BOUNDARY_INIT: Once = Once::new();

/// Install logging and describe metrics once per process from the global
/// configuration.
///
/// Called by every boundary entry point. An invalid filter falls back to the
/// default level; an existing subscriber is left in place.
pub fn ensure_logging() {
    BOUNDARY_INIT.call_once(|| {
        super::metrics::init_metrics();
        let config = crate::config::global().log.clone();
        if let Err(LogError::InvalidFilter(_)) = init_logging(&config) {
            let _ = init_logging(&LogConfig {
                format: config.format,
                ..LogConfig::default()
            });
        }
    });
}
