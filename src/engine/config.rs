// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Execution configuration for a loaded model.
//!
//! All fields have safe defaults. Configuration is validated before use.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::InferenceError;

/// Default activation budget per prediction (1 GiB).
pub const DEFAULT_MAX_ACTIVATION_BYTES: usize = 1 << 30;

/// Smallest accepted activation budget (1 MiB).
pub const MIN_ACTIVATION_BYTES: usize = 1 << 20;

/// Memory layout of the caller's input buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    /// Channel-first, used as-is.
    #[default]
    Nchw,
    /// Channel-last, transposed during preprocessing.
    Nhwc,
}

impl FromStr for InputLayout {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nchw" => Ok(Self::Nchw),
            "nhwc" => Ok(Self::Nhwc),
            other => Err(InferenceError::InvalidArgument(format!(
                "unknown input layout '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for InputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nchw => "nchw",
            Self::Nhwc => "nhwc",
        })
    }
}

/// Per-session execution configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Kernel threads; 0 = one per logical CPU.
    pub threads: usize,
    pub input_layout: InputLayout,
    /// Fail predictions whose output holds NaN or infinity.
    pub reject_non_finite: bool,
    /// Peak activation memory allowed for one prediction.
    pub max_activation_bytes: usize,
    /// Scratch buffers kept between predictions.
    pub pool_buffers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            input_layout: InputLayout::Nchw,
            reject_non_finite: true,
            max_activation_bytes: DEFAULT_MAX_ACTIVATION_BYTES,
            pool_buffers: 16,
        }
    }
}

impl EngineConfig {
    /// Validate configuration values. Returns error on invalid values.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.max_activation_bytes < MIN_ACTIVATION_BYTES {
            return Err(InferenceError::InvalidArgument(format!(
                "max_activation_bytes must be >= {}",
                MIN_ACTIVATION_BYTES
            )));
        }
        Ok(())
    }

    /// Thread count the kernels will actually use.
    ///
    /// Without the `parallel` feature this is always 1.
    pub fn effective_threads(&self) -> usize {
        if !cfg!(feature = "parallel") {
            return 1;
        }
        match self.threads {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }
}
