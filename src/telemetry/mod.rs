// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured logging and metrics.
//!
//! All output goes to stderr or to the host's metrics recorder; there are no
//! network dependencies.

mod logging;
mod metrics;

pub use logging::{ensure_logging, init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    init_metrics, record_load, record_prediction, record_stage, LOADS_TOTAL, PREDICTIONS_TOTAL,
    STAGE_MS,
};
