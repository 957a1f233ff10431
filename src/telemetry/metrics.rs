// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metric names and recording helpers over the `metrics` facade.
//!
//! Nothing is exported unless the host installs a recorder.

pub const LOADS_TOTAL: &str = "monoinfer_loads_total";
pub const PREDICTIONS_TOTAL: &str = "monoinfer_predictions_total";
pub const STAGE_MS: &str = "monoinfer_stage_ms";

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() {
    ::metrics::describe_counter!(LOADS_TOTAL, "Model load attempts by status");
    ::metrics::describe_counter!(PREDICTIONS_TOTAL, "Prediction calls by status");
    ::metrics::describe_histogram!(
        STAGE_MS,
        ::metrics::Unit::Milliseconds,
        "Time spent per prediction stage"
    );
}

/// Count a load attempt; `status` is `ok` or an error kind label.
pub fn record_load(status: &'static str) {
    ::metrics::counter!(LOADS_TOTAL, "status" => status).increment(1);
}

/// Count a prediction call; `status` is `ok` or an error kind label.
pub fn record_prediction(status: &'static str) {
    ::metrics::counter!(PREDICTIONS_TOTAL, "status" => status).increment(1);
}

pub fn record_stage(stage: &'static str, millis: f32) {
    ::metrics::histogram!(STAGE_MS, "stage" => stage).record(f64::from(millis));
}
