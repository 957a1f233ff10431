// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Prediction functions for FFI.

use super::error::{contain, report};
use super::marshal::{free_output, input_from_raw, output_into_raw};
use super::types::PredictionResult;
use crate::engine::InferenceError;
use crate::models::SessionRegistry;
use crate::telemetry;

/// Run the current model on `len` floats at `data`.
///
/// Fails with `NotLoaded` when no model is loaded, before the input is looked
/// at. The input is read during the call only. On success the returned buffer
/// belongs to the caller and must be passed to [`release_prediction`].
///
/// # Safety
/// `data` must be null or point at `len` readable floats.
#[no_mangle]
pub unsafe extern "C" fn predict(data: *const f32, len: u32) -> PredictionResult {
    telemetry::ensure_logging();
    let outcome = contain("predict", || -> Result<PredictionResult, InferenceError> {
        let prediction =
            SessionRegistry::global().predict_with(|| input_from_raw(data, len))?;
        let (ptr, out_len) = output_into_raw(prediction.output.into_vec())?;
        Ok(PredictionResult::success(ptr, out_len, &prediction.timing))
    });

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => PredictionResult::failure(report("predict", &e)),
        Err(status) => PredictionResult::failure(status),
    }
}

/// Free the buffer of a result returned by [`predict`].
///
/// Null-safe and idempotent: the result's fields are reset, so releasing it
/// again does nothing.
///
/// # Safety
/// `result` must be null or point at a `PredictionResult` returned by
/// `predict` (or one already released).
#[no_mangle]
pub unsafe extern "C" fn release_prediction(result: *mut PredictionResult) {
    if result.is_null() {
        return;
    }
    let _ = contain("release_prediction", || {
        let r = &mut *result;
        free_output(r.data, r.len);
        r.data = std::ptr::null_mut();
        r.len = 0;
        r.preprocess_time = 0.0;
        r.inference_time = 0.0;
        r.post_process_time = 0.0;
    });
}
