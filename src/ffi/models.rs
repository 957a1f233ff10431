// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model lifecycle functions for FFI.

use std::ffi::c_char;

use super::error::{contain, report};
use super::marshal::{path_from_raw, shape_from_raw};
use super::types::StatusCode;
use crate::config;
use crate::engine::InferenceError;
use crate::models::{LoadRequest, ModelLoader, SessionRegistry};
use crate::telemetry;

/// Load a model and make it the current session.
///
/// `model_path` must be NUL-terminated and `model_path_len` must equal its
/// byte length without the terminator. The output batch equals the input
/// batch. Returns 0 on success or a negative status code; on failure any
/// previously loaded model stays current.
///
/// # Safety
/// `model_path` must be null or point at a readable NUL-terminated string.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn load_model(
    model_path: *const c_char,
    model_path_len: u32,
    input_batch_size: u32,
    input_channels: u32,
    input_height: u32,
    input_width: u32,
    output_channels: u32,
    output_height: u32,
    output_width: u32,
) -> i32 {
    telemetry::ensure_logging();
    let outcome = contain("load_model", || -> Result<u64, InferenceError> {
        let path = path_from_raw(model_path, model_path_len)?;
        let input_shape = shape_from_raw(input_batch_size, input_channels, input_height, input_width)?;
        let output_shape =
            shape_from_raw(input_batch_size, output_channels, output_height, output_width)?;

        let env = config::global();
        let loader = ModelLoader::new(env.loader.clone());
        let request = LoadRequest {
            path,
            input_shape,
            output_shape,
        };
        SessionRegistry::global().load(&loader, &request, &env.engine)
    });

    match outcome {
        Ok(Ok(_)) => StatusCode::Ok.code(),
        Ok(Err(e)) => report("load_model", &e).code(),
        Err(status) => status.code(),
    }
}

/// Drop the current session. Returns 0, or `NotLoaded` (-7) if none.
#[no_mangle]
pub extern "C" fn unload_model() -> i32 {
    telemetry::ensure_logging();
    match contain("unload_model", || SessionRegistry::global().unload()) {
        Ok(true) => StatusCode::Ok.code(),
        Ok(false) => report("unload_model", &InferenceError::NotLoaded).code(),
        Err(status) => status.code(),
    }
}

/// 1 when a model is loaded, 0 otherwise.
#[no_mangle]
pub extern "C" fn is_model_loaded() -> i32 {
    contain("is_model_loaded", || SessionRegistry::global().is_loaded())
        .map_or(0, i32::from)
}
