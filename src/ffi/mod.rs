// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Flat C boundary.
//!
//! This is the only module that touches raw pointers. Every entry point
//! converts its arguments into safe values first, calls into the registry,
//! converts the result back, and contains panics as `StatusCode::Internal`.
//!
//! The process holds at most one model. See `include/monoinfer.h`.

mod error;
mod marshal;
mod models;
mod predict;
mod types;

pub use error::{clear_last_error, last_error, monoinfer_clear_last_error, monoinfer_last_error, set_last_error};
pub use models::{is_model_loaded, load_model, unload_model};
pub use predict::{predict, release_prediction};
pub use types::{PredictionResult, StatusCode};
