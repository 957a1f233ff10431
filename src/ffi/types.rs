// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! C-compatible types shared with the header.

use std::ptr;

use crate::engine::{ErrorKind, InferenceError, TimingRecord};

/// Status codes returned across the boundary. Values are stable.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 0,
    InvalidArgument = -1,
    InvalidShape = -2,
    NotFound = -3,
    ParseError = -4,
    UnsupportedOperator = -5,
    ShapeMismatch = -6,
    NotLoaded = -7,
    InferenceFailure = -8,
    /// A panic was caught at the boundary.
    Internal = -99,
}

impl StatusCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<ErrorKind> for StatusCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidArgument => Self::InvalidArgument,
            ErrorKind::InvalidShape => Self::InvalidShape,
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::ParseError => Self::ParseError,
            ErrorKind::UnsupportedOperator => Self::UnsupportedOperator,
            ErrorKind::ShapeMismatch => Self::ShapeMismatch,
            ErrorKind::NotLoaded => Self::NotLoaded,
            ErrorKind::InferenceFailure => Self::InferenceFailure,
        }
    }
}

impl From<&InferenceError> for StatusCode {
    fn from(e: &InferenceError) -> Self {
        e.kind().into()
    }
}

/// Output of `predict`.
///
/// On success `data` points at `len` floats owned by the caller until passed
/// to `release_prediction`. On failure `data` is null and `len` holds the
/// negative status code. Times are milliseconds. The first two fields form
/// the older `{ float *data; int size; }` layout.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PredictionResult {
    pub data: *mut f32,
    pub len: i32,
    pub preprocess_time: f32,
    pub inference_time: f32,
    pub post_process_time: f32,
}

impl PredictionResult {
    pub(crate) fn success(data: *mut f32, len: i32, timing: &TimingRecord) -> Self {
        Self {
            data,
            len,
            preprocess_time: timing.preprocess_ms(),
            inference_time: timing.inference_ms(),
            post_process_time: timing.postprocess_ms(),
        }
    }

    pub(crate) fn failure(status: StatusCode) -> Self {
        Self {
            data: ptr::null_mut(),
            len: status.code(),
            preprocess_time: 0.0,
            inference_time: 0.0,
            post_process_time: 0.0,
        }
    }

    pub fn is_ok(&self) -> bool {
        !self.data.is_null() && self.len > 0
    }
}
