// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Monoinfer
//!
//! A single-model inference core for image-shaped tensors, embedded in a host
//! application through a flat C ABI.
//!
//! # Design Principles
//!
//! - **One model**: the process holds zero or one loaded model, replaced atomically
//! - **Validated up front**: shapes and operators are checked at load, never mid-prediction
//! - **Status codes, not panics**: every boundary call returns a stable status
//! - **Local only**: models are read from local paths; no network access
//!
//! # Layout
//!
//! - [`tensor`]: shapes and dense f32 buffers
//! - [`models`]: graph formats, loading, validation and the session slot
//! - [`engine`]: operator kernels, backends and the prediction pipeline
//! - [`ffi`]: the C boundary (`load_model`, `predict`, `release_prediction`, ...)
//! - [`config`], [`telemetry`]: environment configuration, logging, metrics

pub mod cli;
pub mod config;
pub mod engine;
pub mod ffi;
pub mod memory;
pub mod models;
pub mod telemetry;
pub mod tensor;

pub use engine::{
    EngineConfig, ErrorKind, ExecutionEngine, InferenceError, InputLayout, Prediction,
    TimingRecord,
};
pub use ffi::{PredictionResult, StatusCode};
pub use models::{LoadRequest, ModelDescriptor, ModelLoader, SessionInfo, SessionRegistry};
pub use tensor::{Shape, Tensor};
