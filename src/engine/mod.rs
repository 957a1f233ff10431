// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inference engine: operator kernels, backends and the prediction pipeline.

pub mod backend;
pub mod config;
pub mod error;
pub mod ops;

mod inference;

pub use backend::{Backend, CpuBackend};
pub use config::{EngineConfig, InputLayout, DEFAULT_MAX_ACTIVATION_BYTES, MIN_ACTIVATION_BYTES};
pub use error::{ErrorKind, InferenceError};
pub use inference::{ExecutionEngine, Prediction, TimingRecord};
