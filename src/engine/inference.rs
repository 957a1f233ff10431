// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Three-stage prediction pipeline over one loaded model.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::backend::{Backend, CpuBackend};
use super::config::{EngineConfig, InputLayout};
use super::error::InferenceError;
use crate::memory::{TensorPool, TensorPoolConfig};
use crate::models::ModelDescriptor;
use crate::telemetry;
use crate::tensor::{Shape, Tensor};

/// Wall-clock time spent in each stage of one prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingRecord {
    pub preprocess: Duration,
    pub inference: Duration,
    pub postprocess: Duration,
}

impl TimingRecord {
    pub fn preprocess_ms(&self) -> f32 {
        millis(self.preprocess)
    }

    pub fn inference_ms(&self) -> f32 {
        millis(self.inference)
    }

    pub fn postprocess_ms(&self) -> f32 {
        millis(self.postprocess)
    }

    pub fn total(&self) -> Duration {
        self.preprocess + self.inference + self.postprocess
    }
}

fn millis(d: Duration) -> f32 {
    (d.as_secs_f64() * 1000.0) as f32
}

/// Output of a successful prediction.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Exactly `output_shape.num_elements()` values, capacity included.
    pub output: Tensor,
    pub timing: TimingRecord,
}

/// Runs predictions for one model with one backend.
pub struct ExecutionEngine {
    model: Arc<ModelDescriptor>,
    backend: Box<dyn Backend>,
    pool: TensorPool,
    /// Held around `execute` when the backend is not reentrant.
    exec_lock: Mutex<()>,
    config: EngineConfig,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("model", &self.model.name())
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ExecutionEngine {
    /// Engine on the CPU backend with `config.effective_threads()` threads.
    pub fn new(model: Arc<ModelDescriptor>, config: &EngineConfig) -> Result<Self, InferenceError> {
        let backend = CpuBackend::new(config.effective_threads());
        Self::with_backend(model, config, Box::new(backend))
    }

    pub fn with_backend(
        model: Arc<ModelDescriptor>,
        config: &EngineConfig,
        backend: Box<dyn Backend>,
    ) -> Result<Self, InferenceError> {
        config.validate()?;
        Ok(Self {
            model,
            backend,
            pool: TensorPool::new(TensorPoolConfig {
                max_buffers: config.pool_buffers,
            }),
            exec_lock: Mutex::new(()),
            config: config.clone(),
        })
    }

    pub fn model(&self) -> &Arc<ModelDescriptor> {
        &self.model
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one prediction on a borrowed input of exactly the model's input
    /// element count. The input is copied and never retained.
    pub fn predict(&self, input: &[f32]) -> Result<Prediction, InferenceError> {
        let in_shape = self.model.input_shape();
        if input.len() != in_shape.num_elements() {
            return Err(InferenceError::InvalidArgument(format!(
                "input has {} values, model input {} needs {}",
                input.len(),
                in_shape,
                in_shape.num_elements()
            )));
        }
        let peak = self.model.peak_activation_bytes();
        if peak > self.config.max_activation_bytes {
            return Err(InferenceError::InferenceFailure(format!(
                "model needs {} activation bytes, limit is {}",
                peak, self.config.max_activation_bytes
            )));
        }

        let started = Instant::now();
        let tensor = match self.config.input_layout {
            InputLayout::Nchw => Tensor::from_slice(in_shape, input)?,
            InputLayout::Nhwc => nhwc_to_nchw(in_shape, input),
        };
        let preprocess = started.elapsed();

        let started = Instant::now();
        let raw = {
            let _serial = (!self.backend.is_reentrant()).then(|| self.exec_lock.lock());
            self.backend.execute(&self.model, tensor, &self.pool)?
        };
        let inference = started.elapsed();

        let started = Instant::now();
        let output = self.postprocess(raw)?;
        let postprocess = started.elapsed();

        let timing = TimingRecord {
            preprocess,
            inference,
            postprocess,
        };
        telemetry::record_stage("preprocess", timing.preprocess_ms());
        telemetry::record_stage("inference", timing.inference_ms());
        telemetry::record_stage("postprocess", timing.postprocess_ms());
        tracing::debug!(
            model = self.model.name(),
            preprocess_ms = timing.preprocess_ms(),
            inference_ms = timing.inference_ms(),
            postprocess_ms = timing.postprocess_ms(),
            "Prediction complete"
        );
        Ok(Prediction { output, timing })
    }

    fn postprocess(&self, raw: Tensor) -> Result<Tensor, InferenceError> {
        let expected = self.model.output_shape();
        if raw.shape() != expected {
            let actual = raw.shape();
            self.pool.release(raw);
            return Err(InferenceError::InferenceFailure(format!(
                "backend produced {}, model declares {}",
                actual, expected
            )));
        }
        if self.config.reject_non_finite && !raw.is_finite() {
            self.pool.release(raw);
            return Err(InferenceError::InferenceFailure(
                "output contains NaN or infinite values".into(),
            ));
        }
        let output = Tensor::from_slice(expected, raw.data())?;
        self.pool.release(raw);
        Ok(output)
    }
}

/// Copy a channel-last buffer into a channel-first tensor of `shape`.
fn nhwc_to_nchw(shape: Shape, src: &[f32]) -> Tensor {
    let mut out = Tensor::zeros(shape);
    let (c_n, h_n, w_n) = (shape.channels, shape.height, shape.width);
    let dst = out.data_mut();
    for n in 0..shape.batch {
        for h in 0..h_n {
            for w in 0..w_n {
                let from = ((n * h_n + h) * w_n + w) * c_n;
                for c in 0..c_n {
                    dst[((n * c_n + c) * h_n + h) * w_n + w] = src[from + c];
                }
            }
        }
    }
    out
}
