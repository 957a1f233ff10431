// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Execution backends.
//!
//! A backend walks a [`ModelDescriptor`]'s plan. The descriptor is immutable
//! and activations live only for the duration of one call, so a backend that
//! reports [`Backend::is_reentrant`] may be driven from many threads at once.

use crate::engine::InferenceError;
use crate::memory::TensorPool;
use crate::models::{ModelDescriptor, INPUT_SLOT};
use crate::tensor::Tensor;

/// Something that can execute a validated model plan.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether concurrent `execute` calls on one instance are safe.
    fn is_reentrant(&self) -> bool {
        true
    }

    /// Run every node of `model` on `input` and return the graph output.
    ///
    /// `input` already has the model's input shape. Intermediate buffers are
    /// taken from and returned to `pool`.
    fn execute(
        &self,
        model: &ModelDescriptor,
        input: Tensor,
        pool: &TensorPool,
    ) -> Result<Tensor, InferenceError>;
}

/// Portable CPU backend.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    threads: usize,
}

impl CpuBackend {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn execute(
        &self,
        model: &ModelDescriptor,
        input: Tensor,
        pool: &TensorPool,
    ) -> Result<Tensor, InferenceError> {
        if input.shape() != model.input_shape() {
            return Err(InferenceError::InvalidArgument(format!(
                "input shape {} does not match model input {}",
                input.shape(),
                model.input_shape()
            )));
        }

        let mut values: Vec<Option<Tensor>> = Vec::with_capacity(model.value_count());
        values.resize_with(model.value_count(), || None);
        values[INPUT_SLOT] = Some(input);

        for (i, node) in model.nodes().iter().enumerate() {
            let mut out = pool.acquire(node.output_shape);
            {
                let inputs = node
                    .inputs
                    .iter()
                    .map(|&slot| {
                        values[slot].as_ref().ok_or_else(|| {
                            InferenceError::InferenceFailure(format!(
                                "node '{}' ran before its input was produced",
                                node.name
                            ))
                        })
                    })
                    .collect::<Result<Vec<&Tensor>, _>>()?;
                node.op.execute(&inputs, &mut out, self.threads);
            }
            values[node.output] = Some(out);

            for &slot in &node.inputs {
                if model.last_use(slot) == Some(i) {
                    if let Some(dead) = values[slot].take() {
                        pool.release(dead);
                    }
                }
            }
        }

        let output = values[model.output_slot()].take().ok_or_else(|| {
            InferenceError::InferenceFailure("graph output was not produced".into())
        })?;
        for leftover in values.into_iter().flatten() {
            pool.release(leftover);
        }
        Ok(output)
    }
}
