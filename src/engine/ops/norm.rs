// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inference-mode batch normalization.

use super::parallel::for_each_chunk;
use super::{malformed, mismatch, required, ParamSource};
use crate::engine::InferenceError;
use crate::models::format::NodeDef;
use crate::tensor::{Shape, Tensor};

const DEFAULT_EPSILON: f32 = 1e-5;

/// `y = scale * (x - mean) / sqrt(var + eps) + bias`, folded at build time
/// into one multiplier and one offset per channel.
#[derive(Debug, Clone)]
pub struct BatchNorm {
    multiplier: Vec<f32>,
    offset: Vec<f32>,
}

impl BatchNorm {
    pub(super) fn build(node: &NodeDef, params: &dyn ParamSource) -> Result<Self, InferenceError> {
        let scale = required(node, params, "scale", 1)?.values;
        let channels = scale.len();
        let vector = |role: &str| -> Result<Vec<f32>, InferenceError> {
            let values = required(node, params, role, 1)?.values;
            if values.len() != channels {
                return Err(malformed(
                    node,
                    &format!("'{}' has {} values, 'scale' has {}", role, values.len(), channels),
                ));
            }
            Ok(values)
        };
        let bias = vector("bias")?;
        let mean = vector("mean")?;
        let var = vector("var")?;

        let epsilon = node.attrs.epsilon.unwrap_or(DEFAULT_EPSILON);
        if epsilon.is_nan() || epsilon < 0.0 {
            return Err(malformed(node, "epsilon must be non-negative"));
        }

        let mut multiplier = Vec::with_capacity(channels);
        let mut offset = Vec::with_capacity(channels);
        for c in 0..channels {
            let m = scale[c] / (var[c] + epsilon).sqrt();
            multiplier.push(m);
            offset.push(bias[c] - mean[c] * m);
        }
        Ok(Self { multiplier, offset })
    }

    pub(super) fn infer_shape(&self, input: Shape) -> Result<Shape, InferenceError> {
        if input.channels != self.multiplier.len() {
            return Err(mismatch(
                "BatchNormalization",
                format!(
                    "has {} channels of statistics, input {} has {}",
                    self.multiplier.len(),
                    input,
                    input.channels
                ),
            ));
        }
        Ok(input)
    }

    pub(super) fn parameter_count(&self) -> usize {
        self.multiplier.len() + self.offset.len()
    }

    pub(super) fn execute(&self, input: &Tensor, out: &mut Tensor, threads: usize) {
        let shape = input.shape();
        let plane = shape.plane();
        let src = input.data();
        for_each_chunk(out.data_mut(), plane, threads, src.len(), |i, dst| {
            let c = i % shape.channels;
            let (m, b) = (self.multiplier[c], self.offset[c]);
            for (y, x) in dst.iter_mut().zip(&src[i * plane..(i + 1) * plane]) {
                *y = x * m + b;
            }
        });
    }
}
