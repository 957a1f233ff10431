// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fully connected layer (Gemm with a transposed weight).

use super::parallel::for_each_chunk;
use super::{malformed, mismatch, optional_vector, required, ParamSource};
use crate::engine::InferenceError;
use crate::models::format::NodeDef;
use crate::tensor::{Shape, Tensor};

/// `y[n, u] = sum_f W[u, f] * x[n, f] + b[u]` over each flattened batch item.
///
/// The output shape is `(n, units, 1, 1)`.
#[derive(Debug, Clone)]
pub struct Dense {
    weight: Vec<f32>,
    bias: Option<Vec<f32>>,
    units: usize,
    features: usize,
}

impl Dense {
    pub(super) fn build(node: &NodeDef, params: &dyn ParamSource) -> Result<Self, InferenceError> {
        let weight = required(node, params, "weight", 2)?;
        let (units, features) = (weight.dims[0], weight.dims[1]);
        if units == 0 || features == 0 {
            return Err(malformed(node, "weight has a zero dimension"));
        }
        let bias = optional_vector(node, params, "bias", units)?;
        Ok(Self {
            weight: weight.values,
            bias,
            units,
            features,
        })
    }

    pub(super) fn infer_shape(&self, input: Shape) -> Result<Shape, InferenceError> {
        if input.item() != self.features {
            return Err(mismatch(
                "Gemm",
                format!(
                    "expects {} features per item, input {} has {}",
                    self.features,
                    input,
                    input.item()
                ),
            ));
        }
        Ok(Shape::new(input.batch, self.units, 1, 1))
    }

    pub(super) fn cost(&self, out: Shape) -> usize {
        out.num_elements().saturating_mul(self.features)
    }

    pub(super) fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, Vec::len)
    }

    pub(super) fn execute(&self, input: &Tensor, out: &mut Tensor, threads: usize) {
        let src = input.data();
        let work = self.cost(out.shape());
        for_each_chunk(out.data_mut(), 1, threads, work, |i, cell| {
            let n = i / self.units;
            let u = i % self.units;
            let x = &src[n * self.features..(n + 1) * self.features];
            let w = &self.weight[u * self.features..(u + 1) * self.features];
            let dot: f32 = w.iter().zip(x).map(|(a, b)| a * b).sum();
            cell[0] = dot + self.bias.as_ref().map_or(0.0, |b| b[u]);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{node, Params};
    use super::*;
    use crate::models::format::NodeAttrs;

    #[test]
    fn test_dense_flattens_input() {
        let op = Dense::build(
            &node("Gemm", 1, NodeAttrs::default()),
            &Params::default()
                .with("weight", &[2, 4], vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.0, -1.0, 0.0])
                .with("bias", &[2], vec![0.5, 0.0]),
        )
        .unwrap();
        let input = Tensor::new(Shape::new(1, 1, 2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let shape = op.infer_shape(input.shape()).unwrap();
        assert_eq!(shape, Shape::new(1, 2, 1, 1));
        let mut out = Tensor::zeros(shape);
        op.execute(&input, &mut out, 1);
        assert_eq!(out.data(), &[10.5, -2.0]);
    }

    #[test]
    fn test_dense_batched() {
        let op = Dense::build(
            &node("Gemm", 1, NodeAttrs::default()),
            &Params::default().with("weight", &[1, 2], vec![1.0, 2.0]),
        )
        .unwrap();
        let input = Tensor::new(Shape::new(2, 2, 1, 1), vec![1.0, 1.0, 3.0, 0.5]).unwrap();
        let mut out = Tensor::zeros(op.infer_shape(input.shape()).unwrap());
        op.execute(&input, &mut out, 1);
        assert_eq!(out.data(), &[3.0, 4.0]);
    }

    #[test]
    fn test_feature_mismatch() {
        let op = Dense::build(
            &node("Gemm", 1, NodeAttrs::default()),
            &Params::default().with("weight", &[3, 5], vec![0.0; 15]),
        )
        .unwrap();
        assert!(matches!(
            op.infer_shape(Shape::new(1, 2, 2, 1)),
            Err(InferenceError::ShapeMismatch(_))
        ));
    }
}
