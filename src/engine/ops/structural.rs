// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Operators that move or combine data without weights.

use super::mismatch;
use crate::engine::InferenceError;
use crate::tensor::{Shape, Tensor};

/// Collapses `(c, h, w)` into channels: `(n, c*h*w, 1, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct Flatten;

impl Flatten {
    pub(super) fn infer_shape(&self, input: Shape) -> Shape {
        Shape::new(input.batch, input.item(), 1, 1)
    }

    pub(super) fn execute(&self, input: &Tensor, out: &mut Tensor) {
        out.data_mut().copy_from_slice(input.data());
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Identity;

impl Identity {
    pub(super) fn execute(&self, input: &Tensor, out: &mut Tensor) {
        out.data_mut().copy_from_slice(input.data());
    }
}

/// Element-wise sum of two tensors of identical shape.
#[derive(Debug, Clone, Copy)]
pub struct Add;

impl Add {
    pub(super) fn infer_shape(&self, inputs: &[Shape]) -> Result<Shape, InferenceError> {
        let (a, b) = (inputs[0], inputs[1]);
        if a != b {
            return Err(mismatch("Add", format!("operands {} and {} differ", a, b)));
        }
        Ok(a)
    }

    pub(super) fn execute(&self, a: &Tensor, b: &Tensor, out: &mut Tensor) {
        for ((y, x1), x2) in out.data_mut().iter_mut().zip(a.data()).zip(b.data()) {
            *y = x1 + x2;
        }
    }
}

/// Channel-axis concatenation.
#[derive(Debug, Clone, Copy)]
pub struct Concat;

impl Concat {
    pub(super) fn infer_shape(&self, inputs: &[Shape]) -> Result<Shape, InferenceError> {
        let first = inputs[0];
        let mut channels = 0usize;
        for s in inputs {
            if (s.batch, s.height, s.width) != (first.batch, first.height, first.width) {
                return Err(mismatch(
                    "Concat",
                    format!("input {} does not line up with {}", s, first),
                ));
            }
            channels = channels
                .checked_add(s.channels)
                .ok_or_else(|| mismatch("Concat", "channel count overflows".to_string()))?;
        }
        Ok(first.with_channels(channels))
    }

    pub(super) fn execute(&self, inputs: &[&Tensor], out: &mut Tensor) {
        let out_item = out.shape().item();
        let dst = out.data_mut();
        let mut offset = 0;
        for t in inputs {
            let item = t.shape().item();
            for (n, chunk) in t.data().chunks(item).enumerate() {
                let start = n * out_item + offset;
                dst[start..start + item].copy_from_slice(chunk);
            }
            offset += item;
        }
    }
}
