// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Owned f32 tensor buffer.

use super::Shape;
use crate::engine::InferenceError;

/// Contiguous NCHW f32 data plus the shape it conforms to.
///
/// Invariant: `data.len() == shape.num_elements()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Wrap `data`, failing with `InvalidArgument` on a length mismatch.
    pub fn new(shape: Shape, data: Vec<f32>) -> Result<Self, InferenceError> {
        shape.validate()?;
        if data.len() != shape.num_elements() {
            return Err(InferenceError::InvalidArgument(format!(
                "tensor of shape {} needs {} elements, got {}",
                shape,
                shape.num_elements(),
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Copy a borrowed slice into a new tensor.
    pub fn from_slice(shape: Shape, data: &[f32]) -> Result<Self, InferenceError> {
        shape.validate()?;
        if data.len() != shape.num_elements() {
            return Err(InferenceError::InvalidArgument(format!(
                "tensor of shape {} needs {} elements, got {}",
                shape,
                shape.num_elements(),
                data.len()
            )));
        }
        Self::new(shape, data.to_vec())
    }

    pub fn zeros(shape: Shape) -> Self {
        Self {
            shape,
            data: vec![0.0; shape.num_elements()],
        }
    }

    /// Reuse an existing allocation; the buffer is resized and zeroed.
    pub(crate) fn from_scratch(shape: Shape, mut data: Vec<f32>) -> Self {
        data.clear();
        data.resize(shape.num_elements(), 0.0);
        Self { shape, data }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Returns true if every element is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}
