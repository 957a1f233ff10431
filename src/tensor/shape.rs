// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Four-dimensional NCHW shape descriptor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::InferenceError;

/// `(batch, channels, height, width)` size of a tensor.
///
/// A shape obtained through [`Shape::validated`] has every dimension > 0 and
/// an element count that fits in `usize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Shape {
    pub const fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self { batch, channels, height, width }
    }

    /// Build a shape and check it, failing with `InvalidShape`.
    pub fn validated(
        batch: usize,
        channels: usize,
        height: usize,
        width: usize,
    ) -> Result<Self, InferenceError> {
        let shape = Self::new(batch, channels, height, width);
        shape.validate()?;
        Ok(shape)
    }

    /// Build a shape from a 4-element slice, e.g. declared ONNX value dims.
    pub fn from_dims(dims: &[usize]) -> Result<Self, InferenceError> {
        match *dims {
            [n, c, h, w] => Self::validated(n, c, h, w),
            _ => Err(InferenceError::InvalidShape(format!(
                "expected 4 dimensions, got {}",
                dims.len()
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.dims().contains(&0) {
            return Err(InferenceError::InvalidShape(format!(
                "every dimension must be > 0, got {}",
                self
            )));
        }
        if self.checked_num_elements().is_none() {
            return Err(InferenceError::InvalidShape(format!(
                "element count of {} overflows",
                self
            )));
        }
        Ok(())
    }

    pub fn dims(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }

    pub fn checked_num_elements(&self) -> Option<usize> {
        self.batch
            .checked_mul(self.channels)?
            .checked_mul(self.height)?
            .checked_mul(self.width)
    }

    /// Total element count. Only meaningful on validated shapes.
    pub fn num_elements(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// Elements in one `(h, w)` plane.
    pub fn plane(&self) -> usize {
        self.height * self.width
    }

    /// Elements in one batch item.
    pub fn item(&self) -> usize {
        self.channels * self.plane()
    }

    pub fn size_bytes(&self) -> usize {
        self.num_elements() * std::mem::size_of::<f32>()
    }

    pub fn with_channels(self, channels: usize) -> Self {
        Self { channels, ..self }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.batch, self.channels, self.height, self.width
        )
    }
}
