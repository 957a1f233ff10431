// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tensor buffers: the unit of data passed across the boundary.

mod buffer;
mod shape;

pub use buffer::Tensor;
pub use shape::Shape;
