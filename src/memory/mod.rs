// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Memory management for activation buffers.

mod pool;

pub use pool::{TensorPool, TensorPoolConfig};
