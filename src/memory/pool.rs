// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scratch buffer pooling for activation tensors.
//!
//! Uses parking_lot::Mutex for fast synchronous locking. A buffer handed out
//! by [`TensorPool::acquire`] is owned by the caller until it is given back
//! with [`TensorPool::release`].

use parking_lot::Mutex;

use crate::tensor::{Shape, Tensor};

/// Configuration for the tensor pool.
#[derive(Debug, Clone)]
pub struct TensorPoolConfig {
    /// Buffers retained between calls; extra releases are dropped.
    pub max_buffers: usize,
}

impl Default for TensorPoolConfig {
    fn default() -> Self {
        Self { max_buffers: 16 }
    }
}

/// Thread-safe pool of reusable `Vec<f32>` allocations.
pub struct TensorPool {
    buffers: Mutex<Vec<Vec<f32>>>,
    config: TensorPoolConfig,
}

impl TensorPool {
    pub fn new(config: TensorPoolConfig) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(config.max_buffers)),
            config,
        }
    }

    /// Zeroed tensor of `shape`, reusing the smallest retained buffer that is
    /// large enough.
    pub fn acquire(&self, shape: Shape) -> Tensor {
        let needed = shape.num_elements();
        let reused = {
            let mut buffers = self.buffers.lock();
            let best = buffers
                .iter()
                .enumerate()
                .filter(|(_, b)| b.capacity() >= needed)
                .min_by_key(|(_, b)| b.capacity())
                .map(|(i, _)| i);
            best.map(|i| buffers.swap_remove(i))
        };
        match reused {
            Some(buffer) => Tensor::from_scratch(shape, buffer),
            None => Tensor::zeros(shape),
        }
    }

    /// Return a tensor's allocation to the pool.
    pub fn release(&self, tensor: Tensor) {
        let buffer = tensor.into_vec();
        if buffer.capacity() == 0 {
            return;
        }
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.config.max_buffers {
            buffers.push(buffer);
        }
    }

    /// Current number of available buffers in pool.
    pub fn available(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Drop every retained buffer.
    pub fn clear(&self) {
        self.buffers.lock().clear();
    }
}

impl Default for TensorPool {
    fn default() -> Self {
        Self::new(TensorPoolConfig::default())
    }
}
