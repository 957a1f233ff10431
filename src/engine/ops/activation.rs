// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Element-wise activations and channel softmax.

use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unary {
    Relu,
    LeakyRelu { alpha: f32 },
    Sigmoid,
    Tanh,
    /// Also covers `Relu6` as `Clip { 0, 6 }`.
    Clip { min: f32, max: f32 },
}

impl Unary {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Relu => "Relu",
            Self::LeakyRelu { .. } => "LeakyRelu",
            Self::Sigmoid => "Sigmoid",
            Self::Tanh => "Tanh",
            Self::Clip { .. } => "Clip",
        }
    }

    #[inline]
    fn apply(&self, x: f32) -> f32 {
        match *self {
            // NaN passes through so the output check can see it.
            Self::Relu => {
                if x > 0.0 || x.is_nan() {
                    x
                } else {
                    0.0
                }
            }
            Self::LeakyRelu { alpha } => {
                if x >= 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
            Self::Clip { min, max } => x.clamp(min, max),
        }
    }

    pub(super) fn execute(&self, input: &Tensor, out: &mut Tensor) {
        for (y, &x) in out.data_mut().iter_mut().zip(input.data()) {
            *y = self.apply(x);
        }
    }
}

/// Softmax across channels at every `(n, h, w)` position.
#[derive(Debug, Clone, Copy)]
pub struct Softmax;

impl Softmax {
    pub(super) fn execute(&self, input: &Tensor, out: &mut Tensor) {
        let shape = input.shape();
        let plane = shape.plane();
        let src = input.data();
        let dst = out.data_mut();
        for n in 0..shape.batch {
            let base = n * shape.item();
            for p in 0..plane {
                let at = |c: usize| base + c * plane + p;
                let max = (0..shape.channels)
                    .map(|c| src[at(c)])
                    .fold(f32::NEG_INFINITY, f32::max);
                let mut sum = 0.0f32;
                for c in 0..shape.channels {
                    let e = (src[at(c)] - max).exp();
                    dst[at(c)] = e;
                    sum += e;
                }
                for c in 0..shape.channels {
                    dst[at(c)] /= sum;
                }
            }
        }
    }
}
