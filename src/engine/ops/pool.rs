// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Windowed and global pooling.

use super::parallel::for_each_chunk;
use super::{check_window_attrs, malformed, mismatch, window_extent};
use crate::engine::InferenceError;
use crate::models::format::NodeDef;
use crate::tensor::{Shape, Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Max,
    /// Padding is excluded from the mean.
    Average,
}

#[derive(Debug, Clone)]
pub struct Pool2d {
    kind: PoolKind,
    kernel: [usize; 2],
    stride: [usize; 2],
    pads: [usize; 4],
}

impl Pool2d {
    pub(super) fn build(node: &NodeDef, kind: PoolKind) -> Result<Self, InferenceError> {
        let attrs = &node.attrs;
        let kernel = attrs
            .kernel
            .ok_or_else(|| malformed(node, "pooling needs a 'kernel' attribute"))?;
        let stride = attrs.stride.unwrap_or(kernel);
        let pads = attrs.pads.unwrap_or([0; 4]);
        check_window_attrs(node, kernel, stride, pads, [1, 1])?;
        if pads[0] >= kernel[0] || pads[2] >= kernel[0] || pads[1] >= kernel[1] || pads[3] >= kernel[1] {
            return Err(malformed(node, "padding must be smaller than the kernel"));
        }
        Ok(Self { kind, kernel, stride, pads })
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub(super) fn infer_shape(&self, input: Shape) -> Result<Shape, InferenceError> {
        let [pt, pl, pb, pr] = self.pads;
        let oh = window_extent(input.height, self.kernel[0], self.stride[0], pt, pb, 1);
        let ow = window_extent(input.width, self.kernel[1], self.stride[1], pl, pr, 1);
        match (oh, ow) {
            (Some(oh), Some(ow)) => Ok(Shape::new(input.batch, input.channels, oh, ow)),
            _ => Err(mismatch(
                "Pool",
                format!("kernel {:?} does not fit input {}", self.kernel, input),
            )),
        }
    }

    pub(super) fn cost(&self, out: Shape) -> usize {
        out.num_elements()
            .saturating_mul(self.kernel[0] * self.kernel[1])
    }

    pub(super) fn execute(&self, input: &Tensor, out: &mut Tensor, threads: usize) {
        let in_shape = input.shape();
        let out_shape = out.shape();
        let (oh, ow) = (out_shape.height, out_shape.width);
        let (ih, iw) = (in_shape.height as isize, in_shape.width as isize);
        let (pt, pl) = (self.pads[0] as isize, self.pads[1] as isize);
        let src = input.data();
        let work = self.cost(out_shape);

        for_each_chunk(out.data_mut(), oh * ow, threads, work, |i, plane| {
            let base = i * in_shape.plane();
            for oy in 0..oh {
                for ox in 0..ow {
                    let mut max = f32::NEG_INFINITY;
                    let mut sum = 0.0f32;
                    let mut count = 0usize;
                    for ky in 0..self.kernel[0] {
                        let iy = (oy * self.stride[0] + ky) as isize - pt;
                        if iy < 0 || iy >= ih {
                            continue;
                        }
                        for kx in 0..self.kernel[1] {
                            let ix = (ox * self.stride[1] + kx) as isize - pl;
                            if ix < 0 || ix >= iw {
                                continue;
                            }
                            let v = src[base + iy as usize * in_shape.width + ix as usize];
                            if v > max || v.is_nan() {
                                max = v;
                            }
                            sum += v;
                            count += 1;
                        }
                    }
                    plane[oy * ow + ox] = match (self.kind, count) {
                        (_, 0) => 0.0,
                        (PoolKind::Max, _) => max,
                        (PoolKind::Average, n) => sum / n as f32,
                    };
                }
            }
        });
    }
}

/// Mean over each `(h, w)` plane; output is `(n, c, 1, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct GlobalAveragePool;

impl GlobalAveragePool {
    pub(super) fn infer_shape(&self, input: Shape) -> Shape {
        Shape::new(input.batch, input.channels, 1, 1)
    }

    pub(super) fn execute(&self, input: &Tensor, out: &mut Tensor, threads: usize) {
        let plane = input.shape().plane();
        let src = input.data();
        for_each_chunk(out.data_mut(), 1, threads, src.len(), |i, cell| {
            let values = &src[i * plane..(i + 1) * plane];
            cell[0] = values.iter().sum::<f32>() / plane as f32;
        });
    }
}
