// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! 2-D convolution with stride, padding, dilation and groups.

use super::parallel::for_each_chunk;
use super::{
    check_window_attrs, malformed, mismatch, optional_vector, required, window_extent, ParamSource,
};
use crate::engine::InferenceError;
use crate::models::format::NodeDef;
use crate::tensor::{Shape, Tensor};

/// Direct convolution. Weight layout is `[out_c, in_c / groups, kh, kw]`.
#[derive(Debug, Clone)]
pub struct Conv2d {
    weight: Vec<f32>,
    bias: Option<Vec<f32>>,
    out_channels: usize,
    in_per_group: usize,
    kernel: [usize; 2],
    stride: [usize; 2],
    /// `[top, left, bottom, right]`.
    pads: [usize; 4],
    dilation: [usize; 2],
    groups: usize,
}

impl Conv2d {
    pub(super) fn build(node: &NodeDef, params: &dyn ParamSource) -> Result<Self, InferenceError> {
        let weight = required(node, params, "weight", 4)?;
        let [out_channels, in_per_group, kh, kw] = [
            weight.dims[0],
            weight.dims[1],
            weight.dims[2],
            weight.dims[3],
        ];
        if weight.dims.contains(&0) {
            return Err(malformed(node, "weight has a zero dimension"));
        }

        let attrs = &node.attrs;
        if let Some(kernel) = attrs.kernel {
            if kernel != [kh, kw] {
                return Err(malformed(
                    node,
                    &format!("kernel {:?} disagrees with weight dims {:?}", kernel, [kh, kw]),
                ));
            }
        }
        let groups = attrs.groups.unwrap_or(1);
        if groups == 0 || out_channels % groups != 0 {
            return Err(malformed(
                node,
                &format!("{} output channels cannot be split into {} groups", out_channels, groups),
            ));
        }
        let stride = attrs.stride.unwrap_or([1, 1]);
        let dilation = attrs.dilation.unwrap_or([1, 1]);
        let pads = attrs.pads.unwrap_or([0; 4]);
        check_window_attrs(node, [kh, kw], stride, pads, dilation)?;
        let bias = optional_vector(node, params, "bias", out_channels)?;

        Ok(Self {
            weight: weight.values,
            bias,
            out_channels,
            in_per_group,
            kernel: [kh, kw],
            stride,
            pads,
            dilation,
            groups,
        })
    }

    pub(super) fn infer_shape(&self, input: Shape) -> Result<Shape, InferenceError> {
        let expected = self.in_per_group * self.groups;
        if input.channels != expected {
            return Err(mismatch(
                "Conv",
                format!("expects {} input channels, got {}", expected, input.channels),
            ));
        }
        let [pt, pl, pb, pr] = self.pads;
        let oh = window_extent(input.height, self.kernel[0], self.stride[0], pt, pb, self.dilation[0]);
        let ow = window_extent(input.width, self.kernel[1], self.stride[1], pl, pr, self.dilation[1]);
        match (oh, ow) {
            (Some(oh), Some(ow)) => Ok(Shape::new(input.batch, self.out_channels, oh, ow)),
            _ => Err(mismatch(
                "Conv",
                format!("kernel {:?} does not fit input {}", self.kernel, input),
            )),
        }
    }

    pub(super) fn cost(&self, out: Shape) -> usize {
        out.num_elements()
            .saturating_mul(self.in_per_group)
            .saturating_mul(self.kernel[0] * self.kernel[1])
    }

    pub(super) fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, Vec::len)
    }

    pub(super) fn execute(&self, input: &Tensor, out: &mut Tensor, threads: usize) {
        let in_shape = input.shape();
        let out_shape = out.shape();
        let (oh, ow) = (out_shape.height, out_shape.width);
        let (ih, iw) = (in_shape.height as isize, in_shape.width as isize);
        let [kh, kw] = self.kernel;
        let [sh, sw] = self.stride;
        let [dh, dw] = self.dilation;
        let (pt, pl) = (self.pads[0] as isize, self.pads[1] as isize);
        let out_per_group = self.out_channels / self.groups;
        let kernel_len = self.in_per_group * kh * kw;
        let src = input.data();
        let work = self.cost(out_shape);

        // One chunk is one (n, out_channel) plane.
        for_each_chunk(out.data_mut(), oh * ow, threads, work, |i, plane| {
            let n = i / self.out_channels;
            let oc = i % self.out_channels;
            let group = oc / out_per_group;
            let filter = &self.weight[oc * kernel_len..(oc + 1) * kernel_len];
            let bias = self.bias.as_ref().map_or(0.0, |b| b[oc]);

            for oy in 0..oh {
                for ox in 0..ow {
                    let mut acc = 0.0f32;
                    for icg in 0..self.in_per_group {
                        let ic = group * self.in_per_group + icg;
                        let channel_base = (n * in_shape.channels + ic) * in_shape.plane();
                        for ky in 0..kh {
                            let iy = (oy * sh + ky * dh) as isize - pt;
                            if iy < 0 || iy >= ih {
                                continue;
                            }
                            let row = channel_base + iy as usize * in_shape.width;
                            for kx in 0..kw {
                                let ix = (ox * sw + kx * dw) as isize - pl;
                                if ix < 0 || ix >= iw {
                                    continue;
                                }
                                let w = filter[(icg * kh + ky) * kw + kx];
                                acc += w * src[row + ix as usize];
                            }
                        }
                    }
                    plane[oy * ow + ox] = acc + bias;
                }
            }
        });
    }
}
