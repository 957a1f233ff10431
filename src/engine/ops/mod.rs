// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Operator set of the CPU backend.
//!
//! Every operator works on NCHW f32 tensors. An operator is built once from a
//! graph node (resolving its weights), checked against the incoming shapes by
//! [`Operator::infer_shape`] at load time, and then executed many times.

mod activation;
mod conv;
mod dense;
mod norm;
pub(crate) mod parallel;
mod pool;
mod structural;

pub use activation::{Softmax, Unary};
pub use conv::Conv2d;
pub use dense::Dense;
pub use norm::BatchNorm;
pub use pool::{GlobalAveragePool, Pool2d, PoolKind};
pub use structural::{Add, Concat, Flatten, Identity};

use crate::engine::InferenceError;
use crate::models::format::NodeDef;
use crate::tensor::{Shape, Tensor};

/// A resolved weight tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Weight {
    pub dims: Vec<usize>,
    pub values: Vec<f32>,
}

/// Supplies a node's weights by role (`weight`, `bias`, `mean`, ...).
pub trait ParamSource {
    fn param(&self, role: &str) -> Result<Option<Weight>, InferenceError>;
}

/// Operator names understood by this build, ONNX spelling first.
pub const SUPPORTED_OPERATORS: &[&str] = &[
    "Conv",
    "Gemm",
    "MaxPool",
    "AveragePool",
    "GlobalAveragePool",
    "BatchNormalization",
    "Relu",
    "LeakyRelu",
    "Relu6",
    "Sigmoid",
    "Tanh",
    "Clip",
    "Softmax",
    "Flatten",
    "Add",
    "Concat",
    "Identity",
];

/// Short aliases and the operator they stand for.
const ALIASES: &[(&str, &str)] = &[
    ("Conv2d", "Conv"),
    ("Dense", "Gemm"),
    ("Linear", "Gemm"),
    ("MaxPool2d", "MaxPool"),
    ("AvgPool2d", "AveragePool"),
    ("BatchNorm", "BatchNormalization"),
];

/// Canonical name of `op`, or `None` when this build cannot execute it.
pub fn canonical_name(op: &str) -> Option<&'static str> {
    SUPPORTED_OPERATORS
        .iter()
        .find(|name| **name == op)
        .copied()
        .or_else(|| ALIASES.iter().find(|(alias, _)| *alias == op).map(|(_, name)| *name))
}

/// One executable operator with its weights.
#[derive(Debug, Clone)]
pub enum Operator {
    Conv(Conv2d),
    Dense(Dense),
    Pool(Pool2d),
    GlobalAveragePool(GlobalAveragePool),
    BatchNorm(BatchNorm),
    Unary(Unary),
    Softmax(Softmax),
    Flatten(Flatten),
    Add(Add),
    Concat(Concat),
    Identity(Identity),
}

impl Operator {
    /// Build the operator for `node`, failing with `UnsupportedOperator` for
    /// unknown op names and `Parse` for malformed attributes or weights.
    pub fn from_node(node: &NodeDef, params: &dyn ParamSource) -> Result<Self, InferenceError> {
        let attrs = &node.attrs;
        let op = match node.op.as_str() {
            "Conv" | "Conv2d" => Self::Conv(Conv2d::build(node, params)?),
            "Gemm" | "Dense" | "Linear" => Self::Dense(Dense::build(node, params)?),
            "MaxPool" | "MaxPool2d" => Self::Pool(Pool2d::build(node, PoolKind::Max)?),
            "AveragePool" | "AvgPool2d" => Self::Pool(Pool2d::build(node, PoolKind::Average)?),
            "GlobalAveragePool" => Self::GlobalAveragePool(GlobalAveragePool),
            "BatchNormalization" | "BatchNorm" => {
                Self::BatchNorm(BatchNorm::build(node, params)?)
            }
            "Relu" => Self::Unary(Unary::Relu),
            "LeakyRelu" => Self::Unary(Unary::LeakyRelu {
                alpha: attrs.alpha.unwrap_or(0.01),
            }),
            "Relu6" => Self::Unary(Unary::Clip { min: 0.0, max: 6.0 }),
            "Sigmoid" => Self::Unary(Unary::Sigmoid),
            "Tanh" => Self::Unary(Unary::Tanh),
            "Clip" => {
                let min = attrs.min.unwrap_or(f32::NEG_INFINITY);
                let max = attrs.max.unwrap_or(f32::INFINITY);
                if min > max {
                    return Err(malformed(node, "Clip min is greater than max"));
                }
                Self::Unary(Unary::Clip { min, max })
            }
            "Softmax" => Self::Softmax(Softmax),
            "Flatten" => Self::Flatten(Flatten),
            "Add" => Self::Add(Add),
            "Concat" => Self::Concat(Concat),
            "Identity" => Self::Identity(Identity),
            other => {
                return Err(InferenceError::UnsupportedOperator {
                    op: other.to_string(),
                    node: node.name.clone(),
                })
            }
        };
        op.check_arity(node)?;
        Ok(op)
    }

    /// Short operator name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Conv(_) => "Conv",
            Self::Dense(_) => "Gemm",
            Self::Pool(p) => match p.kind() {
                PoolKind::Max => "MaxPool",
                PoolKind::Average => "AveragePool",
            },
            Self::GlobalAveragePool(_) => "GlobalAveragePool",
            Self::BatchNorm(_) => "BatchNormalization",
            Self::Unary(u) => u.name(),
            Self::Softmax(_) => "Softmax",
            Self::Flatten(_) => "Flatten",
            Self::Add(_) => "Add",
            Self::Concat(_) => "Concat",
            Self::Identity(_) => "Identity",
        }
    }

    fn check_arity(&self, node: &NodeDef) -> Result<(), InferenceError> {
        let n = node.inputs.len();
        let ok = match self {
            Self::Add(_) => n == 2,
            Self::Concat(_) => n >= 2,
            _ => n == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(malformed(
                node,
                &format!("{} does not take {} input(s)", self.name(), n),
            ))
        }
    }

    /// Output shape for the given input shapes. Fails with `ShapeMismatch`.
    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Shape, InferenceError> {
        match self {
            Self::Conv(op) => op.infer_shape(inputs[0]),
            Self::Dense(op) => op.infer_shape(inputs[0]),
            Self::Pool(op) => op.infer_shape(inputs[0]),
            Self::GlobalAveragePool(op) => Ok(op.infer_shape(inputs[0])),
            Self::BatchNorm(op) => op.infer_shape(inputs[0]),
            Self::Unary(_) | Self::Softmax(_) | Self::Identity(_) => Ok(inputs[0]),
            Self::Flatten(op) => Ok(op.infer_shape(inputs[0])),
            Self::Add(op) => op.infer_shape(inputs),
            Self::Concat(op) => op.infer_shape(inputs),
        }
    }

    /// Estimated multiply-adds for one execution producing `out`.
    pub fn cost(&self, inputs: &[Shape], out: Shape) -> usize {
        match self {
            Self::Conv(op) => op.cost(out),
            Self::Dense(op) => op.cost(out),
            Self::Pool(op) => op.cost(out),
            Self::GlobalAveragePool(_) => inputs[0].num_elements(),
            _ => out.num_elements(),
        }
    }

    /// Run the operator. `out` already has the inferred output shape.
    pub fn execute(&self, inputs: &[&Tensor], out: &mut Tensor, threads: usize) {
        match self {
            Self::Conv(op) => op.execute(inputs[0], out, threads),
            Self::Dense(op) => op.execute(inputs[0], out, threads),
            Self::Pool(op) => op.execute(inputs[0], out, threads),
            Self::GlobalAveragePool(op) => op.execute(inputs[0], out, threads),
            Self::BatchNorm(op) => op.execute(inputs[0], out, threads),
            Self::Unary(op) => op.execute(inputs[0], out),
            Self::Softmax(op) => op.execute(inputs[0], out),
            Self::Flatten(op) => op.execute(inputs[0], out),
            Self::Add(op) => op.execute(inputs[0], inputs[1], out),
            Self::Concat(op) => op.execute(inputs, out),
            Self::Identity(op) => op.execute(inputs[0], out),
        }
    }

    /// Bytes of weights held by this operator.
    pub fn weight_bytes(&self) -> usize {
        let floats = match self {
            Self::Conv(op) => op.parameter_count(),
            Self::Dense(op) => op.parameter_count(),
            Self::BatchNorm(op) => op.parameter_count(),
            _ => 0,
        };
        floats * std::mem::size_of::<f32>()
    }
}

pub(crate) fn malformed(node: &NodeDef, detail: &str) -> InferenceError {
    InferenceError::Parse(format!("node '{}' ({}): {}", node.name, node.op, detail))
}

pub(crate) fn mismatch(op: &str, detail: String) -> InferenceError {
    InferenceError::ShapeMismatch(format!("{}: {}", op, detail))
}

/// Fetch a weight that must exist and have `rank` dimensions.
pub(crate) fn required(
    node: &NodeDef,
    params: &dyn ParamSource,
    role: &str,
    rank: usize,
) -> Result<Weight, InferenceError> {
    let weight = params
        .param(role)?
        .ok_or_else(|| malformed(node, &format!("missing '{}' parameter", role)))?;
    if weight.dims.len() != rank {
        return Err(malformed(
            node,
            &format!(
                "'{}' must have rank {}, has dims {:?}",
                role, rank, weight.dims
            ),
        ));
    }
    Ok(weight)
}

/// Fetch an optional 1-D weight of exactly `len` values.
pub(crate) fn optional_vector(
    node: &NodeDef,
    params: &dyn ParamSource,
    role: &str,
    len: usize,
) -> Result<Option<Vec<f32>>, InferenceError> {
    match params.param(role)? {
        None => Ok(None),
        Some(w) if w.values.len() == len => Ok(Some(w.values)),
        Some(w) => Err(malformed(
            node,
            &format!("'{}' must hold {} values, has dims {:?}", role, len, w.dims),
        )),
    }
}

/// Largest kernel, stride, padding or dilation accepted from a model file.
pub(crate) const MAX_WINDOW_ATTR: usize = 1 << 16;

/// Reject window attributes outside `1..=MAX_WINDOW_ATTR` (pads may be 0).
pub(crate) fn check_window_attrs(
    node: &NodeDef,
    kernel: [usize; 2],
    stride: [usize; 2],
    pads: [usize; 4],
    dilation: [usize; 2],
) -> Result<(), InferenceError> {
    let positive = kernel.iter().chain(&stride).chain(&dilation);
    if positive.clone().any(|v| *v == 0) {
        return Err(malformed(node, "kernel, stride and dilation must be > 0"));
    }
    if let Some(v) = positive.chain(&pads).find(|v| **v > MAX_WINDOW_ATTR) {
        return Err(malformed(
            node,
            &format!("window attribute {} exceeds the limit of {}", v, MAX_WINDOW_ATTR),
        ));
    }
    Ok(())
}

/// Spatial output extent of a sliding window, `None` when the window does
/// not fit or the extent is not representable.
pub(crate) fn window_extent(
    input: usize,
    kernel: usize,
    stride: usize,
    pad_begin: usize,
    pad_end: usize,
    dilation: usize,
) -> Option<usize> {
    let effective = kernel.checked_sub(1)?.checked_mul(dilation)?.checked_add(1)?;
    let padded = input.checked_add(pad_begin)?.checked_add(pad_end)?;
    if padded < effective || stride == 0 {
        return None;
    }
    Some((padded - effective) / stride + 1)
}
