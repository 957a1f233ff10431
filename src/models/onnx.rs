// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! ONNX `ModelProto` decoding.
//!
//! An ONNX graph is mapped onto a [`GraphDocument`] so it goes through the
//! same operator building, scheduling and shape checks as a JSON graph.
//! Node inputs that name an initializer become the node's `params`; the
//! remaining input is the activation. Operators outside the supported set
//! keep their ONNX name and are reported as unsupported by the loader.

use std::collections::{BTreeMap, HashMap};

use candle_onnx::onnx::{
    tensor_proto::{DataLocation, DataType},
    tensor_shape_proto::dimension::Value as Dim,
    type_proto, AttributeProto, GraphProto, ModelProto, NodeProto, TensorProto, ValueInfoProto,
};
use half::f16;
use prost::Message;

use super::format::{
    GraphDocument, InitializerDef, NodeAttrs, NodeDef, WeightDType, FORMAT_TAG, FORMAT_VERSION,
};
use crate::engine::InferenceError;
use crate::tensor::Shape;

/// First opset where `Softmax` defaults to the last axis.
const SOFTMAX_LAST_AXIS_OPSET: i64 = 13;

/// Decode a serialized `ModelProto` into a graph document.
pub fn decode_model(bytes: &[u8]) -> Result<GraphDocument, InferenceError> {
    let model = ModelProto::decode(bytes)
        .map_err(|e| InferenceError::Parse(format!("invalid ONNX protobuf: {}", e)))?;
    let graph = model
        .graph
        .as_ref()
        .ok_or_else(|| InferenceError::Parse("ONNX model has no graph".into()))?;
    let opset = model
        .opset_import
        .iter()
        .find(|o| o.domain.is_empty() || o.domain == "ai.onnx")
        .map_or(1, |o| o.version);

    let tensors: HashMap<&str, &TensorProto> = graph
        .initializer
        .iter()
        .map(|t| (t.name.as_str(), t))
        .collect();

    let input = graph_input(graph, &tensors)?;
    let output = match graph.output.as_slice() {
        [single] => single,
        outputs => {
            return Err(InferenceError::Parse(format!(
                "ONNX graph must have exactly one output, has {}",
                outputs.len()
            )))
        }
    };

    let mut converter = Converter {
        tensors,
        opset,
        initializers: BTreeMap::new(),
    };
    let mut nodes = Vec::with_capacity(graph.node.len());
    for (index, node) in graph.node.iter().enumerate() {
        nodes.push(converter.node(index, node)?);
    }

    let document = GraphDocument {
        format: FORMAT_TAG.to_string(),
        version: FORMAT_VERSION,
        name: (!graph.name.is_empty()).then(|| graph.name.clone()),
        input: input.name.clone(),
        output: output.name.clone(),
        input_shape: static_shape(input)?,
        output_shape: static_shape(output)?,
        initializers: converter.initializers,
        nodes,
    };
    document.check_header()?;
    tracing::debug!(
        producer = %model.producer_name,
        opset,
        nodes = document.nodes.len(),
        "Decoded ONNX model"
    );
    Ok(document)
}

/// The single graph input that is not an initializer. Older exporters also
/// list every initializer as a graph input.
fn graph_input<'a>(
    graph: &'a GraphProto,
    tensors: &HashMap<&str, &TensorProto>,
) -> Result<&'a ValueInfoProto, InferenceError> {
    let mut inputs = graph
        .input
        .iter()
        .filter(|v| !tensors.contains_key(v.name.as_str()));
    match (inputs.next(), inputs.next()) {
        (Some(input), None) => Ok(input),
        (None, _) => Err(InferenceError::Parse("ONNX graph has no input".into())),
        (Some(_), Some(_)) => Err(InferenceError::Parse(
            "ONNX graph has more than one non-initializer input".into(),
        )),
    }
}

/// Declared dims when all four are fixed; symbolic or non-4-D shapes are
/// left to the caller's declaration.
fn static_shape(value: &ValueInfoProto) -> Result<Option<[usize; 4]>, InferenceError> {
    let Some(type_proto::Value::TensorType(tensor)) =
        value.r#type.as_ref().and_then(|t| t.value.as_ref())
    else {
        return Ok(None);
    };
    let Some(shape) = tensor.shape.as_ref() else {
        return Ok(None);
    };
    let mut dims = Vec::with_capacity(shape.dim.len());
    for dim in &shape.dim {
        match &dim.value {
            Some(Dim::DimValue(v)) if *v > 0 => dims.push(*v as usize),
            _ => return Ok(None),
        }
    }
    if dims.len() != 4 {
        return Ok(None);
    }
    let shape = Shape::from_dims(&dims).map_err(|e| {
        InferenceError::Parse(format!("ONNX value '{}' has unusable shape: {}", value.name, e))
    })?;
    Ok(Some(shape.dims()))
}

/// Per-graph conversion state: the ONNX initializers by name and the weights
/// referenced so far.
struct Converter<'a> {
    tensors: HashMap<&'a str, &'a TensorProto>,
    opset: i64,
    initializers: BTreeMap<String, InitializerDef>,
}

impl<'a> Converter<'a> {
    fn node(&mut self, index: usize, node: &NodeProto) -> Result<NodeDef, InferenceError> {
        let name = if node.name.is_empty() {
            format!("{}_{}", node.op_type, index)
        } else {
            node.name.clone()
        };
        if !(node.domain.is_empty() || node.domain == "ai.onnx") {
            return Err(InferenceError::UnsupportedOperator {
                op: format!("{}::{}", node.domain, node.op_type),
                node: name,
            });
        }
        let fail = |detail: String| {
            InferenceError::Parse(format!("ONNX node '{}' ({}): {}", name, node.op_type, detail))
        };

        let output = match (node.op_type.as_str(), node.output.as_slice()) {
            (_, [single]) => single.clone(),
            // The mask output of an inference-mode Dropout is never consumed.
            ("Dropout", [first, ..]) => first.clone(),
            (_, outputs) => return Err(fail(format!("has {} outputs, expected 1", outputs.len()))),
        };
        let inputs: Vec<String> = node
            .input
            .iter()
            .filter(|i| !i.is_empty() && self.initializer(i).is_none())
            .cloned()
            .collect();

        let mut op = node.op_type.clone();
        let mut params = BTreeMap::new();
        let mut attrs = NodeAttrs::default();

        match node.op_type.as_str() {
            "Conv" => {
                self.bind(node, 1, "weight", &mut params)?;
                self.bind(node, 2, "bias", &mut params)?;
                attrs.stride = pair(node, "strides").map_err(&fail)?;
                attrs.dilation = pair(node, "dilations").map_err(&fail)?;
                attrs.pads = pads(node).map_err(&fail)?;
                attrs.groups = int(node, "group")
                    .map(|g| to_usize(g, "group"))
                    .transpose()
                    .map_err(&fail)?;
            }
            "MaxPool" | "AveragePool" => {
                attrs.kernel = pair(node, "kernel_shape").map_err(&fail)?;
                if attrs.kernel.is_none() {
                    return Err(fail("missing kernel_shape".into()));
                }
                attrs.stride = pair(node, "strides").map_err(&fail)?;
                attrs.pads = pads(node).map_err(&fail)?;
                if int(node, "ceil_mode").unwrap_or(0) != 0 {
                    return Err(fail("ceil_mode is not supported".into()));
                }
                if matches!(pair(node, "dilations").map_err(&fail)?, Some(d) if d != [1, 1]) {
                    return Err(fail("pooling dilations are not supported".into()));
                }
                let padded = attrs.pads.is_some_and(|p| p != [0; 4]);
                if node.op_type == "AveragePool" && padded && int(node, "count_include_pad") == Some(1)
                {
                    return Err(fail("count_include_pad with padding is not supported".into()));
                }
            }
            "Gemm" | "MatMul" => {
                let gemm = node.op_type == "Gemm";
                if gemm && int(node, "transA").unwrap_or(0) != 0 {
                    return Err(fail("transA is not supported".into()));
                }
                let b = self
                    .initializer_at(node, 1)
                    .ok_or_else(|| fail("B must be an initializer".into()))?;
                let trans_b = gemm && int(node, "transB").unwrap_or(0) != 0;
                let alpha = if gemm { float(node, "alpha").unwrap_or(1.0) } else { 1.0 };
                let weight = dense_weight(b, trans_b, alpha).map_err(&fail)?;
                let units = weight.dims[0];
                let key = format!("{}.weight", name);
                self.initializers.insert(key.clone(), weight);
                params.insert("weight".to_string(), key);

                if let Some(c) = self.initializer_at(node, 2).filter(|_| gemm) {
                    let beta = float(node, "beta").unwrap_or(1.0);
                    let bias = dense_bias(c, units, beta).map_err(&fail)?;
                    let key = format!("{}.bias", name);
                    self.initializers.insert(key.clone(), bias);
                    params.insert("bias".to_string(), key);
                }
                op = "Gemm".into();
            }
            "BatchNormalization" => {
                for (pos, role) in [(1, "scale"), (2, "bias"), (3, "mean"), (4, "var")] {
                    if self.initializer_at(node, pos).is_none() {
                        return Err(fail(format!("{} must be an initializer", role)));
                    }
                    self.bind(node, pos, role, &mut params)?;
                }
                attrs.epsilon = float(node, "epsilon");
            }
            "LeakyRelu" => attrs.alpha = float(node, "alpha"),
            "Clip" => {
                attrs.min = float(node, "min");
                attrs.max = float(node, "max");
                // Opset 11 moved the bounds from attributes to inputs.
                if let Some(min) = self.initializer_at(node, 1) {
                    attrs.min = Some(scalar(min).map_err(&fail)?);
                }
                if let Some(max) = self.initializer_at(node, 2) {
                    attrs.max = Some(scalar(max).map_err(&fail)?);
                }
            }
            "Softmax" => {
                let default = if self.opset >= SOFTMAX_LAST_AXIS_OPSET { -1 } else { 1 };
                let axis = int(node, "axis").unwrap_or(default);
                // Classifier heads are 2-D, where the last axis is the class axis.
                if axis != 1 && axis != -1 {
                    return Err(fail(format!("softmax over axis {} is not supported", axis)));
                }
            }
            "Flatten" => {
                if int(node, "axis").unwrap_or(1) != 1 {
                    return Err(fail("only axis 1 is supported".into()));
                }
            }
            "Concat" => {
                let axis = int(node, "axis").unwrap_or(1);
                if axis != 1 && axis != -3 {
                    return Err(fail(format!("concat over axis {} is not supported", axis)));
                }
            }
            "Dropout" => op = "Identity".into(),
            _ => {}
        }

        Ok(NodeDef {
            name,
            op,
            inputs,
            output,
            params,
            attrs,
        })
    }

    fn initializer(&self, name: &str) -> Option<&'a TensorProto> {
        self.tensors.get(name).copied()
    }

    /// Initializer named by input `pos` of `node`, if that input is one.
    fn initializer_at(&self, node: &NodeProto, pos: usize) -> Option<&'a TensorProto> {
        node.input
            .get(pos)
            .filter(|i| !i.is_empty())
            .and_then(|i| self.initializer(i))
    }

    /// Register input `pos` of `node` as the `role` weight, converting the
    /// initializer on first use.
    fn bind(
        &mut self,
        node: &NodeProto,
        pos: usize,
        role: &str,
        params: &mut BTreeMap<String, String>,
    ) -> Result<(), InferenceError> {
        let Some(tensor) = self.initializer_at(node, pos) else {
            return Ok(());
        };
        let key = tensor.name.clone();
        if !self.initializers.contains_key(&key) {
            let def = InitializerDef {
                dims: tensor_dims(tensor)?,
                dtype: WeightDType::F32,
                data: Some(tensor_values(tensor).map_err(InferenceError::Parse)?),
                offset: None,
            };
            self.initializers.insert(key.clone(), def);
        }
        params.insert(role.to_string(), key);
        Ok(())
    }
}

/// Gemm/MatMul `B` as a `[units, features]` weight scaled by `alpha`.
fn dense_weight(b: &TensorProto, trans_b: bool, alpha: f32) -> Result<InitializerDef, String> {
    let dims = match b.dims.as_slice() {
        [r, c] if *r > 0 && *c > 0 => [*r as usize, *c as usize],
        other => return Err(format!("B must be a 2-D matrix, has dims {:?}", other)),
    };
    let values = tensor_values(b)?;
    if values.len() != dims[0] * dims[1] {
        return Err(format!("B holds {} values for dims {:?}", values.len(), dims));
    }
    let (units, features, data) = if trans_b {
        (dims[0], dims[1], values.iter().map(|v| v * alpha).collect())
    } else {
        let (k, n) = (dims[0], dims[1]);
        let mut t = vec![0.0f32; values.len()];
        for row in 0..k {
            for col in 0..n {
                t[col * k + row] = values[row * n + col] * alpha;
            }
        }
        (n, k, t)
    };
    Ok(InitializerDef {
        dims: vec![units, features],
        dtype: WeightDType::F32,
        data: Some(data),
        offset: None,
    })
}

/// Gemm `C` as a `[units]` bias scaled by `beta`. A single value broadcasts.
fn dense_bias(c: &TensorProto, units: usize, beta: f32) -> Result<InitializerDef, String> {
    let values = tensor_values(c)?;
    let data: Vec<f32> = match values.as_slice() {
        [v] => vec![v * beta; units],
        v if v.len() == units => v.iter().map(|x| x * beta).collect(),
        v => return Err(format!("C holds {} values, expected {}", v.len(), units)),
    };
    Ok(InitializerDef {
        dims: vec![units],
        dtype: WeightDType::F32,
        data: Some(data),
        offset: None,
    })
}

fn attribute<'a>(node: &'a NodeProto, name: &str) -> Option<&'a AttributeProto> {
    node.attribute.iter().find(|a| a.name == name)
}

fn int(node: &NodeProto, name: &str) -> Option<i64> {
    attribute(node, name).map(|a| a.i)
}

fn float(node: &NodeProto, name: &str) -> Option<f32> {
    attribute(node, name).map(|a| a.f)
}

fn to_usize(value: i64, what: &str) -> Result<usize, String> {
    usize::try_from(value).map_err(|_| format!("{} must be non-negative, got {}", what, value))
}

fn pair(node: &NodeProto, name: &str) -> Result<Option<[usize; 2]>, String> {
    let Some(attr) = attribute(node, name) else {
        return Ok(None);
    };
    match attr.ints.as_slice() {
        [a, b] => Ok(Some([to_usize(*a, name)?, to_usize(*b, name)?])),
        other => Err(format!("{} must have 2 values, has {}", name, other.len())),
    }
}

/// ONNX orders 2-D pads as `[top, left, bottom, right]`, same as graph
/// documents. `auto_pad` other than `NOTSET` or `VALID` is rejected.
fn pads(node: &NodeProto) -> Result<Option<[usize; 4]>, String> {
    if let Some(auto) = attribute(node, "auto_pad") {
        match auto.s.as_slice() {
            b"" | b"NOTSET" => {}
            b"VALID" => return Ok(Some([0; 4])),
            other => {
                return Err(format!(
                    "auto_pad {} is not supported",
                    String::from_utf8_lossy(other)
                ))
            }
        }
    }
    let Some(attr) = attribute(node, "pads") else {
        return Ok(None);
    };
    match attr.ints.as_slice() {
        [t, l, b, r] => Ok(Some([
            to_usize(*t, "pads")?,
            to_usize(*l, "pads")?,
            to_usize(*b, "pads")?,
            to_usize(*r, "pads")?,
        ])),
        other => Err(format!("pads must have 4 values, has {}", other.len())),
    }
}

fn scalar(tensor: &TensorProto) -> Result<f32, String> {
    match tensor_values(tensor)?.as_slice() {
        [v] => Ok(*v),
        other => Err(format!("'{}' must be a scalar, has {} values", tensor.name, other.len())),
    }
}

fn tensor_dims(tensor: &TensorProto) -> Result<Vec<usize>, InferenceError> {
    if tensor.dims.is_empty() {
        return Ok(vec![1]);
    }
    tensor
        .dims
        .iter()
        .map(|d| {
            usize::try_from(*d).map_err(|_| {
                InferenceError::Parse(format!("ONNX tensor '{}' has dim {}", tensor.name, d))
            })
        })
        .collect()
}

fn tensor_values(tensor: &TensorProto) -> Result<Vec<f32>, String> {
    if tensor.data_location == DataLocation::External as i32 {
        return Err(format!("tensor '{}' uses external data", tensor.name));
    }
    let raw = tensor.raw_data.as_slice();
    let values = match DataType::try_from(tensor.data_type) {
        Ok(DataType::Float) if raw.is_empty() => tensor.float_data.clone(),
        Ok(DataType::Float) => raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Ok(DataType::Float16) if raw.is_empty() => tensor
            .int32_data
            .iter()
            .map(|bits| f16::from_bits(*bits as u16).to_f32())
            .collect(),
        Ok(DataType::Float16) => raw
            .chunks_exact(2)
            .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect(),
        Ok(DataType::Double) if raw.is_empty() => {
            tensor.double_data.iter().map(|v| *v as f32).collect()
        }
        Ok(DataType::Double) => raw
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                f64::from_le_bytes(b) as f32
            })
            .collect(),
        _ => {
            return Err(format!(
                "tensor '{}' has unsupported element type {}",
                tensor.name, tensor.data_type
            ))
        }
    };
    Ok(values)
}
