// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Loading ONNX `ModelProto` files.

#![cfg(feature = "onnx")]

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use candle_onnx::onnx::{
    tensor_proto::DataType, tensor_shape_proto::dimension::Value as Dim, tensor_shape_proto::Dimension,
    type_proto, AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto,
    TensorShapeProto, TypeProto, ValueInfoProto,
};
use prost::Message;
use serde_json::json;

use monoinfer::engine::{EngineConfig, ErrorKind, ExecutionEngine};
use monoinfer::models::{LoadRequest, ModelLoader};
use monoinfer::tensor::Shape;

fn tensor(name: &str, dims: &[i64], values: &[f32]) -> TensorProto {
    TensorProto {
        name: name.into(),
        dims: dims.to_vec(),
        data_type: DataType::Float as i32,
        raw_data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        ..Default::default()
    }
}

fn ints(name: &str, values: &[i64]) -> AttributeProto {
    AttributeProto {
        name: name.into(),
        ints: values.to_vec(),
        ..Default::default()
    }
}

fn int(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: name.into(),
        i: value,
        ..Default::default()
    }
}

fn node(op: &str, inputs: &[&str], output: &str, attribute: Vec<AttributeProto>) -> NodeProto {
    NodeProto {
        op_type: op.into(),
        input: inputs.iter().map(|s| s.to_string()).collect(),
        output: vec![output.into()],
        attribute,
        ..Default::default()
    }
}

fn value(name: &str, dims: &[Option<i64>]) -> ValueInfoProto {
    let dim = dims
        .iter()
        .map(|d| Dimension {
            value: Some(match d {
                Some(v) => Dim::DimValue(*v),
                None => Dim::DimParam("batch".into()),
            }),
            ..Default::default()
        })
        .collect();
    ValueInfoProto {
        name: name.into(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: DataType::Float as i32,
                shape: Some(TensorShapeProto { dim }),
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn model(graph: GraphProto) -> ModelProto {
    ModelProto {
        ir_version: 8,
        producer_name: "monoinfer-tests".into(),
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: 13,
        }],
        graph: Some(graph),
        ..Default::default()
    }
}

fn write(dir: &tempfile::TempDir, name: &str, model: &ModelProto) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, model.encode_to_vec()).unwrap();
    path
}

fn engine(path: PathBuf, input: Shape, output: Shape) -> ExecutionEngine {
    let model = ModelLoader::default()
        .load(&LoadRequest {
            path,
            input_shape: input,
            output_shape: output,
        })
        .unwrap();
    ExecutionEngine::new(Arc::new(model), &EngineConfig::default()).unwrap()
}

const CONV_W: [f32; 18] = [
    0.1, -0.2, 0.3, 0.0, 0.5, -0.1, 0.2, 0.2, -0.3, //
    -0.4, 0.1, 0.0, 0.3, -0.2, 0.1, 0.0, 0.4, 0.2,
];
const CONV_B: [f32; 2] = [0.05, -0.05];
/// Gemm `B` as ONNX stores it without `transB`: `[features, units]`.
const FC_B: [f32; 6] = [0.3, -0.1, 0.2, -0.4, 0.5, 0.1];
const FC_C: [f32; 3] = [0.0, 0.1, -0.1];

/// Conv 3x3 pad 1 -> Relu -> GlobalAveragePool -> Flatten -> Gemm -> Softmax
/// with named tensors, the way exported detectors and classifiers look.
fn classifier_graph(input_dims: &[Option<i64>]) -> GraphProto {
    GraphProto {
        name: "tiny-onnx".into(),
        node: vec![
            node(
                "Conv",
                &["images", "conv.w", "conv.b"],
                "c",
                vec![ints("kernel_shape", &[3, 3]), ints("pads", &[1, 1, 1, 1])],
            ),
            node("Relu", &["c"], "r", vec![]),
            node("GlobalAveragePool", &["r"], "g", vec![]),
            node("Flatten", &["g"], "f", vec![int("axis", 1)]),
            node("Gemm", &["f", "fc.b", "fc.c"], "logits", vec![]),
            node("Softmax", &["logits"], "scores", vec![]),
        ],
        initializer: vec![
            tensor("conv.w", &[2, 1, 3, 3], &CONV_W),
            tensor("conv.b", &[2], &CONV_B),
            tensor("fc.b", &[2, 3], &FC_B),
            tensor("fc.c", &[3], &FC_C),
        ],
        input: vec![value("images", input_dims)],
        output: vec![value("scores", &[None, Some(3)])],
        ..Default::default()
    }
}

/// The same network as a JSON graph, with the dense weight as `[units, features]`.
fn classifier_json() -> serde_json::Value {
    let fc_w: Vec<f32> = (0..3)
        .flat_map(|u| (0..2).map(move |f| FC_B[f * 3 + u]))
        .collect();
    json!({
        "format": "monoinfer-graph",
        "version": 1,
        "initializers": {
            "conv_w": {"dims": [2, 1, 3, 3], "data": CONV_W},
            "conv_b": {"dims": [2], "data": CONV_B},
            "fc_w": {"dims": [3, 2], "data": fc_w},
            "fc_b": {"dims": [3], "data": FC_C}
        },
        "nodes": [
            {"op": "Conv", "inputs": ["input"], "output": "c",
             "params": {"weight": "conv_w", "bias": "conv_b"}, "attrs": {"pads": [1, 1, 1, 1]}},
            {"op": "Relu", "inputs": ["c"], "output": "r"},
            {"op": "GlobalAveragePool", "inputs": ["r"], "output": "g"},
            {"op": "Flatten", "inputs": ["g"], "output": "f"},
            {"op": "Gemm", "inputs": ["f"], "output": "logits", "params": {"weight": "fc_w", "bias": "fc_b"}},
            {"op": "Softmax", "inputs": ["logits"], "output": "output"}
        ]
    })
}

#[test]
fn test_onnx_matches_json_graph() {
    let dir = tempfile::tempdir().unwrap();
    let onnx = write(&dir, "tiny.onnx", &model(classifier_graph(&[None, Some(1), Some(4), Some(4)])));
    let reference = common::write_json(&dir, "tiny.json", &classifier_json());
    let (input_shape, output_shape) = (Shape::new(2, 1, 4, 4), Shape::new(2, 3, 1, 1));
    let input = common::ramp(input_shape.num_elements(), 3);

    let onnx_engine = engine(onnx, input_shape, output_shape);
    assert_eq!(onnx_engine.model().name(), "tiny-onnx");
    let names: Vec<&str> = onnx_engine.model().nodes().iter().map(|n| n.op.name()).collect();
    assert_eq!(names, ["Conv", "Relu", "GlobalAveragePool", "Flatten", "Gemm", "Softmax"]);

    let got = onnx_engine.predict(&input).unwrap();
    let want = engine(reference, input_shape, output_shape).predict(&input).unwrap();
    assert_eq!(got.output.data(), want.output.data());
    let sum: f32 = got.output.data()[..3].iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
}

#[test]
fn test_onnx_static_input_shape_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let fixed = classifier_graph(&[Some(1), Some(1), Some(4), Some(4)]);
    let path = write(&dir, "fixed.onnx", &model(fixed));
    let loader = ModelLoader::default();

    let ok = loader.load(&LoadRequest {
        path: path.clone(),
        input_shape: Shape::new(1, 1, 4, 4),
        output_shape: Shape::new(1, 3, 1, 1),
    });
    assert!(ok.is_ok());

    let err = loader
        .load(&LoadRequest {
            path,
            input_shape: Shape::new(1, 1, 8, 8),
            output_shape: Shape::new(1, 3, 1, 1),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
}

#[test]
fn test_onnx_rejections() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ModelLoader::default();
    let shape = Shape::new(1, 1, 2, 2);
    let load = |name: &str, graph: GraphProto| {
        let path = write(&dir, name, &model(graph));
        loader
            .load(&LoadRequest {
                path,
                input_shape: shape,
                output_shape: shape,
            })
            .unwrap_err()
            .kind()
    };
    let single = |n: NodeProto| GraphProto {
        node: vec![n],
        input: vec![value("x", &[None, Some(1), Some(2), Some(2)])],
        output: vec![value("y", &[None, Some(1), Some(2), Some(2)])],
        ..Default::default()
    };

    assert_eq!(
        load("lstm.onnx", single(node("LSTM", &["x"], "y", vec![]))),
        ErrorKind::UnsupportedOperator
    );
    let same_upper = AttributeProto {
        name: "auto_pad".into(),
        s: b"SAME_UPPER".to_vec(),
        ..Default::default()
    };
    assert_eq!(
        load(
            "same.onnx",
            single(node("MaxPool", &["x"], "y", vec![ints("kernel_shape", &[2, 2]), same_upper]))
        ),
        ErrorKind::ParseError
    );
    assert_eq!(
        load(
            "huge-pad.onnx",
            single(node(
                "MaxPool",
                &["x"],
                "y",
                vec![ints("kernel_shape", &[2, 2]), ints("pads", &[1 << 40, 0, 0, 0])]
            ))
        ),
        ErrorKind::ParseError
    );
    let mut two_inputs = single(node("Add", &["x", "z"], "y", vec![]));
    two_inputs.input.push(value("z", &[None, Some(1), Some(2), Some(2)]));
    assert_eq!(load("two-inputs.onnx", two_inputs), ErrorKind::ParseError);

    let truncated = dir.path().join("truncated.onnx");
    let mut bytes = model(single(node("Relu", &["x"], "y", vec![]))).encode_to_vec();
    bytes.truncate(bytes.len() / 2);
    std::fs::write(&truncated, bytes).unwrap();
    let err = loader
        .load(&LoadRequest {
            path: truncated,
            input_shape: shape,
            output_shape: shape,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
}
