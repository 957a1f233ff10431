// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model loading and validation over files on disk.

mod common;

use serde_json::json;

use monoinfer::engine::{ErrorKind, InferenceError};
use monoinfer::models::{LoadRequest, LoaderConfig, ModelLoader};
use monoinfer::tensor::Shape;

fn request(path: std::path::PathBuf, input: Shape, output: Shape) -> LoadRequest {
    LoadRequest {
        path,
        input_shape: input,
        output_shape: output,
    }
}

#[test]
fn test_descriptor_summary() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_json(&dir, "net.json", &common::conv_net());
    let model = ModelLoader::default()
        .load(&request(path, Shape::new(1, 3, 8, 8), Shape::new(1, 8, 4, 4)))
        .unwrap();

    assert_eq!(model.name(), "conv-net");
    assert_eq!(model.nodes().len(), 7);
    assert_eq!(model.metadata().fingerprint.len(), 64);
    assert!(model.weight_bytes() > 0);
    assert!(model.peak_activation_bytes() >= Shape::new(1, 8, 8, 8).size_bytes());
    let order: Vec<&str> = model.nodes().iter().map(|n| n.name.as_str()).collect();
    assert_eq!(order, ["conv1", "relu1", "conv2", "bn", "residual", "cat", "pool"]);
}

#[test]
fn test_total_cost_sums_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_json(&dir, "cls.json", &common::classifier(4, 10));
    let loader = ModelLoader::default();
    let single = loader
        .load(&request(path.clone(), Shape::new(1, 4, 6, 6), Shape::new(1, 10, 1, 1)))
        .unwrap();
    // 4*6*6 reads for the pool, 10 outputs of 4 multiply-adds for the dense layer.
    assert_eq!(single.total_cost(), 144 + 40);

    let batched = loader
        .load(&request(path, Shape::new(3, 4, 6, 6), Shape::new(3, 10, 1, 1)))
        .unwrap();
    assert_eq!(batched.total_cost(), 3 * single.total_cost());
}

#[test]
fn test_same_bytes_same_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let a = common::write_json(&dir, "a.json", &common::classifier(2, 3));
    let b = common::write_json(&dir, "b.json", &common::classifier(2, 3));
    let c = common::write_json(&dir, "c.json", &common::classifier(2, 4));
    let loader = ModelLoader::default();
    let load = |path, classes| {
        loader
            .load(&request(path, Shape::new(1, 2, 1, 1), Shape::new(1, classes, 1, 1)))
            .unwrap()
            .metadata()
            .fingerprint
            .clone()
    };
    assert_eq!(load(a, 3), load(b, 3));
    assert_ne!(load(common::write_json(&dir, "d.json", &common::classifier(2, 3)), 3), load(c, 4));
}

#[test]
fn test_nodes_out_of_order_are_scheduled() {
    let dir = tempfile::tempdir().unwrap();
    let doc = json!({
        "format": "monoinfer-graph", "version": 1,
        "nodes": [
            {"name": "last", "op": "Sigmoid", "inputs": ["mid"], "output": "output"},
            {"name": "first", "op": "Relu", "inputs": ["input"], "output": "mid"},
            {"name": "unused", "op": "Tanh", "inputs": ["input"], "output": "dangling"}
        ]
    });
    let path = common::write_json(&dir, "shuffled.json", &doc);
    let model = ModelLoader::default()
        .load(&request(path, Shape::new(1, 1, 2, 2), Shape::new(1, 1, 2, 2)))
        .unwrap();
    let order: Vec<&str> = model.nodes().iter().map(|n| n.name.as_str()).collect();
    assert_eq!(order, ["first", "last"]);
}

#[test]
fn test_rejections() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ModelLoader::default();
    let shape = Shape::new(1, 1, 2, 2);

    let cycle = common::write_json(&dir, "cycle.json", &json!({
        "format": "monoinfer-graph", "version": 1,
        "nodes": [
            {"op": "Relu", "inputs": ["b"], "output": "a"},
            {"op": "Relu", "inputs": ["a"], "output": "b"},
            {"op": "Add", "inputs": ["input", "b"], "output": "output"}
        ]
    }));
    let undefined = common::write_json(&dir, "undefined.json", &json!({
        "format": "monoinfer-graph", "version": 1,
        "nodes": [{"op": "Add", "inputs": ["input", "ghost"], "output": "output"}]
    }));
    let wrong_tag = common::write_json(&dir, "tag.json", &json!({
        "format": "onnx", "version": 1,
        "nodes": [{"op": "Relu", "inputs": ["input"], "output": "output"}]
    }));
    let future = common::write_json(&dir, "future.json", &json!({
        "format": "monoinfer-graph", "version": 99,
        "nodes": [{"op": "Relu", "inputs": ["input"], "output": "output"}]
    }));
    let empty = dir.path().join("empty.json");
    std::fs::write(&empty, b"").unwrap();

    for path in [cycle, undefined, wrong_tag, future, empty] {
        let err = loader.load(&request(path.clone(), shape, shape)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError, "{}: {}", path.display(), err);
    }

    let dir_path = dir.path().to_path_buf();
    assert!(matches!(
        loader.load(&request(dir_path, shape, shape)),
        Err(InferenceError::NotFound(_))
    ));
}

#[test]
fn test_size_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_json(&dir, "model.json", &common::classifier(2, 3));
    let loader = ModelLoader::new(LoaderConfig { max_model_bytes: 16 });
    let err = loader
        .load(&request(path, Shape::new(1, 2, 1, 1), Shape::new(1, 3, 1, 1)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
}

#[test]
fn test_truncated_container() {
    let dir = tempfile::tempdir().unwrap();
    let full = common::write_container(&dir, "full.bin", &common::classifier(2, 3), "f32");
    let bytes = std::fs::read(&full).unwrap();
    let cut = dir.path().join("cut.bin");
    std::fs::write(&cut, &bytes[..bytes.len() - 8]).unwrap();
    let err = ModelLoader::default()
        .load(&request(cut, Shape::new(1, 2, 1, 1), Shape::new(1, 3, 1, 1)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
}

#[test]
fn test_oversized_window_attributes_are_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let conv = |attrs: serde_json::Value| {
        json!({
            "format": "monoinfer-graph", "version": 1,
            "initializers": {"w": {"dims": [1, 1, 3, 3], "data": vec![0.1f32; 9]}},
            "nodes": [{"op": "Conv", "inputs": ["input"], "output": "output",
                       "params": {"weight": "w"}, "attrs": attrs}]
        })
    };
    let huge_pads = common::write_json(
        &dir,
        "pads.json",
        &conv(json!({"pads": [u64::MAX, 0, 1, 0]})),
    );
    let huge_dilation = common::write_json(
        &dir,
        "dilation.json",
        &conv(json!({"dilation": [u64::MAX, 1]})),
    );
    let huge_pool = common::write_json(&dir, "pool.json", &json!({
        "format": "monoinfer-graph", "version": 1,
        "nodes": [{"op": "MaxPool", "inputs": ["input"], "output": "output",
                   "attrs": {"kernel": [u64::MAX, 2]}}]
    }));

    let shape = Shape::new(1, 1, 4, 4);
    for path in [huge_pads, huge_dilation, huge_pool] {
        let err = ModelLoader::default()
            .load(&request(path.clone(), shape, shape))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError, "{}: {}", path.display(), err);
    }
}
