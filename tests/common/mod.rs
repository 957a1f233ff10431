// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared model fixtures for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use serde_json::{json, Value};

use monoinfer::models::format::GraphDocument;

/// Deterministic pseudo-weights in roughly [-0.5, 0.5].
pub fn ramp(len: usize, seed: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (((i * 31 + seed * 7) % 101) as f32 / 101.0) - 0.5)
        .collect()
}

/// Global average pool followed by a `channels -> classes` dense layer.
pub fn classifier(channels: usize, classes: usize) -> Value {
    json!({
        "format": "monoinfer-graph",
        "version": 1,
        "name": "classifier",
        "initializers": {
            "fc_w": {"dims": [classes, channels], "data": ramp(classes * channels, 1)},
            "fc_b": {"dims": [classes], "data": ramp(classes, 2)}
        },
        "nodes": [
            {"name": "gap", "op": "GlobalAveragePool", "inputs": ["input"], "output": "pooled"},
            {"name": "fc", "op": "Gemm", "inputs": ["pooled"], "output": "output",
             "params": {"weight": "fc_w", "bias": "fc_b"}}
        ]
    })
}

/// A small conv net with a residual add and a channel concat.
///
/// Input `[n, 3, h, w]`, output `[n, 8, h/2, w/2]`.
pub fn conv_net() -> Value {
    json!({
        "format": "monoinfer-graph",
        "version": 1,
        "name": "conv-net",
        "initializers": {
            "c1_w": {"dims": [4, 3, 3, 3], "data": ramp(108, 3)},
            "c1_b": {"dims": [4], "data": ramp(4, 4)},
            "c2_w": {"dims": [4, 4, 3, 3], "data": ramp(144, 5)},
            "bn_scale": {"dims": [4], "data": [1.0, 0.5, 2.0, 1.5]},
            "bn_bias": {"dims": [4], "data": [0.0, 0.1, -0.1, 0.2]},
            "bn_mean": {"dims": [4], "data": [0.0, 0.05, 0.1, -0.05]},
            "bn_var": {"dims": [4], "data": [1.0, 0.9, 1.1, 1.2]}
        },
        "nodes": [
            {"name": "conv1", "op": "Conv", "inputs": ["input"], "output": "a",
             "params": {"weight": "c1_w", "bias": "c1_b"}, "attrs": {"pads": [1, 1, 1, 1]}},
            {"name": "relu1", "op": "Relu", "inputs": ["a"], "output": "b"},
            {"name": "conv2", "op": "Conv", "inputs": ["b"], "output": "c",
             "params": {"weight": "c2_w"}, "attrs": {"pads": [1, 1, 1, 1]}},
            {"name": "bn", "op": "BatchNormalization", "inputs": ["c"], "output": "d",
             "params": {"scale": "bn_scale", "bias": "bn_bias", "mean": "bn_mean", "var": "bn_var"}},
            {"name": "residual", "op": "Add", "inputs": ["b", "d"], "output": "e"},
            {"name": "cat", "op": "Concat", "inputs": ["b", "e"], "output": "f"},
            {"name": "pool", "op": "MaxPool", "inputs": ["f"], "output": "output",
             "attrs": {"kernel": [2, 2]}}
        ]
    })
}

/// Write `doc` as a JSON graph document.
pub fn write_json(dir: &tempfile::TempDir, name: &str, doc: &Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_vec(doc).unwrap()).unwrap();
    path
}

/// Write `doc` as a binary container, moving every inline initializer into
/// the payload with `dtype` ("f32" or "f16").
pub fn write_container(dir: &tempfile::TempDir, name: &str, doc: &Value, dtype: &str) -> PathBuf {
    let mut doc = doc.clone();
    let mut payload = Vec::new();
    if let Some(inits) = doc["initializers"].as_object_mut() {
        for init in inits.values_mut() {
            let values: Vec<f32> = init["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_f64().unwrap() as f32)
                .collect();
            let offset = payload.len();
            for v in values {
                match dtype {
                    "f16" => payload.extend_from_slice(&half::f16::from_f32(v).to_le_bytes()),
                    _ => payload.extend_from_slice(&v.to_le_bytes()),
                }
            }
            let obj = init.as_object_mut().unwrap();
            obj.remove("data");
            obj.insert("offset".into(), json!(offset));
            obj.insert("dtype".into(), json!(dtype));
        }
    }
    let document: GraphDocument = serde_json::from_value(doc).unwrap();
    let bytes = document.to_container(&payload).unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
