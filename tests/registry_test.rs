// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Session slot behavior under concurrent predictions and reloads.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use monoinfer::engine::{EngineConfig, InferenceError};
use monoinfer::models::{LoadRequest, ModelLoader, SessionRegistry};
use monoinfer::tensor::Shape;

#[test]
fn test_predictions_racing_reloads_see_whole_models() {
    let dir = tempfile::tempdir().unwrap();
    let narrow = common::write_json(&dir, "narrow.json", &common::classifier(2, 4));
    let wide = common::write_json(&dir, "wide.json", &common::classifier(2, 9));
    let input_shape = Shape::new(1, 2, 4, 4);
    let request = |path: &std::path::PathBuf, classes| LoadRequest {
        path: path.clone(),
        input_shape,
        output_shape: Shape::new(1, classes, 1, 1),
    };
    let narrow_req = request(&narrow, 4);
    let wide_req = request(&wide, 9);

    let registry = Arc::new(SessionRegistry::new());
    let loader = ModelLoader::default();
    let config = EngineConfig::default();
    let input = common::ramp(input_shape.num_elements(), 3);

    registry.load(&loader, &wide_req, &config).unwrap();
    let expected_wide = registry.predict(&input).unwrap().output.into_vec();
    registry.load(&loader, &narrow_req, &config).unwrap();
    let expected_narrow = registry.predict(&input).unwrap().output.into_vec();

    const MIN_READS: usize = 10;
    let stop = Arc::new(AtomicBool::new(false));
    let start = Arc::new(Barrier::new(5));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let stop = Arc::clone(&stop);
            let start = Arc::clone(&start);
            let input = input.clone();
            let (narrow, wide) = (expected_narrow.clone(), expected_wide.clone());
            thread::spawn(move || {
                start.wait();
                let mut seen = 0usize;
                while seen < MIN_READS || !stop.load(Ordering::Relaxed) {
                    let out = registry.predict(&input).unwrap().output.into_vec();
                    assert!(out == narrow || out == wide, "torn output {:?}", out);
                    seen += 1;
                }
                seen
            })
        })
        .collect();

    start.wait();
    for i in 0..50 {
        let req = if i % 2 == 0 { &wide_req } else { &narrow_req };
        registry.load(&loader, req, &config).unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        assert!(reader.join().unwrap() >= MIN_READS);
    }
}

#[test]
fn test_unload_during_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_json(&dir, "model.json", &common::classifier(2, 4));
    let registry = Arc::new(SessionRegistry::new());
    registry
        .load(
            &ModelLoader::default(),
            &LoadRequest {
                path,
                input_shape: Shape::new(1, 2, 2, 2),
                output_shape: Shape::new(1, 4, 1, 1),
            },
            &EngineConfig::default(),
        )
        .unwrap();

    let started = Arc::new(Barrier::new(2));
    let worker = {
        let registry = Arc::clone(&registry);
        let started = Arc::clone(&started);
        thread::spawn(move || {
            let mut outcomes = vec![registry.predict(&[0.1; 8]).map(|p| p.output.len())];
            started.wait();
            for _ in 0..200 {
                outcomes.push(registry.predict(&[0.1; 8]).map(|p| p.output.len()));
            }
            outcomes
        })
    };
    started.wait();
    assert!(registry.unload());
    let outcomes = worker.join().unwrap();

    // Successes only ever precede the unload; nothing reloads afterwards.
    let first_miss = outcomes
        .iter()
        .position(|o| o.is_err())
        .unwrap_or(outcomes.len());
    assert!(first_miss >= 1);
    assert!(outcomes[..first_miss].iter().all(|o| matches!(o, Ok(4))));
    assert!(outcomes[first_miss..]
        .iter()
        .all(|o| matches!(o, Err(InferenceError::NotLoaded))));
    assert!(matches!(registry.predict(&[0.1; 8]), Err(InferenceError::NotLoaded)));
    assert!(!registry.is_loaded());
}
