// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model CLI subcommands: inspect, predict.
//!
//! Both mirror `load_model`'s arguments and run against a private registry,
//! so they behave exactly like the boundary without touching global state.

use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config;
use crate::engine::{InferenceError, TimingRecord};
use crate::ffi::StatusCode;
use crate::models::{LoadRequest, ModelLoader, SessionInfo, SessionRegistry};
use crate::tensor::Shape;

/// Parsed `<model> <b> <c> <h> <w> <oc> <oh> <ow>` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArgs {
    pub path: PathBuf,
    pub input: Shape,
    pub output: Shape,
}

/// Parse the positional model arguments. Output batch = input batch.
pub fn parse_model_args(args: &[String]) -> Result<ModelArgs, String> {
    if args.len() != 8 {
        return Err(format!(
            "expected <model> <b> <c> <h> <w> <oc> <oh> <ow>, got {} argument(s)",
            args.len()
        ));
    }
    let mut dims = [0usize; 7];
    for (slot, raw) in dims.iter_mut().zip(&args[1..]) {
        *slot = raw
            .parse::<usize>()
            .map_err(|_| format!("'{}' is not a dimension", raw))?;
    }
    let [b, c, h, w, oc, oh, ow] = dims;
    let input = Shape::validated(b, c, h, w).map_err(|e| e.to_string())?;
    let output = Shape::validated(b, oc, oh, ow).map_err(|e| e.to_string())?;
    Ok(ModelArgs {
        path: PathBuf::from(&args[0]),
        input,
        output,
    })
}

fn load(registry: &SessionRegistry, args: &ModelArgs) -> Result<SessionInfo, InferenceError> {
    let env = config::global();
    let loader = ModelLoader::new(env.loader.clone());
    let request = LoadRequest {
        path: args.path.clone(),
        input_shape: args.input,
        output_shape: args.output,
    };
    registry.load(&loader, &request, &env.engine)?;
    registry.info().ok_or(InferenceError::NotLoaded)
}

/// Run `inspect`: load the model and print its descriptor summary.
///
/// Returns exit code: 0 on success, 1 on load failure.
pub fn run_inspect(args: &ModelArgs, json: bool) -> i32 {
    let registry = SessionRegistry::new();
    let info = match load(&registry, args) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("Error loading model: {} (status {})", e, StatusCode::from(&e).code());
            return 1;
        }
    };
    if json {
        match serde_json::to_string_pretty(&info) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error encoding model info: {}", e);
                return 1;
            }
        }
        return 0;
    }

    print_info(&info);
    if let Ok(session) = registry.current() {
        println!();
        println!("{:<4} {:<24} {:<20} {:>20}", "#", "NODE", "OP", "OUTPUT");
        println!("{}", "-".repeat(71));
        for (i, node) in session.model().nodes().iter().enumerate() {
            println!(
                "{:<4} {:<24} {:<20} {:>20}",
                i,
                truncate(&node.name, 23),
                node.op.name(),
                node.output_shape.to_string()
            );
        }
    }
    0
}

/// Run `predict`: load the model, feed `runs` seeded random inputs and
/// print the mean stage timings and the last output summary.
pub fn run_predict(args: &ModelArgs, runs: usize, seed: u64) -> i32 {
    let registry = SessionRegistry::new();
    if let Err(e) = load(&registry, args) {
        eprintln!("Error loading model: {} (status {})", e, StatusCode::from(&e).code());
        return 1;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let input: Vec<f32> = (0..args.input.num_elements())
        .map(|_| rng.gen_range(-1.0f32..1.0))
        .collect();

    let runs = runs.max(1);
    let mut total = TimingRecord::default();
    let mut last = None;
    for _ in 0..runs {
        match registry.predict(&input) {
            Ok(prediction) => {
                total.preprocess += prediction.timing.preprocess;
                total.inference += prediction.timing.inference;
                total.postprocess += prediction.timing.postprocess;
                last = Some(prediction.output);
            }
            Err(e) => {
                eprintln!("Prediction failed: {} (status {})", e, StatusCode::from(&e).code());
                return 1;
            }
        }
    }

    let mean = |d: Duration| d.as_secs_f64() * 1000.0 / runs as f64;
    println!("runs:            {}", runs);
    println!("preprocess_ms:   {:.3}", mean(total.preprocess));
    println!("inference_ms:    {:.3}", mean(total.inference));
    println!("postprocess_ms:  {:.3}", mean(total.postprocess));
    if let Some(output) = last {
        print_output_summary(output.data());
    }
    0
}

fn print_info(info: &SessionInfo) {
    println!("name:            {}", info.name);
    println!("path:            {}", info.path.display());
    println!("sha256:          {}", info.fingerprint);
    println!("size_bytes:      {}", info.size_bytes);
    println!("input:           {}", info.input_shape);
    println!("output:          {}", info.output_shape);
    println!("nodes:           {}", info.nodes);
    println!("weight_bytes:    {}", info.weight_bytes);
    println!("peak_act_bytes:  {}", info.peak_activation_bytes);
    println!("cost_macs:       {}", info.cost);
    println!("backend:         {}", info.backend);
}

fn print_output_summary(values: &[f32]) {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    println!("output_len:      {}", values.len());
    println!("output_min:      {}", min);
    println!("output_max:      {}", max);
    let top: Vec<String> = top_k(values, 5)
        .into_iter()
        .map(|(i, v)| format!("{}:{:.4}", i, v))
        .collect();
    println!("top5:            {}", top.join(" "));
}

/// Indices and values of the `k` largest outputs, largest first.
pub fn top_k(values: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    indexed.truncate(k);
    indexed
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
