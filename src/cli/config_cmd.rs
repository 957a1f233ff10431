// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration directly from the environment and the
//! optional config file, exactly as the boundary would on first use.

use crate::config::{self, EffectiveConfig, EnvConfig};

/// Print effective config as key-value pairs (or JSON) to stdout.
pub fn run_show(json: bool) -> i32 {
    let cfg = config::load().effective_config();
    if json {
        match serde_json::to_string_pretty(&cfg) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error encoding config: {}", e);
                return 1;
            }
        }
    } else {
        print_config(&cfg);
    }
    0
}

/// Print default config values (no file, no env overrides) to stdout.
pub fn run_defaults() {
    print_config(&EnvConfig::default().effective_config());
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found.
pub fn run_validate() -> i32 {
    let warnings = collect_warnings(&config::load());
    if warnings.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        for w in &warnings {
            eprintln!("WARNING: {}", w);
        }
        1
    }
}

fn collect_warnings(env: &EnvConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Some(e) = &env.config_file_error {
        warnings.push(format!("config file ignored: {}", e));
    }
    if let Err(e) = env.engine.validate() {
        warnings.push(e.to_string());
    }
    if env.engine.threads > 1 && !cfg!(feature = "parallel") {
        warnings.push(format!(
            "{} threads requested but built without the 'parallel' feature",
            env.engine.threads
        ));
    }
    if env.engine.pool_buffers == 0 {
        warnings.push("MONOINFER_POOL_BUFFERS is 0; every activation is reallocated".into());
    }
    warnings
}

fn print_config(cfg: &EffectiveConfig) {
    println!("MONOINFER_NUM_THREADS={} (effective {})", cfg.num_threads, cfg.effective_threads);
    println!("MONOINFER_INPUT_LAYOUT={}", cfg.input_layout);
    println!("MONOINFER_REJECT_NON_FINITE={}", cfg.reject_non_finite);
    println!("MONOINFER_MAX_ACTIVATION_BYTES={}", cfg.max_activation_bytes);
    println!("MONOINFER_MAX_MODEL_BYTES={}", cfg.max_model_bytes);
    println!("MONOINFER_POOL_BUFFERS={}", cfg.pool_buffers);
    println!("MONOINFER_LOG={}", cfg.log);
    println!(
        "MONOINFER_LOG_FORMAT={}",
        match cfg.log_format {
            crate::telemetry::LogFormat::Json => "json",
            crate::telemetry::LogFormat::Pretty => "pretty",
        }
    );
    match (&cfg.config_file, &cfg.config_file_error) {
        (Some(path), _) => println!("MONOINFER_CONFIG={}", path.display()),
        (None, Some(e)) => println!("MONOINFER_CONFIG=<ignored: {}>", e),
        (None, None) => println!("MONOINFER_CONFIG=<unset>"),
    }
    println!("parallel={}", cfg.parallel);
}
