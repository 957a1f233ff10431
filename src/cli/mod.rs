// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for the `monoinfer-cli` developer tool.
//!
//! ## Usage
//!
//! ```bash
//! monoinfer-cli inspect model.json 1 3 224 224 1000 1 1
//! monoinfer-cli predict model.json 1 3 224 224 1000 1 1 --runs 10
//! monoinfer-cli config show
//! ```

pub mod config_cmd;
pub mod models_cmd;

pub use models_cmd::{parse_model_args, ModelArgs};

/// Value following `flag` in `args`, if present.
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// `args` without `flags` and the value following each of them, and without
/// the bare `switches`.
pub fn positional(args: &[String], flags: &[&str], switches: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip = false;
    for a in args {
        if skip {
            skip = false;
        } else if flags.contains(&a.as_str()) {
            skip = true;
        } else if !switches.contains(&a.as_str()) {
            out.push(a.clone());
        }
    }
    out
}
