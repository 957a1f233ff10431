// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! monoinfer-cli entry point.
//!
//! Developer tool around the same load and predict path the C boundary uses.
//!
//! ## CLI Subcommands
//!
//! - `monoinfer-cli inspect <model> <b> <c> <h> <w> <oc> <oh> <ow>` - Load and describe a model
//! - `monoinfer-cli predict <model> <b> <c> <h> <w> <oc> <oh> <ow>` - Time predictions
//! - `monoinfer-cli config show|defaults|validate` - Configuration

use std::process::ExitCode;

use monoinfer::cli::{config_cmd, flag_value, models_cmd, parse_model_args, positional};
use monoinfer::telemetry;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    telemetry::ensure_logging();

    match command {
        "inspect" => {
            let rest = positional(&args[2..], &[], &["--json"]);
            let json = args[2..].iter().any(|a| a == "--json");
            match parse_model_args(&rest) {
                Ok(model) => ExitCode::from(models_cmd::run_inspect(&model, json) as u8),
                Err(e) => usage_error("inspect", &e),
            }
        }
        "predict" => {
            let rest = positional(&args[2..], &["--runs", "--seed"], &[]);
            let runs = match flag_value(&args[2..], "--runs").map(str::parse::<usize>) {
                None => 1,
                Some(Ok(n)) => n,
                Some(Err(_)) => return usage_error("predict", "--runs expects a number"),
            };
            let seed = match flag_value(&args[2..], "--seed").map(str::parse::<u64>) {
                None => 0,
                Some(Ok(n)) => n,
                Some(Err(_)) => return usage_error("predict", "--seed expects a number"),
            };
            match parse_model_args(&rest) {
                Ok(model) => ExitCode::from(models_cmd::run_predict(&model, runs, seed) as u8),
                Err(e) => usage_error("predict", &e),
            }
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    let json = args.get(3).map(|s| s.as_str()) == Some("--json");
                    ExitCode::from(config_cmd::run_show(json) as u8)
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate() as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("monoinfer {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn usage_error(command: &str, message: &str) -> ExitCode {
    eprintln!("Error: {}", message);
    print_command_help(command);
    ExitCode::from(2u8)
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "monoinfer-cli v{}

USAGE:
    monoinfer-cli <COMMAND> [ARGS]

COMMANDS:
    inspect      Load a model and print its summary and node table
    predict      Run predictions on seeded random input and print timings
    config       Show or validate configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

EXAMPLES:
    monoinfer-cli inspect model.json 1 3 224 224 1000 1 1
    monoinfer-cli predict model.bin 1 3 224 224 1000 1 1 --runs 20
    monoinfer-cli config show --json

ENVIRONMENT:
    MONOINFER_CONFIG      TOML config file
    MONOINFER_LOG         Log filter (default: warn)
    MONOINFER_LOG_FORMAT  json or pretty

EXIT CODES:
    0  Success
    1  Failure
    2  Usage error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "inspect" => {
            eprintln!(
                "monoinfer-cli inspect - Describe a model

USAGE:
    monoinfer-cli inspect <MODEL> <B> <C> <H> <W> <OC> <OH> <OW> [--json]

DESCRIPTION:
    Loads the model with the declared input shape (B, C, H, W) and output
    shape (B, OC, OH, OW), exactly as load_model does, then prints the
    fingerprint, memory plan and the nodes in execution order.
"
            );
        }
        "predict" => {
            eprintln!(
                "monoinfer-cli predict - Time predictions

USAGE:
    monoinfer-cli predict <MODEL> <B> <C> <H> <W> <OC> <OH> <OW> [OPTIONS]

OPTIONS:
    --runs <N>   Number of predictions (default: 1)
    --seed <N>   Seed for the random input (default: 0)

DESCRIPTION:
    Loads the model, feeds uniform random input in [-1, 1) and prints
    mean preprocess, inference and postprocess times plus the top-5
    output values of the last run.
"
            );
        }
        "config" => {
            eprintln!(
                "monoinfer-cli config - Configuration

USAGE:
    monoinfer-cli config show [--json]
    monoinfer-cli config defaults
    monoinfer-cli config validate

DESCRIPTION:
    show      Effective values after the config file and MONOINFER_* overrides
    defaults  Built-in defaults
    validate  Exit 1 and print warnings if anything looks wrong
"
            );
        }
        _ => {
            eprintln!("No detailed help for '{}'.", command);
            print_usage();
        }
    }
}
