// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Regenerates `include/monoinfer.h` when built with `--features ffi`.

fn main() {
    println!("cargo:rerun-if-changed=src/ffi");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    #[cfg(feature = "ffi")]
    generate_header();
}

#[cfg(feature = "ffi")]
fn generate_header() {
    let crate_dir = match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => std::path::PathBuf::from(dir),
        Err(_) => return,
    };
    let config = cbindgen::Config::from_file(crate_dir.join("cbindgen.toml")).unwrap_or_default();

    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(crate_dir.join("include").join("monoinfer.h"));
        }
        // Keep the checked-in header rather than failing the build.
        Err(e) => println!("cargo:warning=cbindgen failed, header not regenerated: {}", e),
    }
}
