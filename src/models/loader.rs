// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model loading and validation.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use memmap2::Mmap;
use sha2::{Digest, Sha256};

use super::descriptor::{ModelDescriptor, ModelMetadata};
use super::format;
use crate::engine::InferenceError;
use crate::tensor::Shape;

/// Largest model file accepted by default (1 GiB).
pub const DEFAULT_MAX_MODEL_BYTES: u64 = 1 << 30;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Files larger than this are rejected with `Parse` before mapping.
    pub max_model_bytes: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_model_bytes: DEFAULT_MAX_MODEL_BYTES,
        }
    }
}

/// Everything a load needs besides the file contents.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub path: PathBuf,
    pub input_shape: Shape,
    pub output_shape: Shape,
}

/// Reads model files and turns them into validated descriptors.
#[derive(Debug, Clone, Default)]
pub struct ModelLoader {
    config: LoaderConfig,
}

impl ModelLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Resolve a path to its canonical form, `NotFound` if it does not exist.
    pub fn validate_path(&self, path: &Path) -> Result<PathBuf, InferenceError> {
        let canonical = path
            .canonicalize()
            .map_err(|_| InferenceError::NotFound(path.to_path_buf()))?;
        if !canonical.is_file() {
            return Err(InferenceError::NotFound(canonical));
        }
        Ok(canonical)
    }

    /// Load, decode and validate the model named by `request`.
    pub fn load(&self, request: &LoadRequest) -> Result<ModelDescriptor, InferenceError> {
        request.input_shape.validate()?;
        request.output_shape.validate()?;
        let started = Instant::now();

        let path = self.validate_path(&request.path)?;
        let size = std::fs::metadata(&path)
            .map_err(|_| InferenceError::NotFound(path.clone()))?
            .len();
        if size == 0 {
            return Err(InferenceError::Parse("model file is empty".into()));
        }
        if size > self.config.max_model_bytes {
            return Err(InferenceError::Parse(format!(
                "model file is {} bytes, limit is {}",
                size, self.config.max_model_bytes
            )));
        }

        let mapped = MappedModel::open(&path)?;
        let bytes = mapped.as_bytes();
        let fingerprint = hex::encode(Sha256::digest(bytes));
        let decoded = format::decode(bytes)?;

        let name = decoded.document.name.clone().unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string()
        });
        let metadata = ModelMetadata {
            name,
            path,
            fingerprint,
            size_bytes: size,
        };

        let descriptor = ModelDescriptor::build(
            metadata,
            &decoded.document,
            decoded.payload,
            request.input_shape,
            request.output_shape,
        )?;

        tracing::debug!(
            model = descriptor.name(),
            nodes = descriptor.nodes().len(),
            weight_bytes = descriptor.weight_bytes(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Model decoded"
        );
        Ok(descriptor)
    }
}

/// Memory-mapped model file for zero-copy decoding.
pub struct MappedModel {
    mmap: Mmap,
}

impl MappedModel {
    /// Memory-map a model file read-only.
    pub fn open(path: &Path) -> Result<Self, InferenceError> {
        let file = File::open(path).map_err(|_| InferenceError::NotFound(path.to_path_buf()))?;
        // SAFETY: the mapping is read-only and dropped before `load` returns;
        // every weight is copied out of it during decoding.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| InferenceError::Parse(format!("cannot map model file: {}", e)))?;
        Ok(Self { mmap })
    }

    /// Model data as a byte slice (zero-copy).
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}
