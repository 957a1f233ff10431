// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model management: file formats, loading, validation and the session slot.

pub mod format;

mod descriptor;
mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
mod registry;

pub use descriptor::{ModelDescriptor, ModelMetadata, Node, INPUT_SLOT};
pub use loader::{LoadRequest, LoaderConfig, MappedModel, ModelLoader, DEFAULT_MAX_MODEL_BYTES};
pub use registry::{Session, SessionInfo, SessionRegistry};

#[cfg(test)]
pub(crate) use descriptor::test_support;
