// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The process-wide session slot.
//!
//! The slot holds zero or one [`Session`]. Loads are serialized by a load
//! mutex and build the new session completely before publishing it with a
//! single write-locked swap. Predictions clone the `Arc<Session>` under a
//! short read lock, so a replacement never waits for in-flight predictions
//! and an in-flight prediction keeps the model it started with.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::descriptor::ModelDescriptor;
use super::loader::{LoadRequest, ModelLoader};
use crate::engine::{EngineConfig, ExecutionEngine, InferenceError, Prediction};
use crate::telemetry;
use crate::tensor::Shape;

/// A loaded model bound to its execution engine.
#[derive(Debug)]
pub struct Session {
    id: u64,
    engine: ExecutionEngine,
}

impl Session {
    pub fn new(id: u64, engine: ExecutionEngine) -> Self {
        Self { id, engine }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn model(&self) -> &Arc<ModelDescriptor> {
        self.engine.model()
    }

    pub fn info(&self) -> SessionInfo {
        let model = self.model();
        let metadata = model.metadata();
        SessionInfo {
            id: self.id,
            name: metadata.name.clone(),
            path: metadata.path.clone(),
            fingerprint: metadata.fingerprint.clone(),
            size_bytes: metadata.size_bytes,
            input_shape: model.input_shape(),
            output_shape: model.output_shape(),
            nodes: model.nodes().len(),
            weight_bytes: model.weight_bytes(),
            peak_activation_bytes: model.peak_activation_bytes(),
            cost: model.total_cost(),
            backend: self.engine.backend_name(),
        }
    }
}

/// Snapshot of the loaded session for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: u64,
    pub name: String,
    pub path: PathBuf,
    pub fingerprint: String,
    pub size_bytes: u64,
    pub input_shape: Shape,
    pub output_shape: Shape,
    pub nodes: usize,
    pub weight_bytes: usize,
    pub peak_activation_bytes: usize,
    /// Rough multiply-accumulate count of one prediction.
    pub cost: usize,
    pub backend: &'static str,
}

/// Thread-safe single-model slot.
pub struct SessionRegistry {
    slot: RwLock<Option<Arc<Session>>>,
    load_lock: Mutex<()>,
    next_id: AtomicU64,
}

static GLOBAL: SessionRegistry = SessionRegistry::new();

impl SessionRegistry {
    pub const fn new() -> Self {
        Self {
            slot: parking_lot::const_rwlock(None),
            load_lock: parking_lot::const_mutex(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The registry behind the C boundary.
    pub fn global() -> &'static SessionRegistry {
        &GLOBAL
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    /// The current session, `NotLoaded` when the slot is empty.
    pub fn current(&self) -> Result<Arc<Session>, InferenceError> {
        self.slot.read().clone().ok_or(InferenceError::NotLoaded)
    }

    /// Publish `session`, returning the one it displaced.
    pub fn replace(&self, session: Session) -> Option<Arc<Session>> {
        self.slot.write().replace(Arc::new(session))
    }

    /// Load a model and make it current. On failure the slot is untouched.
    pub fn load(
        &self,
        loader: &ModelLoader,
        request: &LoadRequest,
        config: &EngineConfig,
    ) -> Result<u64, InferenceError> {
        let _serial = self.load_lock.lock();
        let started = Instant::now();

        let result = self.build_session(loader, request, config);
        match &result {
            Ok(session) => {
                telemetry::record_load("ok");
                tracing::info!(
                    session = session.id(),
                    model = session.model().name(),
                    fingerprint = %session.model().metadata().fingerprint,
                    nodes = session.model().nodes().len(),
                    backend = session.engine().backend_name(),
                    elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                    "Model loaded"
                );
            }
            Err(e) => {
                telemetry::record_load(e.kind().as_str());
                tracing::warn!(
                    path = %request.path.display(),
                    error = %e,
                    "Model load rejected; previous session kept"
                );
            }
        }

        let session = result?;
        let id = session.id();
        if let Some(previous) = self.replace(session) {
            tracing::debug!(session = previous.id(), "Session replaced");
        }
        Ok(id)
    }

    fn build_session(
        &self,
        loader: &ModelLoader,
        request: &LoadRequest,
        config: &EngineConfig,
    ) -> Result<Session, InferenceError> {
        let descriptor = loader.load(request)?;
        let engine = ExecutionEngine::new(Arc::new(descriptor), config)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Session::new(id, engine))
    }

    /// Predict with the current session.
    pub fn predict(&self, input: &[f32]) -> Result<Prediction, InferenceError> {
        self.predict_with(|| Ok(input))
    }

    /// Predict with the current session, resolving the input only once a
    /// session is known to exist. An empty slot is `NotLoaded` whatever the
    /// input would have been.
    pub fn predict_with<'a, F>(&self, input: F) -> Result<Prediction, InferenceError>
    where
        F: FnOnce() -> Result<&'a [f32], InferenceError>,
    {
        let result = self
            .current()
            .and_then(|session| session.engine().predict(input()?));
        match &result {
            Ok(_) => telemetry::record_prediction("ok"),
            Err(e) => telemetry::record_prediction(e.kind().as_str()),
        }
        result
    }

    /// Empty the slot. Returns whether a session was loaded.
    pub fn unload(&self) -> bool {
        let previous = self.slot.write().take();
        match previous {
            Some(session) => {
                tracing::info!(session = session.id(), model = session.model().name(), "Model unloaded");
                true
            }
            None => false,
        }
    }

    pub fn info(&self) -> Option<SessionInfo> {
        self.slot.read().as_ref().map(|s| s.info())
    }

    /// Return to the initial empty state.
    pub fn reset(&self) {
        self.unload();
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
