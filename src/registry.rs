//! Named engine instances.
//!
//! Tests resolve the engine they render through by instance id rather than
//! constructing it inline, so suites can host several engines side by side
//! and fixtures stay decoupled from engine setup.

use std::collections::HashMap;

use crate::engine::{SharedEngine, TemplateEnvironment};
use crate::errors::{self, VellumError};

/// Instance id used when a fixture does not name an engine.
pub const DEFAULT_ENGINE: &str = "jinja";

/// A registry of named engine instances.
#[derive(Default)]
pub struct EngineRegistry {
    engines: HashMap<String, SharedEngine>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `engine` under `id` and returns the shared handle.
    pub fn register(&mut self, id: impl Into<String>, engine: TemplateEnvironment) -> SharedEngine {
        let handle = engine.shared();
        self.register_shared(id, SharedEngine::clone(&handle));
        handle
    }

    /// Registers an already-shared engine handle under `id`.
    pub fn register_shared(&mut self, id: impl Into<String>, engine: SharedEngine) {
        self.engines.insert(id.into(), engine);
    }

    /// Resolves the engine registered under `id`.
    pub fn resolve(&self, id: &str) -> Result<SharedEngine, VellumError> {
        self.engines
            .get(id)
            .map(SharedEngine::clone)
            .ok_or_else(|| errors::unknown_engine(id))
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }
}
