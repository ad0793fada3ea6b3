//! Per-test template fixture.
//!
//! A [`TemplateTestCase`] owns one engine handle for the duration of a test
//! and offers the two operations template tests need: overriding a template
//! function so the override is actually used, and asserting rendered output
//! against the stored expected file.

use minijinja::Value;
use serde::Serialize;

use crate::compare;
use crate::engine::{Extension, SharedEngine};
use crate::errors::{ErrorKind, VellumError};
use crate::fixtures::ExpectedStore;
use crate::registry::{EngineRegistry, DEFAULT_ENGINE};
use crate::snapshot;

/// Test fixture binding an engine instance, an expected-output store, and
/// the test's name (which keys its expected files).
///
/// Overriding a function after a template has rendered does not reach the
/// compiled set the engine already holds: function bindings are frozen when
/// the set is built. Re-registering under the same name is not enough.
/// Changing the extension-set signature forces a rebuild on the next
/// render, so the first override in a test registers one inert marker
/// extension; later overrides in the same test skip it.
pub struct TemplateTestCase {
    engine: SharedEngine,
    store: ExpectedStore,
    test_name: String,
    cache_buster_added: bool,
}

impl TemplateTestCase {
    /// Resolves the default engine instance from `registry`.
    pub fn new(
        registry: &EngineRegistry,
        test_name: impl Into<String>,
    ) -> Result<Self, VellumError> {
        Self::with_engine(registry, DEFAULT_ENGINE, test_name)
    }

    /// Resolves a named engine instance from `registry`.
    pub fn with_engine(
        registry: &EngineRegistry,
        engine_id: &str,
        test_name: impl Into<String>,
    ) -> Result<Self, VellumError> {
        Ok(Self::from_engine(
            registry.resolve(engine_id)?,
            ExpectedStore::default(),
            test_name,
        ))
    }

    /// Builds the fixture from an engine handle directly.
    pub fn from_engine(
        engine: SharedEngine,
        store: ExpectedStore,
        test_name: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            store,
            test_name: test_name.into(),
            cache_buster_added: false,
        }
    }

    /// Replaces the expected-output store.
    pub fn with_store(mut self, store: ExpectedStore) -> Self {
        self.store = store;
        self
    }

    pub fn engine(&self) -> SharedEngine {
        SharedEngine::clone(&self.engine)
    }

    pub fn store(&self) -> &ExpectedStore {
        &self.store
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Replaces the template function `name` with `func` for the rest of
    /// this test, including in templates already rendered and cached.
    ///
    /// The first override per fixture also registers one marker extension
    /// to invalidate the compiled set; see the type docs.
    pub fn mock_function<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync + 'static,
    {
        let mut engine = self.engine.borrow_mut();
        engine.register_function(name, func);

        if self.cache_buster_added {
            return;
        }
        engine.register_extension(Extension::marker());
        self.cache_buster_added = true;
    }

    /// Renders `template` with `context` and asserts the trimmed output
    /// structurally equals the stored `<test_name>.html` file.
    pub fn assert_template_matches_html_file<S: Serialize>(
        &self,
        template: &str,
        context: S,
    ) -> Result<(), VellumError> {
        self.assert_template_matches_file(template, context, "html")
    }

    /// As [`assert_template_matches_html_file`] for an arbitrary content
    /// kind. On mismatch, when update mode is enabled, the stored file is
    /// rewritten with the actual output; the mismatch is returned either
    /// way, since the rewrite serves the next run, not this one.
    ///
    /// [`assert_template_matches_html_file`]: Self::assert_template_matches_html_file
    pub fn assert_template_matches_file<S: Serialize>(
        &self,
        template: &str,
        context: S,
        kind: &str,
    ) -> Result<(), VellumError> {
        let rendered = self.engine.borrow_mut().render(template, context)?;
        let actual = rendered.trim();
        let expected_file = self.store.path_for(&self.test_name, kind);

        match compare::compare_xml_file(&expected_file, actual) {
            Ok(()) => Ok(()),
            Err(failure) => {
                if let ErrorKind::Mismatch { diff } = &failure.kind {
                    if snapshot::update_enabled() {
                        snapshot::update_text(diff, &expected_file)?;
                    }
                }
                Err(failure)
            }
        }
    }

    /// Resets per-test state so a reused fixture starts clean, as if freshly
    /// constructed. Call from teardown when the fixture outlives one test.
    pub fn tear_down(&mut self) {
        self.cache_buster_added = false;
    }
}
