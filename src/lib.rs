//! Template snapshot testing.
//!
//! Renders templates through a cached engine adapter, compares the output
//! against stored expected files with structural XML equality, and lets
//! tests override template functions so the override takes effect even when
//! the engine already compiled the template earlier in the test. When a
//! comparison fails with `UPDATE_EXPECTED_OUTPUT` set, the stored file is
//! rewritten with the actual output for the next run; the current run still
//! fails.
//!
//! # Usage
//!
//! ```
//! use vellum::{EngineRegistry, TemplateTestCase, TemplateEnvironment};
//!
//! let mut engine = TemplateEnvironment::new();
//! engine.add_template("greeting.html.j2", "<p>{{ name }}</p>").unwrap();
//! let rendered = engine
//!     .render("greeting.html.j2", minijinja::context!(name => "World"))
//!     .unwrap();
//! assert_eq!(rendered, "<p>World</p>");
//!
//! let mut registry = EngineRegistry::new();
//! registry.register("jinja", engine);
//! let fixture = TemplateTestCase::new(&registry, "greeting_renders").unwrap();
//! assert_eq!(fixture.test_name(), "greeting_renders");
//! ```

pub use crate::compare::TextDiff;
pub use crate::engine::{Extension, SharedEngine, TemplateEnvironment, TemplateFn};
pub use crate::errors::{DocumentRole, ErrorCategory, ErrorKind, VellumError};
pub use crate::fixtures::ExpectedStore;
pub use crate::harness::TemplateTestCase;
pub use crate::registry::{EngineRegistry, DEFAULT_ENGINE};

pub mod compare;
pub mod engine;
pub mod errors;
pub mod fixtures;
pub mod harness;
pub mod registry;
pub mod snapshot;
pub mod suite;
