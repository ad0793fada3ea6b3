//! Crate-wide error handling.
//!
//! One error type for every failure mode. A `VellumError` pairs an
//! [`ErrorKind`] with a diagnostic code and optional help text, and renders
//! through miette. Comparison mismatches carry their structured diff payload
//! in the kind itself so callers can pattern match on it.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::compare::TextDiff;

/// The single error type for the crate.
#[derive(Debug)]
pub struct VellumError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Optional guidance shown under the error (diff, file path, hints).
    pub help: Option<String>,
    /// Diagnostic code, `vellum::<category>::<kind>`.
    pub code: String,
}

/// All failure modes, grouped by the categories in [`ErrorCategory`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Resolution failures: a named collaborator could not be found.
    #[error("no engine registered under '{name}'")]
    UnknownEngine { name: String },
    #[error("template '{name}' is not registered")]
    UnknownTemplate { name: String },
    #[error("expected output file not found: {path}")]
    MissingFixture { path: String },
    #[error("i/o failure on {path}: {detail}")]
    Io { path: String, detail: String },

    // Render failures, surfaced from the templating engine unmodified.
    #[error("template '{name}' failed to compile: {detail}")]
    Compile { name: String, detail: String },
    #[error("rendering '{template}' failed: {detail}")]
    Render { template: String, detail: String },

    // Comparison failures.
    #[error("{role} content is not well-formed markup: {detail}")]
    InvalidDocument { role: DocumentRole, detail: String },
    #[error("rendered output does not match expected output: {}", .diff.summary)]
    Mismatch { diff: TextDiff },
}

/// Which side of a comparison a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentRole {
    Expected,
    Actual,
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentRole::Expected => write!(f, "expected"),
            DocumentRole::Actual => write!(f, "actual"),
        }
    }
}

/// Error category for test assertions and diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Resolution,
    Render,
    Comparison,
}

impl ErrorCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Resolution => "resolution",
            ErrorCategory::Render => "render",
            ErrorCategory::Comparison => "comparison",
        }
    }
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownEngine { .. }
            | Self::UnknownTemplate { .. }
            | Self::MissingFixture { .. }
            | Self::Io { .. } => ErrorCategory::Resolution,

            Self::Compile { .. } | Self::Render { .. } => ErrorCategory::Render,

            Self::InvalidDocument { .. } | Self::Mismatch { .. } => ErrorCategory::Comparison,
        }
    }

    /// Code suffix for diagnostic codes.
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::UnknownEngine { .. } => "unknown_engine",
            Self::UnknownTemplate { .. } => "unknown_template",
            Self::MissingFixture { .. } => "missing_fixture",
            Self::Io { .. } => "io",
            Self::Compile { .. } => "compile",
            Self::Render { .. } => "render",
            Self::InvalidDocument { .. } => "invalid_document",
            Self::Mismatch { .. } => "mismatch",
        }
    }
}

impl VellumError {
    pub fn new(kind: ErrorKind) -> Self {
        let code = format!(
            "vellum::{}::{}",
            kind.category().as_str(),
            kind.code_suffix()
        );
        Self {
            kind,
            help: None,
            code,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// The structured diff payload, when this is a comparison mismatch.
    pub fn diff(&self) -> Option<&TextDiff> {
        match &self.kind {
            ErrorKind::Mismatch { diff } => Some(diff),
            _ => None,
        }
    }
}

impl fmt::Display for VellumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for VellumError {}

impl Diagnostic for VellumError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }
}

// ============================================================================
// CONSTRUCTORS - one per kind, so call sites never assemble codes by hand
// ============================================================================

pub(crate) fn unknown_engine(name: &str) -> VellumError {
    VellumError::new(ErrorKind::UnknownEngine {
        name: name.to_string(),
    })
}

pub(crate) fn unknown_template(name: &str) -> VellumError {
    VellumError::new(ErrorKind::UnknownTemplate {
        name: name.to_string(),
    })
}

pub(crate) fn missing_fixture(path: &std::path::Path) -> VellumError {
    VellumError::new(ErrorKind::MissingFixture {
        path: path.display().to_string(),
    })
}

pub(crate) fn io(path: &std::path::Path, error: &std::io::Error) -> VellumError {
    VellumError::new(ErrorKind::Io {
        path: path.display().to_string(),
        detail: error.to_string(),
    })
}

pub(crate) fn compile(name: &str, error: &minijinja::Error) -> VellumError {
    VellumError::new(ErrorKind::Compile {
        name: name.to_string(),
        detail: error.to_string(),
    })
}

pub(crate) fn render(template: &str, error: &minijinja::Error) -> VellumError {
    VellumError::new(ErrorKind::Render {
        template: template.to_string(),
        detail: error.to_string(),
    })
}

pub(crate) fn invalid_document(role: DocumentRole, detail: impl fmt::Display) -> VellumError {
    VellumError::new(ErrorKind::InvalidDocument {
        role,
        detail: detail.to_string(),
    })
}

pub(crate) fn mismatch(diff: TextDiff) -> VellumError {
    VellumError::new(ErrorKind::Mismatch { diff })
}

/// Prints a VellumError with full miette diagnostics.
pub fn print_error(error: VellumError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}
