//! Expected-output files.
//!
//! An [`ExpectedStore`] maps a test name and a content kind to the file
//! holding the stored expected output, `<root>/<test>.<kind>`. The store
//! only ever reads; rewriting on mismatch belongs to [`crate::snapshot`].

use std::{
    env, fs,
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use walkdir::WalkDir;

use crate::errors::{self, VellumError};

static DEFAULT_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let base = env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("tests").join("fixtures").join("expected")
});

/// Resolves and reads expected-output files for tests.
#[derive(Debug, Clone)]
pub struct ExpectedStore {
    root: PathBuf,
}

impl ExpectedStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file holding the expected output of `test` for `kind`.
    pub fn path_for(&self, test: &str, kind: &str) -> PathBuf {
        self.root.join(format!("{test}.{kind}"))
    }

    /// Resolves a store-relative path, for suite cases that name their
    /// expected file directly.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Reads the expected output of `test` for `kind`. A missing file is a
    /// resolution error, not a comparison failure.
    pub fn read(&self, test: &str, kind: &str) -> Result<String, VellumError> {
        let path = self.path_for(test, kind);
        fs::read_to_string(&path).map_err(|e| {
            if e.kind() == IoErrorKind::NotFound {
                errors::missing_fixture(&path)
            } else {
                errors::io(&path, &e)
            }
        })
    }

    /// All stored files of `kind` under the root, sorted by path.
    pub fn discover(&self, kind: &str) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path().extension().map(|ext| ext == kind).unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect();
        found.sort();
        found
    }
}

impl Default for ExpectedStore {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT.clone())
    }
}
