//! Expected-output rewriting.
//!
//! When a comparison fails and update mode is enabled, the stored expected
//! file is overwritten with the actual rendered content so the next run
//! compares against it. The current run still fails; the rewrite is a side
//! effect, never a pass.

use std::{env, fs, path::Path};

use crate::compare::TextDiff;
use crate::errors::{self, VellumError};

/// Environment variable controlling update mode.
pub const UPDATE_ENV: &str = "UPDATE_EXPECTED_OUTPUT";

/// Whether update mode is enabled. Queried fresh on every call; the
/// environment is never cached.
pub fn update_enabled() -> bool {
    match env::var(UPDATE_ENV) {
        Ok(value) => !matches!(value.trim(), "" | "0" | "false" | "off"),
        Err(_) => false,
    }
}

/// Overwrites `path` with the actual content captured in `diff`, creating
/// parent directories as needed.
pub fn update_text(diff: &TextDiff, path: &Path) -> Result<(), VellumError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| errors::io(parent, &e))?;
    }
    fs::write(path, diff.actual.as_bytes()).map_err(|e| errors::io(path, &e))
}
