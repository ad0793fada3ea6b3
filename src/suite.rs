//! YAML-driven template suites.
//!
//! Suites let rendering expectations live next to the templates instead of
//! in test functions. A suite file holds a list of cases:
//!
//! ```yaml
//! - name: "greeting interpolates the visitor name"
//!   template: greeting.html.j2
//!   context:
//!     name: Ada
//!   expected: "<p>Ada</p>"            # inline, trimmed string equality
//! - name: "invoice markup is stable"
//!   template: invoice.html.j2
//!   expected_file: invoice.html       # store-relative, structural equality
//! - name: "not ported yet"
//!   template: legacy.html.j2
//!   skip: true
//! ```
//!
//! Execution walks a directory of suite files, runs each case against one
//! engine instance, and reports colored PASS/FAIL/SKIP lines with a diff on
//! failures.

use std::fs;
use std::path::{Path, PathBuf};

use difference::{Changeset, Difference};
use minijinja::Value;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::compare::{self, TextDiff};
use crate::engine::SharedEngine;
use crate::fixtures::ExpectedStore;
use crate::snapshot;

// ============================================================================
// CORE TYPES
// ============================================================================

/// A single case from a suite file.
#[derive(Debug, Deserialize, Clone)]
pub struct TemplateCase {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub context: serde_yaml::Value,
    pub expected: Option<String>,
    pub expected_file: Option<String>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub only: bool,
}

/// Outcome of one case.
#[derive(Debug, Clone)]
pub enum SuiteResult {
    Pass {
        file: String,
        name: String,
    },
    Fail {
        file: String,
        name: String,
        error: String,
        diff: Option<TextDiff>,
    },
    Skipped {
        file: String,
        name: String,
        reason: String,
    },
}

/// Configuration for suite execution and reporting.
pub struct SuiteConfig {
    pub suite_root: String,
    pub store: ExpectedStore,
    pub use_colors: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            suite_root: "tests/suites".to_string(),
            store: ExpectedStore::default(),
            use_colors: atty::is(atty::Stream::Stderr),
        }
    }
}

// Color constants for terminal output
const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";

impl SuiteConfig {
    /// Apply color formatting to text if colors are enabled.
    pub fn colorize(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }
}

// ============================================================================
// DISCOVERY AND LOADING
// ============================================================================

/// Discovers all YAML suite files recursively under the given root.
pub fn discover_suite_files<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    found.sort();
    found
}

/// Load and parse cases from a suite file. Unreadable or malformed files
/// are reported and contribute no cases.
pub fn load_cases(path: &Path) -> Vec<TemplateCase> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Vec<TemplateCase>>(&content) {
            Ok(cases) => cases,
            Err(e) => {
                eprintln!("Failed to parse YAML in {}: {}", path.display(), e);
                Vec::new()
            }
        },
        Err(e) => {
            eprintln!("Failed to read {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Helper for case skipping logic.
pub fn skip_reason(case: &TemplateCase, has_only: bool, filter: Option<&str>) -> Option<String> {
    if has_only && !case.only {
        return Some("Not marked 'only' in 'only' mode".to_string());
    }
    if case.skip {
        return Some("Marked 'skip'".to_string());
    }
    if let Some(f) = filter {
        if !case.name.to_lowercase().contains(f) {
            return Some(format!("Filtered out by substring: {}", f));
        }
    }
    None
}

// ============================================================================
// CASE EXECUTION
// ============================================================================

/// Execute a single case against `engine`, comparing per its expectation.
///
/// File-backed expectations use structural XML equality and honor update
/// mode the same way the fixture assertion does; inline expectations use
/// trimmed string equality; a case with neither passes on a clean render.
pub fn run_case(
    engine: &SharedEngine,
    store: &ExpectedStore,
    file: &str,
    case: TemplateCase,
) -> SuiteResult {
    let context = if case.context.is_null() {
        Value::from_serialize(serde_yaml::Mapping::new())
    } else {
        Value::from_serialize(&case.context)
    };

    let rendered = match engine.borrow_mut().render(&case.template, context) {
        Ok(rendered) => rendered,
        Err(e) => {
            return SuiteResult::Fail {
                file: file.to_string(),
                name: case.name,
                error: e.to_string(),
                diff: None,
            };
        }
    };
    let actual = rendered.trim();

    if let Some(expected_file) = case.expected_file.as_deref() {
        let path = store.resolve(expected_file);
        return match compare::compare_xml_file(&path, actual) {
            Ok(()) => SuiteResult::Pass {
                file: file.to_string(),
                name: case.name,
            },
            Err(failure) => {
                let diff = failure.diff().cloned();
                if let Some(diff) = &diff {
                    if snapshot::update_enabled() {
                        if let Err(update_error) = snapshot::update_text(diff, &path) {
                            return SuiteResult::Fail {
                                file: file.to_string(),
                                name: case.name,
                                error: update_error.to_string(),
                                diff: Some(diff.clone()),
                            };
                        }
                    }
                }
                SuiteResult::Fail {
                    file: file.to_string(),
                    name: case.name,
                    error: failure.to_string(),
                    diff,
                }
            }
        };
    }

    if let Some(expected) = case.expected.as_deref() {
        if actual != expected.trim() {
            return SuiteResult::Fail {
                file: file.to_string(),
                name: case.name,
                error: format_output_mismatch(expected, actual),
                diff: Some(TextDiff {
                    expected: expected.trim().to_string(),
                    actual: actual.to_string(),
                    summary: "rendered output differs".to_string(),
                }),
            };
        }
    }

    SuiteResult::Pass {
        file: file.to_string(),
        name: case.name,
    }
}

/// Format output mismatch error message.
fn format_output_mismatch(expected: &str, actual: &str) -> String {
    format!(
        "Output did not match expected\n  Expected: {}\n  Actual:   {}",
        expected.trim(),
        actual.trim()
    )
}

// ============================================================================
// REPORTING AND OUTPUT
// ============================================================================

/// Partition results by outcome type.
pub fn partition_results(results: &[SuiteResult]) -> (usize, usize, usize) {
    let passed = results
        .iter()
        .filter(|r| matches!(r, SuiteResult::Pass { .. }))
        .count();
    let failed = results
        .iter()
        .filter(|r| matches!(r, SuiteResult::Fail { .. }))
        .count();
    let skipped = results
        .iter()
        .filter(|r| matches!(r, SuiteResult::Skipped { .. }))
        .count();
    (passed, failed, skipped)
}

/// Print suite results with colored output and a summary line.
pub fn report_results(results: &[SuiteResult], config: &SuiteConfig) {
    let (passed, failed, skipped) = partition_results(results);

    for result in results {
        match result {
            SuiteResult::Pass { file, name } => {
                println!("{}: {} [{}]", config.colorize("PASS", GREEN), name, file)
            }
            SuiteResult::Fail { .. } => print_failure(result, config),
            SuiteResult::Skipped { file, name, reason } => {
                println!(
                    "{}: {} [{}] ({})",
                    config.colorize("SKIP", YELLOW),
                    name,
                    file,
                    reason
                )
            }
        }
    }

    println!(
        "\nSuite summary: total {}, {} {}, {} {}, {} {}",
        results.len(),
        config.colorize("passed", GREEN),
        passed,
        config.colorize("failed", RED),
        failed,
        config.colorize("skipped", YELLOW),
        skipped,
    );

    if failed > 0 {
        eprintln!("\nFailed cases:");
        for result in results {
            if let SuiteResult::Fail { name, .. } = result {
                eprintln!("  - {}", name);
            }
        }
    }
}

/// Print detailed failure information, including a line diff when one is
/// available.
pub fn print_failure(result: &SuiteResult, config: &SuiteConfig) {
    if let SuiteResult::Fail {
        file,
        name,
        error,
        diff,
    } = result
    {
        eprintln!("{}: {} [{}]", config.colorize("FAIL", RED), name, file);
        eprintln!("  Error: {}", error);
        if let Some(diff) = diff {
            eprintln!("  Diff:");
            print_diff(diff, config);
        }
    }
}

/// Print a line diff of expected vs actual.
pub fn print_diff(diff: &TextDiff, config: &SuiteConfig) {
    let changeset = Changeset::new(&diff.expected, &diff.actual, "\n");
    for change in &changeset.diffs {
        match change {
            Difference::Same(block) => {
                for line in block.lines() {
                    eprintln!("    {}", line);
                }
            }
            Difference::Rem(block) => {
                for line in block.lines() {
                    eprintln!("  - {}", config.colorize(line, GREEN));
                }
            }
            Difference::Add(block) => {
                for line in block.lines() {
                    eprintln!("  + {}", config.colorize(line, RED));
                }
            }
        }
    }
}

// ============================================================================
// SUITE EXECUTION
// ============================================================================

/// Run every case in every suite file under the configured root, with
/// optional name filtering, and return (passed, failed, skipped).
pub fn run_all(engine: &SharedEngine, config: &SuiteConfig, filter: Option<&str>) -> (usize, usize, usize) {
    let suite_files = discover_suite_files(&config.suite_root);

    let mut all_cases = Vec::new();
    let mut has_only = false;
    for path in &suite_files {
        let file_name = path.display().to_string();
        for case in load_cases(path) {
            if case.only {
                has_only = true;
            }
            all_cases.push((file_name.clone(), case));
        }
    }

    let results: Vec<SuiteResult> = all_cases
        .into_iter()
        .map(|(file, case)| {
            if let Some(reason) = skip_reason(&case, has_only, filter) {
                SuiteResult::Skipped {
                    file,
                    name: case.name,
                    reason,
                }
            } else {
                run_case(engine, &config.store, &file, case)
            }
        })
        .collect();

    report_results(&results, config);
    partition_results(&results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TemplateEnvironment;

    fn case(name: &str) -> TemplateCase {
        TemplateCase {
            name: name.to_string(),
            template: "t.j2".to_string(),
            context: serde_yaml::Value::Null,
            expected: None,
            expected_file: None,
            skip: false,
            only: false,
        }
    }

    #[test]
    fn skip_reason_honors_skip_only_and_filter() {
        let mut skipped = case("skipped case");
        skipped.skip = true;
        assert!(skip_reason(&skipped, false, None).is_some());

        let plain = case("plain case");
        assert!(skip_reason(&plain, true, None).is_some());
        assert!(skip_reason(&plain, false, None).is_none());
        assert!(skip_reason(&plain, false, Some("plain")).is_none());
        assert!(skip_reason(&plain, false, Some("other")).is_some());
    }

    #[test]
    fn load_cases_tolerates_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, ": not yaml [").unwrap();
        assert!(load_cases(&path).is_empty());
        assert!(load_cases(&dir.path().join("absent.yaml")).is_empty());
    }

    #[test]
    fn case_flags_default_to_false() {
        let cases: Vec<TemplateCase> =
            serde_yaml::from_str("- name: n\n  template: t.j2\n").unwrap();
        assert!(!cases[0].skip);
        assert!(!cases[0].only);
        assert!(cases[0].context.is_null());
    }

    #[test]
    fn run_case_with_inline_expectation() {
        let mut env = TemplateEnvironment::new();
        env.add_template("t.j2", "<p>{{ name }}</p>").unwrap();
        let engine = env.shared();
        let store = ExpectedStore::new("/nonexistent");

        let mut ok = case("renders ada");
        ok.context = serde_yaml::from_str("name: Ada").unwrap();
        ok.expected = Some("<p>Ada</p>".to_string());
        assert!(matches!(
            run_case(&engine, &store, "suite.yaml", ok),
            SuiteResult::Pass { .. }
        ));

        let mut bad = case("renders bob");
        bad.context = serde_yaml::from_str("name: Ada").unwrap();
        bad.expected = Some("<p>Bob</p>".to_string());
        let result = run_case(&engine, &store, "suite.yaml", bad);
        let SuiteResult::Fail { error, diff, .. } = result else {
            panic!("expected a failure");
        };
        assert!(error.contains("Output did not match expected"));
        assert_eq!(diff.unwrap().actual, "<p>Ada</p>");
    }

    #[test]
    fn run_case_reports_render_failures() {
        let engine = TemplateEnvironment::new().shared();
        let store = ExpectedStore::new("/nonexistent");
        let result = run_case(&engine, &store, "suite.yaml", case("missing template"));
        assert!(matches!(result, SuiteResult::Fail { diff: None, .. }));
    }
}
