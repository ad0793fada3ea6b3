//! Suite runner behavior over committed suite files and ad-hoc cases.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use pretty_assertions::assert_eq;

use vellum::suite::{self, SuiteConfig, SuiteResult, TemplateCase};
use vellum::{snapshot, ExpectedStore, SharedEngine, TemplateEnvironment};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn committed_engine() -> SharedEngine {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut engine = TemplateEnvironment::new();
    engine
        .load_directory(manifest.join("tests/fixtures/templates"))
        .unwrap();
    engine.shared()
}

fn committed_config() -> SuiteConfig {
    SuiteConfig {
        suite_root: format!("{}/tests/suites", env!("CARGO_MANIFEST_DIR")),
        store: ExpectedStore::default(),
        use_colors: false,
    }
}

fn file_case(name: &str, template: &str, expected_file: &str) -> TemplateCase {
    TemplateCase {
        name: name.to_string(),
        template: template.to_string(),
        context: serde_yaml::Value::Null,
        expected: None,
        expected_file: Some(expected_file.to_string()),
        skip: false,
        only: false,
    }
}

#[test]
fn committed_suites_run_green() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var(snapshot::UPDATE_ENV);

    let engine = committed_engine();
    let (passed, failed, skipped) = suite::run_all(&engine, &committed_config(), None);
    assert_eq!((passed, failed, skipped), (2, 0, 1));
}

#[test]
fn filters_skip_cases_by_name_substring() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var(snapshot::UPDATE_ENV);

    let engine = committed_engine();
    let (passed, failed, skipped) = suite::run_all(&engine, &committed_config(), Some("banner"));
    assert_eq!((passed, failed, skipped), (1, 0, 2));
}

#[test]
fn file_backed_cases_compare_structurally() {
    let mut env = TemplateEnvironment::new();
    env.add_template("attrs.html.j2", r#"<a x="1" y="2"/>"#).unwrap();
    let engine = env.shared();

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("attrs.html"), r#"<a y="2" x="1"/>"#).unwrap();
    let store = ExpectedStore::new(dir.path());

    let result = suite::run_case(
        &engine,
        &store,
        "inline.yaml",
        file_case("attribute order is free", "attrs.html.j2", "attrs.html"),
    );
    assert!(matches!(result, SuiteResult::Pass { .. }));
}

#[test]
fn file_backed_mismatch_honors_update_mode_and_still_fails() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var(snapshot::UPDATE_ENV, "1");

    let mut env = TemplateEnvironment::new();
    env.add_template("p.html.j2", "<p>Bob</p>").unwrap();
    let engine = env.shared();

    let dir = tempfile::tempdir().unwrap();
    let stored = dir.path().join("p.html");
    fs::write(&stored, "<p>Ada</p>").unwrap();
    let store = ExpectedStore::new(dir.path());

    let result = suite::run_case(
        &engine,
        &store,
        "inline.yaml",
        file_case("stored greeting is current", "p.html.j2", "p.html"),
    );
    std::env::remove_var(snapshot::UPDATE_ENV);

    let SuiteResult::Fail { diff, .. } = result else {
        panic!("expected the case to fail in the run that updated it");
    };
    assert_eq!(diff.unwrap().actual, "<p>Bob</p>");
    assert_eq!(fs::read_to_string(&stored).unwrap(), "<p>Bob</p>");
}

#[test]
fn discovery_finds_committed_suite_files() {
    let root = format!("{}/tests/suites", env!("CARGO_MANIFEST_DIR"));
    let files = suite::discover_suite_files(&root);
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("rendering.yaml"));
}
