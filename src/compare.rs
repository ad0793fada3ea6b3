//! Structural XML comparison.
//!
//! Rendered output is compared against stored expected content as a
//! document, not as bytes: attributes are order-insensitive, text is
//! whitespace-normalized, and comments and processing instructions are
//! ignored. Element order and namespace-expanded names are significant.
//!
//! A failed comparison produces a [`TextDiff`] carrying both raw documents
//! and a one-line summary of the first structural divergence; the error's
//! help text shows a line diff of the raw content.

use std::{collections::BTreeMap, fmt::Write as _, fs, io::ErrorKind as IoErrorKind, path::Path};

use difference::{Changeset, Difference};
use roxmltree::Document;

use crate::errors::{self, DocumentRole, VellumError};
use crate::snapshot;

/// The structured payload of a comparison failure.
///
/// `expected` and `actual` hold the raw (trimmed) document text; `actual`
/// is what the snapshot updater writes when update mode is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDiff {
    pub expected: String,
    pub actual: String,
    pub summary: String,
}

/// Compares two XML strings for structural equality.
pub fn compare_xml(expected: &str, actual: &str) -> Result<(), VellumError> {
    compare_inner(expected, actual, None)
}

/// Compares `actual` against the XML stored at `path`. A missing file is a
/// resolution error; the comparison itself never touches the file again.
pub fn compare_xml_file(path: &Path, actual: &str) -> Result<(), VellumError> {
    let expected = fs::read_to_string(path).map_err(|e| {
        if e.kind() == IoErrorKind::NotFound {
            errors::missing_fixture(path)
        } else {
            errors::io(path, &e)
        }
    })?;
    compare_inner(&expected, actual, Some(path))
}

/// Renders the line diff shown in failure output: expected lines as `-`,
/// actual lines as `+`.
pub fn render_changes(diff: &TextDiff) -> String {
    let changeset = Changeset::new(&diff.expected, &diff.actual, "\n");
    let mut out = String::new();
    for change in &changeset.diffs {
        let (prefix, block) = match change {
            Difference::Same(block) => ("  ", block),
            Difference::Rem(block) => ("- ", block),
            Difference::Add(block) => ("+ ", block),
        };
        for line in block.lines() {
            let _ = writeln!(out, "{prefix}{line}");
        }
    }
    out.trim_end().to_string()
}

fn compare_inner(expected: &str, actual: &str, origin: Option<&Path>) -> Result<(), VellumError> {
    let expected_doc = Document::parse(expected)
        .map_err(|e| errors::invalid_document(DocumentRole::Expected, e))?;
    let actual_doc =
        Document::parse(actual).map_err(|e| errors::invalid_document(DocumentRole::Actual, e))?;

    let expected_tree = canonical_element(expected_doc.root_element());
    let actual_tree = canonical_element(actual_doc.root_element());
    if expected_tree == actual_tree {
        return Ok(());
    }

    let summary = first_divergence(&expected_tree, &actual_tree, "")
        .unwrap_or_else(|| "documents differ structurally".to_string());
    let diff = TextDiff {
        expected: expected.trim().to_string(),
        actual: actual.trim().to_string(),
        summary,
    };

    let mut help = String::new();
    if let Some(path) = origin {
        let _ = writeln!(help, "expected file: {}", path.display());
    }
    help.push_str(&render_changes(&diff));
    if origin.is_some() {
        let _ = write!(help, "\nset {}=1 to rewrite the stored file", snapshot::UPDATE_ENV);
    }
    Err(errors::mismatch(diff).with_help(help))
}

// ============================================================================
// CANONICAL FORM
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum CanonicalNode {
    Element {
        name: String,
        attributes: BTreeMap<String, String>,
        children: Vec<CanonicalNode>,
    },
    Text(String),
}

fn canonical_element(node: roxmltree::Node) -> CanonicalNode {
    let mut attributes = BTreeMap::new();
    for attr in node.attributes() {
        attributes.insert(expand(attr.namespace(), attr.name()), attr.value().to_string());
    }
    CanonicalNode::Element {
        name: expand(node.tag_name().namespace(), node.tag_name().name()),
        attributes,
        children: canonical_children(node),
    }
}

fn canonical_children(node: roxmltree::Node) -> Vec<CanonicalNode> {
    let mut out = Vec::new();
    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            flush_text(&mut out, &mut text);
            out.push(canonical_element(child));
        } else if child.is_text() {
            if let Some(chunk) = child.text() {
                text.push_str(chunk);
            }
        }
        // Comments and processing instructions are not compared.
    }
    flush_text(&mut out, &mut text);
    out
}

/// Collapses runs of whitespace and drops whitespace-only text entirely.
fn flush_text(out: &mut Vec<CanonicalNode>, buf: &mut String) {
    let normalized = buf.split_whitespace().collect::<Vec<_>>().join(" ");
    buf.clear();
    if !normalized.is_empty() {
        out.push(CanonicalNode::Text(normalized));
    }
}

fn expand(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{{{ns}}}{name}"),
        None => name.to_string(),
    }
}

// ============================================================================
// DIVERGENCE REPORTING
// ============================================================================

/// Walks both trees in lockstep and describes the first point where they
/// disagree. Returns None when the trees are equal.
fn first_divergence(expected: &CanonicalNode, actual: &CanonicalNode, path: &str) -> Option<String> {
    match (expected, actual) {
        (
            CanonicalNode::Element {
                name: expected_name,
                attributes: expected_attrs,
                children: expected_children,
            },
            CanonicalNode::Element {
                name: actual_name,
                attributes: actual_attrs,
                children: actual_children,
            },
        ) => {
            if expected_name != actual_name {
                return Some(format!(
                    "element <{expected_name}> vs <{actual_name}> under {}",
                    display_path(path)
                ));
            }
            let here = format!("{path}/{expected_name}");
            for (key, expected_value) in expected_attrs {
                match actual_attrs.get(key) {
                    None => {
                        return Some(format!("attribute '{key}' missing at {here}"));
                    }
                    Some(actual_value) if actual_value != expected_value => {
                        return Some(format!(
                            "attribute '{key}' at {here}: \"{expected_value}\" vs \"{actual_value}\""
                        ));
                    }
                    Some(_) => {}
                }
            }
            for key in actual_attrs.keys() {
                if !expected_attrs.contains_key(key) {
                    return Some(format!("unexpected attribute '{key}' at {here}"));
                }
            }
            if expected_children.len() != actual_children.len() {
                return Some(format!(
                    "child count {} vs {} at {here}",
                    expected_children.len(),
                    actual_children.len()
                ));
            }
            expected_children
                .iter()
                .zip(actual_children)
                .find_map(|(e, a)| first_divergence(e, a, &here))
        }
        (CanonicalNode::Text(expected_text), CanonicalNode::Text(actual_text)) => {
            if expected_text != actual_text {
                Some(format!(
                    "text \"{expected_text}\" vs \"{actual_text}\" at {}",
                    display_path(path)
                ))
            } else {
                None
            }
        }
        (CanonicalNode::Element { name, .. }, CanonicalNode::Text(text)) => Some(format!(
            "element <{name}> vs text \"{text}\" at {}",
            display_path(path)
        )),
        (CanonicalNode::Text(text), CanonicalNode::Element { name, .. }) => Some(format!(
            "text \"{text}\" vs element <{name}> at {}",
            display_path(path)
        )),
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "document root"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn attribute_order_is_insignificant() {
        assert!(compare_xml(r#"<a y="2" x="1"/>"#, r#"<a x="1" y="2"/>"#).is_ok());
    }

    #[test]
    fn insignificant_whitespace_is_ignored() {
        assert!(compare_xml("<a>\n  hi\n</a>", "<a>hi</a>").is_ok());
        assert!(compare_xml("<a>\n  <b/>\n</a>", "<a><b/></a>").is_ok());
    }

    #[test]
    fn comments_are_not_compared() {
        assert!(compare_xml("<a><!-- note --><b/></a>", "<a><b/></a>").is_ok());
    }

    #[test]
    fn text_mismatch_names_the_path() {
        let err = compare_xml("<p>Ada</p>", "<p>Bob</p>").unwrap_err();
        let ErrorKind::Mismatch { diff } = &err.kind else {
            panic!("expected a mismatch, got {err}");
        };
        assert!(diff.summary.contains("\"Ada\" vs \"Bob\""));
        assert!(diff.summary.contains("/p"));
        assert_eq!(diff.expected, "<p>Ada</p>");
        assert_eq!(diff.actual, "<p>Bob</p>");
    }

    #[test]
    fn attribute_value_mismatch_names_the_attribute() {
        let err = compare_xml(r#"<a x="1"/>"#, r#"<a x="2"/>"#).unwrap_err();
        let ErrorKind::Mismatch { diff } = &err.kind else {
            panic!("expected a mismatch, got {err}");
        };
        assert!(diff.summary.contains("attribute 'x'"));
    }

    #[test]
    fn child_count_mismatch_is_reported() {
        let err = compare_xml("<a><b/></a>", "<a><b/><b/></a>").unwrap_err();
        let ErrorKind::Mismatch { diff } = &err.kind else {
            panic!("expected a mismatch, got {err}");
        };
        assert!(diff.summary.contains("child count 1 vs 2"));
    }

    #[test]
    fn malformed_expected_content_is_flagged_as_such() {
        let err = compare_xml("<a", "<a/>").unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::InvalidDocument {
                role: crate::errors::DocumentRole::Expected,
                ..
            }
        ));
    }

    #[test]
    fn missing_expected_file_is_a_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = compare_xml_file(&dir.path().join("absent.html"), "<a/>").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MissingFixture { .. }));
    }

    #[test]
    fn file_mismatch_help_names_the_file_and_the_update_switch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.html");
        fs::write(&path, "<p>Ada</p>").unwrap();
        let err = compare_xml_file(&path, "<p>Bob</p>").unwrap_err();
        let help = err.help.as_deref().unwrap();
        assert!(help.contains("case.html"));
        assert!(help.contains(snapshot::UPDATE_ENV));
        assert!(help.contains("- <p>Ada</p>"));
        assert!(help.contains("+ <p>Bob</p>"));
    }

    #[test]
    fn render_changes_prefixes_expected_and_actual_lines() {
        let diff = TextDiff {
            expected: "same\nold".to_string(),
            actual: "same\nnew".to_string(),
            summary: String::new(),
        };
        let rendered = render_changes(&diff);
        assert!(rendered.contains("  same"));
        assert!(rendered.contains("- old"));
        assert!(rendered.contains("+ new"));
    }
}
