//! Materialization guardrail: merged queue items must reference an existing, canonically
//! located resolution note.

use std::path::Path;

use crate::audit::inputs::{MergeQueue, Scalar};
use crate::audit::report::{CheckResult, CheckStatus, Finding, FindingIssue, FindingSubject, Summary};
use crate::policy::scope::ScopePolicy;

/// Counter keys of the materialization check, in report order.
pub const MATERIALIZATION_SUMMARY_KEYS: &[&str] = &[
    "merge_items_scanned",
    "merged_items_scanned",
    "materialization_violations",
    "malformed_entries_skipped",
];

/// The only terminal status that requires a resolution note.
pub const MERGED_STATUS: &str = "merged";

const RELATIVE_FORM: &str = "./";

/// First failing rule for one merged item's reference, if any.
///
/// Rules run in order and short-circuit, so an item fails at most once.
pub fn classify_reference(
    reference: Option<&Scalar>,
    canonical_root: &str,
    repo_root: &Path,
) -> Option<(FindingIssue, Option<String>)> {
    let Some(raw) = reference
        .and_then(Scalar::as_text)
        .filter(|s| !s.trim().is_empty())
    else {
        return Some((FindingIssue::MissingResolutionNoteRef, None));
    };

    let reference = raw.trim();
    let issue = if reference.starts_with(RELATIVE_FORM) {
        FindingIssue::NonCanonicalReferenceFormat
    } else if !reference.starts_with(canonical_root) {
        FindingIssue::ResolutionNoteNotInScenes
    } else if !repo_root.join(reference).exists() {
        FindingIssue::ResolutionNoteMissingFile
    } else {
        return None;
    };
    Some((issue, Some(reference.to_string())))
}

/// Check every merged item of `queue`.
pub fn check_materialization(
    queue: &MergeQueue,
    policy: &ScopePolicy,
    repo_root: &Path,
) -> CheckResult {
    let mut merged = 0;
    let mut findings = Vec::new();

    for entry in &queue.items {
        if entry.item.normalized_status() != MERGED_STATUS {
            continue;
        }
        merged += 1;

        let merge_id = entry.item.merge_id.as_ref().map_or_else(
            || format!("item_{:03}", entry.position + 1),
            Scalar::render,
        );
        if let Some((issue, reference)) = classify_reference(
            entry.item.resolution_note_ref.as_ref(),
            &policy.canonical_artifacts_root,
            repo_root,
        ) {
            let mut finding = Finding::new(FindingSubject::MergeItem(merge_id), issue);
            if let Some(reference) = reference {
                finding = finding.resolution_note_ref(&reference);
            }
            findings.push(finding);
        }
    }

    CheckResult {
        status: CheckStatus::from_violations(findings.len()),
        summary: Summary::new()
            .count("merge_items_scanned", queue.items.len())
            .count("merged_items_scanned", merged)
            .count("materialization_violations", findings.len())
            .count("malformed_entries_skipped", queue.malformed_entries),
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::inputs::parse_merge_queue;
    use crate::policy::table::PolicyTable;
    use serde_json::json;
    use std::fs;

    fn run(root: &Path, doc: &serde_json::Value) -> CheckResult {
        let policy = PolicyTable::builtin().unwrap().scope;
        check_materialization(&parse_merge_queue(doc).unwrap(), &policy, root)
    }

    #[test]
    fn relative_form_is_non_canonical_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(
            dir.path(),
            &json!({"items": [{"merge_id": "m1", "status": "merged", "resolution_note_ref": "./scenes/foo.json"}]}),
        );
        assert_eq!(result.status, CheckStatus::Warning);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].issue, FindingIssue::NonCanonicalReferenceFormat);
        assert_eq!(
            result.findings[0].resolution_note_ref.as_deref(),
            Some("./scenes/foo.json")
        );
    }

    #[test]
    fn absent_file_is_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(
            dir.path(),
            &json!({"items": [{"merge_id": "m2", "status": "merged", "resolution_note_ref": "scenes/does_not_exist.json"}]}),
        );
        assert_eq!(result.findings[0].issue, FindingIssue::ResolutionNoteMissingFile);
    }

    #[test]
    fn existing_canonical_note_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("scenes")).unwrap();
        fs::write(dir.path().join("scenes/note.json"), "{}").unwrap();
        let result = run(
            dir.path(),
            &json!({"items": [
                {"merge_id": "m3", "status": "MERGED ", "resolution_note_ref": " scenes/note.json "},
                {"merge_id": "m4", "status": "pending"}
            ]}),
        );
        assert_eq!(result.status, CheckStatus::Ok);
        assert_eq!(result.summary.get_count("merge_items_scanned"), 2);
        assert_eq!(result.summary.get_count("merged_items_scanned"), 1);
    }

    #[test]
    fn missing_or_blank_or_non_string_ref_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(
            dir.path(),
            &json!({"items": [
                {"status": "merged"},
                {"status": "merged", "resolution_note_ref": "   "},
                {"status": "merged", "resolution_note_ref": 12}
            ]}),
        );
        assert_eq!(result.findings.len(), 3);
        assert!(
            result
                .findings
                .iter()
                .all(|f| f.issue == FindingIssue::MissingResolutionNoteRef
                    && f.resolution_note_ref.is_none())
        );
        assert_eq!(
            result.findings[0].subject,
            FindingSubject::MergeItem("item_001".to_string())
        );
        assert_eq!(
            result.findings[2].subject,
            FindingSubject::MergeItem("item_003".to_string())
        );
    }

    #[test]
    fn outside_canonical_root_flagged() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes/n.json"), "{}").unwrap();
        let result = run(
            dir.path(),
            &json!({"items": [{"merge_id": "m5", "status": "merged", "resolution_note_ref": "notes/n.json"}]}),
        );
        assert_eq!(result.findings[0].issue, FindingIssue::ResolutionNoteNotInScenes);
    }
}
