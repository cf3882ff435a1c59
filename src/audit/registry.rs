//! Registry churn guardrail: Beads-scoped authority tuples must use narrow, literal,
//! single-surface scope prefixes.

use std::collections::BTreeSet;

use crate::audit::inputs::{Registry, ScopeEntry, ScopeField};
use crate::audit::report::{CheckResult, CheckStatus, Finding, FindingIssue, FindingSubject, Summary};
use crate::policy::scope::ScopePolicy;

/// Counter keys of this check, in report order.
pub const REGISTRY_SUMMARY_KEYS: &[&str] = &[
    "beads_tuples_scanned",
    "wildcard_scope_violations",
    "broad_scope_violations",
    "multi_surface_tuple_violations",
    "invalid_scope_format",
    "malformed_entries_skipped",
];

const INVALID_SCOPE_FORMAT_DETAIL: &str = "scope must be a list of repo-root-relative prefixes";
const INVALID_SCOPE_ENTRY_DETAIL: &str = "scope entries must be strings";

#[derive(Debug, Default)]
struct Counters {
    scanned: usize,
    wildcard: usize,
    broad: usize,
    multi_surface: usize,
    invalid_format: usize,
}

/// Audit every Beads-relevant tuple of `registry` against `policy`.
pub fn check_registry(registry: &Registry, policy: &ScopePolicy) -> CheckResult {
    let mut counters = Counters::default();
    let mut findings = Vec::new();

    for tuple in &registry.tuples {
        let id_text = tuple.authority_id.as_ref().and_then(|id| id.as_text());
        if !policy.is_beads_relevant(id_text, tuple.raw_prefixes()) {
            continue;
        }

        counters.scanned += 1;
        let authority_id = tuple
            .authority_id
            .as_ref()
            .map_or_else(|| format!("unknown_{}", counters.scanned), |id| id.render());
        let subject = || FindingSubject::Authority(authority_id.clone());

        let ScopeField::List(entries) = &tuple.scope else {
            counters.invalid_format += 1;
            findings.push(
                Finding::new(subject(), FindingIssue::InvalidScopeFormat)
                    .detail(INVALID_SCOPE_FORMAT_DETAIL),
            );
            continue;
        };

        let mut surfaces = BTreeSet::new();
        for entry in entries {
            let ScopeEntry::Prefix(raw) = entry else {
                counters.invalid_format += 1;
                findings.push(
                    Finding::new(subject(), FindingIssue::InvalidScopeEntry)
                        .detail(INVALID_SCOPE_ENTRY_DETAIL),
                );
                continue;
            };

            let scope = raw.trim();
            let class = policy.classify(scope);
            if class.is_wildcard {
                counters.wildcard += 1;
                findings.push(
                    Finding::new(subject(), FindingIssue::WildcardScopeDisallowed).scope(scope),
                );
            }
            if class.is_broad {
                counters.broad += 1;
                findings.push(
                    Finding::new(subject(), FindingIssue::BroadScopeDisallowed).scope(scope),
                );
            }
            if let Some(surface) = class.surface {
                surfaces.insert(surface);
            }
        }

        if ScopePolicy::is_multi_surface(&surfaces) {
            counters.multi_surface += 1;
            findings.push(
                Finding::new(subject(), FindingIssue::MultiSurfaceTupleDisallowed)
                    .surfaces(surfaces.into_iter().collect()),
            );
        }
    }

    let violations =
        counters.wildcard + counters.broad + counters.multi_surface + counters.invalid_format;
    CheckResult {
        status: CheckStatus::from_violations(violations),
        summary: Summary::new()
            .count("beads_tuples_scanned", counters.scanned)
            .count("wildcard_scope_violations", counters.wildcard)
            .count("broad_scope_violations", counters.broad)
            .count("multi_surface_tuple_violations", counters.multi_surface)
            .count("invalid_scope_format", counters.invalid_format)
            .count("malformed_entries_skipped", registry.malformed_entries),
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::inputs::parse_registry;
    use crate::policy::table::PolicyTable;
    use serde_json::json;

    fn run(doc: &serde_json::Value) -> CheckResult {
        let policy = PolicyTable::builtin().unwrap().scope;
        check_registry(&parse_registry(doc).unwrap(), &policy)
    }

    #[test]
    fn clean_registry_is_ok() {
        let result = run(&json!({"authority_tuples": [
            {"authority_id": "auth/beads_runner", "scope": ["scene/beads/runs/"]},
            {"authority_id": "auth/unrelated", "scope": ["scene/"]}
        ]}));
        assert_eq!(result.status, CheckStatus::Ok);
        assert_eq!(result.summary.get_count("beads_tuples_scanned"), 1);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn wildcard_scope_warns() {
        let result = run(&json!({"authority_tuples": [
            {"authority_id": "auth/beads_x", "scope": ["scene/beads/*"]}
        ]}));
        assert_eq!(result.status, CheckStatus::Warning);
        assert_eq!(result.summary.get_count("wildcard_scope_violations"), 1);
        assert_eq!(result.findings[0].issue, FindingIssue::WildcardScopeDisallowed);
        assert_eq!(result.findings[0].scope.as_deref(), Some("scene/beads/*"));
    }

    #[test]
    fn multi_surface_finding_has_sorted_surfaces() {
        let result = run(&json!({"authority_tuples": [
            {"authority_id": "auth/beads_both", "scope": ["state/beads/y/", "scene/beads/x/"]}
        ]}));
        assert_eq!(result.status, CheckStatus::Warning);
        let finding = &result.findings[0];
        assert_eq!(finding.issue, FindingIssue::MultiSurfaceTupleDisallowed);
        assert_eq!(
            finding.surfaces.as_deref(),
            Some(&["scene/beads/".to_string(), "state/beads/".to_string()][..])
        );
    }

    #[test]
    fn broad_scope_detected_after_trim() {
        let result = run(&json!({"authority_tuples": [
            {"authority_id": "auth/beads_b", "scope": ["  state  "]}
        ]}));
        assert_eq!(result.summary.get_count("broad_scope_violations"), 1);
        assert_eq!(result.findings[0].scope.as_deref(), Some("state"));
    }

    #[test]
    fn invalid_scope_shapes_are_counted() {
        let result = run(&json!({"authority_tuples": [
            {"authority_id": "auth/beads_s", "scope": "scene/beads/"},
            {"authority_id": "auth/beads_t", "scope": ["scene/beads/a/", 5]}
        ]}));
        assert_eq!(result.summary.get_count("invalid_scope_format"), 2);
        assert_eq!(result.findings[0].issue, FindingIssue::InvalidScopeFormat);
        assert_eq!(
            result.findings[0].detail.as_deref(),
            Some(INVALID_SCOPE_FORMAT_DETAIL)
        );
        assert_eq!(result.findings[1].issue, FindingIssue::InvalidScopeEntry);
    }

    #[test]
    fn scope_prefix_alone_makes_tuple_relevant() {
        let result = run(&json!({"authority_tuples": [
            {"scope": ["scene/beads/q/", "scene/mailbox/"]},
            "garbage"
        ]}));
        assert_eq!(result.summary.get_count("beads_tuples_scanned"), 1);
        assert_eq!(result.summary.get_count("malformed_entries_skipped"), 1);
        assert_eq!(
            result.findings[0].subject,
            FindingSubject::Authority("unknown_1".to_string())
        );
    }
}
