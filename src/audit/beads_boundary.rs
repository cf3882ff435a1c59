//! Beads boundary audit: registry churn guardrail + materialization guardrail.

use std::path::{Path, PathBuf};

use crate::audit::AuditContext;
use crate::audit::inputs::{LoadOutcome, load_json, parse_merge_queue, parse_registry};
use crate::audit::materialization::{MATERIALIZATION_SUMMARY_KEYS, check_materialization};
use crate::audit::registry::{REGISTRY_SUMMARY_KEYS, check_registry};
use crate::audit::report::{AuditReport, CheckResult, CheckStatus, ReportStatus, Stamp, Summary};
use crate::core::errors::Result;
use crate::logger::jsonl::ActivityLog;

/// Report kind and artifact id stem.
pub const KIND: &str = "beads_boundary_audit";

/// Top-level counters, in report order.
pub const SUMMARY_KEYS: &[&str] = &[
    "missing_required_inputs",
    "beads_tuples_scanned",
    "wildcard_scope_violations",
    "broad_scope_violations",
    "multi_surface_tuple_violations",
    "invalid_scope_format",
    "merge_items_scanned",
    "merged_items_scanned",
    "materialization_violations",
];

/// Remediation hints.
pub const NEXT_ACTIONS: &[&str] = &[
    "Split Beads-scoped authority tuples to one runtime surface per tuple if violations are present.",
    "Use repo-root-relative path prefixes only; do not use wildcards in Beads-scoped tuple scope.",
    "For merged runtime proposals, write a canonical resolution note in scenes/ and keep resolution_note_ref current.",
];

/// Input overrides; `None` uses the configured path.
#[derive(Debug, Clone, Default)]
pub struct BeadsOptions {
    /// Registry path override.
    pub registry_file: Option<PathBuf>,
    /// Merge queue path override.
    pub merge_queue_file: Option<PathBuf>,
}

/// `<output_dir>/beads_boundary_audit_<YYYY_MM_DD>_v0.json`
#[must_use]
pub fn default_out_file(ctx: &AuditContext<'_>) -> PathBuf {
    ctx.config
        .beads
        .output_dir
        .join(ctx.assembler.dated_file_name(KIND))
}

/// Run both guardrail checks and assemble the report.
pub fn run(ctx: &AuditContext<'_>, log: &mut ActivityLog, opts: &BeadsOptions) -> Result<AuditReport> {
    ctx.run_logged(KIND, log, |ctx, log| build(ctx, log, opts))
}

fn build(ctx: &AuditContext<'_>, log: &mut ActivityLog, opts: &BeadsOptions) -> Result<AuditReport> {
    let registry_path = ctx.resolve(
        opts.registry_file
            .as_deref()
            .unwrap_or(&ctx.config.beads.registry_file),
    );
    let queue_path = ctx.resolve(
        opts.merge_queue_file
            .as_deref()
            .unwrap_or(&ctx.config.beads.merge_queue_file),
    );
    let mut warnings = Vec::new();

    let registry_result = match load_control(ctx, &registry_path, &mut warnings) {
        Some(value) => match parse_registry(&value) {
            Ok(registry) => check_registry(&registry, &ctx.policy.scope),
            Err(shape) => {
                warnings.push(shape.warning(&ctx.display(&registry_path)));
                CheckResult::insufficient(REGISTRY_SUMMARY_KEYS)
            }
        },
        None => CheckResult::insufficient(REGISTRY_SUMMARY_KEYS),
    };

    let materialization_result = match load_control(ctx, &queue_path, &mut warnings) {
        Some(value) => match parse_merge_queue(&value) {
            Ok(queue) => check_materialization(&queue, &ctx.policy.scope, ctx.repo_root),
            Err(shape) => {
                warnings.push(shape.warning(&ctx.display(&queue_path)));
                CheckResult::insufficient(MATERIALIZATION_SUMMARY_KEYS)
            }
        },
        None => CheckResult::insufficient(MATERIALIZATION_SUMMARY_KEYS),
    };

    for warning in &warnings {
        ctx.note_input_problem(log, KIND, warning);
    }

    let meta = Summary::new().count("missing_required_inputs", warnings.len());
    let summary = Summary::assemble(
        SUMMARY_KEYS,
        &[
            &meta,
            &registry_result.summary,
            &materialization_result.summary,
        ],
    )?;
    let status =
        CheckStatus::most_severe([registry_result.status, materialization_result.status]);

    let report = ctx
        .assembler
        .begin(KIND, Stamp::Timestamp)
        .input("authority_registry", ctx.display(&registry_path))
        .input("merge_queue", ctx.display(&queue_path))
        .summary(summary)
        .check("registry_churn_guardrail", &registry_result)?
        .check("materialization_guardrail", &materialization_result)?
        .section("input_warnings", &warnings)?
        .next_actions(NEXT_ACTIONS)
        .status(ReportStatus::Check(status));
    Ok(report)
}

/// Load a control input, recording a warning when it is unusable.
fn load_control(
    ctx: &AuditContext<'_>,
    path: &Path,
    warnings: &mut Vec<String>,
) -> Option<serde_json::Value> {
    let outcome = load_json(path);
    if let Some(warning) = outcome.warning(&ctx.display(path)) {
        warnings.push(warning);
    }
    match outcome {
        LoadOutcome::Loaded(value) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::test_support::context;
    use crate::core::config::Config;
    use crate::policy::table::PolicyTable;
    use serde_json::{Value, json};
    use std::fs;

    fn write(root: &Path, rel: &str, value: &Value) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    fn run_in(root: &Path) -> Value {
        let config = Config::default();
        let policy = PolicyTable::builtin().unwrap();
        let ctx = context(root, &config, &policy);
        let report = run(&ctx, &mut ActivityLog::disabled(), &BeadsOptions::default()).unwrap();
        serde_json::to_value(&report).unwrap()
    }

    #[test]
    fn missing_inputs_are_insufficient_not_ok() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_in(dir.path());
        assert_eq!(report["status"], "insufficient_input");
        assert_eq!(report["summary"]["missing_required_inputs"], 2);
        assert_eq!(
            report["input_warnings"][0],
            "missing: scene/authority/registry_v0.json"
        );
        assert_eq!(
            report["checks"]["registry_churn_guardrail"]["status"],
            "insufficient_input"
        );
        assert_eq!(report["inputs"]["merge_queue"], "scene/merge_queue/queue_v0.json");
    }

    #[test]
    fn insufficient_input_outranks_warning() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "scene/authority/registry_v0.json",
            &json!({"authority_tuples": [{"authority_id": "auth/beads_a", "scope": ["scene/beads/*"]}]}),
        );
        let report = run_in(dir.path());
        assert_eq!(report["checks"]["registry_churn_guardrail"]["status"], "warning");
        assert_eq!(report["status"], "insufficient_input");
        assert_eq!(report["summary"]["wildcard_scope_violations"], 1);
    }

    #[test]
    fn clean_inputs_produce_ok_report() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "scene/authority/registry_v0.json",
            &json!({"authority_tuples": [{"authority_id": "auth/beads_a", "scope": ["scene/beads/q/"]}]}),
        );
        write(dir.path(), "scenes/resolution.json", &json!({}));
        write(
            dir.path(),
            "scene/merge_queue/queue_v0.json",
            &json!({"items": [{"merge_id": "m1", "status": "merged", "resolution_note_ref": "scenes/resolution.json"}]}),
        );
        let report = run_in(dir.path());
        assert_eq!(report["status"], "ok");
        assert_eq!(report["artifact_id"], "artifact/beads_boundary_audit_2026_02_11_v0");
        assert_eq!(report["audit_timestamp"], "2026-02-11T09:30:05+00:00");
        assert_eq!(report["input_warnings"], json!([]));
        let keys: Vec<&String> = report["summary"].as_object().unwrap().keys().collect();
        assert_eq!(keys, SUMMARY_KEYS.to_vec());
        assert_eq!(report["next_actions"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn bad_shape_degrades_only_that_check() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "scene/authority/registry_v0.json", &json!(["not", "object"]));
        write(
            dir.path(),
            "scene/merge_queue/queue_v0.json",
            &json!({"items": [{"merge_id": "m1", "status": "merged", "resolution_note_ref": "./x"}]}),
        );
        let report = run_in(dir.path());
        assert_eq!(
            report["checks"]["registry_churn_guardrail"]["status"],
            "insufficient_input"
        );
        assert_eq!(report["checks"]["materialization_guardrail"]["status"], "warning");
        assert!(
            report["input_warnings"][0]
                .as_str()
                .unwrap()
                .starts_with("invalid_shape: scene/authority/registry_v0.json")
        );
        assert_eq!(report["status"], "insufficient_input");
    }

    #[test]
    fn malformed_json_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene/merge_queue/queue_v0.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        let report = run_in(dir.path());
        let warnings = report["input_warnings"].as_array().unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| w.as_str().unwrap().starts_with("invalid_json: scene/merge_queue/queue_v0.json"))
        );
    }

    #[test]
    fn default_out_file_is_dated() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let policy = PolicyTable::builtin().unwrap();
        let ctx = context(dir.path(), &config, &policy);
        assert_eq!(
            default_out_file(&ctx),
            PathBuf::from("scene/audit_reports/v0/beads_boundary_audit_2026_02_11_v0.json")
        );
    }
}
