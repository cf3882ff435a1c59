//! Vision alignment audit: share of non-trivial session artifacts linked to a canonical
//! principle.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::audit::AuditContext;
use crate::audit::inputs::{LoadOutcome, SessionArtifact, load_json};
use crate::audit::kpi::{KpiOutcome, KpiThresholds, evaluate};
use crate::audit::report::{AuditReport, CheckResult, CheckStatus, KpiStatus, ReportStatus, Stamp, Summary};
use crate::core::errors::{GvaError, Result};
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};
use crate::scanner::walker::files_with_extension;

/// Report kind and artifact id stem.
pub const KIND: &str = "vision_alignment_audit";
/// Reported KPI name.
pub const KPI_NAME: &str = "principle_linked_artifact_pct";
/// Reported KPI definition.
pub const KPI_DEFINITION: &str =
    "Percent of non-trivial session artifacts with >=1 canonical principle link";
/// Per-tool index file, read for canonical ids.
pub const INDEX_FILE: &str = "index.json";

/// Top-level counters, in report order.
pub const SUMMARY_KEYS: &[&str] = &[
    "total_artifacts_scanned",
    "artifacts_skipped",
    "canonical_principle_ids_detected",
    "eligible_artifacts",
    "artifacts_with_principle_link",
    "value_pct",
];

/// Remediation hints.
pub const NEXT_ACTIONS: &[&str] = &[
    "Require >=2 principle links in closeout unless explicitly justified",
    "Add canonical principle IDs to artifacts currently missing principle links",
    "Track week-over-week trend for principle_linked_artifact_pct",
];

#[derive(Debug, Clone, Serialize)]
struct KpiTargets {
    pass: String,
    stretch: String,
}

#[derive(Debug, Clone, Serialize)]
struct KpiSection {
    name: &'static str,
    definition: &'static str,
    eligible_artifacts: usize,
    artifacts_with_principle_link: usize,
    value_pct: f64,
    targets: KpiTargets,
    status: KpiStatus,
}

#[derive(Debug, Clone, Serialize)]
struct CoverageSection<'a> {
    total_artifacts_scanned: usize,
    artifacts_skipped: usize,
    canonical_principle_ids_detected: usize,
    artifacts_missing_principle_link: &'a [String],
}

/// Node ids with `prefix` across `<scenes_dir>/*.scene.json`. Unreadable scenes are ignored.
#[must_use]
pub fn canonical_principle_ids(scenes_dir: &Path, prefix: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let scenes = files_with_extension(scenes_dir, "json")
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".scene.json"))
        });
    for path in scenes {
        let LoadOutcome::Loaded(doc) = load_json(&path) else {
            continue;
        };
        let Some(nodes) = doc.get("nodes").and_then(Value::as_array) else {
            continue;
        };
        out.extend(
            nodes
                .iter()
                .filter_map(|node| node.get("id").and_then(Value::as_str))
                .filter(|id| id.starts_with(prefix))
                .map(str::to_string),
        );
    }
    out
}

/// Session artifacts loaded from `<sessions_dir>/<tool>/*.json`.
#[derive(Debug, Clone, Default)]
pub struct ArtifactCorpus {
    /// Parsed, identified artifacts in load order.
    pub artifacts: Vec<SessionArtifact>,
    /// Files that failed to parse, were not objects, or carried no identifier.
    pub skipped: Vec<PathBuf>,
}

/// Tool directories in sorted order, index files excluded.
pub fn load_session_artifacts(sessions_dir: &Path) -> Result<ArtifactCorpus> {
    let read_dir = fs::read_dir(sessions_dir).map_err(|e| GvaError::io(sessions_dir, e))?;
    let mut tool_dirs: Vec<PathBuf> = read_dir
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    tool_dirs.sort();

    let mut corpus = ArtifactCorpus::default();
    for dir in tool_dirs {
        for path in files_with_extension(&dir, "json") {
            if path.file_name().is_some_and(|n| n == INDEX_FILE) {
                continue;
            }
            let parsed = match load_json(&path) {
                LoadOutcome::Loaded(value) => SessionArtifact::from_value(&value),
                _ => None,
            };
            match parsed.filter(|a| a.identifier().is_some()) {
                Some(artifact) => corpus.artifacts.push(artifact),
                None => corpus.skipped.push(path),
            }
        }
    }
    Ok(corpus)
}

/// Load the session corpus and evaluate the KPI; `sessions_dir` overrides configuration.
pub fn run(ctx: &AuditContext<'_>, log: &mut ActivityLog, sessions_dir: Option<&Path>) -> Result<AuditReport> {
    ctx.run_logged(KIND, log, |ctx, log| build(ctx, log, sessions_dir))
}

fn build(ctx: &AuditContext<'_>, log: &mut ActivityLog, sessions_dir: Option<&Path>) -> Result<AuditReport> {
    let cfg = &ctx.config.vision;
    let sessions_dir = ctx.resolve(sessions_dir.unwrap_or(&cfg.sessions_dir));
    let thresholds = KpiThresholds {
        pass_pct: cfg.pass_pct,
        stretch_pct: cfg.stretch_pct,
    };
    let canonical = canonical_principle_ids(&ctx.resolve(&cfg.scenes_dir), &cfg.principle_prefix);

    let mut input_warnings = Vec::new();
    let corpus = if sessions_dir.is_dir() {
        load_session_artifacts(&sessions_dir)?
    } else {
        let warning = format!("missing: {}", ctx.display(&sessions_dir));
        ctx.note_input_problem(log, KIND, &warning);
        input_warnings.push(warning);
        ArtifactCorpus::default()
    };
    for path in &corpus.skipped {
        log.log(
            &LogEntry::new(EventType::ArtifactSkipped, Severity::Warning)
                .audit(KIND)
                .path(ctx.display(path))
                .details("not an identified JSON object"),
        );
    }

    let outcome: KpiOutcome = evaluate(&corpus.artifacts, &canonical, thresholds);
    let check_status = if !input_warnings.is_empty() {
        CheckStatus::InsufficientInput
    } else if outcome.status == KpiStatus::Fail {
        CheckStatus::Warning
    } else {
        CheckStatus::Ok
    };

    let check = CheckResult {
        status: check_status,
        summary: Summary::new()
            .count("total_artifacts_scanned", corpus.artifacts.len())
            .count("artifacts_skipped", corpus.skipped.len())
            .count("canonical_principle_ids_detected", canonical.len())
            .count("eligible_artifacts", outcome.eligible)
            .count("artifacts_with_principle_link", outcome.satisfied)
            .pct("value_pct", outcome.value_pct),
        findings: outcome.missing_link_ids.clone(),
    };

    let kpi = KpiSection {
        name: KPI_NAME,
        definition: KPI_DEFINITION,
        eligible_artifacts: outcome.eligible,
        artifacts_with_principle_link: outcome.satisfied,
        value_pct: outcome.value_pct,
        targets: KpiTargets {
            pass: format!(">={}%", cfg.pass_pct),
            stretch: format!(">={}%", cfg.stretch_pct),
        },
        status: outcome.status,
    };
    let coverage = CoverageSection {
        total_artifacts_scanned: corpus.artifacts.len(),
        artifacts_skipped: corpus.skipped.len(),
        canonical_principle_ids_detected: canonical.len(),
        artifacts_missing_principle_link: &outcome.missing_link_ids,
    };

    let status = if check_status == CheckStatus::InsufficientInput {
        ReportStatus::Check(CheckStatus::InsufficientInput)
    } else {
        ReportStatus::Kpi(outcome.status)
    };

    let summary = Summary::assemble(SUMMARY_KEYS, &[&check.summary])?;
    let report = ctx
        .assembler
        .begin(KIND, Stamp::Date)
        .input("sessions_dir", ctx.display(&sessions_dir))
        .summary(summary)
        .check("principle_link_kpi", &check)?
        .section("kpi", &kpi)?
        .section("coverage", &coverage)?
        .section("input_warnings", &input_warnings)?
        .next_actions(NEXT_ACTIONS)
        .status(status);
    Ok(report)
}
