//! Secret scan audit: tracked files checked for committed credentials.
//!
//! Every stored snippet passes through the redactor first; the raw secret never reaches
//! the report.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::AuditContext;
use crate::audit::report::{AuditReport, CheckResult, CheckStatus, ReportStatus, Stamp, Summary};
use crate::core::errors::Result;
use crate::core::paths::repo_relative;
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity as LogSeverity};
use crate::policy::table::SecretPolicy;
use crate::scanner::patterns::{LineVerdict, Severity, classify_line};
use crate::scanner::text::split_lines;
use crate::scanner::walker::{list_tracked_files, looks_binary, read_text};

/// Report kind and artifact id stem.
pub const KIND: &str = "secret_scan_audit";

/// Top-level counters, in report order.
pub const SUMMARY_KEYS: &[&str] = &[
    "tracked_files",
    "text_files_scanned",
    "binary_files_skipped",
    "read_errors",
    "matches_found",
    "high_confidence_matches",
    "example_hits_ignored",
    "max_matches",
];

/// Remediation hints.
pub const NEXT_ACTIONS: &[&str] = &[
    "If any match is real, rotate affected credential and remove it from tracked files immediately.",
    "Rewrite history only when a real secret was committed to tracked history.",
    "Keep secrets in untracked local env files and validate with recurring audits.",
];

/// One recorded (redacted) match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMatch {
    /// Repo-relative file path.
    pub path: String,
    /// 1-based line number.
    pub line: usize,
    /// Rule that fired.
    pub pattern_id: String,
    /// Rule severity.
    pub severity: Severity,
    /// Redacted, trimmed, bounded line excerpt.
    pub snippet: String,
}

/// Counters and matches from one pass over a file list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretTally {
    /// Files listed by git.
    pub tracked_files: usize,
    /// Files read as text.
    pub text_files_scanned: usize,
    /// Files skipped by the NUL sniff.
    pub binary_files_skipped: usize,
    /// Files that could not be sniffed or read.
    pub read_errors: usize,
    /// Secret-looking lines suppressed as example text.
    pub example_hits_ignored: usize,
    /// Recorded matches, capped.
    pub matches: Vec<SecretMatch>,
}

/// Scan `files` (absolute paths under `repo_root`), storing at most `max_matches` matches.
///
/// Once the cap is reached the rest of the current file is skipped; later files are
/// still counted.
pub fn scan_files(
    files: &[PathBuf],
    repo_root: &Path,
    policy: &SecretPolicy,
    max_matches: usize,
) -> SecretTally {
    let mut tally = SecretTally {
        tracked_files: files.len(),
        ..SecretTally::default()
    };

    for path in files {
        match looks_binary(path) {
            Ok(true) => {
                tally.binary_files_skipped += 1;
                continue;
            }
            Ok(false) => {}
            Err(_) => {
                tally.read_errors += 1;
                continue;
            }
        }
        let Ok(text) = read_text(path) else {
            tally.read_errors += 1;
            continue;
        };
        tally.text_files_scanned += 1;
        let rel = repo_relative(repo_root, path);

        for (idx, line) in split_lines(&text).into_iter().enumerate() {
            let hits = match classify_line(line, &policy.rules, &policy.hints) {
                LineVerdict::Clean => continue,
                LineVerdict::Ignored => {
                    tally.example_hits_ignored += 1;
                    continue;
                }
                LineVerdict::Matched(hits) => hits,
            };
            for hit in hits {
                if tally.matches.len() < max_matches {
                    tally.matches.push(SecretMatch {
                        path: rel.clone(),
                        line: idx + 1,
                        pattern_id: hit.rule_id.to_string(),
                        severity: hit.severity,
                        snippet: policy.redactor.snippet(line),
                    });
                }
            }
            if tally.matches.len() >= max_matches {
                break;
            }
        }
    }

    tally
}

/// Scan tracked files; `max_matches` overrides the configured cap.
pub fn run(ctx: &AuditContext<'_>, log: &mut ActivityLog, max_matches: Option<usize>) -> Result<AuditReport> {
    let max_matches = max_matches
        .unwrap_or(ctx.config.secrets.max_matches)
        .max(1);
    ctx.run_logged(KIND, log, |ctx, log| build(ctx, log, max_matches))
}

fn build(ctx: &AuditContext<'_>, log: &mut ActivityLog, max_matches: usize) -> Result<AuditReport> {
    let mut input_warnings = Vec::new();
    let check = match list_tracked_files(ctx.repo_root) {
        Ok(files) => {
            let tally = scan_files(&files, ctx.repo_root, &ctx.policy.secrets, max_matches);
            if tally.read_errors > 0 {
                log.log(
                    &LogEntry::new(EventType::ArtifactSkipped, LogSeverity::Warning)
                        .audit(KIND)
                        .count(tally.read_errors)
                        .details("unreadable tracked files"),
                );
            }
            let high = tally
                .matches
                .iter()
                .filter(|m| m.severity == Severity::High)
                .count();
            CheckResult {
                status: CheckStatus::from_violations(tally.matches.len()),
                summary: Summary::new()
                    .count("tracked_files", tally.tracked_files)
                    .count("text_files_scanned", tally.text_files_scanned)
                    .count("binary_files_skipped", tally.binary_files_skipped)
                    .count("read_errors", tally.read_errors)
                    .count("matches_found", tally.matches.len())
                    .count("high_confidence_matches", high)
                    .count("example_hits_ignored", tally.example_hits_ignored)
                    .count("max_matches", max_matches),
                findings: tally.matches,
            }
        }
        Err(err) => {
            let warning = format!("tracked_files_unavailable: {err}");
            ctx.note_input_problem(log, KIND, &warning);
            input_warnings.push(warning);
            let mut check = CheckResult::<SecretMatch>::insufficient(SUMMARY_KEYS);
            check.summary = check.summary.count("max_matches", max_matches);
            check
        }
    };

    let summary = Summary::assemble(SUMMARY_KEYS, &[&check.summary])?;
    let report = ctx
        .assembler
        .begin(KIND, Stamp::Date)
        .summary(summary)
        .check("tracked_secret_scan", &check)?
        .section("thresholds", &json!({"secret_matches_warn_gt": 0}))?
        .section("input_warnings", &input_warnings)?
        .next_actions(NEXT_ACTIONS)
        .status(ReportStatus::Check(check.status));
    Ok(report)
}
