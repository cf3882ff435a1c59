//! Namespace boundary audit: mutating tools must declare where they write.
//!
//! A script is a mutating candidate when any mutation-intent rule for its language matches
//! anywhere in its text. Candidates must declare `TARGET_NAMESPACE` and
//! `ALLOWED_PATH_PREFIXES`; a `mixed` namespace additionally needs `BOUNDARY_JUSTIFICATION`.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::AuditContext;
use crate::audit::report::{AuditReport, CheckResult, CheckStatus, ReportStatus, Stamp, Summary};
use crate::core::errors::Result;
use crate::core::paths::repo_relative;
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};
use crate::policy::table::{MutationPolicy, NamespacePatterns};
use crate::scanner::walker::{read_text, walk_files};

/// Report kind and artifact id stem.
pub const KIND: &str = "namespace_boundary_audit";

/// Top-level counters, in report order.
pub const SUMMARY_KEYS: &[&str] = &[
    "scripts_scanned",
    "mutating_tool_candidates",
    "declarations_complete",
    "missing_declaration_count",
];

/// Remediation hints.
pub const NEXT_ACTIONS: &[&str] = &[
    "Add TARGET_NAMESPACE and ALLOWED_PATH_PREFIXES to all mutating tools.",
    "Use TARGET_NAMESPACE=mixed only with explicit BOUNDARY_JUSTIFICATION.",
    "Re-run namespace audit each recurring audit loop and reduce missing declarations over time.",
];

/// Declared write namespace.
pub const TARGET_NAMESPACE: &str = "TARGET_NAMESPACE";
/// Declared path prefixes the script may write.
pub const ALLOWED_PATH_PREFIXES: &str = "ALLOWED_PATH_PREFIXES";
/// Required when the namespace is `mixed`.
pub const BOUNDARY_JUSTIFICATION: &str = "BOUNDARY_JUSTIFICATION";
/// Namespace value that spans several surfaces.
pub const MIXED_NAMESPACE: &str = "mixed";

/// Script language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    /// Shell script.
    Bash,
    /// Python script.
    Python,
}

impl ScriptType {
    /// Suffix or shebang based detection. Only `.sh` and `.py` files are candidates.
    #[must_use]
    pub fn detect(path: &Path, text: &str) -> Option<Self> {
        let ext = path.extension().and_then(|e| e.to_str());
        if ext == Some("sh")
            || text.starts_with("#!/usr/bin/env bash")
            || text.starts_with("#!/bin/bash")
        {
            Some(Self::Bash)
        } else if ext == Some("py")
            || text.starts_with("#!/usr/bin/env python3")
            || text.starts_with("#!/usr/bin/python3")
        {
            Some(Self::Python)
        } else {
            None
        }
    }

    fn namespace_pattern(self, patterns: &NamespacePatterns) -> &Regex {
        match self {
            Self::Bash => &patterns.bash,
            Self::Python => &patterns.python,
        }
    }
}

/// A mutating script with incomplete declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDeclaration {
    /// Repo-relative script path.
    pub path: String,
    /// Detected language.
    pub script_type: ScriptType,
    /// Declared namespace, if one was found.
    pub target_namespace_detected: Option<String>,
    /// Declaration fields not present, in fixed order.
    pub missing_fields: Vec<String>,
}

/// True when a line assigns `field` at the start (after indentation).
#[must_use]
pub fn declares(text: &str, field: &str) -> bool {
    text.lines().any(|line| {
        line.trim_start()
            .strip_prefix(field)
            .is_some_and(|rest| rest.trim_start().starts_with('='))
    })
}

/// Declared `TARGET_NAMESPACE` value; python requires a quoted literal.
#[must_use]
pub fn declared_namespace(
    script_type: ScriptType,
    text: &str,
    patterns: &NamespacePatterns,
) -> Option<String> {
    script_type
        .namespace_pattern(patterns)
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Declaration fields a mutating script is missing, in fixed order.
#[must_use]
pub fn missing_fields(text: &str, namespace: Option<&str>) -> Vec<String> {
    let mut missing = Vec::new();
    for field in [TARGET_NAMESPACE, ALLOWED_PATH_PREFIXES] {
        if !declares(text, field) {
            missing.push(field.to_string());
        }
    }
    if namespace == Some(MIXED_NAMESPACE) && !declares(text, BOUNDARY_JUSTIFICATION) {
        missing.push(BOUNDARY_JUSTIFICATION.to_string());
    }
    missing
}

/// Counters and findings from one pass over the candidate scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceScan {
    /// Scripts of a recognized language.
    pub scripts_scanned: usize,
    /// Scripts with mutation intent.
    pub mutating: usize,
    /// Mutating scripts with every required declaration.
    pub complete: usize,
    /// Files that could not be read.
    pub unreadable: usize,
    /// Mutating scripts with missing declarations.
    pub missing: Vec<MissingDeclaration>,
}

/// Candidate scripts: `.sh`/`.py` files under each script dir, sorted per dir.
#[must_use]
pub fn candidate_scripts(repo_root: &Path, script_dirs: &[PathBuf]) -> Vec<PathBuf> {
    script_dirs
        .iter()
        .flat_map(|dir| walk_files(&repo_root.join(dir), &[]))
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext == "sh" || ext == "py")
        })
        .collect()
}

/// Classify and check each script in order.
pub fn scan_scripts(scripts: &[PathBuf], repo_root: &Path, policy: &MutationPolicy) -> NamespaceScan {
    let mut scan = NamespaceScan::default();
    for path in scripts {
        let Ok(text) = read_text(path) else {
            scan.unreadable += 1;
            continue;
        };
        let Some(script_type) = ScriptType::detect(path, &text) else {
            continue;
        };
        scan.scripts_scanned += 1;

        let rules = match script_type {
            ScriptType::Bash => &policy.bash,
            ScriptType::Python => &policy.python,
        };
        if !rules.any_match(&text) {
            continue;
        }
        scan.mutating += 1;

        let namespace = declared_namespace(script_type, &text, &policy.namespace);
        let missing = missing_fields(&text, namespace.as_deref());
        if missing.is_empty() {
            scan.complete += 1;
        } else {
            scan.missing.push(MissingDeclaration {
                path: repo_relative(repo_root, path),
                script_type,
                target_namespace_detected: namespace,
                missing_fields: missing,
            });
        }
    }
    scan
}

/// Scan the configured script directories and assemble the report.
pub fn run(ctx: &AuditContext<'_>, log: &mut ActivityLog) -> Result<AuditReport> {
    ctx.run_logged(KIND, log, build)
}

fn build(ctx: &AuditContext<'_>, log: &mut ActivityLog) -> Result<AuditReport> {
    let scripts = candidate_scripts(ctx.repo_root, &ctx.config.namespace.script_dirs);
    let scan = scan_scripts(&scripts, ctx.repo_root, &ctx.policy.mutation);
    if scan.unreadable > 0 {
        log.log(
            &LogEntry::new(EventType::ArtifactSkipped, Severity::Warning)
                .audit(KIND)
                .count(scan.unreadable)
                .details("unreadable scripts"),
        );
    }

    let check = CheckResult {
        status: CheckStatus::from_violations(scan.missing.len()),
        summary: Summary::new()
            .count("scripts_scanned", scan.scripts_scanned)
            .count("mutating_tool_candidates", scan.mutating)
            .count("declarations_complete", scan.complete)
            .count("missing_declaration_count", scan.missing.len()),
        findings: scan.missing,
    };

    let summary = Summary::assemble(SUMMARY_KEYS, &[&check.summary])?;
    let report = ctx
        .assembler
        .begin(KIND, Stamp::Date)
        .summary(summary)
        .check("namespace_declarations", &check)?
        .section("thresholds", &json!({"missing_declaration_warn_gt": 0}))?
        .next_actions(NEXT_ACTIONS)
        .status(ReportStatus::Check(check.status));
    Ok(report)
}
