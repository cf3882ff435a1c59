//! Track-only governance audits.
//!
//! Each audit reads fixed inputs, runs independent checks through the scanning and policy
//! primitives, and produces one [`report::AuditReport`]. Audits never mutate what they
//! inspect and never call each other.

pub mod beads_boundary;
pub mod inputs;
pub mod kpi;
pub mod materialization;
pub mod namespace_boundary;
pub mod registry;
pub mod report;
pub mod secret_scan;
pub mod shell_embedding;
pub mod vision_alignment;

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::core::paths::{repo_relative, resolve_in_repo};
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};
use crate::policy::table::PolicyTable;
use report::{AuditReport, ReportAssembler};

/// Everything an audit needs besides its own options.
pub struct AuditContext<'a> {
    /// Root every configured path resolves against.
    pub repo_root: &'a Path,
    /// Effective configuration.
    pub config: &'a Config,
    /// Compiled policy table.
    pub policy: &'a PolicyTable,
    /// Report metadata and clock.
    pub assembler: ReportAssembler,
}

impl AuditContext<'_> {
    /// Resolve a configured or user-supplied path against the repository root.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_in_repo(self.repo_root, path)
    }

    /// Repository-relative display form of `path`.
    #[must_use]
    pub fn display(&self, path: &Path) -> String {
        repo_relative(self.repo_root, path)
    }

    /// Run `audit` bracketed by start/complete activity events.
    pub fn run_logged<F>(&self, kind: &str, log: &mut ActivityLog, audit: F) -> Result<AuditReport>
    where
        F: FnOnce(&Self, &mut ActivityLog) -> Result<AuditReport>,
    {
        log.log(&LogEntry::new(EventType::AuditStart, Severity::Info).audit(kind));
        let started = Instant::now();
        match audit(self, log) {
            Ok(report) => {
                let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                log.log(
                    &LogEntry::new(EventType::AuditComplete, Severity::Info)
                        .audit(kind)
                        .status(report.status.as_str())
                        .duration_ms(elapsed),
                );
                Ok(report)
            }
            Err(err) => {
                log.log(
                    &LogEntry::new(EventType::Error, Severity::Critical)
                        .audit(kind)
                        .error(&err),
                );
                Err(err)
            }
        }
    }

    /// Persist `report` at `out_file` (resolved against the repo root).
    pub fn write_report(
        &self,
        report: &AuditReport,
        out_file: &Path,
        log: &mut ActivityLog,
    ) -> Result<PathBuf> {
        let path = self.resolve(out_file);
        report.write_to(&path)?;
        log.log(
            &LogEntry::new(EventType::ReportWritten, Severity::Info)
                .path(self.display(&path))
                .status(report.status.as_str()),
        );
        Ok(path)
    }

    /// Record an input problem that degrades a check.
    pub fn note_input_problem(&self, log: &mut ActivityLog, kind: &str, warning: &str) {
        let event = if warning.starts_with("missing:") {
            EventType::InputMissing
        } else {
            EventType::InputInvalid
        };
        log.log(
            &LogEntry::new(event, Severity::Warning)
                .audit(kind)
                .details(warning),
        );
    }
}
