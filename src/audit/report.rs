//! Report contract and assembler.
//!
//! Every audit emits one [`AuditReport`]: fixed metadata, a flat summary assembled from
//! an explicit key list, named check blocks, audit-specific sections, and static
//! remediation hints. Reports are written with 2-space indentation and a trailing newline.

use std::fs;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::config::ReportConfig;
use crate::core::errors::{GvaError, Result};

/// Check-level verdict. Declaration order is severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Nothing to flag.
    Ok,
    /// At least one violation.
    Warning,
    /// A required input was missing or unusable.
    InsufficientInput,
}

impl CheckStatus {
    /// Most severe status under `insufficient_input > warning > ok`; empty input is `ok`.
    pub fn most_severe<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        statuses.into_iter().max().unwrap_or(Self::Ok)
    }

    /// `warning` when any counter is nonzero, else `ok`.
    #[must_use]
    pub fn from_violations(violations: usize) -> Self {
        if violations > 0 { Self::Warning } else { Self::Ok }
    }

    /// Serialized name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::InsufficientInput => "insufficient_input",
        }
    }
}

/// Three-way KPI bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiStatus {
    /// Below the pass threshold.
    Fail,
    /// At or above the pass threshold.
    Pass,
    /// At or above the stretch threshold.
    Stretch,
}

impl KpiStatus {
    /// Serialized name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Pass => "pass",
            Self::Stretch => "stretch",
        }
    }
}

/// Top-level report status: a check verdict or a KPI bucket depending on the audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportStatus {
    /// Guardrail audits.
    Check(CheckStatus),
    /// KPI audits.
    Kpi(KpiStatus),
}

impl ReportStatus {
    /// Serialized name of the inner status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Check(s) => s.as_str(),
            Self::Kpi(s) => s.as_str(),
        }
    }
}

/// Flat, ordered counter mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary(Map<String, Value>);

impl Summary {
    /// Empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an integer counter.
    #[must_use]
    pub fn count(mut self, key: &str, value: usize) -> Self {
        self.0.insert(key.to_string(), Value::from(value));
        self
    }

    /// Insert a percentage rounded to 2 decimals.
    #[must_use]
    pub fn pct(mut self, key: &str, value: f64) -> Self {
        self.0.insert(key.to_string(), Value::from(round2(value)));
        self
    }

    /// Raw value at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Counter at `key`, zero when absent or not an integer.
    #[must_use]
    pub fn get_count(&self, key: &str) -> usize {
        self.0
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
    }

    /// Project `keys`, in order, from the first part that carries each key.
    ///
    /// A key absent from every part is an assembly bug and fails loudly.
    pub fn assemble(keys: &[&str], parts: &[&Self]) -> Result<Self> {
        let mut out = Map::new();
        for key in keys {
            let value = parts
                .iter()
                .find_map(|part| part.get(key))
                .ok_or_else(|| GvaError::Runtime {
                    details: format!("summary key {key:?} not produced by any check"),
                })?;
            out.insert((*key).to_string(), value.clone());
        }
        Ok(Self(out))
    }
}

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole * 100`, rounded to two decimals; 0.0 when `whole` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(100.0 * part as f64 / whole as f64)
    }
}

/// What a finding is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingSubject {
    /// Authority tuple, by `authority_id`.
    #[serde(rename = "authority_id")]
    Authority(String),
    /// Merge queue item, by `merge_id`.
    #[serde(rename = "merge_id")]
    MergeItem(String),
}

/// Violation kinds produced by the guardrail checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingIssue {
    /// Scope contains a wildcard.
    WildcardScopeDisallowed,
    /// Scope is a disallowed broad root.
    BroadScopeDisallowed,
    /// One tuple spans more than one surface.
    MultiSurfaceTupleDisallowed,
    /// `scope` is not an array.
    InvalidScopeFormat,
    /// A scope entry is not a string.
    InvalidScopeEntry,
    /// Merged item has no resolution note reference.
    MissingResolutionNoteRef,
    /// Reference is not a plain repo-relative path.
    NonCanonicalReferenceFormat,
    /// Reference points outside the canonical artifacts root.
    ResolutionNoteNotInScenes,
    /// Referenced note does not exist.
    ResolutionNoteMissingFile,
}

/// One violation, in scan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Subject identifier, flattened into the finding.
    #[serde(flatten)]
    pub subject: FindingSubject,
    /// Violation kind.
    pub issue: FindingIssue,
    /// Extra context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Offending scope entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Surfaces a multi-surface tuple touches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surfaces: Option<Vec<String>>,
    /// Offending reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_note_ref: Option<String>,
}

impl Finding {
    /// Finding with no optional context.
    #[must_use]
    pub fn new(subject: FindingSubject, issue: FindingIssue) -> Self {
        Self {
            subject,
            issue,
            detail: None,
            scope: None,
            surfaces: None,
            resolution_note_ref: None,
        }
    }

    /// Attach context.
    #[must_use]
    pub fn detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    /// Attach the offending scope.
    #[must_use]
    pub fn scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// Attach the touched surfaces.
    #[must_use]
    pub fn surfaces(mut self, surfaces: Vec<String>) -> Self {
        self.surfaces = Some(surfaces);
        self
    }

    /// Attach the offending reference.
    #[must_use]
    pub fn resolution_note_ref(mut self, reference: &str) -> Self {
        self.resolution_note_ref = Some(reference.to_string());
        self
    }
}

/// Result of one independent check. Guardrail checks use [`Finding`]; corpus scans carry
/// their own record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult<F = Finding> {
    /// Verdict for this check alone.
    pub status: CheckStatus,
    /// Check counters.
    pub summary: Summary,
    /// Violations in scan order.
    pub findings: Vec<F>,
}

impl<F> CheckResult<F> {
    /// A check whose input could not be loaded: zeroed counters, no findings.
    #[must_use]
    pub fn insufficient(summary_keys: &[&str]) -> Self {
        Self {
            status: CheckStatus::InsufficientInput,
            summary: summary_keys
                .iter()
                .fold(Summary::new(), |s, key| s.count(key, 0)),
            findings: Vec::new(),
        }
    }
}

/// How the report is dated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// `audit_date`: `YYYY-MM-DD`.
    Date,
    /// `audit_timestamp`: ISO-8601 UTC to the second.
    Timestamp,
}

/// Canonical report object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// `artifact/<kind>_<YYYY_MM_DD>_v0`.
    pub artifact_id: String,
    /// Set for date-stamped reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_date: Option<String>,
    /// Set for timestamp-stamped reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_timestamp: Option<String>,
    /// Logical scope from configuration.
    pub scope: String,
    /// Overall verdict.
    pub status: ReportStatus,
    /// Repo-relative paths of the inputs read.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub inputs: Map<String, Value>,
    /// Top-level counters.
    pub summary: Summary,
    /// Named check blocks.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub checks: Map<String, Value>,
    /// Audit-specific blocks (thresholds, matches, kpi, ...), emitted in insertion order.
    #[serde(flatten)]
    pub sections: Map<String, Value>,
    /// Static remediation hints.
    pub next_actions: Vec<String>,
    /// Fixed note that the audit is track-only.
    pub policy_note: String,
}

impl AuditReport {
    /// Record an input path.
    pub fn input(mut self, name: &str, repo_relative_path: String) -> Self {
        self.inputs
            .insert(name.to_string(), Value::String(repo_relative_path));
        self
    }

    /// Add a named check block.
    pub fn check<F: Serialize>(mut self, name: &str, result: &CheckResult<F>) -> Result<Self> {
        self.checks
            .insert(name.to_string(), serde_json::to_value(result)?);
        Ok(self)
    }

    /// Add an audit-specific section.
    pub fn section<T: Serialize>(mut self, name: &str, value: &T) -> Result<Self> {
        self.sections
            .insert(name.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Replace the summary.
    #[must_use]
    pub fn summary(mut self, summary: Summary) -> Self {
        self.summary = summary;
        self
    }

    /// Replace the status.
    #[must_use]
    pub fn status(mut self, status: ReportStatus) -> Self {
        self.status = status;
        self
    }

    /// Replace the remediation hints.
    #[must_use]
    pub fn next_actions(mut self, actions: &[&str]) -> Self {
        self.next_actions = actions.iter().map(|a| (*a).to_string()).collect();
        self
    }

    /// Pretty JSON with 2-space indentation and a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// Write the report, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| GvaError::io(parent, source))?;
        }
        fs::write(path, self.to_json_pretty()?).map_err(|source| GvaError::io(path, source))
    }
}

/// Stamps fixed metadata onto new reports. The clock is injected so output is reproducible.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    scope: String,
    policy_note: String,
    now: DateTime<Utc>,
}

impl ReportAssembler {
    /// Assembler stamping `cfg` metadata and dating reports at `now`.
    #[must_use]
    pub fn new(cfg: &ReportConfig, now: DateTime<Utc>) -> Self {
        Self {
            scope: cfg.scope.clone(),
            policy_note: cfg.policy_note.clone(),
            now,
        }
    }

    /// The injected clock.
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// `artifact/<kind>_<YYYY_MM_DD>_v0`.
    #[must_use]
    pub fn artifact_id(&self, kind: &str) -> String {
        format!("artifact/{}", self.dated_stem(kind))
    }

    /// `<kind>_<YYYY_MM_DD>_v0.json`, for reports stored one per day.
    #[must_use]
    pub fn dated_file_name(&self, kind: &str) -> String {
        format!("{}.json", self.dated_stem(kind))
    }

    fn dated_stem(&self, kind: &str) -> String {
        format!("{kind}_{}_v0", self.now.format("%Y_%m_%d"))
    }

    /// Fresh report for `kind` with status `ok` and empty content.
    #[must_use]
    pub fn begin(&self, kind: &str, stamp: Stamp) -> AuditReport {
        let (audit_date, audit_timestamp) = match stamp {
            Stamp::Date => (Some(self.now.format("%Y-%m-%d").to_string()), None),
            Stamp::Timestamp => (
                None,
                Some(self.now.to_rfc3339_opts(SecondsFormat::Secs, false)),
            ),
        };
        AuditReport {
            artifact_id: self.artifact_id(kind),
            audit_date,
            audit_timestamp,
            scope: self.scope.clone(),
            status: ReportStatus::Check(CheckStatus::Ok),
            inputs: Map::new(),
            summary: Summary::new(),
            checks: Map::new(),
            sections: Map::new(),
            next_actions: Vec::new(),
            policy_note: self.policy_note.clone(),
        }
    }
}
