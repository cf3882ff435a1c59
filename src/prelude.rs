//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use governance_audit::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{GvaError, Result};

// Logging
pub use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};

// Scanner
pub use crate::scanner::heredoc::{BlockStats, HeredocBlock, HeredocScanner};
pub use crate::scanner::patterns::{ExampleHints, PatternRule, Redactor, RuleSet};

// Policy
pub use crate::policy::scope::{ScopeClass, ScopePolicy};
pub use crate::policy::table::PolicyTable;

// Audits
pub use crate::audit::AuditContext;
pub use crate::audit::kpi::{KpiOutcome, KpiThresholds};
pub use crate::audit::report::{
    AuditReport, CheckResult, CheckStatus, KpiStatus, ReportAssembler, ReportStatus, Summary,
};

// Index
pub use crate::index::artifact_id::{infer_filename, slugify};
pub use crate::index::rebuild::{IndexFormat, rebuild_index};
pub use crate::index::store::ArtifactStore;

// Benchmark
pub use crate::benchmark::client::{DryRunClient, ModelClient};
pub use crate::benchmark::runner::{BenchmarkOptions, RunSummary};
