#![forbid(unsafe_code)]

//! Governance Audit (gva): track-only structural auditors for agent-maintained
//! repositories.
//!
//! Every audit reads a fixed set of inputs, runs independent checks, and emits one
//! deterministic JSON report with status `ok`, `warning`, or `insufficient_input`
//! (KPI audits use `pass`, `stretch`, or `fail`). Nothing an audit inspects is ever
//! modified.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use governance_audit::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use governance_audit::core::config::Config;
//! use governance_audit::scanner::heredoc::HeredocScanner;
//! ```

pub mod prelude;

pub mod audit;
pub mod benchmark;
pub mod core;
pub mod index;
pub mod logger;
pub mod policy;
pub mod scanner;
