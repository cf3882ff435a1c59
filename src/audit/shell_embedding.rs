//! Shell embedding audit: python heredoc blocks inside bash scripts.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::AuditContext;
use crate::audit::report::{
    AuditReport, CheckResult, CheckStatus, ReportStatus, Stamp, Summary, percentage,
};
use crate::core::config::ShellConfig;
use crate::core::errors::Result;
use crate::core::paths::repo_relative;
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};
use crate::scanner::heredoc::{BlockStats, HeredocBlock, HeredocScanner};
use crate::scanner::walker::{is_bash_script, read_text, walk_files};

/// Report kind and artifact id stem.
pub const KIND: &str = "shell_embedding_audit";

/// Top-level counters, in report order.
pub const SUMMARY_KEYS: &[&str] = &[
    "total_bash_scripts",
    "bash_with_embedded_python",
    "embedded_python_pct",
    "embedded_python_blocks",
    "embedded_python_lines_total",
    "max_block_lines",
    "unclosed_blocks",
];

/// Remediation hints.
pub const NEXT_ACTIONS: &[&str] = &[
    "Extract largest embedded python blocks (>140 lines) into scripts/*.py modules.",
    "Prefer shared python modules for repeated JSON mutation logic across bash wrappers.",
    "Keep inline python for short, single-purpose glue code only.",
];

/// A bash script carrying at least one embedded block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offender {
    /// Repo-relative script path.
    pub path: String,
    /// Block count.
    pub embedded_python_blocks: usize,
    /// Body lines across all blocks.
    pub embedded_python_lines_total: usize,
    /// Longest block body.
    pub max_block_lines: usize,
    /// Every block, in file order.
    pub blocks: Vec<HeredocBlock>,
}

impl Offender {
    fn new(path: String, blocks: Vec<HeredocBlock>) -> Self {
        let stats = BlockStats::of(&blocks);
        Self {
            path,
            embedded_python_blocks: stats.blocks,
            embedded_python_lines_total: stats.lines_total,
            max_block_lines: stats.max_block_lines,
            blocks,
        }
    }
}

/// Corpus-wide result of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddingScan {
    /// Bash scripts found.
    pub total_bash_scripts: usize,
    /// Scripts that could not be read.
    pub unreadable: usize,
    /// Scripts with at least one block, in walk order.
    pub offenders: Vec<Offender>,
}

impl EmbeddingScan {
    /// Block statistics across every offender.
    #[must_use]
    pub fn totals(&self) -> BlockStats {
        let blocks: Vec<HeredocBlock> = self
            .offenders
            .iter()
            .flat_map(|o| o.blocks.iter().cloned())
            .collect();
        BlockStats::of(&blocks)
    }

    /// `n` offenders with the largest `(max_block_lines, lines_total)`, descending.
    #[must_use]
    pub fn top_offenders(&self, n: usize) -> Vec<&Offender> {
        let mut ranked: Vec<&Offender> = self.offenders.iter().collect();
        ranked.sort_by_key(|o| Reverse((o.max_block_lines, o.embedded_python_lines_total)));
        ranked.truncate(n);
        ranked
    }
}

/// Scan `scripts` (absolute paths under `repo_root`) for embedded blocks.
///
/// Unreadable scripts still count toward the bash total.
pub fn scan_scripts(
    scripts: &[PathBuf],
    repo_root: &Path,
    scanner: &HeredocScanner,
) -> EmbeddingScan {
    let mut scan = EmbeddingScan {
        total_bash_scripts: scripts.len(),
        ..EmbeddingScan::default()
    };
    for path in scripts {
        let Ok(text) = read_text(path) else {
            scan.unreadable += 1;
            continue;
        };
        let blocks = scanner.scan(&text);
        if !blocks.is_empty() {
            scan.offenders
                .push(Offender::new(repo_relative(repo_root, path), blocks));
        }
    }
    scan
}

/// Human-readable reasons for a warning, in fixed order.
#[must_use]
pub fn alerts(totals: &BlockStats, embedded_pct: f64, cfg: &ShellConfig) -> Vec<String> {
    let mut out = Vec::new();
    if totals.unclosed > 0 {
        out.push("Found unclosed python heredoc block(s) in bash scripts.".to_string());
    }
    if totals.max_block_lines > cfg.max_block_lines_warn_gt {
        out.push(format!(
            "At least one embedded python block exceeds {} lines.",
            cfg.max_block_lines_warn_gt
        ));
    }
    if embedded_pct > cfg.embedded_pct_warn_gt {
        out.push(format!(
            "More than {}% of bash scripts embed python blocks.",
            cfg.embedded_pct_warn_gt
        ));
    }
    out
}

/// Walk the repository and assemble the report.
pub fn run(ctx: &AuditContext<'_>, log: &mut ActivityLog) -> Result<AuditReport> {
    ctx.run_logged(KIND, log, build)
}

fn build(ctx: &AuditContext<'_>, log: &mut ActivityLog) -> Result<AuditReport> {
    let cfg = &ctx.config.shell;
    let scripts: Vec<PathBuf> = walk_files(ctx.repo_root, &cfg.excluded_dirs)
        .into_iter()
        .filter(|p| is_bash_script(p))
        .collect();
    let scan = scan_scripts(&scripts, ctx.repo_root, &ctx.policy.heredoc);
    if scan.unreadable > 0 {
        log.log(
            &LogEntry::new(EventType::ArtifactSkipped, Severity::Warning)
                .audit(KIND)
                .count(scan.unreadable)
                .details("unreadable bash scripts"),
        );
    }

    let totals = scan.totals();
    let embedded_pct = percentage(scan.offenders.len(), scan.total_bash_scripts);
    let alerts = alerts(&totals, embedded_pct, cfg);
    let top: Vec<Offender> = scan
        .top_offenders(cfg.top_offenders)
        .into_iter()
        .cloned()
        .collect();

    let check = CheckResult {
        status: CheckStatus::from_violations(alerts.len()),
        summary: Summary::new()
            .count("total_bash_scripts", scan.total_bash_scripts)
            .count("bash_with_embedded_python", scan.offenders.len())
            .pct("embedded_python_pct", embedded_pct)
            .count("embedded_python_blocks", totals.blocks)
            .count("embedded_python_lines_total", totals.lines_total)
            .count("max_block_lines", totals.max_block_lines)
            .count("unclosed_blocks", totals.unclosed),
        findings: scan.offenders,
    };

    let summary = Summary::assemble(SUMMARY_KEYS, &[&check.summary])?;
    let report = ctx
        .assembler
        .begin(KIND, Stamp::Date)
        .summary(summary)
        .check("embedded_python_blocks", &check)?
        .section("alerts", &alerts)?
        .section(
            "thresholds",
            &json!({
                "embedded_python_pct_warn_gt": cfg.embedded_pct_warn_gt,
                "max_block_lines_warn_gt": cfg.max_block_lines_warn_gt,
                "unclosed_blocks_warn_gt": 0,
            }),
        )?
        .section("top_offenders", &top)?
        .next_actions(NEXT_ACTIONS)
        .status(ReportStatus::Check(check.status));
    Ok(report)
}
