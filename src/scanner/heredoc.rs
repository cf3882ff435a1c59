//! Heredoc block scanner: finds interpreter blocks embedded in shell scripts.
//!
//! Single forward pass with an explicit cursor. A block opens on a line matching the
//! opener pattern (capture group 1 is the delimiter tag) and closes on the first later
//! line whose trimmed content equals the tag. An unclosed block runs to end-of-file and
//! ends the scan.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{GvaError, Result};
use crate::scanner::text::split_lines;

/// Default opener: a `python`/`python3` invocation feeding a heredoc.
pub const PYTHON_HEREDOC_OPENER: &str =
    r#"\bpython(?:3)?\b[^\n]*<<-?\s*['"]?([A-Za-z_][A-Za-z0-9_]*)['"]?"#;

/// One embedded block. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeredocBlock {
    /// Delimiter tag captured from the opener.
    pub tag: String,
    /// Line of the opener.
    pub start_line: usize,
    /// Line of the closing delimiter, or the last line of the file when unclosed.
    pub end_line: usize,
    /// Lines strictly between opener and closer (or to end-of-file).
    #[serde(rename = "python_lines")]
    pub line_count: usize,
    /// False when end-of-file was reached before the delimiter.
    pub closed: bool,
}

/// Compiled block scanner.
#[derive(Debug, Clone)]
pub struct HeredocScanner {
    opener: Regex,
}

impl HeredocScanner {
    /// Build a scanner from an opener pattern whose first capture group is the tag.
    pub fn new(opener: &str) -> Result<Self> {
        let regex = Regex::new(opener).map_err(|e| GvaError::InvalidPattern {
            rule_id: "heredoc_opener".to_string(),
            details: e.to_string(),
        })?;
        if regex.captures_len() < 2 {
            return Err(GvaError::InvalidPattern {
                rule_id: "heredoc_opener".to_string(),
                details: "opener must capture the delimiter tag in group 1".to_string(),
            });
        }
        Ok(Self { opener: regex })
    }

    /// Scanner for `python`/`python3` heredocs.
    pub fn python() -> Result<Self> {
        Self::new(PYTHON_HEREDOC_OPENER)
    }

    /// Blocks found in `text`, in file order.
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<HeredocBlock> {
        let lines = split_lines(text);
        let total = lines.len();
        let mut blocks = Vec::new();
        let mut i = 0;

        while i < total {
            let Some(tag) = self
                .opener
                .captures(lines[i])
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
            else {
                i += 1;
                continue;
            };

            let body_start = i + 1;
            let close = lines[body_start..]
                .iter()
                .position(|line| line.trim() == tag)
                .map(|offset| body_start + offset);

            let block = match close {
                Some(j) => {
                    let block = HeredocBlock {
                        tag,
                        start_line: i + 1,
                        end_line: j + 1,
                        line_count: j - body_start,
                        closed: true,
                    };
                    i = j + 1;
                    block
                }
                None => {
                    let block = HeredocBlock {
                        tag,
                        start_line: i + 1,
                        end_line: total,
                        line_count: total - body_start,
                        closed: false,
                    };
                    i = total;
                    block
                }
            };
            blocks.push(block);
        }

        blocks
    }
}

/// Aggregate statistics over the blocks of one script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// Number of blocks.
    pub blocks: usize,
    /// Sum of block body lines.
    pub lines_total: usize,
    /// Largest single block body.
    pub max_block_lines: usize,
    /// Blocks that ran to end-of-file.
    pub unclosed: usize,
}

impl BlockStats {
    /// Fold `blocks` into totals.
    #[must_use]
    pub fn of(blocks: &[HeredocBlock]) -> Self {
        blocks.iter().fold(Self::default(), |mut acc, b| {
            acc.blocks += 1;
            acc.lines_total += b.line_count;
            acc.max_block_lines = acc.max_block_lines.max(b.line_count);
            acc.unclosed += usize::from(!b.closed);
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_with(closed_body: usize, tail_unclosed: bool) -> String {
        let mut out = String::from("#!/usr/bin/env bash\nset -euo pipefail\n");
        out.push_str("python3 - <<'PY'\n");
        for n in 0..closed_body {
            out.push_str(&format!("print({n})\n"));
        }
        out.push_str("PY\n");
        out.push_str("echo done\n");
        if tail_unclosed {
            out.push_str("python3 <<EOF\nimport sys\nprint(sys.argv)\n");
        }
        out
    }

    #[test]
    fn closed_then_unclosed_block() {
        let text = script_with(50, true);
        let total = split_lines(&text).len();
        let blocks = HeredocScanner::python().unwrap().scan(&text);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].tag, "PY");
        assert!(blocks[0].closed);
        assert_eq!(blocks[0].start_line, 3);
        assert_eq!(blocks[0].line_count, 50);
        assert_eq!(blocks[0].end_line, 54);

        assert_eq!(blocks[1].tag, "EOF");
        assert!(!blocks[1].closed);
        assert_eq!(blocks[1].end_line, total);
        assert_eq!(blocks[1].line_count, 2);
    }

    #[test]
    fn sequential_blocks_are_independent() {
        let text = "python <<A\nx\nA\npython3 <<-\"B\"\ny\nz\n  B\n";
        let blocks = HeredocScanner::python().unwrap().scan(text);
        let tags: Vec<&str> = blocks.iter().map(|b| b.tag.as_str()).collect();
        assert_eq!(tags, vec!["A", "B"]);
        assert_eq!(blocks[1].line_count, 2);
        assert!(blocks.iter().all(|b| b.closed));
    }

    #[test]
    fn nothing_after_unclosed_block_is_scanned() {
        let text = "python3 <<X\nbody\npython3 <<Y\nY\n";
        let blocks = HeredocScanner::python().unwrap().scan(text);
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].closed);
        assert_eq!(blocks[0].line_count, 3);
    }

    #[test]
    fn opener_on_last_line_is_empty_unclosed_block() {
        let blocks = HeredocScanner::python().unwrap().scan("echo hi\npython3 <<EOF");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].line_count, 0);
        assert_eq!(blocks[0].end_line, 2);
    }

    #[test]
    fn non_python_heredoc_is_ignored() {
        let blocks = HeredocScanner::python()
            .unwrap()
            .scan("cat <<EOF\nhello\nEOF\npythonic <<Z\nZ\n");
        assert!(blocks.is_empty());
    }

    #[test]
    fn carriage_return_only_script_has_closed_block() {
        let blocks = HeredocScanner::python()
            .unwrap()
            .scan("#!/bin/bash\rpython3 - <<'PY'\rprint(1)\rPY\r");
        assert_eq!(
            blocks,
            vec![HeredocBlock {
                tag: "PY".to_string(),
                start_line: 2,
                end_line: 4,
                line_count: 1,
                closed: true,
            }]
        );
    }

    #[test]
    fn opener_without_capture_group_rejected() {
        assert!(HeredocScanner::new(r"python <<").is_err());
    }

    #[test]
    fn stats_aggregate_blocks() {
        let blocks = HeredocScanner::python()
            .unwrap()
            .scan(&script_with(3, true));
        let stats = BlockStats::of(&blocks);
        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.lines_total, 5);
        assert_eq!(stats.max_block_lines, 3);
        assert_eq!(stats.unclosed, 1);
    }

    #[test]
    fn block_serializes_with_report_field_names() {
        let block = HeredocBlock {
            tag: "PY".to_string(),
            start_line: 1,
            end_line: 3,
            line_count: 1,
            closed: true,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["python_lines"], 1);
        assert!(json.get("line_count").is_none());
    }
}
