//! Property tests for slugification, scope classification, line splitting, and heredoc
//! scanning.

use chrono::NaiveDate;
use proptest::prelude::*;

use governance_audit::index::artifact_id::{date_from_filename, infer_filename, slugify};
use governance_audit::policy::table::PolicyTable;
use governance_audit::scanner::heredoc::{BlockStats, HeredocScanner};
use governance_audit::scanner::text::split_lines;

// ──────────────────── strategies ────────────────────

fn arb_scope() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("scene".to_string()),
            Just("beads".to_string()),
            Just("state".to_string()),
            Just("sessions".to_string()),
            Just("*".to_string()),
            "[a-z_]{1,8}",
        ],
        1..4,
    )
    .prop_flat_map(|parts| {
        let joined = parts.join("/");
        prop_oneof![Just(joined.clone()), Just(format!("{joined}/"))]
    })
}

/// One generated script: plain lines interleaved with closed python heredocs.
#[derive(Debug, Clone)]
enum Chunk {
    Plain(String),
    Block { tag: String, body_lines: usize },
}

fn arb_chunk() -> impl Strategy<Value = Chunk> {
    prop_oneof![
        "[a-z ]{0,20}".prop_map(|s| Chunk::Plain(format!("echo {s}"))),
        ("[A-Z]{2,6}", 0usize..6).prop_map(|(tag, body_lines)| Chunk::Block { tag, body_lines }),
    ]
}

fn render(chunks: &[Chunk]) -> String {
    let mut lines = vec!["#!/usr/bin/env bash".to_string()];
    for chunk in chunks {
        match chunk {
            Chunk::Plain(line) => lines.push(line.clone()),
            Chunk::Block { tag, body_lines } => {
                lines.push(format!("python3 - <<'{tag}'"));
                for i in 0..*body_lines {
                    lines.push(format!("x_{i} = {i}"));
                }
                lines.push(tag.clone());
            }
        }
    }
    lines.join("\n")
}

// ──────────────────── slugify ────────────────────

proptest! {
    #[test]
    fn slug_has_no_edge_or_repeated_separators(input in "\\PC{0,40}") {
        let slug = slugify(&input);
        prop_assert!(!slug.starts_with('-'));
        prop_assert!(!slug.ends_with('-'));
        prop_assert!(!slug.contains("--"));
        prop_assert!(slug.chars().all(|c| c == '-' || c.is_alphanumeric()));
    }

    #[test]
    fn slug_is_idempotent(input in "[A-Za-z0-9 _/-]{0,40}") {
        let once = slugify(&input);
        prop_assert_eq!(slugify(&once), once);
    }

    #[test]
    fn dated_ids_keep_their_date(
        tool in "[a-z]{2,8}",
        y in 2000u32..2100,
        m in 1u32..=12,
        d in 1u32..=28,
        topic in "[a-z]{1,8}(_[a-z]{1,8}){0,3}",
    ) {
        let id = format!("artifact/{tool}_{y:04}_{m:02}_{d:02}_{topic}");
        let today = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let name = infer_filename(&id, today).unwrap();
        let expected_date = format!("{y:04}-{m:02}-{d:02}");
        prop_assert!(name.ends_with(".json"));
        prop_assert_eq!(date_from_filename(&name), Some(expected_date));
    }
}

// ──────────────────── scope classification ────────────────────

proptest! {
    #[test]
    fn wildcard_flag_tracks_the_glyph(scope in arb_scope()) {
        let table = PolicyTable::builtin().unwrap();
        let class = table.scope.classify(&scope);
        prop_assert_eq!(class.is_wildcard, scope.contains('*'));
    }

    #[test]
    fn broadness_ignores_trailing_slash(scope in arb_scope()) {
        let table = PolicyTable::builtin().unwrap();
        let bare = scope.trim_end_matches('/');
        prop_assume!(!bare.is_empty());
        let with_slash = format!("{bare}/");
        prop_assert_eq!(
            table.scope.classify(bare).is_broad,
            table.scope.classify(&with_slash).is_broad
        );
    }

    #[test]
    fn detected_surface_is_a_prefix_of_the_scope(scope in arb_scope()) {
        let table = PolicyTable::builtin().unwrap();
        if let Some(surface) = table.scope.classify(&scope).surface {
            prop_assert!(scope.starts_with(&surface));
        }
    }
}

// ──────────────────── heredoc scanning ────────────────────

proptest! {
    #[test]
    fn generated_blocks_are_all_found_and_closed(chunks in prop::collection::vec(arb_chunk(), 0..12)) {
        let scanner = HeredocScanner::python().unwrap();
        let blocks = scanner.scan(&render(&chunks));
        let expected: Vec<usize> = chunks
            .iter()
            .filter_map(|c| match c {
                Chunk::Block { body_lines, .. } => Some(*body_lines),
                Chunk::Plain(_) => None,
            })
            .collect();

        prop_assert_eq!(blocks.len(), expected.len());
        for (block, body_lines) in blocks.iter().zip(&expected) {
            prop_assert!(block.closed);
            prop_assert_eq!(block.line_count, *body_lines);
            prop_assert_eq!(block.end_line, block.start_line + body_lines + 1);
        }
        for pair in blocks.windows(2) {
            prop_assert!(pair[0].end_line < pair[1].start_line);
        }

        let stats = BlockStats::of(&blocks);
        prop_assert_eq!(stats.unclosed, 0);
        prop_assert_eq!(stats.lines_total, expected.iter().sum::<usize>());
    }

    #[test]
    fn newline_convention_does_not_change_blocks(
        chunks in prop::collection::vec(arb_chunk(), 0..12),
        terminator in prop_oneof![Just("\r"), Just("\r\n"), Just("\u{2028}")],
    ) {
        let scanner = HeredocScanner::python().unwrap();
        let unix = render(&chunks);
        let other = unix.replace('\n', terminator);
        prop_assert_eq!(split_lines(&other), split_lines(&unix));
        prop_assert_eq!(scanner.scan(&other), scanner.scan(&unix));
    }

    #[test]
    fn unclosed_block_runs_to_end_of_file(body_lines in 0usize..10) {
        let mut text = String::from("#!/bin/bash\npython - <<EOF\n");
        for i in 0..body_lines {
            text.push_str(&format!("print({i})\n"));
        }
        let blocks = HeredocScanner::python().unwrap().scan(&text);
        prop_assert_eq!(blocks.len(), 1);
        prop_assert!(!blocks[0].closed);
        prop_assert_eq!(blocks[0].line_count, body_lines);
    }
}
