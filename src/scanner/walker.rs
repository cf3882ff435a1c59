//! Corpus discovery: git-tracked file listing, recursive walks, and text/binary sniffing.
//!
//! Walks are single-threaded and deterministic: entries are visited in sorted order so
//! that reports list files in a stable order across runs.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::errors::{GvaError, Result};
use crate::scanner::text::{decode_ignoring_invalid, decode_text, split_lines};

/// Bytes inspected when deciding whether a file is binary.
pub const BINARY_SNIFF_BYTES: usize = 4096;

/// Files tracked by git under `repo_root`, as absolute paths that currently exist.
pub fn list_tracked_files(repo_root: &Path) -> Result<Vec<PathBuf>> {
    let output = Command::new("git")
        .args(["ls-files", "-z"])
        .current_dir(repo_root)
        .output()
        .map_err(|e| GvaError::Command {
            command: "git ls-files -z".to_string(),
            details: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(GvaError::Command {
            command: "git ls-files -z".to_string(),
            details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(decode_ignoring_invalid(&output.stdout)
        .split('\0')
        .filter(|rel| !rel.is_empty())
        .map(|rel| repo_root.join(rel))
        .filter(|path| path.is_file())
        .collect())
}

/// Every regular file under `root`, skipping directories whose name is excluded.
///
/// Symlinked directories are not followed. Unreadable directories are skipped.
pub fn walk_files(root: &Path, excluded_dir_names: &[String]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let Ok(read_dir) = fs::read_dir(&dir) else {
            continue;
        };
        let mut children: Vec<PathBuf> = read_dir.filter_map(|e| e.ok().map(|e| e.path())).collect();
        children.sort();

        for child in children {
            let Ok(meta) = fs::symlink_metadata(&child) else {
                continue;
            };
            if meta.is_dir() {
                let excluded = child
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| excluded_dir_names.iter().any(|x| x == name));
                if !excluded {
                    stack.push(child);
                }
            } else if meta.is_file() || (meta.file_type().is_symlink() && child.is_file()) {
                out.push(child);
            }
        }
    }

    out.sort();
    out
}

/// Regular files directly inside `dir` with the given extension, sorted.
pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    files
}

/// True when a NUL byte appears in the first [`BINARY_SNIFF_BYTES`] bytes.
pub fn looks_binary(path: &Path) -> io::Result<bool> {
    let mut buf = [0_u8; BINARY_SNIFF_BYTES];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(memchr::memchr(0, &buf[..filled]).is_some())
}

/// Read a file as text with invalid UTF-8 dropped and line endings folded to `\n`.
pub fn read_text(path: &Path) -> io::Result<String> {
    fs::read(path).map(|bytes| decode_text(&bytes))
}

/// First line of a text file, if it can be read.
pub fn first_line(path: &Path) -> Option<String> {
    let text = read_text(path).ok()?;
    split_lines(&text).first().map(|line| (*line).to_string())
}

/// Bash script detection: `.sh` suffix or a bash shebang.
pub fn is_bash_script(path: &Path) -> bool {
    if path.extension().is_some_and(|ext| ext == "sh") {
        return true;
    }
    first_line(path).is_some_and(|line| {
        line.starts_with("#!/usr/bin/env bash") || line.starts_with("#!/bin/bash")
    })
}
