//! Session and scene artifact store: commit, validate, reindex.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::core::config::IndexConfig;
use crate::core::errors::{GvaError, Result};
use crate::core::paths::{repo_relative, resolve_in_repo};
use crate::index::artifact_id::{infer_filename, slugify};
use crate::index::rebuild::{INDEX_FILE_NAME, IndexDocument, IndexFormat, RebuildOutcome, rebuild_all};
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};
use crate::scanner::walker::files_with_extension;

/// Suffix of committed scene files.
pub const SCENE_SUFFIX: &str = ".scene.json";

/// Parse committed input: non-empty text holding a JSON object.
pub fn parse_object(text: &str, source: &Path) -> Result<Map<String, Value>> {
    if text.trim().is_empty() {
        return Err(GvaError::InvalidInput {
            path: source.to_path_buf(),
            details: "no input; pipe a JSON object or pass --json-file".to_string(),
        });
    }
    let value: Value = serde_json::from_str(text).map_err(|e| GvaError::InvalidInput {
        path: source.to_path_buf(),
        details: format!("not valid JSON: {e}"),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(GvaError::InvalidInput {
            path: source.to_path_buf(),
            details: "top-level JSON must be an object".to_string(),
        }),
    }
}

/// Pretty JSON with a trailing newline, creating parent directories.
fn write_json(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| GvaError::io(parent, e))?;
    }
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    fs::write(path, text).map_err(|e| GvaError::io(path, e))
}

/// Outcome of `validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Scene, session, and index files examined.
    pub files_checked: usize,
    /// One message per problem, in check order.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// True when no problems were found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Artifact store rooted at a repository.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    repo_root: PathBuf,
    sessions_dir: PathBuf,
    scenes_dir: PathBuf,
    tools: Vec<String>,
    format: IndexFormat,
}

impl ArtifactStore {
    /// Store rooted at `repo_root` with the configured layout.
    #[must_use]
    pub fn new(repo_root: &Path, cfg: &IndexConfig) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            sessions_dir: resolve_in_repo(repo_root, &cfg.sessions_dir),
            scenes_dir: resolve_in_repo(repo_root, &cfg.scenes_dir),
            tools: cfg.tools.clone(),
            format: cfg.format,
        }
    }

    /// Override the index format written by rebuilds.
    #[must_use]
    pub fn with_format(mut self, format: IndexFormat) -> Self {
        self.format = format;
        self
    }

    /// Resolved sessions directory.
    #[must_use]
    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Write a session artifact under `sessions/<tool>/` and rebuild every index.
    pub fn commit_session(
        &self,
        tool: &str,
        artifact: &Map<String, Value>,
        filename: Option<&str>,
        today: NaiveDate,
        log: &mut ActivityLog,
    ) -> Result<PathBuf> {
        if !self.tools.iter().any(|t| t == tool) {
            return Err(GvaError::InvalidInput {
                path: self.sessions_dir.join(tool),
                details: format!("tool must be one of: {}", self.tools.join(", ")),
            });
        }
        let Some(artifact_id) = artifact.get("id").and_then(Value::as_str) else {
            return Err(GvaError::InvalidInput {
                path: PathBuf::from("<session>"),
                details: "session JSON must contain a string field 'id' (artifact/...)".to_string(),
            });
        };
        let name = match filename {
            Some(name) => plain_file_name(name)?,
            None => infer_filename(artifact_id, today)?,
        };

        let path = self.sessions_dir.join(tool).join(name);
        write_json(&path, &Value::Object(artifact.clone()))?;
        log.log(
            &LogEntry::new(EventType::ArtifactCommitted, Severity::Info)
                .path(repo_relative(&self.repo_root, &path))
                .details(artifact_id),
        );
        self.reindex(log)?;
        Ok(path)
    }

    /// Write `scenes/<slug(name)>.scene.json`.
    pub fn commit_scene(
        &self,
        name: &str,
        scene: &Map<String, Value>,
        log: &mut ActivityLog,
    ) -> Result<PathBuf> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(GvaError::InvalidInput {
                path: self.scenes_dir.clone(),
                details: format!("scene name {name:?} has no usable characters"),
            });
        }
        let path = self.scenes_dir.join(format!("{slug}{SCENE_SUFFIX}"));
        write_json(&path, &Value::Object(scene.clone()))?;
        log.log(
            &LogEntry::new(EventType::ArtifactCommitted, Severity::Info)
                .path(repo_relative(&self.repo_root, &path)),
        );
        Ok(path)
    }

    /// Rebuild every `sessions/<tool>/index.json` in the configured format.
    pub fn reindex(&self, log: &mut ActivityLog) -> Result<Vec<RebuildOutcome>> {
        let outcomes = rebuild_all(&self.sessions_dir, self.format)?;
        for outcome in &outcomes {
            for skipped in &outcome.skipped {
                log.log(
                    &LogEntry::new(EventType::ArtifactSkipped, Severity::Warning)
                        .path(repo_relative(&self.repo_root, skipped))
                        .details("invalid session artifact"),
                );
            }
            log.log(
                &LogEntry::new(EventType::IndexRebuilt, Severity::Info)
                    .path(repo_relative(&self.repo_root, &outcome.index_path))
                    .count(outcome.entries)
                    .details(&self.format.to_string()),
            );
        }
        Ok(outcomes)
    }

    /// Check every scene and session file; indexes may be in either form.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for path in files_with_extension(&self.scenes_dir, "json") {
            report.files_checked += 1;
            if let Err(reason) = read_object(&path) {
                report.errors.push(self.describe(&path, &reason));
            }
        }

        for dir in sorted_subdirs(&self.sessions_dir) {
            for path in files_with_extension(&dir, "json") {
                report.files_checked += 1;
                let is_index = path.file_name().is_some_and(|n| n == INDEX_FILE_NAME);
                let result = if is_index {
                    read_value(&path).and_then(|v| IndexDocument::from_value(&v).map(|_| ()))
                } else {
                    read_object(&path)
                };
                if let Err(reason) = result {
                    report.errors.push(self.describe(&path, &reason));
                }
            }
        }
        report
    }

    fn describe(&self, path: &Path, reason: &str) -> String {
        format!("{}: {reason}", repo_relative(&self.repo_root, path))
    }
}

fn plain_file_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) || trimmed == ".." || trimmed == "." {
        return Err(GvaError::InvalidInput {
            path: PathBuf::from(name),
            details: "filename override must be a plain file name".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = read_dir
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn read_value(path: &Path) -> std::result::Result<Value, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("unreadable ({e})"))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON ({e})"))
}

fn read_object(path: &Path) -> std::result::Result<(), String> {
    match read_value(path)? {
        Value::Object(_) => Ok(()),
        _ => Err("JSON file must be an object at top level".to_string()),
    }
}
