//! Per-directory session indexes.
//!
//! An index is a pure projection of the artifacts on disk: every rebuild replaces the
//! file wholesale, so rerunning on an unchanged directory yields identical bytes.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::inputs::{LoadOutcome, Scalar, SessionArtifact, load_json};
use crate::core::errors::{GvaError, Result};
use crate::index::artifact_id::{ARTIFACT_NAMESPACE, date_from_artifact_id, date_from_filename};
use crate::scanner::walker::files_with_extension;

/// Index file name inside each tool directory.
pub const INDEX_FILE_NAME: &str = "index.json";
/// Character cap on summary snippets, ellipsis included.
pub const SNIPPET_MAX_CHARS: usize = 160;
const ELLIPSIS: &str = "...";

/// Which index shape a rebuild writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFormat {
    /// Sorted array of `artifact/` identifiers.
    #[default]
    Legacy,
    /// `{tool, artifacts, last_updated}` with one record per artifact.
    Current,
}

impl fmt::Display for IndexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Legacy => "legacy",
            Self::Current => "current",
        })
    }
}

impl FromStr for IndexFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "current" => Ok(Self::Current),
            other => Err(format!("unknown index format {other:?} (expected legacy|current)")),
        }
    }
}

/// One entry of a current-form index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Artifact identifier.
    pub id: String,
    /// Session date: explicit, from the id, or from the file name.
    pub date: Option<String>,
    /// Integer resumption score.
    pub resumption_score: Option<i64>,
    /// Whitespace-collapsed summary excerpt.
    pub summary_snippet: String,
}

impl ArtifactRecord {
    /// Project a parsed artifact. `None` when it carries no identifier.
    #[must_use]
    pub fn from_artifact(artifact: &SessionArtifact, file_name: &str) -> Option<Self> {
        let id = artifact.identifier()?.to_string();
        let date = artifact
            .session_date
            .as_ref()
            .and_then(|d| d.as_text())
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string)
            .or_else(|| date_from_artifact_id(&id))
            .or_else(|| date_from_filename(file_name));
        Some(Self {
            id,
            date,
            resumption_score: artifact.resumption_score(),
            summary_snippet: excerpt(artifact.summary_text().unwrap_or_default()),
        })
    }
}

/// Whitespace-collapsed summary, capped at [`SNIPPET_MAX_CHARS`] including the ellipsis.
#[must_use]
pub fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_MAX_CHARS {
        return flat;
    }
    let keep = SNIPPET_MAX_CHARS - ELLIPSIS.len();
    let mut out: String = flat.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Current-form index document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentIndex {
    /// Tool directory name.
    pub tool: String,
    /// Records sorted by date, then id.
    pub artifacts: Vec<ArtifactRecord>,
    /// Latest artifact date.
    pub last_updated: Option<String>,
}

/// Either accepted index shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexDocument {
    /// Sorted identifier array.
    Legacy(Vec<String>),
    /// Object with one record per artifact.
    Current(CurrentIndex),
}

impl IndexDocument {
    /// Validate a parsed index: an array of strings, or a current-form object.
    pub fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| format!("index item #{i} must be a string"))
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Self::Legacy),
            Value::Object(_) => CurrentIndex::deserialize(value)
                .map(Self::Current)
                .map_err(|e| format!("invalid current-form index: {e}")),
            _ => Err("index must be a JSON array or object".to_string()),
        }
    }
}

/// Result of rebuilding one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildOutcome {
    /// Index written.
    pub index_path: PathBuf,
    /// Entries listed.
    pub entries: usize,
    /// Artifacts that failed to parse or carried no identifier.
    pub skipped: Vec<PathBuf>,
}

fn project(dir: &Path, format: IndexFormat) -> Result<(Value, usize, Vec<PathBuf>)> {
    let mut artifacts = Vec::new();
    let mut skipped = Vec::new();

    for path in files_with_extension(dir, "json") {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if file_name == INDEX_FILE_NAME {
            continue;
        }
        let parsed = match load_json(&path) {
            LoadOutcome::Loaded(value) => SessionArtifact::from_value(&value),
            _ => None,
        };
        match parsed {
            Some(artifact) => artifacts.push((artifact, file_name, path)),
            None => skipped.push(path),
        }
    }

    match format {
        IndexFormat::Legacy => {
            let mut ids = BTreeSet::new();
            for (artifact, _, path) in artifacts {
                match legacy_id(&artifact) {
                    Some(id) => {
                        if id.starts_with(ARTIFACT_NAMESPACE) {
                            ids.insert(id.to_string());
                        }
                    }
                    None => skipped.push(path),
                }
            }
            skipped.sort();
            let count = ids.len();
            Ok((Value::from(ids.into_iter().collect::<Vec<_>>()), count, skipped))
        }
        IndexFormat::Current => {
            let mut records = Vec::new();
            for (artifact, file_name, path) in artifacts {
                match ArtifactRecord::from_artifact(&artifact, &file_name) {
                    Some(record) => records.push(record),
                    None => skipped.push(path),
                }
            }
            skipped.sort();
            records.sort_by(|a, b| (&a.date, &a.id).cmp(&(&b.date, &b.id)));
            let last_updated = records.iter().filter_map(|r| r.date.clone()).max();
            let tool = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let count = records.len();
            let doc = CurrentIndex {
                tool,
                artifacts: records,
                last_updated,
            };
            Ok((serde_json::to_value(doc)?, count, skipped))
        }
    }
}

/// Identifier a legacy index lists: the string `id` field, the same field a session
/// commit checks. `artifact_id` is not consulted.
fn legacy_id(artifact: &SessionArtifact) -> Option<&str> {
    artifact.id.as_ref().and_then(Scalar::as_text)
}

/// Rebuild `<dir>/index.json` from the artifacts in `dir`.
pub fn rebuild_index(dir: &Path, format: IndexFormat) -> Result<RebuildOutcome> {
    let (doc, entries, skipped) = project(dir, format)?;
    let index_path = dir.join(INDEX_FILE_NAME);
    let mut text = serde_json::to_string_pretty(&doc)?;
    text.push('\n');
    fs::write(&index_path, text).map_err(|e| GvaError::io(&index_path, e))?;
    Ok(RebuildOutcome {
        index_path,
        entries,
        skipped,
    })
}

/// Rebuild the index of every tool directory under `sessions_dir`, in sorted order.
///
/// A missing sessions directory has nothing to index.
pub fn rebuild_all(sessions_dir: &Path, format: IndexFormat) -> Result<Vec<RebuildOutcome>> {
    if !sessions_dir.is_dir() {
        return Ok(Vec::new());
    }
    let read_dir = fs::read_dir(sessions_dir).map_err(|e| GvaError::io(sessions_dir, e))?;
    let mut dirs: Vec<PathBuf> = read_dir
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs.iter().map(|dir| rebuild_index(dir, format)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: &Value) {
        fs::write(dir.join(name), serde_json::to_string(value).unwrap()).unwrap();
    }

    fn seeded() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "2026-02-11-second-brain.json",
            &json!({
                "id": "artifact/chatgpt_session_2026_02_11_second_brain",
                "summary": "Sketched the second brain.",
                "resumption_score": 4
            }),
        );
        write(
            dir.path(),
            "2026-01-05-notes.json",
            &json!({"id": "artifact/chatgpt_notes", "summary": {"high_level": "Older notes"}}),
        );
        write(dir.path(), "2026-03-01-foreign.json", &json!({"id": "other/x", "session_date": "2026-03-01"}));
        fs::write(dir.path().join("broken.json"), "{nope").unwrap();
        dir
    }

    #[test]
    fn legacy_lists_sorted_namespaced_ids() {
        let dir = seeded();
        let out = rebuild_index(dir.path(), IndexFormat::Legacy).unwrap();
        let index: Value =
            serde_json::from_str(&fs::read_to_string(&out.index_path).unwrap()).unwrap();
        assert_eq!(
            index,
            json!([
                "artifact/chatgpt_notes",
                "artifact/chatgpt_session_2026_02_11_second_brain"
            ])
        );
        assert_eq!(out.entries, 2);
        assert_eq!(out.skipped, vec![dir.path().join("broken.json")]);
    }

    #[test]
    fn legacy_reads_the_committed_id_field_only() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "2026-04-02-both.json",
            &json!({
                "artifact_id": "artifact/declared_elsewhere",
                "id": "artifact/codex_2026_04_02_both"
            }),
        );
        write(
            dir.path(),
            "2026-04-03-declared.json",
            &json!({"artifact_id": "artifact/codex_2026_04_03_declared"}),
        );
        let out = rebuild_index(dir.path(), IndexFormat::Legacy).unwrap();
        let index: Value =
            serde_json::from_str(&fs::read_to_string(&out.index_path).unwrap()).unwrap();
        assert_eq!(index, json!(["artifact/codex_2026_04_02_both"]));
        assert_eq!(out.skipped, vec![dir.path().join("2026-04-03-declared.json")]);
    }

    #[test]
    fn current_form_sorts_by_date_then_id() {
        let dir = seeded();
        let out = rebuild_index(dir.path(), IndexFormat::Current).unwrap();
        let index: Value =
            serde_json::from_str(&fs::read_to_string(&out.index_path).unwrap()).unwrap();
        let ids: Vec<&str> = index["artifacts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(
            ids,
            vec![
                "artifact/chatgpt_notes",
                "artifact/chatgpt_session_2026_02_11_second_brain",
                "other/x"
            ]
        );
        assert_eq!(index["artifacts"][0]["date"], "2026-01-05");
        assert_eq!(index["artifacts"][1]["resumption_score"], 4);
        assert_eq!(index["artifacts"][0]["resumption_score"], Value::Null);
        assert_eq!(index["last_updated"], "2026-03-01");
        assert!(IndexDocument::from_value(&index).is_ok());
    }

    #[test]
    fn rebuild_is_byte_identical_and_drops_deleted_artifacts() {
        let dir = seeded();
        let first = rebuild_index(dir.path(), IndexFormat::Current).unwrap();
        let bytes = fs::read(&first.index_path).unwrap();
        rebuild_index(dir.path(), IndexFormat::Current).unwrap();
        assert_eq!(fs::read(&first.index_path).unwrap(), bytes);

        fs::remove_file(dir.path().join("2026-01-05-notes.json")).unwrap();
        let out = rebuild_index(dir.path(), IndexFormat::Current).unwrap();
        assert_eq!(out.entries, 2);
    }

    #[test]
    fn excerpt_caps_at_160_chars() {
        let long = "word ".repeat(100);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), SNIPPET_MAX_CHARS);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("  short\n text "), "short text");
    }

    #[test]
    fn index_document_accepts_both_shapes_only() {
        assert!(matches!(
            IndexDocument::from_value(&json!(["artifact/a"])),
            Ok(IndexDocument::Legacy(_))
        ));
        assert!(IndexDocument::from_value(&json!([1])).is_err());
        assert!(IndexDocument::from_value(&json!({"tool": "codex"})).is_err());
        assert!(IndexDocument::from_value(&json!("x")).is_err());
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("Current".parse::<IndexFormat>().unwrap(), IndexFormat::Current);
        assert!("yaml".parse::<IndexFormat>().is_err());
        assert_eq!(IndexFormat::default().to_string(), "legacy");
    }

    #[test]
    fn rebuild_all_skips_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(rebuild_all(&dir.path().join("sessions"), IndexFormat::Legacy).unwrap().is_empty());
    }
}
