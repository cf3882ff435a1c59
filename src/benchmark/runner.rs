//! Benchmark run orchestration and artifact layout.
//!
//! ```text
//! <output_root>/<run_slug>/
//!   inputs/
//!   raw/tier_<n>_<key>.json
//!   results/aslb_result.json
//!   results/tier_scores.yaml
//!   results/run_log.md
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::benchmark::client::ModelClient;
use crate::benchmark::tiers::{BASE_SYSTEM_PROMPT, Confidence, TIERS, Tier, build_prompt, load_context};
use crate::core::config::BenchmarkConfig;
use crate::core::errors::{GvaError, Result};
use crate::core::paths::resolve_in_repo;
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkOptions {
    /// Run folder name; generated from the clock when `None`.
    pub run_slug: Option<String>,
    /// Files concatenated into the prompt context.
    pub context_files: Vec<PathBuf>,
    /// Context text appended after the files.
    pub inline_context: String,
    /// Use placeholder replies instead of the model endpoint.
    pub dry_run: bool,
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Run folder.
    pub run_dir: PathBuf,
    /// Sum of the tier scores.
    pub aggregate_score: i64,
    /// Lowest tier confidence.
    pub confidence: Confidence,
}

/// Output directories of one run.
#[derive(Debug, Clone)]
pub struct RunDirs {
    /// Run folder.
    pub run: PathBuf,
    /// Raw model payloads.
    pub raw: PathBuf,
    /// Result files.
    pub results: PathBuf,
    /// Copies of the run inputs.
    pub inputs: PathBuf,
}

impl RunDirs {
    /// Create the run folder and its subdirectories.
    pub fn create(output_root: &Path, slug: &str) -> Result<Self> {
        let run = output_root.join(slug);
        let dirs = Self {
            raw: run.join("raw"),
            results: run.join("results"),
            inputs: run.join("inputs"),
            run,
        };
        for dir in [&dirs.run, &dirs.raw, &dirs.results, &dirs.inputs] {
            fs::create_dir_all(dir).map_err(|e| GvaError::io(dir, e))?;
        }
        Ok(dirs)
    }
}

/// `%Y-%m-%d-%H%M%S-aslb` unless a slug is given.
#[must_use]
pub fn run_slug(explicit: Option<&str>, now: DateTime<Utc>) -> String {
    explicit
        .filter(|s| !s.trim().is_empty())
        .map_or_else(|| now.format("%Y-%m-%d-%H%M%S-aslb").to_string(), str::to_string)
}

/// Lowercase hex SHA-256 of the prompt text.
#[must_use]
pub fn prompt_hash(prompt: &str) -> String {
    format!("{:x}", Sha256::digest(prompt.as_bytes()))
}

/// Parse a tier reply as a JSON object and force its `tier` field.
pub fn parse_response(content: &str, tier_key: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(content).map_err(|e| GvaError::Runtime {
        details: format!("model response for tier '{tier_key}' was not valid JSON ({e}):\n{content}"),
    })?;
    let Value::Object(mut parsed) = value else {
        return Err(GvaError::Runtime {
            details: format!("model response for tier '{tier_key}' was not a JSON object"),
        });
    };
    parsed.insert("tier".to_string(), Value::from(tier_key));
    Ok(parsed)
}

/// Integer score; fractional scores truncate toward zero.
///
/// Null, missing, non-numeric, and out-of-range values count as zero.
#[must_use]
pub fn score_of(parsed: &Map<String, Value>) -> i64 {
    match parsed.get("score") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(truncate_to_i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Range-checked truncation. `None` for NaN, infinities, and values outside `i64`.
fn truncate_to_i64(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    format!("{:.0}", value.trunc()).parse().ok()
}

/// Repository provenance. Fields are `None` when git is unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitSnapshot {
    /// `git rev-parse HEAD`.
    pub head: Option<String>,
    /// `git status --short`.
    pub status: Option<String>,
}

impl GitSnapshot {
    /// Best-effort snapshot; failures leave fields empty.
    pub fn capture(repo_root: &Path) -> Self {
        Self {
            head: git(repo_root, &["rev-parse", "HEAD"]),
            status: git(repo_root, &["status", "--short"]),
        }
    }
}

fn git(repo_root: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

struct TierResult {
    tier: Tier,
    parsed: Map<String, Value>,
}

impl TierResult {
    fn field(&self, key: &str, fallback: Value) -> Value {
        self.parsed.get(key).cloned().unwrap_or(fallback)
    }

    fn list(&self, key: &str) -> Value {
        self.field(key, json!([]))
    }

    fn text(&self, key: &str) -> Value {
        self.field(key, json!(""))
    }
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    fs::write(path, text).map_err(|e| GvaError::io(path, e))
}

/// Run every tier through `client` and write the run artifacts.
pub fn run(
    repo_root: &Path,
    cfg: &BenchmarkConfig,
    opts: &BenchmarkOptions,
    client: &dyn ModelClient,
    now: DateTime<Utc>,
    log: &mut ActivityLog,
) -> Result<RunSummary> {
    let context_files: Vec<PathBuf> = opts
        .context_files
        .iter()
        .map(|p| resolve_in_repo(repo_root, p))
        .collect();
    let context = load_context(&context_files, &opts.inline_context)?;
    let output_root = resolve_in_repo(repo_root, &cfg.output_root);
    let dirs = RunDirs::create(&output_root, &run_slug(opts.run_slug.as_deref(), now))?;
    let git = GitSnapshot::capture(repo_root);
    if git.head.is_none() {
        log.log(
            &LogEntry::new(EventType::InputMissing, Severity::Warning)
                .details("git HEAD unavailable; corpus_ref recorded as null"),
        );
    }
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut results = Vec::with_capacity(TIERS.len());
    let mut prompt_hashes = Map::new();
    for (n, tier) in TIERS.iter().enumerate() {
        let prompt = build_prompt(tier, &context);
        let hash = prompt_hash(&prompt);
        let completion = client.complete(BASE_SYSTEM_PROMPT, &prompt)?;
        let parsed = parse_response(&completion.content, tier.key)?;

        write_json(
            &dirs.raw.join(format!("tier_{}_{}.json", n + 1, tier.key)),
            &json!({
                "tier": tier.key,
                "title": tier.title,
                "prompt": prompt,
                "prompt_hash": hash,
                "model": cfg.model,
                "response_text": completion.content,
                "parsed": parsed,
                "api_payload": completion.raw,
            }),
        )?;
        log.log(
            &LogEntry::new(EventType::BenchmarkTier, Severity::Info)
                .audit(tier.key)
                .details(format!("score={} prompt_hash={hash}", score_of(&parsed))),
        );
        prompt_hashes.insert(tier.key.to_string(), Value::from(hash));
        results.push(TierResult {
            tier: *tier,
            parsed,
        });
    }

    let tier_scores: Map<String, Value> = results
        .iter()
        .map(|r| (r.tier.key.to_string(), Value::from(score_of(&r.parsed))))
        .collect();
    let aggregate_score: i64 = results.iter().map(|r| score_of(&r.parsed)).sum();
    let confidence = Confidence::floor(
        results
            .iter()
            .map(|r| Confidence::parse(r.parsed.get("confidence").and_then(Value::as_str))),
    );

    let [taxonomy, ontology, governance, direction, drift] = results.as_slice() else {
        return Err(GvaError::Runtime {
            details: "benchmark produced an unexpected number of tiers".to_string(),
        });
    };

    let contract = json!({
        "timestamp": timestamp,
        "corpus_ref": git.head,
        "model": cfg.model,
        "prompt_set_version": cfg.prompt_version,
        "tier_scores": tier_scores,
        "aggregate_score": aggregate_score,
        "confidence": confidence.as_str(),
        "derived_taxonomy": taxonomy.text("taxonomy_tree"),
        "derived_ontology": {
            "node_types": ontology.list("node_types"),
            "edge_types": ontology.list("edge_types"),
            "lifecycle_states": ontology.list("lifecycle_states"),
            "invariants": ontology.list("invariants"),
        },
        "governance_inference": {
            "rules": governance.list("rules"),
            "risks": governance.list("risks"),
            "tests_suggested": governance.list("tests_suggested"),
        },
        "direction_inference": {
            "north_star_guess": direction.text("north_star_guess"),
            "charter_guess": direction.text("charter_guess"),
            "evidence": direction.list("evidence"),
        },
        "drift_report": {
            "misalignments": drift.list("misalignments"),
            "category_creep": drift.list("category_creep"),
            "redundancy": drift.list("redundancy"),
            "refactor_suggestions": drift.list("refactor_suggestions"),
        },
        "notes": "Auto-generated via gva benchmark",
        "prompt_hashes": prompt_hashes,
        "git_status": git.status,
        "model_params": {
            "temperature": cfg.temperature,
            "top_p": cfg.top_p,
            "max_tokens": cfg.max_tokens,
        },
    });
    write_json(&dirs.results.join("aslb_result.json"), &contract)?;

    let tiers: Vec<Value> = results
        .iter()
        .map(|r| {
            json!({
                "tier": r.tier.key,
                "score": r.field("score", Value::Null),
                "confidence": r.field("confidence", Value::Null),
                "analysis": r.field("analysis", Value::Null),
                "evidence": r.field("evidence", Value::Null),
            })
        })
        .collect();
    write_json(&dirs.results.join("tier_scores.yaml"), &json!({"tiers": tiers}))?;

    let run_log = format!(
        "# ASLB Run Log\n- timestamp: {timestamp}\n- run_dir: {}\n- model: {}\n- prompt_set_version: {}\n- git_sha: {}\n- aggregate_score: {aggregate_score}\n- confidence: {confidence}\n- dry_run: {}\n",
        dirs.run.display(),
        cfg.model,
        cfg.prompt_version,
        git.head.as_deref().unwrap_or("unknown"),
        opts.dry_run,
    );
    let log_path = dirs.results.join("run_log.md");
    fs::write(&log_path, run_log).map_err(|e| GvaError::io(&log_path, e))?;

    Ok(RunSummary {
        run_dir: dirs.run,
        aggregate_score,
        confidence,
    })
}
