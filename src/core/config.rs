//! Configuration system: TOML file + env var overrides + policy defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{GvaError, Result};
use crate::index::rebuild::IndexFormat;
use crate::policy::table::{
    DEFAULT_BEADS_AUTHORITY_PREFIX, DEFAULT_BEADS_SCOPE_PREFIXES, DEFAULT_CANONICAL_ARTIFACTS_ROOT,
    DEFAULT_DISALLOWED_BROAD_SCOPES, DEFAULT_EXAMPLE_HINTS, DEFAULT_SURFACE_PREFIXES,
};

/// Default config file name, resolved against the repository root.
pub const DEFAULT_CONFIG_FILE: &str = "gva.toml";

/// Full auditor configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Report stamp fields.
    pub report: ReportConfig,
    /// Beads boundary audit inputs.
    pub beads: BeadsConfig,
    /// Policy table overrides.
    pub policy: PolicyConfig,
    /// Secret scan limits.
    pub secrets: SecretsConfig,
    /// Shell embedding thresholds.
    pub shell: ShellConfig,
    /// Namespace declaration corpus.
    pub namespace: NamespaceConfig,
    /// Vision alignment KPI.
    pub vision: VisionConfig,
    /// Session and scene store.
    pub index: IndexConfig,
    /// Model benchmark.
    pub benchmark: BenchmarkConfig,
    /// Activity log.
    pub logging: LoggingConfig,
}

/// Fixed metadata stamped on every report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Logical scope recorded in each report.
    pub scope: String,
    /// Fixed note reminding readers the audit never mutates.
    pub policy_note: String,
}

/// Inputs and output location of the Beads boundary audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BeadsConfig {
    /// Authority registry, relative to the repository root.
    pub registry_file: PathBuf,
    /// Merge queue, relative to the repository root.
    pub merge_queue_file: PathBuf,
    /// Directory receiving dated Beads reports.
    pub output_dir: PathBuf,
}

/// Overrides for the scope and example-hint literals of the policy table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Scopes too broad for a single authority tuple.
    pub disallowed_broad_scopes: Vec<String>,
    /// Scope prefixes that put a tuple in the Beads surface.
    pub beads_scope_prefixes: Vec<String>,
    /// Authority id prefix that puts a tuple in the Beads surface.
    pub beads_authority_prefix: String,
    /// Known surfaces; a tuple touching two of them is rejected.
    pub surface_prefixes: Vec<String>,
    /// Root that merge-queue resolution notes must live under.
    pub canonical_artifacts_root: String,
    /// Lowercase substrings that mark a secret-looking line as an example.
    pub example_hints: Vec<String>,
}

/// Secret scan limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecretsConfig {
    /// Matches stored before the scan stops recording.
    pub max_matches: usize,
    /// Character bound on stored snippets.
    pub snippet_max_chars: usize,
    /// Report path.
    pub out_file: PathBuf,
}

/// Shell embedding thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    /// Warn when embedded python exceeds this share of bash lines.
    pub embedded_pct_warn_gt: f64,
    /// Warn when a single block is longer than this.
    pub max_block_lines_warn_gt: usize,
    /// Offenders listed in the report.
    pub top_offenders: usize,
    /// Directory names never descended into.
    pub excluded_dirs: Vec<String>,
    /// Report path.
    pub out_file: PathBuf,
}

/// Namespace declaration audit corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Directories searched recursively for `.sh` and `.py` scripts.
    pub script_dirs: Vec<PathBuf>,
    /// Report path.
    pub out_file: PathBuf,
}

/// Principle-link KPI inputs and bucket thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisionConfig {
    /// Session artifacts, one subdirectory per tool.
    pub sessions_dir: PathBuf,
    /// Scene artifacts.
    pub scenes_dir: PathBuf,
    /// Link prefix that counts as a principle link.
    pub principle_prefix: String,
    /// Lower bound of the `pass` bucket.
    pub pass_pct: f64,
    /// Lower bound of the `stretch` bucket.
    pub stretch_pct: f64,
    /// Report path.
    pub out_file: PathBuf,
}

/// Session/scene artifact store layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexConfig {
    /// Session artifacts, one subdirectory per tool.
    pub sessions_dir: PathBuf,
    /// Scene artifacts.
    pub scenes_dir: PathBuf,
    /// Tool directories a session may be committed to.
    pub tools: Vec<String>,
    /// Index shape written by rebuilds.
    pub format: IndexFormat,
}

/// Model endpoint knobs for the legibility benchmark.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Model name sent with every request.
    pub model: String,
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// Request timeout.
    pub timeout_secs: u64,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling mass.
    pub top_p: f64,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Prompt set version recorded with each run.
    pub prompt_version: String,
    /// Directory receiving run folders.
    pub output_root: PathBuf,
}

/// Activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Master switch.
    pub enabled: bool,
    /// JSONL file path.
    pub jsonl_path: PathBuf,
    /// Rotation threshold.
    pub max_size_bytes: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            scope: "project/dan_personal_cognitive_infrastructure".to_string(),
            policy_note: "Track-only audit. No automatic mutation.".to_string(),
        }
    }
}

impl Default for BeadsConfig {
    fn default() -> Self {
        Self {
            registry_file: PathBuf::from("scene/authority/registry_v0.json"),
            merge_queue_file: PathBuf::from("scene/merge_queue/queue_v0.json"),
            output_dir: PathBuf::from("scene/audit_reports/v0"),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            disallowed_broad_scopes: to_strings(DEFAULT_DISALLOWED_BROAD_SCOPES),
            beads_scope_prefixes: to_strings(DEFAULT_BEADS_SCOPE_PREFIXES),
            beads_authority_prefix: DEFAULT_BEADS_AUTHORITY_PREFIX.to_string(),
            surface_prefixes: to_strings(DEFAULT_SURFACE_PREFIXES),
            canonical_artifacts_root: DEFAULT_CANONICAL_ARTIFACTS_ROOT.to_string(),
            example_hints: to_strings(DEFAULT_EXAMPLE_HINTS),
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            max_matches: 200,
            snippet_max_chars: 220,
            out_file: PathBuf::from("reports/secret_scan_audit_v0.json"),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            embedded_pct_warn_gt: 70.0,
            max_block_lines_warn_gt: 140,
            top_offenders: 5,
            excluded_dirs: vec![".git".to_string()],
            out_file: PathBuf::from("reports/shell_embedding_audit_v0.json"),
        }
    }
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            script_dirs: vec![PathBuf::from("tools"), PathBuf::from("scripts")],
            out_file: PathBuf::from("reports/namespace_boundary_audit_v0.json"),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            sessions_dir: PathBuf::from("sessions"),
            scenes_dir: PathBuf::from("scenes"),
            principle_prefix: "principle/".to_string(),
            pass_pct: 75.0,
            stretch_pct: 85.0,
            out_file: PathBuf::from("reports/vision_alignment_audit_v0.json"),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            sessions_dir: PathBuf::from("sessions"),
            scenes_dir: PathBuf::from("scenes"),
            tools: vec!["codex".to_string(), "chatgpt".to_string()],
            format: IndexFormat::Legacy,
        }
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            timeout_secs: 120,
            temperature: 0.1,
            top_p: 0.9,
            max_tokens: 1200,
            prompt_version: "v0".to_string(),
            output_root: PathBuf::from("operations/aslb_runs"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[GVA-CONFIG] WARNING: HOME not set, falling back to /tmp for activity log"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            enabled: true,
            jsonl_path: home_dir
                .join(".local")
                .join("share")
                .join("gva")
                .join("activity.jsonl"),
            max_size_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Default configuration path for a repository.
    #[must_use]
    pub fn default_path(repo_root: &Path) -> PathBuf {
        repo_root.join(DEFAULT_CONFIG_FILE)
    }

    /// Load config from the repository default or an explicit path, then apply env overrides.
    ///
    /// A missing default file is not an error; built-in defaults are used.
    pub fn load(repo_root: &Path, path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(|| Self::default_path(repo_root), Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| GvaError::Io {
                path: path_buf.clone(),
                source,
            })?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(GvaError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("GVA_REPORT_SCOPE") {
            self.report.scope = raw;
        }

        if let Some(raw) = lookup("GVA_SECRETS_MAX_MATCHES") {
            self.secrets.max_matches = parse_env("GVA_SECRETS_MAX_MATCHES", &raw)?;
        }

        if let Some(raw) = lookup("GVA_SHELL_EMBEDDED_PCT_WARN_GT") {
            self.shell.embedded_pct_warn_gt = parse_env("GVA_SHELL_EMBEDDED_PCT_WARN_GT", &raw)?;
        }
        if let Some(raw) = lookup("GVA_SHELL_MAX_BLOCK_LINES_WARN_GT") {
            self.shell.max_block_lines_warn_gt =
                parse_env("GVA_SHELL_MAX_BLOCK_LINES_WARN_GT", &raw)?;
        }

        if let Some(raw) = lookup("GVA_VISION_PASS_PCT") {
            self.vision.pass_pct = parse_env("GVA_VISION_PASS_PCT", &raw)?;
        }
        if let Some(raw) = lookup("GVA_VISION_STRETCH_PCT") {
            self.vision.stretch_pct = parse_env("GVA_VISION_STRETCH_PCT", &raw)?;
        }

        if let Some(raw) = lookup("GVA_INDEX_FORMAT") {
            self.index.format = raw.parse().map_err(|details| GvaError::ConfigParse {
                context: "env",
                details: format!("GVA_INDEX_FORMAT={raw:?}: {details}"),
            })?;
        }

        // The benchmark honors the historical variable names as a fallback.
        if let Some(raw) = lookup("GVA_BENCHMARK_MODEL").or_else(|| lookup("ASLB_MODEL")) {
            self.benchmark.model = raw;
        }
        if let Some(raw) = lookup("GVA_BENCHMARK_API_BASE").or_else(|| lookup("OPENAI_BASE_URL")) {
            self.benchmark.api_base = raw;
        }
        if let Some(raw) = lookup("GVA_BENCHMARK_TIMEOUT_SECS") {
            self.benchmark.timeout_secs = parse_env("GVA_BENCHMARK_TIMEOUT_SECS", &raw)?;
        }

        if let Some(raw) = lookup("GVA_LOGGING_ENABLED") {
            self.logging.enabled = parse_env("GVA_LOGGING_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("GVA_LOGGING_JSONL_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, val) in [
            ("vision.pass_pct", self.vision.pass_pct),
            ("vision.stretch_pct", self.vision.stretch_pct),
            ("shell.embedded_pct_warn_gt", self.shell.embedded_pct_warn_gt),
        ] {
            if !(0.0..=100.0).contains(&val) {
                return Err(GvaError::InvalidConfig {
                    details: format!("{name} must be in [0, 100], got {val}"),
                });
            }
        }

        if self.vision.pass_pct >= self.vision.stretch_pct {
            return Err(GvaError::InvalidConfig {
                details: format!(
                    "vision.pass_pct ({}) must be < vision.stretch_pct ({})",
                    self.vision.pass_pct, self.vision.stretch_pct
                ),
            });
        }

        if self.secrets.max_matches == 0 {
            return Err(GvaError::InvalidConfig {
                details: "secrets.max_matches must be >= 1".to_string(),
            });
        }
        if self.secrets.snippet_max_chars == 0 {
            return Err(GvaError::InvalidConfig {
                details: "secrets.snippet_max_chars must be >= 1".to_string(),
            });
        }

        if self.policy.surface_prefixes.is_empty() || self.policy.disallowed_broad_scopes.is_empty()
        {
            return Err(GvaError::InvalidConfig {
                details: "policy.surface_prefixes and policy.disallowed_broad_scopes must be non-empty"
                    .to_string(),
            });
        }

        if self.index.tools.is_empty() {
            return Err(GvaError::InvalidConfig {
                details: "index.tools must list at least one tool".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.benchmark.temperature) {
            return Err(GvaError::InvalidConfig {
                details: format!(
                    "benchmark.temperature must be in [0, 2], got {}",
                    self.benchmark.temperature
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.benchmark.top_p) {
            return Err(GvaError::InvalidConfig {
                details: format!(
                    "benchmark.top_p must be in [0, 1], got {}",
                    self.benchmark.top_p
                ),
            });
        }
        if self.benchmark.timeout_secs == 0 {
            return Err(GvaError::InvalidConfig {
                details: "benchmark.timeout_secs must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|error| GvaError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::{Config, GvaError};
    use crate::index::rebuild::IndexFormat;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn kpi_thresholds_must_ascend() {
        let mut cfg = Config::default();
        cfg.vision.pass_pct = 90.0;
        let err = cfg.validate().expect_err("expected threshold ordering error");
        assert!(err.to_string().contains("stretch_pct"));
    }

    #[test]
    fn percentages_out_of_range_rejected() {
        let mut cfg = Config::default();
        cfg.shell.embedded_pct_warn_gt = 140.0;
        let err = cfg.validate().expect_err("expected range error");
        assert!(err.to_string().contains("embedded_pct_warn_gt"));
    }

    #[test]
    fn zero_max_matches_rejected() {
        let mut cfg = Config::default();
        cfg.secrets.max_matches = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_surface_table_rejected() {
        let mut cfg = Config::default();
        cfg.policy.surface_prefixes.clear();
        let err = cfg.validate().expect_err("expected policy error");
        assert!(err.to_string().contains("surface_prefixes"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("GVA_REPORT_SCOPE", "project/other"),
            ("GVA_SECRETS_MAX_MATCHES", "7"),
            ("GVA_VISION_PASS_PCT", "60"),
            ("GVA_INDEX_FORMAT", "current"),
            ("ASLB_MODEL", "legacy-model"),
        ]);
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.report.scope, "project/other");
        assert_eq!(cfg.secrets.max_matches, 7);
        assert!((cfg.vision.pass_pct - 60.0).abs() < f64::EPSILON);
        assert_eq!(cfg.index.format, IndexFormat::Current);
        assert_eq!(cfg.benchmark.model, "legacy-model");
    }

    #[test]
    fn primary_env_name_wins_over_historical_name() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("GVA_BENCHMARK_MODEL", "primary"),
            ("ASLB_MODEL", "legacy"),
        ]);
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");
        assert_eq!(cfg.benchmark.model, "primary");
    }

    #[test]
    fn env_invalid_number_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("GVA_SECRETS_MAX_MATCHES", "lots")]);
        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid number should fail");
        match err {
            GvaError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("GVA_SECRETS_MAX_MATCHES"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(
            Path::new("/nonexistent/repo"),
            Some(Path::new("/nonexistent/gva/config.toml")),
        );
        assert!(matches!(result, Err(GvaError::MissingConfig { .. })));
    }

    #[test]
    fn load_reads_partial_toml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("gva.toml"),
            "[secrets]\nmax_matches = 5\n\n[policy]\nsurface_prefixes = [\"scene/beads/\"]\n",
        )
        .unwrap();

        let cfg = Config::load(dir.path(), None).expect("config should load");
        assert_eq!(cfg.secrets.max_matches, 5);
        assert_eq!(cfg.secrets.snippet_max_chars, 220);
        assert_eq!(cfg.policy.surface_prefixes, vec!["scene/beads/".to_string()]);
        assert_eq!(
            cfg.beads.registry_file,
            PathBuf::from("scene/authority/registry_v0.json")
        );
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let mut modified = Config::default();
        modified.shell.max_block_lines_warn_gt += 1;
        assert_ne!(
            cfg.stable_hash().expect("hash"),
            modified.stable_hash().expect("hash")
        );
        assert_eq!(cfg.stable_hash().expect("hash"), cfg.stable_hash().expect("hash"));
    }
}
