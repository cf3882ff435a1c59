//! The policy table: every fixed lookup list the auditors consult, compiled once and
//! injected into the checks.

use regex::Regex;

use crate::core::config::{PolicyConfig, SecretsConfig};
use crate::core::errors::{GvaError, Result};
use crate::policy::scope::ScopePolicy;
use crate::scanner::heredoc::{HeredocScanner, PYTHON_HEREDOC_OPENER};
use crate::scanner::patterns::{ExampleHints, RedactionRule, Redactor, RuleSet, Severity};

/// Roots an authority tuple may not claim wholesale.
pub const DEFAULT_DISALLOWED_BROAD_SCOPES: &[&str] = &["scene/", "state/", "scenes/", "project/"];
/// Scope prefixes inside the Beads surface.
pub const DEFAULT_BEADS_SCOPE_PREFIXES: &[&str] = &["scene/beads/", "state/beads/"];
/// Authority id prefix reserved for Beads tuples.
pub const DEFAULT_BEADS_AUTHORITY_PREFIX: &str = "auth/beads_";
/// Operational surfaces, checked in order.
pub const DEFAULT_SURFACE_PREFIXES: &[&str] = &[
    "scene/beads/",
    "state/beads/",
    "scene/mailbox/",
    "scene/merge_queue/",
    "scene/sandbox/",
];
/// Root that merge-queue resolution notes must live under.
pub const DEFAULT_CANONICAL_ARTIFACTS_ROOT: &str = "scenes/";
/// Substrings marking a line as example or template text.
pub const DEFAULT_EXAMPLE_HINTS: &[&str] = &[
    "example",
    "placeholder",
    "redacted",
    "sample",
    "your_key",
    "<key>",
    "<token>",
];

/// Credential shapes. Severity is a static property of each rule.
pub const SECRET_RULES: &[(&str, &str, Severity)] = &[
    (
        "openai_project_key",
        r"\bsk-proj-[A-Za-z0-9_-]{20,}\b",
        Severity::High,
    ),
    ("openai_legacy_key", r"\bsk-[A-Za-z0-9]{32,}\b", Severity::High),
    (
        "openai_env_assignment",
        r#"\bOPENAI_API_KEY\s*[:=]\s*['"]?[^'"\s]{20,}"#,
        Severity::High,
    ),
    ("github_token", r"\bgh[pousr]_[A-Za-z0-9]{20,}\b", Severity::High),
];

/// `(pattern, keep_prefix)`; applied in order before anything is stored.
pub const SECRET_REDACTIONS: &[(&str, bool)] = &[
    (r"\bsk-proj-[A-Za-z0-9_-]{20,}\b", false),
    (r"\bsk-[A-Za-z0-9]{32,}\b", false),
    (r"\bgh[pousr]_[A-Za-z0-9]{20,}\b", false),
    (r#"(\bOPENAI_API_KEY\s*[:=]\s*['"]?)[^'"\s]+"#, true),
];

/// Shell constructs that write to the filesystem.
pub const SHELL_MUTATION_RULES: &[(&str, &str, Severity)] = &[
    ("append_redirect", r">>", Severity::Medium),
    ("tee", r"\btee\b", Severity::Medium),
    ("touch", r"\btouch\b", Severity::Low),
    ("mkdir", r"\bmkdir\b", Severity::Low),
    ("cp", r"\bcp\b", Severity::Medium),
    ("mv", r"\bmv\b", Severity::Medium),
    ("rm", r"\brm\b", Severity::High),
    ("git_add", r"\bgit\s+add\b", Severity::Medium),
    ("cat_redirect", r"\bcat\b[^\n]*>\s*", Severity::Medium),
    ("echo_redirect", r"\becho\b[^\n]*>\s*", Severity::Medium),
    ("printf_redirect", r"\bprintf\b[^\n]*>\s*", Severity::Medium),
];

/// Python calls that write to the filesystem.
pub const PYTHON_MUTATION_RULES: &[(&str, &str, Severity)] = &[
    ("write_text", r"\.write_text\(", Severity::Medium),
    ("write_bytes", r"\.write_bytes\(", Severity::Medium),
    (
        "open_for_write",
        r#"open\([^)]*,\s*['"](?:w|a|x|wb|ab|xb)['"]"#,
        Severity::Medium,
    ),
    ("json_dump", r"json\.dump\(", Severity::Medium),
    (
        "shutil_mutation",
        r"\bshutil\.(?:copy|copy2|copytree|move|rmtree)\(",
        Severity::High,
    ),
    ("mkdir", r"\.mkdir\(", Severity::Low),
];

/// `TARGET_NAMESPACE` declaration in a bash script; quotes are optional.
pub const BASH_NAMESPACE_PATTERN: &str =
    r#"(?m)^\s*TARGET_NAMESPACE\s*=\s*["']?([A-Za-z_]+)["']?\s*$"#;
/// `TARGET_NAMESPACE` declaration in a python script; the value must be a quoted literal.
pub const PYTHON_NAMESPACE_PATTERN: &str =
    r#"(?m)^\s*TARGET_NAMESPACE\s*=\s*["']([A-Za-z_]+)["']\s*$"#;

/// Secret-scan rules, suppression hints, and redaction.
#[derive(Debug, Clone)]
pub struct SecretPolicy {
    /// Credential rules.
    pub rules: RuleSet,
    /// Example-text suppression.
    pub hints: ExampleHints,
    /// Snippet redaction.
    pub redactor: Redactor,
}

/// Mutation-intent rules per script language.
#[derive(Debug, Clone)]
pub struct MutationPolicy {
    /// Shell mutation rules.
    pub bash: RuleSet,
    /// Python mutation rules.
    pub python: RuleSet,
    /// Namespace declaration extractors.
    pub namespace: NamespacePatterns,
}

/// Compiled `TARGET_NAMESPACE` extractors. Capture group 1 is the declared value.
#[derive(Debug, Clone)]
pub struct NamespacePatterns {
    /// Applied to bash scripts.
    pub bash: Regex,
    /// Applied to python scripts.
    pub python: Regex,
}

impl NamespacePatterns {
    /// Compile both extractors; each must capture the namespace in group 1.
    pub fn new(bash: &str, python: &str) -> Result<Self> {
        Ok(Self {
            bash: compile_extractor("target_namespace_bash", bash)?,
            python: compile_extractor("target_namespace_python", python)?,
        })
    }

    /// Extractors for the built-in declaration syntax.
    pub fn builtin() -> Result<Self> {
        Self::new(BASH_NAMESPACE_PATTERN, PYTHON_NAMESPACE_PATTERN)
    }
}

fn compile_extractor(rule_id: &str, pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern).map_err(|e| GvaError::InvalidPattern {
        rule_id: rule_id.to_string(),
        details: e.to_string(),
    })?;
    if regex.captures_len() < 2 {
        return Err(GvaError::InvalidPattern {
            rule_id: rule_id.to_string(),
            details: "extractor must capture the namespace in group 1".to_string(),
        });
    }
    Ok(regex)
}

/// Compiled policy table shared by all auditors of one run.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    /// Scope classification.
    pub scope: ScopePolicy,
    /// Secret scan.
    pub secrets: SecretPolicy,
    /// Mutation intent and namespace extraction.
    pub mutation: MutationPolicy,
    /// Embedded python detection.
    pub heredoc: HeredocScanner,
}

impl PolicyTable {
    /// Table built from the compiled-in literals only.
    pub fn builtin() -> Result<Self> {
        Self::from_config(&PolicyConfig::default(), &SecretsConfig::default())
    }

    /// Table with scope lists and example hints taken from configuration.
    pub fn from_config(policy: &PolicyConfig, secrets: &SecretsConfig) -> Result<Self> {
        let redactions = SECRET_REDACTIONS
            .iter()
            .map(|(pattern, keep)| RedactionRule::new(pattern, *keep))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            scope: ScopePolicy {
                disallowed_broad_scopes: policy.disallowed_broad_scopes.clone(),
                beads_scope_prefixes: policy.beads_scope_prefixes.clone(),
                beads_authority_prefix: policy.beads_authority_prefix.clone(),
                surface_prefixes: policy.surface_prefixes.clone(),
                canonical_artifacts_root: policy.canonical_artifacts_root.clone(),
            },
            secrets: SecretPolicy {
                rules: RuleSet::compile(SECRET_RULES)?,
                hints: ExampleHints::new(&policy.example_hints),
                redactor: Redactor::new(redactions, secrets.snippet_max_chars),
            },
            mutation: MutationPolicy {
                bash: RuleSet::compile(SHELL_MUTATION_RULES)?,
                python: RuleSet::compile(PYTHON_MUTATION_RULES)?,
                namespace: NamespacePatterns::builtin()?,
            },
            heredoc: HeredocScanner::new(PYTHON_HEREDOC_OPENER)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::patterns::{LineVerdict, REDACTION_SENTINEL, classify_line};

    #[test]
    fn builtin_table_compiles() {
        let table = PolicyTable::builtin().unwrap();
        assert_eq!(table.secrets.rules.len(), SECRET_RULES.len());
        assert_eq!(table.mutation.bash.len(), SHELL_MUTATION_RULES.len());
        assert_eq!(table.scope.surface_prefixes.len(), 5);
    }

    #[test]
    fn openai_key_line_is_high_and_redacted() {
        let table = PolicyTable::builtin().unwrap();
        let line = "OPENAI_API_KEY=sk-proj-AAAAAAAAAAAAAAAAAAAAAAAA";
        let LineVerdict::Matched(hits) =
            classify_line(line, &table.secrets.rules, &table.secrets.hints)
        else {
            panic!("expected a match");
        };
        assert!(hits.iter().all(|h| h.severity == Severity::High));
        assert!(hits.iter().any(|h| h.rule_id == "openai_project_key"));

        let snippet = table.secrets.redactor.snippet(line);
        assert!(snippet.contains(REDACTION_SENTINEL));
        assert!(!snippet.contains("sk-proj-AAAA"));
        assert!(!snippet.contains("AAAAAAAAAAAAAAAAAAAAAAAA"));
    }

    #[test]
    fn github_token_redacted_in_context() {
        let table = PolicyTable::builtin().unwrap();
        let token = format!("ghp_{}", "x".repeat(30));
        let snippet = table
            .secrets
            .redactor
            .snippet(&format!("  token: {token}  "));
        assert_eq!(snippet, format!("token: {REDACTION_SENTINEL}"));
    }

    #[test]
    fn placeholder_line_is_ignored() {
        let table = PolicyTable::builtin().unwrap();
        let verdict = classify_line(
            "OPENAI_API_KEY=sk-proj-AAAAAAAAAAAAAAAAAAAAAAAA # placeholder",
            &table.secrets.rules,
            &table.secrets.hints,
        );
        assert_eq!(verdict, LineVerdict::Ignored);
    }

    #[test]
    fn mutation_rules_detect_writes() {
        let table = PolicyTable::builtin().unwrap();
        assert!(table.mutation.bash.any_match("echo ok > out.txt"));
        assert!(table.mutation.bash.any_match("git  add -A"));
        assert!(!table.mutation.bash.any_match("grep -r pattern ."));
        assert!(
            table
                .mutation
                .python
                .any_match("with open(path, 'w') as fh:")
        );
        assert!(!table.mutation.python.any_match("with open(path) as fh:"));
    }

    #[test]
    fn configured_hints_replace_builtin_hints() {
        let policy = PolicyConfig {
            example_hints: vec!["dummy".to_string()],
            ..PolicyConfig::default()
        };
        let table = PolicyTable::from_config(&policy, &SecretsConfig::default()).unwrap();
        assert!(table.secrets.hints.is_example("a DUMMY key"));
        assert!(!table.secrets.hints.is_example("an example key"));
    }
}
