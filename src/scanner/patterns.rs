//! Pattern matcher: ordered `(rule_id, regex, severity)` rules applied to single lines,
//! with example-text suppression and irreversible redaction of matched secrets.

use std::borrow::Cow;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{GvaError, Result};

/// Static severity attached to a rule. Never computed from the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth a look.
    Low,
    /// Probable concern.
    Medium,
    /// Almost certainly a real finding.
    High,
}

impl Severity {
    /// Lowercase name used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// One compiled matching rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    id: Cow<'static, str>,
    regex: Regex,
    severity: Severity,
}

impl PatternRule {
    /// Compile a rule, attributing regex failures to the rule id.
    pub fn new(
        id: impl Into<Cow<'static, str>>,
        pattern: &str,
        severity: Severity,
    ) -> Result<Self> {
        let id = id.into();
        let regex = Regex::new(pattern).map_err(|e| GvaError::InvalidPattern {
            rule_id: id.to_string(),
            details: e.to_string(),
        })?;
        Ok(Self {
            id,
            regex,
            severity,
        })
    }

    /// Rule identifier reported with each hit.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Static severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Whether the rule matches anywhere in `line`.
    #[must_use]
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

/// A rule that fired on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleHit<'a> {
    /// Identifier of the rule that fired.
    pub rule_id: &'a str,
    /// Its severity.
    pub severity: Severity,
}

/// Ordered rule collection. Rules are independent: one line may trigger several.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<PatternRule>,
}

impl RuleSet {
    /// Wrap already compiled rules, keeping their order.
    #[must_use]
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    /// Compile a table of `(id, pattern, severity)` literals.
    pub fn compile(table: &[(&'static str, &str, Severity)]) -> Result<Self> {
        table
            .iter()
            .map(|(id, pattern, severity)| PatternRule::new(*id, pattern, *severity))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    /// Every rule hit on `line`, in rule order.
    #[must_use]
    pub fn match_line<'a>(&'a self, line: &str) -> Vec<RuleHit<'a>> {
        self.rules
            .iter()
            .filter(|rule| rule.is_match(line))
            .map(|rule| RuleHit {
                rule_id: rule.id(),
                severity: rule.severity,
            })
            .collect()
    }

    /// Whether any rule matches `line`.
    #[must_use]
    pub fn any_match(&self, line: &str) -> bool {
        self.rules.iter().any(|rule| rule.is_match(line))
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Case-insensitive substrings marking a line as documentation or template text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExampleHints {
    lowered: Vec<String>,
}

impl ExampleHints {
    /// Lowercase and keep the non-empty hints.
    #[must_use]
    pub fn new<I, S>(hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lowered: hints
                .into_iter()
                .map(|h| h.as_ref().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Whether `line` contains any hint, ignoring case.
    #[must_use]
    pub fn is_example(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.lowered.iter().any(|hint| lower.contains(hint.as_str()))
    }
}

/// Outcome of applying rules plus example suppression to one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineVerdict<'a> {
    /// No rule matched.
    Clean,
    /// Genuine hits to record.
    Matched(Vec<RuleHit<'a>>),
    /// Would have matched, but the line reads as example text; counted, never recorded.
    Ignored,
}

/// Apply `rules` to `line`, suppressing example text.
#[must_use]
pub fn classify_line<'a>(line: &str, rules: &'a RuleSet, hints: &ExampleHints) -> LineVerdict<'a> {
    if hints.is_example(line) {
        return if rules.any_match(line) {
            LineVerdict::Ignored
        } else {
            LineVerdict::Clean
        };
    }
    let hits = rules.match_line(line);
    if hits.is_empty() {
        LineVerdict::Clean
    } else {
        LineVerdict::Matched(hits)
    }
}

/// Sentinel that replaces every secret-shaped substring.
pub const REDACTION_SENTINEL: &str = "<redacted_secret>";

/// One redaction pattern. With `keep_prefix`, capture group 1 survives and only the
/// remainder of the match is replaced.
#[derive(Debug, Clone)]
pub struct RedactionRule {
    regex: Regex,
    keep_prefix: bool,
}

impl RedactionRule {
    /// Compile a redaction pattern; `keep_prefix` requires capture group 1.
    pub fn new(pattern: &str, keep_prefix: bool) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| GvaError::InvalidPattern {
            rule_id: format!("redaction:{pattern}"),
            details: e.to_string(),
        })?;
        if keep_prefix && regex.captures_len() < 2 {
            return Err(GvaError::InvalidPattern {
                rule_id: format!("redaction:{pattern}"),
                details: "keep_prefix requires a capture group".to_string(),
            });
        }
        Ok(Self { regex, keep_prefix })
    }
}

/// Applies redaction rules in order and bounds the stored snippet length.
#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Vec<RedactionRule>,
    max_chars: usize,
}

impl Redactor {
    /// Redactor applying `rules` in order, bounding snippets to `max_chars` characters.
    #[must_use]
    pub fn new(rules: Vec<RedactionRule>, max_chars: usize) -> Self {
        Self { rules, max_chars }
    }

    /// Replace every secret-shaped substring of `line` with the sentinel.
    #[must_use]
    pub fn redact(&self, line: &str) -> String {
        let mut out = line.to_string();
        for rule in &self.rules {
            let replacement = if rule.keep_prefix {
                format!("${{1}}{REDACTION_SENTINEL}")
            } else {
                REDACTION_SENTINEL.to_string()
            };
            out = rule
                .regex
                .replace_all(&out, replacement.as_str())
                .into_owned();
        }
        out
    }

    /// Redact first, then trim and truncate to the character limit.
    #[must_use]
    pub fn snippet(&self, line: &str) -> String {
        self.redact(line)
            .trim()
            .chars()
            .take(self.max_chars)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rules() -> RuleSet {
        RuleSet::compile(&[
            ("project_key", r"\bsk-proj-[A-Za-z0-9_-]{20,}\b", Severity::High),
            ("env_assignment", r"\bOPENAI_API_KEY\s*[:=]", Severity::Medium),
        ])
        .unwrap()
    }

    #[test]
    fn rules_are_not_mutually_exclusive() {
        let rules = sample_rules();
        let hits = rules.match_line("OPENAI_API_KEY=sk-proj-AAAAAAAAAAAAAAAAAAAAAAAA");
        let ids: Vec<&str> = hits.iter().map(|h| h.rule_id).collect();
        assert_eq!(ids, vec!["project_key", "env_assignment"]);
        assert_eq!(hits[0].severity, Severity::High);
    }

    #[test]
    fn clean_line_has_no_hits() {
        assert!(sample_rules().match_line("let x = 1;").is_empty());
    }

    #[test]
    fn invalid_rule_reports_rule_id() {
        let err = PatternRule::new("broken", "(unclosed", Severity::Low).unwrap_err();
        match err {
            GvaError::InvalidPattern { rule_id, .. } => assert_eq!(rule_id, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn example_lines_are_ignored_not_recorded() {
        let rules = sample_rules();
        let hints = ExampleHints::new(["example", "<key>"]);
        let verdict = classify_line(
            "Example: OPENAI_API_KEY=sk-proj-AAAAAAAAAAAAAAAAAAAAAAAA",
            &rules,
            &hints,
        );
        assert_eq!(verdict, LineVerdict::Ignored);
        assert_eq!(
            classify_line("see the EXAMPLE section", &rules, &hints),
            LineVerdict::Clean
        );
        assert!(matches!(
            classify_line("OPENAI_API_KEY: abc", &rules, &hints),
            LineVerdict::Matched(_)
        ));
    }

    #[test]
    fn angle_bracket_hint_matches_case_insensitively() {
        let hints = ExampleHints::new(["<KEY>"]);
        assert!(hints.is_example("export TOKEN=<key>"));
    }

    #[test]
    fn redaction_keeps_assignment_prefix() {
        let redactor = Redactor::new(
            vec![
                RedactionRule::new(r"\bsk-proj-[A-Za-z0-9_-]{20,}\b", false).unwrap(),
                RedactionRule::new(r#"(\bOPENAI_API_KEY\s*[:=]\s*['"]?)[^'"\s]+"#, true).unwrap(),
            ],
            220,
        );
        let out = redactor.redact("OPENAI_API_KEY=sk-proj-AAAAAAAAAAAAAAAAAAAAAAAA");
        assert_eq!(out, "OPENAI_API_KEY=<redacted_secret>");
        assert!(!out.contains("AAAAAAAA"));
    }

    #[test]
    fn keep_prefix_without_group_is_rejected() {
        assert!(RedactionRule::new(r"sk-[a-z]+", true).is_err());
    }

    #[test]
    fn snippet_is_trimmed_and_bounded() {
        let redactor = Redactor::new(Vec::new(), 5);
        assert_eq!(redactor.snippet("   abcdefgh  "), "abcde");
        let unicode = Redactor::new(Vec::new(), 3);
        assert_eq!(unicode.snippet("ééééé"), "ééé");
    }
}
