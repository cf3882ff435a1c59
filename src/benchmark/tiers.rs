//! The five benchmark tiers and prompt assembly.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::core::errors::{GvaError, Result};

/// System prompt sent with every tier.
pub const BASE_SYSTEM_PROMPT: &str = "You are an autonomous structural auditor. Respond only with valid JSON per the user instructions. Scores must be integers in [0,5]. Choose confidence from ['low','medium','high'].";

/// Context placeholder when no context was supplied.
pub const EMPTY_CONTEXT: &str = "<<no additional context provided>>";

/// One benchmark tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// Stable key used in file names and scores.
    pub key: &'static str,
    /// Human-readable title.
    pub title: &'static str,
    /// Tier-specific instructions.
    pub instructions: &'static str,
}

/// Tiers in run order.
pub const TIERS: [Tier; 5] = [
    Tier {
        key: "taxonomy",
        title: "Tier 1: Taxonomy Recoverability",
        instructions: r#"Given the corpus context, derive a hierarchical taxonomy of the system. Highlight the top-level partitions (direction, principles, concepts, patterns/workflows, tools/infra, operations, artifacts, projects/domains). Return JSON with the following keys:
{
  "tier": "taxonomy",
  "score": 0,
  "confidence": "medium",
  "taxonomy_tree": "markdown tree",
  "analysis": "short rationale",
  "evidence": ["path::finding"]
}"#,
    },
    Tier {
        key: "ontology",
        title: "Tier 2: Ontology Extraction",
        instructions: r#"Infer ontology primitives implied by the corpus: node types, edge types, lifecycle states, invariants. Return JSON:
{
  "tier": "ontology",
  "score": 0,
  "confidence": "medium",
  "node_types": ["artifact", ...],
  "edge_types": ["derives_from", ...],
  "lifecycle_states": ["draft", ...],
  "invariants": ["description"],
  "analysis": "summary",
  "evidence": ["path::finding"]
}"#,
    },
    Tier {
        key: "governance",
        title: "Tier 3: Governance Inference",
        instructions: r#"Infer rules governing mutation, versioning, determinism, and lineage. Include risks and candidate tests. Return JSON:
{
  "tier": "governance",
  "score": 0,
  "confidence": "medium",
  "rules": ["rule statement"],
  "risks": ["risk"],
  "tests_suggested": ["test idea"],
  "analysis": "summary",
  "evidence": ["path::finding"]
}"#,
    },
    Tier {
        key: "direction",
        title: "Tier 4: Directional Alignment",
        instructions: r#"Infer the system's North Star and design charter from artifacts alone. Return JSON:
{
  "tier": "direction",
  "score": 0,
  "confidence": "medium",
  "north_star_guess": "text",
  "charter_guess": "text",
  "evidence": ["path::quote"],
  "analysis": "summary"
}"#,
    },
    Tier {
        key: "drift",
        title: "Tier 5: Drift Detection",
        instructions: r#"Compare derived structure to declared direction; identify misalignments, category creep, governance violations, redundancy, and prioritized refactors/tests. Return JSON:
{
  "tier": "drift",
  "score": 0,
  "confidence": "medium",
  "misalignments": ["finding"],
  "category_creep": ["finding"],
  "redundancy": ["finding"],
  "refactor_suggestions": ["action"],
  "analysis": "summary",
  "evidence": ["path::finding"],
  "tests_suggested": ["test idea"]
}"#,
    },
];

/// Full user prompt for one tier.
#[must_use]
pub fn build_prompt(tier: &Tier, context: &str) -> String {
    format!(
        "Agent Structural Legibility Benchmark\n{}\n\nCorpus Context:\n{context}\n\nInstructions:\n{}",
        tier.title, tier.instructions
    )
}

/// Concatenate context files and inline text. A missing file is fatal.
pub fn load_context(files: &[PathBuf], inline: &str) -> Result<String> {
    let mut chunks = Vec::with_capacity(files.len() + 1);
    for path in files {
        if !path.is_file() {
            return Err(GvaError::InvalidInput {
                path: path.clone(),
                details: "context file not found".to_string(),
            });
        }
        let text = fs::read_to_string(path).map_err(|e| GvaError::io(path, e))?;
        chunks.push(format!("# File: {}\n{text}", path.display()));
    }
    if !inline.is_empty() {
        chunks.push(format!("# Inline Context\n{inline}"));
    }
    let joined = chunks.join("\n\n");
    let trimmed = joined.trim();
    Ok(if trimmed.is_empty() {
        EMPTY_CONTEXT.to_string()
    } else {
        trimmed.to_string()
    })
}

/// Self-reported confidence, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    /// Low confidence.
    Low,
    /// Medium confidence.
    Medium,
    /// High confidence.
    High,
}

impl Confidence {
    /// Unknown or missing labels count as `low`.
    #[must_use]
    pub fn parse(label: Option<&str>) -> Self {
        match label {
            Some("high") => Self::High,
            Some("medium") => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Lowest confidence across tiers; `low` when there are none.
    pub fn floor<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        labels.into_iter().min().unwrap_or(Self::Low)
    }

    /// Serialized label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
