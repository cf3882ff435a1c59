//! KPI evaluator: share of non-trivial artifacts carrying at least one canonical link.

use std::collections::BTreeSet;

use crate::audit::inputs::SessionArtifact;
use crate::audit::report::{KpiStatus, percentage};

/// Ordered bucket thresholds, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiThresholds {
    /// Lower bound of `pass`.
    pub pass_pct: f64,
    /// Lower bound of `stretch`.
    pub stretch_pct: f64,
}

impl KpiThresholds {
    /// Three-way monotonic bucket.
    #[must_use]
    pub fn bucket(&self, value_pct: f64) -> KpiStatus {
        if value_pct >= self.stretch_pct {
            KpiStatus::Stretch
        } else if value_pct >= self.pass_pct {
            KpiStatus::Pass
        } else {
            KpiStatus::Fail
        }
    }
}

/// KPI value and the artifacts that held it back.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiOutcome {
    /// Artifacts with a summary and a decision or next step.
    pub eligible: usize,
    /// Eligible artifacts with at least one canonical principle link.
    pub satisfied: usize,
    /// `satisfied / eligible` as a percentage, rounded to 2 decimals.
    pub value_pct: f64,
    /// Bucket of `value_pct`.
    pub status: KpiStatus,
    /// Identifiers of eligible artifacts without a canonical link, in input order.
    pub missing_link_ids: Vec<String>,
}

/// Evaluate identified `artifacts` against the canonical id set.
pub fn evaluate(
    artifacts: &[SessionArtifact],
    canonical_ids: &BTreeSet<String>,
    thresholds: KpiThresholds,
) -> KpiOutcome {
    let mut eligible = 0;
    let mut satisfied = 0;
    let mut missing_link_ids = Vec::new();

    for artifact in artifacts.iter().filter(|a| a.is_non_trivial()) {
        eligible += 1;
        let linked = artifact
            .principle_refs()
            .iter()
            .any(|p| canonical_ids.contains(*p));
        if linked {
            satisfied += 1;
        } else {
            missing_link_ids.push(artifact.identifier().unwrap_or_default().to_string());
        }
    }

    let value_pct = percentage(satisfied, eligible);
    KpiOutcome {
        eligible,
        satisfied,
        value_pct,
        status: thresholds.bucket(value_pct),
        missing_link_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const THRESHOLDS: KpiThresholds = KpiThresholds {
        pass_pct: 75.0,
        stretch_pct: 85.0,
    };

    fn artifact(n: usize, principle: &str) -> SessionArtifact {
        SessionArtifact::from_value(&json!({
            "id": format!("artifact/s_{n}"),
            "summary": "worked",
            "key_decisions": ["decided"],
            "principle_links": [principle]
        }))
        .unwrap()
    }

    fn corpus(linked: usize, total: usize) -> Vec<SessionArtifact> {
        (0..total)
            .map(|n| artifact(n, if n < linked { "principle/a" } else { "principle/unknown" }))
            .collect()
    }

    fn canonical() -> BTreeSet<String> {
        ["principle/a".to_string()].into_iter().collect()
    }

    #[test]
    fn eight_of_ten_is_pass() {
        let out = evaluate(&corpus(8, 10), &canonical(), THRESHOLDS);
        assert_eq!(out.eligible, 10);
        assert!((out.value_pct - 80.0).abs() < f64::EPSILON);
        assert_eq!(out.status, KpiStatus::Pass);
        assert_eq!(out.missing_link_ids, vec!["artifact/s_8", "artifact/s_9"]);
    }

    #[test]
    fn nine_of_ten_is_stretch() {
        let out = evaluate(&corpus(9, 10), &canonical(), THRESHOLDS);
        assert!((out.value_pct - 90.0).abs() < f64::EPSILON);
        assert_eq!(out.status, KpiStatus::Stretch);
    }

    #[test]
    fn no_eligible_artifacts_is_zero_and_fail() {
        let trivial = SessionArtifact::from_value(&json!({"id": "artifact/t"})).unwrap();
        let out = evaluate(&[trivial], &canonical(), THRESHOLDS);
        assert_eq!(out.eligible, 0);
        assert!(out.value_pct.abs() < f64::EPSILON);
        assert_eq!(out.status, KpiStatus::Fail);
    }

    #[test]
    fn bucket_boundaries_are_inclusive() {
        assert_eq!(THRESHOLDS.bucket(75.0), KpiStatus::Pass);
        assert_eq!(THRESHOLDS.bucket(74.99), KpiStatus::Fail);
        assert_eq!(THRESHOLDS.bucket(85.0), KpiStatus::Stretch);
    }
}
