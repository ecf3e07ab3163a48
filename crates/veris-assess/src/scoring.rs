//! # Deterministic Scoring & Risk Policy
//!
//! Stateless aggregation of findings into counters, a 0–100 score, and a
//! risk level. The risk thresholds are a policy constant injected into the
//! engine; the defaults reproduce the established mapping so existing
//! reporting keeps working.
//!
//! Score formula, over the scored denominator `a = compliant +
//! non_compliant + partial`:
//!
//! ```text
//! score = round(100·compliant/a + 50·partial/a)      (0 when a == 0)
//! ```
//!
//! Not-applicable and not-assessed controls are excluded from `a` but
//! retained in their own counters.

use serde::{Deserialize, Serialize};

use veris_core::ValidationError;

use crate::assessment::AssessmentTotals;
use crate::finding::{ControlFinding, FindingSeverity, FindingStatus};

/// Coarse risk bucket derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Score at or above the low-risk threshold.
    Low,
    /// Score at or above the medium-risk threshold.
    Medium,
    /// Score at or above the high-risk threshold.
    High,
    /// Everything below the high-risk threshold.
    Critical,
}

impl RiskLevel {
    /// All levels, least risky first.
    pub fn all() -> &'static [RiskLevel] {
        &[Self::Low, Self::Medium, Self::High, Self::Critical]
    }

    /// The snake_case wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ValidationError::Invalid {
                field: "risk_level",
                reason: format!("unknown risk level: {s:?}"),
            })
    }
}

/// Score → risk-level thresholds.
///
/// Inclusive minimums, checked from low risk downwards. The defaults
/// (90/70/50) are the compatibility mapping and must stay in descending
/// order — [`RiskPolicy::new`] rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Minimum score for `low` risk.
    pub low_min: u8,
    /// Minimum score for `medium` risk.
    pub medium_min: u8,
    /// Minimum score for `high` risk.
    pub high_min: u8,
}

impl RiskPolicy {
    /// Create a policy, validating threshold ordering.
    pub fn new(low_min: u8, medium_min: u8, high_min: u8) -> Result<Self, ValidationError> {
        if !(high_min < medium_min && medium_min < low_min && low_min <= 100) {
            return Err(ValidationError::Invalid {
                field: "risk_policy",
                reason: format!(
                    "thresholds must satisfy high < medium < low <= 100, got {high_min}/{medium_min}/{low_min}"
                ),
            });
        }
        Ok(Self {
            low_min,
            medium_min,
            high_min,
        })
    }

    /// The risk level for a score under this policy.
    pub fn risk_for(&self, score: u8) -> RiskLevel {
        if score >= self.low_min {
            RiskLevel::Low
        } else if score >= self.medium_min {
            RiskLevel::Medium
        } else if score >= self.high_min {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            low_min: 90,
            medium_min: 70,
            high_min: 50,
        }
    }
}

/// Aggregate finding counters.
pub fn aggregate(findings: &[ControlFinding]) -> AssessmentTotals {
    let mut totals = AssessmentTotals::default();
    for finding in findings {
        match finding.status {
            FindingStatus::Compliant => totals.compliant += 1,
            FindingStatus::NonCompliant => totals.non_compliant += 1,
            FindingStatus::Partial => totals.partial += 1,
            FindingStatus::NotApplicable => totals.not_applicable += 1,
            FindingStatus::NotAssessed => totals.not_assessed += 1,
        }
        match finding.severity {
            Some(FindingSeverity::Critical) => totals.critical_findings += 1,
            Some(FindingSeverity::Major) => totals.major_findings += 1,
            Some(FindingSeverity::Minor) => totals.minor_findings += 1,
            Some(FindingSeverity::Observation) => totals.observation_findings += 1,
            None => {}
        }
    }
    totals.controls_assessed = totals.compliant + totals.non_compliant + totals.partial;
    totals
}

/// The 0–100 compliance score for a set of counters.
pub fn score(totals: &AssessmentTotals) -> u8 {
    if totals.controls_assessed == 0 {
        return 0;
    }
    let assessed = f64::from(totals.controls_assessed);
    let raw = 100.0 * f64::from(totals.compliant) / assessed
        + 50.0 * f64::from(totals.partial) / assessed;
    // Bounded in [0, 100] by construction: compliant + partial <= assessed.
    raw.round() as u8
}

/// Mean evaluator confidence across findings; zero for an empty set.
pub fn mean_confidence(findings: &[ControlFinding]) -> f64 {
    if findings.is_empty() {
        return 0.0;
    }
    let sum: f64 = findings.iter().map(|f| f.evaluation.confidence).sum();
    sum / findings.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(compliant: u32, non_compliant: u32, partial: u32) -> AssessmentTotals {
        AssessmentTotals {
            controls_assessed: compliant + non_compliant + partial,
            compliant,
            non_compliant,
            partial,
            ..AssessmentTotals::default()
        }
    }

    #[test]
    fn score_scenario_two_of_three_compliant() {
        // 3 controls: compliant, compliant, non_compliant
        // → round(100 * 2/3) = 67.
        assert_eq!(score(&totals(2, 1, 0)), 67);
    }

    #[test]
    fn score_empty_denominator_is_zero() {
        assert_eq!(score(&totals(0, 0, 0)), 0);
        // Not-applicable controls don't enter the denominator.
        let t = AssessmentTotals {
            not_applicable: 5,
            not_assessed: 3,
            ..AssessmentTotals::default()
        };
        assert_eq!(score(&t), 0);
    }

    #[test]
    fn score_bounds() {
        assert_eq!(score(&totals(10, 0, 0)), 100);
        assert_eq!(score(&totals(0, 10, 0)), 0);
        assert_eq!(score(&totals(0, 0, 10)), 50);
    }

    #[test]
    fn partial_counts_half() {
        // 1 compliant + 1 partial of 2 → round(50 + 25) = 75.
        assert_eq!(score(&totals(1, 0, 1)), 75);
    }

    #[test]
    fn default_risk_thresholds() {
        let policy = RiskPolicy::default();
        assert_eq!(policy.risk_for(100), RiskLevel::Low);
        assert_eq!(policy.risk_for(90), RiskLevel::Low);
        assert_eq!(policy.risk_for(89), RiskLevel::Medium);
        assert_eq!(policy.risk_for(70), RiskLevel::Medium);
        assert_eq!(policy.risk_for(69), RiskLevel::High);
        assert_eq!(policy.risk_for(67), RiskLevel::High);
        assert_eq!(policy.risk_for(50), RiskLevel::High);
        assert_eq!(policy.risk_for(49), RiskLevel::Critical);
        assert_eq!(policy.risk_for(0), RiskLevel::Critical);
    }

    #[test]
    fn custom_policy_validated() {
        assert!(RiskPolicy::new(95, 80, 60).is_ok());
        assert!(RiskPolicy::new(50, 70, 90).is_err()); // wrong order
        assert!(RiskPolicy::new(101, 70, 50).is_err()); // out of range
        assert!(RiskPolicy::new(90, 90, 50).is_err()); // not strictly ordered
    }

    #[test]
    fn risk_level_wire_names() {
        for level in RiskLevel::all() {
            let json = serde_json::to_string(level).unwrap();
            assert_eq!(json, format!("\"{}\"", level.as_str()));
            let parsed: RiskLevel = level.as_str().parse().unwrap();
            assert_eq!(*level, parsed);
        }
    }
}
