//! # Assessment Lifecycle Model
//!
//! The assessment record and its status state machine. Mutations happen
//! only through lifecycle transitions owned by the engine; once
//! `completed` or `failed` the record is immutable except for the
//! human-review fields and the explicit score-recompute operation.

use serde::{Deserialize, Serialize};

use veris_core::{
    ActorId, AssessmentId, ControlId, FrameworkId, TenantId, Timestamp, ValidationError,
};

use crate::scoring::RiskLevel;

/// Lifecycle status of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    /// Created, not yet run.
    Pending,
    /// A run is executing.
    InProgress,
    /// Run finished successfully (terminal).
    Completed,
    /// Run failed; may be re-run.
    Failed,
    /// Operator-initiated abort (terminal).
    Cancelled,
}

impl AssessmentStatus {
    /// All statuses in canonical order.
    pub fn all() -> &'static [AssessmentStatus] {
        &[
            Self::Pending,
            Self::InProgress,
            Self::Completed,
            Self::Failed,
            Self::Cancelled,
        ]
    }

    /// The snake_case wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a run may start from this status. Only `pending` (first
    /// run) and `failed` (retry) are runnable; a `completed` result is
    /// never silently overwritten.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Whether this status admits no further lifecycle transitions
    /// (`failed` is excluded — it is re-runnable).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssessmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ValidationError::Invalid {
                field: "status",
                reason: format!("unknown assessment status: {s:?}"),
            })
    }
}

/// Identity of the system under assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSystem {
    /// Display name of the target system.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
}

/// Aggregate counters over an assessment's findings.
///
/// `controls_assessed` is the scoring denominator (compliant +
/// non-compliant + partial); not-applicable and not-assessed controls are
/// excluded from scoring but retained in their own counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentTotals {
    /// Controls in the scoring denominator.
    pub controls_assessed: u32,
    /// Compliant controls.
    pub compliant: u32,
    /// Non-compliant controls.
    pub non_compliant: u32,
    /// Partially compliant controls.
    pub partial: u32,
    /// Controls not applicable to the target.
    pub not_applicable: u32,
    /// Controls that could not be evaluated.
    pub not_assessed: u32,
    /// Findings with critical severity.
    pub critical_findings: u32,
    /// Findings with major severity.
    pub major_findings: u32,
    /// Findings with minor severity.
    pub minor_findings: u32,
    /// Findings with observation severity.
    pub observation_findings: u32,
}

/// AI-assistance metadata recorded on a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMetadata {
    /// Whether AI assistance was requested for the run.
    pub enabled: bool,
    /// Evaluator model identifier, when one was used.
    pub model: Option<String>,
    /// Mean evaluator confidence across all findings.
    pub mean_confidence: f64,
}

impl AiMetadata {
    /// Metadata for an assessment that has not been run.
    pub fn none() -> Self {
        Self {
            enabled: false,
            model: None,
            mean_confidence: 0.0,
        }
    }
}

/// Human review annotation on a completed assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanReview {
    /// Who reviewed.
    pub reviewer: ActorId,
    /// Review note.
    pub note: String,
    /// When.
    pub reviewed_at: Timestamp,
}

/// One compliance assessment run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAssessment {
    /// Unique assessment identifier.
    pub id: AssessmentId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The framework whose controls are evaluated.
    pub framework_id: FrameworkId,
    /// The system under assessment.
    pub target: TargetSystem,
    /// Domain filters; empty means the whole framework.
    pub scope: Vec<String>,
    /// Controls excluded by id.
    pub excluded_controls: Vec<ControlId>,
    /// Lifecycle status.
    pub status: AssessmentStatus,
    /// Aggregate counters, zero until a run completes.
    pub totals: AssessmentTotals,
    /// Compliance score 0–100; zero until a run completes.
    pub score: u8,
    /// Risk level derived from the score; set when a run completes.
    pub risk_level: Option<RiskLevel>,
    /// AI-assistance metadata of the last run.
    pub ai: AiMetadata,
    /// Human review annotation, if any.
    pub human_review: Option<HumanReview>,
    /// Why the last run failed, when status is `failed`.
    pub failure_reason: Option<String>,
    /// When the assessment was created.
    pub created_at: Timestamp,
    /// When the last run started.
    pub started_at: Option<Timestamp>,
    /// When the last run finished (completed or failed).
    pub completed_at: Option<Timestamp>,
}

impl ComplianceAssessment {
    /// Create a new assessment in `pending` status. No controls are
    /// evaluated at creation — creation and execution are deliberately
    /// decoupled so a misconfigured assessment can be inspected before
    /// cost is incurred.
    pub fn new(
        tenant_id: TenantId,
        framework_id: FrameworkId,
        target: TargetSystem,
        scope: Vec<String>,
        excluded_controls: Vec<ControlId>,
    ) -> Self {
        Self {
            id: AssessmentId::new(),
            tenant_id,
            framework_id,
            target,
            scope,
            excluded_controls,
            status: AssessmentStatus::Pending,
            totals: AssessmentTotals::default(),
            score: 0,
            risk_level: None,
            ai: AiMetadata::none(),
            human_review: None,
            failure_reason: None,
            created_at: Timestamp::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names_roundtrip() {
        for status in AssessmentStatus::all() {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let parsed: AssessmentStatus = status.as_str().parse().unwrap();
            assert_eq!(*status, parsed);
        }
    }

    #[test]
    fn runnable_statuses() {
        assert!(AssessmentStatus::Pending.can_start());
        assert!(AssessmentStatus::Failed.can_start());
        assert!(!AssessmentStatus::InProgress.can_start());
        assert!(!AssessmentStatus::Completed.can_start());
        assert!(!AssessmentStatus::Cancelled.can_start());
    }

    #[test]
    fn new_assessment_is_pending_and_unscored() {
        let a = ComplianceAssessment::new(
            TenantId::new("t1").unwrap(),
            FrameworkId::new("iso27001"),
            TargetSystem {
                name: "billing-service".into(),
                description: None,
            },
            vec![],
            vec![],
        );
        assert_eq!(a.status, AssessmentStatus::Pending);
        assert_eq!(a.score, 0);
        assert!(a.risk_level.is_none());
        assert!(a.started_at.is_none());
        assert_eq!(a.totals, AssessmentTotals::default());
    }

    #[test]
    fn assessment_serde_roundtrip() {
        let a = ComplianceAssessment::new(
            TenantId::new("t1").unwrap(),
            FrameworkId::new("gdpr"),
            TargetSystem {
                name: "crm".into(),
                description: Some("customer data platform".into()),
            },
            vec!["data_subject_rights".into()],
            vec![ControlId::new("GDPR-30")],
        );
        let json = serde_json::to_string(&a).unwrap();
        let parsed: ComplianceAssessment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, a);
    }
}
