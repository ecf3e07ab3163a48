//! # Control Findings
//!
//! The per-control result of one assessment run. Findings are created
//! once per (assessment, control) pair during a run, mutable afterwards
//! only through the explicit human-override operation, and never deleted
//! while the assessment exists.

use serde::{Deserialize, Serialize};

use veris_core::{
    ActorId, AssessmentId, ControlId, FindingId, PageRequest, TenantId, Timestamp, ValidationError,
};

use crate::catalog::Control;
use crate::evaluator::ControlEvaluation;

/// The compliance classification of one control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    /// The control is satisfied.
    Compliant,
    /// The control is not satisfied.
    NonCompliant,
    /// The control is partially satisfied.
    Partial,
    /// The control does not apply to the target system.
    NotApplicable,
    /// The control could not be evaluated (evaluator disabled,
    /// unavailable, or timed out). Never silently skipped — always
    /// recorded.
    NotAssessed,
}

impl FindingStatus {
    /// All statuses in canonical order.
    pub fn all() -> &'static [FindingStatus] {
        &[
            Self::Compliant,
            Self::NonCompliant,
            Self::Partial,
            Self::NotApplicable,
            Self::NotAssessed,
        ]
    }

    /// The snake_case wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
            Self::Partial => "partial",
            Self::NotApplicable => "not_applicable",
            Self::NotAssessed => "not_assessed",
        }
    }

    /// Whether this status counts into the scoring denominator.
    /// Not-applicable and not-assessed controls are excluded from scoring
    /// but retained in their own counters for reporting.
    pub fn is_scored(&self) -> bool {
        matches!(self, Self::Compliant | Self::NonCompliant | Self::Partial)
    }
}

impl std::fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FindingStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ValidationError::Invalid {
                field: "status",
                reason: format!("unknown finding status: {s:?}"),
            })
    }
}

/// Severity of a non-compliant or partial finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    /// Immediate regulatory exposure.
    Critical,
    /// Material gap requiring prioritized remediation.
    Major,
    /// Limited gap.
    Minor,
    /// Advisory note, no remediation obligation.
    Observation,
}

impl FindingSeverity {
    /// All severities, most severe first.
    pub fn all() -> &'static [FindingSeverity] {
        &[Self::Critical, Self::Major, Self::Minor, Self::Observation]
    }

    /// The snake_case wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Observation => "observation",
        }
    }
}

impl std::fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FindingSeverity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ValidationError::Invalid {
                field: "severity",
                reason: format!("unknown finding severity: {s:?}"),
            })
    }
}

/// Remediation tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStatus {
    /// Remediation not yet started.
    Open,
    /// Remediation underway.
    InProgress,
    /// Gap closed.
    Resolved,
    /// Risk formally accepted, no further action.
    AcceptedRisk,
}

/// Remediation sub-record of a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Remediation {
    /// Whether remediation is required at all.
    pub required: bool,
    /// Tracking state.
    pub status: RemediationStatus,
    /// Free-text remediation plan.
    pub plan: Option<String>,
    /// Owner of the remediation work.
    pub owner: Option<String>,
    /// Due date, if committed.
    pub due_date: Option<Timestamp>,
}

impl Remediation {
    /// Initial remediation state for a finding status: required for
    /// non-compliant and partial findings, not required otherwise.
    pub fn initial_for(status: FindingStatus) -> Self {
        Self {
            required: matches!(status, FindingStatus::NonCompliant | FindingStatus::Partial),
            status: RemediationStatus::Open,
            plan: None,
            owner: None,
            due_date: None,
        }
    }
}

/// What the evaluator said about the control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorOutput {
    /// The evaluator's assessment text.
    pub narrative: String,
    /// Confidence in [0, 1]. Zero for not-assessed findings.
    pub confidence: f64,
    /// Evaluator reasoning, when provided.
    pub reasoning: Option<String>,
}

/// Human verification sub-record, set by the explicit finding-update
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanVerification {
    /// Whether a human has verified (or overridden) this finding.
    pub verified: bool,
    /// Who verified.
    pub verified_by: Option<ActorId>,
    /// When.
    pub verified_at: Option<Timestamp>,
}

impl HumanVerification {
    /// The unverified initial state.
    pub fn none() -> Self {
        Self {
            verified: false,
            verified_by: None,
            verified_at: None,
        }
    }
}

/// One control's finding from one assessment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlFinding {
    /// Unique finding identifier.
    pub id: FindingId,
    /// The owning assessment.
    pub assessment_id: AssessmentId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// The evaluated control.
    pub control_id: ControlId,
    /// Compliance classification.
    pub status: FindingStatus,
    /// Severity, when the evaluator assigned one.
    pub severity: Option<FindingSeverity>,
    /// Finding title (defaults to the control title).
    pub title: String,
    /// Finding description (defaults to the evaluator narrative).
    pub description: String,
    /// Collected evidence references.
    pub evidence: Vec<String>,
    /// Evaluator output.
    pub evaluation: EvaluatorOutput,
    /// Remediation sub-record.
    pub remediation: Remediation,
    /// Human verification sub-record.
    pub human_verification: HumanVerification,
    /// When the finding was created.
    pub created_at: Timestamp,
    /// When the finding was last updated.
    pub updated_at: Timestamp,
}

impl ControlFinding {
    /// Build a finding from an evaluator result.
    pub fn from_evaluation(
        tenant_id: TenantId,
        assessment_id: AssessmentId,
        control: &Control,
        evaluation: ControlEvaluation,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: FindingId::new(),
            assessment_id,
            tenant_id,
            control_id: control.id.clone(),
            status: evaluation.status,
            severity: evaluation.severity,
            title: control.title.clone(),
            description: evaluation.narrative.clone(),
            evidence: Vec::new(),
            evaluation: EvaluatorOutput {
                narrative: evaluation.narrative,
                confidence: evaluation.confidence,
                reasoning: evaluation.reasoning,
            },
            remediation: Remediation::initial_for(evaluation.status),
            human_verification: HumanVerification::none(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the `not_assessed`, zero-confidence finding recorded when a
    /// control could not be evaluated.
    pub fn not_assessed(
        tenant_id: TenantId,
        assessment_id: AssessmentId,
        control: &Control,
        narrative: impl Into<String>,
    ) -> Self {
        Self::from_evaluation(
            tenant_id,
            assessment_id,
            control,
            ControlEvaluation {
                status: FindingStatus::NotAssessed,
                severity: None,
                narrative: narrative.into(),
                confidence: 0.0,
                reasoning: None,
            },
        )
    }
}

/// Human override of a finding. Only the supplied fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FindingUpdate {
    /// New status, if overridden.
    pub status: Option<FindingStatus>,
    /// New severity, if overridden.
    pub severity: Option<FindingSeverity>,
    /// Replacement remediation record, if overridden.
    pub remediation: Option<Remediation>,
    /// Additional evidence references to append.
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Filterable, paginated finding query.
#[derive(Debug, Clone, Default)]
pub struct FindingQuery {
    /// Page bounds.
    pub page: PageRequest,
    /// Restrict to one status.
    pub status: Option<FindingStatus>,
    /// Restrict to one severity.
    pub severity: Option<FindingSeverity>,
}
