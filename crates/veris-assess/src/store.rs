//! # Assessment Store Contract
//!
//! The storage seam for assessments and findings, plus the domain error
//! taxonomy shared by the store and the engine.
//!
//! ## Transactional Discipline
//!
//! A run touches storage in three self-contained transactional units:
//!
//! 1. [`AssessmentStore::begin_run`] — row lock held from status check
//!    through the `in_progress` transition. This is what makes two
//!    concurrent runs race safely: exactly one observes a runnable status.
//! 2. [`AssessmentStore::complete_run`] — row lock, status must still be
//!    `in_progress`; all findings plus the final aggregates commit
//!    atomically. Readers never observe a partial finding set.
//! 3. [`AssessmentStore::fail_run`] — row-locked transition to `failed`
//!    with a recorded reason; no findings are persisted.
//!
//! Every method is parameterized by tenant id; a row belonging to another
//! tenant reads as absent.

use async_trait::async_trait;
use thiserror::Error;

use veris_core::{
    AssessmentId, FindingId, FrameworkId, Page, PageRequest, StoreError, TenantId, Timestamp,
    ValidationError,
};

use crate::assessment::{AssessmentStatus, ComplianceAssessment};
use crate::catalog::CatalogError;
use crate::evaluator::EvaluatorError;
use crate::finding::{ControlFinding, FindingQuery};

/// Errors from assessment operations.
#[derive(Error, Debug)]
pub enum AssessError {
    /// No such assessment for this tenant.
    #[error("assessment {id} not found")]
    NotFound {
        /// The missing assessment.
        id: AssessmentId,
    },

    /// No such finding on this assessment.
    #[error("finding {id} not found")]
    FindingNotFound {
        /// The missing finding.
        id: FindingId,
    },

    /// The referenced framework does not exist or is not active.
    #[error("framework {id} not found or inactive")]
    FrameworkNotFound {
        /// The unknown or inactive framework.
        id: FrameworkId,
    },

    /// The operation is illegal in the assessment's current status
    /// (e.g. running a `completed` assessment).
    #[error("cannot {operation} assessment in status {status}")]
    InvalidState {
        /// Current status.
        status: AssessmentStatus,
        /// The rejected operation.
        operation: &'static str,
    },

    /// The run exceeded its global deadline.
    #[error("assessment run exceeded its {budget_secs}s budget")]
    RunTimeout {
        /// The configured budget in seconds.
        budget_secs: u64,
    },

    /// Bad input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Control catalog failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Systemic evaluator failure that aborted the run.
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),

    /// Storage transport or transaction failure.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Storage backend for assessments and their findings.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Insert a new assessment.
    async fn insert(&self, assessment: &ComplianceAssessment) -> Result<(), StoreError>;

    /// Load one assessment. Rows of other tenants read as absent.
    async fn load(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
    ) -> Result<Option<ComplianceAssessment>, StoreError>;

    /// List a tenant's assessments, newest-first.
    async fn list(
        &self,
        tenant: &TenantId,
        page: PageRequest,
    ) -> Result<Page<ComplianceAssessment>, StoreError>;

    /// Claim the assessment for a run: under the row lock, verify the
    /// status is runnable and transition to `in_progress`. Exactly one of
    /// two concurrent callers succeeds; the other gets
    /// [`AssessError::InvalidState`].
    async fn begin_run(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
        started_at: Timestamp,
    ) -> Result<ComplianceAssessment, AssessError>;

    /// Commit a finished run: under the row lock, verify the status is
    /// still `in_progress`, then write the terminal assessment state and
    /// all findings in one transaction. Findings of a previous failed run
    /// cannot exist (failed runs persist none), so the insert set is the
    /// complete finding set.
    async fn complete_run(
        &self,
        assessment: &ComplianceAssessment,
        findings: &[ControlFinding],
    ) -> Result<(), AssessError>;

    /// Record a failed run: under the row lock, transition `in_progress`
    /// → `failed` with the reason. No findings are persisted.
    async fn fail_run(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
        reason: &str,
        completed_at: Timestamp,
    ) -> Result<(), AssessError>;

    /// Persist the post-completion mutable fields (aggregates, score,
    /// risk level, human review) of a `completed` assessment, under the
    /// row lock. Everything else is immutable once terminal.
    async fn update_completed(&self, assessment: &ComplianceAssessment)
        -> Result<(), AssessError>;

    /// Query an assessment's findings with status/severity filters.
    async fn findings(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
        query: FindingQuery,
    ) -> Result<Page<ControlFinding>, StoreError>;

    /// All findings of an assessment, in insertion order.
    async fn all_findings(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
    ) -> Result<Vec<ControlFinding>, StoreError>;

    /// Load one finding.
    async fn load_finding(
        &self,
        tenant: &TenantId,
        assessment: AssessmentId,
        finding: FindingId,
    ) -> Result<Option<ControlFinding>, StoreError>;

    /// Persist a human-updated finding, under the finding's row lock.
    async fn update_finding(&self, finding: &ControlFinding) -> Result<(), AssessError>;
}
