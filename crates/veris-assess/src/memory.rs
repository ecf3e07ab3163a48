//! # In-Memory Assessment Store
//!
//! `DashMap`-backed [`AssessmentStore`] used by tests and by
//! in-memory-only deployments. One entry holds an assessment together
//! with its findings, so the entry guard gives the same atomicity the
//! database row lock gives: status check-and-transition, and
//! findings-plus-aggregates commits, each happen under one guard.

use dashmap::DashMap;

use veris_core::{AssessmentId, FindingId, Page, PageRequest, StoreError, TenantId, Timestamp};

use crate::assessment::{AssessmentStatus, ComplianceAssessment};
use crate::finding::{ControlFinding, FindingQuery};
use crate::store::{AssessError, AssessmentStore};

/// One assessment plus its findings.
#[derive(Debug, Clone)]
struct AssessmentEntry {
    assessment: ComplianceAssessment,
    findings: Vec<ControlFinding>,
}

/// In-memory [`AssessmentStore`] backend.
#[derive(Debug, Default)]
pub struct MemoryAssessmentStore {
    assessments: DashMap<AssessmentId, AssessmentEntry>,
}

impl MemoryAssessmentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AssessmentStore for MemoryAssessmentStore {
    async fn insert(&self, assessment: &ComplianceAssessment) -> Result<(), StoreError> {
        match self.assessments.entry(assessment.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "assessment {} already exists",
                assessment.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(AssessmentEntry {
                    assessment: assessment.clone(),
                    findings: Vec::new(),
                });
                Ok(())
            }
        }
    }

    async fn load(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
    ) -> Result<Option<ComplianceAssessment>, StoreError> {
        Ok(self
            .assessments
            .get(&id)
            .filter(|e| &e.assessment.tenant_id == tenant)
            .map(|e| e.assessment.clone()))
    }

    async fn list(
        &self,
        tenant: &TenantId,
        page: PageRequest,
    ) -> Result<Page<ComplianceAssessment>, StoreError> {
        let mut rows: Vec<ComplianceAssessment> = self
            .assessments
            .iter()
            .filter(|e| &e.assessment.tenant_id == tenant)
            .map(|e| e.assessment.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::slice_of(rows, page))
    }

    async fn begin_run(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
        started_at: Timestamp,
    ) -> Result<ComplianceAssessment, AssessError> {
        // The entry guard is held from status check through transition —
        // the row lock analogue that makes concurrent runs race safely.
        let mut entry = self
            .assessments
            .get_mut(&id)
            .filter(|e| &e.assessment.tenant_id == tenant)
            .ok_or(AssessError::NotFound { id })?;

        if !entry.assessment.status.can_start() {
            return Err(AssessError::InvalidState {
                status: entry.assessment.status,
                operation: "run",
            });
        }
        entry.assessment.status = AssessmentStatus::InProgress;
        entry.assessment.started_at = Some(started_at);
        entry.assessment.completed_at = None;
        entry.assessment.failure_reason = None;
        Ok(entry.assessment.clone())
    }

    async fn complete_run(
        &self,
        assessment: &ComplianceAssessment,
        findings: &[ControlFinding],
    ) -> Result<(), AssessError> {
        let mut entry = self
            .assessments
            .get_mut(&assessment.id)
            .filter(|e| e.assessment.tenant_id == assessment.tenant_id)
            .ok_or(AssessError::NotFound { id: assessment.id })?;

        if entry.assessment.status != AssessmentStatus::InProgress {
            return Err(AssessError::InvalidState {
                status: entry.assessment.status,
                operation: "complete",
            });
        }
        // Terminal state and the complete finding set land together.
        entry.assessment = assessment.clone();
        entry.findings = findings.to_vec();
        Ok(())
    }

    async fn fail_run(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
        reason: &str,
        completed_at: Timestamp,
    ) -> Result<(), AssessError> {
        let mut entry = self
            .assessments
            .get_mut(&id)
            .filter(|e| &e.assessment.tenant_id == tenant)
            .ok_or(AssessError::NotFound { id })?;

        if entry.assessment.status != AssessmentStatus::InProgress {
            return Err(AssessError::InvalidState {
                status: entry.assessment.status,
                operation: "fail",
            });
        }
        entry.assessment.status = AssessmentStatus::Failed;
        entry.assessment.failure_reason = Some(reason.to_string());
        entry.assessment.completed_at = Some(completed_at);
        Ok(())
    }

    async fn update_completed(
        &self,
        assessment: &ComplianceAssessment,
    ) -> Result<(), AssessError> {
        let mut entry = self
            .assessments
            .get_mut(&assessment.id)
            .filter(|e| e.assessment.tenant_id == assessment.tenant_id)
            .ok_or(AssessError::NotFound { id: assessment.id })?;

        if entry.assessment.status != AssessmentStatus::Completed {
            return Err(AssessError::InvalidState {
                status: entry.assessment.status,
                operation: "update",
            });
        }
        entry.assessment.totals = assessment.totals;
        entry.assessment.score = assessment.score;
        entry.assessment.risk_level = assessment.risk_level;
        entry.assessment.human_review = assessment.human_review.clone();
        Ok(())
    }

    async fn findings(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
        query: FindingQuery,
    ) -> Result<Page<ControlFinding>, StoreError> {
        let rows: Vec<ControlFinding> = match self
            .assessments
            .get(&id)
            .filter(|e| &e.assessment.tenant_id == tenant)
        {
            Some(entry) => entry
                .findings
                .iter()
                .filter(|f| query.status.map(|s| f.status == s).unwrap_or(true))
                .filter(|f| query.severity.map(|s| f.severity == Some(s)).unwrap_or(true))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(Page::slice_of(rows, query.page))
    }

    async fn all_findings(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
    ) -> Result<Vec<ControlFinding>, StoreError> {
        Ok(self
            .assessments
            .get(&id)
            .filter(|e| &e.assessment.tenant_id == tenant)
            .map(|e| e.findings.clone())
            .unwrap_or_default())
    }

    async fn load_finding(
        &self,
        tenant: &TenantId,
        assessment: AssessmentId,
        finding: FindingId,
    ) -> Result<Option<ControlFinding>, StoreError> {
        Ok(self
            .assessments
            .get(&assessment)
            .filter(|e| &e.assessment.tenant_id == tenant)
            .and_then(|e| e.findings.iter().find(|f| f.id == finding).cloned()))
    }

    async fn update_finding(&self, finding: &ControlFinding) -> Result<(), AssessError> {
        let mut entry = self
            .assessments
            .get_mut(&finding.assessment_id)
            .filter(|e| e.assessment.tenant_id == finding.tenant_id)
            .ok_or(AssessError::NotFound {
                id: finding.assessment_id,
            })?;

        match entry.findings.iter_mut().find(|f| f.id == finding.id) {
            Some(stored) => {
                *stored = finding.clone();
                Ok(())
            }
            None => Err(AssessError::FindingNotFound { id: finding.id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::TargetSystem;
    use veris_core::FrameworkId;

    fn assessment(tenant: &str) -> ComplianceAssessment {
        ComplianceAssessment::new(
            TenantId::new(tenant).unwrap(),
            FrameworkId::new("iso27001"),
            TargetSystem {
                name: "billing-service".into(),
                description: None,
            },
            vec![],
            vec![],
        )
    }

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let store = MemoryAssessmentStore::new();
        let a = assessment("t1");
        store.insert(&a).await.unwrap();
        assert!(matches!(
            store.insert(&a).await.unwrap_err(),
            StoreError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn load_is_tenant_isolated() {
        let store = MemoryAssessmentStore::new();
        let a = assessment("t1");
        store.insert(&a).await.unwrap();

        let other = TenantId::new("t2").unwrap();
        assert!(store.load(&other, a.id).await.unwrap().is_none());
        assert!(store
            .load(&a.tenant_id.clone(), a.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn begin_run_claims_exactly_once() {
        let store = MemoryAssessmentStore::new();
        let a = assessment("t1");
        let tenant = a.tenant_id.clone();
        store.insert(&a).await.unwrap();

        store.begin_run(&tenant, a.id, Timestamp::now()).await.unwrap();
        let err = store
            .begin_run(&tenant, a.id, Timestamp::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AssessError::InvalidState {
                status: AssessmentStatus::InProgress,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn fail_then_rerun_is_allowed() {
        let store = MemoryAssessmentStore::new();
        let a = assessment("t1");
        let tenant = a.tenant_id.clone();
        store.insert(&a).await.unwrap();

        store.begin_run(&tenant, a.id, Timestamp::now()).await.unwrap();
        store
            .fail_run(&tenant, a.id, "catalog unreachable", Timestamp::now())
            .await
            .unwrap();

        let stored = store.load(&tenant, a.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AssessmentStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("catalog unreachable"));
        // Failed runs may be retried.
        store.begin_run(&tenant, a.id, Timestamp::now()).await.unwrap();
    }

    #[tokio::test]
    async fn update_completed_requires_completed_status() {
        let store = MemoryAssessmentStore::new();
        let a = assessment("t1");
        store.insert(&a).await.unwrap();
        let err = store.update_completed(&a).await.unwrap_err();
        assert!(matches!(err, AssessError::InvalidState { .. }));
    }
}
