//! Assessment and finding persistence.
//!
//! Run execution touches these tables in three transactional units
//! (claim, commit, fail) — see the store contract in `veris-assess`. The
//! `SELECT … FOR UPDATE` on the assessment row is held from status check
//! through status transition, which is what makes concurrent runs race
//! safely.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use veris_core::{
    AssessmentId, ControlId, FindingId, FrameworkId, Page, PageRequest, StoreError, TenantId,
    Timestamp,
};
use veris_assess::{
    AiMetadata, AssessError, AssessmentStatus, AssessmentStore, AssessmentTotals,
    ComplianceAssessment, ControlFinding, FindingQuery, TargetSystem,
};

use super::{json_err, store_err};

/// PostgreSQL [`AssessmentStore`] backend.
#[derive(Debug, Clone)]
pub struct PgAssessmentStore {
    pool: PgPool,
}

impl PgAssessmentStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ASSESSMENT_COLUMNS: &str = "id, tenant_id, framework_id, target_name, target_description,
    scope, excluded_controls, status,
    controls_assessed, compliant, non_compliant, partial, not_applicable, not_assessed,
    critical_findings, major_findings, minor_findings, observation_findings,
    score, risk_level, ai, human_review, failure_reason,
    created_at, started_at, completed_at";

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct AssessmentRow {
    id: Uuid,
    tenant_id: String,
    framework_id: String,
    target_name: String,
    target_description: Option<String>,
    scope: serde_json::Value,
    excluded_controls: serde_json::Value,
    status: String,
    controls_assessed: i32,
    compliant: i32,
    non_compliant: i32,
    partial: i32,
    not_applicable: i32,
    not_assessed: i32,
    critical_findings: i32,
    major_findings: i32,
    minor_findings: i32,
    observation_findings: i32,
    score: i16,
    risk_level: Option<String>,
    ai: serde_json::Value,
    human_review: Option<serde_json::Value>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl AssessmentRow {
    fn into_record(self) -> Result<ComplianceAssessment, StoreError> {
        let status: AssessmentStatus = self
            .status
            .parse()
            .map_err(|_| StoreError::Decode(format!("unknown status {:?}", self.status)))?;
        let risk_level = match self.risk_level.as_deref() {
            Some(level) => Some(level.parse().map_err(|_| {
                StoreError::Decode(format!("unknown risk level {level:?}"))
            })?),
            None => None,
        };
        let scope: Vec<String> = serde_json::from_value(self.scope)
            .map_err(|e| json_err("compliance_assessments.scope", e))?;
        let excluded_controls: Vec<ControlId> = serde_json::from_value(self.excluded_controls)
            .map_err(|e| json_err("compliance_assessments.excluded_controls", e))?;
        let ai: AiMetadata = serde_json::from_value(self.ai)
            .map_err(|e| json_err("compliance_assessments.ai", e))?;
        let human_review = match self.human_review {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| json_err("compliance_assessments.human_review", e))?,
            ),
            None => None,
        };

        Ok(ComplianceAssessment {
            id: AssessmentId(self.id),
            tenant_id: TenantId::new(self.tenant_id)
                .map_err(|e| StoreError::Decode(format!("tenant_id: {e}")))?,
            framework_id: FrameworkId::new(self.framework_id),
            target: TargetSystem {
                name: self.target_name,
                description: self.target_description,
            },
            scope,
            excluded_controls,
            status,
            totals: AssessmentTotals {
                controls_assessed: self.controls_assessed as u32,
                compliant: self.compliant as u32,
                non_compliant: self.non_compliant as u32,
                partial: self.partial as u32,
                not_applicable: self.not_applicable as u32,
                not_assessed: self.not_assessed as u32,
                critical_findings: self.critical_findings as u32,
                major_findings: self.major_findings as u32,
                minor_findings: self.minor_findings as u32,
                observation_findings: self.observation_findings as u32,
            },
            score: self.score as u8,
            risk_level,
            ai,
            human_review,
            failure_reason: self.failure_reason,
            created_at: Timestamp::from_utc(self.created_at),
            started_at: self.started_at.map(Timestamp::from_utc),
            completed_at: self.completed_at.map(Timestamp::from_utc),
        })
    }
}

/// Internal finding row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct FindingRow {
    id: Uuid,
    assessment_id: Uuid,
    tenant_id: String,
    control_id: String,
    status: String,
    severity: Option<String>,
    title: String,
    description: String,
    evidence: serde_json::Value,
    evaluation: serde_json::Value,
    remediation: serde_json::Value,
    human_verification: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FindingRow {
    fn into_record(self) -> Result<ControlFinding, StoreError> {
        let status = self
            .status
            .parse()
            .map_err(|_| StoreError::Decode(format!("unknown finding status {:?}", self.status)))?;
        let severity = match self.severity.as_deref() {
            Some(severity) => Some(severity.parse().map_err(|_| {
                StoreError::Decode(format!("unknown finding severity {severity:?}"))
            })?),
            None => None,
        };
        Ok(ControlFinding {
            id: FindingId(self.id),
            assessment_id: AssessmentId(self.assessment_id),
            tenant_id: TenantId::new(self.tenant_id)
                .map_err(|e| StoreError::Decode(format!("tenant_id: {e}")))?,
            control_id: ControlId::new(self.control_id),
            status,
            severity,
            title: self.title,
            description: self.description,
            evidence: serde_json::from_value(self.evidence)
                .map_err(|e| json_err("control_findings.evidence", e))?,
            evaluation: serde_json::from_value(self.evaluation)
                .map_err(|e| json_err("control_findings.evaluation", e))?,
            remediation: serde_json::from_value(self.remediation)
                .map_err(|e| json_err("control_findings.remediation", e))?,
            human_verification: serde_json::from_value(self.human_verification)
                .map_err(|e| json_err("control_findings.human_verification", e))?,
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        })
    }
}

/// Lock and fetch an assessment row for the transaction's duration.
async fn select_for_update(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    id: AssessmentId,
) -> Result<Option<ComplianceAssessment>, StoreError> {
    let sql = format!(
        "SELECT {ASSESSMENT_COLUMNS} FROM compliance_assessments
         WHERE id = $1 AND tenant_id = $2 FOR UPDATE"
    );
    let row = sqlx::query_as::<_, AssessmentRow>(&sql)
        .bind(id.0)
        .bind(tenant.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(store_err)?;
    row.map(AssessmentRow::into_record).transpose()
}

/// Persist every column of the assessment row.
async fn update_assessment(
    tx: &mut Transaction<'_, Postgres>,
    assessment: &ComplianceAssessment,
) -> Result<(), StoreError> {
    let ai = serde_json::to_value(&assessment.ai).map_err(|e| json_err("ai encode", e))?;
    let human_review = assessment
        .human_review
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| json_err("human_review encode", e))?;

    sqlx::query(
        "UPDATE compliance_assessments SET
            status = $1,
            controls_assessed = $2, compliant = $3, non_compliant = $4, partial = $5,
            not_applicable = $6, not_assessed = $7,
            critical_findings = $8, major_findings = $9, minor_findings = $10,
            observation_findings = $11,
            score = $12, risk_level = $13, ai = $14, human_review = $15,
            failure_reason = $16, started_at = $17, completed_at = $18
         WHERE id = $19 AND tenant_id = $20",
    )
    .bind(assessment.status.as_str())
    .bind(assessment.totals.controls_assessed as i32)
    .bind(assessment.totals.compliant as i32)
    .bind(assessment.totals.non_compliant as i32)
    .bind(assessment.totals.partial as i32)
    .bind(assessment.totals.not_applicable as i32)
    .bind(assessment.totals.not_assessed as i32)
    .bind(assessment.totals.critical_findings as i32)
    .bind(assessment.totals.major_findings as i32)
    .bind(assessment.totals.minor_findings as i32)
    .bind(assessment.totals.observation_findings as i32)
    .bind(i16::from(assessment.score))
    .bind(assessment.risk_level.map(|r| r.as_str()))
    .bind(&ai)
    .bind(human_review)
    .bind(assessment.failure_reason.as_deref())
    .bind(assessment.started_at.map(|t| *t.as_datetime()))
    .bind(assessment.completed_at.map(|t| *t.as_datetime()))
    .bind(assessment.id.0)
    .bind(assessment.tenant_id.as_str())
    .execute(&mut **tx)
    .await
    .map_err(store_err)?;
    Ok(())
}

/// Insert one finding row.
async fn insert_finding(
    tx: &mut Transaction<'_, Postgres>,
    finding: &ControlFinding,
) -> Result<(), StoreError> {
    let evidence =
        serde_json::to_value(&finding.evidence).map_err(|e| json_err("evidence encode", e))?;
    let evaluation =
        serde_json::to_value(&finding.evaluation).map_err(|e| json_err("evaluation encode", e))?;
    let remediation = serde_json::to_value(&finding.remediation)
        .map_err(|e| json_err("remediation encode", e))?;
    let human_verification = serde_json::to_value(&finding.human_verification)
        .map_err(|e| json_err("human_verification encode", e))?;

    sqlx::query(
        "INSERT INTO control_findings
           (id, assessment_id, tenant_id, control_id, status, severity,
            title, description, evidence, evaluation, remediation, human_verification,
            created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(finding.id.0)
    .bind(finding.assessment_id.0)
    .bind(finding.tenant_id.as_str())
    .bind(finding.control_id.as_str())
    .bind(finding.status.as_str())
    .bind(finding.severity.map(|s| s.as_str()))
    .bind(&finding.title)
    .bind(&finding.description)
    .bind(&evidence)
    .bind(&evaluation)
    .bind(&remediation)
    .bind(&human_verification)
    .bind(*finding.created_at.as_datetime())
    .bind(*finding.updated_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(store_err)?;
    Ok(())
}

#[async_trait::async_trait]
impl AssessmentStore for PgAssessmentStore {
    async fn insert(&self, assessment: &ComplianceAssessment) -> Result<(), StoreError> {
        let scope =
            serde_json::to_value(&assessment.scope).map_err(|e| json_err("scope encode", e))?;
        let excluded = serde_json::to_value(&assessment.excluded_controls)
            .map_err(|e| json_err("excluded_controls encode", e))?;
        let ai = serde_json::to_value(&assessment.ai).map_err(|e| json_err("ai encode", e))?;

        sqlx::query(
            "INSERT INTO compliance_assessments
               (id, tenant_id, framework_id, target_name, target_description,
                scope, excluded_controls, status,
                controls_assessed, compliant, non_compliant, partial, not_applicable, not_assessed,
                critical_findings, major_findings, minor_findings, observation_findings,
                score, risk_level, ai, human_review, failure_reason,
                created_at, started_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                     0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
                     0, NULL, $9, NULL, NULL, $10, NULL, NULL)",
        )
        .bind(assessment.id.0)
        .bind(assessment.tenant_id.as_str())
        .bind(assessment.framework_id.as_str())
        .bind(&assessment.target.name)
        .bind(assessment.target.description.as_deref())
        .bind(&scope)
        .bind(&excluded)
        .bind(assessment.status.as_str())
        .bind(&ai)
        .bind(*assessment.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn load(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
    ) -> Result<Option<ComplianceAssessment>, StoreError> {
        let sql = format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM compliance_assessments
             WHERE id = $1 AND tenant_id = $2"
        );
        let row = sqlx::query_as::<_, AssessmentRow>(&sql)
            .bind(id.0)
            .bind(tenant.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(AssessmentRow::into_record).transpose()
    }

    async fn list(
        &self,
        tenant: &TenantId,
        page: PageRequest,
    ) -> Result<Page<ComplianceAssessment>, StoreError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM compliance_assessments WHERE tenant_id = $1")
                .bind(tenant.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(store_err)?;

        let sql = format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM compliance_assessments
             WHERE tenant_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, AssessmentRow>(&sql)
            .bind(tenant.as_str())
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        let items = rows
            .into_iter()
            .map(AssessmentRow::into_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total: total as u64,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn begin_run(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
        started_at: Timestamp,
    ) -> Result<ComplianceAssessment, AssessError> {
        // Row lock held from status check through the in_progress
        // transition — exactly one concurrent caller gets through.
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let mut assessment = select_for_update(&mut tx, tenant, id)
            .await?
            .ok_or(AssessError::NotFound { id })?;

        if !assessment.status.can_start() {
            return Err(AssessError::InvalidState {
                status: assessment.status,
                operation: "run",
            });
        }

        assessment.status = AssessmentStatus::InProgress;
        assessment.started_at = Some(started_at);
        assessment.completed_at = None;
        assessment.failure_reason = None;
        update_assessment(&mut tx, &assessment).await?;

        tx.commit().await.map_err(store_err)?;
        Ok(assessment)
    }

    async fn complete_run(
        &self,
        assessment: &ComplianceAssessment,
        findings: &[ControlFinding],
    ) -> Result<(), AssessError> {
        // Terminal state and the complete finding set commit atomically;
        // dropping the transaction on any error rolls everything back.
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let stored = select_for_update(&mut tx, &assessment.tenant_id, assessment.id)
            .await?
            .ok_or(AssessError::NotFound { id: assessment.id })?;
        if stored.status != AssessmentStatus::InProgress {
            return Err(AssessError::InvalidState {
                status: stored.status,
                operation: "complete",
            });
        }

        update_assessment(&mut tx, assessment).await?;
        for finding in findings {
            insert_finding(&mut tx, finding).await?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn fail_run(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
        reason: &str,
        completed_at: Timestamp,
    ) -> Result<(), AssessError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let mut assessment = select_for_update(&mut tx, tenant, id)
            .await?
            .ok_or(AssessError::NotFound { id })?;
        if assessment.status != AssessmentStatus::InProgress {
            return Err(AssessError::InvalidState {
                status: assessment.status,
                operation: "fail",
            });
        }

        assessment.status = AssessmentStatus::Failed;
        assessment.failure_reason = Some(reason.to_string());
        assessment.completed_at = Some(completed_at);
        update_assessment(&mut tx, &assessment).await?;

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn update_completed(
        &self,
        assessment: &ComplianceAssessment,
    ) -> Result<(), AssessError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let stored = select_for_update(&mut tx, &assessment.tenant_id, assessment.id)
            .await?
            .ok_or(AssessError::NotFound { id: assessment.id })?;
        if stored.status != AssessmentStatus::Completed {
            return Err(AssessError::InvalidState {
                status: stored.status,
                operation: "update",
            });
        }

        update_assessment(&mut tx, assessment).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn findings(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
        query: FindingQuery,
    ) -> Result<Page<ControlFinding>, StoreError> {
        let status = query.status.map(|s| s.as_str());
        let severity = query.severity.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM control_findings
             WHERE assessment_id = $1 AND tenant_id = $2
               AND ($3::text IS NULL OR status = $3)
               AND ($4::text IS NULL OR severity = $4)",
        )
        .bind(id.0)
        .bind(tenant.as_str())
        .bind(status)
        .bind(severity)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        let rows = sqlx::query_as::<_, FindingRow>(
            "SELECT id, assessment_id, tenant_id, control_id, status, severity,
                    title, description, evidence, evaluation, remediation, human_verification,
                    created_at, updated_at
             FROM control_findings
             WHERE assessment_id = $1 AND tenant_id = $2
               AND ($3::text IS NULL OR status = $3)
               AND ($4::text IS NULL OR severity = $4)
             ORDER BY created_at, id
             LIMIT $5 OFFSET $6",
        )
        .bind(id.0)
        .bind(tenant.as_str())
        .bind(status)
        .bind(severity)
        .bind(i64::from(query.page.limit))
        .bind(i64::from(query.page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let items = rows
            .into_iter()
            .map(FindingRow::into_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total: total as u64,
            limit: query.page.limit,
            offset: query.page.offset,
        })
    }

    async fn all_findings(
        &self,
        tenant: &TenantId,
        id: AssessmentId,
    ) -> Result<Vec<ControlFinding>, StoreError> {
        let rows = sqlx::query_as::<_, FindingRow>(
            "SELECT id, assessment_id, tenant_id, control_id, status, severity,
                    title, description, evidence, evaluation, remediation, human_verification,
                    created_at, updated_at
             FROM control_findings
             WHERE assessment_id = $1 AND tenant_id = $2
             ORDER BY created_at, id",
        )
        .bind(id.0)
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(FindingRow::into_record).collect()
    }

    async fn load_finding(
        &self,
        tenant: &TenantId,
        assessment: AssessmentId,
        finding: FindingId,
    ) -> Result<Option<ControlFinding>, StoreError> {
        let row = sqlx::query_as::<_, FindingRow>(
            "SELECT id, assessment_id, tenant_id, control_id, status, severity,
                    title, description, evidence, evaluation, remediation, human_verification,
                    created_at, updated_at
             FROM control_findings
             WHERE id = $1 AND assessment_id = $2 AND tenant_id = $3",
        )
        .bind(finding.0)
        .bind(assessment.0)
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(FindingRow::into_record).transpose()
    }

    async fn update_finding(&self, finding: &ControlFinding) -> Result<(), AssessError> {
        let evidence =
            serde_json::to_value(&finding.evidence).map_err(|e| json_err("evidence encode", e))?;
        let remediation = serde_json::to_value(&finding.remediation)
            .map_err(|e| json_err("remediation encode", e))?;
        let human_verification = serde_json::to_value(&finding.human_verification)
            .map_err(|e| json_err("human_verification encode", e))?;

        let result = sqlx::query(
            "UPDATE control_findings SET
                status = $1, severity = $2, evidence = $3, remediation = $4,
                human_verification = $5, updated_at = $6
             WHERE id = $7 AND assessment_id = $8 AND tenant_id = $9",
        )
        .bind(finding.status.as_str())
        .bind(finding.severity.map(|s| s.as_str()))
        .bind(&evidence)
        .bind(&remediation)
        .bind(&human_verification)
        .bind(*finding.updated_at.as_datetime())
        .bind(finding.id.0)
        .bind(finding.assessment_id.0)
        .bind(finding.tenant_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(AssessError::FindingNotFound { id: finding.id });
        }
        Ok(())
    }
}
