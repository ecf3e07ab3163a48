//! # Assessment Engine
//!
//! Orchestrates the assessment lifecycle: create → run →
//! completed/failed, plus finding queries, the human-override operation,
//! and the explicit score recompute.
//!
//! ## Run Execution
//!
//! A run touches storage in three transactional units (see the store
//! contract), so the assessment's row lock is never held across evaluator
//! I/O:
//!
//! 1. Claim: `begin_run` transitions a runnable assessment to
//!    `in_progress` under the row lock. Concurrent runs race here —
//!    exactly one proceeds, the loser fails fast with `InvalidState`.
//! 2. Evaluate: resolve the control set (scope ∩ catalog − exclusions),
//!    order deterministically by descending implementation priority with
//!    catalog order as tiebreak, and evaluate each control under the
//!    per-control timeout budget while tracking the global run deadline.
//!    A control that cannot be evaluated is recorded `not_assessed` with
//!    zero confidence — never silently skipped.
//! 3. Commit: `complete_run` writes all findings plus the aggregates,
//!    score, and risk level atomically. Any failure in 2–3 routes to
//!    `fail_run` instead — no partial findings are ever visible.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use veris_core::{
    AssessmentId, FindingId, Page, PageRequest, ServiceContext, Timestamp, ValidationError,
};

use crate::assessment::{
    AiMetadata, AssessmentStatus, ComplianceAssessment, HumanReview, TargetSystem,
};
use crate::catalog::{Control, ControlCatalog};
use crate::evaluator::ControlEvaluator;
use crate::finding::{ControlFinding, FindingQuery, FindingUpdate, HumanVerification};
use crate::scoring::{self, RiskPolicy};
use crate::store::{AssessError, AssessmentStore};

/// Request to create an assessment.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct CreateAssessmentRequest {
    /// Framework whose controls will be evaluated.
    pub framework_id: veris_core::FrameworkId,
    /// Display name of the target system.
    pub target_name: String,
    /// Free-text description of the target system.
    #[serde(default)]
    pub target_description: Option<String>,
    /// Domain filters; empty means the whole framework.
    #[serde(default)]
    pub scope: Vec<String>,
    /// Controls excluded by id.
    #[serde(default)]
    pub excluded_controls: Vec<veris_core::ControlId>,
}

/// Options for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Whether to request AI assistance from the evaluator. When false,
    /// every control is recorded `not_assessed` with zero confidence.
    pub use_ai: bool,
    /// Timeout budget per control evaluation.
    pub control_timeout: Duration,
    /// Global deadline for the whole run. Exceeding it fails the run
    /// with a recorded timeout reason rather than leaving it
    /// `in_progress` indefinitely.
    pub run_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_ai: true,
            control_timeout: Duration::from_secs(30),
            run_timeout: Duration::from_secs(600),
        }
    }
}

/// The assessment engine.
///
/// Cheap to clone; the store, catalog, and evaluator handles are shared.
/// All collaborators are injected — lifecycle is owned by the process
/// entry point.
#[derive(Clone)]
pub struct AssessmentEngine {
    store: Arc<dyn AssessmentStore>,
    catalog: Arc<dyn ControlCatalog>,
    evaluator: Arc<dyn ControlEvaluator>,
    risk_policy: RiskPolicy,
}

impl AssessmentEngine {
    /// Create an engine with the default risk policy.
    pub fn new(
        store: Arc<dyn AssessmentStore>,
        catalog: Arc<dyn ControlCatalog>,
        evaluator: Arc<dyn ControlEvaluator>,
    ) -> Self {
        Self {
            store,
            catalog,
            evaluator,
            risk_policy: RiskPolicy::default(),
        }
    }

    /// Override the risk policy.
    pub fn with_risk_policy(mut self, risk_policy: RiskPolicy) -> Self {
        self.risk_policy = risk_policy;
        self
    }

    /// Create a new assessment in `pending` status.
    ///
    /// The referenced framework must exist and be active. No controls are
    /// evaluated here — creation and execution are decoupled so a
    /// misconfigured assessment can be inspected before cost is incurred.
    pub async fn create_assessment(
        &self,
        ctx: &ServiceContext,
        request: CreateAssessmentRequest,
    ) -> Result<ComplianceAssessment, AssessError> {
        if request.target_name.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "target_name",
            }
            .into());
        }

        let framework = self.catalog.framework(&request.framework_id).await?;
        match framework {
            Some(f) if f.active => {}
            _ => {
                return Err(AssessError::FrameworkNotFound {
                    id: request.framework_id,
                })
            }
        }

        let assessment = ComplianceAssessment::new(
            ctx.tenant_id.clone(),
            request.framework_id,
            TargetSystem {
                name: request.target_name,
                description: request.target_description,
            },
            request.scope,
            request.excluded_controls,
        );
        self.store.insert(&assessment).await?;
        tracing::info!(
            tenant = %ctx.tenant_id,
            assessment = %assessment.id,
            framework = %assessment.framework_id,
            "assessment created"
        );
        Ok(assessment)
    }

    /// Execute one run.
    pub async fn run_assessment(
        &self,
        ctx: &ServiceContext,
        id: AssessmentId,
        options: RunOptions,
    ) -> Result<ComplianceAssessment, AssessError> {
        // Phase 1: claim the assessment. Failure here means nothing was
        // transitioned — surface it as-is (InvalidState for the loser of
        // a concurrent race, NotFound for a bad id).
        let assessment = self
            .store
            .begin_run(&ctx.tenant_id, id, Timestamp::now())
            .await?;
        tracing::info!(
            tenant = %ctx.tenant_id,
            assessment = %id,
            framework = %assessment.framework_id,
            use_ai = options.use_ai,
            "assessment run started"
        );

        // Phases 2–3. Any failure routes the assessment to `failed` so it
        // never lingers in `in_progress`; the original error is surfaced.
        match self.execute_run(ctx, assessment, &options).await {
            Ok(completed) => Ok(completed),
            Err(err) => {
                let reason = err.to_string();
                if let Err(fail_err) = self
                    .store
                    .fail_run(&ctx.tenant_id, id, &reason, Timestamp::now())
                    .await
                {
                    tracing::error!(
                        tenant = %ctx.tenant_id,
                        assessment = %id,
                        error = %fail_err,
                        "failed to record run failure"
                    );
                }
                tracing::warn!(
                    tenant = %ctx.tenant_id,
                    assessment = %id,
                    error = %reason,
                    "assessment run failed"
                );
                Err(err)
            }
        }
    }

    /// Phases 2–3 of a run: evaluate every applicable control, then
    /// commit findings and aggregates atomically.
    async fn execute_run(
        &self,
        ctx: &ServiceContext,
        mut assessment: ComplianceAssessment,
        options: &RunOptions,
    ) -> Result<ComplianceAssessment, AssessError> {
        let started = Instant::now();

        let mut controls = self
            .catalog
            .list_controls(
                &assessment.framework_id,
                &assessment.scope,
                &assessment.excluded_controls,
            )
            .await?;
        // Deterministic evaluation order: descending implementation
        // priority, catalog order on ties (stable sort). Correctness does
        // not depend on this, but log and evidence ordering must be
        // reproducible.
        controls.sort_by(|a, b| b.implementation_priority.cmp(&a.implementation_priority));

        let mut findings = Vec::with_capacity(controls.len());
        for control in &controls {
            if started.elapsed() >= options.run_timeout {
                return Err(AssessError::RunTimeout {
                    budget_secs: options.run_timeout.as_secs(),
                });
            }
            let finding = self
                .evaluate_control(ctx, &assessment, control, options)
                .await?;
            findings.push(finding);
        }

        let totals = scoring::aggregate(&findings);
        let score = scoring::score(&totals);
        let risk_level = self.risk_policy.risk_for(score);

        assessment.status = AssessmentStatus::Completed;
        assessment.completed_at = Some(Timestamp::now());
        assessment.totals = totals;
        assessment.score = score;
        assessment.risk_level = Some(risk_level);
        assessment.ai = AiMetadata {
            enabled: options.use_ai,
            model: self.evaluator.model_id(),
            mean_confidence: scoring::mean_confidence(&findings),
        };
        assessment.failure_reason = None;

        self.store.complete_run(&assessment, &findings).await?;
        tracing::info!(
            tenant = %ctx.tenant_id,
            assessment = %assessment.id,
            controls = findings.len(),
            score,
            risk = %risk_level,
            "assessment run completed"
        );
        Ok(assessment)
    }

    /// Evaluate one control, classifying every non-systemic failure as a
    /// `not_assessed` finding. Returns an error only for systemic
    /// evaluator failure, which aborts the run.
    async fn evaluate_control(
        &self,
        ctx: &ServiceContext,
        assessment: &ComplianceAssessment,
        control: &Control,
        options: &RunOptions,
    ) -> Result<ControlFinding, AssessError> {
        if !options.use_ai {
            return Ok(ControlFinding::not_assessed(
                ctx.tenant_id.clone(),
                assessment.id,
                control,
                "AI assistance disabled for this run",
            ));
        }

        let evaluation = tokio::time::timeout(
            options.control_timeout,
            self.evaluator.evaluate(control, &assessment.target, true),
        )
        .await;

        match evaluation {
            Ok(Ok(evaluation)) => Ok(ControlFinding::from_evaluation(
                ctx.tenant_id.clone(),
                assessment.id,
                control,
                evaluation,
            )),
            Ok(Err(err)) if err.is_systemic() => Err(err.into()),
            Ok(Err(err)) => {
                tracing::warn!(
                    tenant = %ctx.tenant_id,
                    assessment = %assessment.id,
                    control = %control.id,
                    error = %err,
                    "control evaluation failed, recording not_assessed"
                );
                Ok(ControlFinding::not_assessed(
                    ctx.tenant_id.clone(),
                    assessment.id,
                    control,
                    format!("evaluation failed: {err}"),
                ))
            }
            Err(_) => {
                tracing::warn!(
                    tenant = %ctx.tenant_id,
                    assessment = %assessment.id,
                    control = %control.id,
                    budget_ms = options.control_timeout.as_millis() as u64,
                    "control evaluation timed out, recording not_assessed"
                );
                Ok(ControlFinding::not_assessed(
                    ctx.tenant_id.clone(),
                    assessment.id,
                    control,
                    format!(
                        "evaluation timed out after {}ms",
                        options.control_timeout.as_millis()
                    ),
                ))
            }
        }
    }

    /// Load one assessment.
    pub async fn get_assessment(
        &self,
        ctx: &ServiceContext,
        id: AssessmentId,
    ) -> Result<ComplianceAssessment, AssessError> {
        self.store
            .load(&ctx.tenant_id, id)
            .await?
            .ok_or(AssessError::NotFound { id })
    }

    /// List the tenant's assessments, newest-first.
    pub async fn list_assessments(
        &self,
        ctx: &ServiceContext,
        page: PageRequest,
    ) -> Result<Page<ComplianceAssessment>, AssessError> {
        Ok(self.store.list(&ctx.tenant_id, page).await?)
    }

    /// Query an assessment's findings.
    pub async fn get_findings(
        &self,
        ctx: &ServiceContext,
        id: AssessmentId,
        query: FindingQuery,
    ) -> Result<Page<ControlFinding>, AssessError> {
        // Distinguish "no findings" from "no assessment".
        if self.store.load(&ctx.tenant_id, id).await?.is_none() {
            return Err(AssessError::NotFound { id });
        }
        Ok(self.store.findings(&ctx.tenant_id, id, query).await?)
    }

    /// Human override of one finding.
    ///
    /// Sets the human-verification sub-record (verified, by whom, when).
    /// Never recomputes the assessment score — recomputation is the
    /// explicit [`AssessmentEngine::recompute_score`] operation, not a
    /// side effect of a finding edit.
    pub async fn update_finding(
        &self,
        ctx: &ServiceContext,
        id: AssessmentId,
        finding_id: FindingId,
        update: FindingUpdate,
    ) -> Result<ControlFinding, AssessError> {
        let mut finding = self
            .store
            .load_finding(&ctx.tenant_id, id, finding_id)
            .await?
            .ok_or(AssessError::FindingNotFound { id: finding_id })?;

        if let Some(status) = update.status {
            finding.status = status;
        }
        if let Some(severity) = update.severity {
            finding.severity = Some(severity);
        }
        if let Some(remediation) = update.remediation {
            finding.remediation = remediation;
        }
        finding.evidence.extend(update.evidence);
        finding.human_verification = HumanVerification {
            verified: true,
            verified_by: Some(ctx.actor_id.clone()),
            verified_at: Some(Timestamp::now()),
        };
        finding.updated_at = Timestamp::now();

        self.store.update_finding(&finding).await?;
        tracing::info!(
            tenant = %ctx.tenant_id,
            assessment = %id,
            finding = %finding_id,
            actor = %ctx.actor_id,
            "finding updated by human override"
        );
        Ok(finding)
    }

    /// Explicitly recompute aggregates, score, and risk level from the
    /// stored findings of a `completed` assessment.
    pub async fn recompute_score(
        &self,
        ctx: &ServiceContext,
        id: AssessmentId,
    ) -> Result<ComplianceAssessment, AssessError> {
        let mut assessment = self.get_assessment(ctx, id).await?;
        if assessment.status != AssessmentStatus::Completed {
            return Err(AssessError::InvalidState {
                status: assessment.status,
                operation: "recompute score for",
            });
        }

        let findings = self.store.all_findings(&ctx.tenant_id, id).await?;
        let totals = scoring::aggregate(&findings);
        let score = scoring::score(&totals);
        assessment.totals = totals;
        assessment.score = score;
        assessment.risk_level = Some(self.risk_policy.risk_for(score));

        self.store.update_completed(&assessment).await?;
        tracing::info!(
            tenant = %ctx.tenant_id,
            assessment = %id,
            score,
            "assessment score recomputed"
        );
        Ok(assessment)
    }

    /// Annotate a `completed` assessment with a human review note.
    pub async fn review_assessment(
        &self,
        ctx: &ServiceContext,
        id: AssessmentId,
        note: String,
    ) -> Result<ComplianceAssessment, AssessError> {
        if note.trim().is_empty() {
            return Err(ValidationError::Empty { field: "note" }.into());
        }
        let mut assessment = self.get_assessment(ctx, id).await?;
        if assessment.status != AssessmentStatus::Completed {
            return Err(AssessError::InvalidState {
                status: assessment.status,
                operation: "review",
            });
        }
        assessment.human_review = Some(HumanReview {
            reviewer: ctx.actor_id.clone(),
            note,
            reviewed_at: Timestamp::now(),
        });
        self.store.update_completed(&assessment).await?;
        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use veris_core::{ActorId, ControlId, FrameworkId, TenantId};

    use crate::catalog::{Framework, StaticCatalog};
    use crate::evaluator::{
        ControlEvaluation, EvaluatorError, NullEvaluator, ScriptedEvaluator,
    };
    use crate::finding::{FindingSeverity, FindingStatus};
    use crate::memory::MemoryAssessmentStore;
    use crate::scoring::RiskLevel;

    fn ctx(tenant: &str) -> ServiceContext {
        ServiceContext::new(
            TenantId::new(tenant).unwrap(),
            ActorId::new("auditor-1").unwrap(),
        )
    }

    fn control(id: &str, domain: &str, priority: u8) -> Control {
        Control {
            id: ControlId::new(id),
            domain: domain.into(),
            title: format!("Control {id}"),
            implementation_priority: priority,
            evidence_requirements: vec![],
            risk_category: "security".into(),
        }
    }

    /// Three controls with priorities 90/50/10.
    fn three_control_catalog() -> Arc<StaticCatalog> {
        Arc::new(StaticCatalog::with_frameworks(vec![Framework {
            id: FrameworkId::new("iso27001"),
            name: "ISO/IEC 27001".into(),
            version: "2022".into(),
            active: true,
            controls: vec![
                control("C-90", "access_control", 90),
                control("C-50", "operations_security", 50),
                control("C-10", "governance", 10),
            ],
        }]))
    }

    fn engine_with(
        catalog: Arc<dyn ControlCatalog>,
        evaluator: Arc<dyn ControlEvaluator>,
    ) -> (AssessmentEngine, Arc<MemoryAssessmentStore>) {
        let store = Arc::new(MemoryAssessmentStore::new());
        (
            AssessmentEngine::new(store.clone(), catalog, evaluator),
            store,
        )
    }

    fn create_request(framework: &str) -> CreateAssessmentRequest {
        CreateAssessmentRequest {
            framework_id: FrameworkId::new(framework),
            target_name: "billing-service".into(),
            target_description: Some("payment processing backend".into()),
            scope: vec![],
            excluded_controls: vec![],
        }
    }

    /// Evaluator whose every call is a systemic failure.
    struct BrokenCredentialsEvaluator;

    #[async_trait]
    impl ControlEvaluator for BrokenCredentialsEvaluator {
        async fn evaluate(
            &self,
            _control: &Control,
            _target: &crate::assessment::TargetSystem,
            _use_ai: bool,
        ) -> Result<ControlEvaluation, EvaluatorError> {
            Err(EvaluatorError::Systemic(
                "evaluation service credentials missing".into(),
            ))
        }
    }

    /// Evaluator that sleeps before answering.
    struct SlowEvaluator {
        delay: Duration,
    }

    #[async_trait]
    impl ControlEvaluator for SlowEvaluator {
        async fn evaluate(
            &self,
            _control: &Control,
            _target: &crate::assessment::TargetSystem,
            _use_ai: bool,
        ) -> Result<ControlEvaluation, EvaluatorError> {
            tokio::time::sleep(self.delay).await;
            Ok(ScriptedEvaluator::outcome(FindingStatus::Compliant, None, 0.9))
        }
    }

    // ── creation ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_requires_known_active_framework() {
        let (engine, _) = engine_with(
            three_control_catalog(),
            Arc::new(NullEvaluator),
        );
        let err = engine
            .create_assessment(&ctx("t1"), create_request("pci-dss"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssessError::FrameworkNotFound { .. }));
    }

    #[tokio::test]
    async fn create_rejects_inactive_framework() {
        let catalog = Arc::new(StaticCatalog::with_frameworks(vec![Framework {
            id: FrameworkId::new("retired"),
            name: "Retired Framework".into(),
            version: "1.0".into(),
            active: false,
            controls: vec![control("R-1", "governance", 50)],
        }]));
        let (engine, _) = engine_with(catalog, Arc::new(NullEvaluator));
        let err = engine
            .create_assessment(&ctx("t1"), create_request("retired"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssessError::FrameworkNotFound { .. }));
    }

    #[tokio::test]
    async fn create_rejects_empty_target_name() {
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(NullEvaluator));
        let mut request = create_request("iso27001");
        request.target_name = "   ".into();
        let err = engine
            .create_assessment(&ctx("t1"), request)
            .await
            .unwrap_err();
        assert!(matches!(err, AssessError::Validation(_)));
    }

    #[tokio::test]
    async fn create_does_not_evaluate_controls() {
        let (engine, store) = engine_with(three_control_catalog(), Arc::new(NullEvaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        assert_eq!(assessment.status, AssessmentStatus::Pending);
        let findings = store
            .all_findings(&ctx.tenant_id, assessment.id)
            .await
            .unwrap();
        assert!(findings.is_empty());
    }

    // ── running ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn run_scenario_two_of_three_compliant() {
        let evaluator = ScriptedEvaluator::new()
            .with_outcome(
                ControlId::new("C-90"),
                ScriptedEvaluator::outcome(FindingStatus::Compliant, None, 0.9),
            )
            .with_outcome(
                ControlId::new("C-50"),
                ScriptedEvaluator::outcome(FindingStatus::Compliant, None, 0.8),
            )
            .with_outcome(
                ControlId::new("C-10"),
                ScriptedEvaluator::outcome(
                    FindingStatus::NonCompliant,
                    Some(FindingSeverity::Major),
                    0.7,
                ),
            )
            .with_model("scripted-v1");
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(evaluator));
        let ctx = ctx("t1");

        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        let completed = engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();

        assert_eq!(completed.status, AssessmentStatus::Completed);
        assert_eq!(completed.totals.controls_assessed, 3);
        assert_eq!(completed.totals.compliant, 2);
        assert_eq!(completed.totals.non_compliant, 1);
        assert_eq!(completed.totals.major_findings, 1);
        assert_eq!(completed.score, 67);
        assert_eq!(completed.risk_level, Some(RiskLevel::High));
        assert_eq!(completed.ai.model.as_deref(), Some("scripted-v1"));
        assert!(completed.started_at.is_some());
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn run_evaluates_in_priority_order() {
        // Two controls share priority 50; catalog order breaks the tie.
        let catalog = Arc::new(StaticCatalog::with_frameworks(vec![Framework {
            id: FrameworkId::new("iso27001"),
            name: "ISO/IEC 27001".into(),
            version: "2022".into(),
            active: true,
            controls: vec![
                control("C-B", "governance", 50),
                control("C-A", "governance", 90),
                control("C-C", "governance", 50),
            ],
        }]));
        let evaluator = ScriptedEvaluator::new().with_fallback(ScriptedEvaluator::outcome(
            FindingStatus::Compliant,
            None,
            0.9,
        ));
        let (engine, store) = engine_with(catalog, Arc::new(evaluator));
        let ctx = ctx("t1");

        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();

        let findings = store
            .all_findings(&ctx.tenant_id, assessment.id)
            .await
            .unwrap();
        let order: Vec<&str> = findings.iter().map(|f| f.control_id.as_str()).collect();
        assert_eq!(order, vec!["C-A", "C-B", "C-C"]);
    }

    #[tokio::test]
    async fn run_respects_scope_and_exclusions() {
        let evaluator = ScriptedEvaluator::new().with_fallback(ScriptedEvaluator::outcome(
            FindingStatus::Compliant,
            None,
            0.9,
        ));
        let (engine, store) = engine_with(three_control_catalog(), Arc::new(evaluator));
        let ctx = ctx("t1");

        let mut request = create_request("iso27001");
        request.scope = vec!["access_control".into(), "governance".into()];
        request.excluded_controls = vec![ControlId::new("C-10")];
        let assessment = engine.create_assessment(&ctx, request).await.unwrap();
        let completed = engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();

        // Scope keeps C-90 (access_control) and C-10 (governance);
        // exclusion then removes C-10.
        assert_eq!(completed.totals.controls_assessed, 1);
        let findings = store
            .all_findings(&ctx.tenant_id, assessment.id)
            .await
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].control_id.as_str(), "C-90");
    }

    #[tokio::test]
    async fn run_without_ai_records_not_assessed() {
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(NullEvaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        let completed = engine
            .run_assessment(
                &ctx,
                assessment.id,
                RunOptions {
                    use_ai: false,
                    ..RunOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(completed.status, AssessmentStatus::Completed);
        assert_eq!(completed.totals.not_assessed, 3);
        assert_eq!(completed.totals.controls_assessed, 0);
        assert_eq!(completed.score, 0);
        assert_eq!(completed.risk_level, Some(RiskLevel::Critical));
        assert_eq!(completed.ai.mean_confidence, 0.0);
        assert!(!completed.ai.enabled);
    }

    #[tokio::test]
    async fn unavailable_evaluator_records_not_assessed() {
        // AI requested but no evaluator is wired: every control is
        // recorded, none silently skipped, and the run still completes.
        let (engine, store) = engine_with(three_control_catalog(), Arc::new(NullEvaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        let completed = engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();

        assert_eq!(completed.status, AssessmentStatus::Completed);
        assert_eq!(completed.totals.not_assessed, 3);
        let findings = store
            .all_findings(&ctx.tenant_id, assessment.id)
            .await
            .unwrap();
        assert_eq!(findings.len(), 3);
        assert!(findings
            .iter()
            .all(|f| f.status == FindingStatus::NotAssessed && f.evaluation.confidence == 0.0));
    }

    #[tokio::test]
    async fn per_control_failure_does_not_abort_run() {
        // C-50 has no scripted outcome and no fallback would exist for
        // it alone — script the other two and let C-50 fail.
        let evaluator = ScriptedEvaluator::new()
            .with_outcome(
                ControlId::new("C-90"),
                ScriptedEvaluator::outcome(FindingStatus::Compliant, None, 0.9),
            )
            .with_outcome(
                ControlId::new("C-10"),
                ScriptedEvaluator::outcome(FindingStatus::Compliant, None, 0.9),
            );
        let (engine, store) = engine_with(three_control_catalog(), Arc::new(evaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        let completed = engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();

        assert_eq!(completed.status, AssessmentStatus::Completed);
        assert_eq!(completed.totals.compliant, 2);
        assert_eq!(completed.totals.not_assessed, 1);
        let findings = store
            .all_findings(&ctx.tenant_id, assessment.id)
            .await
            .unwrap();
        let failed = findings
            .iter()
            .find(|f| f.control_id.as_str() == "C-50")
            .unwrap();
        assert_eq!(failed.status, FindingStatus::NotAssessed);
    }

    #[tokio::test]
    async fn systemic_failure_fails_run_without_findings() {
        let (engine, store) =
            engine_with(three_control_catalog(), Arc::new(BrokenCredentialsEvaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        let err = engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssessError::Evaluator(_)));

        let stored = engine.get_assessment(&ctx, assessment.id).await.unwrap();
        assert_eq!(stored.status, AssessmentStatus::Failed);
        assert!(stored
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("credentials"));
        // Atomicity: no partial findings visible.
        let findings = store
            .all_findings(&ctx.tenant_id, assessment.id)
            .await
            .unwrap();
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn failed_run_can_be_rerun_to_completion() {
        let (engine, _) =
            engine_with(three_control_catalog(), Arc::new(BrokenCredentialsEvaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap_err();

        // Re-run with a working evaluator by rebuilding the engine over
        // the same store.
        let store = engine.store.clone();
        let healthy = AssessmentEngine::new(
            store,
            three_control_catalog(),
            Arc::new(
                ScriptedEvaluator::new().with_fallback(ScriptedEvaluator::outcome(
                    FindingStatus::Compliant,
                    None,
                    0.9,
                )),
            ),
        );
        let completed = healthy
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();
        assert_eq!(completed.status, AssessmentStatus::Completed);
        assert!(completed.failure_reason.is_none());
        assert_eq!(completed.score, 100);
    }

    #[tokio::test]
    async fn run_on_completed_is_invalid_state_and_preserves_findings() {
        let evaluator = ScriptedEvaluator::new().with_fallback(ScriptedEvaluator::outcome(
            FindingStatus::Compliant,
            None,
            0.9,
        ));
        let (engine, store) = engine_with(three_control_catalog(), Arc::new(evaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();
        let before = store
            .all_findings(&ctx.tenant_id, assessment.id)
            .await
            .unwrap();

        let err = engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AssessError::InvalidState {
                status: AssessmentStatus::Completed,
                ..
            }
        ));

        let after = store
            .all_findings(&ctx.tenant_id, assessment.id)
            .await
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn concurrent_runs_one_wins_one_invalid_state() {
        let evaluator = ScriptedEvaluator::new().with_fallback(ScriptedEvaluator::outcome(
            FindingStatus::Compliant,
            None,
            0.9,
        ));
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(evaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();

        let first = tokio::spawn({
            let engine = engine.clone();
            let ctx = ctx.clone();
            let id = assessment.id;
            async move { engine.run_assessment(&ctx, id, RunOptions::default()).await }
        });
        let second = tokio::spawn({
            let engine = engine.clone();
            let ctx = ctx.clone();
            let id = assessment.id;
            async move { engine.run_assessment(&ctx, id, RunOptions::default()).await }
        });

        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one run must proceed");
        let loser = if first.is_err() { first } else { second };
        assert!(matches!(
            loser.unwrap_err(),
            AssessError::InvalidState { .. }
        ));
    }

    // ── timeouts ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn slow_control_times_out_to_not_assessed() {
        let (engine, _) = engine_with(
            three_control_catalog(),
            Arc::new(SlowEvaluator {
                delay: Duration::from_millis(200),
            }),
        );
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        let completed = engine
            .run_assessment(
                &ctx,
                assessment.id,
                RunOptions {
                    control_timeout: Duration::from_millis(20),
                    ..RunOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(completed.status, AssessmentStatus::Completed);
        assert_eq!(completed.totals.not_assessed, 3);
    }

    #[tokio::test]
    async fn exceeding_run_budget_fails_with_timeout_reason() {
        let (engine, store) = engine_with(
            three_control_catalog(),
            Arc::new(SlowEvaluator {
                delay: Duration::from_millis(50),
            }),
        );
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        let err = engine
            .run_assessment(
                &ctx,
                assessment.id,
                RunOptions {
                    run_timeout: Duration::from_millis(10),
                    ..RunOptions::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AssessError::RunTimeout { .. }));

        let stored = engine.get_assessment(&ctx, assessment.id).await.unwrap();
        assert_eq!(stored.status, AssessmentStatus::Failed);
        assert!(stored.failure_reason.as_deref().unwrap().contains("budget"));
        assert!(store
            .all_findings(&ctx.tenant_id, assessment.id)
            .await
            .unwrap()
            .is_empty());
    }

    // ── findings & post-completion operations ────────────────────────

    #[tokio::test]
    async fn findings_filter_by_status_and_severity() {
        let evaluator = ScriptedEvaluator::new()
            .with_outcome(
                ControlId::new("C-90"),
                ScriptedEvaluator::outcome(FindingStatus::Compliant, None, 0.9),
            )
            .with_outcome(
                ControlId::new("C-50"),
                ScriptedEvaluator::outcome(
                    FindingStatus::NonCompliant,
                    Some(FindingSeverity::Critical),
                    0.8,
                ),
            )
            .with_outcome(
                ControlId::new("C-10"),
                ScriptedEvaluator::outcome(
                    FindingStatus::NonCompliant,
                    Some(FindingSeverity::Minor),
                    0.8,
                ),
            );
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(evaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();

        let non_compliant = engine
            .get_findings(
                &ctx,
                assessment.id,
                FindingQuery {
                    status: Some(FindingStatus::NonCompliant),
                    ..FindingQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(non_compliant.total, 2);

        let critical = engine
            .get_findings(
                &ctx,
                assessment.id,
                FindingQuery {
                    severity: Some(FindingSeverity::Critical),
                    ..FindingQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(critical.total, 1);
        assert_eq!(critical.items[0].control_id.as_str(), "C-50");
    }

    #[tokio::test]
    async fn get_findings_unknown_assessment_is_not_found() {
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(NullEvaluator));
        let err = engine
            .get_findings(&ctx("t1"), AssessmentId::new(), FindingQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssessError::NotFound { .. }));
    }

    #[tokio::test]
    async fn human_override_sets_verification_without_rescoring() {
        let evaluator = ScriptedEvaluator::new().with_fallback(ScriptedEvaluator::outcome(
            FindingStatus::NonCompliant,
            Some(FindingSeverity::Major),
            0.8,
        ));
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(evaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        let completed = engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();
        assert_eq!(completed.score, 0);

        let findings = engine
            .get_findings(&ctx, assessment.id, FindingQuery::default())
            .await
            .unwrap();
        let target = &findings.items[0];

        let updated = engine
            .update_finding(
                &ctx,
                assessment.id,
                target.id,
                FindingUpdate {
                    status: Some(FindingStatus::Compliant),
                    severity: None,
                    remediation: None,
                    evidence: vec!["manual review ticket AUD-112".into()],
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, FindingStatus::Compliant);
        assert!(updated.human_verification.verified);
        assert_eq!(
            updated.human_verification.verified_by.as_ref().unwrap(),
            &ctx.actor_id
        );
        assert!(updated.human_verification.verified_at.is_some());
        assert!(updated
            .evidence
            .contains(&"manual review ticket AUD-112".to_string()));

        // The override never re-triggers scoring.
        let after = engine.get_assessment(&ctx, assessment.id).await.unwrap();
        assert_eq!(after.score, 0);
    }

    #[tokio::test]
    async fn recompute_score_is_explicit_and_separate() {
        let evaluator = ScriptedEvaluator::new().with_fallback(ScriptedEvaluator::outcome(
            FindingStatus::NonCompliant,
            Some(FindingSeverity::Major),
            0.8,
        ));
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(evaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();

        // Override every finding to compliant, then recompute.
        let findings = engine
            .get_findings(&ctx, assessment.id, FindingQuery::default())
            .await
            .unwrap();
        for finding in &findings.items {
            engine
                .update_finding(
                    &ctx,
                    assessment.id,
                    finding.id,
                    FindingUpdate {
                        status: Some(FindingStatus::Compliant),
                        ..FindingUpdate::default()
                    },
                )
                .await
                .unwrap();
        }

        let recomputed = engine.recompute_score(&ctx, assessment.id).await.unwrap();
        assert_eq!(recomputed.score, 100);
        assert_eq!(recomputed.risk_level, Some(RiskLevel::Low));
    }

    #[tokio::test]
    async fn recompute_score_requires_completed() {
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(NullEvaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        let err = engine
            .recompute_score(&ctx, assessment.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AssessError::InvalidState {
                status: AssessmentStatus::Pending,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn review_annotates_completed_assessment() {
        let evaluator = ScriptedEvaluator::new().with_fallback(ScriptedEvaluator::outcome(
            FindingStatus::Compliant,
            None,
            0.9,
        ));
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(evaluator));
        let ctx = ctx("t1");
        let assessment = engine
            .create_assessment(&ctx, create_request("iso27001"))
            .await
            .unwrap();
        engine
            .run_assessment(&ctx, assessment.id, RunOptions::default())
            .await
            .unwrap();

        let reviewed = engine
            .review_assessment(&ctx, assessment.id, "spot-checked top findings".into())
            .await
            .unwrap();
        let review = reviewed.human_review.unwrap();
        assert_eq!(review.reviewer, ctx.actor_id);
        assert_eq!(review.note, "spot-checked top findings");

        let stored = engine.get_assessment(&ctx, assessment.id).await.unwrap();
        assert!(stored.human_review.is_some());
    }

    #[tokio::test]
    async fn assessments_are_tenant_isolated() {
        let evaluator = ScriptedEvaluator::new().with_fallback(ScriptedEvaluator::outcome(
            FindingStatus::Compliant,
            None,
            0.9,
        ));
        let (engine, _) = engine_with(three_control_catalog(), Arc::new(evaluator));
        let ctx_a = ctx("tenant-a");
        let ctx_b = ctx("tenant-b");
        let assessment = engine
            .create_assessment(&ctx_a, create_request("iso27001"))
            .await
            .unwrap();

        // tenant-b can neither read nor run tenant-a's assessment.
        assert!(matches!(
            engine.get_assessment(&ctx_b, assessment.id).await,
            Err(AssessError::NotFound { .. })
        ));
        assert!(matches!(
            engine
                .run_assessment(&ctx_b, assessment.id, RunOptions::default())
                .await,
            Err(AssessError::NotFound { .. })
        ));

        let list_b = engine
            .list_assessments(&ctx_b, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(list_b.total, 0);
    }
}
