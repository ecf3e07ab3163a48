//! # Assessment Routes
//!
//! Assessment lifecycle: create, run, inspect, findings, human override,
//! and the explicit score recompute. Creation is guarded by the module
//! gate when the framework corresponds to a compliance module.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use veris_core::{AssessmentId, ComplianceModule, FindingId, Page, PageRequest};
use veris_assess::{
    ComplianceAssessment, ControlFinding, CreateAssessmentRequest, FindingQuery, FindingUpdate,
    RunOptions,
};

use crate::error::AppError;
use crate::extractors::CallerIdentity;
use crate::state::AppState;

/// Build the assessment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/assessments", post(create_assessment).get(list_assessments))
        .route("/v1/assessments/{id}", get(get_assessment))
        .route("/v1/assessments/{id}/run", post(run_assessment))
        .route("/v1/assessments/{id}/score/recompute", post(recompute_score))
        .route("/v1/assessments/{id}/review", put(review_assessment))
        .route("/v1/assessments/{id}/findings", get(get_findings))
        .route(
            "/v1/assessments/{id}/findings/{finding_id}",
            patch(update_finding),
        )
}

/// Body for a run request. All fields optional — defaults: AI assistance
/// on, 30s per control, 600s per run.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RunRequest {
    /// Whether to request AI assistance from the evaluator.
    pub use_ai: Option<bool>,
    /// Per-control timeout budget in seconds.
    pub control_timeout_secs: Option<u64>,
    /// Global run deadline in seconds.
    pub run_timeout_secs: Option<u64>,
}

impl RunRequest {
    fn into_options(self) -> RunOptions {
        let defaults = RunOptions::default();
        RunOptions {
            use_ai: self.use_ai.unwrap_or(defaults.use_ai),
            control_timeout: self
                .control_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.control_timeout),
            run_timeout: self
                .run_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.run_timeout),
        }
    }
}

/// Body for a human review annotation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    /// Review note.
    pub note: String,
}

/// Query parameters for listing assessments.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Query parameters for listing findings.
#[derive(Debug, Deserialize)]
pub struct FindingParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Filter by finding status (e.g. `non_compliant`).
    pub status: Option<String>,
    /// Filter by severity (e.g. `major`).
    pub severity: Option<String>,
}

fn parse_assessment_id(raw: &str) -> Result<AssessmentId, AppError> {
    AssessmentId::parse(raw).map_err(|e| AppError::Validation(e.to_string()))
}

fn parse_finding_id(raw: &str) -> Result<FindingId, AppError> {
    FindingId::parse(raw).map_err(|e| AppError::Validation(e.to_string()))
}

/// POST /v1/assessments — create an assessment in `pending` status.
///
/// When the framework id names a compliance module (e.g. `gdpr`,
/// `iso27001`), the tenant's gate for that module must be open.
#[utoipa::path(
    post,
    path = "/v1/assessments",
    responses(
        (status = 201, description = "Assessment created in pending status"),
        (status = 403, description = "The corresponding module gate is disabled"),
        (status = 404, description = "Framework not found or inactive"),
        (status = 422, description = "Invalid request body"),
    ),
    tag = "assessments"
)]
pub async fn create_assessment(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Json(request): Json<CreateAssessmentRequest>,
) -> Result<(axum::http::StatusCode, Json<ComplianceAssessment>), AppError> {
    // Gate check: frameworks that correspond to a module are only
    // assessable while that module is enabled for the tenant.
    if let Ok(module) = request.framework_id.as_str().parse::<ComplianceModule>() {
        if !state.gates.is_enabled(&ctx.tenant_id, module, None).await? {
            return Err(AppError::Forbidden(format!(
                "module {module} is disabled for tenant {}",
                ctx.tenant_id
            )));
        }
    }

    let assessment = state.assessments.create_assessment(&ctx, request).await?;
    Ok((axum::http::StatusCode::CREATED, Json(assessment)))
}

/// GET /v1/assessments — list the tenant's assessments, newest-first.
#[utoipa::path(
    get,
    path = "/v1/assessments",
    params(
        ("limit" = Option<u32>, Query, description = "Page size"),
        ("offset" = Option<u32>, Query, description = "Page offset"),
    ),
    responses((status = 200, description = "One page of assessments")),
    tag = "assessments"
)]
pub async fn list_assessments(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<ComplianceAssessment>>, AppError> {
    let page = PageRequest::new(
        params.limit.unwrap_or(PageRequest::DEFAULT_LIMIT),
        params.offset.unwrap_or(0),
    );
    Ok(Json(state.assessments.list_assessments(&ctx, page).await?))
}

/// GET /v1/assessments/{id} — one assessment.
#[utoipa::path(
    get,
    path = "/v1/assessments/{id}",
    params(("id" = String, Path, description = "Assessment id")),
    responses(
        (status = 200, description = "The assessment"),
        (status = 404, description = "No such assessment for this tenant"),
    ),
    tag = "assessments"
)]
pub async fn get_assessment(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<ComplianceAssessment>, AppError> {
    let id = parse_assessment_id(&id)?;
    Ok(Json(state.assessments.get_assessment(&ctx, id).await?))
}

/// POST /v1/assessments/{id}/run — execute a run.
#[utoipa::path(
    post,
    path = "/v1/assessments/{id}/run",
    params(("id" = String, Path, description = "Assessment id")),
    responses(
        (status = 200, description = "Run completed; the terminal assessment state"),
        (status = 404, description = "No such assessment for this tenant"),
        (status = 409, description = "Assessment is not in a runnable status"),
        (status = 502, description = "Systemic evaluator failure; run recorded as failed"),
        (status = 504, description = "Run exceeded its deadline; recorded as failed"),
    ),
    tag = "assessments"
)]
pub async fn run_assessment(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Path(id): Path<String>,
    body: Option<Json<RunRequest>>,
) -> Result<Json<ComplianceAssessment>, AppError> {
    let id = parse_assessment_id(&id)?;
    let options = body.map(|Json(b)| b).unwrap_or_default().into_options();
    Ok(Json(state.assessments.run_assessment(&ctx, id, options).await?))
}

/// POST /v1/assessments/{id}/score/recompute — recompute aggregates from
/// stored findings. The explicit counterpart of finding overrides.
#[utoipa::path(
    post,
    path = "/v1/assessments/{id}/score/recompute",
    params(("id" = String, Path, description = "Assessment id")),
    responses(
        (status = 200, description = "Recomputed assessment"),
        (status = 404, description = "No such assessment for this tenant"),
        (status = 409, description = "Assessment is not completed"),
    ),
    tag = "assessments"
)]
pub async fn recompute_score(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<ComplianceAssessment>, AppError> {
    let id = parse_assessment_id(&id)?;
    Ok(Json(state.assessments.recompute_score(&ctx, id).await?))
}

/// PUT /v1/assessments/{id}/review — annotate a completed assessment.
#[utoipa::path(
    put,
    path = "/v1/assessments/{id}/review",
    params(("id" = String, Path, description = "Assessment id")),
    responses(
        (status = 200, description = "Reviewed assessment"),
        (status = 409, description = "Assessment is not completed"),
    ),
    tag = "assessments"
)]
pub async fn review_assessment(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Path(id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ComplianceAssessment>, AppError> {
    let id = parse_assessment_id(&id)?;
    Ok(Json(
        state
            .assessments
            .review_assessment(&ctx, id, request.note)
            .await?,
    ))
}

/// GET /v1/assessments/{id}/findings — the run's findings, filterable by
/// status and severity.
#[utoipa::path(
    get,
    path = "/v1/assessments/{id}/findings",
    params(
        ("id" = String, Path, description = "Assessment id"),
        ("limit" = Option<u32>, Query, description = "Page size"),
        ("offset" = Option<u32>, Query, description = "Page offset"),
        ("status" = Option<String>, Query, description = "Filter by finding status"),
        ("severity" = Option<String>, Query, description = "Filter by severity"),
    ),
    responses(
        (status = 200, description = "One page of findings"),
        (status = 404, description = "No such assessment for this tenant"),
        (status = 422, description = "Unknown status or severity filter"),
    ),
    tag = "assessments"
)]
pub async fn get_findings(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Path(id): Path<String>,
    Query(params): Query<FindingParams>,
) -> Result<Json<Page<ControlFinding>>, AppError> {
    let id = parse_assessment_id(&id)?;
    let status = params
        .status
        .as_deref()
        .map(|s| {
            s.parse()
                .map_err(|_| AppError::Validation(format!("unknown finding status: {s:?}")))
        })
        .transpose()?;
    let severity = params
        .severity
        .as_deref()
        .map(|s| {
            s.parse()
                .map_err(|_| AppError::Validation(format!("unknown finding severity: {s:?}")))
        })
        .transpose()?;

    let query = FindingQuery {
        page: PageRequest::new(
            params.limit.unwrap_or(PageRequest::DEFAULT_LIMIT),
            params.offset.unwrap_or(0),
        ),
        status,
        severity,
    };
    Ok(Json(state.assessments.get_findings(&ctx, id, query).await?))
}

/// PATCH /v1/assessments/{id}/findings/{finding_id} — human override.
///
/// Marks the finding human-verified with the acting user and time. Never
/// re-triggers scoring; use the explicit recompute operation for that.
#[utoipa::path(
    patch,
    path = "/v1/assessments/{id}/findings/{finding_id}",
    params(
        ("id" = String, Path, description = "Assessment id"),
        ("finding_id" = String, Path, description = "Finding id"),
    ),
    responses(
        (status = 200, description = "Updated finding"),
        (status = 404, description = "No such assessment or finding"),
    ),
    tag = "assessments"
)]
pub async fn update_finding(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Path((id, finding_id)): Path<(String, String)>,
    Json(update): Json<FindingUpdate>,
) -> Result<Json<ControlFinding>, AppError> {
    let id = parse_assessment_id(&id)?;
    let finding_id = parse_finding_id(&finding_id)?;
    Ok(Json(
        state
            .assessments
            .update_finding(&ctx, id, finding_id, update)
            .await?,
    ))
}
