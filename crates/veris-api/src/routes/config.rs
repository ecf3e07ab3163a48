//! # Configuration & Gating Routes
//!
//! Per-tenant compliance configuration: read (auto-creating), the two
//! toggle operations, gate evaluation, and the audit log.

use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use veris_core::{ComplianceModule, Page, PageRequest};
use veris_gate::{AuditQuery, ComplianceConfig, ConfigAuditRecord, ToggleMasterRequest, ToggleModuleRequest};

use crate::error::AppError;
use crate::extractors::CallerIdentity;
use crate::state::AppState;

/// Build the configuration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/compliance/config", get(get_config))
        .route("/v1/compliance/config/master", put(toggle_master))
        .route("/v1/compliance/config/modules/{module}", put(toggle_module))
        .route("/v1/compliance/config/audit", get(audit_log))
        .route("/v1/compliance/gates/{module}", get(gate_check))
}

/// Body for a module or feature toggle; the module comes from the path.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleModuleBody {
    /// New switch value.
    pub enabled: bool,
    /// Why — mandatory, minimum length enforced.
    pub reason: String,
    /// Feature wire name within the module; absent toggles the module
    /// switch itself.
    #[serde(default)]
    pub feature: Option<String>,
}

/// Query parameters for the audit log.
#[derive(Debug, Deserialize)]
pub struct AuditLogParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Restrict to one action kind (e.g. `TOGGLE_MASTER`).
    pub action: Option<String>,
    /// Restrict to rows touching one module.
    pub module: Option<String>,
}

/// Query parameters for a gate check.
#[derive(Debug, Deserialize)]
pub struct GateParams {
    pub feature: Option<String>,
}

/// Gate evaluation result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GateResponse {
    /// The queried module.
    pub module: String,
    /// The queried feature, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    /// Whether the gate is open for the tenant.
    pub enabled: bool,
}

fn parse_module(name: &str) -> Result<ComplianceModule, AppError> {
    name.parse()
        .map_err(|_| AppError::Validation(format!("unknown compliance module: {name:?}")))
}

/// GET /v1/compliance/config — the tenant's configuration, created with
/// defaults on first read.
#[utoipa::path(
    get,
    path = "/v1/compliance/config",
    responses(
        (status = 200, description = "The tenant's compliance configuration"),
        (status = 422, description = "Missing or invalid tenant header"),
    ),
    tag = "configuration"
)]
pub async fn get_config(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
) -> Result<Json<ComplianceConfig>, AppError> {
    Ok(Json(state.gates.get_config(&ctx).await?))
}

/// PUT /v1/compliance/config/master — flip the tenant-wide master switch.
#[utoipa::path(
    put,
    path = "/v1/compliance/config/master",
    responses(
        (status = 200, description = "Updated configuration"),
        (status = 422, description = "Reason shorter than the minimum-length policy"),
    ),
    tag = "configuration"
)]
pub async fn toggle_master(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Json(request): Json<ToggleMasterRequest>,
) -> Result<Json<ComplianceConfig>, AppError> {
    Ok(Json(state.gates.toggle_master(&ctx, request).await?))
}

/// PUT /v1/compliance/config/modules/{module} — flip a module switch, or
/// one feature switch within it when `feature` is given.
#[utoipa::path(
    put,
    path = "/v1/compliance/config/modules/{module}",
    params(("module" = String, Path, description = "Module wire name, e.g. gdpr or aiAct")),
    responses(
        (status = 200, description = "Updated configuration"),
        (status = 422, description = "Unknown module, unknown feature, or bad reason"),
    ),
    tag = "configuration"
)]
pub async fn toggle_module(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Path(module): Path<String>,
    Json(body): Json<ToggleModuleBody>,
) -> Result<Json<ComplianceConfig>, AppError> {
    let module = parse_module(&module)?;
    let request = ToggleModuleRequest {
        module,
        enabled: body.enabled,
        reason: body.reason,
        feature: body.feature,
    };
    Ok(Json(state.gates.toggle_module(&ctx, request).await?))
}

/// GET /v1/compliance/config/audit — the tenant's audit trail,
/// newest-first.
#[utoipa::path(
    get,
    path = "/v1/compliance/config/audit",
    params(
        ("limit" = Option<u32>, Query, description = "Page size"),
        ("offset" = Option<u32>, Query, description = "Page offset"),
        ("action" = Option<String>, Query, description = "Filter by action kind"),
        ("module" = Option<String>, Query, description = "Filter by module"),
    ),
    responses(
        (status = 200, description = "One page of audit rows"),
        (status = 422, description = "Unknown action or module filter"),
    ),
    tag = "configuration"
)]
pub async fn audit_log(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Query(params): Query<AuditLogParams>,
) -> Result<Json<Page<ConfigAuditRecord>>, AppError> {
    let action = params
        .action
        .as_deref()
        .map(|a| {
            a.parse()
                .map_err(|_| AppError::Validation(format!("unknown audit action: {a:?}")))
        })
        .transpose()?;
    let module = params.module.as_deref().map(parse_module).transpose()?;

    let query = AuditQuery {
        page: PageRequest::new(
            params.limit.unwrap_or(PageRequest::DEFAULT_LIMIT),
            params.offset.unwrap_or(0),
        ),
        action,
        module,
    };
    Ok(Json(state.gates.audit_log(&ctx.tenant_id, query).await?))
}

/// GET /v1/compliance/gates/{module} — read-only gate evaluation.
///
/// Unknown feature names read as disabled rather than erroring: the gate
/// answers "may the tenant use this?", and something that does not exist
/// may not be used.
#[utoipa::path(
    get,
    path = "/v1/compliance/gates/{module}",
    params(
        ("module" = String, Path, description = "Module wire name"),
        ("feature" = Option<String>, Query, description = "Feature wire name within the module"),
    ),
    responses(
        (status = 200, description = "Gate evaluation result"),
        (status = 422, description = "Unknown module"),
    ),
    tag = "configuration"
)]
pub async fn gate_check(
    State(state): State<AppState>,
    CallerIdentity(ctx): CallerIdentity,
    Path(module): Path<String>,
    Query(params): Query<GateParams>,
) -> Result<Json<GateResponse>, AppError> {
    let parsed = parse_module(&module)?;
    let enabled = state
        .gates
        .is_enabled_named(&ctx.tenant_id, parsed, params.feature.as_deref())
        .await?;
    Ok(Json(GateResponse {
        module,
        feature: params.feature,
        enabled,
    }))
}
