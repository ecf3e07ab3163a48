//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Veris Compliance Stack API",
        version = "0.3.0",
        description = "Multi-tenant compliance-assessment backend.\n\nProvides:\n- **Compliance configuration** per tenant: master switch, module switches, feature switches, with a non-repudiable audit trail\n- **Gate evaluation** — hierarchical AND-composed module/feature gates\n- **Assessments** — framework control evaluation with per-control findings, deterministic scoring, and risk levels\n\nIdentity: the fronting layer supplies `X-Tenant-Id` (required) and `X-Actor-Id` headers; authentication is enforced upstream. Health probes (`/health/*`) and `/metrics` are unauthenticated.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // ── Configuration & gating ───────────────────────────────────
        crate::routes::config::get_config,
        crate::routes::config::toggle_master,
        crate::routes::config::toggle_module,
        crate::routes::config::audit_log,
        crate::routes::config::gate_check,
        // ── Assessments ──────────────────────────────────────────────
        crate::routes::assessments::create_assessment,
        crate::routes::assessments::list_assessments,
        crate::routes::assessments::get_assessment,
        crate::routes::assessments::run_assessment,
        crate::routes::assessments::recompute_score,
        crate::routes::assessments::review_assessment,
        crate::routes::assessments::get_findings,
        crate::routes::assessments::update_finding,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::config::ToggleModuleBody,
            crate::routes::config::GateResponse,
            crate::routes::assessments::RunRequest,
            crate::routes::assessments::ReviewRequest,
        ),
    ),
    tags(
        (name = "configuration", description = "Per-tenant compliance configuration, gate evaluation, and the audit trail"),
        (name = "assessments", description = "Assessment lifecycle — creation, runs, findings, human review, score recompute"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router, serving the spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_generates_successfully() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Veris Compliance Stack API");
    }

    #[test]
    fn spec_has_all_route_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/v1/compliance/config",
            "/v1/compliance/config/master",
            "/v1/compliance/config/modules/{module}",
            "/v1/compliance/config/audit",
            "/v1/compliance/gates/{module}",
            "/v1/assessments",
            "/v1/assessments/{id}",
            "/v1/assessments/{id}/run",
            "/v1/assessments/{id}/score/recompute",
            "/v1/assessments/{id}/findings",
            "/v1/assessments/{id}/findings/{finding_id}",
        ] {
            assert!(
                spec.paths.paths.contains_key(path),
                "spec should contain {path}"
            );
        }
    }

    #[test]
    fn spec_serializes_to_json() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("openapi"));
        assert!(json.contains("Veris"));
    }
}
