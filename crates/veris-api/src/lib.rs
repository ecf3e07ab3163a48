//! # veris-api — Axum API Services for the Veris Compliance Stack
//!
//! The HTTP surface over the two core subsystems: the feature-gating
//! configuration store (`veris-gate`) and the assessment engine
//! (`veris-assess`).
//!
//! ## API Surface
//!
//! | Prefix                      | Module                  | Domain          |
//! |-----------------------------|-------------------------|-----------------|
//! | `/v1/compliance/config/*`   | [`routes::config`]      | Configuration & audit |
//! | `/v1/compliance/gates/*`    | [`routes::config`]      | Gate evaluation |
//! | `/v1/assessments/*`         | [`routes::assessments`] | Assessments & findings |
//! | `/health/*`                 | here                    | Probes (unauthenticated) |
//! | `/metrics`                  | here                    | Prometheus scrape |
//! | `/openapi.json`             | [`openapi`]             | OpenAPI document |
//!
//! ## Architecture
//!
//! - No business logic in route handlers — they delegate to the services
//!   in [`AppState`].
//! - All errors map to structured HTTP responses via [`AppError`].
//! - Storage backends are selected at bootstrap: PostgreSQL (SQLx) when
//!   `DATABASE_URL` is set, in-memory otherwise.
//! - The fronting layer supplies tenant/actor identity via headers;
//!   authentication is enforced upstream.

pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::metrics::ApiMetrics;

pub use error::AppError;
pub use state::{AppConfig, AppState};

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) and `/metrics` are mounted outside the API
/// router so they stay reachable without tenant headers.
///
/// Middleware execution order (outermost → innermost):
/// `TraceLayer → MetricsMiddleware → Handler`
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();
    let metrics_on = state.config.metrics_enabled;

    // Body size limit: 1 MiB. Toggle and assessment payloads are small;
    // anything bigger is a client error.
    let mut api = Router::new()
        .merge(routes::config::router())
        .merge(routes::assessments::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(1024 * 1024));

    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics.clone()));
    }

    let api = api.layer(TraceLayer::new_for_http()).with_state(state.clone());

    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    if metrics_on {
        unauthenticated = unauthenticated
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics — Prometheus metrics scrape endpoint.
async fn prometheus_metrics(Extension(metrics): Extension<ApiMetrics>) -> impl IntoResponse {
    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — verifies the application is ready to serve traffic.
///
/// Checks the database connection when one is configured; in-memory mode
/// is always ready.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}
