//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from veris-gate and veris-assess to HTTP status
//! codes and JSON error bodies with a machine-readable code. Internal
//! error details are never exposed in responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use veris_core::{StoreError, ValidationError};
use veris_gate::GateError;
use veris_assess::{AssessError, CatalogError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "INVALID_STATE").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that maps to HTTP responses.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown feature for the queried module (422).
    #[error("invalid feature: {0}")]
    InvalidFeature(String),

    /// Operation illegal for the resource's lifecycle state (409).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A module gate is disabled for the tenant (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The run exceeded its deadline (504).
    #[error("run timeout: {0}")]
    RunTimeout(String),

    /// The evaluation collaborator failed (502).
    #[error("upstream evaluator error: {0}")]
    Upstream(String),

    /// Internal server error (500). Message is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The HTTP status and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::InvalidFeature(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_FEATURE"),
            Self::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "MODULE_DISABLED"),
            Self::RunTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "RUN_TIMEOUT"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "EVALUATOR_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error details to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Upstream(_) => "The evaluation service failed".to_string(),
            other => other.to_string(),
        };

        // Log server-side errors for operator visibility.
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Upstream(_) => tracing::error!(error = %self, "evaluator error"),
            Self::RunTimeout(_) => tracing::warn!(error = %self, "run timeout"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Validation(inner) => Self::Validation(inner.to_string()),
            GateError::InvalidFeature { .. } => Self::InvalidFeature(err.to_string()),
            GateError::Storage(inner) => inner.into(),
        }
    }
}

impl From<AssessError> for AppError {
    fn from(err: AssessError) -> Self {
        match &err {
            AssessError::NotFound { .. }
            | AssessError::FindingNotFound { .. }
            | AssessError::FrameworkNotFound { .. } => Self::NotFound(err.to_string()),
            AssessError::InvalidState { .. } => Self::InvalidState(err.to_string()),
            AssessError::RunTimeout { .. } => Self::RunTimeout(err.to_string()),
            AssessError::Validation(inner) => Self::Validation(inner.to_string()),
            AssessError::Catalog(CatalogError::FrameworkNotFound { .. }) => {
                Self::NotFound(err.to_string())
            }
            AssessError::Catalog(CatalogError::Unavailable(_)) => Self::Upstream(err.to_string()),
            AssessError::Evaluator(_) => Self::Upstream(err.to_string()),
            AssessError::Storage(StoreError::Conflict(msg)) => Self::Conflict(msg.clone()),
            AssessError::Storage(inner) => Self::Internal(inner.to_string()),
        }
    }
}
