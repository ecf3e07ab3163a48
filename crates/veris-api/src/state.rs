//! # Application State & Configuration
//!
//! Shared state for the Axum application: the configuration-store service,
//! the assessment engine, the built-in control catalog, and the optional
//! database pool. Storage backends are selected at bootstrap — PostgreSQL
//! when `DATABASE_URL` is configured, in-memory otherwise.

use std::sync::Arc;

use sqlx::PgPool;

use veris_assess::{
    AssessmentEngine, ControlEvaluator, MemoryAssessmentStore, RiskPolicy, StaticCatalog,
};
use veris_gate::{ConfigService, MemoryConfigStore};

use crate::db::{PgAssessmentStore, PgConfigStore};

/// Environment-driven application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen port.
    pub port: u16,
    /// Whether the Prometheus metrics middleware and `/metrics` endpoint
    /// are mounted.
    pub metrics_enabled: bool,
}

impl AppConfig {
    /// Build configuration from the environment.
    ///
    /// - `PORT` — listen port, default 8080.
    /// - `VERIS_METRICS_ENABLED` — default on; anything other than
    ///   `"false"` enables.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let metrics_enabled = std::env::var("VERIS_METRICS_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);
        Self {
            port,
            metrics_enabled,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            metrics_enabled: true,
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: AppConfig,
    /// Configuration store + gate evaluator.
    pub gates: ConfigService,
    /// Assessment engine.
    pub assessments: AssessmentEngine,
    /// The control catalog served to clients.
    pub catalog: Arc<StaticCatalog>,
    /// Database pool, when PostgreSQL is configured.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// State over in-memory backends. Used by tests and when
    /// `DATABASE_URL` is absent — state does not survive restarts.
    pub fn in_memory(config: AppConfig, evaluator: Arc<dyn ControlEvaluator>) -> Self {
        let catalog = Arc::new(StaticCatalog::builtin());
        Self {
            config,
            gates: ConfigService::new(Arc::new(MemoryConfigStore::new())),
            assessments: AssessmentEngine::new(
                Arc::new(MemoryAssessmentStore::new()),
                catalog.clone(),
                evaluator,
            ),
            catalog,
            db_pool: None,
        }
    }

    /// State over PostgreSQL backends.
    pub fn with_postgres(
        config: AppConfig,
        pool: PgPool,
        evaluator: Arc<dyn ControlEvaluator>,
    ) -> Self {
        let catalog = Arc::new(StaticCatalog::builtin());
        Self {
            config,
            gates: ConfigService::new(Arc::new(PgConfigStore::new(pool.clone()))),
            assessments: AssessmentEngine::new(
                Arc::new(PgAssessmentStore::new(pool.clone())),
                catalog.clone(),
                evaluator,
            ),
            catalog,
            db_pool: Some(pool),
        }
    }

    /// Override the engine's risk policy (thresholds are a deployment
    /// policy choice; the defaults reproduce the compatibility mapping).
    pub fn with_risk_policy(mut self, policy: RiskPolicy) -> Self {
        self.assessments = self.assessments.with_risk_policy(policy);
        self
    }
}
