//! # Database Persistence Layer
//!
//! PostgreSQL backends for the configuration store and the assessment
//! store, via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, the
//! API persists configuration, audit rows, assessments, and findings to
//! PostgreSQL. When absent, the API runs on the in-memory backends
//! (suitable for development and testing).
//!
//! ## Discipline
//!
//! - Row locks via `SELECT … FOR UPDATE` inside explicit transactions:
//!   the tenant's config row for the whole read-modify-write-and-audit
//!   sequence, the assessment row from status check through transition.
//! - Every query binds the tenant id — tenant isolation by
//!   parameterization, never by ambient session state.
//! - JSONB columns round-trip through the same serde shapes the API
//!   serves.

mod assessments;
mod config;

pub use assessments::PgAssessmentStore;
pub use config::PgConfigStore;

use sqlx::postgres::{PgPool, PgPoolOptions};

use veris_core::StoreError;

/// Initialize the database connection pool and run embedded migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Map a SQLx error onto the shared storage error taxonomy.
pub(crate) fn store_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(err.to_string())
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Connection(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}

/// Map a JSON (de)serialization failure on a stored column.
pub(crate) fn json_err(context: &str, err: serde_json::Error) -> StoreError {
    StoreError::Decode(format!("{context}: {err}"))
}
