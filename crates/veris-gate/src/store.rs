//! # Configuration Store Contract
//!
//! The storage seam for the configuration store. Backends implement
//! locking and persistence only — mutation semantics live in
//! [`ComplianceConfig::apply`], so every backend behaves identically.
//!
//! ## Transactional Discipline
//!
//! Each trait method is one transactional unit:
//!
//! - [`ConfigStore::get_or_create`] creates the default configuration and
//!   its `CREATE` audit row atomically when the tenant has none.
//! - [`ConfigStore::apply`] holds the tenant's row lock for the whole
//!   read-modify-write-and-audit sequence. A configuration missing at
//!   toggle time is created (with its `CREATE` row) under the same lock
//!   before the mutation is applied. Any failure rolls back both the
//!   mutation and the audit insert together.

use async_trait::async_trait;

use veris_core::{Page, StoreError, TenantId};

use crate::audit::{AuditContext, AuditQuery, ConfigAuditRecord};
use crate::config::{ComplianceConfig, ConfigMutation, GateError};

/// Storage backend for per-tenant compliance configuration and its audit
/// trail.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load a tenant's configuration, if one exists. Read-only.
    async fn load(&self, tenant: &TenantId) -> Result<Option<ComplianceConfig>, StoreError>;

    /// Read-or-create: return the tenant's configuration, atomically
    /// creating the default one (plus its `CREATE` audit row) if absent.
    async fn get_or_create(
        &self,
        tenant: &TenantId,
        audit: AuditContext,
    ) -> Result<ComplianceConfig, StoreError>;

    /// Apply one mutation under the tenant's row lock, appending exactly
    /// one audit row in the same transaction. Auto-creates the default
    /// configuration (with a `CREATE` row) when the tenant has none yet.
    ///
    /// Returns the updated configuration.
    async fn apply(
        &self,
        tenant: &TenantId,
        mutation: ConfigMutation,
        audit: AuditContext,
    ) -> Result<ComplianceConfig, GateError>;

    /// Query the audit trail, newest-first, with optional action/module
    /// filters.
    async fn audit_log(
        &self,
        tenant: &TenantId,
        query: AuditQuery,
    ) -> Result<Page<ConfigAuditRecord>, StoreError>;
}
