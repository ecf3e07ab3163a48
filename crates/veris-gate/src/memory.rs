//! # In-Memory Configuration Store
//!
//! `DashMap`-backed [`ConfigStore`] used by tests and by in-memory-only
//! deployments (no `DATABASE_URL`). The per-key entry guard is this
//! backend's analogue of the database row lock: a tenant's configuration
//! and its audit trail live in one entry, so the mutation and the audit
//! append happen atomically under one guard, and tenants never block each
//! other.

use dashmap::DashMap;

use veris_core::{Page, StoreError, TenantId};

use crate::audit::{AuditContext, AuditQuery, ConfigAuditRecord};
use crate::config::{ComplianceConfig, ConfigMutation, GateError};
use crate::store::ConfigStore;

/// One tenant's configuration plus its append-only audit trail.
#[derive(Debug, Clone)]
struct TenantEntry {
    config: ComplianceConfig,
    audit: Vec<ConfigAuditRecord>,
}

impl TenantEntry {
    /// A fresh default configuration with its `CREATE` audit row.
    fn create_default(tenant: &TenantId, audit: &AuditContext) -> Self {
        let config = ComplianceConfig::default_for(tenant.clone());
        let create_row = ConfigAuditRecord::for_create(&config, audit);
        Self {
            config,
            audit: vec![create_row],
        }
    }
}

/// In-memory [`ConfigStore`] backend.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    tenants: DashMap<TenantId, TenantEntry>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of audit rows recorded for a tenant. Test observability.
    pub fn audit_count(&self, tenant: &TenantId) -> usize {
        self.tenants.get(tenant).map(|e| e.audit.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self, tenant: &TenantId) -> Result<Option<ComplianceConfig>, StoreError> {
        Ok(self.tenants.get(tenant).map(|e| e.config.clone()))
    }

    async fn get_or_create(
        &self,
        tenant: &TenantId,
        audit: AuditContext,
    ) -> Result<ComplianceConfig, StoreError> {
        let entry = self
            .tenants
            .entry(tenant.clone())
            .or_insert_with(|| TenantEntry::create_default(tenant, &audit));
        Ok(entry.config.clone())
    }

    async fn apply(
        &self,
        tenant: &TenantId,
        mutation: ConfigMutation,
        audit: AuditContext,
    ) -> Result<ComplianceConfig, GateError> {
        // The entry guard is held for the whole read-modify-write-and-audit
        // sequence — the row lock analogue. A rejected mutation leaves the
        // map untouched: no config creation, no audit row.
        match self.tenants.entry(tenant.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let previous = entry.config.clone();
                let delta = entry
                    .config
                    .apply(&mutation, veris_core::Timestamp::now())?;
                let row = ConfigAuditRecord::for_mutation(
                    &previous,
                    &entry.config,
                    mutation.action(),
                    &delta,
                    &audit,
                );
                entry.audit.push(row);
                Ok(entry.config.clone())
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let mut entry =
                    TenantEntry::create_default(tenant, &audit.for_implicit_create());
                let previous = entry.config.clone();
                let delta = entry
                    .config
                    .apply(&mutation, veris_core::Timestamp::now())?;
                let row = ConfigAuditRecord::for_mutation(
                    &previous,
                    &entry.config,
                    mutation.action(),
                    &delta,
                    &audit,
                );
                entry.audit.push(row);
                let config = entry.config.clone();
                vacant.insert(entry);
                Ok(config)
            }
        }
    }

    async fn audit_log(
        &self,
        tenant: &TenantId,
        query: AuditQuery,
    ) -> Result<Page<ConfigAuditRecord>, StoreError> {
        let rows: Vec<ConfigAuditRecord> = match self.tenants.get(tenant) {
            Some(entry) => entry
                .audit
                .iter()
                .rev() // newest-first
                .filter(|r| query.action.map(|a| r.action == a).unwrap_or(true))
                .filter(|r| query.module.map(|m| r.module == Some(m)).unwrap_or(true))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(Page::slice_of(rows, query.page))
    }
}
