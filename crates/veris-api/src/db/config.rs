//! Configuration store persistence.
//!
//! All operations bind the tenant id and operate on the
//! `compliance_configs` and `compliance_config_audit` tables. Mutation
//! semantics live in `ComplianceConfig::apply`; this module implements
//! only locking and persistence.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use veris_core::{
    ActorId, AuditId, ComplianceModule, ConfigId, ModuleFeature, Page, RequestId, SessionId,
    StoreError, TenantId, Timestamp,
};
use veris_gate::{
    AuditAction, AuditContext, AuditQuery, ComplianceConfig, ConfigAuditRecord, ConfigMutation,
    ConfigStore, GateError, ModuleConfig,
};

use super::{json_err, store_err};

/// PostgreSQL [`ConfigStore`] backend.
#[derive(Debug, Clone)]
pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ConfigRow {
    id: Uuid,
    tenant_id: String,
    master_enabled: bool,
    modules: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConfigRow {
    fn into_record(self) -> Result<ComplianceConfig, StoreError> {
        let modules: BTreeMap<ComplianceModule, ModuleConfig> =
            serde_json::from_value(self.modules)
                .map_err(|e| json_err("compliance_configs.modules", e))?;
        Ok(ComplianceConfig {
            id: ConfigId(self.id),
            tenant_id: TenantId::new(self.tenant_id)
                .map_err(|e| StoreError::Decode(format!("compliance_configs.tenant_id: {e}")))?,
            master_enabled: self.master_enabled,
            modules,
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        })
    }
}

/// Internal audit row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    config_id: Uuid,
    tenant_id: String,
    action: String,
    actor_id: String,
    reason: String,
    previous_state: Option<serde_json::Value>,
    new_state: serde_json::Value,
    module: Option<String>,
    feature: Option<String>,
    old_value: Option<bool>,
    new_value: Option<bool>,
    request_id: String,
    session_id: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_record(self) -> Result<ConfigAuditRecord, StoreError> {
        let action: AuditAction = self
            .action
            .parse()
            .map_err(|_| StoreError::Decode(format!("unknown audit action {:?}", self.action)))?;
        let module = match self.module.as_deref() {
            Some(name) => Some(name.parse::<ComplianceModule>().map_err(|_| {
                StoreError::Decode(format!("unknown module {name:?} on audit row"))
            })?),
            None => None,
        };
        let feature = match (module, self.feature.as_deref()) {
            (Some(module), Some(name)) => {
                Some(ModuleFeature::parse_for(module, name).map_err(|_| {
                    StoreError::Decode(format!("unknown feature {name:?} on audit row"))
                })?)
            }
            _ => None,
        };
        let previous_state = match self.previous_state {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| json_err("compliance_config_audit.previous_state", e))?,
            ),
            None => None,
        };
        let new_state = serde_json::from_value(self.new_state)
            .map_err(|e| json_err("compliance_config_audit.new_state", e))?;

        Ok(ConfigAuditRecord {
            id: AuditId(self.id),
            config_id: ConfigId(self.config_id),
            tenant_id: TenantId::new(self.tenant_id).map_err(|e| {
                StoreError::Decode(format!("compliance_config_audit.tenant_id: {e}"))
            })?,
            action,
            actor_id: ActorId::new(self.actor_id).map_err(|e| {
                StoreError::Decode(format!("compliance_config_audit.actor_id: {e}"))
            })?,
            reason: self.reason,
            previous_state,
            new_state,
            module,
            feature,
            old_value: self.old_value,
            new_value: self.new_value,
            request_id: RequestId::new(self.request_id),
            session_id: self.session_id.map(SessionId::new),
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}

/// Lock and fetch the tenant's config row for the transaction's duration.
async fn select_for_update(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
) -> Result<Option<ComplianceConfig>, StoreError> {
    let row = sqlx::query_as::<_, ConfigRow>(
        "SELECT id, tenant_id, master_enabled, modules, created_at, updated_at
         FROM compliance_configs WHERE tenant_id = $1 FOR UPDATE",
    )
    .bind(tenant.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(store_err)?;
    row.map(ConfigRow::into_record).transpose()
}

/// Insert a fresh default config and its CREATE audit row.
async fn insert_default(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &TenantId,
    audit: &AuditContext,
) -> Result<ComplianceConfig, StoreError> {
    let config = ComplianceConfig::default_for(tenant.clone());
    let modules =
        serde_json::to_value(&config.modules).map_err(|e| json_err("modules encode", e))?;

    sqlx::query(
        "INSERT INTO compliance_configs (id, tenant_id, master_enabled, modules, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(config.id.0)
    .bind(config.tenant_id.as_str())
    .bind(config.master_enabled)
    .bind(&modules)
    .bind(*config.created_at.as_datetime())
    .bind(*config.updated_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(store_err)?;

    let create_row = ConfigAuditRecord::for_create(&config, audit);
    insert_audit(tx, &create_row).await?;
    Ok(config)
}

/// Persist the mutated config row.
async fn update_config(
    tx: &mut Transaction<'_, Postgres>,
    config: &ComplianceConfig,
) -> Result<(), StoreError> {
    let modules =
        serde_json::to_value(&config.modules).map_err(|e| json_err("modules encode", e))?;
    sqlx::query(
        "UPDATE compliance_configs SET master_enabled = $1, modules = $2, updated_at = $3
         WHERE id = $4 AND tenant_id = $5",
    )
    .bind(config.master_enabled)
    .bind(&modules)
    .bind(*config.updated_at.as_datetime())
    .bind(config.id.0)
    .bind(config.tenant_id.as_str())
    .execute(&mut **tx)
    .await
    .map_err(store_err)?;
    Ok(())
}

/// Append one audit row.
async fn insert_audit(
    tx: &mut Transaction<'_, Postgres>,
    record: &ConfigAuditRecord,
) -> Result<(), StoreError> {
    let previous_state = record
        .previous_state
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| json_err("previous_state encode", e))?;
    let new_state = serde_json::to_value(&record.new_state)
        .map_err(|e| json_err("new_state encode", e))?;

    sqlx::query(
        "INSERT INTO compliance_config_audit
           (id, config_id, tenant_id, action, actor_id, reason,
            previous_state, new_state, module, feature, old_value, new_value,
            request_id, session_id, ip_address, user_agent, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(record.id.0)
    .bind(record.config_id.0)
    .bind(record.tenant_id.as_str())
    .bind(record.action.as_str())
    .bind(record.actor_id.as_str())
    .bind(&record.reason)
    .bind(previous_state)
    .bind(&new_state)
    .bind(record.module.map(|m| m.as_str()))
    .bind(record.feature.map(|f| f.as_str()))
    .bind(record.old_value)
    .bind(record.new_value)
    .bind(record.request_id.as_str())
    .bind(record.session_id.as_ref().map(|s| s.as_str()))
    .bind(record.ip_address.as_deref())
    .bind(record.user_agent.as_deref())
    .bind(*record.created_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(store_err)?;
    Ok(())
}

#[async_trait::async_trait]
impl ConfigStore for PgConfigStore {
    async fn load(&self, tenant: &TenantId) -> Result<Option<ComplianceConfig>, StoreError> {
        let row = sqlx::query_as::<_, ConfigRow>(
            "SELECT id, tenant_id, master_enabled, modules, created_at, updated_at
             FROM compliance_configs WHERE tenant_id = $1",
        )
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(ConfigRow::into_record).transpose()
    }

    async fn get_or_create(
        &self,
        tenant: &TenantId,
        audit: AuditContext,
    ) -> Result<ComplianceConfig, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let config = match select_for_update(&mut tx, tenant).await? {
            Some(config) => config,
            None => insert_default(&mut tx, tenant, &audit).await?,
        };
        tx.commit().await.map_err(store_err)?;
        Ok(config)
    }

    async fn apply(
        &self,
        tenant: &TenantId,
        mutation: ConfigMutation,
        audit: AuditContext,
    ) -> Result<ComplianceConfig, GateError> {
        // Row lock held from read through mutation, update, and audit
        // append; dropping the transaction on any error path rolls all of
        // it back together.
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let mut config = match select_for_update(&mut tx, tenant).await? {
            Some(config) => config,
            None => insert_default(&mut tx, tenant, &audit.for_implicit_create()).await?,
        };

        let previous = config.clone();
        let delta = config.apply(&mutation, Timestamp::now())?;
        update_config(&mut tx, &config).await?;

        let row =
            ConfigAuditRecord::for_mutation(&previous, &config, mutation.action(), &delta, &audit);
        insert_audit(&mut tx, &row).await?;

        tx.commit().await.map_err(store_err)?;
        Ok(config)
    }

    async fn audit_log(
        &self,
        tenant: &TenantId,
        query: AuditQuery,
    ) -> Result<Page<ConfigAuditRecord>, StoreError> {
        let action = query.action.map(|a| a.as_str());
        let module = query.module.map(|m| m.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM compliance_config_audit
             WHERE tenant_id = $1
               AND ($2::text IS NULL OR action = $2)
               AND ($3::text IS NULL OR module = $3)",
        )
        .bind(tenant.as_str())
        .bind(action)
        .bind(module)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT id, config_id, tenant_id, action, actor_id, reason,
                    previous_state, new_state, module, feature, old_value, new_value,
                    request_id, session_id, ip_address, user_agent, created_at
             FROM compliance_config_audit
             WHERE tenant_id = $1
               AND ($2::text IS NULL OR action = $2)
               AND ($3::text IS NULL OR module = $3)
             ORDER BY created_at DESC, id DESC
             LIMIT $4 OFFSET $5",
        )
        .bind(tenant.as_str())
        .bind(action)
        .bind(module)
        .bind(i64::from(query.page.limit))
        .bind(i64::from(query.page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let items = rows
            .into_iter()
            .map(AuditRow::into_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: total as u64,
            limit: query.page.limit,
            offset: query.page.offset,
        })
    }
}
