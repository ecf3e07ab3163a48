//! # Configuration Service
//!
//! The operation surface of the configuration store: read-or-create,
//! the two toggle operations, the read-only gate evaluator, and the audit
//! log query. Validates input (the reason policy, feature membership)
//! before touching storage, then delegates to the injected
//! [`ConfigStore`] handle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use veris_core::{ComplianceModule, ModuleFeature, Page, ServiceContext, TenantId};

use crate::audit::{validate_reason, AuditContext, AuditQuery, ConfigAuditRecord};
use crate::config::{ComplianceConfig, ConfigMutation, GateError};
use crate::store::ConfigStore;

/// Request to flip the tenant-wide master switch.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToggleMasterRequest {
    /// New master value.
    pub enabled: bool,
    /// Why — mandatory, minimum length enforced.
    pub reason: String,
}

/// Request to flip a module switch, or one feature switch within the
/// module when `feature` is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleModuleRequest {
    /// The module to toggle.
    pub module: ComplianceModule,
    /// New switch value.
    pub enabled: bool,
    /// Why — mandatory, minimum length enforced.
    pub reason: String,
    /// Feature wire name within the module; `None` toggles the module
    /// switch itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
}

/// The configuration store's operation surface.
///
/// Cheap to clone; the storage handle is shared.
#[derive(Clone)]
pub struct ConfigService {
    store: Arc<dyn ConfigStore>,
}

impl ConfigService {
    /// Reason recorded on configurations created implicitly by a read.
    const READ_CREATE_REASON: &'static str = "default configuration created on first read";

    /// Create a service over an injected storage handle.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Return the tenant's configuration, creating the default one on
    /// first read. Never fails except on storage error.
    pub async fn get_config(&self, ctx: &ServiceContext) -> Result<ComplianceConfig, GateError> {
        let audit = AuditContext::from_context(ctx, Self::READ_CREATE_REASON);
        Ok(self.store.get_or_create(&ctx.tenant_id, audit).await?)
    }

    /// Flip the master switch under the tenant's row lock, appending one
    /// audit row. Returns the updated configuration.
    pub async fn toggle_master(
        &self,
        ctx: &ServiceContext,
        request: ToggleMasterRequest,
    ) -> Result<ComplianceConfig, GateError> {
        validate_reason(&request.reason)?;
        let audit = AuditContext::from_context(ctx, request.reason);
        let config = self
            .store
            .apply(
                &ctx.tenant_id,
                ConfigMutation::ToggleMaster {
                    enabled: request.enabled,
                },
                audit,
            )
            .await?;
        tracing::info!(
            tenant = %ctx.tenant_id,
            actor = %ctx.actor_id,
            enabled = request.enabled,
            "master switch toggled"
        );
        Ok(config)
    }

    /// Flip a module switch — or one feature switch within it — under the
    /// tenant's row lock, appending one audit row.
    ///
    /// A tenant with no configuration yet gets the default one created
    /// under the same lock before the toggle applies (with its own
    /// `CREATE` audit row). A feature name outside the module's fixed key
    /// set is rejected with [`GateError::InvalidFeature`] before any state
    /// is touched.
    pub async fn toggle_module(
        &self,
        ctx: &ServiceContext,
        request: ToggleModuleRequest,
    ) -> Result<ComplianceConfig, GateError> {
        validate_reason(&request.reason)?;
        let mutation = match &request.feature {
            Some(name) => {
                let feature = ModuleFeature::parse_for(request.module, name).map_err(|_| {
                    GateError::InvalidFeature {
                        module: request.module,
                        feature: name.clone(),
                    }
                })?;
                ConfigMutation::ToggleFeature {
                    module: request.module,
                    feature,
                    enabled: request.enabled,
                }
            }
            None => ConfigMutation::ToggleModule {
                module: request.module,
                enabled: request.enabled,
            },
        };
        let audit = AuditContext::from_context(ctx, request.reason);
        let config = self.store.apply(&ctx.tenant_id, mutation, audit).await?;
        tracing::info!(
            tenant = %ctx.tenant_id,
            actor = %ctx.actor_id,
            module = %request.module,
            feature = request.feature.as_deref().unwrap_or("-"),
            enabled = request.enabled,
            "module switch toggled"
        );
        Ok(config)
    }

    /// Read-only gate evaluation with no side effects.
    ///
    /// A tenant with no stored configuration is evaluated against the
    /// defaults without persisting anything — implicit creation stays on
    /// the [`ConfigService::get_config`] read path.
    pub async fn is_enabled(
        &self,
        tenant: &TenantId,
        module: ComplianceModule,
        feature: Option<ModuleFeature>,
    ) -> Result<bool, GateError> {
        let config = match self.store.load(tenant).await? {
            Some(config) => config,
            None => ComplianceConfig::default_for(tenant.clone()),
        };
        Ok(config.is_active(module, feature))
    }

    /// Gate evaluation with a client-supplied feature name. Unknown
    /// feature names read as disabled — the gate answers "may the tenant
    /// use this?", and something that does not exist may not be used.
    pub async fn is_enabled_named(
        &self,
        tenant: &TenantId,
        module: ComplianceModule,
        feature: Option<&str>,
    ) -> Result<bool, GateError> {
        let feature = match feature {
            Some(name) => match ModuleFeature::parse_for(module, name) {
                Ok(feature) => Some(feature),
                Err(_) => return Ok(false),
            },
            None => None,
        };
        self.is_enabled(tenant, module, feature).await
    }

    /// Query the tenant's audit trail, newest-first.
    pub async fn audit_log(
        &self,
        tenant: &TenantId,
        query: AuditQuery,
    ) -> Result<Page<ConfigAuditRecord>, GateError> {
        Ok(self.store.audit_log(tenant, query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use crate::memory::MemoryConfigStore;
    use veris_core::ActorId;

    fn service() -> (ConfigService, Arc<MemoryConfigStore>) {
        let store = Arc::new(MemoryConfigStore::new());
        (ConfigService::new(store.clone()), store)
    }

    fn ctx(tenant: &str) -> ServiceContext {
        ServiceContext::new(
            TenantId::new(tenant).unwrap(),
            ActorId::new("user-1").unwrap(),
        )
    }

    #[tokio::test]
    async fn get_config_creates_default_once() {
        let (service, store) = service();
        let ctx = ctx("t1");
        let first = service.get_config(&ctx).await.unwrap();
        let second = service.get_config(&ctx).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.audit_count(&ctx.tenant_id), 1);
    }

    #[tokio::test]
    async fn toggle_master_rejects_short_reason() {
        let (service, store) = service();
        let ctx = ctx("t1");
        let err = service
            .toggle_master(
                &ctx,
                ToggleMasterRequest {
                    enabled: false,
                    reason: "short".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Validation(_)));
        // Rejected before storage — no rows at all.
        assert_eq!(store.audit_count(&ctx.tenant_id), 0);
    }

    #[tokio::test]
    async fn toggle_module_auto_creates_default_config() {
        // A tenant that has never called get_config can still toggle; the
        // default configuration is created under the same lock with its
        // own CREATE audit row. This pins the auto-create decision.
        let (service, store) = service();
        let ctx = ctx("fresh-tenant");
        let config = service
            .toggle_module(
                &ctx,
                ToggleModuleRequest {
                    module: ComplianceModule::Soc2,
                    enabled: true,
                    reason: "soc2 onboarding kickoff".into(),
                    feature: None,
                },
            )
            .await
            .unwrap();
        assert!(config.is_active(ComplianceModule::Soc2, None));

        let log = service
            .audit_log(&ctx.tenant_id, AuditQuery::default())
            .await
            .unwrap();
        assert_eq!(log.total, 2);
        assert_eq!(log.items[0].action, AuditAction::ToggleModule);
        assert_eq!(log.items[1].action, AuditAction::Create);
        assert_eq!(store.audit_count(&ctx.tenant_id), 2);
    }

    #[tokio::test]
    async fn toggle_unknown_feature_is_invalid_feature() {
        let (service, _) = service();
        let ctx = ctx("t1");
        let err = service
            .toggle_module(
                &ctx,
                ToggleModuleRequest {
                    module: ComplianceModule::Gdpr,
                    enabled: true,
                    reason: "trying a bogus feature".into(),
                    feature: Some("teleportation".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidFeature { .. }));
    }

    #[tokio::test]
    async fn audit_rows_match_committed_toggles_one_to_one() {
        let (service, _) = service();
        let ctx = ctx("t1");
        service.get_config(&ctx).await.unwrap();

        let toggles = 5;
        for i in 0..toggles {
            service
                .toggle_master(
                    &ctx,
                    ToggleMasterRequest {
                        enabled: i % 2 == 0,
                        reason: format!("scheduled maintenance window {i}"),
                    },
                )
                .await
                .unwrap();
        }

        let log = service
            .audit_log(&ctx.tenant_id, AuditQuery::default())
            .await
            .unwrap();
        // One CREATE plus exactly one row per committed toggle.
        assert_eq!(log.total, 1 + toggles as u64);
    }

    #[tokio::test]
    async fn idempotent_toggle_produces_two_rows_same_gate() {
        let (service, _) = service();
        let ctx = ctx("t1");

        let request = ToggleModuleRequest {
            module: ComplianceModule::Gdpr,
            enabled: true,
            reason: "re-asserting gdpr enablement".into(),
            feature: None,
        };
        service.toggle_module(&ctx, request.clone()).await.unwrap();
        let after_first = service
            .is_enabled(&ctx.tenant_id, ComplianceModule::Gdpr, None)
            .await
            .unwrap();
        service.toggle_module(&ctx, request).await.unwrap();
        let after_second = service
            .is_enabled(&ctx.tenant_id, ComplianceModule::Gdpr, None)
            .await
            .unwrap();

        assert_eq!(after_first, after_second);
        let log = service
            .audit_log(
                &ctx.tenant_id,
                AuditQuery {
                    action: Some(AuditAction::ToggleModule),
                    ..AuditQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(log.total, 2);
    }

    #[tokio::test]
    async fn gate_scenario_master_freeze() {
        let (service, _) = service();
        let ctx = ctx("t1");
        service.get_config(&ctx).await.unwrap();
        service
            .toggle_module(
                &ctx,
                ToggleModuleRequest {
                    module: ComplianceModule::Gdpr,
                    enabled: true,
                    reason: "gdpr rollout to tenant t1".into(),
                    feature: None,
                },
            )
            .await
            .unwrap();
        service
            .toggle_module(
                &ctx,
                ToggleModuleRequest {
                    module: ComplianceModule::Gdpr,
                    enabled: true,
                    reason: "enable erasure handling".into(),
                    feature: Some("dataErasure".into()),
                },
            )
            .await
            .unwrap();

        assert!(service
            .is_enabled_named(&ctx.tenant_id, ComplianceModule::Gdpr, Some("dataErasure"))
            .await
            .unwrap());

        service
            .toggle_master(
                &ctx,
                ToggleMasterRequest {
                    enabled: false,
                    reason: "incident freeze".into(),
                },
            )
            .await
            .unwrap();

        assert!(!service
            .is_enabled_named(&ctx.tenant_id, ComplianceModule::Gdpr, Some("dataErasure"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn is_enabled_unknown_tenant_uses_defaults_without_write() {
        let (service, store) = service();
        let tenant = TenantId::new("never-seen").unwrap();
        // Defaults: master on, gdpr on.
        assert!(service
            .is_enabled(&tenant, ComplianceModule::Gdpr, None)
            .await
            .unwrap());
        // soc2 defaults off.
        assert!(!service
            .is_enabled(&tenant, ComplianceModule::Soc2, None)
            .await
            .unwrap());
        // Read-only: nothing was persisted.
        assert!(store.load(&tenant).await.unwrap().is_none());
        assert_eq!(store.audit_count(&tenant), 0);
    }

    #[tokio::test]
    async fn is_enabled_named_unknown_feature_is_false() {
        let (service, _) = service();
        let tenant = TenantId::new("t1").unwrap();
        assert!(!service
            .is_enabled_named(&tenant, ComplianceModule::Gdpr, Some("teleportation"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let (service, _) = service();
        let ctx_a = ctx("tenant-a");
        let ctx_b = ctx("tenant-b");
        service
            .toggle_master(
                &ctx_a,
                ToggleMasterRequest {
                    enabled: false,
                    reason: "tenant-a incident freeze".into(),
                },
            )
            .await
            .unwrap();

        assert!(!service
            .is_enabled(&ctx_a.tenant_id, ComplianceModule::Gdpr, None)
            .await
            .unwrap());
        // tenant-b untouched.
        assert!(service
            .is_enabled(&ctx_b.tenant_id, ComplianceModule::Gdpr, None)
            .await
            .unwrap());
        let log_b = service
            .audit_log(&ctx_b.tenant_id, AuditQuery::default())
            .await
            .unwrap();
        assert_eq!(log_b.total, 0);
    }
}
