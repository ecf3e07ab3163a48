//! # Compliance Configuration Model
//!
//! The per-tenant configuration record and its single mutation path.
//! All gating decisions and all toggles — regardless of storage backend —
//! flow through the pure methods on [`ComplianceConfig`], so the
//! hierarchical gating invariant and the audit value delta are computed in
//! exactly one place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use veris_core::{
    ComplianceModule, ConfigId, ModuleFeature, StoreError, TenantId, Timestamp, ValidationError,
};

/// Configuration of a single compliance module: the module switch plus its
/// fixed set of feature switches.
///
/// The feature map always holds exactly the module's fixed key set — it is
/// populated in full at creation and only ever mutated value-wise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Whether the module is enabled.
    pub enabled: bool,
    /// Per-feature switches, keyed by the module's fixed feature set.
    pub features: BTreeMap<ModuleFeature, bool>,
}

impl ModuleConfig {
    /// The default configuration for a module: the module default from the
    /// taxonomy, with every feature initialized to the same value.
    pub fn default_for(module: ComplianceModule) -> Self {
        let enabled = module.default_enabled();
        let features = module.features().iter().map(|f| (*f, enabled)).collect();
        Self { enabled, features }
    }

    /// The value of one feature switch. Absent keys read as `false`.
    pub fn feature(&self, feature: ModuleFeature) -> bool {
        self.features.get(&feature).copied().unwrap_or(false)
    }
}

/// One tenant's compliance configuration.
///
/// Exactly one exists per tenant; it is created implicitly on first read
/// (or first toggle), mutated only via [`ComplianceConfig::apply`], and
/// never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Unique row identifier.
    pub id: ConfigId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Tenant-wide master switch. Off ⇒ every gate evaluates false.
    pub master_enabled: bool,
    /// Per-module configuration. Always holds all modules.
    pub modules: BTreeMap<ComplianceModule, ModuleConfig>,
    /// When the configuration was created.
    pub created_at: Timestamp,
    /// When the configuration was last mutated.
    pub updated_at: Timestamp,
}

impl ComplianceConfig {
    /// The default configuration for a tenant: master on, module and
    /// feature switches per the taxonomy defaults.
    pub fn default_for(tenant_id: TenantId) -> Self {
        let now = Timestamp::now();
        let modules = ComplianceModule::all()
            .iter()
            .map(|m| (*m, ModuleConfig::default_for(*m)))
            .collect();
        Self {
            id: ConfigId::new(),
            tenant_id,
            master_enabled: true,
            modules,
            created_at: now,
            updated_at: now,
        }
    }

    /// The configuration of one module. Absent entries (which only occur
    /// for records written before a module existed) read as that module's
    /// defaults with everything off.
    pub fn module(&self, module: ComplianceModule) -> Option<&ModuleConfig> {
        self.modules.get(&module)
    }

    /// Hierarchical gate evaluation — strict AND composition.
    ///
    /// - `false` if the master switch is off, regardless of anything else.
    /// - `false` if the module is off.
    /// - With a feature: the feature's switch value (`false` if absent).
    /// - Without a feature: `true` (master and module are both on).
    pub fn is_active(&self, module: ComplianceModule, feature: Option<ModuleFeature>) -> bool {
        if !self.master_enabled {
            return false;
        }
        let Some(module_config) = self.modules.get(&module) else {
            return false;
        };
        if !module_config.enabled {
            return false;
        }
        match feature {
            Some(feature) => module_config.feature(feature),
            None => true,
        }
    }

    /// Apply one mutation, returning the audit value delta.
    ///
    /// Validates before mutating — on error the configuration is
    /// unchanged. This is the only mutation path; storage backends call it
    /// under the tenant's row lock and persist the result together with
    /// the audit row.
    pub fn apply(
        &mut self,
        mutation: &ConfigMutation,
        at: Timestamp,
    ) -> Result<ValueDelta, GateError> {
        let delta = match mutation {
            ConfigMutation::ToggleMaster { enabled } => {
                let old = self.master_enabled;
                self.master_enabled = *enabled;
                ValueDelta {
                    module: None,
                    feature: None,
                    old_value: old,
                    new_value: *enabled,
                }
            }
            ConfigMutation::ToggleModule { module, enabled } => {
                let entry = self
                    .modules
                    .entry(*module)
                    .or_insert_with(|| ModuleConfig::default_for(*module));
                let old = entry.enabled;
                entry.enabled = *enabled;
                ValueDelta {
                    module: Some(*module),
                    feature: None,
                    old_value: old,
                    new_value: *enabled,
                }
            }
            ConfigMutation::ToggleFeature {
                module,
                feature,
                enabled,
            } => {
                if feature.module() != *module {
                    return Err(GateError::InvalidFeature {
                        module: *module,
                        feature: feature.as_str().to_string(),
                    });
                }
                let entry = self
                    .modules
                    .entry(*module)
                    .or_insert_with(|| ModuleConfig::default_for(*module));
                let old = entry.feature(*feature);
                entry.features.insert(*feature, *enabled);
                ValueDelta {
                    module: Some(*module),
                    feature: Some(*feature),
                    old_value: old,
                    new_value: *enabled,
                }
            }
        };
        self.updated_at = at;
        Ok(delta)
    }
}

/// A single configuration mutation, closed over the three toggle kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigMutation {
    /// Flip the tenant-wide master switch.
    ToggleMaster {
        /// New master value.
        enabled: bool,
    },
    /// Flip one module's switch.
    ToggleModule {
        /// The module to toggle.
        module: ComplianceModule,
        /// New module value.
        enabled: bool,
    },
    /// Flip one feature switch within a module.
    ToggleFeature {
        /// The module owning the feature.
        module: ComplianceModule,
        /// The feature to toggle.
        feature: ModuleFeature,
        /// New feature value.
        enabled: bool,
    },
}

/// The before/after values of the specific switch a mutation touched,
/// recorded on the audit row alongside the full state snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueDelta {
    /// The module touched, if any (`None` for master toggles).
    pub module: Option<ComplianceModule>,
    /// The feature touched, if any.
    pub feature: Option<ModuleFeature>,
    /// Switch value before the mutation.
    pub old_value: bool,
    /// Switch value after the mutation.
    pub new_value: bool,
}

/// Errors from configuration store operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// Bad input (e.g. a reason shorter than the minimum-length policy).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A feature name outside the queried module's fixed key set.
    #[error("unknown feature {feature:?} for module {module}")]
    InvalidFeature {
        /// The module the feature was queried against.
        module: ComplianceModule,
        /// The rejected feature name.
        feature: String,
    },

    /// Storage transport or transaction failure.
    #[error(transparent)]
    Storage(#[from] StoreError),
}
