//! # Compliance Module Taxonomy — Single Source of Truth
//!
//! Defines the closed set of compliance modules a tenant can be gated on,
//! and the fixed set of sub-features each module carries. This is the ONE
//! definition used across the entire stack. Every `match` on
//! [`ComplianceModule`] or [`ModuleFeature`] must be exhaustive — adding a
//! module or feature forces every consumer to handle it at compile time.
//!
//! ## Invariant
//!
//! The feature key set of a module is fixed: toggling a feature that does
//! not belong to the queried module is rejected by
//! [`ModuleFeature::parse_for`] before any state is touched. There is no
//! dynamic string-keyed feature map anywhere in the stack.
//!
//! ## Wire Names
//!
//! Persisted and API-facing key names are camelCase (`aiAct`,
//! `dataErasure`) for compatibility with the existing reporting and audit
//! tooling that reads the stored column values directly.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ValidationError;

/// All compliance capability modules in the Veris stack.
///
/// Each module represents a regulatory capability group that can be
/// switched on or off per tenant, beneath the tenant-wide master switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComplianceModule {
    /// EU General Data Protection Regulation capabilities.
    Gdpr,
    /// EU AI Act capabilities.
    AiAct,
    /// EU NIS2 directive capabilities.
    Nis2,
    /// ISO/IEC 27001 capabilities.
    Iso27001,
    /// SOC 2 capabilities.
    Soc2,
    /// HIPAA capabilities.
    Hipaa,
}

/// Total number of compliance modules. Used for compile-time assertions.
pub const MODULE_COUNT: usize = 6;

/// All module sub-features, each owned by exactly one module.
///
/// The per-module key sets are fixed — see [`ComplianceModule::features`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleFeature {
    // -- gdpr --
    /// Right-to-erasure request handling.
    DataErasure,
    /// Data portability export handling.
    DataPortability,
    /// Consent capture and withdrawal tracking.
    ConsentManagement,
    /// 72-hour breach notification workflow.
    BreachNotification,
    /// Article 30 records of processing activities.
    RecordsOfProcessing,

    // -- aiAct --
    /// AI system risk classification.
    RiskClassification,
    /// Transparency reporting for deployed AI systems.
    TransparencyReports,
    /// Human oversight attestation.
    HumanOversight,
    /// Conformity assessment tracking.
    ConformityAssessment,

    // -- nis2 --
    /// Significant incident reporting.
    IncidentReporting,
    /// Cybersecurity risk management measures.
    RiskManagement,
    /// Supply chain security measures.
    SupplyChainSecurity,
    /// Business continuity and crisis management.
    BusinessContinuity,

    // -- iso27001 --
    /// Annex A access control controls.
    AccessControl,
    /// Asset inventory and ownership controls.
    AssetManagement,
    /// Cryptographic control management.
    Cryptography,
    /// Information security incident management.
    IncidentManagement,

    // -- soc2 --
    /// Continuous security monitoring evidence.
    SecurityMonitoring,
    /// Change management evidence.
    ChangeManagement,
    /// Availability reporting evidence.
    AvailabilityReporting,
    /// Confidentiality controls evidence.
    ConfidentialityControls,

    // -- hipaa --
    /// PHI access control safeguards.
    PhiAccessControls,
    /// Audit controls over ePHI systems.
    AuditControls,
    /// HIPAA Breach Notification Rule workflow.
    BreachNotificationRule,
    /// Minimum-necessary use and disclosure policy.
    MinimumNecessary,
}

/// Total number of module features across all modules.
pub const MODULE_FEATURE_COUNT: usize = 25;

impl ComplianceModule {
    /// Returns all modules in canonical order.
    pub fn all() -> &'static [ComplianceModule] {
        &[
            Self::Gdpr,
            Self::AiAct,
            Self::Nis2,
            Self::Iso27001,
            Self::Soc2,
            Self::Hipaa,
        ]
    }

    /// The camelCase wire identifier for this module.
    ///
    /// Must match the serde serialization format — these are the persisted
    /// module map keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gdpr => "gdpr",
            Self::AiAct => "aiAct",
            Self::Nis2 => "nis2",
            Self::Iso27001 => "iso27001",
            Self::Soc2 => "soc2",
            Self::Hipaa => "hipaa",
        }
    }

    /// Whether this module is enabled in a freshly created tenant
    /// configuration. Security and privacy modules default on; audit-heavy
    /// attestation modules default off until the tenant opts in.
    pub fn default_enabled(&self) -> bool {
        match self {
            Self::Gdpr | Self::AiAct | Self::Nis2 | Self::Iso27001 => true,
            Self::Soc2 | Self::Hipaa => false,
        }
    }

    /// The fixed feature key set of this module, in canonical order.
    pub fn features(&self) -> &'static [ModuleFeature] {
        match self {
            Self::Gdpr => &[
                ModuleFeature::DataErasure,
                ModuleFeature::DataPortability,
                ModuleFeature::ConsentManagement,
                ModuleFeature::BreachNotification,
                ModuleFeature::RecordsOfProcessing,
            ],
            Self::AiAct => &[
                ModuleFeature::RiskClassification,
                ModuleFeature::TransparencyReports,
                ModuleFeature::HumanOversight,
                ModuleFeature::ConformityAssessment,
            ],
            Self::Nis2 => &[
                ModuleFeature::IncidentReporting,
                ModuleFeature::RiskManagement,
                ModuleFeature::SupplyChainSecurity,
                ModuleFeature::BusinessContinuity,
            ],
            Self::Iso27001 => &[
                ModuleFeature::AccessControl,
                ModuleFeature::AssetManagement,
                ModuleFeature::Cryptography,
                ModuleFeature::IncidentManagement,
            ],
            Self::Soc2 => &[
                ModuleFeature::SecurityMonitoring,
                ModuleFeature::ChangeManagement,
                ModuleFeature::AvailabilityReporting,
                ModuleFeature::ConfidentialityControls,
            ],
            Self::Hipaa => &[
                ModuleFeature::PhiAccessControls,
                ModuleFeature::AuditControls,
                ModuleFeature::BreachNotificationRule,
                ModuleFeature::MinimumNecessary,
            ],
        }
    }
}

impl ModuleFeature {
    /// The module this feature belongs to.
    pub fn module(&self) -> ComplianceModule {
        match self {
            Self::DataErasure
            | Self::DataPortability
            | Self::ConsentManagement
            | Self::BreachNotification
            | Self::RecordsOfProcessing => ComplianceModule::Gdpr,
            Self::RiskClassification
            | Self::TransparencyReports
            | Self::HumanOversight
            | Self::ConformityAssessment => ComplianceModule::AiAct,
            Self::IncidentReporting
            | Self::RiskManagement
            | Self::SupplyChainSecurity
            | Self::BusinessContinuity => ComplianceModule::Nis2,
            Self::AccessControl
            | Self::AssetManagement
            | Self::Cryptography
            | Self::IncidentManagement => ComplianceModule::Iso27001,
            Self::SecurityMonitoring
            | Self::ChangeManagement
            | Self::AvailabilityReporting
            | Self::ConfidentialityControls => ComplianceModule::Soc2,
            Self::PhiAccessControls
            | Self::AuditControls
            | Self::BreachNotificationRule
            | Self::MinimumNecessary => ComplianceModule::Hipaa,
        }
    }

    /// The camelCase wire identifier for this feature.
    ///
    /// Must match the serde serialization format — these are the persisted
    /// feature map keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataErasure => "dataErasure",
            Self::DataPortability => "dataPortability",
            Self::ConsentManagement => "consentManagement",
            Self::BreachNotification => "breachNotification",
            Self::RecordsOfProcessing => "recordsOfProcessing",
            Self::RiskClassification => "riskClassification",
            Self::TransparencyReports => "transparencyReports",
            Self::HumanOversight => "humanOversight",
            Self::ConformityAssessment => "conformityAssessment",
            Self::IncidentReporting => "incidentReporting",
            Self::RiskManagement => "riskManagement",
            Self::SupplyChainSecurity => "supplyChainSecurity",
            Self::BusinessContinuity => "businessContinuity",
            Self::AccessControl => "accessControl",
            Self::AssetManagement => "assetManagement",
            Self::Cryptography => "cryptography",
            Self::IncidentManagement => "incidentManagement",
            Self::SecurityMonitoring => "securityMonitoring",
            Self::ChangeManagement => "changeManagement",
            Self::AvailabilityReporting => "availabilityReporting",
            Self::ConfidentialityControls => "confidentialityControls",
            Self::PhiAccessControls => "phiAccessControls",
            Self::AuditControls => "auditControls",
            Self::BreachNotificationRule => "breachNotificationRule",
            Self::MinimumNecessary => "minimumNecessary",
        }
    }

    /// Resolve a feature name within a specific module's fixed key set.
    ///
    /// This is the only supported way to turn client input into a
    /// [`ModuleFeature`] — a name that exists but belongs to another module
    /// is rejected the same way as an unknown name.
    pub fn parse_for(
        module: ComplianceModule,
        name: &str,
    ) -> Result<ModuleFeature, ValidationError> {
        module
            .features()
            .iter()
            .find(|f| f.as_str() == name)
            .copied()
            .ok_or_else(|| ValidationError::Invalid {
                field: "feature",
                reason: format!("unknown feature {name:?} for module {module}"),
            })
    }
}

impl std::fmt::Display for ComplianceModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for ModuleFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceModule {
    type Err = ValidationError;

    /// Parse a module from its camelCase wire identifier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| ValidationError::Invalid {
                field: "module",
                reason: format!("unknown compliance module: {s:?}"),
            })
    }
}
