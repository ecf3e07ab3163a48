//! # Configuration Audit Trail
//!
//! Append-only audit records for every state-changing configuration
//! operation. Each record carries full before/after snapshots for forensic
//! replay plus the specific value delta for fast queries, and the request
//! provenance of the actor who made the change.
//!
//! Records are written in the same transaction as the state change they
//! describe and are never updated or deleted afterwards.

use serde::{Deserialize, Serialize};

use veris_core::{
    ActorId, AuditId, ComplianceModule, ModuleFeature, PageRequest, RequestId, ServiceContext,
    SessionId, TenantId, Timestamp, ValidationError,
};

use crate::config::{ComplianceConfig, ConfigMutation, ValueDelta};

/// Minimum accepted length of a toggle reason, after trimming.
pub const MIN_REASON_LEN: usize = 10;

/// Enforce the reason policy: mandatory, and long enough to be useful to
/// an auditor. Violations are validation errors, not storage errors.
pub fn validate_reason(reason: &str) -> Result<(), ValidationError> {
    let len = reason.trim().len();
    if len == 0 {
        return Err(ValidationError::Empty { field: "reason" });
    }
    if len < MIN_REASON_LEN {
        return Err(ValidationError::TooShort {
            field: "reason",
            min: MIN_REASON_LEN,
            len,
        });
    }
    Ok(())
}

/// The kind of state change an audit row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Configuration row created with defaults.
    Create,
    /// Master switch toggled.
    ToggleMaster,
    /// Module switch toggled.
    ToggleModule,
    /// Feature switch toggled.
    ToggleFeature,
}

impl AuditAction {
    /// All actions in canonical order.
    pub fn all() -> &'static [AuditAction] {
        &[
            Self::Create,
            Self::ToggleMaster,
            Self::ToggleModule,
            Self::ToggleFeature,
        ]
    }

    /// The wire identifier for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::ToggleMaster => "TOGGLE_MASTER",
            Self::ToggleModule => "TOGGLE_MODULE",
            Self::ToggleFeature => "TOGGLE_FEATURE",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|a| a.as_str() == s)
            .copied()
            .ok_or_else(|| ValidationError::Invalid {
                field: "action",
                reason: format!("unknown audit action: {s:?}"),
            })
    }
}

impl ConfigMutation {
    /// The audit action kind this mutation produces.
    pub fn action(&self) -> AuditAction {
        match self {
            Self::ToggleMaster { .. } => AuditAction::ToggleMaster,
            Self::ToggleModule { .. } => AuditAction::ToggleModule,
            Self::ToggleFeature { .. } => AuditAction::ToggleFeature,
        }
    }
}

/// Actor identity, reason, and request provenance for one audited
/// operation — everything an audit row needs beyond the state itself.
#[derive(Debug, Clone)]
pub struct AuditContext {
    /// Who made the change.
    pub actor_id: ActorId,
    /// Why the change was made (policy-checked by the service).
    pub reason: String,
    /// Request correlation id.
    pub request_id: RequestId,
    /// Session identifier, when tracked upstream.
    pub session_id: Option<SessionId>,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
}

impl AuditContext {
    /// Build an audit context from a service context plus the reason.
    pub fn from_context(ctx: &ServiceContext, reason: impl Into<String>) -> Self {
        Self {
            actor_id: ctx.actor_id.clone(),
            reason: reason.into(),
            request_id: ctx.request_id.clone(),
            session_id: ctx.session_id.clone(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        }
    }

    /// Derive the context for the implicit `CREATE` row written when a
    /// configuration is auto-created during another operation. Same actor
    /// and provenance, standard reason.
    pub fn for_implicit_create(&self) -> Self {
        let mut ctx = self.clone();
        ctx.reason = "default configuration created".to_string();
        ctx
    }
}

/// One append-only audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigAuditRecord {
    /// Unique row identifier.
    pub id: AuditId,
    /// The configuration row this audits.
    pub config_id: veris_core::ConfigId,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// What kind of change happened.
    pub action: AuditAction,
    /// Who made the change.
    pub actor_id: ActorId,
    /// Why the change was made.
    pub reason: String,
    /// Full state snapshot before the change (`None` for `CREATE`).
    pub previous_state: Option<ComplianceConfig>,
    /// Full state snapshot after the change.
    pub new_state: ComplianceConfig,
    /// The module touched, for fast queries.
    pub module: Option<ComplianceModule>,
    /// The feature touched, for fast queries.
    pub feature: Option<ModuleFeature>,
    /// Switch value before the change.
    pub old_value: Option<bool>,
    /// Switch value after the change.
    pub new_value: Option<bool>,
    /// Request correlation id.
    pub request_id: RequestId,
    /// Session identifier, when tracked upstream.
    pub session_id: Option<SessionId>,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// When the row was written.
    pub created_at: Timestamp,
}

impl ConfigAuditRecord {
    /// The audit row for a freshly created configuration.
    pub fn for_create(config: &ComplianceConfig, audit: &AuditContext) -> Self {
        Self {
            id: AuditId::new(),
            config_id: config.id,
            tenant_id: config.tenant_id.clone(),
            action: AuditAction::Create,
            actor_id: audit.actor_id.clone(),
            reason: audit.reason.clone(),
            previous_state: None,
            new_state: config.clone(),
            module: None,
            feature: None,
            old_value: None,
            new_value: None,
            request_id: audit.request_id.clone(),
            session_id: audit.session_id.clone(),
            ip_address: audit.ip_address.clone(),
            user_agent: audit.user_agent.clone(),
            created_at: Timestamp::now(),
        }
    }

    /// The audit row for one applied mutation.
    pub fn for_mutation(
        previous: &ComplianceConfig,
        current: &ComplianceConfig,
        action: AuditAction,
        delta: &ValueDelta,
        audit: &AuditContext,
    ) -> Self {
        Self {
            id: AuditId::new(),
            config_id: current.id,
            tenant_id: current.tenant_id.clone(),
            action,
            actor_id: audit.actor_id.clone(),
            reason: audit.reason.clone(),
            previous_state: Some(previous.clone()),
            new_state: current.clone(),
            module: delta.module,
            feature: delta.feature,
            old_value: Some(delta.old_value),
            new_value: Some(delta.new_value),
            request_id: audit.request_id.clone(),
            session_id: audit.session_id.clone(),
            ip_address: audit.ip_address.clone(),
            user_agent: audit.user_agent.clone(),
            created_at: Timestamp::now(),
        }
    }
}

/// Filterable, paginated audit log query. Results are newest-first.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Page bounds.
    pub page: PageRequest,
    /// Restrict to one action kind.
    pub action: Option<AuditAction>,
    /// Restrict to rows touching one module.
    pub module: Option<ComplianceModule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_policy() {
        assert!(validate_reason("").is_err());
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason("too short").is_err()); // 9 chars
        assert!(validate_reason("incident freeze").is_ok());
        // Trimmed length is what counts.
        assert!(validate_reason("   short    ").is_err());
    }

    #[test]
    fn action_wire_names() {
        assert_eq!(AuditAction::Create.as_str(), "CREATE");
        assert_eq!(AuditAction::ToggleMaster.as_str(), "TOGGLE_MASTER");
        assert_eq!(AuditAction::ToggleModule.as_str(), "TOGGLE_MODULE");
        assert_eq!(AuditAction::ToggleFeature.as_str(), "TOGGLE_FEATURE");
    }

    #[test]
    fn action_serde_matches_as_str() {
        for action in AuditAction::all() {
            let json = serde_json::to_string(action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }

    #[test]
    fn action_from_str_roundtrip() {
        for action in AuditAction::all() {
            let parsed: AuditAction = action.as_str().parse().unwrap();
            assert_eq!(*action, parsed);
        }
        assert!("DELETE".parse::<AuditAction>().is_err());
    }

    #[test]
    fn implicit_create_context_keeps_provenance() {
        let ctx = ServiceContext::new(
            TenantId::new("t1").unwrap(),
            ActorId::new("user-1").unwrap(),
        )
        .with_client(Some("203.0.113.7".into()), None);
        let audit = AuditContext::from_context(&ctx, "enable soc2 for onboarding");
        let create = audit.for_implicit_create();
        assert_eq!(create.actor_id, audit.actor_id);
        assert_eq!(create.ip_address, audit.ip_address);
        assert_ne!(create.reason, audit.reason);
        assert!(validate_reason(&create.reason).is_ok());
    }
}
