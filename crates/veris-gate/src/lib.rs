//! # veris-gate — Feature Gating & Configuration Audit
//!
//! Owns the per-tenant compliance configuration: the tenant-wide master
//! switch, per-module switches, and per-feature switches beneath them,
//! plus the append-only audit trail recording every change.
//!
//! ## Gating Invariant
//!
//! Gates compose strictly by AND, never OR:
//!
//! ```text
//! active(module)          = master AND module.enabled
//! active(module, feature) = master AND module.enabled AND feature
//! ```
//!
//! A disabled master switch makes every gate evaluate false regardless of
//! module or feature state. See [`ComplianceConfig::is_active`].
//!
//! ## Audit Invariant
//!
//! Every committed state change writes exactly one audit row in the same
//! transaction — audit rows never exist without the corresponding state
//! change, and no state change commits without its row. Audit rows are
//! never updated or deleted.
//!
//! ## Concurrency
//!
//! Toggle operations run under a per-tenant row lock for the whole
//! read-modify-write-and-audit sequence; toggles for different tenants
//! never block each other. The [`ConfigStore`] contract owns this
//! discipline; mutation semantics live in one place
//! ([`ComplianceConfig::apply`]) so every backend behaves identically.

pub mod audit;
pub mod config;
pub mod memory;
pub mod service;
pub mod store;

// ─── Config re-exports ──────────────────────────────────────────────

pub use config::{ComplianceConfig, ConfigMutation, GateError, ModuleConfig, ValueDelta};

// ─── Audit re-exports ───────────────────────────────────────────────

pub use audit::{
    validate_reason, AuditAction, AuditContext, AuditQuery, ConfigAuditRecord, MIN_REASON_LEN,
};

// ─── Store & service re-exports ─────────────────────────────────────

pub use memory::MemoryConfigStore;
pub use service::{ConfigService, ToggleMasterRequest, ToggleModuleRequest};
pub use store::ConfigStore;
