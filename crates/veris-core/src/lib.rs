//! # veris-core — Foundational Types for the Veris Compliance Stack
//!
//! This crate is the bedrock of the Veris Compliance Stack. It defines the
//! type-system primitives shared by every other crate in the workspace; it
//! depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `TenantId`, `ActorId`,
//!    `AssessmentId`, `ControlId`, `FrameworkId` — all newtypes. No bare
//!    strings for identifiers, so a control id cannot be passed where a
//!    framework id is expected.
//!
//! 2. **Single `ComplianceModule` enum.** One definition, six variants,
//!    exhaustive `match` everywhere. Adding a module forces every consumer
//!    to handle it. Sub-features are the closed `ModuleFeature` enum with a
//!    fixed key set per module — there is no dynamic string-keyed feature
//!    map anywhere in the stack.
//!
//! 3. **Explicit tenancy.** Every operation receives a [`ServiceContext`]
//!    carrying the tenant, actor, and request identity. Tenant isolation is
//!    enforced by parameterization, never by ambient session state.
//!
//! 4. **UTC-only timestamps.** The `Timestamp` type enforces UTC with Z
//!    suffix and seconds precision.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `veris-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize` where they cross a storage or API boundary.

pub mod context;
pub mod error;
pub mod identity;
pub mod module;
pub mod page;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use context::ServiceContext;
pub use error::{StoreError, ValidationError};
pub use identity::{
    ActorId, AssessmentId, AuditId, ConfigId, ControlId, FindingId, FrameworkId, RequestId,
    SessionId, TenantId,
};
pub use module::{ComplianceModule, ModuleFeature, MODULE_COUNT, MODULE_FEATURE_COUNT};
pub use page::{Page, PageRequest};
pub use temporal::Timestamp;
