//! # veris-assess — Assessment Execution Engine
//!
//! Owns the compliance assessment lifecycle: create → run →
//! completed/failed. A run resolves the applicable control set from the
//! catalog, invokes the pluggable per-control evaluator, persists one
//! finding per control, and aggregates the results into a score and risk
//! level — atomically, so readers never observe a partial run.
//!
//! ## Lifecycle
//!
//! ```text
//! pending ──run()──▶ in_progress ──▶ completed (terminal)
//!    ▲                    │
//!    │                    └────────▶ failed ──run()──▶ in_progress …
//!    │
//! cancelled (terminal, operator abort)
//! ```
//!
//! A run may start only from `pending` or `failed`; starting from
//! `in_progress` or `completed` fails fast with `InvalidState`. Two
//! concurrent runs on the same assessment race on the row lock held from
//! status check through status transition — exactly one proceeds.
//!
//! ## Collaborator Seams
//!
//! - [`ControlCatalog`] supplies the ordered control set for a framework;
//!   re-fetched on every run, never cached here.
//! - [`ControlEvaluator`] classifies one control. Evaluation is treated as
//!   slow and fallible: each call runs under a per-control timeout budget,
//!   and the whole run under a global deadline. Per-control failure
//!   records a `not_assessed` finding; only systemic failure aborts the
//!   run. No control is ever silently skipped.

pub mod assessment;
pub mod catalog;
pub mod engine;
pub mod evaluator;
pub mod finding;
pub mod memory;
pub mod scoring;
pub mod store;

// ─── Assessment re-exports ──────────────────────────────────────────

pub use assessment::{
    AiMetadata, AssessmentStatus, AssessmentTotals, ComplianceAssessment, HumanReview,
    TargetSystem,
};

// ─── Finding re-exports ─────────────────────────────────────────────

pub use finding::{
    ControlFinding, EvaluatorOutput, FindingQuery, FindingSeverity, FindingStatus, FindingUpdate,
    HumanVerification, Remediation, RemediationStatus,
};

// ─── Catalog & evaluator re-exports ─────────────────────────────────

pub use catalog::{CatalogError, Control, ControlCatalog, Framework, StaticCatalog};
pub use evaluator::{ControlEvaluation, ControlEvaluator, EvaluatorError, NullEvaluator, ScriptedEvaluator};

// ─── Scoring re-exports ─────────────────────────────────────────────

pub use scoring::{RiskLevel, RiskPolicy};

// ─── Engine & store re-exports ──────────────────────────────────────

pub use engine::{AssessmentEngine, CreateAssessmentRequest, RunOptions};
pub use memory::MemoryAssessmentStore;
pub use store::{AssessError, AssessmentStore};
