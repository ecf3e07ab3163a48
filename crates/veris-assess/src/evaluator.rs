//! # Control Evaluator Seam
//!
//! The pluggable collaborator that classifies one control against the
//! target system. Evaluation may involve network I/O to an external
//! evaluation service and is treated as slow and fallible throughout the
//! engine — per-control timeout budget, `not_assessed` fallback on
//! failure, hard abort only on systemic failure.
//!
//! The stack ships no real evaluator: [`NullEvaluator`] is the production
//! default until a deployment wires one in, and [`ScriptedEvaluator`] is
//! the deterministic double used by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use veris_core::ControlId;

use crate::assessment::TargetSystem;
use crate::catalog::Control;
use crate::finding::{FindingSeverity, FindingStatus};

/// The evaluator's classification of one control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEvaluation {
    /// Compliance classification.
    pub status: FindingStatus,
    /// Severity, when the evaluator assigns one.
    pub severity: Option<FindingSeverity>,
    /// Assessment text.
    pub narrative: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Evaluator reasoning, when provided.
    pub reasoning: Option<String>,
}

/// Errors from control evaluation.
#[derive(Error, Debug)]
pub enum EvaluatorError {
    /// The evaluator (or its upstream service) is not available for this
    /// control. The engine records a `not_assessed` finding and continues.
    #[error("evaluator unavailable: {0}")]
    Unavailable(String),

    /// One control's evaluation failed. The engine records a
    /// `not_assessed` finding and continues.
    #[error("evaluation failed for control {control}: {reason}")]
    Failed {
        /// The control whose evaluation failed.
        control: ControlId,
        /// What went wrong.
        reason: String,
    },

    /// The whole run cannot proceed (e.g. missing credentials). Aborts
    /// the run.
    #[error("systemic evaluator failure: {0}")]
    Systemic(String),
}

impl EvaluatorError {
    /// Whether this failure poisons the whole run rather than one control.
    pub fn is_systemic(&self) -> bool {
        matches!(self, Self::Systemic(_))
    }
}

/// Pluggable per-control evaluator.
#[async_trait]
pub trait ControlEvaluator: Send + Sync {
    /// Classify one control against the target system.
    ///
    /// `use_ai` reflects the run option; an evaluator that needs AI
    /// assistance should return [`EvaluatorError::Unavailable`] when it
    /// cannot honor the request rather than guessing.
    async fn evaluate(
        &self,
        control: &Control,
        target: &TargetSystem,
        use_ai: bool,
    ) -> Result<ControlEvaluation, EvaluatorError>;

    /// Identifier of the evaluation model, recorded on completed runs.
    fn model_id(&self) -> Option<String> {
        None
    }
}

/// Evaluator that is never available.
///
/// The production default until a deployment wires a real evaluator:
/// every run completes with `not_assessed`, zero-confidence findings
/// rather than fabricated classifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEvaluator;

#[async_trait]
impl ControlEvaluator for NullEvaluator {
    async fn evaluate(
        &self,
        _control: &Control,
        _target: &TargetSystem,
        _use_ai: bool,
    ) -> Result<ControlEvaluation, EvaluatorError> {
        Err(EvaluatorError::Unavailable(
            "no control evaluator configured".to_string(),
        ))
    }
}

/// Deterministic evaluator with pre-scripted outcomes per control id.
///
/// The test double for engine and API tests: outcomes are fixed up front,
/// so runs are fully reproducible.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEvaluator {
    outcomes: HashMap<ControlId, ControlEvaluation>,
    fallback: Option<ControlEvaluation>,
    model: Option<String>,
}

impl ScriptedEvaluator {
    /// An evaluator with no outcomes scripted yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome for one control.
    pub fn with_outcome(mut self, control: ControlId, evaluation: ControlEvaluation) -> Self {
        self.outcomes.insert(control, evaluation);
        self
    }

    /// Outcome for any control without a scripted one. Without a
    /// fallback, unscripted controls fail with
    /// [`EvaluatorError::Failed`].
    pub fn with_fallback(mut self, evaluation: ControlEvaluation) -> Self {
        self.fallback = Some(evaluation);
        self
    }

    /// Set the reported model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Shorthand for a simple scripted outcome.
    pub fn outcome(
        status: FindingStatus,
        severity: Option<FindingSeverity>,
        confidence: f64,
    ) -> ControlEvaluation {
        ControlEvaluation {
            status,
            severity,
            narrative: format!("scripted evaluation: {status}"),
            confidence,
            reasoning: None,
        }
    }
}

#[async_trait]
impl ControlEvaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        control: &Control,
        _target: &TargetSystem,
        _use_ai: bool,
    ) -> Result<ControlEvaluation, EvaluatorError> {
        if let Some(evaluation) = self.outcomes.get(&control.id) {
            return Ok(evaluation.clone());
        }
        match &self.fallback {
            Some(evaluation) => Ok(evaluation.clone()),
            None => Err(EvaluatorError::Failed {
                control: control.id.clone(),
                reason: "no scripted outcome".to_string(),
            }),
        }
    }

    fn model_id(&self) -> Option<String> {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(id: &str) -> Control {
        Control {
            id: ControlId::new(id),
            domain: "security".into(),
            title: format!("Control {id}"),
            implementation_priority: 50,
            evidence_requirements: vec![],
            risk_category: "security".into(),
        }
    }

    fn target() -> TargetSystem {
        TargetSystem {
            name: "billing-service".into(),
            description: None,
        }
    }

    #[tokio::test]
    async fn null_evaluator_is_unavailable() {
        let err = NullEvaluator
            .evaluate(&control("C-1"), &target(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluatorError::Unavailable(_)));
        assert!(!err.is_systemic());
        assert!(NullEvaluator.model_id().is_none());
    }

    #[tokio::test]
    async fn scripted_outcomes_and_fallback() {
        let evaluator = ScriptedEvaluator::new()
            .with_outcome(
                ControlId::new("C-1"),
                ScriptedEvaluator::outcome(FindingStatus::Compliant, None, 0.9),
            )
            .with_fallback(ScriptedEvaluator::outcome(
                FindingStatus::Partial,
                Some(FindingSeverity::Minor),
                0.5,
            ))
            .with_model("scripted-v1");

        let scripted = evaluator
            .evaluate(&control("C-1"), &target(), true)
            .await
            .unwrap();
        assert_eq!(scripted.status, FindingStatus::Compliant);

        let fallback = evaluator
            .evaluate(&control("C-2"), &target(), true)
            .await
            .unwrap();
        assert_eq!(fallback.status, FindingStatus::Partial);
        assert_eq!(evaluator.model_id().as_deref(), Some("scripted-v1"));
    }

    #[tokio::test]
    async fn unscripted_without_fallback_fails_per_control() {
        let evaluator = ScriptedEvaluator::new();
        let err = evaluator
            .evaluate(&control("C-9"), &target(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluatorError::Failed { .. }));
        assert!(!err.is_systemic());
    }
}
