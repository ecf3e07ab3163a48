//! # Control Catalog
//!
//! The read-only collaborator supplying the control set of a regulatory
//! framework. The engine re-fetches controls on every run — the catalog is
//! the source of truth and is never cached by the core.
//!
//! [`StaticCatalog`] is the built-in implementation carrying curated
//! control sets for the shipped frameworks; deployments with an external
//! catalog service implement [`ControlCatalog`] against it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use veris_core::{ControlId, FrameworkId};

/// One requirement from a regulatory framework — the unit of evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    /// Framework-assigned control identifier (e.g. `"A.5.15"`).
    pub id: ControlId,
    /// The compliance domain the control belongs to, used for scoping.
    pub domain: String,
    /// Short control title.
    pub title: String,
    /// Implementation priority, 0–100. Drives evaluation order.
    pub implementation_priority: u8,
    /// What evidence satisfies the control.
    pub evidence_requirements: Vec<String>,
    /// Coarse risk categorization.
    pub risk_category: String,
}

/// A regulatory framework and its ordered control set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framework {
    /// Framework identifier (e.g. `"iso27001"`).
    pub id: FrameworkId,
    /// Display name.
    pub name: String,
    /// Framework version label.
    pub version: String,
    /// Whether assessments may be created against this framework.
    pub active: bool,
    /// Controls in catalog order.
    pub controls: Vec<Control>,
}

/// Errors from catalog lookups.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The framework id is not in the catalog.
    #[error("framework {id} not found in catalog")]
    FrameworkNotFound {
        /// The unknown framework id.
        id: FrameworkId,
    },

    /// The catalog backend could not be reached.
    #[error("control catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only supplier of framework control sets.
#[async_trait]
pub trait ControlCatalog: Send + Sync {
    /// Look up a framework by id, including its full control set.
    async fn framework(&self, id: &FrameworkId) -> Result<Option<Framework>, CatalogError>;

    /// The controls applicable to one run: the framework's control set,
    /// restricted to the scoped domains (when `scope` is non-empty) and
    /// with the excluded ids subtracted. Returned in catalog order.
    async fn list_controls(
        &self,
        id: &FrameworkId,
        scope: &[String],
        excluded: &[ControlId],
    ) -> Result<Vec<Control>, CatalogError>;
}

/// In-memory catalog with the built-in framework content.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    frameworks: Vec<Framework>,
}

impl StaticCatalog {
    /// Catalog over an explicit framework list. Used by tests and by
    /// deployments shipping custom content.
    pub fn with_frameworks(frameworks: Vec<Framework>) -> Self {
        Self { frameworks }
    }

    /// The built-in curated catalog: ISO/IEC 27001, GDPR, SOC 2, and the
    /// EU AI Act.
    pub fn builtin() -> Self {
        Self::with_frameworks(vec![
            iso27001(),
            gdpr(),
            soc2(),
            ai_act(),
        ])
    }

    /// All frameworks in this catalog.
    pub fn frameworks(&self) -> &[Framework] {
        &self.frameworks
    }
}

#[async_trait]
impl ControlCatalog for StaticCatalog {
    async fn framework(&self, id: &FrameworkId) -> Result<Option<Framework>, CatalogError> {
        Ok(self.frameworks.iter().find(|f| &f.id == id).cloned())
    }

    async fn list_controls(
        &self,
        id: &FrameworkId,
        scope: &[String],
        excluded: &[ControlId],
    ) -> Result<Vec<Control>, CatalogError> {
        let framework = self
            .frameworks
            .iter()
            .find(|f| &f.id == id)
            .ok_or_else(|| CatalogError::FrameworkNotFound { id: id.clone() })?;

        Ok(framework
            .controls
            .iter()
            .filter(|c| scope.is_empty() || scope.contains(&c.domain))
            .filter(|c| !excluded.contains(&c.id))
            .cloned()
            .collect())
    }
}

fn control(
    id: &str,
    domain: &str,
    title: &str,
    priority: u8,
    evidence: &[&str],
    risk_category: &str,
) -> Control {
    Control {
        id: ControlId::new(id),
        domain: domain.to_string(),
        title: title.to_string(),
        implementation_priority: priority,
        evidence_requirements: evidence.iter().map(|e| e.to_string()).collect(),
        risk_category: risk_category.to_string(),
    }
}

/// ISO/IEC 27001:2022 — selected Annex A controls.
fn iso27001() -> Framework {
    Framework {
        id: FrameworkId::new("iso27001"),
        name: "ISO/IEC 27001".to_string(),
        version: "2022".to_string(),
        active: true,
        controls: vec![
            control(
                "A.5.1",
                "governance",
                "Policies for information security",
                85,
                &["approved policy document", "review schedule"],
                "governance",
            ),
            control(
                "A.5.9",
                "asset_management",
                "Inventory of information and other associated assets",
                70,
                &["asset register", "ownership assignments"],
                "security",
            ),
            control(
                "A.5.15",
                "access_control",
                "Access control",
                95,
                &["access control policy", "access review records"],
                "security",
            ),
            control(
                "A.5.19",
                "supplier_security",
                "Information security in supplier relationships",
                60,
                &["supplier agreements", "supplier risk assessments"],
                "third_party",
            ),
            control(
                "A.5.24",
                "incident_management",
                "Information security incident management planning",
                80,
                &["incident response plan", "escalation matrix"],
                "resilience",
            ),
            control(
                "A.6.3",
                "people",
                "Information security awareness, education and training",
                50,
                &["training completion records"],
                "people",
            ),
            control(
                "A.8.2",
                "access_control",
                "Privileged access rights",
                90,
                &["privileged account inventory", "JIT elevation logs"],
                "security",
            ),
            control(
                "A.8.13",
                "operations_security",
                "Information backup",
                75,
                &["backup schedule", "restore test evidence"],
                "resilience",
            ),
            control(
                "A.8.16",
                "operations_security",
                "Monitoring activities",
                65,
                &["monitoring coverage report", "alert runbooks"],
                "security",
            ),
            control(
                "A.8.24",
                "cryptography",
                "Use of cryptography",
                85,
                &["cryptographic standard", "key management procedure"],
                "security",
            ),
        ],
    }
}

/// EU GDPR — selected articles.
fn gdpr() -> Framework {
    Framework {
        id: FrameworkId::new("gdpr"),
        name: "EU General Data Protection Regulation".to_string(),
        version: "2016/679".to_string(),
        active: true,
        controls: vec![
            control(
                "GDPR-5",
                "data_governance",
                "Principles relating to processing of personal data",
                90,
                &["data inventory", "purpose register"],
                "privacy",
            ),
            control(
                "GDPR-6",
                "data_governance",
                "Lawfulness of processing",
                90,
                &["lawful basis register"],
                "privacy",
            ),
            control(
                "GDPR-15",
                "data_subject_rights",
                "Right of access by the data subject",
                70,
                &["SAR workflow", "response time records"],
                "privacy",
            ),
            control(
                "GDPR-17",
                "data_subject_rights",
                "Right to erasure",
                75,
                &["erasure workflow", "erasure completion records"],
                "privacy",
            ),
            control(
                "GDPR-20",
                "data_subject_rights",
                "Right to data portability",
                55,
                &["export tooling", "machine-readable formats"],
                "privacy",
            ),
            control(
                "GDPR-30",
                "records",
                "Records of processing activities",
                65,
                &["Article 30 register"],
                "governance",
            ),
            control(
                "GDPR-32",
                "security_of_processing",
                "Security of processing",
                95,
                &["technical measures inventory", "pseudonymization evidence"],
                "security",
            ),
            control(
                "GDPR-33",
                "breach_response",
                "Notification of a personal data breach",
                85,
                &["breach response plan", "72-hour notification workflow"],
                "privacy",
            ),
        ],
    }
}

/// SOC 2 — selected trust services criteria.
fn soc2() -> Framework {
    Framework {
        id: FrameworkId::new("soc2"),
        name: "SOC 2".to_string(),
        version: "2017 TSC".to_string(),
        active: true,
        controls: vec![
            control(
                "CC6.1",
                "security",
                "Logical access security",
                90,
                &["access management records", "authentication configuration"],
                "security",
            ),
            control(
                "CC6.2",
                "security",
                "Access provisioning and registration",
                80,
                &["provisioning tickets", "authorization records"],
                "security",
            ),
            control(
                "CC7.1",
                "change_management",
                "Detection of configuration changes",
                70,
                &["configuration monitoring evidence"],
                "security",
            ),
            control(
                "CC7.2",
                "security",
                "Monitoring for anomalies",
                75,
                &["anomaly alert evidence", "incident tickets"],
                "security",
            ),
            control(
                "A1.2",
                "availability",
                "Recovery infrastructure and testing",
                65,
                &["recovery plan", "failover test evidence"],
                "availability",
            ),
            control(
                "C1.1",
                "confidentiality",
                "Identification and protection of confidential information",
                60,
                &["classification policy", "retention schedule"],
                "confidentiality",
            ),
        ],
    }
}

/// EU AI Act — selected obligations for high-risk systems.
fn ai_act() -> Framework {
    Framework {
        id: FrameworkId::new("aiAct"),
        name: "EU AI Act".to_string(),
        version: "2024/1689".to_string(),
        active: true,
        controls: vec![
            control(
                "AIA-9",
                "risk_management",
                "Risk management system",
                95,
                &["risk management file", "mitigation records"],
                "safety",
            ),
            control(
                "AIA-10",
                "data_governance",
                "Data and data governance",
                85,
                &["training data documentation", "bias evaluation records"],
                "safety",
            ),
            control(
                "AIA-13",
                "transparency",
                "Transparency and provision of information to deployers",
                70,
                &["instructions for use", "capability disclosure"],
                "transparency",
            ),
            control(
                "AIA-14",
                "human_oversight",
                "Human oversight",
                90,
                &["oversight measures", "override procedures"],
                "safety",
            ),
            control(
                "AIA-15",
                "robustness",
                "Accuracy, robustness and cybersecurity",
                80,
                &["accuracy metrics", "adversarial test results"],
                "security",
            ),
            control(
                "AIA-43",
                "conformity",
                "Conformity assessment",
                60,
                &["conformity assessment records", "CE marking documentation"],
                "governance",
            ),
        ],
    }
}
