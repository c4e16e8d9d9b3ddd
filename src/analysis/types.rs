//! Core data types and error definitions for document analysis.

use crate::intake::IntakeError;
use crate::llm::Role;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Errors emitted by the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The submitted file or text was rejected before analysis started.
    #[error(transparent)]
    Intake(#[from] IntakeError),
    /// An operation needed the active document but none is loaded.
    #[error("No document has been analyzed yet")]
    NoActiveDocument,
}

/// Subject area of a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Ending the agreement.
    Termination,
    /// Responsibility for losses and damages.
    Liability,
    /// Extension or automatic renewal.
    Renewal,
    /// Out-of-court dispute resolution.
    Arbitration,
    /// Fees, costs, and payment schedules.
    Payment,
    /// Personal data handling.
    Privacy,
    /// Ownership of creative and technical work.
    IntellectualProperty,
    /// Non-disclosure obligations.
    Confidentiality,
    /// Events outside the parties' control.
    ForceMajeure,
    /// Jurisdiction and applicable law.
    GoverningLaw,
    /// Recognized legal topic outside the other categories.
    Miscellaneous,
    /// Unclassified provision.
    General,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 12] = [
        Category::Termination,
        Category::Liability,
        Category::Renewal,
        Category::Arbitration,
        Category::Payment,
        Category::Privacy,
        Category::IntellectualProperty,
        Category::Confidentiality,
        Category::ForceMajeure,
        Category::GoverningLaw,
        Category::Miscellaneous,
        Category::General,
    ];

    /// Human readable label, e.g. `"Intellectual Property"`.
    pub fn label(self) -> &'static str {
        match self {
            Category::Termination => "Termination",
            Category::Liability => "Liability",
            Category::Renewal => "Renewal",
            Category::Arbitration => "Arbitration",
            Category::Payment => "Payment",
            Category::Privacy => "Privacy",
            Category::IntellectualProperty => "Intellectual Property",
            Category::Confidentiality => "Confidentiality",
            Category::ForceMajeure => "Force Majeure",
            Category::GoverningLaw => "Governing Law",
            Category::Miscellaneous => "Miscellaneous",
            Category::General => "General",
        }
    }

    /// Parse a label written as display text, camel case, or snake case.
    pub fn from_label(value: &str) -> Option<Self> {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL.into_iter().find(|category| {
            category
                .label()
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .eq(normalized.chars())
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_label(&value).unwrap_or(Category::General))
    }
}

/// Ordinal severity assigned to a clause.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Routine provision.
    #[default]
    Low,
    /// Worth a careful read.
    Medium,
    /// Could materially hurt the reader.
    High,
}

impl RiskLevel {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Parse a case-insensitive level name.
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" | "moderate" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// One classified clause of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    /// Identifier, `clause-<n>` once stored in a document.
    #[serde(default)]
    pub id: String,
    /// Section text exactly as produced by the splitter.
    pub original_text: String,
    /// Subject area.
    pub category: Category,
    /// Plain-English explanation.
    #[serde(default)]
    pub explanation: String,
    /// Severity.
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Reasoning behind the risk level, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_details: Option<String>,
    /// Short takeaways.
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Specific concerns for the reader.
    #[serde(default)]
    pub risks: Vec<String>,
}

/// An analyzed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Random identifier assigned on analysis.
    #[serde(default)]
    pub id: String,
    /// Raw text the clauses were cut from.
    #[serde(default, alias = "rawText")]
    pub content: String,
    /// SHA-256 hex digest of `content`.
    #[serde(default)]
    pub fingerprint: String,
    /// Clauses in document order.
    #[serde(default)]
    pub clauses: Vec<Clause>,
}

impl Document {
    /// Assemble a document, numbering clauses `clause-1`, `clause-2`, ... in order.
    pub fn new(content: String, clauses: Vec<Clause>) -> Self {
        let clauses = clauses
            .into_iter()
            .enumerate()
            .map(|(index, clause)| Clause {
                id: format!("clause-{}", index + 1),
                ..clause
            })
            .collect();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            fingerprint: fingerprint(&content),
            content,
            clauses,
        }
    }

    /// Number of clauses rated medium or high.
    pub fn elevated_risk_count(&self) -> usize {
        self.clauses
            .iter()
            .filter(|clause| clause.risk_level > RiskLevel::Low)
            .count()
    }
}

/// Hex SHA-256 digest used to recognize re-submitted text.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// One message of the document chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Speaker.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

impl ConversationTurn {
    /// Create a turn stamped with the current time.
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        Self {
            role,
            content: content.into(),
            timestamp: i64::try_from(millis).unwrap_or(i64::MAX),
        }
    }
}
