//! Clause classification: remote model first, deterministic keyword rules as the fallback.
//!
//! The remote path asks the model for a strict JSON object, pulls the first balanced object out
//! of the reply, and validates it field by field into a [`ClauseParse`]. Any failure (transport,
//! timeout, unparsable reply, missing fields) routes the section through [`fallback_clause`],
//! which always succeeds.

use super::types::{Category, Clause, RiskLevel};
use crate::llm::{ChatMessage, CompletionRequest, LanguageModel, LlmClientError};
use futures_util::{StreamExt, stream};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Risk explanation attached to elevated fallback classifications.
pub const FALLBACK_RISK_DETAILS: &str =
    "This clause may contain important legal obligations. Professional legal review is recommended.";

/// Keyword rule used by the local classifier.
struct FallbackRule {
    keywords: &'static [&'static str],
    category: Category,
    risk_level: RiskLevel,
    key_points: &'static [&'static str],
    risks: &'static [&'static str],
}

/// Rules evaluated in order; the first rule with a matching keyword wins.
///
/// Order matters: a clause mentioning both a fee and confidentiality is a payment clause.
const FALLBACK_RULES: &[FallbackRule] = &[
    FallbackRule {
        keywords: &["payment", "fee", "cost"],
        category: Category::Payment,
        risk_level: RiskLevel::Low,
        key_points: &["Involves financial obligations"],
        risks: &[],
    },
    FallbackRule {
        keywords: &["termination", "terminate"],
        category: Category::Termination,
        risk_level: RiskLevel::Low,
        key_points: &["Describes how the agreement can be ended"],
        risks: &[],
    },
    FallbackRule {
        keywords: &["confidential", "secret"],
        category: Category::Confidentiality,
        risk_level: RiskLevel::Medium,
        key_points: &["Involves handling of sensitive information"],
        risks: &["May require specific security measures"],
    },
    FallbackRule {
        keywords: &["liability", "indemnification"],
        category: Category::Liability,
        risk_level: RiskLevel::High,
        key_points: &["Defines legal responsibilities"],
        risks: &["May limit your legal rights"],
    },
    FallbackRule {
        keywords: &["intellectual property", "patent", "copyright"],
        category: Category::IntellectualProperty,
        risk_level: RiskLevel::Medium,
        key_points: &["Involves IP rights"],
        risks: &["May affect ownership of work products"],
    },
];

const GENERAL_RULE: FallbackRule = FallbackRule {
    keywords: &[],
    category: Category::General,
    risk_level: RiskLevel::Low,
    key_points: &["General provision of the agreement"],
    risks: &[],
};

/// Classify a clause with the local keyword rules. Never fails.
pub fn fallback_clause(text: &str) -> Clause {
    let lower = text.to_lowercase();
    let rule = FALLBACK_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|keyword| lower.contains(keyword)))
        .unwrap_or(&GENERAL_RULE);

    Clause {
        id: new_clause_id(),
        original_text: text.to_string(),
        category: rule.category,
        explanation: format!(
            "This clause appears to be about {}. It's recommended to review this section carefully.",
            rule.category.label().to_lowercase()
        ),
        risk_level: rule.risk_level,
        risk_details: (rule.risk_level != RiskLevel::Low)
            .then(|| FALLBACK_RISK_DETAILS.to_string()),
        key_points: rule.key_points.iter().map(|s| s.to_string()).collect(),
        risks: rule.risks.iter().map(|s| s.to_string()).collect(),
    }
}

fn new_clause_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Build the classification prompt for one clause.
pub fn classification_prompt(text: &str) -> String {
    format!(
        r#"Analyze this legal clause and respond with ONLY valid JSON. Do not include any explanatory text before or after the JSON.

Clause text: {text}

Respond with this exact JSON structure:
{{
  "category": "Termination|Liability|Renewal|Arbitration|Payment|Privacy|Intellectual Property|Confidentiality|Force Majeure|Governing Law|Miscellaneous",
  "simpleMeaning": "Brief explanation in plain English",
  "keyPoints": ["Point 1", "Point 2", "Point 3"],
  "risks": ["Risk 1", "Risk 2"],
  "riskLevel": "low|medium|high",
  "riskExplanation": "Why this risk level was assigned"
}}"#
    )
}

/// Return every top-level JSON object embedded in `raw`, in order of appearance.
///
/// Braces inside string literals are ignored, so braces quoted in values do not confuse the scan.
/// A `{` that never closes (stray prose, or a truncated trailing object) is skipped and the scan
/// resumes at the next `{`.
pub fn extract_json_objects(raw: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = raw[cursor..].find('{') {
        let begin = cursor + offset;
        match balanced_object_end(raw, begin) {
            Some(end) => {
                objects.push(&raw[begin..=end]);
                cursor = end + 1;
            }
            None => cursor = begin + 1,
        }
    }

    objects
}

/// Byte index of the `}` closing the object that opens at `begin`.
fn balanced_object_end(raw: &str, begin: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in raw[begin..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(begin + index);
                }
            }
            _ => {}
        }
    }
    None
}

/// Why a model reply could not be turned into a clause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// The reply contained no JSON object.
    #[error("response contained no JSON object")]
    NoJsonObject,
    /// The object was not valid JSON.
    #[error("response JSON was malformed: {0}")]
    Malformed(String),
    /// A required field was absent, empty, or of the wrong type.
    #[error("response was missing required field '{0}'")]
    MissingField(&'static str),
}

/// Validated fields extracted from a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedClause {
    /// Category named by the model (`General` when unrecognized).
    pub category: Category,
    /// Plain-English meaning.
    pub simple_meaning: String,
    /// Takeaways.
    pub key_points: Vec<String>,
    /// Concerns.
    pub risks: Vec<String>,
    /// Severity (`Low` when absent or unrecognized).
    pub risk_level: RiskLevel,
    /// Reasoning behind the severity.
    pub risk_explanation: Option<String>,
}

impl ParsedClause {
    /// Attach the clause text the reply was produced for.
    pub fn into_clause(self, original_text: &str) -> Clause {
        Clause {
            id: new_clause_id(),
            original_text: original_text.to_string(),
            category: self.category,
            explanation: self.simple_meaning,
            risk_level: self.risk_level,
            risk_details: self.risk_explanation,
            key_points: self.key_points,
            risks: self.risks,
        }
    }
}

/// Outcome of parsing a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseParse {
    /// The reply carried a usable classification.
    Parsed(ParsedClause),
    /// The reply must be replaced by the fallback classification.
    Failed(ParseFailure),
}

/// Parse the raw model reply for a single clause.
///
/// The first embedded object that is valid JSON is used; objects that fail to parse are skipped.
pub fn parse_clause_response(raw: &str) -> ClauseParse {
    let mut first_error = None;
    for object in extract_json_objects(raw) {
        match serde_json::from_str::<Map<String, Value>>(object) {
            Ok(fields) => return parse_clause_fields(&fields),
            Err(error) => {
                first_error.get_or_insert_with(|| error.to_string());
            }
        }
    }
    match first_error {
        Some(error) => ClauseParse::Failed(ParseFailure::Malformed(error)),
        None => ClauseParse::Failed(ParseFailure::NoJsonObject),
    }
}

fn parse_clause_fields(fields: &Map<String, Value>) -> ClauseParse {
    let Some(category) = non_empty_str(fields, "category") else {
        return ClauseParse::Failed(ParseFailure::MissingField("category"));
    };
    let Some(simple_meaning) = non_empty_str(fields, "simpleMeaning") else {
        return ClauseParse::Failed(ParseFailure::MissingField("simpleMeaning"));
    };

    ClauseParse::Parsed(ParsedClause {
        category: Category::from_label(category).unwrap_or(Category::General),
        simple_meaning: simple_meaning.to_string(),
        key_points: string_list(fields, "keyPoints"),
        risks: string_list(fields, "risks"),
        risk_level: non_empty_str(fields, "riskLevel")
            .and_then(RiskLevel::from_label)
            .unwrap_or_default(),
        risk_explanation: non_empty_str(fields, "riskExplanation").map(str::to_string),
    })
}

fn non_empty_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn string_list(fields: &Map<String, Value>, key: &str) -> Vec<String> {
    match fields.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(item)) if !item.trim().is_empty() => vec![item.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Where a clause's classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    /// Parsed from the remote model's reply.
    Remote,
    /// Produced by the local keyword rules.
    Fallback,
}

/// A classified clause and its provenance.
#[derive(Debug, Clone)]
pub struct Classification {
    /// The clause.
    pub clause: Clause,
    /// Whether the model or the fallback produced it.
    pub source: ClassificationSource,
}

/// Classifies clause texts, using the remote model when one is configured.
#[derive(Clone)]
pub struct ClauseClassifier {
    model: Option<Arc<dyn LanguageModel>>,
    max_tokens: u32,
    timeout: Duration,
    concurrency: usize,
}

impl ClauseClassifier {
    /// Build a classifier. `model = None` classifies everything locally.
    pub fn new(
        model: Option<Arc<dyn LanguageModel>>,
        max_tokens: u32,
        timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            model,
            max_tokens,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Classifier that never calls a remote model.
    pub fn offline() -> Self {
        Self::new(None, 1024, Duration::from_secs(30), 1)
    }

    /// Classify one clause text. Never fails.
    pub async fn classify(&self, text: &str) -> Clause {
        self.classify_with_source(text).await.clause
    }

    /// Classify one clause text and report which path produced the result.
    pub async fn classify_with_source(&self, text: &str) -> Classification {
        let Some(model) = self.model.as_ref() else {
            return Classification {
                clause: fallback_clause(text),
                source: ClassificationSource::Fallback,
            };
        };

        let reply = match self.request(model.as_ref(), text).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(error = %error, "Remote classification failed; using fallback rules");
                return Classification {
                    clause: fallback_clause(text),
                    source: ClassificationSource::Fallback,
                };
            }
        };

        match parse_clause_response(&reply) {
            ClauseParse::Parsed(parsed) => Classification {
                clause: parsed.into_clause(text),
                source: ClassificationSource::Remote,
            },
            ClauseParse::Failed(failure) => {
                tracing::warn!(reason = %failure, "Unusable classification reply; using fallback rules");
                Classification {
                    clause: fallback_clause(text),
                    source: ClassificationSource::Fallback,
                }
            }
        }
    }

    /// Classify every section concurrently. Output order matches input order.
    pub async fn classify_all(&self, sections: &[String]) -> Vec<Classification> {
        let pending: Vec<_> = sections
            .iter()
            .map(|section| self.classify_with_source(section))
            .collect();
        stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn request(&self, model: &dyn LanguageModel, text: &str) -> Result<String, LlmClientError> {
        let request = CompletionRequest {
            system: None,
            messages: vec![ChatMessage::user(classification_prompt(text))],
            max_tokens: self.max_tokens,
        };
        match tokio::time::timeout(self.timeout, model.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmClientError::Timeout(self.timeout)),
        }
    }
}
