//! Document analysis pipeline: section splitting, clause classification, and orchestration.

pub mod classifier;
mod service;
pub mod splitter;
pub mod types;

pub use classifier::{ClauseClassifier, fallback_clause};
pub use service::{AnalysisApi, AnalysisService};
pub use splitter::{SplitStrategy, split};
pub use types::{
    AnalysisError, Category, Clause, ConversationTurn, Document, RiskLevel, fingerprint,
};
