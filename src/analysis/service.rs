//! Analysis service coordinating intake, splitting, classification, chat, and the store.

use crate::{
    analysis::{
        classifier::{ClassificationSource, ClauseClassifier},
        splitter::SplitStrategy,
        types::{AnalysisError, Clause, ConversationTurn, Document},
    },
    chat::{ChatReply, ChatResponder},
    config::Config,
    intake::{self, IntakeError},
    llm::{LanguageModel, Role, get_llm_client},
    metrics::{AnalysisMetrics, MetricsSnapshot},
    store::DocumentStore,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Owns the long-lived pieces of the pipeline: classifier, chat responder, store, and metrics.
///
/// Construct it once at startup and share it through an `Arc` with the HTTP surface.
pub struct AnalysisService {
    classifier: ClauseClassifier,
    responder: ChatResponder,
    strategy: SplitStrategy,
    max_upload_bytes: usize,
    chat_history_limit: usize,
    store: DocumentStore,
    metrics: AnalysisMetrics,
}

/// Operations the HTTP surface needs from the analysis pipeline.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Extract an uploaded file, analyze it, and make it the active document.
    async fn analyze_upload(
        &self,
        file_name: Option<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<Arc<Document>, AnalysisError>;

    /// Analyze pasted text and make it the active document.
    async fn analyze_text(&self, text: String) -> Result<Arc<Document>, AnalysisError>;

    /// Split and classify text without touching the store.
    async fn classify_sections(&self, text: &str) -> Vec<Clause>;

    /// Answer a chat message about `document` given prior turns.
    async fn chat(
        &self,
        message: &str,
        document: &Document,
        history: &[ConversationTurn],
    ) -> ChatReply;

    /// Answer a single question over the raw document text.
    async fn answer_question(&self, question: &str, document: &Document) -> ChatReply;

    /// The active-document store.
    fn store(&self) -> &DocumentStore;

    /// Number of prior turns forwarded with each chat message.
    fn chat_history_limit(&self) -> usize;

    /// Size cap for uploads and pasted text.
    fn max_upload_bytes(&self) -> usize;

    /// Current counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;

    /// Chat about the active document and record the exchange in its conversation.
    async fn chat_with_active(&self, message: &str) -> Result<ChatReply, AnalysisError> {
        let document = self
            .store()
            .current()
            .await
            .ok_or(AnalysisError::NoActiveDocument)?;
        let history = self.store().recent_turns(self.chat_history_limit()).await;
        let question = ConversationTurn::now(Role::User, message);
        let reply = self.chat(message, &document, &history).await;
        self.store()
            .append_exchange(
                &document.id,
                question,
                ConversationTurn::now(Role::Assistant, reply.text.clone()),
            )
            .await;
        Ok(reply)
    }
}

impl AnalysisService {
    /// Build the service from configuration, connecting the remote model when one is configured.
    pub fn new(config: &Config) -> Self {
        let model = get_llm_client(config);
        tracing::info!(
            remote_model = model.is_some(),
            model = %config.llm_model,
            strategy = ?config.split_strategy,
            "Initializing analysis service"
        );
        Self::with_model(config, model)
    }

    /// Build the service around an explicit model (or none).
    pub fn with_model(config: &Config, model: Option<Arc<dyn LanguageModel>>) -> Self {
        let timeout = Duration::from_secs(config.llm_timeout_secs);
        Self {
            classifier: ClauseClassifier::new(
                model.clone(),
                config.llm_max_tokens,
                timeout,
                config.classify_concurrency,
            ),
            responder: ChatResponder::new(model, timeout, config.chat_history_limit),
            strategy: config.split_strategy,
            max_upload_bytes: config.max_upload_bytes,
            chat_history_limit: config.chat_history_limit,
            store: DocumentStore::new(),
            metrics: AnalysisMetrics::new(),
        }
    }

    /// Split `text` and classify every section, in document order.
    pub async fn classify_text(&self, text: &str) -> Vec<Clause> {
        let sections = self.strategy.split(text);
        tracing::debug!(
            sections = sections.len(),
            strategy = ?self.strategy,
            "Split document into sections"
        );
        let classifications = self.classifier.classify_all(&sections).await;
        let fallbacks = classifications
            .iter()
            .filter(|c| c.source == ClassificationSource::Fallback)
            .count();
        for _ in 0..fallbacks {
            self.metrics.record_fallback();
        }
        tracing::info!(
            clauses = classifications.len(),
            fallbacks,
            "Classified document sections"
        );
        classifications.into_iter().map(|c| c.clause).collect()
    }

    /// Analyze already-validated text and publish it as the active document.
    async fn analyze_accepted(&self, text: String) -> Arc<Document> {
        let clauses = self.classify_text(&text).await;
        self.metrics.record_document(clauses.len() as u64);
        self.store.replace(Document::new(text, clauses)).await
    }
}

#[async_trait]
impl AnalysisApi for AnalysisService {
    async fn analyze_upload(
        &self,
        file_name: Option<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<Arc<Document>, AnalysisError> {
        let kind = intake::detect_kind(file_name.as_deref(), content_type.as_deref())?;
        tracing::info!(
            file_name = file_name.as_deref().unwrap_or("(unnamed)"),
            ?kind,
            bytes = bytes.len(),
            "Received upload"
        );
        let limit = self.max_upload_bytes;
        let text = tokio::task::spawn_blocking(move || intake::extract_text(kind, &bytes, limit))
            .await
            .map_err(|error| IntakeError::ExtractionFailure(error.to_string()))??;
        Ok(self.analyze_accepted(text).await)
    }

    async fn analyze_text(&self, text: String) -> Result<Arc<Document>, AnalysisError> {
        let text = intake::accept_pasted_text(&text, self.max_upload_bytes)?;
        Ok(self.analyze_accepted(text).await)
    }

    async fn classify_sections(&self, text: &str) -> Vec<Clause> {
        self.classify_text(text).await
    }

    async fn chat(
        &self,
        message: &str,
        document: &Document,
        history: &[ConversationTurn],
    ) -> ChatReply {
        let reply = self.responder.ask(message, document, history).await;
        self.metrics.record_chat(reply.fell_back);
        reply
    }

    async fn answer_question(&self, question: &str, document: &Document) -> ChatReply {
        let reply = self.responder.answer_question(question, document).await;
        self.metrics.record_chat(reply.fell_back);
        reply
    }

    fn store(&self) -> &DocumentStore {
        &self.store
    }

    fn chat_history_limit(&self) -> usize {
        self.chat_history_limit
    }

    fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
