//! Conversational Q&A grounded in the analyzed document.
//!
//! Chat never surfaces an error: if the model is missing, slow, or failing, the caller gets a
//! fixed displayable answer instead.

use crate::analysis::{ConversationTurn, Document};
use crate::llm::{ChatMessage, CompletionRequest, LanguageModel, LlmClientError, Role};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Answer returned when the model cannot be reached.
pub const CHAT_FALLBACK_RESPONSE: &str =
    "I apologize, but I'm having trouble processing your request right now. Please try again in a moment.";

const CHAT_MAX_TOKENS: u32 = 1000;
const QUESTION_MAX_TOKENS: u32 = 1024;

/// A chat answer and whether it came from the fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// Text shown to the user.
    pub text: String,
    /// `true` when the model was bypassed.
    pub fell_back: bool,
}

impl ChatReply {
    fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fell_back: true,
        }
    }
}

/// Build the system prompt listing every clause of the document.
pub fn build_system_prompt(document: &Document) -> String {
    let mut prompt = String::from(
        "You are a legal assistant helping users understand legal documents.\n\nThe user has uploaded a legal document with the following clauses:\n",
    );
    for clause in &document.clauses {
        let key_points = if clause.key_points.is_empty() {
            "N/A".to_string()
        } else {
            clause.key_points.join(", ")
        };
        let risks = if clause.risks.is_empty() {
            "None".to_string()
        } else {
            clause.risks.join(", ")
        };
        let _ = write!(
            prompt,
            "\n- {}: {}\n  Original text: \"{}\"\n  Key points: {key_points}\n  Risks: {risks}\n",
            clause.category, clause.explanation, clause.original_text
        );
    }
    prompt.push_str(
        "\nPlease answer the user's questions about this document in a helpful, clear manner. If the user asks about something not covered in the document, let them know that information isn't available in the uploaded document.",
    );
    prompt
}

/// Canned answer used by the single-question endpoint when no model is available.
pub fn offline_answer(question: &str) -> &'static str {
    let lower = question.to_lowercase();
    if lower.contains("what is this document") {
        "This appears to be a legal document. I'm currently operating in development mode without AI capabilities, but I can help you understand its basic structure."
    } else if lower.contains("summary") {
        "I can identify different sections of this document, but for detailed analysis, you'll need to enable the Anthropic API integration."
    } else {
        "I'm currently running in development mode without AI capabilities. To get detailed answers about specific clauses, you'll need to set up the Anthropic API integration."
    }
}

/// Sends questions about a document to the model.
#[derive(Clone)]
pub struct ChatResponder {
    model: Option<Arc<dyn LanguageModel>>,
    timeout: Duration,
    history_limit: usize,
}

impl ChatResponder {
    /// Build a responder. `model = None` always answers with the fallbacks.
    pub fn new(model: Option<Arc<dyn LanguageModel>>, timeout: Duration, history_limit: usize) -> Self {
        Self {
            model,
            timeout,
            history_limit,
        }
    }

    /// Answer `question` using the clause breakdown and the most recent `history` turns.
    pub async fn ask(
        &self,
        question: &str,
        document: &Document,
        history: &[ConversationTurn],
    ) -> ChatReply {
        let Some(model) = self.model.as_ref() else {
            return ChatReply::fallback(CHAT_FALLBACK_RESPONSE);
        };

        let start = history.len().saturating_sub(self.history_limit);
        let mut messages: Vec<ChatMessage> = history[start..]
            .iter()
            .skip_while(|turn| turn.role == Role::Assistant)
            .map(|turn| ChatMessage {
                role: turn.role,
                content: turn.content.clone(),
            })
            .collect();
        messages.push(ChatMessage::user(question));

        let request = CompletionRequest {
            system: Some(build_system_prompt(document)),
            messages,
            max_tokens: CHAT_MAX_TOKENS,
        };
        match self.complete(model.as_ref(), request).await {
            Ok(text) => ChatReply {
                text,
                fell_back: false,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Chat request failed; returning fallback answer");
                ChatReply::fallback(CHAT_FALLBACK_RESPONSE)
            }
        }
    }

    /// Answer a one-off question over the raw document text.
    pub async fn answer_question(&self, question: &str, document: &Document) -> ChatReply {
        let Some(model) = self.model.as_ref() else {
            return ChatReply::fallback(offline_answer(question));
        };

        let prompt = format!(
            "You are a helpful legal assistant. Answer the following question about the provided legal document in plain English.\n\nDocument:\n{}\n\nQuestion: {question}",
            document.content
        );
        let request = CompletionRequest {
            system: None,
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: QUESTION_MAX_TOKENS,
        };
        match self.complete(model.as_ref(), request).await {
            Ok(text) => ChatReply {
                text,
                fell_back: false,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Question request failed; returning offline answer");
                ChatReply::fallback(offline_answer(question))
            }
        }
    }

    async fn complete(
        &self,
        model: &dyn LanguageModel,
        request: CompletionRequest,
    ) -> Result<String, LlmClientError> {
        match tokio::time::timeout(self.timeout, model.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmClientError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Category, Clause, RiskLevel};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        requests: Mutex<Vec<CompletionRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmClientError> {
            self.requests.lock().expect("lock").push(request);
            if self.fail {
                Err(LlmClientError::ProviderUnavailable("offline".into()))
            } else {
                Ok("The notice period is 30 days.".into())
            }
        }
    }

    fn sample_document() -> Document {
        Document::new(
            "Either party may terminate with 30 days notice.".into(),
            vec![Clause {
                id: String::new(),
                original_text: "Either party may terminate with 30 days notice.".into(),
                category: Category::Termination,
                explanation: "Both sides can end the deal.".into(),
                risk_level: RiskLevel::Low,
                risk_details: None,
                key_points: vec!["30 days notice".into(), "Mutual right".into()],
                risks: vec![],
            }],
        )
    }

    fn history(count: usize) -> Vec<ConversationTurn> {
        (0..count)
            .map(|index| {
                let role = if index % 2 == 0 { Role::User } else { Role::Assistant };
                ConversationTurn::now(role, format!("turn {index}"))
            })
            .collect()
    }

    #[test]
    fn system_prompt_lists_every_clause() {
        let prompt = build_system_prompt(&sample_document());
        assert!(prompt.contains("- Termination: Both sides can end the deal."));
        assert!(prompt.contains("Original text: \"Either party may terminate with 30 days notice.\""));
        assert!(prompt.contains("Key points: 30 days notice, Mutual right"));
        assert!(prompt.contains("Risks: None"));
    }

    #[tokio::test]
    async fn ask_forwards_recent_history_and_question() {
        let model = Arc::new(RecordingModel::default());
        let responder = ChatResponder::new(Some(model.clone()), Duration::from_secs(5), 10);

        let reply = responder
            .ask("How much notice?", &sample_document(), &history(14))
            .await;

        assert_eq!(reply.text, "The notice period is 30 days.");
        assert!(!reply.fell_back);
        let requests = model.requests.lock().expect("lock");
        let request = &requests[0];
        assert_eq!(request.max_tokens, CHAT_MAX_TOKENS);
        assert!(request.system.as_deref().is_some_and(|s| s.contains("Termination")));
        assert_eq!(request.messages.len(), 11);
        assert_eq!(request.messages[0].content, "turn 4");
        assert_eq!(request.messages[10], ChatMessage::user("How much notice?"));
    }

    #[tokio::test]
    async fn ask_failure_returns_apology() {
        let model = Arc::new(RecordingModel {
            fail: true,
            ..RecordingModel::default()
        });
        let responder = ChatResponder::new(Some(model), Duration::from_secs(5), 10);

        let reply = responder.ask("Anything?", &sample_document(), &[]).await;

        assert_eq!(reply.text, CHAT_FALLBACK_RESPONSE);
        assert!(reply.fell_back);
    }

    #[tokio::test]
    async fn offline_question_uses_canned_answers() {
        let responder = ChatResponder::new(None, Duration::from_secs(5), 10);
        let reply = responder
            .answer_question("Give me a summary", &sample_document())
            .await;
        assert!(reply.fell_back);
        assert!(reply.text.contains("identify different sections"));
        assert!(offline_answer("What is this document?").contains("legal document"));
    }
}
