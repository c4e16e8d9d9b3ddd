//! Single-slot store for the active document and its conversation.
//!
//! A new analysis replaces the whole session at once; readers see either the previous document
//! or the next one, never a half-classified mix. The conversation belongs to the document it was
//! started on and is dropped together with it.

use crate::analysis::{ConversationTurn, Document};
use std::sync::Arc;
use tokio::sync::RwLock;

struct Session {
    document: Arc<Document>,
    conversation: Vec<ConversationTurn>,
}

/// Holds at most one analyzed document plus its chat history.
#[derive(Default)]
pub struct DocumentStore {
    slot: RwLock<Option<Session>>,
}

impl DocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `document` as the active document, discarding the previous one and its chat.
    pub async fn replace(&self, document: Document) -> Arc<Document> {
        let document = Arc::new(document);
        let previous = self.slot.write().await.replace(Session {
            document: Arc::clone(&document),
            conversation: Vec::new(),
        });
        tracing::info!(
            document_id = %document.id,
            clauses = document.clauses.len(),
            replaced = ?previous.as_ref().map(|session| session.document.id.as_str()),
            "Active document replaced"
        );
        document
    }

    /// The active document, if any.
    pub async fn current(&self) -> Option<Arc<Document>> {
        self.slot
            .read()
            .await
            .as_ref()
            .map(|session| Arc::clone(&session.document))
    }

    /// Drop the active document and its conversation. Returns whether anything was removed.
    pub async fn clear(&self) -> bool {
        let removed = self.slot.write().await.take();
        if let Some(session) = removed.as_ref() {
            tracing::info!(document_id = %session.document.id, "Active document cleared");
        }
        removed.is_some()
    }

    /// Full conversation of the active document, oldest first.
    pub async fn conversation(&self) -> Vec<ConversationTurn> {
        self.slot
            .read()
            .await
            .as_ref()
            .map(|session| session.conversation.clone())
            .unwrap_or_default()
    }

    /// The last `limit` turns of the active conversation, oldest first.
    pub async fn recent_turns(&self, limit: usize) -> Vec<ConversationTurn> {
        let guard = self.slot.read().await;
        let Some(session) = guard.as_ref() else {
            return Vec::new();
        };
        let start = session.conversation.len().saturating_sub(limit);
        session.conversation[start..].to_vec()
    }

    /// Append a question and its answer to the conversation of `document_id`.
    ///
    /// Returns `false` without changing anything when that document is no longer active.
    pub async fn append_exchange(
        &self,
        document_id: &str,
        question: ConversationTurn,
        answer: ConversationTurn,
    ) -> bool {
        let mut guard = self.slot.write().await;
        match guard.as_mut() {
            Some(session) if session.document.id == document_id => {
                session.conversation.push(question);
                session.conversation.push(answer);
                true
            }
            _ => {
                tracing::debug!(document_id, "Dropping chat exchange for a replaced document");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn document(text: &str) -> Document {
        Document::new(text.to_string(), Vec::new())
    }

    fn exchange(question: &str) -> (ConversationTurn, ConversationTurn) {
        (
            ConversationTurn::now(Role::User, question),
            ConversationTurn::now(Role::Assistant, format!("answer to {question}")),
        )
    }

    #[tokio::test]
    async fn replace_swaps_document_and_clears_conversation() {
        let store = DocumentStore::new();
        assert!(store.current().await.is_none());

        let first = store.replace(document("first")).await;
        let (q, a) = exchange("q1");
        assert!(store.append_exchange(&first.id, q, a).await);
        assert_eq!(store.conversation().await.len(), 2);

        let second = store.replace(document("second")).await;
        assert_eq!(store.current().await.expect("document").id, second.id);
        assert!(store.conversation().await.is_empty());
    }

    #[tokio::test]
    async fn stale_exchanges_are_rejected() {
        let store = DocumentStore::new();
        let first = store.replace(document("first")).await;
        store.replace(document("second")).await;

        let (q, a) = exchange("late");
        assert!(!store.append_exchange(&first.id, q, a).await);
        assert!(store.conversation().await.is_empty());
    }

    #[tokio::test]
    async fn recent_turns_returns_tail_in_order() {
        let store = DocumentStore::new();
        let doc = store.replace(document("text")).await;
        for index in 0..4 {
            let (q, a) = exchange(&format!("q{index}"));
            store.append_exchange(&doc.id, q, a).await;
        }

        let recent = store.recent_turns(3).await;
        let contents: Vec<_> = recent.iter().map(|turn| turn.content.as_str()).collect();
        assert_eq!(contents, vec!["answer to q2", "q3", "answer to q3"]);
        assert_eq!(store.recent_turns(100).await.len(), 8);
    }

    #[tokio::test]
    async fn clear_empties_the_slot() {
        let store = DocumentStore::new();
        assert!(!store.clear().await);
        store.replace(document("text")).await;
        assert!(store.clear().await);
        assert!(store.current().await.is_none());
        assert!(store.recent_turns(10).await.is_empty());
    }
}
