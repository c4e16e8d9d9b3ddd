use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing analysis activity.
#[derive(Default)]
pub struct AnalysisMetrics {
    documents_analyzed: AtomicU64,
    clauses_classified: AtomicU64,
    fallback_classifications: AtomicU64,
    chat_requests: AtomicU64,
    chat_fallbacks: AtomicU64,
}

impl AnalysisMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an analyzed document and the number of clauses produced for it.
    pub fn record_document(&self, clause_count: u64) {
        self.documents_analyzed.fetch_add(1, Ordering::Relaxed);
        self.clauses_classified
            .fetch_add(clause_count, Ordering::Relaxed);
    }

    /// Record a clause classified by the local fallback rules.
    pub fn record_fallback(&self) {
        self.fallback_classifications
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a chat exchange, noting whether the fallback answer was served.
    pub fn record_chat(&self, fell_back: bool) {
        self.chat_requests.fetch_add(1, Ordering::Relaxed);
        if fell_back {
            self.chat_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_analyzed: self.documents_analyzed.load(Ordering::Relaxed),
            clauses_classified: self.clauses_classified.load(Ordering::Relaxed),
            fallback_classifications: self.fallback_classifications.load(Ordering::Relaxed),
            chat_requests: self.chat_requests.load(Ordering::Relaxed),
            chat_fallbacks: self.chat_fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of analysis counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents analyzed since startup.
    pub documents_analyzed: u64,
    /// Total clause count produced across all analyzed documents.
    pub clauses_classified: u64,
    /// Clauses whose remote classification failed and used the local rules.
    pub fallback_classifications: u64,
    /// Chat requests answered.
    pub chat_requests: u64,
    /// Chat requests answered with the fallback apology.
    pub chat_fallbacks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_documents_and_clauses() {
        let metrics = AnalysisMetrics::new();
        metrics.record_document(2);
        metrics.record_document(3);
        metrics.record_fallback();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_analyzed, 2);
        assert_eq!(snapshot.clauses_classified, 5);
        assert_eq!(snapshot.fallback_classifications, 1);
    }

    #[test]
    fn chat_fallbacks_are_counted_separately() {
        let metrics = AnalysisMetrics::new();
        metrics.record_chat(false);
        metrics.record_chat(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.chat_requests, 2);
        assert_eq!(snapshot.chat_fallbacks, 1);
    }
}
