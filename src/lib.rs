#![deny(missing_docs)]

//! Core library for LegalLens: clause-by-clause analysis of legal documents.

/// Document analysis pipeline and its service facade.
pub mod analysis;
/// HTTP routing and REST handlers.
pub mod api;
/// Conversational Q&A about an analyzed document.
pub mod chat;
/// Environment-driven configuration management.
pub mod config;
/// Plain-text report rendering.
pub mod export;
/// Uploaded file validation and text extraction.
pub mod intake;
/// Language-model client abstraction and the Anthropic adapter.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Analysis metrics helpers.
pub mod metrics;
/// Single-slot store for the active document and its conversation.
pub mod store;
