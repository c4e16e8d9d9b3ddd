//! File and pasted-text intake.
//!
//! Turns an upload into plain text before analysis. Every rejection happens here, before any
//! model call or store update, so a failed upload never leaves partial state behind.

use thiserror::Error;

/// Reasons a document is rejected at intake.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The file is neither a PDF nor plain text.
    #[error("Unsupported file type{}. Please upload a PDF or plain-text file.", describe(.0))]
    UnsupportedFileType(Option<String>),
    /// The file or pasted text exceeds the size cap.
    #[error("File is too large ({size} bytes). The limit is {limit} bytes.")]
    FileTooLarge {
        /// Submitted size in bytes.
        size: usize,
        /// Configured cap in bytes.
        limit: usize,
    },
    /// No text remained after extraction and trimming.
    #[error("The document appears to be empty.")]
    EmptyDocument,
    /// The file could not be read as the claimed type.
    #[error("Failed to read the document: {0}")]
    ExtractionFailure(String),
}

fn describe(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(|kind| format!(" '{kind}'"))
        .unwrap_or_default()
}

/// Format of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// UTF-8 text.
    PlainText,
}

/// Decide how to read an upload from its name and declared content type.
pub fn detect_kind(
    file_name: Option<&str>,
    content_type: Option<&str>,
) -> Result<DocumentKind, IntakeError> {
    let content_type = content_type.map(|value| value.trim().to_lowercase());
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase());

    if content_type.as_deref().is_some_and(|ct| ct.contains("pdf"))
        || extension.as_deref() == Some("pdf")
    {
        return Ok(DocumentKind::Pdf);
    }
    if content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("text/plain"))
        || matches!(extension.as_deref(), Some("txt" | "text" | "md"))
    {
        return Ok(DocumentKind::PlainText);
    }

    Err(IntakeError::UnsupportedFileType(
        content_type.or(extension).filter(|value| !value.is_empty()),
    ))
}

/// Extract the text of an upload, enforcing the size cap first.
pub fn extract_text(kind: DocumentKind, bytes: &[u8], limit: usize) -> Result<String, IntakeError> {
    ensure_within_limit(bytes.len(), limit)?;

    let text = match kind {
        DocumentKind::Pdf => extract_pdf_text(bytes)?,
        DocumentKind::PlainText => std::str::from_utf8(bytes)
            .map_err(|error| {
                IntakeError::ExtractionFailure(format!("file is not valid UTF-8 text: {error}"))
            })?
            .to_string(),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(IntakeError::EmptyDocument);
    }
    tracing::debug!(?kind, bytes = bytes.len(), chars = text.len(), "Extracted document text");
    Ok(text.to_string())
}

/// Validate pasted text against the same rules as uploads.
pub fn accept_pasted_text(text: &str, limit: usize) -> Result<String, IntakeError> {
    ensure_within_limit(text.len(), limit)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(IntakeError::EmptyDocument);
    }
    Ok(text.to_string())
}

fn ensure_within_limit(size: usize, limit: usize) -> Result<(), IntakeError> {
    if size > limit {
        return Err(IntakeError::FileTooLarge { size, limit });
    }
    Ok(())
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, IntakeError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(IntakeError::ExtractionFailure(
            "file does not start with a PDF header".into(),
        ));
    }
    let raw = pdf_extract::extract_text_from_mem(bytes).map_err(|error| {
        IntakeError::ExtractionFailure(format!("PDF text extraction failed: {error}"))
    })?;
    let text = label_pages(&raw);
    if text.is_empty() {
        tracing::warn!("PDF contained no extractable text; it may be scanned or image-only");
    }
    Ok(text)
}

/// Prefix each non-empty page (form-feed separated) with a `=== Page N ===` banner.
pub fn label_pages(raw: &str) -> String {
    let mut text = String::new();
    for (index, page) in raw.split('\x0C').enumerate() {
        let page = page.trim();
        if page.is_empty() {
            continue;
        }
        text.push_str(&format!("=== Page {} ===\n{page}\n\n", index + 1));
    }
    text.trim().to_string()
}
