//! Heuristic section splitting.
//!
//! Cuts raw document text into candidate clause texts before anything is sent to the model.
//! Two strategies exist:
//!
//! - [`SplitStrategy::Paragraph`] splits on blank lines and starts a new section at every
//!   numbered/lettered paragraph or short paragraph naming a common legal heading. This is the
//!   canonical strategy used by [`split`].
//! - [`SplitStrategy::Continuation`] splits on runs of two or more newlines and glues an
//!   unmarked section onto its predecessor while that predecessor has not ended a sentence.
//!
//! Neither strategy fails. Output sections are trimmed, non-empty, and in document order.

use regex::Regex;
use std::sync::LazyLock;

/// Legal heading vocabulary recognized by the paragraph strategy.
const SECTION_HEADERS: &[&str] = &[
    "definitions",
    "term",
    "termination",
    "payment",
    "confidentiality",
    "intellectual property",
    "liability",
    "indemnification",
    "warranties",
    "governing law",
    "dispute resolution",
    "force majeure",
    "assignment",
    "notices",
    "entire agreement",
    "amendment",
    "severability",
    "waiver",
];

/// Paragraphs at or above this many characters never count as headings.
const MAX_HEADER_CHARS: usize = 100;

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("blank line pattern"));
static NUMBERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d.]+\s+").expect("numbered item pattern"));
static LETTERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z][.)]\s+").expect("lettered item pattern"));
static NEWLINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\r?\n){2,}").expect("newline run pattern"));
static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\d.]+|^[a-z][).]|^section|^article").expect("section marker pattern")
});

/// Splitting heuristic applied to raw document text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Blank-line paragraphs grouped under numbered items and short legal headings.
    #[default]
    Paragraph,
    /// Newline-run sections merged while the previous section is mid-sentence.
    Continuation,
}

impl SplitStrategy {
    /// Split `text` with this strategy.
    pub fn split(self, text: &str) -> Vec<String> {
        match self {
            Self::Paragraph => split_paragraphs(text),
            Self::Continuation => split_continuations(text),
        }
    }
}

impl std::str::FromStr for SplitStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paragraph" | "heading" => Ok(Self::Paragraph),
            "continuation" | "structural" => Ok(Self::Continuation),
            _ => Err(()),
        }
    }
}

/// Split text into candidate clauses using the canonical strategy.
pub fn split(text: &str) -> Vec<String> {
    SplitStrategy::default().split(text)
}

/// Whether a paragraph opens a new section under the paragraph strategy.
pub fn is_boundary_marker(paragraph: &str) -> bool {
    is_list_item(paragraph) || is_short_heading(paragraph)
}

fn is_list_item(paragraph: &str) -> bool {
    NUMBERED_ITEM.is_match(paragraph) || LETTERED_ITEM.is_match(paragraph)
}

fn is_short_heading(paragraph: &str) -> bool {
    if paragraph.chars().count() >= MAX_HEADER_CHARS {
        return false;
    }
    let words = paragraph
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    SECTION_HEADERS.iter().any(|header| words.contains(header))
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    for paragraph in BLANK_LINE
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
    {
        if is_boundary_marker(paragraph) {
            flush(&mut sections, &mut current);
            current.push_str(paragraph);
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }
    }
    flush(&mut sections, &mut current);

    tracing::trace!(sections = sections.len(), "Split document by paragraph headings");
    sections
}

fn flush(sections: &mut Vec<String>, current: &mut String) {
    let section = current.trim();
    if !section.is_empty() {
        sections.push(section.to_string());
    }
    current.clear();
}

fn split_continuations(text: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();

    for section in NEWLINE_RUN
        .split(text)
        .map(str::trim)
        .filter(|section| !section.is_empty())
    {
        match sections.last_mut() {
            Some(previous) if !SECTION_MARKER.is_match(section) && !previous.ends_with('.') => {
                previous.push('\n');
                previous.push_str(section);
            }
            _ => sections.push(section.to_string()),
        }
    }

    tracing::trace!(sections = sections.len(), "Split document by continuation");
    sections
}
