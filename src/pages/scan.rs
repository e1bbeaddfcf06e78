//! Paragraph classification for a single document.

use std::collections::HashMap;

use tracing::warn;

use crate::dom::{Document, NodeId, XHTML_NS};
use crate::error::{Error, Result};

/// What a paragraph's text looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// Empty or whitespace only.
    Empty,
    /// Nothing but decimal digits once trimmed: a page-number candidate.
    Numeral(u64),
    /// Anything else.
    Content,
}

/// Classify paragraph text.
///
/// Fails with [`Error::Encoding`] for a digit run that does not fit the page
/// counter.
pub fn classify(text: &str) -> Result<TextKind> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(TextKind::Empty);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(TextKind::Content);
    }
    trimmed
        .parse::<u64>()
        .map(TextKind::Numeral)
        .map_err(|e| Error::Encoding(format!("page number '{trimmed}' out of range: {e}")))
}

/// A classified paragraph element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Paragraph {
    /// Pure numeral, with the parent it has to be removed from.
    Numeral {
        value: u64,
        element: NodeId,
        parent: NodeId,
    },
    /// Retained text; a gap-fill candidate.
    Content { element: NodeId },
    /// Could not be classified; left alone.
    Skipped { element: NodeId },
}

/// Classified paragraphs of one document, in processing order.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    paragraphs: Vec<Paragraph>,
}

impl ScanResult {
    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// `(value, element, parent)` for every pure numeral.
    pub fn numerals(&self) -> impl Iterator<Item = (u64, NodeId, NodeId)> + '_ {
        self.paragraphs.iter().filter_map(|p| match *p {
            Paragraph::Numeral {
                value,
                element,
                parent,
            } => Some((value, element, parent)),
            _ => None,
        })
    }

    /// Every paragraph retained as content.
    pub fn content(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.paragraphs.iter().filter_map(|p| match *p {
            Paragraph::Content { element } => Some(element),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}

/// Find and classify the XHTML paragraphs of a document. Read-only.
///
/// Paragraphs are grouped under their immediate parent. Parents come in the
/// order their first paragraph appears; siblings keep document order.
pub fn scan(doc: &Document) -> ScanResult {
    let mut parents: Vec<NodeId> = Vec::new();
    let mut by_parent: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

    for element in doc.elements_named(XHTML_NS, "p") {
        let Some(parent) = doc.parent(element) else {
            continue;
        };
        by_parent
            .entry(parent)
            .or_insert_with(|| {
                parents.push(parent);
                Vec::new()
            })
            .push(element);
    }

    let mut paragraphs = Vec::new();
    for parent in parents {
        for &element in &by_parent[&parent] {
            match classify(&doc.text_content(element)) {
                Ok(TextKind::Empty) => {}
                Ok(TextKind::Numeral(value)) => paragraphs.push(Paragraph::Numeral {
                    value,
                    element,
                    parent,
                }),
                Ok(TextKind::Content) => paragraphs.push(Paragraph::Content { element }),
                Err(e) => {
                    warn!(error = %e, "skipping paragraph");
                    paragraphs.push(Paragraph::Skipped { element });
                }
            }
        }
    }

    ScanResult { paragraphs }
}
