//! Page-number artifact detection and removal.
//!
//! [`scan`] classifies one document's paragraphs; [`Reconciler`] folds over
//! the whole spine, removing page-number paragraphs and erasing skipped page
//! numbers that ended up inside running text.

mod reconcile;
mod scan;

pub use reconcile::{GapMatch, Options, Reconciler, Report, reconcile};
pub use scan::{Paragraph, ScanResult, TextKind, classify, scan};

use crate::dom::XHTML_NS;
use crate::epub::resolve_spine;
use crate::error::Result;
use crate::store::DocumentStore;

/// Resolve the spine of the EPUB in `store` and clean it in place.
pub fn fix_store<S: DocumentStore + ?Sized>(store: &mut S, options: &Options) -> Result<Report> {
    let spine = resolve_spine(store)?;
    reconcile(store, &spine, options)
}

/// Text of every non-empty paragraph, per document, in spine order.
///
/// Read-only; paragraphs come in document order.
pub fn paragraph_texts<S: DocumentStore + ?Sized>(store: &S) -> Result<Vec<(String, Vec<String>)>> {
    let spine = resolve_spine(store)?;
    let mut out = Vec::with_capacity(spine.len());
    for path in spine {
        let doc = store.open(&path)?;
        let texts = doc
            .elements_named(XHTML_NS, "p")
            .into_iter()
            .map(|p| doc.text_content(p))
            .filter(|t| !t.trim().is_empty())
            .collect();
        out.push((path, texts));
    }
    Ok(out)
}
