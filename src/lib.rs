//! # pagefix
//!
//! Removes stray page numbers left in EPUB books by print-to-digital
//! conversion.
//!
//! Scanned books often carry the printed page numbers as paragraphs of their
//! own (`<p>127</p>`) or, when the converter merged them, inside the
//! surrounding text. pagefix walks the book in reading order, removes the
//! numeral paragraphs, and uses the sequence of page numbers it has seen to
//! find and erase the ones that were absorbed into running text.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use pagefix::{Options, SessionOptions, fix_epub};
//!
//! let report = fix_epub(
//!     Path::new("book.epub"),
//!     None,
//!     &Options::default(),
//!     &SessionOptions::default(),
//! )?;
//! println!("removed {} page numbers", report.page_numbers_removed);
//! # Ok::<(), pagefix::Error>(())
//! ```
//!
//! ## Working with Stores
//!
//! The page-number pass only needs a [`DocumentStore`]. [`MemoryStore`] is
//! handy when the files are already in memory:
//!
//! ```
//! use pagefix::{MemoryStore, Options, fix_store};
//!
//! let mut store = MemoryStore::new();
//! store.insert("META-INF/container.xml", r#"<container xmlns="urn:oasis:names:tc:opendocument:xmlns:container"><rootfiles><rootfile full-path="content.opf"/></rootfiles></container>"#);
//! store.insert("content.opf", r#"<package xmlns="http://www.idpf.org/2007/opf"><manifest><item id="c1" href="c1.xhtml"/></manifest><spine><itemref idref="c1"/></spine></package>"#);
//! store.insert("c1.xhtml", r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p>Once upon a time</p><p>1</p></body></html>"#);
//!
//! let report = fix_store(&mut store, &Options::default()).unwrap();
//! assert_eq!(report.page_numbers_removed, 1);
//! ```

pub mod dom;
pub mod epub;
pub mod error;
pub mod pages;
pub mod store;
pub(crate) mod util;

use std::path::{Path, PathBuf};

use tracing::info;

pub use dom::Document;
pub use epub::{Session, SessionOptions, fixed_output_path, resolve_spine};
pub use error::{Error, Result};
pub use pages::{GapMatch, Options, Reconciler, Report, fix_store, reconcile};
pub use store::{DirStore, DocumentStore, MemoryStore};

/// Clean an EPUB file and write the result next to it.
///
/// The output defaults to `<stem>_fixed.epub` beside the input. The input
/// archive is never modified; on error no output is left behind and the
/// working directory is removed.
pub fn fix_epub(
    input: &Path,
    output: Option<&Path>,
    options: &Options,
    session_options: &SessionOptions,
) -> Result<Report> {
    let output: PathBuf = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fixed_output_path(input));

    let session = Session::open(input, session_options)?;
    let mut store = session.store();
    let report = fix_store(&mut store, options)?;
    session.repack(&output)?;

    info!(input = %input.display(), output = %output.display(), "wrote cleaned book");
    Ok(report)
}
