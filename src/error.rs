//! Error types for pagefix operations.

use thiserror::Error;

/// Errors that can occur while resolving, cleaning, or repacking an EPUB.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The archive could not be read, written, or extracted.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Container descriptor, manifest, spine, or a content document is unusable.
    #[error("Invalid EPUB structure: {0}")]
    Structure(String),

    /// A paragraph could not be classified. Recovered inside the reconciler.
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl Error {
    pub(crate) fn structure(msg: impl Into<String>) -> Self {
        Error::Structure(msg.into())
    }

    pub(crate) fn archive(msg: impl Into<String>) -> Self {
        Error::Archive(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
