//! Document stores: where content documents are read from and written to.
//!
//! The page-number pass only talks to a [`DocumentStore`]. Paths are
//! archive-relative and `/`-separated (`OEBPS/text/ch01.xhtml`).

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::dom::Document;
use crate::error::{Error, Result};

/// Random access to the files of an unpacked EPUB.
pub trait DocumentStore {
    /// Read the raw bytes of a file.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Replace the contents of a file.
    fn write(&mut self, path: &str, data: &[u8]) -> Result<()>;

    /// Read and parse a content document.
    fn open(&self, path: &str) -> Result<Document> {
        let bytes = self.read(path)?;
        Document::parse(&bytes)
            .map_err(|e| Error::Structure(format!("{path}: unparsable document: {e}")))
    }

    /// Serialize a document as UTF-8 and write it back whole.
    fn save(&mut self, path: &str, doc: &Document) -> Result<()> {
        self.write(path, &doc.to_bytes())
    }
}

/// Store backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an archive path onto the directory, refusing anything that would
    /// leave it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe || path.is_empty() {
            return Err(Error::archive(format!(
                "path escapes working directory: {path}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentStore for DirStore {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        Ok(std::fs::read(full)?)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, data)?;
        Ok(())
    }
}

/// In-memory store, keyed by archive path.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), data.into());
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// All paths, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{path} not found"),
            ))
        })
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }
}
