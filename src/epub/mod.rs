//! EPUB structure: package resolution, extraction and repacking.

mod parser;
mod reader;
mod session;
mod writer;

pub use parser::{
    CONTAINER_NS, CONTAINER_PATH, ManifestItem, OPF_NS, OpfData, parse_container_xml, parse_opf,
};
pub use reader::{ArchiveEntry, extract_epub};
pub use session::{Session, SessionOptions, fixed_output_path};
pub use writer::repack_epub;

use std::io;

use crate::error::{Error, Result};
use crate::store::DocumentStore;

/// Resolve the reading order of an unpacked EPUB.
///
/// Follows `META-INF/container.xml` to the package document and maps each
/// spine `itemref` to its manifest `href`. The returned paths are
/// store-relative, in spine order, duplicates preserved.
pub fn resolve_spine<S: DocumentStore + ?Sized>(store: &S) -> Result<Vec<String>> {
    let container = read_required(store, CONTAINER_PATH)?;
    let opf_path = parse_container_xml(&container)?;
    let opf_dir = opf_path
        .rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default();

    let opf_bytes = read_required(store, &opf_path)?;
    let OpfData {
        manifest,
        spine_ids,
    } = parse_opf(&opf_bytes)?;

    let mut paths = Vec::with_capacity(spine_ids.len());
    for (index, idref) in spine_ids.into_iter().enumerate() {
        let idref = idref.ok_or_else(|| {
            Error::Structure(format!("spine itemref #{} has no idref", index + 1))
        })?;
        let item = manifest.get(&idref).ok_or_else(|| {
            Error::Structure(format!("spine references unknown manifest id '{idref}'"))
        })?;
        let href = item.href.as_deref().ok_or_else(|| {
            Error::Structure(format!("manifest item '{idref}' has no href"))
        })?;
        paths.push(resolve_path(&opf_dir, href));
    }

    Ok(paths)
}

fn read_required<S: DocumentStore + ?Sized>(store: &S, path: &str) -> Result<Vec<u8>> {
    match store.read(path) {
        Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            Err(Error::Structure(format!("missing {path}")))
        }
        other => other,
    }
}

/// Join an OPF-relative href onto the OPF directory.
///
/// Drops any fragment, percent-decodes, and folds `.` / `..` segments.
fn resolve_path(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let decoded = percent_encoding::percent_decode_str(href).decode_utf8_lossy();

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}
