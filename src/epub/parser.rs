//! EPUB parsing utilities (container.xml, OPF manifest and spine).

use std::collections::HashMap;

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;

use crate::error::{Error, Result};
use crate::util::{decode_text, declared_encoding, unescape_attr};

/// Well-known location of the package descriptor.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Namespace of `META-INF/container.xml`.
pub const CONTAINER_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:container";

/// Namespace of the OPF package document.
pub const OPF_NS: &str = "http://www.idpf.org/2007/opf";

/// Manifest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestItem {
    pub href: Option<String>,
}

/// Parsed OPF package data.
#[derive(Debug, Clone, Default)]
pub struct OpfData {
    /// Maps manifest id -> item. First item wins on duplicate ids.
    pub manifest: HashMap<String, ManifestItem>,
    /// `idref` of every spine `itemref`, in document order. `None` when the
    /// attribute is missing.
    pub spine_ids: Vec<Option<String>>,
}

/// Parse META-INF/container.xml to find the OPF path.
///
/// Returns the `full-path` of the first `rootfile` element.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = decode_text(bytes, declared_encoding(bytes).as_deref());
    let mut reader = NsReader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Empty(e))) | Ok((ns, Event::Start(e)))
                if is_element(&ns, &e, CONTAINER_NS, b"rootfile") =>
            {
                return attr_value(&e, b"full-path").ok_or_else(|| {
                    Error::structure("rootfile in container.xml has no full-path")
                });
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => {
                return Err(Error::Structure(format!(
                    "{CONTAINER_PATH} is not well-formed: {e}"
                )));
            }
            _ => {}
        }
    }

    Err(Error::structure("No rootfile found in container.xml"))
}

/// Parse the OPF package document's manifest and spine.
pub fn parse_opf(bytes: &[u8]) -> Result<OpfData> {
    let content = decode_text(bytes, declared_encoding(bytes).as_deref());
    let mut reader = NsReader::from_str(&content);
    reader.config_mut().trim_text(true);

    let mut opf = OpfData::default();

    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Empty(e))) | Ok((ns, Event::Start(e))) => {
                if is_element(&ns, &e, OPF_NS, b"item") {
                    let Some(id) = attr_value(&e, b"id") else {
                        continue;
                    };
                    opf.manifest.entry(id).or_insert(ManifestItem {
                        href: attr_value(&e, b"href"),
                    });
                } else if is_element(&ns, &e, OPF_NS, b"itemref") {
                    opf.spine_ids.push(attr_value(&e, b"idref"));
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => {
                return Err(Error::Structure(format!(
                    "package document is not well-formed: {e}"
                )));
            }
            _ => {}
        }
    }

    Ok(opf)
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn is_element(ns: &ResolveResult<'_>, e: &BytesStart<'_>, namespace: &str, local: &[u8]) -> bool {
    matches!(ns, ResolveResult::Bound(n) if n.as_ref() == namespace.as_bytes())
        && e.local_name().as_ref() == local
}

/// Unprefixed attribute value, unescaped.
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| unescape_attr(&String::from_utf8_lossy(&attr.value)).into_owned())
}
