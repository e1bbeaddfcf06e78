//! Text decoding and entity helpers shared by the parsers.

use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::escape::{resolve_predefined_entity, unescape_with};
use regex::Regex;

static ENCODING_PSEUDO_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"encoding\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid encoding regex")
});

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the hint encoding (from `<?xml encoding="..."?>`)
/// 3. Falls back to Windows-1252 (common in old ebooks)
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    // Try UTF-8 first (handles BOM automatically)
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    // Fallback: Windows-1252 (common in old ebooks, superset of ISO-8859-1)
    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Encoding named in the XML declaration, if any.
pub fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let decl_end = head.find("?>")?;
    let decl = head[..decl_end].strip_prefix("<?xml").or_else(|| {
        // Tolerate a BOM or leading whitespace before the declaration
        head[..decl_end]
            .trim_start_matches('\u{feff}')
            .trim_start()
            .strip_prefix("<?xml")
    })?;
    let caps = ENCODING_PSEUDO_ATTR.captures(decl)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Rewrite the `encoding` pseudo-attribute of a declaration body to UTF-8.
pub fn force_utf8_declaration(decl: &str) -> Cow<'_, str> {
    ENCODING_PSEUDO_ATTR.replace(decl, r#"encoding="utf-8""#)
}

/// Resolve a named entity: the XML predefined ones, plus the HTML spaces that
/// show up around page numbers in converted books.
pub fn resolve_named_entity(name: &str) -> Option<&'static str> {
    resolve_predefined_entity(name).or(match name {
        "nbsp" => Some("\u{a0}"),
        "ensp" => Some("\u{2002}"),
        "emsp" => Some("\u{2003}"),
        "thinsp" => Some("\u{2009}"),
        _ => None,
    })
}

/// Unescape an attribute value. A value with an unknown or malformed
/// reference is returned as written.
pub fn unescape_attr(raw: &str) -> Cow<'_, str> {
    unescape_with(raw, resolve_named_entity).unwrap_or(Cow::Borrowed(raw))
}
