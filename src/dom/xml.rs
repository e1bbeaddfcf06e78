//! XML reading and writing for [`Document`].
//!
//! Parsing keeps enough of the source (declaration, doctype, comments,
//! processing instructions, entity references, raw attribute values, empty
//! element syntax) that an untouched document serializes back to equivalent
//! markup. Output is always UTF-8.

use quick_xml::NsReader;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;

use super::arena::{Attribute, Document, NodeData, NodeId, QualName};
use crate::error::{Error, Result};
use crate::util::{decode_text, declared_encoding, force_utf8_declaration, resolve_named_entity};

impl Document {
    /// Parse a markup document from raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Document> {
        let hint = declared_encoding(bytes);
        let content = decode_text(bytes, hint.as_deref());
        Self::parse_str(&content)
    }

    /// Parse a markup document from a string.
    pub fn parse_str(content: &str) -> Result<Document> {
        let mut reader = NsReader::from_str(content);
        reader.config_mut().trim_text(false);

        let mut doc = Document::new();
        let mut stack = vec![doc.root()];

        loop {
            let (ns, event) = reader.read_resolved_event()?;
            let parent = *stack.last().unwrap_or(&doc.root());
            match event {
                Event::Start(e) => {
                    let id = create_element(&mut doc, &ns, &e, false);
                    doc.append(parent, id);
                    stack.push(id);
                }
                Event::Empty(e) => {
                    let id = create_element(&mut doc, &ns, &e, true);
                    doc.append(parent, id);
                }
                Event::End(_) => {
                    if stack.len() <= 1 {
                        return Err(Error::structure("unbalanced closing tag"));
                    }
                    stack.pop();
                }
                Event::Text(e) => {
                    doc.append_text(parent, &String::from_utf8_lossy(e.as_ref()));
                }
                Event::GeneralRef(e) => {
                    let name = String::from_utf8_lossy(e.as_ref()).into_owned();
                    let resolved = match e.resolve_char_ref() {
                        Ok(Some(c)) => Some(c.to_string()),
                        Ok(None) => resolve_named_entity(&name).map(str::to_string),
                        Err(_) => None,
                    };
                    let id = doc.create(NodeData::EntityRef { name, resolved });
                    doc.append(parent, id);
                }
                Event::CData(e) => {
                    let id = doc.create(NodeData::CData(
                        String::from_utf8_lossy(&e).into_owned(),
                    ));
                    doc.append(parent, id);
                }
                Event::Comment(e) => {
                    let id = doc.create(NodeData::Comment(
                        String::from_utf8_lossy(&e).into_owned(),
                    ));
                    doc.append(parent, id);
                }
                Event::PI(e) => {
                    let id = doc.create(NodeData::ProcessingInstruction(
                        String::from_utf8_lossy(&e).into_owned(),
                    ));
                    doc.append(parent, id);
                }
                Event::Decl(e) => {
                    let id = doc.create(NodeData::Declaration(
                        String::from_utf8_lossy(&e).into_owned(),
                    ));
                    doc.append(parent, id);
                }
                Event::DocType(e) => {
                    let id = doc.create(NodeData::Doctype(
                        String::from_utf8_lossy(&e).into_owned(),
                    ));
                    doc.append(parent, id);
                }
                Event::Eof => break,
            }
        }

        if stack.len() > 1 {
            return Err(Error::structure("unclosed element at end of document"));
        }
        if !doc.children(doc.root()).any(|id| doc.element_name(id).is_some()) {
            return Err(Error::structure("document has no root element"));
        }

        Ok(doc)
    }

    /// Serialize the attached tree as UTF-8 markup.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root()) {
            self.write_node(&mut out, child);
        }
        out
    }

    /// Serialize to bytes, ready to hand back to a store.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_xml().into_bytes()
    }

    fn write_node(&self, out: &mut String, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.data {
            NodeData::Document => {
                for child in self.children(id) {
                    self.write_node(out, child);
                }
            }
            NodeData::Declaration(body) => {
                out.push_str("<?");
                out.push_str(&force_utf8_declaration(body));
                out.push_str("?>");
            }
            NodeData::Doctype(body) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(body.trim_start());
                out.push('>');
            }
            NodeData::Element {
                raw_name,
                attrs,
                self_closing,
                ..
            } => {
                out.push('<');
                out.push_str(raw_name);
                for attr in attrs {
                    out.push(' ');
                    out.push_str(&attr.raw_name);
                    out.push_str("=\"");
                    out.push_str(&attr.raw_value.replace('"', "&quot;"));
                    out.push('"');
                }
                if *self_closing && node.first_child.is_none() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for child in self.children(id) {
                    self.write_node(out, child);
                }
                out.push_str("</");
                out.push_str(raw_name);
                out.push('>');
            }
            NodeData::Text(text) => out.push_str(&partial_escape(text.as_str())),
            NodeData::CData(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>");
            }
            NodeData::EntityRef { name, .. } => {
                out.push('&');
                out.push_str(name);
                out.push(';');
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::ProcessingInstruction(body) => {
                out.push_str("<?");
                out.push_str(body);
                out.push_str("?>");
            }
        }
    }
}

fn create_element(
    doc: &mut Document,
    ns: &ResolveResult<'_>,
    e: &BytesStart<'_>,
    self_closing: bool,
) -> NodeId {
    let namespace = match ns {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    };
    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let raw_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

    let attrs = e
        .attributes()
        .with_checks(false)
        .flatten()
        .map(|attr| Attribute {
            raw_name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            raw_value: String::from_utf8_lossy(&attr.value).into_owned(),
        })
        .collect();

    doc.create(NodeData::Element {
        name: QualName {
            ns: namespace,
            local,
        },
        raw_name,
        attrs,
        self_closing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const XHTML: &str = "http://www.w3.org/1999/xhtml";

    const CHAPTER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en">
<head><title>Chapter 1</title><link rel="stylesheet" href="style.css"/></head>
<body>
<!-- scanned -->
<p class="x">It was a dark &amp; stormy night.</p>
<p>12</p>
<p><![CDATA[raw < text]]></p>
</body>
</html>"#;

    #[test]
    fn test_parse_finds_namespaced_paragraphs() {
        let doc = Document::parse_str(CHAPTER).unwrap();
        let ps = doc.elements_named(XHTML, "p");
        assert_eq!(ps.len(), 3);
        assert_eq!(doc.text_content(ps[0]), "It was a dark & stormy night.");
        assert_eq!(doc.text_content(ps[1]), "12");
        assert_eq!(doc.text_content(ps[2]), "raw < text");
        assert_eq!(doc.attr(ps[0], "class").as_deref(), Some("x"));
    }

    #[test]
    fn test_roundtrip_preserves_markup() {
        let doc = Document::parse_str(CHAPTER).unwrap();
        assert_eq!(doc.to_xml(), CHAPTER.replace("UTF-8", "utf-8"));
        assert!(!doc.is_modified());
    }

    #[test]
    fn test_prefixed_paragraphs_resolve_namespace() {
        let src = r#"<h:html xmlns:h="http://www.w3.org/1999/xhtml"><h:body><h:p>7</h:p><p>not xhtml</p></h:body></h:html>"#;
        let doc = Document::parse_str(src).unwrap();
        let ps = doc.elements_named(XHTML, "p");
        assert_eq!(ps.len(), 1);
        assert_eq!(doc.text_content(ps[0]), "7");
        assert_eq!(doc.to_xml(), src);
    }

    #[test]
    fn test_unknown_entity_kept_verbatim() {
        let src = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p>&hellip;&nbsp;42&nbsp;</p></body></html>"#;
        let doc = Document::parse_str(src).unwrap();
        let p = doc.elements_named(XHTML, "p")[0];
        assert_eq!(doc.text_content(p).trim(), "42");
        assert_eq!(doc.to_xml(), src);
    }

    #[test]
    fn test_character_references_resolve() {
        let src = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p>&#49;&#x32;&amp;</p></body></html>"#;
        let doc = Document::parse_str(src).unwrap();
        let p = doc.elements_named(XHTML, "p")[0];
        assert_eq!(doc.text_content(p), "12&");
        assert_eq!(doc.to_xml(), src);
    }

    #[test]
    fn test_detached_paragraph_not_serialized() {
        let mut doc = Document::parse_str(CHAPTER).unwrap();
        let ps = doc.elements_named(XHTML, "p");
        assert!(doc.detach(ps[1]));
        let out = doc.to_xml();
        assert!(!out.contains("<p>12</p>"));
        assert!(out.contains("stormy night"));
        assert!(doc.is_modified());
    }

    #[test]
    fn test_windows_1252_input_written_as_utf8() {
        let mut src = br#"<?xml version="1.0" encoding="windows-1252"?><html xmlns="http://www.w3.org/1999/xhtml"><body><p>caf"#.to_vec();
        src.push(0xE9);
        src.extend_from_slice(b"</p></body></html>");

        let doc = Document::parse(&src).unwrap();
        let out = doc.to_xml();
        assert!(out.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(out.contains("<p>café</p>"));
    }

    #[test]
    fn test_malformed_documents_rejected() {
        assert!(Document::parse_str("<html><body></html>").is_err());
        assert!(Document::parse_str("<html><body>").is_err());
        assert!(Document::parse_str("just text").is_err());
    }

    #[test]
    fn test_attribute_quotes_normalized() {
        let src = r#"<html xmlns="http://www.w3.org/1999/xhtml"><p title='say "hi"'>x</p></html>"#;
        let doc = Document::parse_str(src).unwrap();
        assert!(doc.to_xml().contains(r#"title="say &quot;hi&quot;""#));
    }
}
