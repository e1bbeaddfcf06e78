//! Markup tree for XHTML content documents.
//!
//! Documents are parsed into a node arena and written back with
//! [`Document::to_xml`]. Elements are matched by `(namespace, local-name)`
//! rather than by prefixed tag strings.

mod arena;
mod xml;

pub use arena::{Attribute, ChildrenIter, Document, Node, NodeData, NodeId, QualName};

/// XHTML namespace, used to identify paragraph elements.
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
