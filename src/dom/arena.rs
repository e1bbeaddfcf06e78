//! Arena-allocated XML tree.
//!
//! Nodes live in a contiguous vector and link to each other by index. Removing
//! an element only unlinks it from its parent; the slot stays allocated so that
//! node ids held elsewhere (e.g. by the reconciler's candidate list) never
//! dangle.

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Namespace-qualified element name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualName {
    /// Resolved namespace URI, if the element is bound to one.
    pub ns: Option<String>,
    pub local: String,
}

impl QualName {
    pub fn new(ns: Option<&str>, local: &str) -> Self {
        Self {
            ns: ns.map(str::to_string),
            local: local.to_string(),
        }
    }

    /// Check for a `(namespace, local-name)` match.
    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.local == local && self.ns.as_deref() == Some(ns)
    }
}

/// Attribute as written in the source, value still escaped.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub raw_name: String,
    pub raw_value: String,
}

/// Node payload.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Document,
    /// XML declaration body, e.g. `xml version="1.0" encoding="utf-8"`.
    Declaration(String),
    /// Doctype body, without `<!DOCTYPE` and `>`.
    Doctype(String),
    Element {
        name: QualName,
        /// Prefixed name as written (`p`, `html:p`).
        raw_name: String,
        attrs: Vec<Attribute>,
        /// Written as `<x/>` in the source.
        self_closing: bool,
    },
    /// Unescaped character data.
    Text(String),
    CData(String),
    /// `&name;` reference, kept verbatim on output.
    EntityRef {
        name: String,
        resolved: Option<String>,
    },
    Comment(String),
    ProcessingInstruction(String),
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// Arena-based markup tree for one content document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    modified: bool,
}

impl Document {
    /// Create a new empty tree with a document root.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId::NONE,
            modified: false,
        };
        doc.root = doc.alloc(NodeData::Document);
        doc
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    /// The document root (not the root element).
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Whether any structural or text edit happened since parsing.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Allocate a detached node.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        self.alloc(data)
    }

    /// Append a child to a parent node.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
            child_node.next_sibling = NodeId::NONE;
        }

        if let Some(last_node) = self.get_mut(last_child) {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Append text, merging with a trailing text node.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let NodeData::Text(ref mut existing) = last.data
        {
            existing.push_str(text);
            return;
        }

        let node = self.alloc(NodeData::Text(text.to_string()));
        self.append(parent, node);
    }

    /// Unlink a node from its parent. Returns false if it was already detached.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        if parent.is_none() {
            return false;
        }

        match self.get_mut(prev) {
            Some(p) => p.next_sibling = next,
            None => {
                if let Some(par) = self.get_mut(parent) {
                    par.first_child = next;
                }
            }
        }
        match self.get_mut(next) {
            Some(n) => n.prev_sibling = prev,
            None => {
                if let Some(par) = self.get_mut(parent) {
                    par.last_child = prev;
                }
            }
        }

        if let Some(node) = self.get_mut(id) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
        self.modified = true;
        true
    }

    /// Parent of a node, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(NodeId::is_some)
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        ChildrenIter {
            doc: self,
            current: first,
        }
    }

    /// Pre-order traversal of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.get(current).is_none() {
                continue;
            }
            out.push(current);
            // Push children in reverse order for left-to-right traversal
            let mut children: Vec<_> = self.children(current).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// All attached elements with the given qualified name, in document order.
    pub fn elements_named(&self, ns: &str, local: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.element_name(id).is_some_and(|name| name.is(ns, local)))
            .collect()
    }

    /// Element's qualified name.
    pub fn element_name(&self, id: NodeId) -> Option<&QualName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        })
    }

    /// Unescaped attribute value, matched on the attribute's local name.
    pub fn attr(&self, id: NodeId, local: &str) -> Option<String> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| local_part(&a.raw_name) == local)
                .map(|a| crate::util::unescape_attr(&a.raw_value).into_owned()),
            _ => None,
        })
    }

    /// Concatenated character data of a node and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        self.text_segments(id)
            .into_iter()
            .map(|(_, text, _)| text)
            .collect()
    }

    /// Character data below `id`, one entry per node, in document order.
    ///
    /// The flag is true for text nodes, the only ones [`set_text`] can edit;
    /// CDATA sections and resolved entity references are read-only.
    ///
    /// [`set_text`]: Document::set_text
    pub fn text_segments(&self, id: NodeId) -> Vec<(NodeId, &str, bool)> {
        self.descendants(id)
            .into_iter()
            .filter_map(|node| match &self.get(node)?.data {
                NodeData::Text(s) => Some((node, s.as_str(), true)),
                NodeData::CData(s) => Some((node, s.as_str(), false)),
                NodeData::EntityRef {
                    resolved: Some(s), ..
                } => Some((node, s.as_str(), false)),
                _ => None,
            })
            .collect()
    }

    /// Text nodes below `id`, in document order.
    pub fn text_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.get(n).is_some_and(|n| matches!(n.data, NodeData::Text(_))))
            .collect()
    }

    /// Text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Replace the text of a text node. No-op (returns false) for other nodes
    /// or when the text is unchanged.
    pub fn set_text(&mut self, id: NodeId, text: String) -> bool {
        let changed = match self.get_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Text(existing)) if *existing != text => {
                *existing = text;
                true
            }
            _ => false,
        };
        self.modified |= changed;
        changed
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    doc: &'a Document,
    current: NodeId,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .doc
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        Some(id)
    }
}

/// Local part of a prefixed name (`xml:lang` -> `lang`).
fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name)
}
