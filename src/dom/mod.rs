//! Arena-backed mutable HTML tree. Nodes live in one `Vec` and are addressed by [`NodeId`];
//! parent and child links are indices, so detaching a node is removing its id from the parent's
//! child list. Detached nodes stay in the arena but are unreachable from the root.

mod parse;
mod render;
pub mod walk;

pub(crate) use render::{escape_attr, escape_text};
pub use walk::{transform, transform_root, walk, Visit};

/// Index of a node inside its [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One attribute of an element. Keys are unique within an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// The document root. Exactly one per arena.
    Document,
    Doctype {
        name: String,
    },
    Element {
        name: String,
        attrs: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed (or hand-built) HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached element. Later duplicates of an attribute key are ignored.
    pub fn create_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut list: Vec<Attribute> = Vec::with_capacity(attrs.len());
        for (key, value) in attrs {
            if list.iter().any(|a| a.key == *key) {
                continue;
            }
            list.push(Attribute {
                key: (*key).to_string(),
                value: (*value).to_string(),
            });
        }
        self.alloc(NodeData::Element {
            name: name.to_string(),
            attrs: list,
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    pub(crate) fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Comment(text.to_string()))
    }

    pub(crate) fn create_doctype(&mut self, name: &str) -> NodeId {
        self.alloc(NodeData::Doctype {
            name: name.to_string(),
        })
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.first().copied()
    }

    /// Sibling following `id` in its parent's child list. None for detached nodes.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|c| *c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Remove `id` from its parent's child list. The subtree stays intact under `id`.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    /// Detach every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) {
        debug_assert!(child != parent, "a node cannot be its own child");
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let len = self.nodes[parent.0].children.len();
        self.insert_at(parent, len, child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_at(parent, 0, child);
    }

    /// Insert `child` right before `reference` under `parent`; appends when `reference`
    /// is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == reference)
            .unwrap_or(self.nodes[parent.0].children.len());
        self.insert_at(parent, index, child);
    }

    /// Splice `new` into the exact position of `old` and detach `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        if let Some(parent) = self.parent(old) {
            self.insert_before(parent, new, old);
            self.detach(old);
        }
    }

    /// Tag name of an element node.
    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId, tag: &str) -> bool {
        self.element_name(id) == Some(tag)
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        match self.data(id) {
            NodeData::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// Set (or overwrite) an attribute, keeping its position when it already exists.
    /// No-op on non-element nodes.
    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = self.data_mut(id) {
            match attrs.iter_mut().find(|a| a.key == key) {
                Some(existing) => existing.value = value.to_string(),
                None => attrs.push(Attribute {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
            }
        }
    }

    pub fn retain_attrs(&mut self, id: NodeId, mut keep: impl FnMut(&Attribute) -> bool) {
        if let NodeData::Element { attrs, .. } = self.data_mut(id) {
            attrs.retain(|a| keep(a));
        }
    }

    /// True when the element's `class` attribute lists `class`.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|v| v.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Concatenated text of every text node under `id` (including `id` itself).
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let NodeData::Text(text) = self.data(id) {
            out.push_str(text);
        }
        for child in self.children(id) {
            self.collect_text(*child, out);
        }
    }

    /// First element named `tag` under the root, in document order.
    pub fn find_element(&self, tag: &str) -> Option<NodeId> {
        self.find_in(self.root, tag)
    }

    fn find_in(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        for child in self.children(id) {
            if self.is_element(*child, tag) {
                return Some(*child);
            }
            if let Some(found) = self.find_in(*child, tag) {
                return Some(found);
            }
        }
        None
    }
}
