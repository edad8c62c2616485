//! Node types for the document tree.
//!
//! A [`Node`] never owns other nodes directly: a branch holds the ids of its
//! children and the [`Document`](super::Document) arena owns every node.
//! The parent link is likewise an id, used for traversal and removal only.

use std::fmt;

use serde_json::Value;

// ── NodeId ────────────────────────────────────────────────────────────────

/// Opaque node identity.
///
/// Allocated from a per-document monotonic counter and never reused, so a
/// subtree snapshot can safely re-register its original ids on restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Type tags ─────────────────────────────────────────────────────────────

/// The four user-facing node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Leaf whose scalar is re-derived from its text on every edit.
    Auto,
    /// Leaf pinned to the string representation of its text.
    String,
    Object,
    Array,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Auto => "auto",
            NodeType::String => "string",
            NodeType::Object => "object",
            NodeType::Array => "array",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf representation tag: [`NodeType::Auto`] or [`NodeType::String`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Auto,
    Str,
}

/// Branch kind: [`NodeType::Object`] or [`NodeType::Array`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Object,
    Array,
}

// ── Sort marker ───────────────────────────────────────────────────────────

/// Last applied child sort order, kept for toggling on repeated requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn toggled(self) -> SortOrder {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

// ── Search flags ──────────────────────────────────────────────────────────

/// Transient per-node match state for the active search query.
///
/// `active_*` marks the single focused match, rendered differently from
/// ordinary matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchFlags {
    pub field: bool,
    pub value: bool,
    pub active_field: bool,
    pub active_value: bool,
}

impl SearchFlags {
    pub fn clear(&mut self) {
        *self = SearchFlags::default();
    }

    pub fn any(&self) -> bool {
        self.field || self.value
    }
}

// ── Body ──────────────────────────────────────────────────────────────────

/// Node content. A leaf's scalar and a branch's child list are mutually
/// exclusive by construction.
#[derive(Debug, Clone)]
pub enum Body {
    Leaf { kind: LeafKind, value: Value },
    Branch { kind: BranchKind, children: Vec<NodeId> },
}

// ── Node ──────────────────────────────────────────────────────────────────

/// One element of the document tree.
///
/// Naming is split in two: `field` is the key text (object members and the
/// named root), `index` the position under an array parent. An array member
/// displays its index but keeps any key text it had, so moving a node
/// through an array and back does not destroy its name — only an explicit
/// retype to array erases keys.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Non-owning back-reference; `None` on the root and on detached nodes.
    pub parent: Option<NodeId>,
    /// Key text; editable only under an object parent.
    pub field: Option<String>,
    /// Position under an array parent, recomputed after every structural
    /// change to that parent. `None` elsewhere.
    pub index: Option<usize>,
    pub field_editable: bool,
    pub body: Body,
    pub expanded: bool,
    pub sort: Option<SortOrder>,
    pub search: SearchFlags,
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match &self.body {
            Body::Leaf { kind: LeafKind::Auto, .. } => NodeType::Auto,
            Body::Leaf { kind: LeafKind::Str, .. } => NodeType::String,
            Body::Branch { kind: BranchKind::Object, .. } => NodeType::Object,
            Body::Branch { kind: BranchKind::Array, .. } => NodeType::Array,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.body, Body::Branch { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, Body::Leaf { .. })
    }

    /// The text shown in the name column: the index under an array parent,
    /// the key text otherwise.
    pub fn field_text(&self) -> Option<String> {
        match self.index {
            Some(i) => Some(i.to_string()),
            None => self.field.clone(),
        }
    }

    /// The searchable key text: present only when the key is what the row
    /// displays (array members display their index instead).
    pub fn key(&self) -> Option<&str> {
        if self.index.is_some() {
            None
        } else {
            self.field.as_deref()
        }
    }

    /// Child ids in order; empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        match &self.body {
            Body::Branch { children, .. } => children,
            Body::Leaf { .. } => &[],
        }
    }

    /// The stored scalar; `None` for branches.
    pub fn scalar(&self) -> Option<&Value> {
        match &self.body {
            Body::Leaf { value, .. } => Some(value),
            Body::Branch { .. } => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.body {
            Body::Branch { children, .. } => Some(children),
            Body::Leaf { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(id: u64, value: Value) -> Node {
        Node {
            id: NodeId(id),
            parent: None,
            field: None,
            index: None,
            field_editable: false,
            body: Body::Leaf { kind: LeafKind::Auto, value },
            expanded: false,
            sort: None,
            search: SearchFlags::default(),
        }
    }

    #[test]
    fn type_tags() {
        let n = leaf(1, json!(42));
        assert_eq!(n.node_type(), NodeType::Auto);
        assert_eq!(n.node_type().as_str(), "auto");
        assert!(n.is_leaf());
        assert!(n.children().is_empty());
        assert_eq!(n.scalar(), Some(&json!(42)));
    }

    #[test]
    fn display_text_prefers_the_index() {
        let mut n = leaf(1, json!(0));
        assert_eq!(n.field_text(), None);
        n.field = Some("a".into());
        assert_eq!(n.field_text(), Some("a".into()));
        assert_eq!(n.key(), Some("a"));
        n.index = Some(3);
        assert_eq!(n.field_text(), Some("3".into()));
        // the key text survives but is not displayed or searched
        assert_eq!(n.key(), None);
        assert_eq!(n.field.as_deref(), Some("a"));
    }

    #[test]
    fn sort_order_toggles() {
        assert_eq!(SortOrder::Asc.toggled(), SortOrder::Desc);
        assert_eq!(SortOrder::Desc.toggled(), SortOrder::Asc);
    }
}
