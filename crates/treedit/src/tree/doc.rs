//! The document: an id-indexed arena of nodes plus a root register.
//!
//! All structural mutation goes through [`Document`]. Operations validate
//! before touching anything, so a failed call leaves the tree unchanged.
//! Node ids come from a monotonic counter and are never reused; subtree
//! [`Snapshot`]s carry their ids and [`Document::restore`] re-registers
//! them, which is how node identity survives an undo of a removal.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::cast::{cast_text, casts_to_non_string, text_of};
use super::node::{Body, BranchKind, LeafKind, Node, NodeId, NodeType, SearchFlags, SortOrder};
use super::TreeError;

// ── Type inference ────────────────────────────────────────────────────────

/// Infer the node type of an interchange value.
///
/// Strings whose text would auto-cast to a non-string are classified as
/// explicit strings; that tag is what preserves numeric-looking strings
/// through later edits.
pub fn infer_type(value: &Value) -> NodeType {
    match value {
        Value::Array(_) => NodeType::Array,
        Value::Object(_) => NodeType::Object,
        Value::String(s) if casts_to_non_string(s) => NodeType::String,
        _ => NodeType::Auto,
    }
}

/// Validate a requested type against the inferred one.
///
/// Auto may always be forced to String (representation only); any other
/// disagreement is a type mismatch.
pub fn resolve_type(
    inferred: NodeType,
    requested: Option<NodeType>,
) -> Result<NodeType, TreeError> {
    match requested {
        None => Ok(inferred),
        Some(req) if req == inferred => Ok(req),
        Some(NodeType::String) if inferred == NodeType::Auto => Ok(NodeType::String),
        Some(requested) => Err(TreeError::TypeMismatch { inferred, requested }),
    }
}

// ── Insertion targets ─────────────────────────────────────────────────────

/// Target of an insert-before: a sibling node, or the composite's append
/// placeholder, which means "at the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingRef {
    Node(NodeId),
    Append,
}

// ── Snapshots ─────────────────────────────────────────────────────────────

/// Immutable deep copy of a subtree, including node ids.
///
/// Used as the history payload for structural actions: restoring a snapshot
/// re-registers the captured ids, so later history entries that address
/// those nodes stay valid.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: NodeId,
    pub field: Option<String>,
    pub index: Option<usize>,
    pub field_editable: bool,
    pub expanded: bool,
    pub sort: Option<SortOrder>,
    pub body: SnapshotBody,
}

#[derive(Debug, Clone)]
pub enum SnapshotBody {
    Leaf { kind: LeafKind, value: Value },
    Branch { kind: BranchKind, children: Vec<Snapshot> },
}

// ── Document ──────────────────────────────────────────────────────────────

/// In-memory document tree.
///
/// The arena map is the single owner of every node; parent links and child
/// lists hold ids only.
#[derive(Debug, Default)]
pub struct Document {
    nodes: HashMap<NodeId, Node>,
    root: Option<NodeId>,
    next_id: u64,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    fn require(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))
    }

    fn require_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(&id).ok_or(TreeError::NodeNotFound(id))
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.node(parent)?.children().iter().position(|c| *c == child)
    }

    /// Pre-order reachability: is `candidate` inside `ancestor`'s subtree
    /// (or `ancestor` itself)?
    pub fn contains(&self, ancestor: NodeId, candidate: NodeId) -> bool {
        if ancestor == candidate {
            return true;
        }
        self.node(ancestor)
            .is_some_and(|n| n.children().iter().any(|c| self.contains(*c, candidate)))
    }

    /// Pre-order listing of a subtree, root first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.node(n) {
                out.push(n);
                stack.extend(node.children().iter().rev().copied());
            }
        }
        out
    }

    // ── Construction ──────────────────────────────────────────────────────

    /// Build a detached subtree from an interchange value.
    ///
    /// Children of composites are built recursively with inferred types.
    pub fn build(
        &mut self,
        field: Option<String>,
        value: &Value,
        explicit: Option<NodeType>,
    ) -> Result<NodeId, TreeError> {
        let ty = resolve_type(infer_type(value), explicit)?;
        Ok(self.build_as(field, value, ty))
    }

    fn build_as(&mut self, field: Option<String>, value: &Value, ty: NodeType) -> NodeId {
        let id = self.alloc();
        let body = match ty {
            NodeType::Auto => Body::Leaf { kind: LeafKind::Auto, value: value.clone() },
            NodeType::String => Body::Leaf { kind: LeafKind::Str, value: value.clone() },
            NodeType::Object => Body::Branch { kind: BranchKind::Object, children: Vec::new() },
            NodeType::Array => Body::Branch { kind: BranchKind::Array, children: Vec::new() },
        };
        self.nodes.insert(
            id,
            Node {
                id,
                parent: None,
                field,
                index: None,
                field_editable: false,
                body,
                expanded: false,
                sort: None,
                search: SearchFlags::default(),
            },
        );
        if matches!(ty, NodeType::Object | NodeType::Array) {
            let children = self.build_children(id, value);
            if let Some(list) = self.nodes.get_mut(&id).and_then(|n| n.children_mut()) {
                *list = children;
            }
        }
        id
    }

    fn build_children(&mut self, parent: NodeId, value: &Value) -> Vec<NodeId> {
        let mut out = Vec::new();
        match value {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let ty = infer_type(item);
                    let child = self.build_as(None, item, ty);
                    if let Some(n) = self.nodes.get_mut(&child) {
                        n.parent = Some(parent);
                        n.index = Some(i);
                        n.field_editable = false;
                    }
                    out.push(child);
                }
            }
            Value::Object(map) => {
                for (k, v) in map {
                    let ty = infer_type(v);
                    let child = self.build_as(Some(k.clone()), v, ty);
                    if let Some(n) = self.nodes.get_mut(&child) {
                        n.parent = Some(parent);
                        n.field_editable = true;
                    }
                    out.push(child);
                }
            }
            _ => {}
        }
        out
    }

    /// Make `id` the document root. The node must be detached.
    pub fn set_root(&mut self, id: NodeId) -> Result<(), TreeError> {
        let node = self.require_mut(id)?;
        node.parent = None;
        node.index = None;
        self.root = Some(id);
        Ok(())
    }

    /// Drop the whole tree. The id counter keeps running so snapshots from
    /// a previous tree can never collide with new allocations.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    // ── Values ────────────────────────────────────────────────────────────

    /// Collect the value of a subtree: branches gather children in order,
    /// leaves return the stored scalar.
    pub fn value_of(&self, id: NodeId) -> Value {
        let Some(node) = self.node(id) else {
            return Value::Null;
        };
        match &node.body {
            Body::Leaf { value, .. } => value.clone(),
            Body::Branch { kind: BranchKind::Array, children } => {
                Value::Array(children.iter().map(|c| self.value_of(*c)).collect())
            }
            Body::Branch { kind: BranchKind::Object, children } => {
                let mut map = Map::new();
                for c in children {
                    let key = self
                        .node(*c)
                        .and_then(|n| n.field.clone())
                        .unwrap_or_default();
                    map.insert(key, self.value_of(*c));
                }
                Value::Object(map)
            }
        }
    }

    /// Replace a node's content with a new value, destroying any previous
    /// subtree. Same inference and validation as [`Document::build`].
    pub fn set_value(
        &mut self,
        id: NodeId,
        value: &Value,
        explicit: Option<NodeType>,
    ) -> Result<(), TreeError> {
        self.require(id)?;
        let ty = resolve_type(infer_type(value), explicit)?;
        let old_children = self.require(id)?.children().to_vec();
        for c in old_children {
            self.discard(c);
        }
        let body = match ty {
            NodeType::Auto => Body::Leaf { kind: LeafKind::Auto, value: value.clone() },
            NodeType::String => Body::Leaf { kind: LeafKind::Str, value: value.clone() },
            NodeType::Object => Body::Branch { kind: BranchKind::Object, children: Vec::new() },
            NodeType::Array => Body::Branch { kind: BranchKind::Array, children: Vec::new() },
        };
        self.require_mut(id)?.body = body;
        if matches!(ty, NodeType::Object | NodeType::Array) {
            let children = self.build_children(id, value);
            if let Some(list) = self.nodes.get_mut(&id).and_then(|n| n.children_mut()) {
                *list = children;
            }
        }
        Ok(())
    }

    /// Overwrite a leaf's scalar in place, keeping its representation tag.
    pub fn update_scalar(&mut self, id: NodeId, value: Value) -> Result<(), TreeError> {
        match &mut self.require_mut(id)?.body {
            Body::Leaf { value: v, .. } => {
                *v = value;
                Ok(())
            }
            Body::Branch { .. } => Err(TreeError::WrongType(id)),
        }
    }

    pub fn set_field(&mut self, id: NodeId, name: &str, editable: bool) -> Result<(), TreeError> {
        let node = self.require_mut(id)?;
        node.field = Some(name.to_string());
        node.field_editable = editable;
        Ok(())
    }

    // ── Structural operations ─────────────────────────────────────────────

    /// Insert a detached node under `parent` at `index` (clamped).
    ///
    /// Checks containment first: inserting a node into itself or one of its
    /// own descendants is a cycle violation. Adjusts the child's editability
    /// and index to the parent kind and renumbers array positions; any key
    /// text the child carries is kept.
    pub fn insert_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: usize,
    ) -> Result<(), TreeError> {
        self.require(child)?;
        let parent_node = self.require(parent)?;
        if !parent_node.is_branch() {
            return Err(TreeError::WrongType(parent));
        }
        if child == parent || self.contains(child, parent) {
            return Err(TreeError::CycleViolation);
        }
        let object_parent = matches!(
            parent_node.body,
            Body::Branch { kind: BranchKind::Object, .. }
        );
        if let Some(list) = self.nodes.get_mut(&parent).and_then(|n| n.children_mut()) {
            let at = index.min(list.len());
            list.insert(at, child);
        }
        if let Some(n) = self.nodes.get_mut(&child) {
            n.parent = Some(parent);
            n.field_editable = object_parent;
            if object_parent {
                n.index = None;
            }
        }
        self.renumber(parent);
        Ok(())
    }

    /// Append a detached node at the end of `parent`'s children.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let len = self.require(parent)?.children().len();
        self.insert_at(parent, child, len)
    }

    /// Insert before `target`, where the append placeholder is a valid
    /// target meaning "at the end". Fails with a reference error if the
    /// target node is not among `parent`'s current children.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        target: SiblingRef,
    ) -> Result<(), TreeError> {
        match target {
            SiblingRef::Append => self.append(parent, child),
            SiblingRef::Node(t) => {
                let index = self.index_of(parent, t).ok_or(TreeError::RefNotFound)?;
                self.insert_at(parent, child, index)
            }
        }
    }

    /// Insert immediately after `target`, which must be a current child.
    pub fn insert_after(
        &mut self,
        parent: NodeId,
        child: NodeId,
        target: NodeId,
    ) -> Result<(), TreeError> {
        let index = self.index_of(parent, target).ok_or(TreeError::RefNotFound)?;
        self.insert_at(parent, child, index + 1)
    }

    /// Detach `child` from `parent`, returning the index it occupied.
    ///
    /// Silent (`None`) if `child` is not among `parent`'s children. The
    /// detached subtree stays registered until [`Document::discard`].
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Option<usize> {
        let index = self.index_of(parent, child)?;
        if let Some(list) = self.nodes.get_mut(&parent).and_then(|n| n.children_mut()) {
            list.remove(index);
        }
        if let Some(n) = self.nodes.get_mut(&child) {
            n.parent = None;
            n.search.clear();
        }
        self.renumber(parent);
        Some(index)
    }

    /// Free a detached subtree from the arena.
    pub fn discard(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.nodes.remove(&n) {
                stack.extend(node.children().iter().copied());
            }
        }
    }

    /// Move `child` under `new_parent` at `index`, interpreted against the
    /// child list as it stands after the child is detached.
    ///
    /// Containment is checked before anything moves: a target inside the
    /// moved subtree is a cycle violation and both trees stay unchanged.
    /// Node ids and key text in the moved subtree are preserved.
    pub fn move_to(
        &mut self,
        child: NodeId,
        new_parent: NodeId,
        index: usize,
    ) -> Result<(), TreeError> {
        let old_parent = self
            .require(child)?
            .parent
            .ok_or(TreeError::NodeNotFound(child))?;
        if !self.require(new_parent)?.is_branch() {
            return Err(TreeError::WrongType(new_parent));
        }
        if new_parent == child || self.contains(child, new_parent) {
            return Err(TreeError::CycleViolation);
        }
        self.remove_child(old_parent, child)
            .ok_or(TreeError::RefNotFound)?;
        self.insert_at(new_parent, child, index)
    }

    /// Deep-clone `node`'s subtree (fresh ids, search flags cleared) and
    /// insert the clone immediately after the original.
    pub fn duplicate(&mut self, node: NodeId) -> Result<NodeId, TreeError> {
        let parent = self
            .require(node)?
            .parent
            .ok_or(TreeError::NodeNotFound(node))?;
        let index = self.index_of(parent, node).ok_or(TreeError::RefNotFound)?;
        let copy = self.clone_subtree(node)?;
        self.insert_at(parent, copy, index + 1)?;
        Ok(copy)
    }

    fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        let src = self.require(id)?;
        let field = src.field.clone();
        let index = src.index;
        let field_editable = src.field_editable;
        let expanded = src.expanded;
        let sort = src.sort;
        let body_src = src.body.clone();
        let new_id = self.alloc();
        let body = match body_src {
            Body::Leaf { kind, value } => Body::Leaf { kind, value },
            Body::Branch { kind, children } => {
                let mut cloned = Vec::with_capacity(children.len());
                for c in children {
                    let cc = self.clone_subtree(c)?;
                    if let Some(n) = self.nodes.get_mut(&cc) {
                        n.parent = Some(new_id);
                    }
                    cloned.push(cc);
                }
                Body::Branch { kind, children: cloned }
            }
        };
        self.nodes.insert(
            new_id,
            Node {
                id: new_id,
                parent: None,
                field,
                index,
                field_editable,
                body,
                expanded,
                sort,
                search: SearchFlags::default(),
            },
        );
        Ok(new_id)
    }

    // ── Type changes ──────────────────────────────────────────────────────

    /// Change a node's type in place.
    ///
    /// Auto↔String re-derives the scalar from its display text. A leaf
    /// becoming a composite starts with an empty child list and expands.
    /// Object↔Array keeps the children but rewrites their naming: to array,
    /// key texts are erased and indices take over (a later retype back to
    /// object yields empty editable keys); to object, each child gets its
    /// key text or the empty string and becomes editable. A composite
    /// becoming a leaf discards its children.
    pub fn change_type(&mut self, id: NodeId, new_type: NodeType) -> Result<(), TreeError> {
        let node = self.require(id)?;
        let old_type = node.node_type();
        if old_type == new_type {
            return Ok(());
        }
        let body = node.body.clone();
        match (&body, new_type) {
            (Body::Leaf { value, .. }, NodeType::Auto) => {
                let text = text_of(value);
                if let Some(n) = self.nodes.get_mut(&id) {
                    n.body = Body::Leaf { kind: LeafKind::Auto, value: cast_text(&text) };
                }
            }
            (Body::Leaf { value, .. }, NodeType::String) => {
                let text = text_of(value);
                if let Some(n) = self.nodes.get_mut(&id) {
                    n.body = Body::Leaf { kind: LeafKind::Str, value: Value::String(text) };
                }
            }
            (Body::Leaf { .. }, NodeType::Object) | (Body::Leaf { .. }, NodeType::Array) => {
                let kind = if new_type == NodeType::Object {
                    BranchKind::Object
                } else {
                    BranchKind::Array
                };
                if let Some(n) = self.nodes.get_mut(&id) {
                    n.body = Body::Branch { kind, children: Vec::new() };
                    n.expanded = true;
                }
            }
            (Body::Branch { children, .. }, NodeType::Object) => {
                let children = children.clone();
                for c in &children {
                    if let Some(n) = self.nodes.get_mut(c) {
                        n.index = None;
                        if n.field.is_none() {
                            n.field = Some(String::new());
                        }
                        n.field_editable = true;
                    }
                }
                if let Some(n) = self.nodes.get_mut(&id) {
                    n.body = Body::Branch { kind: BranchKind::Object, children };
                }
            }
            (Body::Branch { children, .. }, NodeType::Array) => {
                let children = children.clone();
                for (i, c) in children.iter().enumerate() {
                    if let Some(n) = self.nodes.get_mut(c) {
                        // Indices overwrite the keys for good; only the
                        // history snapshot can bring them back.
                        n.field = None;
                        n.index = Some(i);
                        n.field_editable = false;
                    }
                }
                if let Some(n) = self.nodes.get_mut(&id) {
                    n.body = Body::Branch { kind: BranchKind::Array, children };
                }
            }
            (Body::Branch { children, .. }, NodeType::Auto | NodeType::String) => {
                let children = children.clone();
                for c in children {
                    self.discard(c);
                }
                let kind = if new_type == NodeType::Auto {
                    LeafKind::Auto
                } else {
                    LeafKind::Str
                };
                if let Some(n) = self.nodes.get_mut(&id) {
                    n.body = Body::Leaf { kind, value: cast_text("") };
                    n.expanded = false;
                }
            }
        }
        Ok(())
    }

    // ── Sorting ───────────────────────────────────────────────────────────

    /// Stable-sort a branch's children: arrays by child value, objects by
    /// displayed field text. Returns the old and new orders and records the
    /// sort marker for toggling.
    pub fn sort_children(
        &mut self,
        id: NodeId,
        order: SortOrder,
    ) -> Result<(Vec<NodeId>, Vec<NodeId>), TreeError> {
        let node = self.require(id)?;
        let by_value = match &node.body {
            Body::Branch { kind, .. } => matches!(kind, BranchKind::Array),
            Body::Leaf { .. } => return Err(TreeError::WrongType(id)),
        };
        let old = node.children().to_vec();
        let mut keyed: Vec<(NodeId, SortKey)> = old
            .iter()
            .map(|c| (*c, self.sort_key(*c, by_value)))
            .collect();
        keyed.sort_by(|(_, a), (_, b)| {
            let ord = cmp_keys(a, b);
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let new: Vec<NodeId> = keyed.into_iter().map(|(c, _)| c).collect();
        self.set_children_order(id, &new, Some(order))?;
        Ok((old, new))
    }

    /// Overwrite a branch's child order (the multiset of ids must match).
    /// Used by sort and by its undo path.
    pub fn set_children_order(
        &mut self,
        id: NodeId,
        order: &[NodeId],
        marker: Option<SortOrder>,
    ) -> Result<(), TreeError> {
        let node = self.require_mut(id)?;
        match node.children_mut() {
            Some(list) => {
                debug_assert_eq!(list.len(), order.len());
                *list = order.to_vec();
            }
            None => return Err(TreeError::WrongType(id)),
        }
        node.sort = marker;
        self.renumber(id);
        Ok(())
    }

    fn sort_key(&self, id: NodeId, by_value: bool) -> SortKey {
        let Some(node) = self.node(id) else {
            return SortKey::Text(String::new());
        };
        if by_value {
            match node.scalar() {
                Some(Value::Null) => SortKey::Null,
                Some(Value::Bool(b)) => SortKey::Bool(*b),
                Some(Value::Number(n)) => SortKey::Num(n.as_f64().unwrap_or(0.0)),
                Some(Value::String(s)) => SortKey::Text(s.clone()),
                // Branches carry no scalar and compare as empty text.
                _ => SortKey::Text(String::new()),
            }
        } else {
            SortKey::Text(node.field_text().unwrap_or_default())
        }
    }

    // ── Snapshots ─────────────────────────────────────────────────────────

    /// Capture an immutable deep copy of a subtree, ids included.
    pub fn capture(&self, id: NodeId) -> Option<Snapshot> {
        let node = self.node(id)?;
        let body = match &node.body {
            Body::Leaf { kind, value } => SnapshotBody::Leaf { kind: *kind, value: value.clone() },
            Body::Branch { kind, children } => SnapshotBody::Branch {
                kind: *kind,
                children: children.iter().filter_map(|c| self.capture(*c)).collect(),
            },
        };
        Some(Snapshot {
            id,
            field: node.field.clone(),
            index: node.index,
            field_editable: node.field_editable,
            expanded: node.expanded,
            sort: node.sort,
            body,
        })
    }

    /// Rebuild a snapshot's subtree with its original ids and insert it
    /// under `parent` at `index`.
    pub fn restore(
        &mut self,
        snap: &Snapshot,
        parent: NodeId,
        index: usize,
    ) -> Result<NodeId, TreeError> {
        let id = self.restore_detached(snap);
        if let Err(e) = self.insert_at(parent, id, index) {
            self.discard(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Rebuild a snapshot's subtree as the document root.
    pub fn restore_as_root(&mut self, snap: &Snapshot) -> Result<NodeId, TreeError> {
        let id = self.restore_detached(snap);
        self.set_root(id)?;
        Ok(id)
    }

    fn restore_detached(&mut self, snap: &Snapshot) -> NodeId {
        debug_assert!(
            !self.nodes.contains_key(&snap.id),
            "snapshot id already registered"
        );
        let mut child_ids = Vec::new();
        let body = match &snap.body {
            SnapshotBody::Leaf { kind, value } => Body::Leaf { kind: *kind, value: value.clone() },
            SnapshotBody::Branch { kind, children } => {
                for c in children {
                    child_ids.push(self.restore_detached(c));
                }
                Body::Branch { kind: *kind, children: child_ids.clone() }
            }
        };
        self.nodes.insert(
            snap.id,
            Node {
                id: snap.id,
                parent: None,
                field: snap.field.clone(),
                index: snap.index,
                field_editable: snap.field_editable,
                body,
                expanded: snap.expanded,
                sort: snap.sort,
                search: SearchFlags::default(),
            },
        );
        for c in &child_ids {
            if let Some(n) = self.nodes.get_mut(c) {
                n.parent = Some(snap.id);
            }
        }
        self.next_id = self.next_id.max(snap.id.0 + 1);
        snap.id
    }

    /// Restore a still-attached node's own state (naming, type, scalar or
    /// children) from a snapshot of the same node. Parent link and sibling
    /// position are untouched. Used by the change-type undo path.
    pub fn restore_node_state(&mut self, snap: &Snapshot) -> Result<(), TreeError> {
        self.require(snap.id)?;
        let current_children = self.require(snap.id)?.children().to_vec();
        for c in current_children {
            self.discard(c);
        }
        let mut child_ids = Vec::new();
        let body = match &snap.body {
            SnapshotBody::Leaf { kind, value } => Body::Leaf { kind: *kind, value: value.clone() },
            SnapshotBody::Branch { kind, children } => {
                for c in children {
                    child_ids.push(self.restore_detached(c));
                }
                Body::Branch { kind: *kind, children: child_ids.clone() }
            }
        };
        let node = self.require_mut(snap.id)?;
        node.field = snap.field.clone();
        node.field_editable = snap.field_editable;
        node.expanded = snap.expanded;
        node.sort = snap.sort;
        node.body = body;
        for c in &child_ids {
            if let Some(n) = self.nodes.get_mut(c) {
                n.parent = Some(snap.id);
            }
        }
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────────────────

    /// Recompute array positions after a structural change to `parent`.
    fn renumber(&mut self, parent: NodeId) {
        let Some(node) = self.node(parent) else {
            return;
        };
        if !matches!(node.body, Body::Branch { kind: BranchKind::Array, .. }) {
            return;
        }
        let children = node.children().to_vec();
        for (i, c) in children.iter().enumerate() {
            if let Some(n) = self.nodes.get_mut(c) {
                n.index = Some(i);
                n.field_editable = false;
            }
        }
    }
}

// ── Sort keys ─────────────────────────────────────────────────────────────

/// Comparable child key: scalars order by type rank (null < bool < number <
/// string), numbers numerically, text lexicographically.
#[derive(Debug, Clone)]
enum SortKey {
    Null,
    Bool(bool),
    Num(f64),
    Text(String),
}

fn cmp_keys(a: &SortKey, b: &SortKey) -> Ordering {
    use SortKey::*;
    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Bool(x), Bool(y)) => x.cmp(y),
        (Num(x), Num(y)) => x.total_cmp(y),
        (Text(x), Text(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn rank(k: &SortKey) -> u8 {
    match k {
        SortKey::Null => 0,
        SortKey::Bool(_) => 1,
        SortKey::Num(_) => 2,
        SortKey::Text(_) => 3,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc_with(value: Value) -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.build(None, &value, None).unwrap();
        doc.set_root(root).unwrap();
        (doc, root)
    }

    #[test]
    fn build_and_collect_round_trip() {
        let value = json!({"a": 1, "b": [true, null, "x"], "c": {"d": 2.5}});
        let (doc, root) = doc_with(value.clone());
        assert_eq!(doc.value_of(root), value);
    }

    #[test]
    fn object_key_order_is_preserved() {
        let value = json!({"z": 1, "a": 2, "m": 3});
        let (doc, root) = doc_with(value.clone());
        assert_eq!(doc.value_of(root), value);
    }

    #[test]
    fn numeric_looking_string_gets_string_type() {
        let (doc, root) = doc_with(json!({"n": "123"}));
        let child = doc.node(root).unwrap().children()[0];
        assert_eq!(doc.node(child).unwrap().node_type(), NodeType::String);
        assert_eq!(doc.value_of(root), json!({"n": "123"}));
    }

    #[test]
    fn plain_string_infers_auto() {
        let (doc, root) = doc_with(json!(["hello"]));
        let child = doc.node(root).unwrap().children()[0];
        assert_eq!(doc.node(child).unwrap().node_type(), NodeType::Auto);
    }

    #[test]
    fn explicit_type_conflict_is_an_error() {
        let mut doc = Document::new();
        let err = doc
            .build(None, &json!({"a": 1}), Some(NodeType::Array))
            .unwrap_err();
        assert_eq!(
            err,
            TreeError::TypeMismatch {
                inferred: NodeType::Object,
                requested: NodeType::Array
            }
        );
    }

    #[test]
    fn auto_may_be_forced_to_string() {
        let mut doc = Document::new();
        let id = doc
            .build(None, &json!("hello"), Some(NodeType::String))
            .unwrap();
        assert_eq!(doc.node(id).unwrap().node_type(), NodeType::String);
    }

    #[test]
    fn array_indices_renumber_after_removal() {
        let (mut doc, root) = doc_with(json!([10, 20, 30]));
        let kids = doc.node(root).unwrap().children().to_vec();
        doc.remove_child(root, kids[0]).unwrap();
        let remaining = doc.node(root).unwrap().children().to_vec();
        assert_eq!(doc.node(remaining[0]).unwrap().index, Some(0));
        assert_eq!(doc.node(remaining[1]).unwrap().index, Some(1));
        assert_eq!(doc.value_of(root), json!([20, 30]));
    }

    #[test]
    fn remove_of_non_child_is_silent() {
        let (mut doc, root) = doc_with(json!({"a": {"b": 1}}));
        let a = doc.node(root).unwrap().children()[0];
        let b = doc.node(a).unwrap().children()[0];
        // b is a grandchild, not a child, of root
        assert_eq!(doc.remove_child(root, b), None);
        assert_eq!(doc.value_of(root), json!({"a": {"b": 1}}));
    }

    #[test]
    fn insert_before_unknown_target_fails() {
        let (mut doc, root) = doc_with(json!([1]));
        let stray = doc.build(None, &json!(2), None).unwrap();
        let other = doc.build(None, &json!(3), None).unwrap();
        let err = doc
            .insert_before(root, stray, SiblingRef::Node(other))
            .unwrap_err();
        assert_eq!(err, TreeError::RefNotFound);
        assert_eq!(doc.value_of(root), json!([1]));
    }

    #[test]
    fn insert_before_append_placeholder_appends() {
        let (mut doc, root) = doc_with(json!([1]));
        let child = doc.build(None, &json!(2), None).unwrap();
        doc.insert_before(root, child, SiblingRef::Append).unwrap();
        assert_eq!(doc.value_of(root), json!([1, 2]));
    }

    #[test]
    fn move_into_own_descendant_is_a_cycle() {
        let (mut doc, root) = doc_with(json!({"a": {"b": {}}}));
        let a = doc.node(root).unwrap().children()[0];
        let b = doc.node(a).unwrap().children()[0];
        let before = doc.value_of(root);
        assert_eq!(doc.move_to(a, b, 0), Err(TreeError::CycleViolation));
        assert_eq!(doc.move_to(a, a, 0), Err(TreeError::CycleViolation));
        assert_eq!(doc.value_of(root), before);
    }

    #[test]
    fn move_preserves_node_identity() {
        let (mut doc, root) = doc_with(json!({"a": 1, "b": {}}));
        let a = doc.node(root).unwrap().children()[0];
        let b = doc.node(root).unwrap().children()[1];
        doc.move_to(a, b, 0).unwrap();
        assert_eq!(doc.value_of(root), json!({"b": {"a": 1}}));
        assert_eq!(doc.parent_of(a), Some(b));
        assert!(doc.node(a).is_some());
    }

    #[test]
    fn move_through_an_array_keeps_the_key_text() {
        let (mut doc, root) = doc_with(json!({"o": {"k": 1}, "l": [9]}));
        let o = doc.node(root).unwrap().children()[0];
        let l = doc.node(root).unwrap().children()[1];
        let k = doc.node(o).unwrap().children()[0];

        doc.move_to(k, l, 0).unwrap();
        let moved = doc.node(k).unwrap();
        // displays its index, is not editable, but the key text survives
        assert_eq!(moved.index, Some(0));
        assert_eq!(moved.field_text(), Some("0".into()));
        assert!(!moved.field_editable);
        assert_eq!(moved.field.as_deref(), Some("k"));
        assert_eq!(doc.value_of(root), json!({"o": {}, "l": [1, 9]}));

        doc.move_to(k, o, 0).unwrap();
        let back = doc.node(k).unwrap();
        assert_eq!(back.index, None);
        assert_eq!(back.field_text(), Some("k".into()));
        assert!(back.field_editable);
        assert_eq!(doc.value_of(root), json!({"o": {"k": 1}, "l": [9]}));
    }

    #[test]
    fn duplicate_inserts_clone_after_original() {
        let (mut doc, root) = doc_with(json!({"a": {"b": 1}}));
        let a = doc.node(root).unwrap().children()[0];
        let copy = doc.duplicate(a).unwrap();
        assert_ne!(copy, a);
        assert_eq!(doc.index_of(root, copy), Some(1));
        // The clone keeps the original's key text; collecting the value
        // collapses the duplicate key, but the tree holds both children.
        assert_eq!(doc.node(root).unwrap().children().len(), 2);
        assert_eq!(doc.node(copy).unwrap().field.as_deref(), Some("a"));
        assert_eq!(doc.value_of(copy), json!({"b": 1}));
    }

    #[test]
    fn change_type_object_to_array_and_back() {
        let (mut doc, root) = doc_with(json!({"k1": 1, "k2": 2}));
        doc.change_type(root, NodeType::Array).unwrap();
        let kids = doc.node(root).unwrap().children().to_vec();
        assert_eq!(doc.node(kids[0]).unwrap().index, Some(0));
        assert_eq!(doc.node(kids[1]).unwrap().index, Some(1));
        assert!(!doc.node(kids[0]).unwrap().field_editable);
        assert_eq!(doc.value_of(root), json!([1, 2]));

        // retyping erased the keys for good
        doc.change_type(root, NodeType::Object).unwrap();
        assert_eq!(doc.node(kids[0]).unwrap().field.as_deref(), Some(""));
        assert!(doc.node(kids[0]).unwrap().field_editable);
    }

    #[test]
    fn change_type_auto_string_keeps_text() {
        let (mut doc, root) = doc_with(json!([42]));
        let leaf = doc.node(root).unwrap().children()[0];
        doc.change_type(leaf, NodeType::String).unwrap();
        assert_eq!(doc.value_of(root), json!(["42"]));
        doc.change_type(leaf, NodeType::Auto).unwrap();
        assert_eq!(doc.value_of(root), json!([42]));
    }

    #[test]
    fn change_type_composite_to_leaf_discards_children() {
        let (mut doc, root) = doc_with(json!({"a": {"b": 1}}));
        let a = doc.node(root).unwrap().children()[0];
        let b = doc.node(a).unwrap().children()[0];
        doc.change_type(a, NodeType::Auto).unwrap();
        assert!(doc.node(b).is_none());
        assert_eq!(doc.value_of(root), json!({"a": ""}));
    }

    #[test]
    fn change_type_leaf_to_composite_expands() {
        let (mut doc, root) = doc_with(json!({"a": 1}));
        let a = doc.node(root).unwrap().children()[0];
        doc.change_type(a, NodeType::Object).unwrap();
        assert!(doc.node(a).unwrap().expanded);
        assert_eq!(doc.value_of(root), json!({"a": {}}));
    }

    #[test]
    fn sort_array_by_value_and_toggle() {
        let (mut doc, root) = doc_with(json!([3, 1, 2]));
        doc.sort_children(root, SortOrder::Asc).unwrap();
        assert_eq!(doc.value_of(root), json!([1, 2, 3]));
        assert_eq!(doc.node(root).unwrap().sort, Some(SortOrder::Asc));
        doc.sort_children(root, SortOrder::Desc).unwrap();
        assert_eq!(doc.value_of(root), json!([3, 2, 1]));
    }

    #[test]
    fn sort_object_by_field() {
        let (mut doc, root) = doc_with(json!({"b": 1, "a": 2, "c": 3}));
        doc.sort_children(root, SortOrder::Asc).unwrap();
        assert_eq!(doc.value_of(root), json!({"a": 2, "b": 1, "c": 3}));
    }

    #[test]
    fn sort_undo_via_recorded_order() {
        let (mut doc, root) = doc_with(json!([3, 1, 2]));
        let (old, _new) = doc.sort_children(root, SortOrder::Asc).unwrap();
        doc.set_children_order(root, &old, None).unwrap();
        assert_eq!(doc.value_of(root), json!([3, 1, 2]));
        assert_eq!(doc.node(root).unwrap().sort, None);
    }

    #[test]
    fn snapshot_restore_revives_original_ids() {
        let (mut doc, root) = doc_with(json!({"a": {"b": 1}}));
        let a = doc.node(root).unwrap().children()[0];
        let b = doc.node(a).unwrap().children()[0];
        let snap = doc.capture(a).unwrap();
        let index = doc.remove_child(root, a).unwrap();
        doc.discard(a);
        assert!(doc.node(a).is_none());

        doc.restore(&snap, root, index).unwrap();
        assert_eq!(doc.node(root).unwrap().children(), &[a]);
        assert_eq!(doc.node(a).unwrap().children(), &[b]);
        assert_eq!(doc.value_of(root), json!({"a": {"b": 1}}));
    }

    #[test]
    fn restore_node_state_brings_back_keys() {
        let (mut doc, root) = doc_with(json!({"k1": 1, "k2": 2}));
        let snap = doc.capture(root).unwrap();
        doc.change_type(root, NodeType::Array).unwrap();
        assert_eq!(doc.value_of(root), json!([1, 2]));
        doc.restore_node_state(&snap).unwrap();
        assert_eq!(doc.value_of(root), json!({"k1": 1, "k2": 2}));
    }

    #[test]
    fn set_value_replaces_subtree() {
        let (mut doc, root) = doc_with(json!({"a": {"b": 1}}));
        let a = doc.node(root).unwrap().children()[0];
        let b = doc.node(a).unwrap().children()[0];
        doc.set_value(a, &json!([1, 2]), None).unwrap();
        assert!(doc.node(b).is_none());
        assert_eq!(doc.value_of(root), json!({"a": [1, 2]}));
    }

    #[test]
    fn contains_is_reflexive_and_deep() {
        let (doc, root) = doc_with(json!({"a": {"b": {"c": 1}}}));
        let a = doc.node(root).unwrap().children()[0];
        let b = doc.node(a).unwrap().children()[0];
        let c = doc.node(b).unwrap().children()[0];
        assert!(doc.contains(root, c));
        assert!(doc.contains(a, a));
        assert!(!doc.contains(c, a));
    }
}
