//! View binding: incremental reconciliation of external view handles.
//!
//! # Overview
//!
//! The presentation layer is externally owned and reached through the
//! [`ViewHost`] trait: a factory producing one handle per node on demand,
//! mount/unmount at a sibling position, and a refresh for rows whose field
//! or value text changed. [`ViewBinding`] tracks which handles exist and
//! which are currently mounted, and reconciles only the affected subtree
//! after a mutation — inserted nodes get new rows at the correct position,
//! removed nodes' rows are unmounted, surviving siblings are left alone.
//!
//! Expand state lives on the node, independent of mounted rows: collapsing
//! unmounts descendant rows for performance while their handles stay
//! cached, so re-expanding remounts without recreating anything.
//!
//! Each composite owns one append-placeholder row ([`BindKey::Append`])
//! that mounts exactly when the composite is expanded with zero children.
//! It participates in mounting and ordering like any row but never enters
//! the command history.

use std::collections::{HashMap, HashSet};

use crate::tree::{Document, Node, NodeId};

// ── Host trait ────────────────────────────────────────────────────────────

/// External presentation layer, one handle per node.
pub trait ViewHost {
    type Handle: Copy + PartialEq + std::fmt::Debug;

    /// Produce a handle for a node's row. Called once per node, lazily, on
    /// first display.
    fn create(&mut self, node: &Node) -> Self::Handle;

    /// Produce a handle for a composite's append-placeholder row.
    fn create_append(&mut self, owner: &Node) -> Self::Handle;

    /// Insert a row at `index` among the mounted children of `parent`
    /// (`None` for the document root).
    fn mount(&mut self, handle: Self::Handle, parent: Option<Self::Handle>, index: usize);

    fn unmount(&mut self, handle: Self::Handle);

    /// The row's displayed field/value/flags may have changed.
    fn refresh(&mut self, handle: Self::Handle, node: &Node);

    fn set_highlight(&mut self, _handle: Self::Handle, _on: bool) {}

    fn scroll_to(&mut self, _handle: Self::Handle) {}
}

// ── Bind keys ─────────────────────────────────────────────────────────────

/// View-layer address: a real node's row, or the addressable insertion
/// point of a composite. The placeholder is distinguished by variant, not
/// by a node subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindKey {
    Node(NodeId),
    Append(NodeId),
}

// ── Binding ───────────────────────────────────────────────────────────────

/// Tracks handles and mounted rows, and reconciles them against the tree.
#[derive(Debug)]
pub struct ViewBinding<H: ViewHost> {
    host: H,
    /// Every handle ever created and still alive (mounted or cached).
    handles: HashMap<BindKey, H::Handle>,
    mounted: HashSet<BindKey>,
    /// Ordered mounted rows per branch.
    rows: HashMap<NodeId, Vec<BindKey>>,
}

impl<H: ViewHost> ViewBinding<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            handles: HashMap::new(),
            mounted: HashSet::new(),
            rows: HashMap::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn is_mounted(&self, key: BindKey) -> bool {
        self.mounted.contains(&key)
    }

    pub fn handle(&self, key: BindKey) -> Option<H::Handle> {
        self.handles.get(&key).copied()
    }

    /// Unmount everything and forget all handles. Used when the document is
    /// replaced wholesale.
    pub fn reset(&mut self) {
        for key in std::mem::take(&mut self.mounted) {
            if let Some(&h) = self.handles.get(&key) {
                self.host.unmount(h);
            }
        }
        self.handles.clear();
        self.rows.clear();
    }

    /// Mount the root row if needed and reconcile its subtree.
    pub fn sync_root(&mut self, doc: &Document) {
        let Some(root) = doc.root() else {
            return;
        };
        let key = BindKey::Node(root);
        if !self.mounted.contains(&key) {
            if let Some(h) = self.ensure_handle(doc, key) {
                self.host.mount(h, None, 0);
                self.mounted.insert(key);
            }
        }
        self.sync(doc, root);
    }

    /// Reconcile the subtree under `id`: refresh its row and diff its
    /// mounted children against what the tree says should be visible.
    pub fn sync(&mut self, doc: &Document, id: NodeId) {
        self.refresh(doc, id);
        self.sync_children(doc, id);
    }

    /// Refresh a single mounted row.
    pub fn refresh(&mut self, doc: &Document, id: NodeId) {
        let key = BindKey::Node(id);
        if !self.mounted.contains(&key) {
            return;
        }
        if let (Some(node), Some(&h)) = (doc.node(id), self.handles.get(&key)) {
            self.host.refresh(h, node);
        }
    }

    pub fn set_highlight(&mut self, id: NodeId, on: bool) {
        let key = BindKey::Node(id);
        if self.mounted.contains(&key) {
            if let Some(&h) = self.handles.get(&key) {
                self.host.set_highlight(h, on);
            }
        }
    }

    pub fn scroll_to(&mut self, id: NodeId) {
        if let Some(&h) = self.handles.get(&BindKey::Node(id)) {
            self.host.scroll_to(h);
        }
    }

    /// Unmount a subtree's rows and forget their handles even though the
    /// nodes are still in the document. Used around a move so the subtree
    /// remounts at its new location with fresh handles rather than carrying
    /// bindings across.
    pub fn release_subtree(&mut self, doc: &Document, id: NodeId) {
        self.unmount_recursive(doc, BindKey::Node(id));
        for n in doc.descendants(id) {
            self.handles.remove(&BindKey::Node(n));
            self.handles.remove(&BindKey::Append(n));
        }
    }

    // ── Visible-row navigation ────────────────────────────────────────────

    /// The node before `id` in visible row order, skipping append rows.
    pub fn visible_prev(&self, doc: &Document, id: NodeId) -> Option<NodeId> {
        let order = visible_nodes(doc);
        let pos = order.iter().position(|n| *n == id)?;
        pos.checked_sub(1).map(|p| order[p])
    }

    /// The node after `id` in visible row order, skipping append rows.
    pub fn visible_next(&self, doc: &Document, id: NodeId) -> Option<NodeId> {
        let order = visible_nodes(doc);
        let pos = order.iter().position(|n| *n == id)?;
        order.get(pos + 1).copied()
    }

    // ── Reconciliation internals ──────────────────────────────────────────

    fn sync_children(&mut self, doc: &Document, id: NodeId) {
        let desired: Vec<BindKey> = if self.mounted.contains(&BindKey::Node(id)) {
            desired_rows(doc, id)
        } else {
            Vec::new()
        };
        let current = self.rows.get(&id).cloned().unwrap_or_default();

        if current != desired {
            // Unmount rows that are no longer wanted.
            for key in &current {
                if !desired.contains(key) {
                    self.unmount_recursive(doc, *key);
                }
            }
            // A change of relative order among survivors (sort) rebuilds
            // the row list; plain inserts and removals never get here.
            let survivors: Vec<BindKey> = current
                .iter()
                .filter(|k| desired.contains(k))
                .copied()
                .collect();
            let in_order: Vec<BindKey> = desired
                .iter()
                .filter(|k| survivors.contains(k))
                .copied()
                .collect();
            if survivors != in_order {
                for key in &survivors {
                    self.unmount_recursive(doc, *key);
                }
            }
            let parent_handle = self.handles.get(&BindKey::Node(id)).copied();
            for (i, key) in desired.iter().enumerate() {
                if !self.mounted.contains(key) {
                    if let Some(h) = self.ensure_handle(doc, *key) {
                        self.host.mount(h, parent_handle, i);
                        self.mounted.insert(*key);
                    }
                }
            }
            if desired.is_empty() {
                self.rows.remove(&id);
            } else {
                self.rows.insert(id, desired.clone());
            }
        }

        for key in desired {
            if let BindKey::Node(child) = key {
                self.sync(doc, child);
            }
        }
    }

    fn unmount_recursive(&mut self, doc: &Document, key: BindKey) {
        if self.mounted.remove(&key) {
            if let Some(&h) = self.handles.get(&key) {
                self.host.unmount(h);
            }
        }
        match key {
            BindKey::Node(id) => {
                if let Some(children) = self.rows.remove(&id) {
                    for c in children {
                        self.unmount_recursive(doc, c);
                    }
                }
                // A node that left the document releases its handle; a
                // collapsed one keeps it cached for remounting.
                if doc.node(id).is_none() {
                    self.handles.remove(&key);
                }
            }
            BindKey::Append(owner) => {
                if doc.node(owner).is_none() {
                    self.handles.remove(&key);
                }
            }
        }
    }

    fn ensure_handle(&mut self, doc: &Document, key: BindKey) -> Option<H::Handle> {
        if let Some(&h) = self.handles.get(&key) {
            return Some(h);
        }
        let h = match key {
            BindKey::Node(id) => self.host.create(doc.node(id)?),
            BindKey::Append(owner) => self.host.create_append(doc.node(owner)?),
        };
        self.handles.insert(key, h);
        Some(h)
    }
}

/// The rows a branch should currently show: its children in order, or the
/// append placeholder when it is expanded and empty.
fn desired_rows(doc: &Document, id: NodeId) -> Vec<BindKey> {
    let Some(node) = doc.node(id) else {
        return Vec::new();
    };
    if !node.is_branch() || !node.expanded {
        return Vec::new();
    }
    let children = node.children();
    if children.is_empty() {
        vec![BindKey::Append(id)]
    } else {
        children.iter().map(|c| BindKey::Node(*c)).collect()
    }
}

/// Pre-order listing of nodes on visible rows.
fn visible_nodes(doc: &Document) -> Vec<NodeId> {
    let mut out = Vec::new();
    if let Some(root) = doc.root() {
        collect_visible(doc, root, &mut out);
    }
    out
}

fn collect_visible(doc: &Document, id: NodeId, out: &mut Vec<NodeId>) {
    let Some(node) = doc.node(id) else {
        return;
    };
    out.push(id);
    if node.is_branch() && node.expanded {
        for c in node.children() {
            collect_visible(doc, *c, out);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeType;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct TestHost {
        next: u32,
        created: usize,
        mounts: Vec<(u32, Option<u32>, usize)>,
        unmounts: Vec<u32>,
    }

    impl ViewHost for TestHost {
        type Handle = u32;

        fn create(&mut self, _node: &Node) -> u32 {
            self.next += 1;
            self.created += 1;
            self.next
        }

        fn create_append(&mut self, _owner: &Node) -> u32 {
            self.next += 1;
            self.created += 1;
            self.next
        }

        fn mount(&mut self, handle: u32, parent: Option<u32>, index: usize) {
            self.mounts.push((handle, parent, index));
        }

        fn unmount(&mut self, handle: u32) {
            self.unmounts.push(handle);
        }

        fn refresh(&mut self, _handle: u32, _node: &Node) {}
    }

    fn setup(value: serde_json::Value) -> (Document, NodeId, ViewBinding<TestHost>) {
        let mut doc = Document::new();
        let root = doc.build(None, &value, None).unwrap();
        doc.set_root(root).unwrap();
        if let Some(n) = doc.node_mut(root) {
            n.expanded = true;
        }
        let mut binding = ViewBinding::new(TestHost::default());
        binding.sync_root(&doc);
        (doc, root, binding)
    }

    #[test]
    fn root_and_children_mount_in_order() {
        let (_doc, root, binding) = setup(json!({"a": 1, "b": 2}));
        assert!(binding.is_mounted(BindKey::Node(root)));
        let host = binding.host();
        // root + two child rows
        assert_eq!(host.mounts.len(), 3);
        assert_eq!(host.mounts[0].1, None);
        assert_eq!(host.mounts[1].2, 0);
        assert_eq!(host.mounts[2].2, 1);
    }

    #[test]
    fn collapsed_children_are_not_mounted() {
        let (doc, root, binding) = setup(json!({"a": {"b": 1}}));
        let a = doc.node(root).unwrap().children()[0];
        let b = doc.node(a).unwrap().children()[0];
        assert!(binding.is_mounted(BindKey::Node(a)));
        // `a` starts collapsed, so its child has no row yet
        assert!(!binding.is_mounted(BindKey::Node(b)));
    }

    #[test]
    fn collapse_keeps_handles_cached() {
        let (mut doc, root, mut binding) = setup(json!({"a": 1, "b": 2}));
        let a = doc.node(root).unwrap().children()[0];
        let created_before = binding.host().created;

        doc.node_mut(root).unwrap().expanded = false;
        binding.sync(&doc, root);
        assert!(!binding.is_mounted(BindKey::Node(a)));
        assert!(binding.handle(BindKey::Node(a)).is_some());

        doc.node_mut(root).unwrap().expanded = true;
        binding.sync(&doc, root);
        assert!(binding.is_mounted(BindKey::Node(a)));
        // remount reused the cached handles; nothing was recreated
        assert_eq!(binding.host().created, created_before);
    }

    #[test]
    fn empty_expanded_branch_shows_append_row() {
        let (mut doc, root, mut binding) = setup(json!({}));
        assert!(binding.is_mounted(BindKey::Append(root)));

        // Adding a child hides the placeholder.
        let child = doc.build(Some("a".into()), &json!(1), None).unwrap();
        doc.append(root, child).unwrap();
        binding.sync(&doc, root);
        assert!(!binding.is_mounted(BindKey::Append(root)));
        assert!(binding.is_mounted(BindKey::Node(child)));
    }

    #[test]
    fn insert_leaves_sibling_rows_untouched() {
        let (mut doc, root, mut binding) = setup(json!([1, 2]));
        let kids = doc.node(root).unwrap().children().to_vec();
        let h0 = binding.handle(BindKey::Node(kids[0])).unwrap();
        let h1 = binding.handle(BindKey::Node(kids[1])).unwrap();
        let unmounts_before = binding.host().unmounts.len();

        let child = doc.build(None, &json!(9), None).unwrap();
        doc.insert_before(root, child, crate::tree::SiblingRef::Node(kids[1]))
            .unwrap();
        binding.sync(&doc, root);

        // no sibling was unmounted; the new row went in at position 1
        assert_eq!(binding.host().unmounts.len(), unmounts_before);
        assert_eq!(binding.handle(BindKey::Node(kids[0])), Some(h0));
        assert_eq!(binding.handle(BindKey::Node(kids[1])), Some(h1));
        let (_, _, idx) = *binding.host().mounts.last().unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn removal_unmounts_and_releases_the_subtree() {
        let (mut doc, root, mut binding) = setup(json!({"a": {"b": 1}}));
        let a = doc.node(root).unwrap().children()[0];
        doc.node_mut(a).unwrap().expanded = true;
        binding.sync(&doc, root);
        let b = doc.node(a).unwrap().children()[0];
        assert!(binding.is_mounted(BindKey::Node(b)));

        doc.remove_child(root, a).unwrap();
        doc.discard(a);
        binding.sync(&doc, root);
        assert!(!binding.is_mounted(BindKey::Node(a)));
        assert!(binding.handle(BindKey::Node(a)).is_none());
        assert!(binding.handle(BindKey::Node(b)).is_none());
    }

    #[test]
    fn retype_to_leaf_drops_child_rows() {
        let (mut doc, root, mut binding) = setup(json!({"a": {"b": 1}}));
        let a = doc.node(root).unwrap().children()[0];
        doc.node_mut(a).unwrap().expanded = true;
        binding.sync(&doc, root);
        let b = doc.node(a).unwrap().children()[0];

        doc.change_type(a, NodeType::Auto).unwrap();
        binding.sync(&doc, a);
        assert!(!binding.is_mounted(BindKey::Node(b)));
        assert!(binding.handle(BindKey::Node(b)).is_none());
        assert!(binding.is_mounted(BindKey::Node(a)));
    }

    #[test]
    fn visible_navigation_skips_hidden_subtrees() {
        let (mut doc, root, binding) = setup(json!({"a": {"b": 1}, "c": 2}));
        let a = doc.node(root).unwrap().children()[0];
        let c = doc.node(root).unwrap().children()[1];
        // `a` collapsed: next after `a` is `c`, not `b`
        assert_eq!(binding.visible_next(&doc, a), Some(c));
        assert_eq!(binding.visible_prev(&doc, c), Some(a));

        doc.node_mut(a).unwrap().expanded = true;
        let b = doc.node(a).unwrap().children()[0];
        assert_eq!(binding.visible_next(&doc, a), Some(b));
    }

    #[test]
    fn reset_unmounts_everything() {
        let (_doc, root, mut binding) = setup(json!([1]));
        binding.reset();
        assert!(!binding.is_mounted(BindKey::Node(root)));
        assert!(binding.handle(BindKey::Node(root)).is_none());
    }
}
