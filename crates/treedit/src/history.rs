//! Command history: a linear, truncating undo/redo log.
//!
//! # Overview
//!
//! Every recorded entry carries an immutable [`Action`] payload holding
//! everything needed to reverse and reapply the operation (old/new values,
//! positions, subtree snapshots), plus the selection as it stood before and
//! after. Undo and redo are pure functions of the payload against the
//! document; nothing in the log aliases the live tree.
//!
//! Recording while the position pointer is not at the end truncates all
//! forward entries. An entry whose payload no longer applies to the current
//! tree is a non-fatal skipped no-op: it is logged and the pointer still
//! moves, so one bad entry cannot wedge the whole history.

use std::time::SystemTime;

use serde_json::Value;

use crate::tree::{Document, NodeId, NodeType, Snapshot, SortOrder, TreeError};

// ── Selection snapshots ───────────────────────────────────────────────────

/// Sub-region of a node's row that can hold focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Field,
    Value,
    ExpandControl,
    DragHandle,
}

/// The focused element: a node plus the sub-region within its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Focus {
    pub node: NodeId,
    pub region: Region,
}

/// Editing context captured around each action so undo/redo can put the
/// user back where they were: focused element, text-cursor offset, scroll
/// position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub focus: Option<Focus>,
    pub cursor: Option<usize>,
    pub scroll_top: i64,
}

// ── Actions ───────────────────────────────────────────────────────────────

/// One reversible tree mutation.
///
/// Structural payloads carry subtree [`Snapshot`]s with their original node
/// ids, so replaying re-registers the same identities and later entries
/// addressing those nodes stay valid.
#[derive(Debug, Clone)]
pub enum Action {
    EditField {
        node: NodeId,
        old: String,
        new: String,
    },
    EditValue {
        node: NodeId,
        old: Value,
        new: Value,
    },
    Append {
        parent: NodeId,
        snapshot: Snapshot,
    },
    InsertBefore {
        parent: NodeId,
        index: usize,
        snapshot: Snapshot,
    },
    InsertAfter {
        parent: NodeId,
        index: usize,
        snapshot: Snapshot,
    },
    Remove {
        parent: NodeId,
        index: usize,
        snapshot: Snapshot,
    },
    Duplicate {
        parent: NodeId,
        index: usize,
        snapshot: Snapshot,
    },
    ChangeType {
        node: NodeId,
        before: Snapshot,
        new_type: NodeType,
    },
    Move {
        node: NodeId,
        start_parent: NodeId,
        start_index: usize,
        end_parent: NodeId,
        end_index: usize,
    },
    Sort {
        node: NodeId,
        old_order: Vec<NodeId>,
        new_order: Vec<NodeId>,
        old_sort: Option<SortOrder>,
        new_sort: SortOrder,
    },
}

impl Action {
    /// Stable tag for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::EditField { .. } => "edit-field",
            Action::EditValue { .. } => "edit-value",
            Action::Append { .. } => "append",
            Action::InsertBefore { .. } => "insert-before",
            Action::InsertAfter { .. } => "insert-after",
            Action::Remove { .. } => "remove",
            Action::Duplicate { .. } => "duplicate",
            Action::ChangeType { .. } => "change-type",
            Action::Move { .. } => "move",
            Action::Sort { .. } => "sort",
        }
    }

    /// Reverse this action against `doc`.
    pub fn undo(&self, doc: &mut Document) -> Result<(), TreeError> {
        match self {
            Action::EditField { node, old, .. } => doc.set_field(*node, old, true),
            Action::EditValue { node, old, .. } => doc.update_scalar(*node, old.clone()),
            Action::Append { parent, snapshot }
            | Action::InsertBefore { parent, snapshot, .. }
            | Action::InsertAfter { parent, snapshot, .. }
            | Action::Duplicate { parent, snapshot, .. } => {
                detach_and_discard(doc, *parent, snapshot.id)
            }
            Action::Remove { parent, index, snapshot } => {
                doc.restore(snapshot, *parent, *index).map(|_| ())
            }
            Action::ChangeType { before, .. } => doc.restore_node_state(before),
            Action::Move { node, start_parent, start_index, .. } => {
                doc.move_to(*node, *start_parent, *start_index)
            }
            Action::Sort { node, old_order, old_sort, .. } => {
                doc.set_children_order(*node, old_order, *old_sort)
            }
        }
    }

    /// Reapply this action against `doc`.
    pub fn redo(&self, doc: &mut Document) -> Result<(), TreeError> {
        match self {
            Action::EditField { node, new, .. } => doc.set_field(*node, new, true),
            Action::EditValue { node, new, .. } => doc.update_scalar(*node, new.clone()),
            Action::Append { parent, snapshot } => {
                let end = doc
                    .node(*parent)
                    .map(|n| n.children().len())
                    .ok_or(TreeError::NodeNotFound(*parent))?;
                doc.restore(snapshot, *parent, end).map(|_| ())
            }
            Action::InsertBefore { parent, index, snapshot }
            | Action::InsertAfter { parent, index, snapshot }
            | Action::Duplicate { parent, index, snapshot } => {
                doc.restore(snapshot, *parent, *index).map(|_| ())
            }
            Action::Remove { parent, snapshot, .. } => {
                detach_and_discard(doc, *parent, snapshot.id)
            }
            Action::ChangeType { node, new_type, .. } => doc.change_type(*node, *new_type),
            Action::Move { node, end_parent, end_index, .. } => {
                doc.move_to(*node, *end_parent, *end_index)
            }
            Action::Sort { node, new_order, new_sort, .. } => {
                doc.set_children_order(*node, new_order, Some(*new_sort))
            }
        }
    }

    /// Nodes whose subtrees the view must reconcile after applying this
    /// action in either direction.
    pub fn anchors(&self) -> Vec<NodeId> {
        match self {
            Action::EditField { node, .. }
            | Action::EditValue { node, .. }
            | Action::ChangeType { node, .. }
            | Action::Sort { node, .. } => vec![*node],
            Action::Append { parent, .. }
            | Action::InsertBefore { parent, .. }
            | Action::InsertAfter { parent, .. }
            | Action::Remove { parent, .. }
            | Action::Duplicate { parent, .. } => vec![*parent],
            Action::Move { start_parent, end_parent, .. } => {
                if start_parent == end_parent {
                    vec![*start_parent]
                } else {
                    vec![*start_parent, *end_parent]
                }
            }
        }
    }
}

fn detach_and_discard(doc: &mut Document, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
    doc.remove_child(parent, child).ok_or(TreeError::RefNotFound)?;
    doc.discard(child);
    Ok(())
}

// ── History ───────────────────────────────────────────────────────────────

/// One recorded step: the action plus the surrounding selection snapshots.
#[derive(Debug, Clone)]
pub struct Entry {
    pub action: Action,
    pub old_selection: Option<Selection>,
    pub new_selection: Option<Selection>,
    pub timestamp: SystemTime,
}

/// Linear undo/redo log with a position pointer.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<Entry>,
    /// Number of entries currently applied; the pointer sits between
    /// `entries[applied - 1]` and `entries[applied]`.
    applied: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new entry, truncating any forward (redo) entries first.
    pub fn add(&mut self, entry: Entry) {
        self.entries.truncate(self.applied);
        self.entries.push(entry);
        self.applied += 1;
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.applied = 0;
    }

    /// Step the pointer back one entry and reverse it against `doc`.
    ///
    /// Returns the entry plus whether it actually applied; an entry whose
    /// payload no longer matches the tree is logged and skipped, with the
    /// pointer retreating regardless.
    pub fn undo(&mut self, doc: &mut Document) -> Option<(Entry, bool)> {
        if !self.can_undo() {
            return None;
        }
        self.applied -= 1;
        let entry = self.entries[self.applied].clone();
        let ok = match entry.action.undo(doc) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("history: skipping {} undo: {e}", entry.action.kind());
                false
            }
        };
        Some((entry, ok))
    }

    /// Step the pointer forward one entry and reapply it against `doc`.
    pub fn redo(&mut self, doc: &mut Document) -> Option<(Entry, bool)> {
        if !self.can_redo() {
            return None;
        }
        let entry = self.entries[self.applied].clone();
        self.applied += 1;
        let ok = match entry.action.redo(doc) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("history: skipping {} redo: {e}", entry.action.kind());
                false
            }
        };
        Some((entry, ok))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
