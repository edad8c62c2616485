//! Editor controller: the facade wiring the tree, history, view binding,
//! search and highlighter together.
//!
//! # Overview
//!
//! [`Editor`] owns one document session: top-level value get/set, every
//! mutating operation (each recorded into the history with before/after
//! selection and pushed through view reconciliation), undo/redo with
//! selection restore, search wiring, expand/collapse, the single-slot
//! highlighter and the drag-reorder session.
//!
//! All session-wide state that the presentation layer might be tempted to
//! keep globally — current selection, highlighted node, active drag — lives
//! here, so multiple editor instances coexist without interference.

use serde_json::Value;

use crate::cast::cast_text;
use crate::history::{Action, Entry, History, Selection};
use crate::search::{scan, Match, SearchState};
use crate::highlight::Highlighter;
use crate::tree::{Document, NodeId, NodeType, SiblingRef, SortOrder, TreeError};
use crate::view::{ViewBinding, ViewHost};

// ── Options ───────────────────────────────────────────────────────────────

/// Session construction options.
#[derive(Debug, Clone)]
pub struct EditorOptions {
    /// Field name shown on the document root.
    pub name: Option<String>,
    /// Record operations for undo/redo.
    pub history: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self { name: None, history: true }
    }
}

// ── Drag session ──────────────────────────────────────────────────────────

/// An in-flight drag-reorder: origin captured at start, provisional moves
/// in between, at most one recorded move at the end.
#[derive(Debug, Clone, Copy)]
struct DragState {
    node: NodeId,
    start_parent: NodeId,
    start_index: usize,
    auto_scroll: bool,
}

// ── Editor ────────────────────────────────────────────────────────────────

pub struct Editor<H: ViewHost> {
    doc: Document,
    view: ViewBinding<H>,
    history: History,
    highlighter: Highlighter,
    search: SearchState,
    name: Option<String>,
    selection: Option<Selection>,
    drag: Option<DragState>,
    history_enabled: bool,
    on_change: Option<Box<dyn FnMut()>>,
    on_parse_error: Option<Box<dyn FnMut(&serde_json::Error)>>,
}

impl<H: ViewHost> Editor<H> {
    pub fn new(host: H, options: EditorOptions) -> Self {
        Self {
            doc: Document::new(),
            view: ViewBinding::new(host),
            history: History::new(),
            highlighter: Highlighter::new(),
            search: SearchState::default(),
            name: options.name,
            selection: None,
            drag: None,
            history_enabled: options.history,
            on_change: None,
            on_parse_error: None,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn view(&self) -> &ViewBinding<H> {
        &self.view
    }

    pub fn root(&self) -> Option<NodeId> {
        self.doc.root()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn set_on_change(&mut self, cb: impl FnMut() + 'static) {
        self.on_change = Some(Box::new(cb));
    }

    /// Boundary parse failures are reported here instead of being raised,
    /// so the host can render them inline without aborting the session.
    pub fn set_on_parse_error(&mut self, cb: impl FnMut(&serde_json::Error) + 'static) {
        self.on_parse_error = Some(Box::new(cb));
    }

    // ── Top-level value ───────────────────────────────────────────────────

    /// Load a value as the new document, replacing everything. Clears the
    /// history; the root is expanded one level.
    pub fn set(&mut self, value: &Value) -> Result<(), TreeError> {
        self.view.reset();
        self.doc.clear();
        self.history.clear();
        self.search.clear();
        self.selection = None;
        let root = self.doc.build(self.name.clone(), value, None)?;
        self.doc.set_root(root)?;
        if let Some(n) = self.doc.node_mut(root) {
            n.expanded = true;
        }
        self.view.sync_root(&self.doc);
        Ok(())
    }

    /// [`Editor::set`] with a root name.
    pub fn set_named(&mut self, value: &Value, name: &str) -> Result<(), TreeError> {
        self.name = Some(name.to_string());
        self.set(value)
    }

    /// Collect the current document value.
    pub fn get(&self) -> Option<Value> {
        self.doc.root().map(|r| self.doc.value_of(r))
    }

    /// Parse raw text at the boundary and load it. Failures go through the
    /// parse-error hook and leave the tree unchanged; returns whether the
    /// text was accepted.
    pub fn set_text(&mut self, text: &str) -> bool {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => self.set(&value).is_ok(),
            Err(e) => {
                if let Some(cb) = self.on_parse_error.as_mut() {
                    cb(&e);
                }
                false
            }
        }
    }

    /// The document serialized as pretty-printed text.
    pub fn get_text(&self) -> Option<String> {
        self.get().and_then(|v| serde_json::to_string_pretty(&v).ok())
    }

    /// Drop the document entirely.
    pub fn clear(&mut self) {
        self.view.reset();
        self.doc.clear();
        self.history.clear();
        self.search.clear();
        self.selection = None;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Rename the document root.
    pub fn set_name(&mut self, name: Option<&str>) {
        self.name = name.map(str::to_string);
        if let Some(root) = self.doc.root() {
            if let Some(n) = self.doc.node_mut(root) {
                n.field = self.name.clone();
            }
            self.view.refresh(&self.doc, root);
        }
    }

    // ── Selection ─────────────────────────────────────────────────────────

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// The host reports focus/cursor/scroll changes here; mutating
    /// operations snapshot this state into the history.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Some(selection);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn apply_selection(&mut self, selection: Selection) {
        if let Some(focus) = selection.focus {
            if self.doc.node(focus.node).is_some() {
                self.view.scroll_to(focus.node);
            }
        }
        self.selection = Some(selection);
    }

    // ── Mutating operations ───────────────────────────────────────────────

    /// Rename an object member. Ignored (`Ok(false)`) when the field is not
    /// editable or unchanged.
    pub fn edit_field(&mut self, node: NodeId, new_field: &str) -> Result<bool, TreeError> {
        let n = self.doc.node(node).ok_or(TreeError::NodeNotFound(node))?;
        if !n.field_editable {
            return Ok(false);
        }
        let old = n.field.clone().unwrap_or_default();
        if old == new_field {
            return Ok(false);
        }
        let old_selection = self.selection.clone();
        self.doc.set_field(node, new_field, true)?;
        self.view.refresh(&self.doc, node);
        self.record(
            Action::EditField { node, old, new: new_field.to_string() },
            old_selection,
        );
        Ok(true)
    }

    /// Apply raw text to a leaf. Auto leaves re-derive their scalar through
    /// the cast; string leaves keep the text verbatim. Returns the stored
    /// value.
    pub fn edit_value(&mut self, node: NodeId, text: &str) -> Result<Value, TreeError> {
        let n = self.doc.node(node).ok_or(TreeError::NodeNotFound(node))?;
        let old = n.scalar().cloned().ok_or(TreeError::WrongType(node))?;
        let new = match n.node_type() {
            NodeType::String => Value::String(text.to_string()),
            _ => cast_text(text),
        };
        if old == new {
            return Ok(new);
        }
        let old_selection = self.selection.clone();
        self.doc.update_scalar(node, new.clone())?;
        self.view.refresh(&self.doc, node);
        self.record(Action::EditValue { node, old, new: new.clone() }, old_selection);
        Ok(new)
    }

    /// Append a new child built from `value` at the end of `parent`.
    pub fn append(
        &mut self,
        parent: NodeId,
        field: &str,
        value: &Value,
        explicit: Option<NodeType>,
    ) -> Result<NodeId, TreeError> {
        let parent_node = self.doc.node(parent).ok_or(TreeError::NodeNotFound(parent))?;
        if !parent_node.is_branch() {
            return Err(TreeError::WrongType(parent));
        }
        let old_selection = self.selection.clone();
        let child = self.doc.build(Some(field.to_string()), value, explicit)?;
        if let Err(e) = self.doc.append(parent, child) {
            self.doc.discard(child);
            return Err(e);
        }
        self.view.sync(&self.doc, parent);
        let snapshot = self.doc.capture(child).ok_or(TreeError::NodeNotFound(child))?;
        self.record(Action::Append { parent, snapshot }, old_selection);
        Ok(child)
    }

    /// Insert a new child before `target`; the append placeholder is a
    /// valid target meaning "at the end".
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        target: SiblingRef,
        field: &str,
        value: &Value,
        explicit: Option<NodeType>,
    ) -> Result<NodeId, TreeError> {
        let parent_node = self.doc.node(parent).ok_or(TreeError::NodeNotFound(parent))?;
        if !parent_node.is_branch() {
            return Err(TreeError::WrongType(parent));
        }
        let index = match target {
            SiblingRef::Append => parent_node.children().len(),
            SiblingRef::Node(t) => self
                .doc
                .index_of(parent, t)
                .ok_or(TreeError::RefNotFound)?,
        };
        let old_selection = self.selection.clone();
        let child = self.doc.build(Some(field.to_string()), value, explicit)?;
        if let Err(e) = self.doc.insert_at(parent, child, index) {
            self.doc.discard(child);
            return Err(e);
        }
        self.view.sync(&self.doc, parent);
        let snapshot = self.doc.capture(child).ok_or(TreeError::NodeNotFound(child))?;
        self.record(
            Action::InsertBefore { parent, index, snapshot },
            old_selection,
        );
        Ok(child)
    }

    /// Insert a new child immediately after `target`.
    pub fn insert_after(
        &mut self,
        parent: NodeId,
        target: NodeId,
        field: &str,
        value: &Value,
        explicit: Option<NodeType>,
    ) -> Result<NodeId, TreeError> {
        let parent_node = self.doc.node(parent).ok_or(TreeError::NodeNotFound(parent))?;
        if !parent_node.is_branch() {
            return Err(TreeError::WrongType(parent));
        }
        let index = self
            .doc
            .index_of(parent, target)
            .ok_or(TreeError::RefNotFound)?
            + 1;
        let old_selection = self.selection.clone();
        let child = self.doc.build(Some(field.to_string()), value, explicit)?;
        if let Err(e) = self.doc.insert_at(parent, child, index) {
            self.doc.discard(child);
            return Err(e);
        }
        self.view.sync(&self.doc, parent);
        let snapshot = self.doc.capture(child).ok_or(TreeError::NodeNotFound(child))?;
        self.record(
            Action::InsertAfter { parent, index, snapshot },
            old_selection,
        );
        Ok(child)
    }

    /// Remove a node and its subtree. The root cannot be removed.
    pub fn remove(&mut self, node: NodeId) -> Result<(), TreeError> {
        let parent = self
            .doc
            .parent_of(node)
            .ok_or(TreeError::NodeNotFound(node))?;
        let snapshot = self.doc.capture(node).ok_or(TreeError::NodeNotFound(node))?;
        self.drop_highlight_within(node);
        let old_selection = self.selection.clone();
        let index = self
            .doc
            .remove_child(parent, node)
            .ok_or(TreeError::RefNotFound)?;
        self.doc.discard(node);
        self.view.sync(&self.doc, parent);
        self.record(Action::Remove { parent, index, snapshot }, old_selection);
        Ok(())
    }

    /// Deep-clone a node right after itself.
    pub fn duplicate(&mut self, node: NodeId) -> Result<NodeId, TreeError> {
        let parent = self
            .doc
            .parent_of(node)
            .ok_or(TreeError::NodeNotFound(node))?;
        let old_selection = self.selection.clone();
        let copy = self.doc.duplicate(node)?;
        self.view.sync(&self.doc, parent);
        let index = self
            .doc
            .index_of(parent, copy)
            .ok_or(TreeError::RefNotFound)?;
        let snapshot = self.doc.capture(copy).ok_or(TreeError::NodeNotFound(copy))?;
        self.record(
            Action::Duplicate { parent, index, snapshot },
            old_selection,
        );
        Ok(copy)
    }

    /// Change a node's type. Recorded with a full before-snapshot so undo
    /// restores key names that the retype itself cannot recover.
    pub fn change_type(&mut self, node: NodeId, new_type: NodeType) -> Result<bool, TreeError> {
        let current = self
            .doc
            .node(node)
            .ok_or(TreeError::NodeNotFound(node))?
            .node_type();
        if current == new_type {
            return Ok(false);
        }
        let before = self.doc.capture(node).ok_or(TreeError::NodeNotFound(node))?;
        let old_selection = self.selection.clone();
        self.doc.change_type(node, new_type)?;
        self.view.sync(&self.doc, node);
        self.record(
            Action::ChangeType { node, before, new_type },
            old_selection,
        );
        Ok(true)
    }

    /// Atomic recorded move; `index` addresses the target child list with
    /// the moved node detached. The moved subtree's view handles are
    /// released and recreated at the new location.
    pub fn move_to(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        index: usize,
    ) -> Result<bool, TreeError> {
        let start_parent = self
            .doc
            .parent_of(node)
            .ok_or(TreeError::NodeNotFound(node))?;
        let start_index = self
            .doc
            .index_of(start_parent, node)
            .ok_or(TreeError::RefNotFound)?;
        let old_selection = self.selection.clone();
        self.doc.move_to(node, new_parent, index)?;
        let end_index = self
            .doc
            .index_of(new_parent, node)
            .ok_or(TreeError::RefNotFound)?;
        self.view.release_subtree(&self.doc, node);
        self.view.sync(&self.doc, start_parent);
        if new_parent != start_parent {
            self.view.sync(&self.doc, new_parent);
        }
        if start_parent == new_parent && start_index == end_index {
            return Ok(false);
        }
        self.record(
            Action::Move {
                node,
                start_parent,
                start_index,
                end_parent: new_parent,
                end_index,
            },
            old_selection,
        );
        Ok(true)
    }

    /// Sort a branch's children, toggling direction on repeated requests.
    pub fn sort(&mut self, node: NodeId) -> Result<SortOrder, TreeError> {
        let order = match self
            .doc
            .node(node)
            .ok_or(TreeError::NodeNotFound(node))?
            .sort
        {
            Some(previous) => previous.toggled(),
            None => SortOrder::Asc,
        };
        self.sort_with(node, order)?;
        Ok(order)
    }

    /// Sort a branch's children in an explicit direction.
    pub fn sort_with(&mut self, node: NodeId, order: SortOrder) -> Result<(), TreeError> {
        let old_sort = self
            .doc
            .node(node)
            .ok_or(TreeError::NodeNotFound(node))?
            .sort;
        let old_selection = self.selection.clone();
        let (old_order, new_order) = self.doc.sort_children(node, order)?;
        self.view.sync(&self.doc, node);
        self.record(
            Action::Sort { node, old_order, new_order, old_sort, new_sort: order },
            old_selection,
        );
        Ok(())
    }

    // ── Undo / redo ───────────────────────────────────────────────────────

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Reverse the last action, restoring the selection captured before it.
    pub fn undo(&mut self) -> bool {
        let Some((entry, applied)) = self.history.undo(&mut self.doc) else {
            return false;
        };
        let selection = entry.old_selection.clone();
        self.after_replay(&entry, applied, selection);
        true
    }

    /// Reapply the next action, restoring the selection captured after it.
    pub fn redo(&mut self) -> bool {
        let Some((entry, applied)) = self.history.redo(&mut self.doc) else {
            return false;
        };
        let selection = entry.new_selection.clone();
        self.after_replay(&entry, applied, selection);
        true
    }

    fn after_replay(&mut self, entry: &Entry, applied: bool, selection: Option<Selection>) {
        if applied {
            if let Action::Move { node, .. } = &entry.action {
                self.view.release_subtree(&self.doc, *node);
            }
            for anchor in entry.action.anchors() {
                if self.doc.node(anchor).is_some() {
                    self.view.sync(&self.doc, anchor);
                }
            }
            if let Some(s) = selection {
                self.apply_selection(s);
            }
        }
        self.emit_change();
    }

    // ── Search ────────────────────────────────────────────────────────────

    /// Run a query now. Returns the number of matches. `None` or an empty
    /// query clears match flags without touching expand state.
    pub fn search(&mut self, query: Option<&str>) -> usize {
        let normalized = query.filter(|q| !q.is_empty());
        let previous: Vec<NodeId> = self.search.results().iter().map(|m| m.node).collect();
        let results = scan(&mut self.doc, normalized);
        let count = results.len();
        self.search
            .set_results(normalized.map(str::to_string), results);
        if normalized.is_some() {
            // The scan force-expanded and force-collapsed branches; rebuild
            // the visible rows from the root.
            self.view.sync_root(&self.doc);
        } else {
            for node in previous {
                self.view.refresh(&self.doc, node);
            }
        }
        let flagged: Vec<NodeId> = self.search.results().iter().map(|m| m.node).collect();
        for node in flagged {
            self.view.refresh(&self.doc, node);
        }
        count
    }

    /// Store a query for debounced evaluation on the next scheduler tick.
    pub fn schedule_search(&mut self, query: Option<&str>) {
        self.search.schedule(query.map(str::to_string));
    }

    /// Scheduler tick for the debounced search. Re-running the query that
    /// is already displayed is skipped.
    pub fn search_tick(&mut self) -> Option<usize> {
        let pending = self.search.take_pending()?;
        if pending.as_deref() == self.search.last_query() {
            return None;
        }
        Some(self.search(pending.as_deref()))
    }

    pub fn search_results(&self) -> &[Match] {
        self.search.results()
    }

    pub fn active_match(&self) -> Option<Match> {
        self.search.active()
    }

    pub fn search_next(&mut self) -> Option<Match> {
        self.step_search(true)
    }

    pub fn search_previous(&mut self) -> Option<Match> {
        self.step_search(false)
    }

    fn step_search(&mut self, forward: bool) -> Option<Match> {
        if let Some(old) = self.search.active() {
            if let Some(n) = self.doc.node_mut(old.node) {
                n.search.active_field = false;
                n.search.active_value = false;
            }
            self.view.refresh(&self.doc, old.node);
        }
        let next = self.search.advance(forward);
        if let Some(m) = next {
            if let Some(n) = self.doc.node_mut(m.node) {
                match m.part {
                    crate::search::MatchPart::Field => n.search.active_field = true,
                    crate::search::MatchPart::Value => n.search.active_value = true,
                }
            }
            self.reveal(m.node);
            self.view.refresh(&self.doc, m.node);
            self.view.scroll_to(m.node);
        }
        next
    }

    /// Expand the ancestor chain of `node` so its row is visible.
    pub fn reveal(&mut self, node: NodeId) {
        let mut chain = Vec::new();
        let mut cursor = self.doc.parent_of(node);
        while let Some(p) = cursor {
            chain.push(p);
            cursor = self.doc.parent_of(p);
        }
        for p in chain.into_iter().rev() {
            let newly = match self.doc.node_mut(p) {
                Some(n) if n.is_branch() && !n.expanded => {
                    n.expanded = true;
                    true
                }
                _ => false,
            };
            if newly {
                self.view.sync(&self.doc, p);
            }
        }
    }

    // ── Expand / collapse ─────────────────────────────────────────────────

    /// Expand a branch, optionally with all its descendants. Not recorded.
    pub fn expand(&mut self, node: NodeId, recursive: bool) {
        let targets = if recursive {
            self.doc.descendants(node)
        } else {
            vec![node]
        };
        for t in targets {
            if let Some(n) = self.doc.node_mut(t) {
                if n.is_branch() {
                    n.expanded = true;
                }
            }
        }
        self.view.sync(&self.doc, node);
    }

    /// Collapse a branch, optionally with all its descendants.
    pub fn collapse(&mut self, node: NodeId, recursive: bool) {
        let targets = if recursive {
            self.doc.descendants(node)
        } else {
            vec![node]
        };
        for t in targets {
            if let Some(n) = self.doc.node_mut(t) {
                if n.is_branch() {
                    n.expanded = false;
                }
            }
        }
        self.view.sync(&self.doc, node);
    }

    pub fn expand_all(&mut self) {
        if let Some(root) = self.doc.root() {
            self.expand(root, true);
        }
    }

    pub fn collapse_all(&mut self) {
        if let Some(root) = self.doc.root() {
            self.collapse(root, true);
        }
    }

    // ── Highlighting ──────────────────────────────────────────────────────

    pub fn highlight(&mut self, node: NodeId) {
        let change = self.highlighter.highlight(node);
        if let Some(old) = change.cleared {
            self.view.set_highlight(old, false);
        }
        if let Some(new) = change.set {
            self.view.set_highlight(new, true);
        }
    }

    pub fn unhighlight(&mut self) {
        self.highlighter.unhighlight();
    }

    /// Scheduler tick applying a deferred unhighlight.
    pub fn highlight_tick(&mut self) {
        if let Some(old) = self.highlighter.tick() {
            self.view.set_highlight(old, false);
        }
    }

    pub fn highlighted(&self) -> Option<NodeId> {
        self.highlighter.current()
    }

    /// Suspend highlight changes while a context menu or drag is open.
    pub fn lock_highlight(&mut self) {
        self.highlighter.lock();
    }

    pub fn unlock_highlight(&mut self) {
        self.highlighter.unlock();
    }

    fn drop_highlight_within(&mut self, subtree: NodeId) {
        if let Some(current) = self.highlighter.current() {
            if self.doc.contains(subtree, current) {
                if let Some(old) = self.highlighter.force_clear() {
                    self.view.set_highlight(old, false);
                }
            }
        }
    }

    // ── Drag reorder ──────────────────────────────────────────────────────

    /// Begin a drag: capture the origin and lock the highlighter. No-op if
    /// a drag is already active.
    pub fn drag_start(&mut self, node: NodeId) -> Result<(), TreeError> {
        if self.drag.is_some() {
            return Ok(());
        }
        let start_parent = self
            .doc
            .parent_of(node)
            .ok_or(TreeError::NodeNotFound(node))?;
        let start_index = self
            .doc
            .index_of(start_parent, node)
            .ok_or(TreeError::RefNotFound)?;
        self.highlighter.lock();
        self.drag = Some(DragState {
            node,
            start_parent,
            start_index,
            auto_scroll: false,
        });
        log::debug!("drag start: {node} from {start_parent}[{start_index}]");
        Ok(())
    }

    /// Provisionally reposition the dragged node. Not recorded; the tree
    /// and view move immediately so the user sees the candidate position.
    pub fn drag_update(&mut self, new_parent: NodeId, index: usize) -> Result<(), TreeError> {
        let Some(drag) = self.drag else {
            return Ok(());
        };
        let old_parent = self
            .doc
            .parent_of(drag.node)
            .ok_or(TreeError::NodeNotFound(drag.node))?;
        if old_parent == new_parent
            && self.doc.index_of(new_parent, drag.node) == Some(index)
        {
            return Ok(());
        }
        self.doc.move_to(drag.node, new_parent, index)?;
        self.view.release_subtree(&self.doc, drag.node);
        self.view.sync(&self.doc, old_parent);
        if new_parent != old_parent {
            self.view.sync(&self.doc, new_parent);
        }
        Ok(())
    }

    /// End the drag: compare the final position against the origin and
    /// record exactly one move if they differ. Ending at the origin records
    /// nothing. Auto-scroll always stops with the drag.
    pub fn drag_end(&mut self) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        self.highlighter.unlock();
        let Some(end_parent) = self.doc.parent_of(drag.node) else {
            return false;
        };
        let Some(end_index) = self.doc.index_of(end_parent, drag.node) else {
            return false;
        };
        if end_parent == drag.start_parent && end_index == drag.start_index {
            log::debug!("drag end: {} back at origin, nothing recorded", drag.node);
            return false;
        }
        let old_selection = self.selection.clone();
        self.record(
            Action::Move {
                node: drag.node,
                start_parent: drag.start_parent,
                start_index: drag.start_index,
                end_parent,
                end_index,
            },
            old_selection,
        );
        true
    }

    pub fn drag_active(&self) -> bool {
        self.drag.is_some()
    }

    /// Start auto-scrolling; only meaningful while a drag is active.
    pub fn auto_scroll_start(&mut self) -> bool {
        match &mut self.drag {
            Some(d) => {
                d.auto_scroll = true;
                true
            }
            None => false,
        }
    }

    pub fn auto_scroll_stop(&mut self) {
        if let Some(d) = &mut self.drag {
            d.auto_scroll = false;
        }
    }

    /// The repeating scroll timer should run exactly while this holds.
    pub fn auto_scroll_active(&self) -> bool {
        self.drag.is_some_and(|d| d.auto_scroll)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn record(&mut self, action: Action, old_selection: Option<Selection>) {
        if self.history_enabled {
            self.history.add(Entry {
                action,
                old_selection,
                new_selection: self.selection.clone(),
                timestamp: std::time::SystemTime::now(),
            });
        }
        self.emit_change();
    }

    fn emit_change(&mut self) {
        if let Some(cb) = self.on_change.as_mut() {
            cb();
        }
    }
}
