//! Substring search over the document tree.
//!
//! A scan walks the tree pre-order, flagging field and value matches and
//! force-expanding composites with a hit somewhere below while collapsing
//! the rest, so the visible tree shows exactly the matching regions.
//! [`SearchState`] holds the ordered results, the single active match and
//! the debounce slot for re-evaluation after text input.

use crate::cast::text_of;
use crate::tree::{Document, NodeId};

// ── Matches ───────────────────────────────────────────────────────────────

/// Which part of the row matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPart {
    Field,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub node: NodeId,
    pub part: MatchPart,
}

// ── Scan ──────────────────────────────────────────────────────────────────

/// Run a query over the whole tree.
///
/// Matching is case-insensitive substring containment. Key fields are
/// searched; array indices are display-only and are not. Passing `None`
/// clears all match flags and leaves expand state as last set.
pub fn scan(doc: &mut Document, query: Option<&str>) -> Vec<Match> {
    let Some(root) = doc.root() else {
        return Vec::new();
    };
    let lowered = query.map(str::to_lowercase);
    scan_node(doc, root, lowered.as_deref())
}

fn scan_node(doc: &mut Document, id: NodeId, query: Option<&str>) -> Vec<Match> {
    let mut results = Vec::new();
    if let Some(n) = doc.node_mut(id) {
        n.search.clear();
    }
    let Some(node) = doc.node(id) else {
        return results;
    };
    let field_text = node.key().map(str::to_lowercase);
    let is_branch = node.is_branch();
    let children = node.children().to_vec();
    let value_text = node.scalar().map(text_of);

    if let (Some(q), Some(field)) = (query, field_text) {
        if field.contains(q) {
            if let Some(n) = doc.node_mut(id) {
                n.search.field = true;
            }
            results.push(Match { node: id, part: MatchPart::Field });
        }
    }

    if is_branch {
        let mut below = Vec::new();
        for c in children {
            below.extend(scan_node(doc, c, query));
        }
        let any_below = !below.is_empty();
        results.extend(below);
        if query.is_some() {
            // Query-driven layout: open the branches worth looking at,
            // close the rest. Non-recursive on purpose — descendants made
            // their own call.
            if let Some(n) = doc.node_mut(id) {
                n.expanded = any_below;
            }
        }
    } else if let (Some(q), Some(text)) = (query, value_text) {
        if text.to_lowercase().contains(q) {
            if let Some(n) = doc.node_mut(id) {
                n.search.value = true;
            }
            results.push(Match { node: id, part: MatchPart::Value });
        }
    }

    results
}

// ── State ─────────────────────────────────────────────────────────────────

/// Results of the most recent scan plus active-match navigation and the
/// debounce slot.
#[derive(Debug, Default)]
pub struct SearchState {
    results: Vec<Match>,
    active: Option<usize>,
    last_query: Option<String>,
    pending: Option<Option<String>>,
}

impl SearchState {
    pub fn results(&self) -> &[Match] {
        &self.results
    }

    pub fn active(&self) -> Option<Match> {
        self.active.and_then(|i| self.results.get(i).copied())
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    pub fn set_results(&mut self, query: Option<String>, results: Vec<Match>) {
        self.results = results;
        self.active = None;
        self.last_query = query;
    }

    pub fn clear(&mut self) {
        *self = SearchState::default();
    }

    /// Step the active match forward or backward, wrapping at the ends.
    pub fn advance(&mut self, forward: bool) -> Option<Match> {
        if self.results.is_empty() {
            self.active = None;
            return None;
        }
        let len = self.results.len();
        let next = match (self.active, forward) {
            (None, true) => 0,
            (None, false) => len - 1,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => i.checked_sub(1).unwrap_or(len - 1),
        };
        self.active = Some(next);
        self.results.get(next).copied()
    }

    /// Store a query for debounced evaluation on the next scheduler tick.
    pub fn schedule(&mut self, query: Option<String>) {
        self.pending = Some(query);
    }

    pub fn take_pending(&mut self) -> Option<Option<String>> {
        self.pending.take()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
