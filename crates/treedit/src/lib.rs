//! treedit — a mutable JSON document tree with undo/redo history and
//! incremental view synchronization.
//!
//! The crate models a hierarchical document (nested mappings, sequences and
//! scalars) as an id-indexed node arena, pairs it with a linear reversible
//! command history, and keeps an externally owned presentation layer
//! consistent with tree edits through incremental reconciliation — node
//! identity and position survive structural edits, and no mutation triggers
//! a full-tree redraw.
//!
//! Everything is single-threaded and input-event-driven; "waiting" exists
//! only as explicit host-driven ticks (debounced search, deferred
//! unhighlight, the drag auto-scroll flag).

// Leaf utilities (no internal deps)
pub mod cast;

pub mod tree;

pub mod highlight;
pub mod history;
pub mod search;
pub mod view;

pub mod editor;

pub use cast::{cast_text, casts_to_non_string, text_of};
pub use editor::{Editor, EditorOptions};
pub use highlight::{HighlightChange, Highlighter};
pub use history::{Action, Entry, Focus, History, Region, Selection};
pub use search::{Match, MatchPart, SearchState};
pub use tree::{
    Body, BranchKind, Document, LeafKind, Node, NodeId, NodeType, SearchFlags, SiblingRef,
    Snapshot, SnapshotBody, SortOrder, TreeError,
};
pub use view::{BindKey, ViewBinding, ViewHost};
