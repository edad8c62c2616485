//! Document tree: the id-indexed node arena and its structural operations.
//!
//! # Overview
//!
//! A [`Document`] owns every [`Node`] in a `HashMap` keyed by [`NodeId`],
//! plus a root register. Branch nodes hold the ordered ids of their
//! children; the parent link on each node is a non-owning back-reference.
//! All structural operations validate first and leave the tree unchanged on
//! failure.

pub mod doc;
pub mod node;

pub use doc::{infer_type, resolve_type, Document, SiblingRef, Snapshot, SnapshotBody};
pub use node::{Body, BranchKind, LeafKind, Node, NodeId, NodeType, SearchFlags, SortOrder};

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────

/// Errors raised by document tree operations.
///
/// Every failing operation raises synchronously and leaves the tree
/// unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("type mismatch: cannot cast value of type \"{inferred}\" to the specified type \"{requested}\"")]
    TypeMismatch {
        inferred: NodeType,
        requested: NodeType,
    },

    #[error("reference node not found among the parent's children")]
    RefNotFound,

    #[error("cannot move a node into a child of itself")]
    CycleViolation,

    #[error("node {0} not found in the document")]
    NodeNotFound(NodeId),

    #[error("node {0} has the wrong type for this operation")]
    WrongType(NodeId),
}
