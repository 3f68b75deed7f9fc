//! Document access abstraction.
//!
//! ## Overview
//!
//! The pipeline never owns the document it rewrites. It reads and mutates
//! it through the [`Document`] trait, which exposes just enough of a
//! node tree:
//!
//! - **Read**: a node's [`UnitKind`], its text, its immediate siblings and
//!   children
//! - **Write**: insert before a reference node, remove a node, tag a node as
//!   processed
//! - **Queries**: whether a node (or an ancestor) is already processed, and
//!   whether it sits inside a verbatim/code region
//!
//! ```text
//! ┌────────────┐   Document trait   ┌──────────────────┐
//! │  Pipeline  │ ─────────────────► │ Tree (in memory) │
//! └────────────┘                    │ or a host DOM    │
//!                                   └──────────────────┘
//! ```
//!
//! [`tree::Tree`] is the in-memory implementation used by the CLI and the
//! tests. A browser host or editor would implement the trait over its own
//! node handles.

use crate::error::DocumentError;
use std::fmt::Debug;
use std::hash::Hash;

pub mod tree;

pub use tree::{ElementKind, NodeId, Tree};

/// What a node contributes when sibling text is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// A text-bearing node.
    Text,
    /// A structural line break; contributes a single `\n`.
    Break,
    /// Anything else. Aggregation stops here.
    Other,
}

/// A math expression after rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMath {
    /// The expression as written, delimiters included.
    pub raw: String,
    pub display: bool,
    /// Renderer output, or `None` when rendering failed and the raw text is shown.
    pub markup: Option<String>,
}

/// A node the applier asks the document to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewNode {
    Text(String),
    Break,
    Math(RenderedMath),
}

/// Read/write access to a tree of text, break and element nodes.
pub trait Document {
    /// An opaque, cheap node handle.
    type Node: Copy + Eq + Hash + Debug;

    /// The top of the document; a full rescan starts here.
    fn root(&self) -> Self::Node;

    /// Returns false for removed nodes and nodes in detached subtrees.
    fn is_attached(&self, node: Self::Node) -> bool;

    fn unit_kind(&self, node: Self::Node) -> UnitKind;

    /// Text content of a text node, `None` for anything else.
    fn text(&self, node: Self::Node) -> Option<&str>;

    fn previous_sibling(&self, node: Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node>;

    /// Children in document order.
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    /// Creates `new` and inserts it immediately before `reference`.
    fn insert_before(
        &mut self,
        reference: Self::Node,
        new: NewNode,
    ) -> Result<Self::Node, DocumentError>;

    /// Detaches `node` (and its subtree) from the document.
    fn remove(&mut self, node: Self::Node) -> Result<(), DocumentError>;

    /// Tags `node` so that it and its subtree are never scanned again.
    fn mark_processed(&mut self, node: Self::Node) -> Result<(), DocumentError>;

    /// True if `node` or one of its ancestors is tagged processed.
    fn is_processed(&self, node: Self::Node) -> bool;

    /// True if `node` is inside a verbatim/code region.
    fn is_verbatim(&self, node: Self::Node) -> bool;

    /// True if `node` may be handed to the pipeline.
    fn is_candidate(&self, node: Self::Node) -> bool {
        self.is_attached(node)
            && self.unit_kind(node) == UnitKind::Text
            && !self.is_processed(node)
            && !self.is_verbatim(node)
    }

    /// Collects candidate text nodes under `root` (inclusive) in document order.
    ///
    /// Processed and verbatim subtrees are pruned entirely.
    fn discover(&self, root: Self::Node) -> Vec<Self::Node> {
        let mut found = Vec::new();
        if !self.is_attached(root) || self.is_processed(root) || self.is_verbatim(root) {
            return found;
        }

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.is_processed(node) || self.is_verbatim(node) {
                continue;
            }
            if self.unit_kind(node) == UnitKind::Text {
                found.push(node);
            }
            let mut children = self.children(node);
            children.reverse();
            stack.extend(children);
        }
        found
    }
}
