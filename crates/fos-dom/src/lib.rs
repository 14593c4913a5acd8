//! fOS DOM - Document Object Model
//!
//! Arena-backed element tree with attribute storage, structural mutation
//! and mutation observation.

mod node;
mod tree;
mod document;
mod observer;

pub use node::{Attribute, ElementData, Node, NodeData};
pub use tree::{Descendants, DomTree};
pub use document::{Document, ReadyState};
pub use observer::{
    MutationObserverInit, MutationObservers, MutationRecord, MutationType, ObserverId,
};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID
    pub const ROOT: NodeId = NodeId(0);
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check whether this ID refers to a node
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// DOM errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Node {0} does not exist")]
    InvalidNode(NodeId),

    #[error("Node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("Node {child} cannot be inserted into {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    #[error("Node {child} is not a child of {parent}")]
    NotFound { parent: NodeId, child: NodeId },
}
