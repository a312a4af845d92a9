//! # rackline-types
//!
//! Shared data structures for the Rackline project core: the observable
//! document tree, its change-notification protocol, and the typed views
//! (tracks, processors, connections, channels) layered over raw tree nodes.
//!
//! Nothing in this crate talks to an audio engine. `rackline-audio` mirrors the
//! tree into a live graph and `rackline-core` edits it through commands.

pub mod state;
pub mod tree;
mod value;

pub use state::*;
pub use tree::{
    DetachedNode, ListenerId, NodeKey, NodeKind, SharedListener, Tree, TreeError, TreeEvent,
    TreeListener, TreeResult,
};
pub use value::Value;

use std::cell::Cell;
use std::rc::Rc;

/// Numeric handle identifying a processor instance inside the live graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Project-wide node-id allocator. Cloning yields a handle onto the same counter,
/// so the project and the graph synchronizer never hand out the same id twice.
#[derive(Debug, Clone)]
pub struct NodeIdAllocator {
    next: Rc<Cell<u32>>,
}

impl NodeIdAllocator {
    /// Ids start at 1; 0 is never a valid node-id.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u32) -> Self {
        Self {
            next: Rc::new(Cell::new(first.max(1))),
        }
    }

    pub fn allocate(&self) -> NodeId {
        let id = self.next.get();
        self.next.set(id + 1);
        NodeId(id)
    }

    /// Make sure future allocations never collide with `id` (used after loading).
    pub fn reserve(&self, id: NodeId) {
        if id.0 >= self.next.get() {
            self.next.set(id.0 + 1);
        }
    }

    pub fn peek(&self) -> NodeId {
        NodeId(self.next.get())
    }
}

impl Default for NodeIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
