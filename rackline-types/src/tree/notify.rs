//! Change notification for the document tree.
//!
//! One typed event enum, one listener capability. Listeners are held weakly so
//! a component that is dropped stops receiving events even if it forgot to
//! unregister.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::{DetachedNode, NodeKey, Tree};
use crate::Value;

/// Something that changed in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    /// `child` was inserted under `parent` at `index` (subtree already attached).
    NodeAdded {
        parent: NodeKey,
        child: NodeKey,
        index: usize,
    },
    /// `child` is about to be detached. Sent while the subtree is still readable,
    /// so the live graph can be torn down before the node disappears.
    WillRemove {
        parent: NodeKey,
        child: NodeKey,
        index: usize,
    },
    /// `child` was detached; the event carries the removed subtree.
    NodeRemoved {
        parent: NodeKey,
        child: DetachedNode,
        index: usize,
    },
    /// A child of `parent` moved from `from` to `to`.
    OrderChanged {
        parent: NodeKey,
        from: usize,
        to: usize,
    },
    /// Property `name` of `node` changed; `old` is `None` when it was unset.
    PropertyChanged {
        node: NodeKey,
        name: String,
        old: Option<Value>,
    },
}

impl TreeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TreeEvent::NodeAdded { .. } => "node-added",
            TreeEvent::WillRemove { .. } => "will-remove",
            TreeEvent::NodeRemoved { .. } => "node-removed",
            TreeEvent::OrderChanged { .. } => "order-changed",
            TreeEvent::PropertyChanged { .. } => "property-changed",
        }
    }
}

/// Capability interface for tree observers.
///
/// The listener gets the tree mutably and may issue further edits. Those edits
/// are dispatched immediately to every other listener; the listener that made
/// them is still borrowed for the outer event and does not see them.
pub trait TreeListener {
    fn on_tree_event(&mut self, tree: &mut Tree, event: &TreeEvent);
}

pub type SharedListener = Rc<RefCell<dyn TreeListener>>;

/// Stable identity of a registration, valid until `remove_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    listener: Weak<RefCell<dyn TreeListener>>,
}

#[derive(Default)]
pub(crate) struct ListenerList {
    entries: Vec<Entry>,
    next_id: u64,
}

impl ListenerList {
    pub(crate) fn add(&mut self, listener: &SharedListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            listener: Rc::downgrade(listener),
        });
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Live listeners in registration order; dead registrations are pruned.
    pub(crate) fn snapshot(&mut self) -> Vec<(ListenerId, SharedListener)> {
        self.entries.retain(|e| e.listener.strong_count() > 0);
        self.entries
            .iter()
            .filter_map(|e| e.listener.upgrade().map(|l| (e.id, l)))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.listener.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.len())
            .finish()
    }
}
