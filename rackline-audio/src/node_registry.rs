use std::collections::HashMap;
use std::time::Instant;

use rackline_types::NodeId;

/// Lifecycle of a processor's live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Absent,
    Instantiating,
    Live,
    Removing,
    Failed,
}

/// Tracks which node-ids have a live unit behind them, and since when.
pub struct NodeRegistry {
    states: HashMap<NodeId, ProcessorState>,
    created_at: HashMap<NodeId, Instant>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            created_at: HashMap::new(),
        }
    }

    pub fn begin(&mut self, id: NodeId) {
        self.states.insert(id, ProcessorState::Instantiating);
    }

    /// Record that a unit is running under `id`.
    pub fn register(&mut self, id: NodeId) {
        self.states.insert(id, ProcessorState::Live);
        self.created_at.insert(id, Instant::now());
    }

    pub fn mark_failed(&mut self, id: NodeId) {
        self.states.insert(id, ProcessorState::Failed);
        self.created_at.remove(&id);
    }

    pub fn begin_removal(&mut self, id: NodeId) {
        if self.states.contains_key(&id) {
            self.states.insert(id, ProcessorState::Removing);
        }
    }

    /// Forget `id` entirely; it reads as `Absent` afterwards.
    pub fn unregister(&mut self, id: NodeId) {
        self.states.remove(&id);
        self.created_at.remove(&id);
    }

    /// Forget every node (e.g. after the live graph was replaced).
    pub fn invalidate_all(&mut self) {
        self.states.clear();
        self.created_at.clear();
    }

    pub fn state(&self, id: NodeId) -> ProcessorState {
        self.states.get(&id).copied().unwrap_or(ProcessorState::Absent)
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.state(id) == ProcessorState::Live
    }

    pub fn live_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| **s == ProcessorState::Live)
            .count()
    }

    pub fn live_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .states
            .iter()
            .filter(|(_, s)| **s == ProcessorState::Live)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn age(&self, id: NodeId) -> Option<std::time::Duration> {
        self.created_at.get(&id).map(|t| t.elapsed())
    }

    /// Like `is_live`, but logs when the node is not.
    pub fn check_node(&self, id: NodeId) -> bool {
        if self.is_live(id) {
            true
        } else {
            log::warn!(
                target: "sync::nodes",
                "node {} is not live ({:?})",
                id,
                self.state(id)
            );
            false
        }
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
