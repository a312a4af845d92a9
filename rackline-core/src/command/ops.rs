//! Leaf edits. Each one validates against the tree in `perform`, leaves the
//! tree untouched when it returns `false`, and remembers what it needs to
//! reverse itself exactly.

use std::time::Instant;

use rackline_types::{
    connection_node, edge_of_node, props, Connection, DetachedNode, Edge, NodeKey, NodeKind,
    ProjectView, Tree, Value,
};

#[derive(Debug, Clone)]
pub struct AddNode {
    parent: NodeKey,
    index: Option<usize>,
    node: Option<DetachedNode>,
    added: Option<(NodeKey, usize)>,
}

impl AddNode {
    pub fn new(parent: NodeKey, index: Option<usize>, node: DetachedNode) -> Self {
        Self {
            parent,
            index,
            node: Some(node),
            added: None,
        }
    }

    pub fn parent(&self) -> NodeKey {
        self.parent
    }

    /// Key of the attached node once performed.
    pub fn added_key(&self) -> Option<NodeKey> {
        self.added.map(|(k, _)| k)
    }

    pub(crate) fn perform(&mut self, tree: &mut Tree) -> bool {
        let Some(node) = self.node.take() else {
            return false;
        };
        if node.kind == NodeKind::Track
            && node.property(props::IS_MASTER).and_then(Value::as_bool) == Some(true)
            && ProjectView::wrap(tree).and_then(|p| p.master_track()).is_some()
        {
            log::debug!(target: "history", "rejected second master track");
            self.node = Some(node);
            return false;
        }
        match tree.add_child(self.parent, node.clone(), self.index) {
            Ok(key) => {
                let index = tree.index_of(key).unwrap_or(0);
                self.added = Some((key, index));
                true
            }
            Err(e) => {
                log::debug!(target: "history", "add node: {}", e);
                self.node = Some(node);
                false
            }
        }
    }

    pub(crate) fn undo(&mut self, tree: &mut Tree) {
        let Some((key, _)) = self.added.take() else {
            return;
        };
        match tree.remove_child(key) {
            Ok(detached) => self.node = Some(detached),
            Err(e) => log::warn!(target: "history", "undo add node: {}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoveNode {
    key: NodeKey,
    removed: Option<(NodeKey, usize, DetachedNode)>,
}

impl RemoveNode {
    pub fn new(key: NodeKey) -> Self {
        Self { key, removed: None }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub(crate) fn perform(&mut self, tree: &mut Tree) -> bool {
        let (Some(parent), Some(index)) = (tree.parent(self.key), tree.index_of(self.key)) else {
            return false;
        };
        match tree.remove_child(self.key) {
            Ok(detached) => {
                self.removed = Some((parent, index, detached));
                true
            }
            Err(e) => {
                log::debug!(target: "history", "remove node: {}", e);
                false
            }
        }
    }

    pub(crate) fn undo(&mut self, tree: &mut Tree) {
        let Some((parent, index, detached)) = self.removed.take() else {
            return;
        };
        if let Err(e) = tree.add_child(parent, detached, Some(index)) {
            log::warn!(target: "history", "undo remove node: {}", e);
        }
    }
}

/// Reorder a node among its siblings.
#[derive(Debug, Clone)]
pub struct MoveNode {
    key: NodeKey,
    to: usize,
    from: Option<usize>,
}

impl MoveNode {
    pub fn new(key: NodeKey, to: usize) -> Self {
        Self { key, to, from: None }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub(crate) fn perform(&mut self, tree: &mut Tree) -> bool {
        let (Some(parent), Some(from)) = (tree.parent(self.key), tree.index_of(self.key)) else {
            return false;
        };
        if from == self.to || tree.move_child(parent, from, self.to).is_err() {
            return false;
        }
        self.from = Some(from);
        true
    }

    pub(crate) fn undo(&mut self, tree: &mut Tree) {
        let (Some(from), Some(parent)) = (self.from.take(), tree.parent(self.key)) else {
            return;
        };
        if let Err(e) = tree.move_child(parent, self.to, from) {
            log::warn!(target: "history", "undo move node: {}", e);
        }
    }
}

/// Move a node under a different parent, keeping its keys.
#[derive(Debug, Clone)]
pub struct ReparentNode {
    key: NodeKey,
    new_parent: NodeKey,
    index: usize,
    old: Option<(NodeKey, usize)>,
}

impl ReparentNode {
    pub fn new(key: NodeKey, new_parent: NodeKey, index: usize) -> Self {
        Self {
            key,
            new_parent,
            index,
            old: None,
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub(crate) fn perform(&mut self, tree: &mut Tree) -> bool {
        let (Some(parent), Some(index)) = (tree.parent(self.key), tree.index_of(self.key)) else {
            return false;
        };
        if parent == self.new_parent
            || !tree.contains(self.new_parent)
            || tree.descendants(self.key).contains(&self.new_parent)
            || self.index > tree.children(self.new_parent).len()
        {
            return false;
        }
        let Ok(detached) = tree.remove_child(self.key) else {
            return false;
        };
        if let Err(e) = tree.add_child(self.new_parent, detached.clone(), Some(self.index)) {
            log::warn!(target: "history", "reparent: {}", e);
            let _ = tree.add_child(parent, detached, Some(index));
            return false;
        }
        self.old = Some((parent, index));
        true
    }

    pub(crate) fn undo(&mut self, tree: &mut Tree) {
        let Some((parent, index)) = self.old.take() else {
            return;
        };
        match tree.remove_child(self.key) {
            Ok(detached) => {
                if let Err(e) = tree.add_child(parent, detached, Some(index)) {
                    log::warn!(target: "history", "undo reparent: {}", e);
                }
            }
            Err(e) => log::warn!(target: "history", "undo reparent: {}", e),
        }
    }
}

/// Set (or with `None`, remove) one property.
#[derive(Debug, Clone)]
pub struct SetProperty {
    pub(crate) node: NodeKey,
    pub(crate) name: String,
    pub(crate) value: Option<Value>,
    pub(crate) old: Option<Value>,
    pub(crate) at: Instant,
}

impl SetProperty {
    pub fn new(node: NodeKey, name: &str, value: impl Into<Value>) -> Self {
        Self::with_value(node, name, Some(value.into()))
    }

    pub fn remove(node: NodeKey, name: &str) -> Self {
        Self::with_value(node, name, None)
    }

    fn with_value(node: NodeKey, name: &str, value: Option<Value>) -> Self {
        Self {
            node,
            name: name.to_string(),
            value,
            old: None,
            at: Instant::now(),
        }
    }

    pub fn node(&self) -> NodeKey {
        self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn perform(&mut self, tree: &mut Tree) -> bool {
        if !tree.contains(self.node) {
            return false;
        }
        let old = tree.property(self.node, &self.name).cloned();
        if old == self.value {
            return false;
        }
        let ok = match &self.value {
            Some(v) => tree.set_property(self.node, &self.name, v.clone()).is_ok(),
            None => tree.remove_property(self.node, &self.name).is_ok(),
        };
        if ok {
            self.old = old;
        }
        ok
    }

    pub(crate) fn undo(&mut self, tree: &mut Tree) {
        let result = match self.old.clone() {
            Some(v) => tree.set_property(self.node, &self.name, v).map(|_| ()),
            None => tree.remove_property(self.node, &self.name).map(|_| ()),
        };
        if let Err(e) = result {
            log::warn!(target: "history", "undo set property: {}", e);
        }
    }
}

/// Add a Connection node to the project's CONNECTIONS collection.
#[derive(Debug, Clone)]
pub struct CreateConnection {
    pub(crate) edge: Edge,
    pub(crate) custom: bool,
    pub(crate) key: Option<NodeKey>,
    node: Option<DetachedNode>,
}

impl CreateConnection {
    pub fn new(edge: Edge, custom: bool) -> Self {
        Self {
            edge,
            custom,
            key: None,
            node: None,
        }
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }

    pub fn is_custom(&self) -> bool {
        self.custom
    }

    /// Reasons a connection is structurally invalid, checked against the tree.
    pub fn validate(tree: &Tree, edge: &Edge) -> Result<(), &'static str> {
        let project = ProjectView::wrap(tree).ok_or("not a project tree")?;
        if edge.is_self_connection() {
            return Err("self connection");
        }
        if edge.connection_type().is_none() {
            return Err("audio and MIDI pins cannot be joined");
        }
        let source = project
            .processor_by_node_id(edge.source.node)
            .ok_or("unknown source node")?;
        let dest = project
            .processor_by_node_id(edge.dest.node)
            .ok_or("unknown destination node")?;
        if !source.layout().has_output(edge.source.channel) {
            return Err("source has no such output");
        }
        if !dest.layout().has_input(edge.dest.channel) {
            return Err("destination has no such input");
        }
        if project.find_connection(edge).is_some() {
            return Err("connection already exists");
        }
        Ok(())
    }

    pub(crate) fn perform(&mut self, tree: &mut Tree) -> bool {
        if let Err(reason) = Self::validate(tree, &self.edge) {
            log::debug!(target: "history", "rejected connection {}: {}", self.edge, reason);
            return false;
        }
        let Some(parent) = ProjectView::wrap(tree).and_then(|p| p.connections_key()) else {
            return false;
        };
        let node = self
            .node
            .take()
            .unwrap_or_else(|| connection_node(self.edge, self.custom));
        match tree.add_child(parent, node, None) {
            Ok(key) => {
                self.key = Some(key);
                true
            }
            Err(e) => {
                log::debug!(target: "history", "create connection: {}", e);
                false
            }
        }
    }

    pub(crate) fn undo(&mut self, tree: &mut Tree) {
        let Some(key) = self.key.and_then(|k| resolve_connection(tree, k, Some(self.edge))) else {
            log::warn!(target: "history", "undo create connection: {} is gone", self.edge);
            return;
        };
        match tree.remove_child(key) {
            Ok(detached) => {
                self.key = Some(key);
                self.node = Some(detached);
            }
            Err(e) => log::warn!(target: "history", "undo create connection: {}", e),
        }
    }
}

/// The connection node for `key`, or the one now carrying `edge` when a later
/// coalesced edit replaced the node. Edges are unique among connections.
fn resolve_connection(tree: &Tree, key: NodeKey, edge: Option<Edge>) -> Option<NodeKey> {
    match Connection::wrap(tree, key) {
        Some(c) if edge.map_or(true, |e| c.edge() == e) => Some(key),
        _ => {
            let edge = edge?;
            ProjectView::wrap(tree)?.find_connection(&edge).map(|c| c.key())
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeleteConnection {
    pub(crate) key: NodeKey,
    pub(crate) edge: Option<Edge>,
    pub(crate) custom: bool,
    removed: Option<(NodeKey, usize, DetachedNode)>,
}

impl DeleteConnection {
    /// Delete the connection node `key`; its edge is read from the tree now
    /// so merge rules can see it before the command runs.
    pub fn new(tree: &Tree, key: NodeKey) -> Self {
        let connection = Connection::wrap(tree, key);
        Self {
            key,
            edge: connection.map(|c| c.edge()),
            custom: connection.map(|c| c.is_custom()).unwrap_or(false),
            removed: None,
        }
    }

    pub fn for_edge(tree: &Tree, edge: &Edge) -> Option<Self> {
        let key = ProjectView::wrap(tree)?.find_connection(edge)?.key();
        Some(Self::new(tree, key))
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn edge(&self) -> Option<Edge> {
        self.edge
    }

    pub fn is_custom(&self) -> bool {
        self.custom
    }

    pub(crate) fn perform(&mut self, tree: &mut Tree) -> bool {
        let Some(key) = resolve_connection(tree, self.key, self.edge) else {
            return false;
        };
        self.key = key;
        let (Some(parent), Some(index)) = (tree.parent(self.key), tree.index_of(self.key)) else {
            return false;
        };
        match tree.remove_child(self.key) {
            Ok(detached) => {
                if self.edge.is_none() {
                    self.edge = edge_of_node(&detached);
                }
                self.removed = Some((parent, index, detached));
                true
            }
            Err(e) => {
                log::debug!(target: "history", "delete connection: {}", e);
                false
            }
        }
    }

    pub(crate) fn undo(&mut self, tree: &mut Tree) {
        let Some((parent, index, detached)) = self.removed.take() else {
            return;
        };
        let index = index.min(tree.children(parent).len());
        if let Err(e) = tree.add_child(parent, detached, Some(index)) {
            log::warn!(target: "history", "undo delete connection: {}", e);
        }
    }
}
