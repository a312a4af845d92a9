//! Live graph abstraction.
//!
//! `LiveGraph` is the seam between the document side and whatever actually
//! renders audio. `ProcessGraph` keeps the topology in-process behind one
//! coarse mutex, so a render thread is locked out for the duration of a
//! structural change. `RecordingGraph` wraps it and records every accepted
//! operation for assertions in tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rackline_types::{ChannelLayout, Edge, NodeId};

use crate::unit::ProcessingUnit;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("node {0} is already in the graph")]
    DuplicateNode(NodeId),
    #[error("node {0} is not in the graph")]
    UnknownNode(NodeId),
    #[error("connection {0} connects a node to itself")]
    SelfConnection(Edge),
    #[error("connection {0} joins an audio pin to a MIDI pin")]
    KindMismatch(Edge),
    #[error("node {node} has no output pin {channel}")]
    NoSuchOutput { node: NodeId, channel: u32 },
    #[error("node {node} has no input pin {channel}")]
    NoSuchInput { node: NodeId, channel: u32 },
    #[error("connection {0} already exists")]
    DuplicateConnection(Edge),
    #[error("connection {0} does not exist")]
    MissingConnection(Edge),
}

pub type GraphResult<T = ()> = Result<T, GraphError>;

pub trait LiveGraph: Send + Sync {
    fn add_node(&self, id: NodeId, unit: Box<dyn ProcessingUnit>) -> GraphResult;

    /// Remove a node and every edge touching it; returns the unit.
    fn remove_node(&self, id: NodeId) -> GraphResult<Box<dyn ProcessingUnit>>;

    fn has_node(&self, id: NodeId) -> bool;

    fn add_connection(&self, edge: Edge) -> GraphResult;

    fn remove_connection(&self, edge: Edge) -> GraphResult;

    fn check_connection(&self, edge: &Edge) -> GraphResult;

    fn is_connection_legal(&self, edge: &Edge) -> bool {
        self.check_connection(edge).is_ok()
    }

    fn connections(&self) -> Vec<Edge>;

    fn set_bypassed(&self, id: NodeId, bypassed: bool) -> GraphResult;

    /// Run `f` against the unit under `id` while holding the graph lock.
    fn with_unit(&self, id: NodeId, f: &mut dyn FnMut(&mut dyn ProcessingUnit)) -> GraphResult;

    fn node_ids(&self) -> Vec<NodeId>;

    /// Bumped on every accepted structural change.
    fn revision(&self) -> u64;
}

struct GraphNode {
    unit: Box<dyn ProcessingUnit>,
    layout: ChannelLayout,
    bypassed: bool,
}

#[derive(Default)]
struct Topology {
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: BTreeSet<Edge>,
}

impl Topology {
    fn check(&self, edge: &Edge) -> GraphResult {
        if edge.is_self_connection() {
            return Err(GraphError::SelfConnection(*edge));
        }
        if edge.connection_type().is_none() {
            return Err(GraphError::KindMismatch(*edge));
        }
        let source = self
            .nodes
            .get(&edge.source.node)
            .ok_or(GraphError::UnknownNode(edge.source.node))?;
        let dest = self
            .nodes
            .get(&edge.dest.node)
            .ok_or(GraphError::UnknownNode(edge.dest.node))?;
        if !source.layout.has_output(edge.source.channel) {
            return Err(GraphError::NoSuchOutput {
                node: edge.source.node,
                channel: edge.source.channel,
            });
        }
        if !dest.layout.has_input(edge.dest.channel) {
            return Err(GraphError::NoSuchInput {
                node: edge.dest.node,
                channel: edge.dest.channel,
            });
        }
        if self.edges.contains(edge) {
            return Err(GraphError::DuplicateConnection(*edge));
        }
        Ok(())
    }
}

/// In-process graph topology.
#[derive(Default)]
pub struct ProcessGraph {
    topology: Mutex<Topology>,
    revision: AtomicU64,
    edge_changes: AtomicU64,
}

impl ProcessGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accepted connection adds and removes so far.
    pub fn edge_changes(&self) -> u64 {
        self.edge_changes.load(Ordering::Relaxed)
    }

    pub fn is_bypassed(&self, id: NodeId) -> Option<bool> {
        self.topology.lock().nodes.get(&id).map(|n| n.bypassed)
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::Relaxed);
    }
}

impl LiveGraph for ProcessGraph {
    fn add_node(&self, id: NodeId, unit: Box<dyn ProcessingUnit>) -> GraphResult {
        let mut topology = self.topology.lock();
        if topology.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        let layout = unit.layout();
        topology.nodes.insert(
            id,
            GraphNode {
                unit,
                layout,
                bypassed: false,
            },
        );
        self.bump();
        Ok(())
    }

    fn remove_node(&self, id: NodeId) -> GraphResult<Box<dyn ProcessingUnit>> {
        let mut topology = self.topology.lock();
        let node = topology.nodes.remove(&id).ok_or(GraphError::UnknownNode(id))?;
        let before = topology.edges.len();
        topology
            .edges
            .retain(|e| e.source.node != id && e.dest.node != id);
        let dropped = (before - topology.edges.len()) as u64;
        self.edge_changes.fetch_add(dropped, Ordering::Relaxed);
        self.bump();
        Ok(node.unit)
    }

    fn has_node(&self, id: NodeId) -> bool {
        self.topology.lock().nodes.contains_key(&id)
    }

    fn add_connection(&self, edge: Edge) -> GraphResult {
        let mut topology = self.topology.lock();
        topology.check(&edge)?;
        topology.edges.insert(edge);
        self.edge_changes.fetch_add(1, Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    fn remove_connection(&self, edge: Edge) -> GraphResult {
        let mut topology = self.topology.lock();
        if !topology.edges.remove(&edge) {
            return Err(GraphError::MissingConnection(edge));
        }
        self.edge_changes.fetch_add(1, Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    fn check_connection(&self, edge: &Edge) -> GraphResult {
        self.topology.lock().check(edge)
    }

    fn connections(&self) -> Vec<Edge> {
        self.topology.lock().edges.iter().copied().collect()
    }

    fn set_bypassed(&self, id: NodeId, bypassed: bool) -> GraphResult {
        let mut topology = self.topology.lock();
        let node = topology.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        node.bypassed = bypassed;
        node.unit.set_bypassed(bypassed);
        Ok(())
    }

    fn with_unit(&self, id: NodeId, f: &mut dyn FnMut(&mut dyn ProcessingUnit)) -> GraphResult {
        let mut topology = self.topology.lock();
        let node = topology.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        f(node.unit.as_mut());
        Ok(())
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.topology.lock().nodes.keys().copied().collect()
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::Relaxed)
    }
}

/// A graph operation that was accepted, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphOp {
    AddNode(NodeId),
    RemoveNode(NodeId),
    Connect(Edge),
    Disconnect(Edge),
    Bypass(NodeId, bool),
}

/// A `ProcessGraph` that records accepted operations.
#[derive(Default)]
pub struct RecordingGraph {
    inner: ProcessGraph,
    ops: Mutex<Vec<GraphOp>>,
}

impl RecordingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> Vec<GraphOp> {
        self.ops.lock().clone()
    }

    pub fn clear(&self) {
        self.ops.lock().clear();
    }

    pub fn count<F: Fn(&GraphOp) -> bool>(&self, f: F) -> usize {
        self.ops.lock().iter().filter(|op| f(op)).count()
    }

    /// Position of the first recorded op matching `f`.
    pub fn position<F: Fn(&GraphOp) -> bool>(&self, f: F) -> Option<usize> {
        self.ops.lock().iter().position(f)
    }

    pub fn inner(&self) -> &ProcessGraph {
        &self.inner
    }

    fn record<T>(&self, result: GraphResult<T>, op: GraphOp) -> GraphResult<T> {
        if result.is_ok() {
            self.ops.lock().push(op);
        }
        result
    }
}

impl LiveGraph for RecordingGraph {
    fn add_node(&self, id: NodeId, unit: Box<dyn ProcessingUnit>) -> GraphResult {
        self.record(self.inner.add_node(id, unit), GraphOp::AddNode(id))
    }

    fn remove_node(&self, id: NodeId) -> GraphResult<Box<dyn ProcessingUnit>> {
        self.record(self.inner.remove_node(id), GraphOp::RemoveNode(id))
    }

    fn has_node(&self, id: NodeId) -> bool {
        self.inner.has_node(id)
    }

    fn add_connection(&self, edge: Edge) -> GraphResult {
        self.record(self.inner.add_connection(edge), GraphOp::Connect(edge))
    }

    fn remove_connection(&self, edge: Edge) -> GraphResult {
        self.record(self.inner.remove_connection(edge), GraphOp::Disconnect(edge))
    }

    fn check_connection(&self, edge: &Edge) -> GraphResult {
        self.inner.check_connection(edge)
    }

    fn connections(&self) -> Vec<Edge> {
        self.inner.connections()
    }

    fn set_bypassed(&self, id: NodeId, bypassed: bool) -> GraphResult {
        self.record(self.inner.set_bypassed(id, bypassed), GraphOp::Bypass(id, bypassed))
    }

    fn with_unit(&self, id: NodeId, f: &mut dyn FnMut(&mut dyn ProcessingUnit)) -> GraphResult {
        self.inner.with_unit(id, f)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.inner.node_ids()
    }

    fn revision(&self) -> u64 {
        self.inner.revision()
    }
}
