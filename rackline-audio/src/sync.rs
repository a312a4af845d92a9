//! Keeps a [`LiveGraph`] in step with the project tree.
//!
//! `GraphSync` is registered as a tree listener. Processor nodes become live
//! units when they are attached and are torn down on `WillRemove`, before the
//! node leaves the tree. Connection nodes become live edges. While paused,
//! edge changes are buffered and only their net effect is applied on resume,
//! so a burst of edits (a drag preview, a re-route) touches the graph once.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rackline_types::{
    encode_state, props, ChannelLayout, Connection, DetachedNode, Edge, NodeId,
    NodeIdAllocator, NodeKey, NodeKind, Processor, Tree, TreeEvent, TreeListener,
};

use crate::graph::LiveGraph;
use crate::node_registry::{NodeRegistry, ProcessorState};
use crate::param::{AdaptiveInterval, ParameterCell};
use crate::unit::PluginFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingEdge {
    Add(Edge),
    Remove(Edge),
}

pub struct GraphSync {
    graph: Arc<dyn LiveGraph>,
    factory: Rc<dyn PluginFactory>,
    allocator: NodeIdAllocator,
    registry: NodeRegistry,
    cells: HashMap<NodeId, Vec<Arc<ParameterCell>>>,
    pause_depth: u32,
    pending: Vec<PendingEdge>,
    interval: AdaptiveInterval,
    last_flush: Option<Instant>,
}

impl GraphSync {
    pub fn new(
        graph: Arc<dyn LiveGraph>,
        factory: Rc<dyn PluginFactory>,
        allocator: NodeIdAllocator,
    ) -> Self {
        Self {
            graph,
            factory,
            allocator,
            registry: NodeRegistry::new(),
            cells: HashMap::new(),
            pause_depth: 0,
            pending: Vec::new(),
            interval: AdaptiveInterval::default(),
            last_flush: None,
        }
    }

    pub fn with_flush_interval(mut self, min: Duration, max: Duration) -> Self {
        self.interval = AdaptiveInterval::new(min, max);
        self
    }

    pub fn graph(&self) -> &Arc<dyn LiveGraph> {
        &self.graph
    }

    /// Bring the live graph up to date with everything already in `tree`
    /// (used after loading, before the listener sees any edits).
    pub fn attach(&mut self, tree: &mut Tree) {
        let root = tree.root();
        let processors = processors_under(tree, root);
        for key in &processors {
            self.instantiate(tree, *key);
        }
        for key in tree.find_kind(NodeKind::Connection) {
            if let Some(edge) = Connection::wrap(tree, key).map(|c| c.edge()) {
                self.add_edge(edge);
            }
        }
        log::info!(
            target: "sync",
            "attached {} processors, {} live",
            processors.len(),
            self.registry.live_count()
        );
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.registry.is_live(id)
    }

    pub fn state_of(&self, id: NodeId) -> ProcessorState {
        self.registry.state(id)
    }

    pub fn live_node_count(&self) -> usize {
        self.registry.live_count()
    }

    pub fn parameter_cell(&self, id: NodeId, index: usize) -> Option<Arc<ParameterCell>> {
        self.cells.get(&id)?.get(index).cloned()
    }

    // ── Pause / diff ────────────────────────────────────────────

    pub fn pause(&mut self) {
        self.pause_depth += 1;
        log::debug!(target: "sync", "paused (depth {})", self.pause_depth);
    }

    /// Leave one pause level; the outermost resume applies the net edge diff.
    pub fn resume(&mut self) {
        if self.pause_depth == 0 {
            log::warn!(target: "sync", "resume without matching pause");
            return;
        }
        self.pause_depth -= 1;
        if self.pause_depth > 0 {
            return;
        }
        let mut net: BTreeMap<Edge, i32> = BTreeMap::new();
        for op in self.pending.drain(..) {
            match op {
                PendingEdge::Add(edge) => *net.entry(edge).or_default() += 1,
                PendingEdge::Remove(edge) => *net.entry(edge).or_default() -= 1,
            }
        }
        let (removes, adds): (Vec<_>, Vec<_>) = net
            .into_iter()
            .filter(|(_, n)| *n != 0)
            .partition(|(_, n)| *n < 0);
        log::debug!(
            target: "sync",
            "resumed: {} removes, {} adds after diff",
            removes.len(),
            adds.len()
        );
        for (edge, _) in removes {
            self.apply_remove(edge);
        }
        for (edge, _) in adds {
            self.apply_add(edge);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause_depth > 0
    }

    // ── Parameters and state ────────────────────────────────────

    /// Copy render-side parameter changes into the tree. Returns how many
    /// Parameter nodes were updated.
    pub fn flush_parameters(&mut self, tree: &mut Tree) -> usize {
        let mut updates = Vec::new();
        for (id, cells) in &self.cells {
            for (index, cell) in cells.iter().enumerate() {
                if let Some(value) = cell.take_update() {
                    updates.push((*id, index, value));
                }
            }
        }
        let mut written = 0;
        for (id, index, value) in updates {
            let Some(processor) = processor_key(tree, id) else {
                continue;
            };
            let Some(param) = parameter_key(tree, processor, index) else {
                continue;
            };
            if matches!(tree.set_property(param, props::VALUE, value as f64), Ok(true)) {
                written += 1;
            }
        }
        if written > 0 {
            log::trace!(target: "sync::params", "flushed {} parameter values", written);
        }
        written
    }

    /// Run `flush_parameters` when the adaptive interval has elapsed.
    pub fn poll(&mut self, tree: &mut Tree, now: Instant) -> usize {
        if let Some(last) = self.last_flush {
            if now.saturating_duration_since(last) < self.interval.current() {
                return 0;
            }
        }
        let written = self.flush_parameters(tree);
        self.interval.record(written > 0);
        self.last_flush = Some(now);
        written
    }

    pub fn flush_interval(&self) -> Duration {
        self.interval.current()
    }

    /// Write each live unit's serialized state into its processor's `state`.
    pub fn capture_state(&mut self, tree: &mut Tree) -> usize {
        let mut captured = 0;
        for key in tree.find_kind(NodeKind::Processor) {
            let Some(id) = Processor::wrap(tree, key).and_then(|p| p.node_id()) else {
                continue;
            };
            if self.capture_one(tree, key, id) {
                captured += 1;
            }
        }
        captured
    }

    fn capture_one(&self, tree: &mut Tree, key: NodeKey, id: NodeId) -> bool {
        if !self.registry.is_live(id) {
            return false;
        }
        let mut blob = None;
        if self
            .graph
            .with_unit(id, &mut |unit| blob = Some(unit.serialize()))
            .is_err()
        {
            return false;
        }
        match blob {
            Some(bytes) => tree.set_property(key, props::STATE, encode_state(&bytes)).is_ok(),
            None => false,
        }
    }

    // ── Processors ──────────────────────────────────────────────

    fn instantiate(&mut self, tree: &mut Tree, key: NodeKey) {
        let Some(processor) = Processor::wrap(tree, key) else {
            return;
        };
        let identifier = processor.identifier().to_string();
        let state = processor.state_blob();
        let bypassed = processor.is_bypassed();
        let id = match processor.node_id() {
            Some(id) => {
                self.allocator.reserve(id);
                id
            }
            None => {
                let id = self.allocator.allocate();
                if let Err(e) = tree.set_property(key, props::NODE_ID, id.get()) {
                    log::warn!(target: "sync", "could not assign node-id: {}", e);
                    return;
                }
                id
            }
        };
        if self.registry.state(id) != ProcessorState::Absent {
            log::warn!(
                target: "sync",
                "node {} already {:?}, not instantiating '{}' again",
                id,
                self.registry.state(id),
                identifier
            );
            return;
        }

        self.registry.begin(id);
        let mut unit = match self.factory.instantiate(&identifier) {
            Ok(unit) => unit,
            Err(e) => {
                log::warn!(target: "sync", "node {}: {}", id, e);
                self.registry.mark_failed(id);
                return;
            }
        };
        if let Some(blob) = state {
            if let Err(e) = unit.restore(&blob) {
                log::warn!(target: "sync", "node {}: {}", id, e);
            }
        }
        unit.set_bypassed(bypassed);

        let layout = unit.layout();
        let infos = unit.parameters();
        let mut cells = Vec::with_capacity(infos.len());
        for index in 0..infos.len() {
            let value = unit.parameter(index).unwrap_or(0.0);
            cells.push(Arc::new(ParameterCell::new(value)));
        }
        unit.bind_parameters(&cells);

        if let Err(e) = self.graph.add_node(id, unit) {
            log::warn!(target: "sync", "node {}: {}", id, e);
            self.registry.mark_failed(id);
            return;
        }
        if bypassed {
            let _ = self.graph.set_bypassed(id, true);
        }
        self.registry.register(id);
        log::debug!(target: "sync", "node {} live ({})", id, identifier);

        if ChannelLayout::from_tree(tree, key) != layout {
            self.regenerate_channels(tree, key, layout);
        }
        self.sync_parameters(tree, key, id, &infos, &cells);
        self.cells.insert(id, cells);

        // Edges already in the tree (undo of a delete restores the processor
        // after its connections are gone, redo the other way round).
        let existing: Vec<Edge> = tree
            .find_kind(NodeKind::Connection)
            .into_iter()
            .filter_map(|c| Connection::wrap(tree, c))
            .filter(|c| c.touches(id))
            .map(|c| c.edge())
            .collect();
        let live = self.graph.connections();
        for edge in existing {
            let other = if edge.source.node == id {
                edge.dest.node
            } else {
                edge.source.node
            };
            if self.registry.is_live(other) && !live.contains(&edge) {
                self.add_edge(edge);
            }
        }
    }

    fn regenerate_channels(&self, tree: &mut Tree, key: NodeKey, layout: ChannelLayout) {
        for channel in tree.children_of_kind(key, NodeKind::Channel) {
            let _ = tree.remove_child(channel);
        }
        for (index, node) in layout.channel_nodes().into_iter().enumerate() {
            let _ = tree.add_child(key, node, Some(index));
        }
        let _ = tree.set_property(key, props::ACCEPTS_MIDI, layout.accepts_midi);
        let _ = tree.set_property(key, props::PRODUCES_MIDI, layout.produces_midi);
        log::debug!(target: "sync", "regenerated channels for {}", key);
    }

    /// Parameter nodes already in the tree win over unit defaults; missing
    /// ones are created from the unit.
    fn sync_parameters(
        &self,
        tree: &mut Tree,
        key: NodeKey,
        id: NodeId,
        infos: &[crate::unit::ParameterInfo],
        cells: &[Arc<ParameterCell>],
    ) {
        for (index, info) in infos.iter().enumerate() {
            match parameter_key(tree, key, index) {
                Some(param) => {
                    if let Some(value) = tree.get_float(param, props::VALUE) {
                        let value = value as f32;
                        let _ = self
                            .graph
                            .with_unit(id, &mut |unit| unit.set_parameter(index, value));
                        if let Some(cell) = cells.get(index) {
                            cell.store(value);
                        }
                    }
                }
                None => {
                    let value = cells.get(index).map(|c| c.value()).unwrap_or(info.default);
                    let node = DetachedNode::new(NodeKind::Parameter)
                        .with(props::INDEX, index as i64)
                        .with(props::NAME, info.name.as_str())
                        .with(props::VALUE, value as f64);
                    let _ = tree.add_child(key, node, None);
                }
            }
        }
    }

    fn teardown(&mut self, id: NodeId) {
        match self.registry.state(id) {
            ProcessorState::Absent => return,
            ProcessorState::Failed | ProcessorState::Instantiating => {
                self.registry.unregister(id);
                return;
            }
            _ => {}
        }
        self.registry.begin_removal(id);
        self.pending.retain(|op| match op {
            PendingEdge::Add(e) | PendingEdge::Remove(e) => {
                e.source.node != id && e.dest.node != id
            }
        });
        for edge in self.graph.connections() {
            if edge.source.node == id || edge.dest.node == id {
                self.apply_remove(edge);
            }
        }
        if let Err(e) = self.graph.remove_node(id) {
            log::warn!(target: "sync", "node {}: {}", id, e);
        }
        self.cells.remove(&id);
        self.registry.unregister(id);
        log::debug!(target: "sync", "node {} torn down", id);
    }

    // ── Edges ───────────────────────────────────────────────────

    fn add_edge(&mut self, edge: Edge) {
        if self.is_paused() {
            self.pending.push(PendingEdge::Add(edge));
        } else {
            self.apply_add(edge);
        }
    }

    fn remove_edge(&mut self, edge: Edge) {
        if self.is_paused() {
            self.pending.push(PendingEdge::Remove(edge));
        } else {
            self.apply_remove(edge);
        }
    }

    fn apply_add(&self, edge: Edge) {
        for node in [edge.source.node, edge.dest.node] {
            if !self.registry.is_live(node) {
                log::debug!(target: "sync", "skipping {}: node {} not live", edge, node);
                return;
            }
        }
        if let Err(e) = self.graph.add_connection(edge) {
            log::warn!(target: "sync", "rejected {}: {}", edge, e);
        }
    }

    fn apply_remove(&self, edge: Edge) {
        if let Err(e) = self.graph.remove_connection(edge) {
            log::debug!(target: "sync", "remove {}: {}", edge, e);
        }
    }

    // ── Property forwarding ─────────────────────────────────────

    fn property_changed(&mut self, tree: &mut Tree, node: NodeKey, name: &str) {
        match (tree.kind(node), name) {
            (Some(NodeKind::Processor), props::BYPASSED) => {
                let Some(processor) = Processor::wrap(tree, node) else {
                    return;
                };
                let Some(id) = processor.node_id() else {
                    return;
                };
                if self.registry.check_node(id) {
                    let _ = self.graph.set_bypassed(id, processor.is_bypassed());
                }
            }
            (Some(NodeKind::Parameter), props::VALUE) => {
                let Some(parent) = tree.parent(node) else {
                    return;
                };
                let Some(id) = Processor::wrap(tree, parent).and_then(|p| p.node_id()) else {
                    return;
                };
                let index = tree.get_int(node, props::INDEX).unwrap_or(-1);
                let value = tree.get_float(node, props::VALUE);
                let (Ok(index), Some(value)) = (usize::try_from(index), value) else {
                    return;
                };
                if !self.registry.is_live(id) {
                    return;
                }
                let value = value as f32;
                let _ = self
                    .graph
                    .with_unit(id, &mut |unit| unit.set_parameter(index, value));
                if let Some(cell) = self.parameter_cell(id, index) {
                    cell.store(value);
                }
            }
            _ => {}
        }
    }
}

impl TreeListener for GraphSync {
    fn on_tree_event(&mut self, tree: &mut Tree, event: &TreeEvent) {
        match event {
            TreeEvent::NodeAdded { child, .. } => {
                for key in processors_under(tree, *child) {
                    self.instantiate(tree, key);
                }
                let edges: Vec<Edge> = tree
                    .descendants(*child)
                    .into_iter()
                    .filter_map(|k| Connection::wrap(tree, k))
                    .map(|c| c.edge())
                    .collect();
                for edge in edges {
                    self.add_edge(edge);
                }
            }
            TreeEvent::WillRemove { child, .. } => {
                let descendants = tree.descendants(*child);
                for key in &descendants {
                    if let Some(edge) = Connection::wrap(tree, *key).map(|c| c.edge()) {
                        self.remove_edge(edge);
                    }
                }
                for key in descendants {
                    let Some(id) = Processor::wrap(tree, key).and_then(|p| p.node_id()) else {
                        continue;
                    };
                    self.capture_one(tree, key, id);
                    self.teardown(id);
                }
            }
            TreeEvent::PropertyChanged { node, name, .. } => {
                self.property_changed(tree, *node, name);
            }
            TreeEvent::NodeRemoved { .. } | TreeEvent::OrderChanged { .. } => {}
        }
    }
}

fn processors_under(tree: &Tree, key: NodeKey) -> Vec<NodeKey> {
    tree.descendants(key)
        .into_iter()
        .filter(|k| tree.kind(*k) == Some(NodeKind::Processor))
        .collect()
}

fn processor_key(tree: &Tree, id: NodeId) -> Option<NodeKey> {
    tree.find_kind(NodeKind::Processor)
        .into_iter()
        .find(|k| Processor::wrap(tree, *k).and_then(|p| p.node_id()) == Some(id))
}

fn parameter_key(tree: &Tree, processor: NodeKey, index: usize) -> Option<NodeKey> {
    tree.children_of_kind(processor, NodeKind::Parameter)
        .into_iter()
        .find(|p| tree.get_int(*p, props::INDEX) == Some(index as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphOp, RecordingGraph};
    use crate::unit::{builtin, BuiltinFactory};
    use rackline_types::{
        connection_node, processor_node, Endpoint, PluginDescription, SharedListener,
    };
    use std::cell::RefCell;

    struct Fixture {
        tree: Tree,
        graph: Arc<RecordingGraph>,
        sync: Rc<RefCell<GraphSync>>,
        factory: Rc<BuiltinFactory>,
        allocator: NodeIdAllocator,
    }

    impl Fixture {
        fn new() -> Self {
            let mut tree = Tree::new(NodeKind::Project);
            let graph = Arc::new(RecordingGraph::new());
            let factory = Rc::new(BuiltinFactory::new());
            let allocator = NodeIdAllocator::new();
            let sync = Rc::new(RefCell::new(GraphSync::new(
                graph.clone(),
                factory.clone(),
                allocator.clone(),
            )));
            let shared: SharedListener = sync.clone();
            tree.add_listener(&shared);
            Self {
                tree,
                graph,
                sync,
                factory,
                allocator,
            }
        }

        fn add(&mut self, identifier: &str) -> (NodeKey, NodeId) {
            let desc = self.factory.describe(identifier).unwrap();
            let id = self.allocator.allocate();
            let root = self.tree.root();
            let key = self
                .tree
                .add_child(root, processor_node(&desc, id, 0), None)
                .unwrap();
            (key, id)
        }

        fn connect(&mut self, edge: Edge) -> NodeKey {
            let root = self.tree.root();
            self.tree
                .add_child(root, connection_node(edge, true), None)
                .unwrap()
        }
    }

    fn audio(a: NodeId, b: NodeId) -> Edge {
        Edge::new(Endpoint::new(a, 0), Endpoint::new(b, 0))
    }

    #[test]
    fn processor_lifecycle_follows_tree() {
        let mut fx = Fixture::new();
        let (key, id) = fx.add(builtin::GAIN);
        assert!(fx.sync.borrow().is_live(id));
        assert_eq!(fx.tree.children_of_kind(key, NodeKind::Parameter).len(), 1);

        let detached = fx.tree.remove_child(key).unwrap();
        assert_eq!(fx.sync.borrow().state_of(id), ProcessorState::Absent);
        assert!(!fx.graph.has_node(id));
        // State was captured into the node before it left the tree.
        assert!(detached.property(props::STATE).is_some());
    }

    #[test]
    fn failed_instantiation_keeps_node() {
        let mut fx = Fixture::new();
        let layout = ChannelLayout::new(2, 2, false, false);
        let desc = PluginDescription::new("missing.plugin", "Gone", layout);
        let id = fx.allocator.allocate();
        let root = fx.tree.root();
        let key = fx.tree.add_child(root, processor_node(&desc, id, 0), None).unwrap();
        assert!(fx.tree.contains(key));
        assert_eq!(fx.sync.borrow().state_of(id), ProcessorState::Failed);
        assert!(!fx.sync.borrow().is_live(id));

        fx.tree.remove_child(key).unwrap();
        assert_eq!(fx.sync.borrow().state_of(id), ProcessorState::Absent);
    }

    #[test]
    fn connections_become_edges_and_go_before_the_node() {
        let mut fx = Fixture::new();
        let (_, a) = fx.add(builtin::AUDIO_INPUT);
        let (gain, b) = fx.add(builtin::GAIN);
        fx.connect(audio(a, b));
        assert_eq!(fx.graph.connections(), vec![audio(a, b)]);

        fx.tree.remove_child(gain).unwrap();
        let disconnect = fx
            .graph
            .position(|op| *op == GraphOp::Disconnect(audio(a, b)))
            .unwrap();
        let remove = fx
            .graph
            .position(|op| *op == GraphOp::RemoveNode(b))
            .unwrap();
        assert!(disconnect < remove);
    }

    #[test]
    fn invalid_edge_is_ignored() {
        let mut fx = Fixture::new();
        let (_, a) = fx.add(builtin::AUDIO_OUTPUT);
        let (_, b) = fx.add(builtin::GAIN);
        // The output unit has no output pins.
        fx.connect(audio(a, b));
        assert!(fx.graph.connections().is_empty());
    }

    #[test]
    fn pause_applies_net_diff() {
        let mut fx = Fixture::new();
        let (_, a) = fx.add(builtin::AUDIO_INPUT);
        let (_, b) = fx.add(builtin::GAIN);
        let changes = fx.graph.inner().edge_changes();

        fx.sync.borrow_mut().pause();
        for _ in 0..2 {
            let c = fx.connect(audio(a, b));
            fx.tree.remove_child(c).unwrap();
        }
        fx.connect(Edge::new(Endpoint::new(a, 1), Endpoint::new(b, 1)));
        assert!(fx.graph.connections().is_empty());
        fx.sync.borrow_mut().resume();

        assert_eq!(fx.graph.inner().edge_changes(), changes + 1);
        assert_eq!(fx.graph.connections().len(), 1);
    }

    #[test]
    fn nested_pause_waits_for_outermost_resume() {
        let mut fx = Fixture::new();
        let (_, a) = fx.add(builtin::AUDIO_INPUT);
        let (_, b) = fx.add(builtin::GAIN);
        fx.sync.borrow_mut().pause();
        fx.sync.borrow_mut().pause();
        fx.connect(audio(a, b));
        fx.sync.borrow_mut().resume();
        assert!(fx.graph.connections().is_empty());
        fx.sync.borrow_mut().resume();
        assert_eq!(fx.graph.connections().len(), 1);
    }

    #[test]
    fn bypass_and_parameter_values_are_forwarded() {
        let mut fx = Fixture::new();
        let (key, id) = fx.add(builtin::GAIN);
        fx.tree.set_property(key, props::BYPASSED, true).unwrap();
        assert_eq!(fx.graph.inner().is_bypassed(id), Some(true));

        let param = fx.tree.children_of_kind(key, NodeKind::Parameter)[0];
        fx.tree.set_property(param, props::VALUE, 0.2).unwrap();
        let cell = fx.sync.borrow().parameter_cell(id, 0).unwrap();
        assert!((cell.value() - 0.2).abs() < 1e-6);
        assert!(!cell.needs_update());
    }

    #[test]
    fn render_changes_flow_back_into_tree() {
        let mut fx = Fixture::new();
        let (key, id) = fx.add(builtin::GAIN);
        let cell = fx.sync.borrow().parameter_cell(id, 0).unwrap();
        cell.publish(0.9);

        let now = Instant::now();
        let written = fx.sync.borrow_mut().poll(&mut fx.tree, now);
        assert_eq!(written, 1);
        let param = fx.tree.children_of_kind(key, NodeKind::Parameter)[0];
        let value = fx.tree.get_float(param, props::VALUE).unwrap();
        assert!((value - 0.9).abs() < 1e-6);

        // Too soon for another flush.
        cell.publish(0.1);
        assert_eq!(fx.sync.borrow_mut().poll(&mut fx.tree, now), 0);
        let later = now + Duration::from_millis(20);
        assert_eq!(fx.sync.borrow_mut().poll(&mut fx.tree, later), 1);
    }

    #[test]
    fn capture_state_writes_blobs() {
        let mut fx = Fixture::new();
        let (key, _) = fx.add(builtin::TRACK_OUTPUT);
        let captured = fx.sync.borrow_mut().capture_state(&mut fx.tree);
        assert_eq!(captured, 1);
        let p = Processor::wrap(&fx.tree, key).unwrap();
        assert!(p.state_blob().is_some());
    }

    #[test]
    fn stale_channels_are_regenerated() {
        let mut fx = Fixture::new();
        // Described as mono, the live unit is stereo.
        let layout = ChannelLayout::new(1, 1, false, false);
        let desc = PluginDescription::new(builtin::GAIN, "Gain", layout);
        let id = fx.allocator.allocate();
        let root = fx.tree.root();
        let key = fx.tree.add_child(root, processor_node(&desc, id, 0), None).unwrap();
        let p = Processor::wrap(&fx.tree, key).unwrap();
        assert_eq!(p.audio_inputs(), 2);
        assert_eq!(p.audio_outputs(), 2);
    }

    #[test]
    fn attach_syncs_existing_tree() {
        let factory = Rc::new(BuiltinFactory::new());
        let mut root = DetachedNode::new(NodeKind::Project);
        let input = factory.describe(builtin::AUDIO_INPUT).unwrap();
        let gain = factory.describe(builtin::GAIN).unwrap();
        root.children.push(processor_node(&input, NodeId::new(5), 0));
        root.children.push(processor_node(&gain, NodeId::new(6), 0));
        root.children
            .push(connection_node(audio(NodeId::new(5), NodeId::new(6)), false));
        let mut tree = Tree::from_detached(root);

        let graph = Arc::new(RecordingGraph::new());
        let allocator = NodeIdAllocator::new();
        let mut sync = GraphSync::new(graph.clone(), factory, allocator.clone());
        sync.attach(&mut tree);
        assert_eq!(sync.live_node_count(), 2);
        assert_eq!(graph.connections().len(), 1);
        assert_eq!(allocator.peek(), NodeId::new(7));
    }
}
