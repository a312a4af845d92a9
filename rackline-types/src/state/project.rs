use super::channel::{ConnectionType, Edge};
use super::connection::Connection;
use super::processor::{Processor, ProcessorRole};
use super::props;
use super::track::Track;
use crate::tree::{DetachedNode, NodeKey, NodeKind, Tree};
use crate::NodeId;

/// Current persisted layout version.
pub const LAYOUT_VERSION: i64 = 1;

/// Build an empty project: global I/O collections, no tracks, no connections.
pub fn project_node(
    name: &str,
    inputs: Vec<DetachedNode>,
    outputs: Vec<DetachedNode>,
    visible_tracks: u32,
    visible_slots: u32,
) -> DetachedNode {
    let mut input = DetachedNode::new(NodeKind::Input);
    input.children = inputs;
    let mut output = DetachedNode::new(NodeKind::Output);
    output.children = outputs;
    DetachedNode::new(NodeKind::Project)
        .with(props::NAME, name)
        .with(props::PROJECT_VERSION, LAYOUT_VERSION)
        .with_child(input)
        .with_child(output)
        .with_child(DetachedNode::new(NodeKind::Tracks))
        .with_child(DetachedNode::new(NodeKind::Connections))
        .with_child(
            DetachedNode::new(NodeKind::View)
                .with(props::GRID_TRACK_OFFSET, 0u32)
                .with(props::GRID_SLOT_OFFSET, 0u32)
                .with(props::VISIBLE_TRACKS, visible_tracks)
                .with(props::VISIBLE_SLOTS, visible_slots),
        )
}

/// Read view over a whole project tree.
#[derive(Clone, Copy)]
pub struct ProjectView<'a> {
    tree: &'a Tree,
}

impl<'a> ProjectView<'a> {
    pub fn wrap(tree: &'a Tree) -> Option<Self> {
        (tree.kind(tree.root()) == Some(NodeKind::Project)).then_some(Self { tree })
    }

    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    pub fn name(&self) -> &'a str {
        self.tree.get_str(self.tree.root(), props::NAME).unwrap_or("")
    }

    pub fn tracks_key(&self) -> Option<NodeKey> {
        self.tree.child_of_kind(self.tree.root(), NodeKind::Tracks)
    }

    pub fn connections_key(&self) -> Option<NodeKey> {
        self.tree.child_of_kind(self.tree.root(), NodeKind::Connections)
    }

    pub fn view_key(&self) -> Option<NodeKey> {
        self.tree.child_of_kind(self.tree.root(), NodeKind::View)
    }

    pub fn inputs_key(&self) -> Option<NodeKey> {
        self.tree.child_of_kind(self.tree.root(), NodeKind::Input)
    }

    pub fn outputs_key(&self) -> Option<NodeKey> {
        self.tree.child_of_kind(self.tree.root(), NodeKind::Output)
    }

    pub fn tracks(&self) -> Vec<Track<'a>> {
        self.tracks_key()
            .map(|k| {
                self.tree
                    .children_of_kind(k, NodeKind::Track)
                    .into_iter()
                    .filter_map(|t| Track::wrap(self.tree, t))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Non-master tracks in tree order, then the master track.
    pub fn tracks_in_chain_order(&self) -> Vec<Track<'a>> {
        let (master, mut rest): (Vec<_>, Vec<_>) =
            self.tracks().into_iter().partition(|t| t.is_master());
        rest.extend(master);
        rest
    }

    pub fn master_track(&self) -> Option<Track<'a>> {
        self.tracks().into_iter().find(|t| t.is_master())
    }

    pub fn track_by_uuid(&self, uuid: &str) -> Option<Track<'a>> {
        self.tracks().into_iter().find(|t| t.uuid() == uuid)
    }

    pub fn track_index(&self, uuid: &str) -> Option<usize> {
        self.tracks().iter().position(|t| t.uuid() == uuid)
    }

    /// The track named by the view's `focusedTrack`, else the first track.
    pub fn focused_track(&self) -> Option<Track<'a>> {
        self.view_key()
            .and_then(|v| self.tree.get_str(v, props::FOCUSED_TRACK))
            .and_then(|uuid| self.track_by_uuid(uuid))
            .or_else(|| self.tracks().into_iter().next())
    }

    pub fn connections(&self) -> Vec<Connection<'a>> {
        self.connections_key()
            .map(|k| {
                self.tree
                    .children_of_kind(k, NodeKind::Connection)
                    .into_iter()
                    .filter_map(|c| Connection::wrap(self.tree, c))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn find_connection(&self, edge: &Edge) -> Option<Connection<'a>> {
        self.connections().into_iter().find(|c| c.edge() == *edge)
    }

    pub fn connections_touching(&self, node: NodeId) -> Vec<Connection<'a>> {
        self.connections()
            .into_iter()
            .filter(|c| c.touches(node))
            .collect()
    }

    /// True when `node` has a custom outgoing connection of `kind`.
    pub fn has_custom_output(&self, node: NodeId, kind: ConnectionType) -> bool {
        self.connections().iter().any(|c| {
            c.is_custom() && c.source().node == node && c.connection_type() == Some(kind)
        })
    }

    /// Every Processor node in document order.
    pub fn all_processors(&self) -> Vec<Processor<'a>> {
        self.tree
            .find_kind(NodeKind::Processor)
            .into_iter()
            .filter_map(|k| Processor::wrap(self.tree, k))
            .collect()
    }

    pub fn processor_by_node_id(&self, id: NodeId) -> Option<Processor<'a>> {
        self.all_processors()
            .into_iter()
            .find(|p| p.node_id() == Some(id))
    }

    pub fn global_inputs(&self) -> Vec<Processor<'a>> {
        self.io_processors(self.inputs_key())
    }

    pub fn global_outputs(&self) -> Vec<Processor<'a>> {
        self.io_processors(self.outputs_key())
    }

    /// The global output that accepts audio, if one exists.
    pub fn global_audio_output(&self) -> Option<Processor<'a>> {
        self.global_outputs()
            .into_iter()
            .find(|p| p.accepts(ConnectionType::Audio))
    }

    pub fn max_node_id(&self) -> Option<NodeId> {
        self.all_processors().iter().filter_map(|p| p.node_id()).max()
    }

    fn io_processors(&self, holder: Option<NodeKey>) -> Vec<Processor<'a>> {
        holder
            .map(|k| {
                self.tree
                    .children_of_kind(k, NodeKind::Processor)
                    .into_iter()
                    .filter_map(|p| Processor::wrap(self.tree, p))
                    .filter(|p| {
                        matches!(
                            p.role(),
                            Some(ProcessorRole::GlobalInput) | Some(ProcessorRole::GlobalOutput)
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
