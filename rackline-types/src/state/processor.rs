use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use super::channel::{Channel, ChannelLayout, ConnectionType};
use super::props;
use super::track::{Lane, Track};
use crate::tree::{DetachedNode, NodeKey, NodeKind, Tree};
use crate::NodeId;

/// What the plugin boundary tells us about an identifier before instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescription {
    pub identifier: String,
    pub name: String,
    pub layout: ChannelLayout,
}

impl PluginDescription {
    pub fn new(identifier: &str, name: &str, layout: ChannelLayout) -> Self {
        Self {
            identifier: identifier.to_string(),
            name: name.to_string(),
            layout,
        }
    }
}

/// Where a processor sits in the project, derived from its parent collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorRole {
    LaneMember,
    TrackInput,
    TrackOutput,
    GlobalInput,
    GlobalOutput,
}

/// Build a Processor node, channels included, for a new instance.
pub fn processor_node(desc: &PluginDescription, node_id: NodeId, slot: u32) -> DetachedNode {
    let mut node = DetachedNode::new(NodeKind::Processor)
        .with(props::IDENTIFIER, desc.identifier.as_str())
        .with(props::NAME, desc.name.as_str())
        .with(props::NODE_ID, node_id.get())
        .with(props::SLOT, slot)
        .with(props::BYPASSED, false)
        .with(props::ACCEPTS_MIDI, desc.layout.accepts_midi)
        .with(props::PRODUCES_MIDI, desc.layout.produces_midi)
        .with(props::ALLOW_DEFAULT_CONNECTIONS, true);
    node.children = desc.layout.channel_nodes();
    node
}

pub fn encode_state(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode_state(text: &str) -> Option<Vec<u8>> {
    BASE64.decode(text).ok()
}

/// Read view over a Processor node.
#[derive(Clone, Copy)]
pub struct Processor<'a> {
    tree: &'a Tree,
    key: NodeKey,
}

impl<'a> Processor<'a> {
    pub fn wrap(tree: &'a Tree, key: NodeKey) -> Option<Self> {
        (tree.kind(key) == Some(NodeKind::Processor)).then_some(Self { tree, key })
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn identifier(&self) -> &'a str {
        self.tree.get_str(self.key, props::IDENTIFIER).unwrap_or("")
    }

    pub fn name(&self) -> &'a str {
        self.tree.get_str(self.key, props::NAME).unwrap_or("")
    }

    /// The assigned node-id, if any. Whether a live instance exists under it
    /// is the synchronizer's business.
    pub fn node_id(&self) -> Option<NodeId> {
        self.tree
            .get_int(self.key, props::NODE_ID)
            .filter(|id| *id > 0)
            .map(|id| NodeId::new(id as u32))
    }

    pub fn slot(&self) -> u32 {
        self.tree
            .get_int(self.key, props::SLOT)
            .unwrap_or(0)
            .max(0) as u32
    }

    pub fn is_bypassed(&self) -> bool {
        self.tree.get_bool(self.key, props::BYPASSED).unwrap_or(false)
    }

    pub fn accepts_midi(&self) -> bool {
        self.tree.get_bool(self.key, props::ACCEPTS_MIDI).unwrap_or(false)
    }

    pub fn produces_midi(&self) -> bool {
        self.tree.get_bool(self.key, props::PRODUCES_MIDI).unwrap_or(false)
    }

    pub fn allow_default_connections(&self) -> bool {
        self.tree
            .get_bool(self.key, props::ALLOW_DEFAULT_CONNECTIONS)
            .unwrap_or(true)
    }

    pub fn state_blob(&self) -> Option<Vec<u8>> {
        self.tree
            .get_str(self.key, props::STATE)
            .and_then(decode_state)
    }

    pub fn channels(&self) -> Vec<Channel<'a>> {
        self.tree
            .children_of_kind(self.key, NodeKind::Channel)
            .into_iter()
            .filter_map(|k| Channel::wrap(self.tree, k))
            .collect()
    }

    pub fn parameters(&self) -> Vec<NodeKey> {
        self.tree.children_of_kind(self.key, NodeKind::Parameter)
    }

    pub fn layout(&self) -> ChannelLayout {
        ChannelLayout::from_tree(self.tree, self.key)
    }

    pub fn audio_inputs(&self) -> u32 {
        self.layout().audio_inputs
    }

    pub fn audio_outputs(&self) -> u32 {
        self.layout().audio_outputs
    }

    pub fn accepts(&self, kind: ConnectionType) -> bool {
        self.layout().accepts(kind)
    }

    pub fn produces(&self, kind: ConnectionType) -> bool {
        self.layout().produces(kind)
    }

    pub fn role(&self) -> Option<ProcessorRole> {
        let parent = self.tree.parent(self.key)?;
        let grandparent = self.tree.parent(parent).and_then(|g| self.tree.kind(g));
        match (self.tree.kind(parent)?, grandparent) {
            (NodeKind::Lane, _) => Some(ProcessorRole::LaneMember),
            (NodeKind::Input, Some(NodeKind::Track)) => Some(ProcessorRole::TrackInput),
            (NodeKind::Output, Some(NodeKind::Track)) => Some(ProcessorRole::TrackOutput),
            (NodeKind::Input, Some(NodeKind::Project)) => Some(ProcessorRole::GlobalInput),
            (NodeKind::Output, Some(NodeKind::Project)) => Some(ProcessorRole::GlobalOutput),
            _ => None,
        }
    }

    pub fn track(&self) -> Option<Track<'a>> {
        self.tree
            .ancestor_of_kind(self.key, NodeKind::Track)
            .and_then(|k| Track::wrap(self.tree, k))
    }

    pub fn lane(&self) -> Option<Lane<'a>> {
        self.tree.parent(self.key).and_then(|k| Lane::wrap(self.tree, k))
    }
}

impl std::fmt::Debug for Processor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("key", &self.key)
            .field("name", &self.name())
            .field("node_id", &self.node_id())
            .field("slot", &self.slot())
            .finish()
    }
}
