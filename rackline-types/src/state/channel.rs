//! Pins, edges and the derived Channel metadata on processors.

use serde::{Deserialize, Serialize};

use super::props;
use crate::tree::{DetachedNode, NodeKey, NodeKind, Tree};
use crate::NodeId;

/// Channel index reserved for a processor's MIDI pin; every other index is audio.
pub const MIDI_CHANNEL: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConnectionType {
    Audio,
    Midi,
}

impl ConnectionType {
    pub const ALL: [ConnectionType; 2] = [ConnectionType::Audio, ConnectionType::Midi];

    pub fn of_channel(channel: u32) -> Self {
        if channel == MIDI_CHANNEL {
            ConnectionType::Midi
        } else {
            ConnectionType::Audio
        }
    }
}

/// One end of a connection: a processor's node-id plus a channel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: NodeId,
    pub channel: u32,
}

impl Endpoint {
    pub fn new(node: NodeId, channel: u32) -> Self {
        Self { node, channel }
    }

    pub fn midi(node: NodeId) -> Self {
        Self::new(node, MIDI_CHANNEL)
    }

    pub fn kind(&self) -> ConnectionType {
        ConnectionType::of_channel(self.channel)
    }
}

/// A directed source → destination edge between two pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub source: Endpoint,
    pub dest: Endpoint,
}

impl Edge {
    pub fn new(source: Endpoint, dest: Endpoint) -> Self {
        Self { source, dest }
    }

    /// `None` when the two ends are of different kinds.
    pub fn connection_type(&self) -> Option<ConnectionType> {
        let kind = self.source.kind();
        (kind == self.dest.kind()).then_some(kind)
    }

    pub fn is_self_connection(&self) -> bool {
        self.source.node == self.dest.node
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source.node, self.source.channel, self.dest.node, self.dest.channel
        )
    }
}

/// Pin layout of a processing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelLayout {
    pub audio_inputs: u32,
    pub audio_outputs: u32,
    pub accepts_midi: bool,
    pub produces_midi: bool,
}

impl ChannelLayout {
    pub fn new(
        audio_inputs: u32,
        audio_outputs: u32,
        accepts_midi: bool,
        produces_midi: bool,
    ) -> Self {
        Self {
            audio_inputs,
            audio_outputs,
            accepts_midi,
            produces_midi,
        }
    }

    pub fn accepts(&self, kind: ConnectionType) -> bool {
        match kind {
            ConnectionType::Audio => self.audio_inputs > 0,
            ConnectionType::Midi => self.accepts_midi,
        }
    }

    pub fn produces(&self, kind: ConnectionType) -> bool {
        match kind {
            ConnectionType::Audio => self.audio_outputs > 0,
            ConnectionType::Midi => self.produces_midi,
        }
    }

    pub fn has_input(&self, channel: u32) -> bool {
        if channel == MIDI_CHANNEL {
            self.accepts_midi
        } else {
            channel < self.audio_inputs
        }
    }

    pub fn has_output(&self, channel: u32) -> bool {
        if channel == MIDI_CHANNEL {
            self.produces_midi
        } else {
            channel < self.audio_outputs
        }
    }

    /// Channel nodes describing this layout: inputs first, then outputs.
    pub fn channel_nodes(&self) -> Vec<DetachedNode> {
        let mut out = Vec::new();
        push_audio_channels(&mut out, self.audio_inputs, true);
        if self.accepts_midi {
            out.push(channel_node("MIDI In", "MIDI", MIDI_CHANNEL, true, true));
        }
        push_audio_channels(&mut out, self.audio_outputs, false);
        if self.produces_midi {
            out.push(channel_node("MIDI Out", "MIDI", MIDI_CHANNEL, false, true));
        }
        out
    }

    /// Rebuild a layout from the Channel children of `processor`.
    pub fn from_tree(tree: &Tree, processor: NodeKey) -> Self {
        let mut layout = ChannelLayout {
            accepts_midi: tree.get_bool(processor, props::ACCEPTS_MIDI).unwrap_or(false),
            produces_midi: tree.get_bool(processor, props::PRODUCES_MIDI).unwrap_or(false),
            ..ChannelLayout::default()
        };
        for key in tree.children_of_kind(processor, NodeKind::Channel) {
            let Some(channel) = Channel::wrap(tree, key) else {
                continue;
            };
            match (channel.is_input(), channel.is_midi()) {
                (true, false) => layout.audio_inputs += 1,
                (false, false) => layout.audio_outputs += 1,
                (true, true) => layout.accepts_midi = true,
                (false, true) => layout.produces_midi = true,
            }
        }
        layout
    }
}

fn push_audio_channels(out: &mut Vec<DetachedNode>, count: u32, input: bool) {
    for i in 0..count {
        let (name, abbrev) = match (count, i) {
            (2, 0) => ("Left".to_string(), "L".to_string()),
            (2, 1) => ("Right".to_string(), "R".to_string()),
            (1, _) => (if input { "Input" } else { "Output" }.to_string(), "M".to_string()),
            _ => {
                let prefix = if input { "In" } else { "Out" };
                (format!("{} {}", prefix, i + 1), format!("{}", i + 1))
            }
        };
        out.push(channel_node(&name, &abbrev, i, input, false));
    }
}

fn channel_node(name: &str, abbrev: &str, index: u32, input: bool, midi: bool) -> DetachedNode {
    DetachedNode::new(NodeKind::Channel)
        .with(props::NAME, name)
        .with(props::ABBREV, abbrev)
        .with(props::INDEX, index)
        .with(props::IS_INPUT, input)
        .with(props::IS_MIDI, midi)
}

/// Read view over a Channel node.
#[derive(Clone, Copy)]
pub struct Channel<'a> {
    tree: &'a Tree,
    key: NodeKey,
}

impl<'a> Channel<'a> {
    pub fn wrap(tree: &'a Tree, key: NodeKey) -> Option<Self> {
        (tree.kind(key) == Some(NodeKind::Channel)).then_some(Self { tree, key })
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn name(&self) -> &'a str {
        self.tree.get_str(self.key, props::NAME).unwrap_or("")
    }

    pub fn abbrev(&self) -> &'a str {
        self.tree.get_str(self.key, props::ABBREV).unwrap_or("")
    }

    pub fn index(&self) -> u32 {
        self.tree.get_int(self.key, props::INDEX).unwrap_or(0) as u32
    }

    pub fn is_input(&self) -> bool {
        self.tree.get_bool(self.key, props::IS_INPUT).unwrap_or(false)
    }

    pub fn is_midi(&self) -> bool {
        self.tree.get_bool(self.key, props::IS_MIDI).unwrap_or(false)
    }
}
