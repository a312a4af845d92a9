//! Typed views over raw project tree nodes, and builders for new subtrees.

pub mod channel;
pub mod connection;
pub mod processor;
pub mod project;
pub mod props;
pub mod track;

pub use channel::{Channel, ChannelLayout, ConnectionType, Edge, Endpoint, MIDI_CHANNEL};
pub use connection::{connection_node, edge_of_node, Connection};
pub use processor::{
    decode_state, encode_state, processor_node, PluginDescription, Processor, ProcessorRole,
};
pub use project::{project_node, ProjectView, LAYOUT_VERSION};
pub use track::{track_node, Lane, Track, TRACK_PALETTE};
