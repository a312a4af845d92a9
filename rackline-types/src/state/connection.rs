use super::channel::{ConnectionType, Edge, Endpoint};
use super::props;
use crate::tree::{DetachedNode, NodeKey, NodeKind, Tree};
use crate::NodeId;

pub fn connection_node(edge: Edge, custom: bool) -> DetachedNode {
    DetachedNode::new(NodeKind::Connection)
        .with(props::SOURCE_NODE, edge.source.node.get())
        .with(props::SOURCE_CHANNEL, edge.source.channel)
        .with(props::DEST_NODE, edge.dest.node.get())
        .with(props::DEST_CHANNEL, edge.dest.channel)
        .with(props::IS_CUSTOM, custom)
}

/// Read the edge out of a detached Connection node.
pub fn edge_of_node(node: &DetachedNode) -> Option<Edge> {
    if node.kind != NodeKind::Connection {
        return None;
    }
    let int = |name: &str| node.property(name).and_then(|v| v.as_int());
    let endpoint = |id: &str, channel: &str| -> Option<Endpoint> {
        Some(Endpoint::new(NodeId::new(int(id)? as u32), int(channel)? as u32))
    };
    Some(Edge::new(
        endpoint(props::SOURCE_NODE, props::SOURCE_CHANNEL)?,
        endpoint(props::DEST_NODE, props::DEST_CHANNEL)?,
    ))
}

/// Read view over a Connection node.
#[derive(Clone, Copy)]
pub struct Connection<'a> {
    tree: &'a Tree,
    key: NodeKey,
}

impl<'a> Connection<'a> {
    pub fn wrap(tree: &'a Tree, key: NodeKey) -> Option<Self> {
        (tree.kind(key) == Some(NodeKind::Connection)).then_some(Self { tree, key })
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn source(&self) -> Endpoint {
        self.endpoint(props::SOURCE_NODE, props::SOURCE_CHANNEL)
    }

    pub fn dest(&self) -> Endpoint {
        self.endpoint(props::DEST_NODE, props::DEST_CHANNEL)
    }

    pub fn edge(&self) -> Edge {
        Edge::new(self.source(), self.dest())
    }

    pub fn is_custom(&self) -> bool {
        self.tree.get_bool(self.key, props::IS_CUSTOM).unwrap_or(false)
    }

    pub fn connection_type(&self) -> Option<ConnectionType> {
        self.edge().connection_type()
    }

    /// True when either end refers to `node`.
    pub fn touches(&self, node: NodeId) -> bool {
        self.source().node == node || self.dest().node == node
    }

    fn endpoint(&self, node: &str, channel: &str) -> Endpoint {
        Endpoint::new(
            NodeId::new(self.tree.get_int(self.key, node).unwrap_or(0).max(0) as u32),
            self.tree.get_int(self.key, channel).unwrap_or(0).max(0) as u32,
        )
    }
}

impl std::fmt::Debug for Connection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Connection({} {}{})",
            self.key,
            self.edge(),
            if self.is_custom() { " custom" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::channel::MIDI_CHANNEL;

    #[test]
    fn node_round_trip_through_view() {
        let edge = Edge::new(
            Endpoint::midi(NodeId::new(3)),
            Endpoint::new(NodeId::new(9), MIDI_CHANNEL),
        );
        let node = connection_node(edge, true);
        assert_eq!(edge_of_node(&node), Some(edge));

        let tree = Tree::from_detached(node);
        let c = Connection::wrap(&tree, tree.root()).unwrap();
        assert_eq!(c.edge(), edge);
        assert!(c.is_custom());
        assert_eq!(c.connection_type(), Some(ConnectionType::Midi));
        assert!(c.touches(NodeId::new(9)));
        assert!(!c.touches(NodeId::new(4)));
    }
}
