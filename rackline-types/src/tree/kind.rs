use serde::{Deserialize, Serialize};

/// Closed set of node kinds in a project tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Project,
    Input,
    Output,
    Tracks,
    Track,
    Lanes,
    Lane,
    Processor,
    Channel,
    Parameter,
    Connections,
    Connection,
    View,
}

impl NodeKind {
    pub const ALL: [NodeKind; 13] = [
        NodeKind::Project,
        NodeKind::Input,
        NodeKind::Output,
        NodeKind::Tracks,
        NodeKind::Track,
        NodeKind::Lanes,
        NodeKind::Lane,
        NodeKind::Processor,
        NodeKind::Channel,
        NodeKind::Parameter,
        NodeKind::Connections,
        NodeKind::Connection,
        NodeKind::View,
    ];

    /// Tag used in the persisted project text.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Project => "PROJECT",
            NodeKind::Input => "INPUT",
            NodeKind::Output => "OUTPUT",
            NodeKind::Tracks => "TRACKS",
            NodeKind::Track => "TRACK",
            NodeKind::Lanes => "LANES",
            NodeKind::Lane => "LANE",
            NodeKind::Processor => "PROCESSOR",
            NodeKind::Channel => "CHANNEL",
            NodeKind::Parameter => "PARAMETER",
            NodeKind::Connections => "CONNECTIONS",
            NodeKind::Connection => "CONNECTION",
            NodeKind::View => "VIEW",
        }
    }

    pub fn from_tag(tag: &str) -> Option<NodeKind> {
        NodeKind::ALL.iter().copied().find(|k| k.tag() == tag)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
