use super::processor::Processor;
use super::props;
use crate::tree::{DetachedNode, NodeKey, NodeKind, Tree};

/// Colours handed out to new tracks in turn.
pub const TRACK_PALETTE: [&str; 8] = [
    "#e0604f", "#e8a33c", "#d8cf4a", "#6cc26a", "#4fb5c9", "#5f7fe0", "#9a6be0", "#d86bb4",
];

/// Build a Track node with one empty lane plus its fixed input/output processors.
///
/// The output processor is placed at `num_slots`, above every lane slot.
pub fn track_node(
    name: &str,
    colour: &str,
    is_master: bool,
    num_slots: u32,
    mut input: DetachedNode,
    mut output: DetachedNode,
) -> DetachedNode {
    input.set(props::SLOT, 0u32);
    output.set(props::SLOT, num_slots);
    DetachedNode::new(NodeKind::Track)
        .with(props::UUID, uuid::Uuid::new_v4().to_string())
        .with(props::NAME, name)
        .with(props::COLOUR, colour)
        .with(props::SELECTED, false)
        .with(props::IS_MASTER, is_master)
        .with_child(
            DetachedNode::new(NodeKind::Lanes).with_child(
                DetachedNode::new(NodeKind::Lane).with(props::NUM_SLOTS, num_slots),
            ),
        )
        .with_child(DetachedNode::new(NodeKind::Input).with_child(input))
        .with_child(DetachedNode::new(NodeKind::Output).with_child(output))
}

/// Read view over a Track node.
#[derive(Clone, Copy)]
pub struct Track<'a> {
    tree: &'a Tree,
    key: NodeKey,
}

impl<'a> Track<'a> {
    pub fn wrap(tree: &'a Tree, key: NodeKey) -> Option<Self> {
        (tree.kind(key) == Some(NodeKind::Track)).then_some(Self { tree, key })
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn uuid(&self) -> &'a str {
        self.tree.get_str(self.key, props::UUID).unwrap_or("")
    }

    pub fn name(&self) -> &'a str {
        self.tree.get_str(self.key, props::NAME).unwrap_or("")
    }

    pub fn colour(&self) -> &'a str {
        self.tree.get_str(self.key, props::COLOUR).unwrap_or("")
    }

    pub fn is_selected(&self) -> bool {
        self.tree.get_bool(self.key, props::SELECTED).unwrap_or(false)
    }

    pub fn is_master(&self) -> bool {
        self.tree.get_bool(self.key, props::IS_MASTER).unwrap_or(false)
    }

    pub fn lanes(&self) -> Vec<Lane<'a>> {
        self.tree
            .child_of_kind(self.key, NodeKind::Lanes)
            .map(|lanes| {
                self.tree
                    .children_of_kind(lanes, NodeKind::Lane)
                    .into_iter()
                    .filter_map(|k| Lane::wrap(self.tree, k))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The primary (first) lane.
    pub fn lane(&self) -> Option<Lane<'a>> {
        self.lanes().into_iter().next()
    }

    pub fn input_processor(&self) -> Option<Processor<'a>> {
        self.io_processor(NodeKind::Input)
    }

    pub fn output_processor(&self) -> Option<Processor<'a>> {
        self.io_processor(NodeKind::Output)
    }

    /// Lane members across all lanes, lane by lane in child order.
    pub fn processors(&self) -> Vec<Processor<'a>> {
        self.lanes()
            .into_iter()
            .flat_map(|lane| lane.processors())
            .collect()
    }

    /// Lane members plus the fixed input and output processors.
    pub fn all_processors(&self) -> Vec<Processor<'a>> {
        let mut out: Vec<Processor<'a>> = self.input_processor().into_iter().collect();
        out.extend(self.processors());
        out.extend(self.output_processor());
        out
    }

    fn io_processor(&self, kind: NodeKind) -> Option<Processor<'a>> {
        let holder = self.tree.child_of_kind(self.key, kind)?;
        let key = self.tree.child_of_kind(holder, NodeKind::Processor)?;
        Processor::wrap(self.tree, key)
    }
}

impl std::fmt::Debug for Track<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("key", &self.key)
            .field("name", &self.name())
            .field("master", &self.is_master())
            .finish()
    }
}

/// Read view over a processor Lane.
#[derive(Clone, Copy)]
pub struct Lane<'a> {
    tree: &'a Tree,
    key: NodeKey,
}

impl<'a> Lane<'a> {
    pub fn wrap(tree: &'a Tree, key: NodeKey) -> Option<Self> {
        (tree.kind(key) == Some(NodeKind::Lane)).then_some(Self { tree, key })
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Visible slot count of the lane (grows as processors are inserted past it).
    pub fn num_slots(&self) -> u32 {
        self.tree
            .get_int(self.key, props::NUM_SLOTS)
            .unwrap_or(0)
            .max(0) as u32
    }

    /// Processors in child order (which matches slot order once slots are valid).
    pub fn processors(&self) -> Vec<Processor<'a>> {
        self.tree
            .children_of_kind(self.key, NodeKind::Processor)
            .into_iter()
            .filter_map(|k| Processor::wrap(self.tree, k))
            .collect()
    }

    pub fn processor_at_slot(&self, slot: u32) -> Option<Processor<'a>> {
        self.processors().into_iter().find(|p| p.slot() == slot)
    }

    pub fn max_slot(&self) -> Option<u32> {
        self.processors().iter().map(|p| p.slot()).max()
    }

    pub fn track(&self) -> Option<Track<'a>> {
        self.tree
            .ancestor_of_kind(self.key, NodeKind::Track)
            .and_then(|k| Track::wrap(self.tree, k))
    }
}
