//! Undoable edits of the project tree.
//!
//! A [`Command`] is a tagged enum over a small set of leaf edits plus
//! `Composite`. Every edit made through the project surface is one command,
//! so undo and redo replay exactly what happened to the tree.

mod merge;
mod ops;

pub use merge::MergeResult;
pub use ops::{
    AddNode, CreateConnection, DeleteConnection, MoveNode, RemoveNode, ReparentNode, SetProperty,
};

use rackline_types::Tree;

#[derive(Debug, Clone)]
pub enum Command {
    AddNode(AddNode),
    RemoveNode(RemoveNode),
    MoveNode(MoveNode),
    ReparentNode(ReparentNode),
    SetProperty(SetProperty),
    CreateConnection(CreateConnection),
    DeleteConnection(DeleteConnection),
    Composite(Composite),
}

impl Command {
    pub fn name(&self) -> &str {
        match self {
            Command::AddNode(_) => "Add Node",
            Command::RemoveNode(_) => "Remove Node",
            Command::MoveNode(_) => "Move Node",
            Command::ReparentNode(_) => "Move Node",
            Command::SetProperty(_) => "Change Property",
            Command::CreateConnection(_) => "Connect",
            Command::DeleteConnection(_) => "Disconnect",
            Command::Composite(c) => &c.name,
        }
    }

    /// Apply the edit. `false` means nothing changed and the tree is untouched.
    pub fn perform(&mut self, tree: &mut Tree) -> bool {
        match self {
            Command::AddNode(c) => c.perform(tree),
            Command::RemoveNode(c) => c.perform(tree),
            Command::MoveNode(c) => c.perform(tree),
            Command::ReparentNode(c) => c.perform(tree),
            Command::SetProperty(c) => c.perform(tree),
            Command::CreateConnection(c) => c.perform(tree),
            Command::DeleteConnection(c) => c.perform(tree),
            Command::Composite(c) => c.perform(tree),
        }
    }

    /// Reverse a successful `perform`.
    pub fn undo(&mut self, tree: &mut Tree) {
        match self {
            Command::AddNode(c) => c.undo(tree),
            Command::RemoveNode(c) => c.undo(tree),
            Command::MoveNode(c) => c.undo(tree),
            Command::ReparentNode(c) => c.undo(tree),
            Command::SetProperty(c) => c.undo(tree),
            Command::CreateConnection(c) => c.undo(tree),
            Command::DeleteConnection(c) => c.undo(tree),
            Command::Composite(c) => c.undo(tree),
        }
    }

    /// `perform` with notifications muted, for probing what the tree would
    /// look like without the live graph noticing.
    pub fn perform_temporary(&mut self, tree: &mut Tree) -> bool {
        tree.mute();
        let ok = self.perform(tree);
        tree.unmute();
        ok
    }

    pub fn undo_temporary(&mut self, tree: &mut Tree) {
        tree.mute();
        self.undo(tree);
        tree.unmute();
    }

    pub fn composite(name: &str, children: Vec<Command>) -> Command {
        Command::Composite(Composite::new(name, children))
    }

    pub fn is_empty_composite(&self) -> bool {
        matches!(self, Command::Composite(c) if c.children.is_empty())
    }

    /// Leaf commands in execution order, nested composites flattened.
    pub fn leaves(&self) -> Vec<&Command> {
        match self {
            Command::Composite(c) => c.children.iter().flat_map(|child| child.leaves()).collect(),
            other => vec![other],
        }
    }
}

/// Children performed in order and undone in reverse.
#[derive(Debug, Clone)]
pub struct Composite {
    pub(crate) name: String,
    pub(crate) children: Vec<Command>,
}

impl Composite {
    pub fn new(name: &str, children: Vec<Command>) -> Self {
        Self {
            name: name.to_string(),
            children,
        }
    }

    pub fn children(&self) -> &[Command] {
        &self.children
    }

    pub fn push(&mut self, child: Command) {
        match child {
            Command::Composite(c) => self.children.extend(c.children),
            leaf => self.children.push(leaf),
        }
    }

    /// Children that have no effect are dropped, so undo and redo only
    /// replay what actually changed the tree.
    fn perform(&mut self, tree: &mut Tree) -> bool {
        let children = std::mem::take(&mut self.children);
        for mut child in children {
            if child.perform(tree) {
                self.children.push(child);
            }
        }
        !self.children.is_empty()
    }

    fn undo(&mut self, tree: &mut Tree) {
        for child in self.children.iter_mut().rev() {
            child.undo(tree);
        }
    }
}

impl From<AddNode> for Command {
    fn from(c: AddNode) -> Self {
        Command::AddNode(c)
    }
}

impl From<RemoveNode> for Command {
    fn from(c: RemoveNode) -> Self {
        Command::RemoveNode(c)
    }
}

impl From<MoveNode> for Command {
    fn from(c: MoveNode) -> Self {
        Command::MoveNode(c)
    }
}

impl From<ReparentNode> for Command {
    fn from(c: ReparentNode) -> Self {
        Command::ReparentNode(c)
    }
}

impl From<SetProperty> for Command {
    fn from(c: SetProperty) -> Self {
        Command::SetProperty(c)
    }
}

impl From<CreateConnection> for Command {
    fn from(c: CreateConnection) -> Self {
        Command::CreateConnection(c)
    }
}

impl From<DeleteConnection> for Command {
    fn from(c: DeleteConnection) -> Self {
        Command::DeleteConnection(c)
    }
}

impl From<Composite> for Command {
    fn from(c: Composite) -> Self {
        Command::Composite(c)
    }
}
