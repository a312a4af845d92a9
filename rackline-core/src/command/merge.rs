//! Coalescing of adjacent commands in history.

use rackline_types::{Edge, NodeKey};

use super::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    /// `self` now also covers `next`.
    Merged,
    /// `self` and `next` undo each other; both should leave history.
    Cancelled,
    /// Keep them as separate steps.
    Rejected,
}

enum Rule {
    Cancel,
    Pair,
    Property,
    Boundary,
    None,
}

impl Command {
    /// Fold an already-performed `next` into this already-performed command.
    /// `within_window` tells whether `next` followed closely enough in time
    /// for property edits to coalesce.
    pub fn try_merge(&mut self, next: &Command, within_window: bool) -> MergeResult {
        let rule = match (&*self, next) {
            (Command::CreateConnection(c), Command::DeleteConnection(d))
                if c.key == Some(d.key) =>
            {
                Rule::Cancel
            }
            (Command::DeleteConnection(d), Command::CreateConnection(c))
                if !d.custom && c.custom && d.edge == Some(c.edge) =>
            {
                Rule::Pair
            }
            (Command::SetProperty(a), Command::SetProperty(b))
                if within_window && a.node == b.node && a.name == b.name =>
            {
                Rule::Property
            }
            (Command::Composite(_), _) | (_, Command::Composite(_)) => Rule::Boundary,
            _ => Rule::None,
        };

        match rule {
            Rule::Cancel => MergeResult::Cancelled,
            Rule::Pair => {
                let first = self.clone();
                *self = Command::composite("Connect", vec![first, next.clone()]);
                MergeResult::Merged
            }
            Rule::Property => {
                let (Command::SetProperty(a), Command::SetProperty(b)) = (&mut *self, next) else {
                    return MergeResult::Rejected;
                };
                a.value = b.value.clone();
                a.at = b.at;
                if a.value == a.old {
                    MergeResult::Cancelled
                } else {
                    MergeResult::Merged
                }
            }
            Rule::Boundary => self.merge_boundary(next, within_window),
            Rule::None => MergeResult::Rejected,
        }
    }

    /// Composites merge when the last child of `self` merges with the first
    /// child of `next`.
    fn merge_boundary(&mut self, next: &Command, within_window: bool) -> MergeResult {
        let mut left = children_of(self);
        let mut right = children_of(next);
        let (Some(last), false) = (left.last_mut(), right.is_empty()) else {
            return MergeResult::Rejected;
        };
        match last.try_merge(&right[0], within_window) {
            MergeResult::Rejected => return MergeResult::Rejected,
            MergeResult::Merged => {}
            MergeResult::Cancelled => {
                left.pop();
            }
        }
        right.remove(0);
        left.extend(right);
        if left.is_empty() {
            return MergeResult::Cancelled;
        }
        let name = self.name().to_string();
        *self = Command::composite(&name, left);
        MergeResult::Merged
    }

    /// Flatten and drop pairs of leaves that cancel out. `None` when nothing
    /// is left.
    pub fn simplify(&self) -> Option<Command> {
        let mut leaves: Vec<Command> = self.leaves().into_iter().cloned().collect();
        while cancel_one(&mut leaves) {}
        match leaves.len() {
            0 => None,
            1 => leaves.pop(),
            _ => Some(Command::composite(self.name(), leaves)),
        }
    }
}

fn children_of(command: &Command) -> Vec<Command> {
    match command {
        Command::Composite(c) => c.children.clone(),
        other => vec![other.clone()],
    }
}

/// Remove the first cancelling pair (or fold the first pair of property
/// edits). Returns whether anything changed.
fn cancel_one(leaves: &mut Vec<Command>) -> bool {
    for i in 0..leaves.len() {
        for j in (i + 1)..leaves.len() {
            match (&leaves[i], &leaves[j]) {
                (Command::CreateConnection(c), Command::DeleteConnection(d))
                    if c.key == Some(d.key) =>
                {
                    if untouched_between(leaves, i, j, Some(d.key), Some(c.edge)) {
                        leaves.remove(j);
                        leaves.remove(i);
                        return true;
                    }
                }
                (Command::DeleteConnection(d), Command::CreateConnection(c))
                    if d.edge == Some(c.edge) && d.custom == c.custom =>
                {
                    if untouched_between(leaves, i, j, Some(d.key), Some(c.edge)) {
                        leaves.remove(j);
                        leaves.remove(i);
                        return true;
                    }
                }
                (Command::SetProperty(a), Command::SetProperty(b))
                    if a.node == b.node && a.name == b.name =>
                {
                    let value = b.value.clone();
                    let at = b.at;
                    leaves.remove(j);
                    if let Command::SetProperty(a) = &mut leaves[i] {
                        a.value = value;
                        a.at = at;
                        if a.value == a.old {
                            leaves.remove(i);
                        }
                    }
                    return true;
                }
                _ => {}
            }
        }
    }
    false
}

fn untouched_between(
    leaves: &[Command],
    i: usize,
    j: usize,
    key: Option<NodeKey>,
    edge: Option<Edge>,
) -> bool {
    leaves[i + 1..j].iter().all(|c| !touches(c, key, edge))
}

fn touches(command: &Command, key: Option<NodeKey>, edge: Option<Edge>) -> bool {
    let key_hit = |k: NodeKey| key == Some(k);
    let edge_hit = |e: Option<Edge>| e.is_some() && e == edge;
    match command {
        Command::AddNode(c) => c.added_key().is_some_and(key_hit),
        Command::RemoveNode(c) => key_hit(c.key()),
        Command::MoveNode(c) => key_hit(c.key()),
        Command::ReparentNode(c) => key_hit(c.key()),
        Command::SetProperty(c) => key_hit(c.node()),
        Command::CreateConnection(c) => c.key.is_some_and(key_hit) || edge_hit(Some(c.edge)),
        Command::DeleteConnection(c) => key_hit(c.key) || edge_hit(c.edge),
        Command::Composite(c) => c.children.iter().any(|child| touches(child, key, edge)),
    }
}
