use std::collections::{HashMap, HashSet};

use rackline_types::{Edge, NodeId, ProjectView, Tree};

/// Directed node-level adjacency built from connection edges.
#[derive(Debug, Default, Clone)]
pub struct Adjacency {
    next: HashMap<NodeId, Vec<NodeId>>,
}

impl Adjacency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a Edge>) -> Self {
        let mut adjacency = Self::new();
        for edge in edges {
            adjacency.insert(edge);
        }
        adjacency
    }

    pub fn insert(&mut self, edge: &Edge) {
        let targets = self.next.entry(edge.source.node).or_default();
        if !targets.contains(&edge.dest.node) {
            targets.push(edge.dest.node);
        }
    }

    /// Whether a path leads from `from` to `to`. A node reaches itself.
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut visited = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(targets) = self.next.get(&node) {
                stack.extend(targets.iter().copied().filter(|t| !visited.contains(t)));
            }
        }
        false
    }

    /// Adding `edge` would close a loop.
    pub fn would_cycle(&self, edge: &Edge) -> bool {
        self.reaches(edge.dest.node, edge.source.node)
    }
}

/// Whether signal from `from` reaches `to` through the project's connections,
/// default and custom alike.
pub fn are_connected(tree: &Tree, from: NodeId, to: NodeId) -> bool {
    let Some(project) = ProjectView::wrap(tree) else {
        return false;
    };
    let edges: Vec<Edge> = project.connections().iter().map(|c| c.edge()).collect();
    Adjacency::from_edges(&edges).reaches(from, to)
}
