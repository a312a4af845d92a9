//! The observable document tree.
//!
//! Nodes live in a keyed arena owned by [`Tree`]. Every structural or property
//! edit goes through a `&mut Tree` method which applies the edit and then
//! synchronously notifies listeners (see [`notify`]). Detached subtrees keep
//! their [`NodeKey`]s, so re-attaching one (undo, redo) restores the same
//! identities.

mod kind;
pub mod notify;

pub use kind::NodeKind;
pub use notify::{ListenerId, SharedListener, TreeEvent, TreeListener};

use std::collections::{BTreeMap, HashMap};

use notify::ListenerList;

use crate::Value;

/// Tree-scoped node handle. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey(u64);

impl NodeKey {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum TreeError {
    #[error("unknown node {0}")]
    UnknownNode(NodeKey),
    #[error("index {index} out of range for node {parent} with {len} children")]
    IndexOutOfRange {
        parent: NodeKey,
        index: usize,
        len: usize,
    },
    #[error("the root node cannot be removed")]
    RemoveRoot,
    #[error("node {0} is already attached")]
    AlreadyAttached(NodeKey),
}

pub type TreeResult<T = ()> = Result<T, TreeError>;

/// An owned subtree outside of any tree: the unit that is attached, detached,
/// stored in commands, and built by the typed-view builders.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedNode {
    pub kind: NodeKind,
    /// Identity from a previous attachment, or `None` for a freshly built node.
    pub key: Option<NodeKey>,
    pub properties: BTreeMap<String, Value>,
    pub children: Vec<DetachedNode>,
}

impl DetachedNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            key: None,
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn with_child(mut self, child: DetachedNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.properties.insert(name.to_string(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Deep copy with every key cleared, for duplicating a subtree.
    pub fn without_keys(&self) -> DetachedNode {
        DetachedNode {
            kind: self.kind,
            key: None,
            properties: self.properties.clone(),
            children: self.children.iter().map(|c| c.without_keys()).collect(),
        }
    }

    /// Equality of kind, properties and children, ignoring keys.
    pub fn same_structure(&self, other: &DetachedNode) -> bool {
        self.kind == other.kind
            && self.properties == other.properties
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.same_structure(b))
    }

    /// This node and all descendants of `kind`, preorder.
    pub fn find_all(&self, kind: NodeKind) -> Vec<&DetachedNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.kind == kind {
                out.push(node);
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    fn collect_keys(&self, out: &mut Vec<NodeKey>) {
        if let Some(key) = self.key {
            out.push(key);
        }
        for child in &self.children {
            child.collect_keys(out);
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    properties: BTreeMap<String, Value>,
    children: Vec<NodeKey>,
    parent: Option<NodeKey>,
}

/// A mutable, observable tree of typed nodes.
#[derive(Debug)]
pub struct Tree {
    nodes: HashMap<NodeKey, NodeData>,
    root: NodeKey,
    next_key: u64,
    listeners: ListenerList,
    mute_depth: u32,
}

impl Tree {
    pub fn new(root_kind: NodeKind) -> Self {
        Self::from_detached(DetachedNode::new(root_kind))
    }

    /// Build a tree whose root is `root`. Keys carried by `root` are kept.
    pub fn from_detached(root: DetachedNode) -> Self {
        let mut keys = Vec::new();
        root.collect_keys(&mut keys);
        let next_key = keys.iter().map(|k| k.0 + 1).max().unwrap_or(0);
        let mut tree = Self {
            nodes: HashMap::new(),
            root: NodeKey(0),
            next_key,
            listeners: ListenerList::default(),
            mute_depth: 0,
        };
        tree.root = tree.insert_subtree(root, None);
        tree
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn kind(&self, key: NodeKey) -> Option<NodeKind> {
        self.nodes.get(&key).map(|n| n.kind)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&key).and_then(|n| n.parent)
    }

    /// Children of `key` in order; empty for unknown keys.
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&key)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_of(&self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.children(parent).iter().position(|c| *c == key)
    }

    pub fn child_of_kind(&self, parent: NodeKey, kind: NodeKind) -> Option<NodeKey> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.kind(*c) == Some(kind))
    }

    pub fn children_of_kind(&self, parent: NodeKey, kind: NodeKind) -> Vec<NodeKey> {
        self.children(parent)
            .iter()
            .copied()
            .filter(|c| self.kind(*c) == Some(kind))
            .collect()
    }

    /// Nearest ancestor (excluding `key`) of the given kind.
    pub fn ancestor_of_kind(&self, key: NodeKey, kind: NodeKind) -> Option<NodeKey> {
        let mut current = self.parent(key);
        while let Some(k) = current {
            if self.kind(k) == Some(kind) {
                return Some(k);
            }
            current = self.parent(k);
        }
        None
    }

    /// `key` and all of its descendants, preorder.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        if !self.contains(key) {
            return out;
        }
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            out.push(k);
            stack.extend(self.children(k).iter().rev().copied());
        }
        out
    }

    /// Every node of `kind` in document order.
    pub fn find_kind(&self, kind: NodeKind) -> Vec<NodeKey> {
        self.descendants(self.root)
            .into_iter()
            .filter(|k| self.kind(*k) == Some(kind))
            .collect()
    }

    pub fn property(&self, key: NodeKey, name: &str) -> Option<&Value> {
        self.nodes.get(&key).and_then(|n| n.properties.get(name))
    }

    pub fn properties(&self, key: NodeKey) -> Option<&BTreeMap<String, Value>> {
        self.nodes.get(&key).map(|n| &n.properties)
    }

    pub fn get_str(&self, key: NodeKey, name: &str) -> Option<&str> {
        self.property(key, name).and_then(Value::as_str)
    }

    pub fn get_int(&self, key: NodeKey, name: &str) -> Option<i64> {
        self.property(key, name).and_then(Value::as_int)
    }

    pub fn get_bool(&self, key: NodeKey, name: &str) -> Option<bool> {
        self.property(key, name).and_then(Value::as_bool)
    }

    pub fn get_float(&self, key: NodeKey, name: &str) -> Option<f64> {
        self.property(key, name).and_then(Value::as_float)
    }

    /// Deep copy of the subtree at `key`, keys included.
    pub fn snapshot(&self, key: NodeKey) -> Option<DetachedNode> {
        let data = self.nodes.get(&key)?;
        Some(DetachedNode {
            kind: data.kind,
            key: Some(key),
            properties: data.properties.clone(),
            children: data
                .children
                .iter()
                .filter_map(|c| self.snapshot(*c))
                .collect(),
        })
    }

    // ── Mutation ────────────────────────────────────────────────

    /// Attach `node` under `parent` at `index` (`None` appends).
    pub fn add_child(
        &mut self,
        parent: NodeKey,
        node: DetachedNode,
        index: Option<usize>,
    ) -> TreeResult<NodeKey> {
        let len = self
            .nodes
            .get(&parent)
            .map(|n| n.children.len())
            .ok_or(TreeError::UnknownNode(parent))?;
        let index = index.unwrap_or(len);
        if index > len {
            return Err(TreeError::IndexOutOfRange { parent, index, len });
        }
        let mut keys = Vec::new();
        node.collect_keys(&mut keys);
        for (i, key) in keys.iter().enumerate() {
            if self.nodes.contains_key(key) || keys[..i].contains(key) {
                return Err(TreeError::AlreadyAttached(*key));
            }
        }
        if let Some(max) = keys.iter().map(|k| k.0).max() {
            self.next_key = self.next_key.max(max + 1);
        }

        let child = self.insert_subtree(node, Some(parent));
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.insert(index, child);
        }
        log::trace!(target: "tree", "added {} under {} at {}", child, parent, index);
        self.notify(TreeEvent::NodeAdded {
            parent,
            child,
            index,
        });
        Ok(child)
    }

    /// Detach the subtree at `key` and return it with its keys.
    pub fn remove_child(&mut self, key: NodeKey) -> TreeResult<DetachedNode> {
        if key == self.root {
            return Err(TreeError::RemoveRoot);
        }
        let parent = self.parent(key).ok_or(TreeError::UnknownNode(key))?;
        let index = self.index_of(key).ok_or(TreeError::UnknownNode(key))?;
        self.notify(TreeEvent::WillRemove {
            parent,
            child: key,
            index,
        });

        // A listener may have rearranged things while handling WillRemove.
        let parent = self.parent(key).ok_or(TreeError::UnknownNode(key))?;
        let index = self.index_of(key).ok_or(TreeError::UnknownNode(key))?;
        let detached = self.snapshot(key).ok_or(TreeError::UnknownNode(key))?;
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.remove(index);
        }
        for k in self.descendants_unchecked(key) {
            self.nodes.remove(&k);
        }
        log::trace!(target: "tree", "removed {} from {} at {}", key, parent, index);
        self.notify(TreeEvent::NodeRemoved {
            parent,
            child: detached.clone(),
            index,
        });
        Ok(detached)
    }

    /// Move a child of `parent` from index `from` to index `to`.
    pub fn move_child(&mut self, parent: NodeKey, from: usize, to: usize) -> TreeResult {
        let data = self
            .nodes
            .get_mut(&parent)
            .ok_or(TreeError::UnknownNode(parent))?;
        let len = data.children.len();
        for index in [from, to] {
            if index >= len {
                return Err(TreeError::IndexOutOfRange { parent, index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        let child = data.children.remove(from);
        data.children.insert(to, child);
        self.notify(TreeEvent::OrderChanged { parent, from, to });
        Ok(())
    }

    /// Set a property. Returns `Ok(false)` when the value was already equal.
    pub fn set_property(
        &mut self,
        key: NodeKey,
        name: &str,
        value: impl Into<Value>,
    ) -> TreeResult<bool> {
        let value = value.into();
        let data = self.nodes.get_mut(&key).ok_or(TreeError::UnknownNode(key))?;
        if data.properties.get(name) == Some(&value) {
            return Ok(false);
        }
        let old = data.properties.insert(name.to_string(), value);
        self.notify(TreeEvent::PropertyChanged {
            node: key,
            name: name.to_string(),
            old,
        });
        Ok(true)
    }

    pub fn remove_property(&mut self, key: NodeKey, name: &str) -> TreeResult<Option<Value>> {
        let data = self.nodes.get_mut(&key).ok_or(TreeError::UnknownNode(key))?;
        let old = data.properties.remove(name);
        if old.is_some() {
            self.notify(TreeEvent::PropertyChanged {
                node: key,
                name: name.to_string(),
                old: old.clone(),
            });
        }
        Ok(old)
    }

    // ── Listeners ───────────────────────────────────────────────

    pub fn add_listener(&mut self, listener: &SharedListener) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Suppress notifications until the matching `unmute`. Mutes nest.
    pub fn mute(&mut self) {
        self.mute_depth += 1;
    }

    pub fn unmute(&mut self) {
        if self.mute_depth == 0 {
            log::warn!(target: "tree", "unmute without mute");
            return;
        }
        self.mute_depth -= 1;
    }

    pub fn is_muted(&self) -> bool {
        self.mute_depth > 0
    }

    fn notify(&mut self, event: TreeEvent) {
        if self.is_muted() {
            return;
        }
        for (id, listener) in self.listeners.snapshot() {
            match listener.try_borrow_mut() {
                Ok(mut l) => l.on_tree_event(self, &event),
                Err(_) => log::trace!(
                    target: "tree",
                    "listener {:?} busy, skipping re-entrant {}",
                    id,
                    event.name()
                ),
            };
        }
    }

    // ── Internals ───────────────────────────────────────────────

    fn allocate_key(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        key
    }

    fn insert_subtree(&mut self, node: DetachedNode, parent: Option<NodeKey>) -> NodeKey {
        let key = match node.key {
            Some(k) => k,
            None => self.allocate_key(),
        };
        self.nodes.insert(
            key,
            NodeData {
                kind: node.kind,
                properties: node.properties,
                children: Vec::with_capacity(node.children.len()),
                parent,
            },
        );
        for child in node.children {
            let child_key = self.insert_subtree(child, Some(key));
            if let Some(data) = self.nodes.get_mut(&key) {
                data.children.push(child_key);
            }
        }
        key
    }

    fn descendants_unchecked(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            out.push(k);
            stack.extend(self.children(k).iter().copied());
        }
        out
    }
}
