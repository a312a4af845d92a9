use std::collections::BTreeSet;

use rackline_types::{
    edge_of_node, props, DetachedNode, NodeId, NodeKind, Tree, Value, LAYOUT_VERSION,
};

use super::{from_json, PersistenceError};
use crate::devices::{apply_selections, DeviceRegistry};

/// A freshly loaded project tree plus what had to be dropped on the way.
#[derive(Debug)]
pub struct LoadedProject {
    pub tree: Tree,
    pub warnings: Vec<String>,
}

/// Collections every project root carries, in order.
const SECTIONS: [NodeKind; 5] = [
    NodeKind::Input,
    NodeKind::Output,
    NodeKind::Tracks,
    NodeKind::Connections,
    NodeKind::View,
];

pub(super) fn from_text(
    text: &str,
    devices: &mut dyn DeviceRegistry,
) -> Result<LoadedProject, PersistenceError> {
    let mut root = from_json(text)?;
    if root.kind != NodeKind::Project {
        return Err(PersistenceError::Malformed(format!(
            "root is {}, expected PROJECT",
            root.kind
        )));
    }
    for kind in SECTIONS {
        if !root.children.iter().any(|c| c.kind == kind) {
            return Err(PersistenceError::Malformed(format!("missing {} section", kind)));
        }
    }

    let mut warnings = Vec::new();
    let version = root
        .property(props::PROJECT_VERSION)
        .and_then(Value::as_int)
        .unwrap_or(LAYOUT_VERSION);
    if version > LAYOUT_VERSION {
        warnings.push(format!(
            "project layout version {} is newer than {}; unknown data may be ignored",
            version, LAYOUT_VERSION
        ));
    }

    check_masters(&root)?;
    drop_duplicate_ids(&mut root, &mut warnings);
    drop_dangling_connections(&mut root, &mut warnings);

    let mut tree = Tree::from_detached(root);
    warnings.extend(apply_selections(&mut tree, devices));
    for warning in &warnings {
        log::warn!(target: "persistence", "{}", warning);
    }
    Ok(LoadedProject { tree, warnings })
}

fn check_masters(root: &DetachedNode) -> Result<(), PersistenceError> {
    let masters = root
        .find_all(NodeKind::Track)
        .iter()
        .filter(|t| t.property(props::IS_MASTER).and_then(Value::as_bool) == Some(true))
        .count();
    if masters > 1 {
        return Err(PersistenceError::Malformed(format!(
            "{} master tracks",
            masters
        )));
    }
    Ok(())
}

/// A node-id seen twice keeps its first processor; later ones lose the id
/// and get a fresh one when they go live.
fn drop_duplicate_ids(root: &mut DetachedNode, warnings: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    visit_mut(root, &mut |node| {
        if node.kind != NodeKind::Processor {
            return;
        }
        let Some(id) = node.property(props::NODE_ID).and_then(Value::as_int) else {
            return;
        };
        if !seen.insert(id) {
            warnings.push(format!("duplicate node id {}; reassigned", id));
            node.properties.remove(props::NODE_ID);
        }
    });
}

fn drop_dangling_connections(root: &mut DetachedNode, warnings: &mut Vec<String>) {
    let ids: BTreeSet<NodeId> = root
        .find_all(NodeKind::Processor)
        .iter()
        .filter_map(|p| p.property(props::NODE_ID).and_then(Value::as_int))
        .filter(|id| *id > 0)
        .map(|id| NodeId::new(id as u32))
        .collect();
    let Some(connections) = root
        .children
        .iter_mut()
        .find(|c| c.kind == NodeKind::Connections)
    else {
        return;
    };
    connections.children.retain(|c| {
        let keep = c.kind == NodeKind::Connection
            && edge_of_node(c)
                .is_some_and(|e| ids.contains(&e.source.node) && ids.contains(&e.dest.node));
        if !keep {
            warnings.push("dropped connection to a missing processor".to_string());
        }
        keep
    });
}

fn visit_mut(node: &mut DetachedNode, f: &mut dyn FnMut(&mut DetachedNode)) {
    f(node);
    for child in &mut node.children {
        visit_mut(child, f);
    }
}
