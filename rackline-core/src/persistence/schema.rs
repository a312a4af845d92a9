use std::collections::BTreeMap;

use rackline_types::{DetachedNode, NodeKind, Value};
use serde::{Deserialize, Serialize};

use super::PersistenceError;

/// One node as it appears in the project file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct StoredNode {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    props: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<StoredNode>,
}

impl StoredNode {
    /// Keys are runtime identity only and are not written.
    pub(super) fn from_node(node: &DetachedNode) -> Self {
        Self {
            kind: node.kind.tag().to_string(),
            props: node.properties.clone(),
            children: node.children.iter().map(StoredNode::from_node).collect(),
        }
    }

    pub(super) fn into_node(self) -> Result<DetachedNode, PersistenceError> {
        let kind = NodeKind::from_tag(&self.kind).ok_or_else(|| {
            PersistenceError::Malformed(format!("unknown node type '{}'", self.kind))
        })?;
        let children = self
            .children
            .into_iter()
            .map(StoredNode::into_node)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DetachedNode {
            kind,
            key: None,
            properties: self.props,
            children,
        })
    }
}
