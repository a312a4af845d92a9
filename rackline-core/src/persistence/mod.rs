//! Project files: the document tree as nested JSON.
//!
//! Each node is written as `{ "type": TAG, "props": {...}, "children": [...] }`.
//! Loading rebuilds a fresh tree (new keys), checks its shape, and reports
//! anything it had to drop as warnings rather than failing the load.

mod load;
mod schema;
#[cfg(test)]
mod tests;

pub use load::LoadedProject;

use std::path::{Path, PathBuf};

use rackline_types::{DetachedNode, Tree};

use crate::devices::DeviceRegistry;
use crate::project::Project;
use schema::StoredNode;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("project file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("malformed project: {0}")]
    Malformed(String),
}

/// Capture live plugin state into the tree, then write it to `path`.
pub fn save_project(path: &Path, project: &mut Project) -> Result<(), PersistenceError> {
    project.capture_state();
    save_tree(path, project.tree())
}

/// Write the tree as-is. The file is replaced atomically: the text goes to a
/// sibling temp file which is then renamed over `path`.
pub fn save_tree(path: &Path, tree: &Tree) -> Result<(), PersistenceError> {
    let text = to_json(tree)?;
    let tmp = path.with_extension("rackline.tmp");
    let io = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(&tmp, text).map_err(io)?;
    std::fs::rename(&tmp, path).map_err(io)?;
    log::info!(target: "persistence", "saved project to {}", path.display());
    Ok(())
}

/// Read a project file, validate it and reconcile device selections.
pub fn load_project(
    path: &Path,
    devices: &mut dyn DeviceRegistry,
) -> Result<LoadedProject, PersistenceError> {
    let text = std::fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = load::from_text(&text, devices)?;
    log::info!(
        target: "persistence",
        "loaded {} ({} warnings)",
        path.display(),
        loaded.warnings.len()
    );
    Ok(loaded)
}

pub fn to_json(tree: &Tree) -> Result<String, PersistenceError> {
    let root = tree
        .snapshot(tree.root())
        .ok_or_else(|| PersistenceError::Malformed("tree has no root".to_string()))?;
    Ok(serde_json::to_string_pretty(&StoredNode::from_node(&root))?)
}

pub fn from_json(text: &str) -> Result<DetachedNode, PersistenceError> {
    let stored: StoredNode = serde_json::from_str(text)?;
    stored.into_node()
}
