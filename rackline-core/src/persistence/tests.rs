use std::rc::Rc;
use std::sync::Arc;

use super::*;
use rackline_audio::{builtin, BuiltinFactory, ProcessGraph};
use rackline_types::{
    connection_node, project_node, props, Edge, Endpoint, NodeId, NodeKind, ProjectView,
};

use crate::config::Config;
use crate::devices::{DeviceKind, StaticDevices};
use crate::project::Host;

fn host() -> Host {
    Host {
        graph: Arc::new(ProcessGraph::new()),
        factory: Rc::new(BuiltinFactory::new()),
        devices: Box::new(StaticDevices::new()),
    }
}

fn sample_project() -> Project {
    let mut project = Project::new("Saved", host(), &Config::default()).unwrap();
    let uuid = project.create_track("Drums", false).unwrap();
    let gain = project.add_processor(&uuid, builtin::GAIN, 1).unwrap();
    project.set_parameter(gain, 0, 0.3);
    project
}

fn bare_project() -> DetachedNode {
    project_node("Bare", vec![], vec![], 8, 8)
}

fn text_of(root: DetachedNode) -> String {
    to_json(&Tree::from_detached(root)).unwrap()
}

#[test]
fn save_then_load_restores_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.rackline");
    let mut project = sample_project();
    save_project(&path, &mut project).unwrap();
    assert!(!path.with_extension("rackline.tmp").exists());

    let mut devices = StaticDevices::new();
    let loaded = load_project(&path, &mut devices).unwrap();
    assert!(loaded.warnings.is_empty());
    let saved = project.tree().snapshot(project.tree().root()).unwrap();
    let restored = loaded.tree.snapshot(loaded.tree.root()).unwrap();
    assert!(restored.same_structure(&saved));
}

#[test]
fn loaded_project_goes_live_with_saved_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.rackline");
    let mut project = sample_project();
    save_project(&path, &mut project).unwrap();
    let gain = NodeId::new(6);
    let edges = project.graph().connections().len();
    drop(project);

    let mut devices = StaticDevices::new();
    let loaded = load_project(&path, &mut devices).unwrap();
    let reopened = Project::open(loaded.tree, host(), &Config::default()).unwrap();
    assert!(reopened.is_live(gain));
    assert_eq!(reopened.graph().connections().len(), edges);
    let cell = reopened.sync().parameter_cell(gain, 0).unwrap();
    assert!((cell.value() - 0.3).abs() < 1e-6);
    assert!(!reopened.can_undo());
}

#[test]
fn file_format_is_nested_type_props_children() {
    let text = text_of(bare_project());
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["type"], "PROJECT");
    assert_eq!(json["props"]["name"], "Bare");
    assert_eq!(json["children"].as_array().unwrap().len(), 5);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_project(&dir.path().join("absent.rackline"), &mut StaticDevices::new())
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Io { .. }));
}

#[test]
fn malformed_files_are_rejected() {
    let mut devices = StaticDevices::new();
    assert!(matches!(
        load::from_text("{ not json", &mut devices),
        Err(PersistenceError::Parse(_))
    ));
    assert!(matches!(
        load::from_text(r#"{"type":"TRACKS"}"#, &mut devices),
        Err(PersistenceError::Malformed(_))
    ));
    assert!(matches!(
        load::from_text(r#"{"type":"WIDGET"}"#, &mut devices),
        Err(PersistenceError::Malformed(_))
    ));

    let mut root = bare_project();
    root.children.retain(|c| c.kind != NodeKind::View);
    assert!(matches!(
        load::from_text(&text_of(root), &mut devices),
        Err(PersistenceError::Malformed(_))
    ));
}

#[test]
fn two_masters_are_rejected() {
    let mut tree = Project::new("M", host(), &Config::default()).unwrap();
    tree.create_track("Master", true).unwrap();
    let mut root = tree.tree().snapshot(tree.tree().root()).unwrap();
    let tracks = root
        .children
        .iter_mut()
        .find(|c| c.kind == NodeKind::Tracks)
        .unwrap();
    let copy = tracks.children[0].clone().without_keys();
    tracks.children.push(copy);

    let err = load::from_text(&text_of(root.without_keys()), &mut StaticDevices::new())
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Malformed(_)));
}

#[test]
fn dangling_connections_are_dropped_with_a_warning() {
    let mut root = bare_project();
    let edge = Edge::new(
        Endpoint::new(NodeId::new(40), 0),
        Endpoint::new(NodeId::new(41), 0),
    );
    root.children[3].children.push(connection_node(edge, true));

    let loaded = load::from_text(&text_of(root), &mut StaticDevices::new()).unwrap();
    assert_eq!(loaded.warnings.len(), 1);
    assert!(ProjectView::wrap(&loaded.tree).unwrap().connections().is_empty());
}

#[test]
fn unavailable_device_selection_is_dropped() {
    let root = bare_project();
    let mut tree = Tree::from_detached(root);
    let view = ProjectView::wrap(&tree).unwrap().view_key().unwrap();
    tree.set_property(view, props::AUDIO_OUTPUT_DEVICE, "Gone").unwrap();
    tree.set_property(view, props::MIDI_INPUT_DEVICE, "Keys").unwrap();
    let text = to_json(&tree).unwrap();

    let mut devices = StaticDevices::new().with(DeviceKind::MidiInput, "Keys");
    let loaded = load::from_text(&text, &mut devices).unwrap();
    assert_eq!(loaded.warnings.len(), 1);
    assert!(loaded.warnings[0].contains("Gone"));
    assert!(devices.is_enabled(DeviceKind::MidiInput, "Keys"));

    let view = ProjectView::wrap(&loaded.tree).unwrap().view_key().unwrap();
    assert_eq!(loaded.tree.get_str(view, props::AUDIO_OUTPUT_DEVICE), None);
    assert_eq!(loaded.tree.get_str(view, props::MIDI_INPUT_DEVICE), Some("Keys"));
}

#[test]
fn newer_layout_version_loads_with_a_warning() {
    let mut root = bare_project();
    root.set(props::PROJECT_VERSION, 99i64);
    let loaded = load::from_text(&text_of(root), &mut StaticDevices::new()).unwrap();
    assert_eq!(loaded.warnings.len(), 1);
    assert!(loaded.warnings[0].contains("99"));
}

#[test]
fn duplicate_node_ids_lose_the_later_id() {
    let project = sample_project();
    let mut root = project.tree().snapshot(project.tree().root()).unwrap().without_keys();
    let lane = &mut root.children[2].children[0].children[0].children[0];
    let copy = lane.children[0].clone();
    lane.children.push(copy);

    let loaded = load::from_text(&text_of(root), &mut StaticDevices::new()).unwrap();
    assert_eq!(loaded.warnings.len(), 1);
    let ids: Vec<_> = loaded
        .tree
        .find_kind(NodeKind::Processor)
        .into_iter()
        .filter(|k| loaded.tree.get_int(*k, props::NODE_ID) == Some(6))
        .collect();
    assert_eq!(ids.len(), 1);
}
