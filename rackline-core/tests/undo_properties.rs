mod common;

use common::{doc_edges, id, live_edges, recorded_project, STEREO_FX, SYNTH};
use rackline_core::project::Project;
use rackline_audio::LiveGraph;
use rackline_types::{DetachedNode, Endpoint};

fn settled(project: &mut Project) -> DetachedNode {
    project.capture_state();
    project.tree().snapshot(project.tree().root()).unwrap()
}

/// Perform `edit`, then check that undo returns to the prior tree and redo
/// to the edited one, with the live graph following along.
fn check_round_trip(project: &mut Project, label: &str, edit: impl FnOnce(&mut Project) -> bool) {
    let before = settled(project);
    assert!(edit(project), "{} did nothing", label);
    let after = settled(project);
    assert!(!after.same_structure(&before), "{} left the tree unchanged", label);

    assert!(project.undo(), "{}: undo", label);
    assert!(settled(project).same_structure(&before), "{}: undo differs", label);
    assert_eq!(live_edges(project), doc_edges(project), "{}: graph after undo", label);

    assert!(project.redo(), "{}: redo", label);
    assert!(settled(project).same_structure(&after), "{}: redo differs", label);
    assert_eq!(live_edges(project), doc_edges(project), "{}: graph after redo", label);
}

#[test]
fn every_edit_undoes_exactly() {
    let (mut project, _) = recorded_project();
    let mut master = String::new();
    let mut keys = String::new();

    check_round_trip(&mut project, "create master", |p| {
        master = p.create_track("Master", true).unwrap_or_default();
        !master.is_empty()
    });
    check_round_trip(&mut project, "create track", |p| {
        keys = p.create_track("Keys", false).unwrap_or_default();
        !keys.is_empty()
    });
    // Master 4/5, Keys 6/7, then 8 and 9.
    check_round_trip(&mut project, "add synth", |p| p.add_processor(&keys, SYNTH, 0).is_some());
    check_round_trip(&mut project, "add effect", |p| {
        p.add_processor(&keys, STEREO_FX, 0).is_some()
    });
    check_round_trip(&mut project, "move effect", |p| p.move_processor(id(9), &keys, 4));
    check_round_trip(&mut project, "effect to master", |p| {
        p.move_processor(id(9), &master, 0)
    });
    check_round_trip(&mut project, "bypass", |p| p.set_bypass(id(9), true));
    check_round_trip(&mut project, "parameter", |p| p.set_parameter(id(8), 0, 0.9));
    check_round_trip(&mut project, "custom connection", |p| {
        p.add_connection(Endpoint::new(id(8), 0), Endpoint::new(id(5), 1))
    });
    check_round_trip(&mut project, "reset inputs", |p| p.reset_external_inputs());
    check_round_trip(&mut project, "duplicate", |p| p.duplicate_processor(id(8)).is_some());
    check_round_trip(&mut project, "delete synth", |p| p.delete_processor(id(8)));
    check_round_trip(&mut project, "delete track", |p| p.delete_track(&keys));
}

#[test]
fn undoing_everything_returns_to_empty() {
    let (mut project, graph) = recorded_project();
    let empty = settled(&mut project);
    let track = project.create_track("A", false).unwrap();
    project.add_processor(&track, STEREO_FX, 0).unwrap();
    project.add_processor(&track, SYNTH, 3).unwrap();
    project.focus_track(&track);
    project.reset_external_inputs();

    while project.undo() {}
    assert!(!project.can_undo());
    // Focus is view state and survives undo.
    let mut now = settled(&mut project);
    now.children[4] = empty.children[4].clone();
    assert!(now.same_structure(&empty));
    assert!(graph.connections().is_empty());
}
