mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use common::{doc_edges, id, is_edge_op, live_edges, recorded_project, STEREO_FX, SYNTH};
use rackline_audio::{GraphOp, GraphSync, RecordingGraph};
use rackline_core::command::{Command, CreateConnection, DeleteConnection};
use rackline_types::{
    processor_node, project_node, track_node, Edge, Endpoint, NodeIdAllocator, SharedListener,
    Tree, TRACK_PALETTE,
};

#[test]
fn producer_on_a_track_feeds_the_master() {
    let (mut project, graph) = recorded_project();
    // Master: input 4, output 5. Track: input 6, output 7.
    project.create_track("Master", true).unwrap();
    let track = project.create_track("Keys", false).unwrap();
    let synth = project.add_processor(&track, SYNTH, 0).unwrap();
    assert_eq!(synth, id(8));

    let edges = doc_edges(&project);
    let from_synth: Vec<&Edge> = edges.iter().filter(|e| e.source.node == synth).collect();
    assert_eq!(from_synth.len(), 1);
    assert_eq!(from_synth[0].dest, Endpoint::new(id(5), 0));
    // MIDI comes from the track input; the track output is not fed.
    assert!(edges.contains(&Edge::new(Endpoint::midi(id(6)), Endpoint::midi(synth))));
    assert!(!edges.iter().any(|e| e.dest.node == id(7)));
    // Only the master reaches the hardware output.
    assert!(!edges.iter().any(|e| e.source.node == id(7)));
    assert!(edges.contains(&Edge::new(Endpoint::new(id(5), 0), Endpoint::new(id(3), 0))));

    assert_eq!(live_edges(&project), edges);
    assert!(graph.count(|op| matches!(op, GraphOp::AddNode(n) if *n == synth)) == 1);
}

#[test]
fn deleting_an_effect_disconnects_before_removal() {
    let (mut project, graph) = recorded_project();
    let track = project.create_track("Bus", false).unwrap();
    let fx = project.add_processor(&track, STEREO_FX, 0).unwrap();
    graph.clear();

    assert!(project.delete_processor(fx));
    let removed = graph
        .position(|op| matches!(op, GraphOp::RemoveNode(n) if *n == fx))
        .unwrap();
    let last_disconnect = graph
        .operations()
        .iter()
        .rposition(|op| {
            matches!(op, GraphOp::Disconnect(e) if e.source.node == fx || e.dest.node == fx)
        })
        .unwrap();
    assert!(last_disconnect < removed);
    assert_eq!(live_edges(&project), doc_edges(&project));
}

#[test]
fn paused_sync_applies_only_the_net_change() {
    let graph = Arc::new(RecordingGraph::new());
    let factory = common::factory();
    let fx = factory.describe(STEREO_FX).unwrap();
    let mut root = project_node("Raw", vec![], vec![], 8, 8);
    root.children[2].children.push(track_node(
        "T",
        TRACK_PALETTE[0],
        false,
        8,
        processor_node(&fx, id(1), 0),
        processor_node(&fx, id(2), 0),
    ));
    let mut tree = Tree::from_detached(root);

    let sync = Rc::new(RefCell::new(GraphSync::new(
        graph.clone(),
        factory,
        NodeIdAllocator::new(),
    )));
    sync.borrow_mut().attach(&mut tree);
    let shared: SharedListener = sync.clone();
    tree.add_listener(&shared);
    graph.clear();

    let edge = Edge::new(Endpoint::new(id(1), 0), Endpoint::new(id(2), 0));
    sync.borrow_mut().pause();
    for _ in 0..2 {
        let mut create: Command = CreateConnection::new(edge, true).into();
        assert!(create.perform(&mut tree));
        let mut delete: Command = DeleteConnection::for_edge(&tree, &edge).unwrap().into();
        assert!(delete.perform(&mut tree));
    }
    sync.borrow_mut().resume();
    assert_eq!(graph.count(is_edge_op), 0);

    sync.borrow_mut().pause();
    let mut create: Command = CreateConnection::new(edge, true).into();
    assert!(create.perform(&mut tree));
    assert_eq!(graph.count(is_edge_op), 0);
    sync.borrow_mut().resume();
    assert_eq!(graph.operations(), vec![GraphOp::Connect(edge)]);
}

#[test]
fn preview_drag_touches_the_graph_once() {
    let (mut project, graph) = recorded_project();
    let track = project.create_track("Bus", false).unwrap();
    let a = project.add_processor(&track, STEREO_FX, 0).unwrap();
    project.add_processor(&track, STEREO_FX, 1).unwrap();
    let entries = project.history().len();
    graph.clear();

    assert!(project.begin_preview());
    for slot in [1, 2, 3, 2] {
        assert!(project.move_processor(a, &track, slot));
        assert_eq!(graph.count(is_edge_op), 0);
    }
    assert!(project.end_preview(true));

    assert_eq!(project.history().len(), entries + 1);
    assert_eq!(live_edges(&project), doc_edges(&project));
    assert!(graph.count(is_edge_op) > 0);
    assert!(graph.count(|op| matches!(op, GraphOp::RemoveNode(_))) == 0);

    // The whole drag undoes as one step.
    assert!(project.undo());
    let slot = project
        .view()
        .unwrap()
        .processor_by_node_id(a)
        .unwrap()
        .slot();
    assert_eq!(slot, 0);
    assert_eq!(live_edges(&project), doc_edges(&project));
}

#[test]
fn custom_routing_survives_layout_changes() {
    let (mut project, _) = recorded_project();
    let track = project.create_track("Bus", false).unwrap();
    let fx = project.add_processor(&track, STEREO_FX, 0).unwrap();
    // Send the effect straight to the hardware output.
    let custom = Edge::new(Endpoint::new(fx, 0), Endpoint::new(id(3), 0));
    assert!(project.add_connection(custom.source, custom.dest));

    project.add_processor(&track, STEREO_FX, 1).unwrap();
    let edges = doc_edges(&project);
    assert!(edges.contains(&custom));
    assert!(!edges.iter().any(|e| e.source.node == fx && e.dest.node != id(3)));
    assert_eq!(live_edges(&project), edges);
}
