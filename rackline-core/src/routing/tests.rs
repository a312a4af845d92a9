use super::*;
use rackline_types::{
    connection_node, processor_node, project_node, props, track_node, ChannelLayout, DetachedNode,
    PluginDescription, MIDI_CHANNEL, TRACK_PALETTE,
};

const AUDIO_IN: u32 = 1;
const MIDI_IN: u32 = 2;
const AUDIO_OUT: u32 = 3;

fn stereo_fx() -> ChannelLayout {
    ChannelLayout::new(2, 2, false, false)
}

fn synth() -> ChannelLayout {
    ChannelLayout::new(0, 2, true, false)
}

fn mono_source() -> ChannelLayout {
    ChannelLayout::new(0, 1, false, false)
}

fn node(id: u32, layout: ChannelLayout, slot: u32) -> DetachedNode {
    processor_node(&PluginDescription::new("t", "T", layout), NodeId::new(id), slot)
}

fn empty_project() -> Tree {
    Tree::from_detached(project_node(
        "Routing",
        vec![
            node(AUDIO_IN, ChannelLayout::new(0, 2, false, false), 0),
            node(MIDI_IN, ChannelLayout::new(0, 0, false, true), 0),
        ],
        vec![node(AUDIO_OUT, ChannelLayout::new(2, 0, false, false), 0)],
        8,
        8,
    ))
}

/// Track with input `base`, output `base + 1`, and the given lane members.
fn add_track(tree: &mut Tree, master: bool, base: u32, lane: &[(u32, ChannelLayout)]) -> String {
    let mut track = track_node(
        "T",
        TRACK_PALETTE[0],
        master,
        8,
        node(base, ChannelLayout::new(2, 2, true, true), 0),
        node(base + 1, ChannelLayout::new(2, 2, false, false), 0),
    );
    for (slot, (id, layout)) in lane.iter().enumerate() {
        track.children[0].children[0]
            .children
            .push(node(*id, *layout, slot as u32));
    }
    let uuid = track
        .property(props::UUID)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let tracks = ProjectView::wrap(tree).unwrap().tracks_key().unwrap();
    tree.add_child(tracks, track, None).unwrap();
    uuid
}

fn add_connection(tree: &mut Tree, edge: Edge, custom: bool) {
    let connections = ProjectView::wrap(tree).unwrap().connections_key().unwrap();
    tree.add_child(connections, connection_node(edge, custom), None)
        .unwrap();
}

fn apply(tree: &mut Tree, reset: bool) {
    if let Some(mut command) = resolve(tree, reset) {
        assert!(command.perform(tree));
    }
}

fn audio(a: u32, ca: u32, b: u32, cb: u32) -> Edge {
    Edge::new(
        Endpoint::new(NodeId::new(a), ca),
        Endpoint::new(NodeId::new(b), cb),
    )
}

fn midi(a: u32, b: u32) -> Edge {
    Edge::new(Endpoint::midi(NodeId::new(a)), Endpoint::midi(NodeId::new(b)))
}

fn edges(tree: &Tree) -> BTreeSet<Edge> {
    ProjectView::wrap(tree)
        .unwrap()
        .connections()
        .iter()
        .map(|c| c.edge())
        .collect()
}

fn stereo_pair(a: u32, b: u32) -> [Edge; 2] {
    [audio(a, 0, b, 0), audio(a, 1, b, 1)]
}

fn from(tree: &Tree, id: u32) -> Vec<Edge> {
    edges(tree)
        .into_iter()
        .filter(|e| e.source.node == NodeId::new(id))
        .collect()
}

#[test]
fn chain_runs_through_lane_to_global_output() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, stereo_fx())]);
    apply(&mut tree, false);

    let mut expected = BTreeSet::new();
    expected.extend(stereo_pair(10, 12));
    expected.extend(stereo_pair(12, 11));
    expected.extend(stereo_pair(11, AUDIO_OUT));
    assert_eq!(edges(&tree), expected);
    assert!(ProjectView::wrap(&tree)
        .unwrap()
        .connections()
        .iter()
        .all(|c| !c.is_custom()));
}

#[test]
fn producer_routes_into_master_output() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, mono_source())]);
    add_track(&mut tree, true, 20, &[]);
    apply(&mut tree, false);

    assert_eq!(from(&tree, 12), vec![audio(12, 0, 21, 0)]);
    // The non-master chain is redirected, so its output stays silent.
    assert!(from(&tree, 11).is_empty());
    // The producer blocks the track input.
    assert!(from(&tree, 10).is_empty());
    assert_eq!(from(&tree, 21), stereo_pair(21, AUDIO_OUT).to_vec());
}

#[test]
fn master_lane_is_the_chain_entry() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, stereo_fx())]);
    add_track(&mut tree, true, 20, &[(22, stereo_fx())]);
    apply(&mut tree, false);

    assert_eq!(from(&tree, 12), stereo_pair(12, 22).to_vec());
    assert_eq!(from(&tree, 22), stereo_pair(22, 21).to_vec());
}

#[test]
fn midi_feeds_the_synth() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, synth()), (13, stereo_fx())]);
    apply(&mut tree, false);

    let out = from(&tree, 10);
    assert_eq!(out, vec![midi(10, 12)]);
    assert_eq!(from(&tree, 12), stereo_pair(12, 13).to_vec());
    assert_eq!(from(&tree, 13), stereo_pair(13, 11).to_vec());
}

#[test]
fn custom_output_suppresses_defaults() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, stereo_fx())]);
    let custom = audio(12, 0, AUDIO_OUT, 1);
    add_connection(&mut tree, custom, true);
    apply(&mut tree, false);

    assert_eq!(from(&tree, 12), vec![custom]);
    // Still a destination for the input.
    assert_eq!(from(&tree, 10), stereo_pair(10, 12).to_vec());
}

#[test]
fn disallowed_processor_is_not_a_source() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, stereo_fx())]);
    let key = ProjectView::wrap(&tree)
        .unwrap()
        .processor_by_node_id(NodeId::new(12))
        .unwrap()
        .key();
    tree.set_property(key, props::ALLOW_DEFAULT_CONNECTIONS, false)
        .unwrap();
    apply(&mut tree, false);

    assert!(from(&tree, 12).is_empty());
    assert_eq!(from(&tree, 10), stereo_pair(10, 12).to_vec());
}

#[test]
fn resolving_twice_is_a_no_op() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, synth()), (13, stereo_fx())]);
    add_track(&mut tree, true, 20, &[(22, stereo_fx())]);
    apply(&mut tree, true);
    assert!(resolve(&tree, false).is_none());
    assert!(resolve(&tree, true).is_none());
}

#[test]
fn stale_defaults_are_removed_and_custom_kept() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, stereo_fx())]);
    apply(&mut tree, false);

    let stale = audio(10, 0, 11, 1);
    let custom = audio(AUDIO_IN, 0, 12, 1);
    add_connection(&mut tree, stale, false);
    add_connection(&mut tree, custom, true);

    let command = resolve(&tree, false).unwrap();
    assert_eq!(command.name(), ROUTING_COMMAND);
    assert_eq!(command.leaves().len(), 1);
    apply(&mut tree, false);
    let now = edges(&tree);
    assert!(!now.contains(&stale));
    assert!(now.contains(&custom));
}

#[test]
fn removing_a_processor_reroutes_around_it() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, stereo_fx())]);
    apply(&mut tree, false);

    let project = ProjectView::wrap(&tree).unwrap();
    let fx = project.processor_by_node_id(NodeId::new(12)).unwrap().key();
    let dangling: Vec<_> = project
        .connections_touching(NodeId::new(12))
        .iter()
        .map(|c| c.key())
        .collect();
    for key in dangling {
        tree.remove_child(key).unwrap();
    }
    tree.remove_child(fx).unwrap();
    apply(&mut tree, false);

    assert_eq!(from(&tree, 10), stereo_pair(10, 11).to_vec());
}

#[test]
fn external_inputs_move_only_on_reset() {
    let mut tree = empty_project();
    let first = add_track(&mut tree, false, 10, &[(12, synth())]);
    let second = add_track(&mut tree, false, 20, &[]);
    apply(&mut tree, false);
    assert!(from(&tree, AUDIO_IN).is_empty());

    apply(&mut tree, true);
    assert_eq!(from(&tree, AUDIO_IN), stereo_pair(AUDIO_IN, 10).to_vec());
    assert_eq!(from(&tree, MIDI_IN), vec![midi(MIDI_IN, 10)]);

    let view = ProjectView::wrap(&tree).unwrap().view_key().unwrap();
    tree.set_property(view, props::FOCUSED_TRACK, second.as_str())
        .unwrap();
    apply(&mut tree, false);
    assert_eq!(from(&tree, AUDIO_IN), stereo_pair(AUDIO_IN, 10).to_vec());

    apply(&mut tree, true);
    assert_eq!(from(&tree, AUDIO_IN), stereo_pair(AUDIO_IN, 20).to_vec());
    assert_eq!(from(&tree, MIDI_IN), vec![midi(MIDI_IN, 20)]);
    assert_ne!(first, second);
}

#[test]
fn occupied_input_is_skipped() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, stereo_fx())]);
    add_connection(&mut tree, audio(12, 0, 10, 0), true);
    apply(&mut tree, true);

    // Track input has a custom incoming audio edge, so the device lands on
    // the next free lane member instead.
    let feeds: Vec<NodeId> = from(&tree, AUDIO_IN).iter().map(|e| e.dest.node).collect();
    assert!(!feeds.is_empty());
    assert!(feeds.iter().all(|n| *n == NodeId::new(12)));
}

#[test]
fn feedback_edges_are_skipped() {
    let mut tree = empty_project();
    add_track(&mut tree, false, 10, &[(12, stereo_fx())]);
    // Output loops back into the effect.
    add_connection(&mut tree, audio(11, 0, 12, 0), true);
    apply(&mut tree, false);

    assert!(from(&tree, 12).is_empty());
    assert!(are_connected(&tree, NodeId::new(11), NodeId::new(12)));
    assert!(!are_connected(&tree, NodeId::new(12), NodeId::new(11)));
    assert!(resolve(&tree, false).is_none());
}

#[test]
fn midi_pin_constant_marks_midi_edges() {
    assert_eq!(midi(1, 2).source.channel, MIDI_CHANNEL);
    assert_eq!(midi(1, 2).connection_type(), Some(ConnectionType::Midi));
}
