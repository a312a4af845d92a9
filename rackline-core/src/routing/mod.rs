//! Default signal routing.
//!
//! The resolver derives the set of default (non-custom) connections the
//! project should have from its track and lane layout, then diffs it against
//! the connections present. The result is a single composite of deletes
//! followed by creates, or `None` when routing is already current.

mod reach;

pub use reach::{are_connected, Adjacency};

use std::collections::BTreeSet;

use rackline_types::{
    ConnectionType, Edge, Endpoint, NodeId, Processor, ProjectView, Track, Tree,
};

use crate::command::{Command, CreateConnection, DeleteConnection};

/// Name given to resolver follow-up commands.
pub const ROUTING_COMMAND: &str = "Update Routing";

/// Compute the routing update for `tree`.
///
/// With `reset_external_inputs`, global input devices are re-aimed at the
/// focused track; otherwise their existing default feeds are left alone.
pub fn resolve(tree: &Tree, reset_external_inputs: bool) -> Option<Command> {
    let project = ProjectView::wrap(tree)?;
    let desired = desired_defaults(&project, reset_external_inputs);

    let mut ops: Vec<Command> = Vec::new();
    let mut present: BTreeSet<Edge> = BTreeSet::new();
    for connection in project.connections() {
        let edge = connection.edge();
        present.insert(edge);
        if !connection.is_custom() && !desired.contains(&edge) {
            log::debug!(target: "routing", "drop default {}", edge);
            ops.push(DeleteConnection::new(tree, connection.key()).into());
        }
    }
    for edge in &desired {
        if !present.contains(edge) {
            log::debug!(target: "routing", "add default {}", edge);
            ops.push(CreateConnection::new(*edge, false).into());
        }
    }

    if ops.is_empty() {
        None
    } else {
        Some(Command::composite(ROUTING_COMMAND, ops))
    }
}

/// The full set of default edges the project should carry.
pub fn desired_defaults(project: &ProjectView<'_>, reset_external_inputs: bool) -> BTreeSet<Edge> {
    let custom: Vec<Edge> = project
        .connections()
        .iter()
        .filter(|c| c.is_custom())
        .map(|c| c.edge())
        .collect();
    let mut plan = Plan {
        project: *project,
        adjacency: Adjacency::from_edges(&custom),
        custom,
        desired: BTreeSet::new(),
    };

    let master = project.master_track();
    for kind in ConnectionType::ALL {
        for track in project.tracks_in_chain_order() {
            plan.route_track(&track, master.as_ref(), kind);
        }
    }

    if reset_external_inputs {
        if let Some(track) = project.focused_track() {
            for kind in ConnectionType::ALL {
                plan.route_external_inputs(&track, kind);
            }
        }
    } else {
        plan.keep_external_inputs();
    }
    plan.desired
}

struct Plan<'a> {
    project: ProjectView<'a>,
    custom: Vec<Edge>,
    adjacency: Adjacency,
    desired: BTreeSet<Edge>,
}

impl<'a> Plan<'a> {
    fn route_track(&mut self, track: &Track<'a>, master: Option<&Track<'a>>, kind: ConnectionType) {
        let lane_members = track.processors();

        // The input processor sees every lane member as downstream.
        let mut chain: Vec<Processor<'a>> = track.input_processor().into_iter().collect();
        chain.extend(lane_members.iter().copied());

        for (position, producer) in chain.iter().enumerate() {
            if !self.is_source(producer, kind) {
                continue;
            }
            let dest = match scan(&chain[position + 1..], kind) {
                Scan::Found(dest) => Some(dest),
                Scan::Blocked => None,
                Scan::Exhausted => self.track_sink(track, master, kind),
            };
            if let Some(dest) = dest {
                self.connect(producer, &dest, kind);
            }
        }

        if let Some(output) = track.output_processor() {
            let feeds_global = track.is_master() || master.is_none();
            if feeds_global && self.is_source(&output, kind) {
                if let Some(global) = self.project.global_audio_output() {
                    if global.accepts(kind) {
                        self.connect(&output, &global, kind);
                    }
                }
            }
        }
    }

    /// Where a track's chain ends when nothing downstream in its lanes takes
    /// the signal. Only audio falls through to a sink.
    fn track_sink(
        &self,
        track: &Track<'a>,
        master: Option<&Track<'a>>,
        kind: ConnectionType,
    ) -> Option<Processor<'a>> {
        if kind != ConnectionType::Audio {
            return None;
        }
        match master {
            Some(master) if !track.is_master() => master
                .processors()
                .into_iter()
                .find(|p| p.accepts(kind))
                .or_else(|| master.output_processor().filter(|p| p.accepts(kind))),
            _ => track.output_processor().filter(|p| p.accepts(kind)),
        }
    }

    fn route_external_inputs(&mut self, track: &Track<'a>, kind: ConnectionType) {
        let mut candidates: Vec<Processor<'a>> = track.input_processor().into_iter().collect();
        candidates.extend(track.processors());

        for device in self.project.global_inputs() {
            if !self.is_source(&device, kind) {
                continue;
            }
            let target = candidates
                .iter()
                .find(|c| c.accepts(kind) && !self.has_incoming(c, kind))
                .copied();
            match target {
                Some(target) => self.connect(&device, &target, kind),
                None => {
                    log::debug!(target: "routing", "no free {:?} input on '{}'", kind, track.name())
                }
            }
        }
    }

    /// Existing default feeds from global inputs stay as long as both ends do.
    fn keep_external_inputs(&mut self) {
        let inputs: Vec<NodeId> = self
            .project
            .global_inputs()
            .iter()
            .filter_map(|p| p.node_id())
            .collect();
        let existing: Vec<Edge> = self
            .project
            .connections()
            .iter()
            .filter(|c| !c.is_custom() && inputs.contains(&c.source().node))
            .map(|c| c.edge())
            .collect();
        for edge in existing {
            let (Some(source), Some(dest)) = (
                self.project.processor_by_node_id(edge.source.node),
                self.project.processor_by_node_id(edge.dest.node),
            ) else {
                continue;
            };
            let Some(kind) = edge.connection_type() else {
                continue;
            };
            if !self.is_source(&source, kind)
                || !source.layout().has_output(edge.source.channel)
                || !dest.layout().has_input(edge.dest.channel)
                || self.adjacency.would_cycle(&edge)
            {
                continue;
            }
            self.adjacency.insert(&edge);
            self.desired.insert(edge);
        }
    }

    /// Eligible to get default outgoing connections of `kind`.
    fn is_source(&self, processor: &Processor<'a>, kind: ConnectionType) -> bool {
        let Some(id) = processor.node_id() else {
            return false;
        };
        processor.produces(kind)
            && processor.allow_default_connections()
            && !self.project.has_custom_output(id, kind)
    }

    fn has_incoming(&self, processor: &Processor<'a>, kind: ConnectionType) -> bool {
        let Some(id) = processor.node_id() else {
            return false;
        };
        self.custom
            .iter()
            .chain(self.desired.iter())
            .any(|e| e.dest.node == id && e.connection_type() == Some(kind))
    }

    fn connect(&mut self, source: &Processor<'a>, dest: &Processor<'a>, kind: ConnectionType) {
        let (Some(from), Some(to)) = (source.node_id(), dest.node_id()) else {
            return;
        };
        for edge in default_edges(from, source, to, dest, kind) {
            if self.adjacency.would_cycle(&edge) {
                log::debug!(target: "routing", "skip {}: would close a loop", edge);
                continue;
            }
            self.adjacency.insert(&edge);
            self.desired.insert(edge);
        }
    }
}

enum Scan<'a> {
    Found(Processor<'a>),
    Blocked,
    Exhausted,
}

/// First downstream processor that takes `kind`. A pure producer of `kind`
/// met first stops the search.
fn scan<'a>(downstream: &[Processor<'a>], kind: ConnectionType) -> Scan<'a> {
    for candidate in downstream {
        if candidate.accepts(kind) {
            return Scan::Found(*candidate);
        }
        if candidate.produces(kind) {
            return Scan::Blocked;
        }
    }
    Scan::Exhausted
}

/// Audio pairs output `i` with input `i`; MIDI joins the two MIDI pins.
fn default_edges(
    from: NodeId,
    source: &Processor<'_>,
    to: NodeId,
    dest: &Processor<'_>,
    kind: ConnectionType,
) -> Vec<Edge> {
    match kind {
        ConnectionType::Midi => vec![Edge::new(Endpoint::midi(from), Endpoint::midi(to))],
        ConnectionType::Audio => {
            let pairs = source.audio_outputs().min(dest.audio_inputs());
            (0..pairs)
                .map(|i| Edge::new(Endpoint::new(from, i), Endpoint::new(to, i)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests;
