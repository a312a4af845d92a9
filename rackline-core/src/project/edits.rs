//! The command-invocation surface. Each entry point builds one command and
//! hands it to `Project::run`; `false`/`None` means nothing changed.

use rackline_audio::builtin;
use rackline_types::{
    processor_node, props, track_node, DetachedNode, Edge, Endpoint, NodeId, NodeKey, NodeKind,
    ProcessorRole, ProjectView, Tree, Value, TRACK_PALETTE,
};

use super::Project;
use crate::command::{
    AddNode, Command, CreateConnection, DeleteConnection, MoveNode, RemoveNode, ReparentNode,
    SetProperty,
};
use crate::devices::DeviceKind;
use crate::routing;
use crate::slots::{self, GridWindow};

impl Project {
    /// Add a track with its fixed input and output processors. Returns the
    /// new track's uuid.
    pub fn create_track(&mut self, name: &str, master: bool) -> Option<String> {
        let project = self.view()?;
        if master && project.master_track().is_some() {
            log::debug!(target: "project", "a master track already exists");
            return None;
        }
        let tracks = project.tracks_key()?;
        let colour = TRACK_PALETTE[project.tracks().len() % TRACK_PALETTE.len()];

        let input = self.build_processor(builtin::TRACK_INPUT, 0)?;
        let output = self.build_processor(builtin::TRACK_OUTPUT, 0)?;
        let node = track_node(name, colour, master, self.default_slots, input, output);
        let uuid = node.property(props::UUID)?.as_str()?.to_string();

        let command = AddNode::new(tracks, None, node).into();
        self.run("Create Track", command, false).then_some(uuid)
    }

    /// Remove a track and every connection touching its processors.
    pub fn delete_track(&mut self, uuid: &str) -> bool {
        let Some(project) = self.view() else {
            return false;
        };
        let Some(track) = project.track_by_uuid(uuid) else {
            return false;
        };
        let ids: Vec<NodeId> = track
            .all_processors()
            .iter()
            .filter_map(|p| p.node_id())
            .collect();
        let mut children = disconnect_all(&self.tree, &ids);
        children.push(RemoveNode::new(track.key()).into());
        self.run("Delete Track", Command::composite("Delete Track", children), false)
    }

    /// Instantiate `identifier` into `slot` of the track's lane, shifting
    /// occupants as needed. Returns the new processor's node-id.
    pub fn add_processor(
        &mut self,
        track_uuid: &str,
        identifier: &str,
        slot: u32,
    ) -> Option<NodeId> {
        let lane = self.view()?.track_by_uuid(track_uuid)?.lane()?.key();
        let plan = slots::plan_insert(&self.tree, lane, slot, None)?;
        let node = self.build_processor(identifier, slot)?;
        let id = node_id_of(&node)?;

        let mut children = plan.commands();
        children.push(AddNode::new(lane, Some(plan.index), node).into());
        self.run("Add Processor", Command::composite("Add Processor", children), false)
            .then_some(id)
    }

    /// Remove a lane processor. Its connections are deleted first. The fixed
    /// track and global processors cannot be deleted this way.
    pub fn delete_processor(&mut self, id: NodeId) -> bool {
        let Some((key, _)) = self.lane_member(id) else {
            return false;
        };
        let mut children = disconnect_all(&self.tree, &[id]);
        children.push(RemoveNode::new(key).into());
        self.run("Delete Processor", Command::composite("Delete Processor", children), false)
    }

    /// Move a lane processor to `slot` of the given track's lane.
    pub fn move_processor(&mut self, id: NodeId, track_uuid: &str, slot: u32) -> bool {
        let Some((key, from_lane)) = self.lane_member(id) else {
            return false;
        };
        let Some(lane) = self
            .view()
            .and_then(|p| p.track_by_uuid(track_uuid))
            .and_then(|t| t.lane())
            .map(|l| l.key())
        else {
            return false;
        };

        let same_lane = lane == from_lane;
        let Some(plan) = slots::plan_insert(&self.tree, lane, slot, same_lane.then_some(key)) else {
            return false;
        };
        let mut children = plan.commands();
        children.push(SetProperty::new(key, props::SLOT, slot).into());
        if same_lane {
            children.push(MoveNode::new(key, plan.index).into());
        } else {
            children.push(ReparentNode::new(key, lane, plan.index).into());
        }
        self.run("Move Processor", Command::composite("Move Processor", children), false)
    }

    /// Copy a lane processor, plugin state included, into the slot after it.
    pub fn duplicate_processor(&mut self, id: NodeId) -> Option<NodeId> {
        let (key, lane) = self.lane_member(id)?;
        self.capture_state();
        let mut node = self.tree.snapshot(key)?.without_keys();
        let slot = node
            .property(props::SLOT)
            .and_then(|v| v.as_int())
            .unwrap_or(0)
            .max(0) as u32
            + 1;
        let copy = self.allocator.allocate();
        node.set(props::NODE_ID, copy.get());
        node.set(props::SLOT, slot);

        let plan = slots::plan_insert(&self.tree, lane, slot, None)?;
        let mut children = plan.commands();
        children.push(AddNode::new(lane, Some(plan.index), node).into());
        self.run("Duplicate Processor", Command::composite("Duplicate Processor", children), false)
            .then_some(copy)
    }

    /// Add a custom connection. An existing default connection on the same
    /// pins is replaced; connections that would close a loop are refused.
    pub fn add_connection(&mut self, source: Endpoint, dest: Endpoint) -> bool {
        let edge = Edge::new(source, dest);
        if routing::are_connected(&self.tree, dest.node, source.node) {
            log::debug!(target: "project", "refusing {}: would close a loop", edge);
            return false;
        }
        let existing = self
            .view()
            .and_then(|p| p.find_connection(&edge))
            .map(|c| (c.key(), c.is_custom()));
        let command = match existing {
            Some((_, true)) => return false,
            Some((key, false)) => Command::composite(
                "Connect",
                vec![
                    DeleteConnection::new(&self.tree, key).into(),
                    CreateConnection::new(edge, true).into(),
                ],
            ),
            None => {
                if let Err(reason) = CreateConnection::validate(&self.tree, &edge) {
                    log::debug!(target: "project", "refusing {}: {}", edge, reason);
                    return false;
                }
                CreateConnection::new(edge, true).into()
            }
        };
        self.run("Connect", command, false)
    }

    /// Remove a custom connection. Default connections follow the layout and
    /// are not removed directly.
    pub fn remove_connection(&mut self, source: Endpoint, dest: Endpoint) -> bool {
        let edge = Edge::new(source, dest);
        let Some((key, custom)) = self
            .view()
            .and_then(|p| p.find_connection(&edge))
            .map(|c| (c.key(), c.is_custom()))
        else {
            return false;
        };
        if !custom {
            log::debug!(target: "project", "{} is a default connection", edge);
            return false;
        }
        let command = DeleteConnection::new(&self.tree, key).into();
        self.run("Disconnect", command, false)
    }

    pub fn set_bypass(&mut self, id: NodeId, bypassed: bool) -> bool {
        let Some(key) = self.processor_key(id) else {
            return false;
        };
        let command = SetProperty::new(key, props::BYPASSED, bypassed).into();
        self.run("Bypass", command, false)
    }

    pub fn set_allow_default_connections(&mut self, id: NodeId, allow: bool) -> bool {
        let Some(key) = self.processor_key(id) else {
            return false;
        };
        let command = SetProperty::new(key, props::ALLOW_DEFAULT_CONNECTIONS, allow).into();
        self.run("Default Connections", command, false)
    }

    /// Set a normalized parameter value. Rapid changes to the same parameter
    /// coalesce into one history entry.
    pub fn set_parameter(&mut self, id: NodeId, index: usize, value: f32) -> bool {
        let Some(key) = self.processor_key(id) else {
            return false;
        };
        let Some(param) = self.tree.children_of_kind(key, NodeKind::Parameter).into_iter().find(
            |p| self.tree.get_int(*p, props::INDEX) == Some(index as i64),
        ) else {
            return false;
        };
        let command = SetProperty::new(param, props::VALUE, value.clamp(0.0, 1.0) as f64).into();
        self.run("Set Parameter", command, false)
    }

    /// Point the global inputs at the focused track.
    pub fn reset_external_inputs(&mut self) -> bool {
        self.reroute("Reset Inputs", true)
    }

    /// Focus a track: mark it selected, remember it in VIEW and scroll the
    /// grid to it. View state is not part of undo history.
    pub fn focus_track(&mut self, uuid: &str) -> bool {
        let Some(project) = self.view() else {
            return false;
        };
        let Some(index) = project.track_index(uuid) else {
            return false;
        };
        let Some(view) = project.view_key() else {
            return false;
        };
        let tracks: Vec<(NodeKey, bool)> = project
            .tracks()
            .iter()
            .map(|t| (t.key(), t.uuid() == uuid))
            .collect();

        for (key, selected) in tracks {
            set_view_state(&mut self.tree, key, props::SELECTED, selected);
        }
        set_view_state(&mut self.tree, view, props::FOCUSED_TRACK, uuid);
        if let Some(window) = GridWindow::from_view(&self.tree) {
            window
                .scroll_to_reveal(index as u32, window.slot_offset)
                .clamp_to_project(&self.tree)
                .store(&mut self.tree);
        }
        true
    }

    /// Select a device in VIEW when the registry has it, enabling it there.
    pub fn select_device(&mut self, kind: DeviceKind, name: &str) -> bool {
        if !self.devices.is_available(kind, name) {
            log::warn!(target: "project", "{} '{}' is not available", kind, name);
            return false;
        }
        let Some(view) = self.view().and_then(|p| p.view_key()) else {
            return false;
        };
        if let Some(previous) = self.tree.get_str(view, kind.view_property()).map(str::to_string) {
            self.devices.set_enabled(kind, &previous, false);
        }
        self.devices.set_enabled(kind, name, true);
        set_view_state(&mut self.tree, view, kind.view_property(), name);
        true
    }

    // ── Lookup helpers ──────────────────────────────────────────

    fn processor_key(&self, id: NodeId) -> Option<NodeKey> {
        self.view()?.processor_by_node_id(id).map(|p| p.key())
    }

    /// The processor's key and lane when it is a lane member.
    fn lane_member(&self, id: NodeId) -> Option<(NodeKey, NodeKey)> {
        let processor = self.view()?.processor_by_node_id(id)?;
        if processor.role() != Some(ProcessorRole::LaneMember) {
            log::debug!(target: "project", "processor {} is not in a lane", id);
            return None;
        }
        Some((processor.key(), processor.lane()?.key()))
    }

    fn build_processor(&self, identifier: &str, slot: u32) -> Option<DetachedNode> {
        let Some(desc) = self.factory.describe(identifier) else {
            log::warn!(target: "project", "unknown plugin '{}'", identifier);
            return None;
        };
        Some(processor_node(&desc, self.allocator.allocate(), slot))
    }
}

fn node_id_of(node: &DetachedNode) -> Option<NodeId> {
    node.property(props::NODE_ID)
        .and_then(|v| v.as_int())
        .map(|id| NodeId::new(id as u32))
}

/// Deletes for every connection touching any of `ids`, custom ones included.
fn disconnect_all(tree: &Tree, ids: &[NodeId]) -> Vec<Command> {
    let Some(project) = ProjectView::wrap(tree) else {
        return Vec::new();
    };
    project
        .connections()
        .iter()
        .filter(|c| ids.iter().any(|id| c.touches(*id)))
        .map(|c| DeleteConnection::new(tree, c.key()).into())
        .collect()
}

fn set_view_state(tree: &mut Tree, key: NodeKey, name: &str, value: impl Into<Value>) {
    if let Err(e) = tree.set_property(key, name, value) {
        log::warn!(target: "project", "could not set {}: {}", name, e);
    }
}
