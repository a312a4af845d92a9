//! Processor slots within lanes, and the grid window over tracks and slots.

use rackline_types::{props, Lane, NodeKey, ProjectView, Track, Tree};

use crate::command::{Command, MoveNode, SetProperty};

/// Tree index at which a processor in `slot` belongs among the current lane
/// children.
pub fn insertion_index(tree: &Tree, lane: NodeKey, slot: u32) -> usize {
    Lane::wrap(tree, lane)
        .map(|l| l.processors().iter().filter(|p| p.slot() < slot).count())
        .unwrap_or(0)
}

/// Slot bookkeeping needed before a processor lands in `slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPlan {
    pub lane: NodeKey,
    pub slot: u32,
    /// Child index the inserted processor must take once `shifts` apply.
    pub index: usize,
    /// Other lane members whose slot changes.
    pub shifts: Vec<(NodeKey, u32)>,
    /// New `numSlots` when the lane has to grow.
    pub grow_to: Option<u32>,
    /// The track output processor, when the lane grows past it.
    pub output: Option<NodeKey>,
}

impl InsertPlan {
    /// Slot edits for everything except the inserted processor itself.
    pub fn commands(&self) -> Vec<Command> {
        let mut out: Vec<Command> = self
            .shifts
            .iter()
            .map(|(key, slot)| SetProperty::new(*key, props::SLOT, *slot).into())
            .collect();
        if let Some(num_slots) = self.grow_to {
            out.push(SetProperty::new(self.lane, props::NUM_SLOTS, num_slots).into());
            if let Some(output) = self.output {
                out.push(SetProperty::new(output, props::SLOT, num_slots).into());
            }
        }
        out
    }
}

/// Plan putting a processor into `slot` of `lane`.
///
/// A new arrival (or one coming from another lane) pushes every occupant at
/// or above `slot` up by one when `slot` is taken. A processor `moving`
/// within the same lane instead pulls the occupants between its old and new
/// slot toward the slot it vacates, so it always ends on the other side of
/// the processor that held `slot`. Returns `None` when `moving` already sits
/// in `slot`.
pub fn plan_insert(
    tree: &Tree,
    lane: NodeKey,
    slot: u32,
    moving: Option<NodeKey>,
) -> Option<InsertPlan> {
    let lane_view = Lane::wrap(tree, lane)?;
    let members = lane_view.processors();
    let from = moving.and_then(|m| members.iter().find(|p| p.key() == m).map(|p| p.slot()));
    if from == Some(slot) {
        return None;
    }

    let occupied = members
        .iter()
        .any(|p| Some(p.key()) != moving && p.slot() == slot);
    let mut finals: Vec<(NodeKey, u32, u32)> = Vec::new();
    for p in members.iter().filter(|p| Some(p.key()) != moving) {
        let current = p.slot();
        let next = match from {
            Some(old) if old < slot && current > old && current <= slot => current - 1,
            Some(old) if old > slot && current >= slot && current < old => current + 1,
            Some(_) => current,
            None if occupied && current >= slot => current + 1,
            None => current,
        };
        finals.push((p.key(), current, next));
    }

    let index = finals.iter().filter(|(_, _, s)| *s < slot).count();
    let shifts = finals
        .iter()
        .filter(|(_, old, new)| old != new)
        .map(|(k, _, new)| (*k, *new))
        .collect();
    let highest = finals.iter().map(|(_, _, s)| *s).chain([slot]).max().unwrap_or(slot);
    let num_slots = lane_view.num_slots();
    let grow_to = (highest >= num_slots).then_some(highest + 1);
    let output = grow_to
        .and_then(|_| lane_view.track())
        .and_then(|t| t.output_processor())
        .map(|p| p.key());

    Some(InsertPlan {
        lane,
        slot,
        index,
        shifts,
        grow_to,
        output,
    })
}

/// Commands that sort the lane by slot, renumber it `0..n`, reorder the
/// children to match and keep the track output above every lane slot.
pub fn make_slots_valid(tree: &Tree, lane: NodeKey) -> Vec<Command> {
    let Some(lane_view) = Lane::wrap(tree, lane) else {
        return Vec::new();
    };
    let members = lane_view.processors();
    let mut sorted: Vec<(usize, u32, NodeKey)> = members
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.slot(), p.key()))
        .collect();
    sorted.sort_by_key(|(i, slot, _)| (*slot, *i));

    let mut out: Vec<Command> = Vec::new();
    for (new_slot, (_, slot, key)) in sorted.iter().enumerate() {
        if *slot != new_slot as u32 {
            out.push(SetProperty::new(*key, props::SLOT, new_slot as u32).into());
        }
    }

    // Replay the reorder on a scratch list so each MoveNode sees the
    // indices it will meet when performed.
    let mut order: Vec<NodeKey> = tree
        .children(lane)
        .iter()
        .copied()
        .filter(|k| members.iter().any(|p| p.key() == *k))
        .collect();
    let offset = tree
        .children(lane)
        .iter()
        .position(|k| order.first() == Some(k))
        .unwrap_or(0);
    for (target, (_, _, key)) in sorted.iter().enumerate() {
        let Some(current) = order.iter().position(|k| k == key) else {
            continue;
        };
        if current != target {
            let moved = order.remove(current);
            order.insert(target, moved);
            out.push(MoveNode::new(*key, offset + target).into());
        }
    }

    let count = members.len() as u32;
    let num_slots = lane_view.num_slots().max(count);
    if num_slots != lane_view.num_slots() {
        out.push(SetProperty::new(lane, props::NUM_SLOTS, num_slots).into());
    }
    if let Some(output) = lane_view.track().and_then(|t| t.output_processor()) {
        if output.slot() != num_slots {
            out.push(SetProperty::new(output.key(), props::SLOT, num_slots).into());
        }
    }
    out
}

/// Slots a track shows, counting its output processor's slot.
pub fn track_slot_count(track: &Track<'_>) -> u32 {
    track
        .lanes()
        .iter()
        .map(|l| l.num_slots())
        .max()
        .unwrap_or(0)
        + 1
}

/// The visible portion of the track × slot grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridWindow {
    pub track_offset: u32,
    pub slot_offset: u32,
    pub tracks: u32,
    pub slots: u32,
}

impl GridWindow {
    pub fn from_view(tree: &Tree) -> Option<Self> {
        let view = ProjectView::wrap(tree)?.view_key()?;
        let get = |name: &str, default: i64| {
            tree.get_int(view, name).unwrap_or(default).max(0) as u32
        };
        Some(Self {
            track_offset: get(props::GRID_TRACK_OFFSET, 0),
            slot_offset: get(props::GRID_SLOT_OFFSET, 0),
            tracks: get(props::VISIBLE_TRACKS, 8).max(1),
            slots: get(props::VISIBLE_SLOTS, 8).max(1),
        })
    }

    pub fn contains(&self, track_index: u32, slot: u32) -> bool {
        (self.track_offset..self.track_offset + self.tracks).contains(&track_index)
            && (self.slot_offset..self.slot_offset + self.slots).contains(&slot)
    }

    /// The smallest scroll that brings the cell into view.
    pub fn scroll_to_reveal(&self, track_index: u32, slot: u32) -> GridWindow {
        let mut out = *self;
        if track_index < out.track_offset {
            out.track_offset = track_index;
        } else if track_index >= out.track_offset + out.tracks {
            out.track_offset = track_index + 1 - out.tracks;
        }
        if slot < out.slot_offset {
            out.slot_offset = slot;
        } else if slot >= out.slot_offset + out.slots {
            out.slot_offset = slot + 1 - out.slots;
        }
        out
    }

    /// Keep the window from scrolling past the last track or slot.
    pub fn clamp(&self, num_tracks: u32, num_slots: u32) -> GridWindow {
        GridWindow {
            track_offset: self.track_offset.min(num_tracks.saturating_sub(self.tracks)),
            slot_offset: self.slot_offset.min(num_slots.saturating_sub(self.slots)),
            ..*self
        }
    }

    /// Clamp against the project's current size.
    pub fn clamp_to_project(&self, tree: &Tree) -> GridWindow {
        let Some(project) = ProjectView::wrap(tree) else {
            return *self;
        };
        let tracks = project.tracks();
        let slots = tracks.iter().map(track_slot_count).max().unwrap_or(0);
        self.clamp(tracks.len() as u32, slots)
    }

    /// Write the offsets back into VIEW.
    pub fn store(&self, tree: &mut Tree) {
        let Some(view) = ProjectView::wrap(tree).and_then(|p| p.view_key()) else {
            return;
        };
        for (name, value) in [
            (props::GRID_TRACK_OFFSET, self.track_offset),
            (props::GRID_SLOT_OFFSET, self.slot_offset),
        ] {
            if let Err(e) = tree.set_property(view, name, value) {
                log::warn!(target: "slots", "could not store grid offset: {}", e);
            }
        }
    }
}
