//! The open project: tree, history and live graph in one place.
//!
//! Every user-facing edit goes through [`Project::run`]: the edit is probed on
//! the tree with notifications muted, the routing resolver computes its
//! follow-up against the probed state, the probe is reverted, and the edit
//! plus follow-up are performed for real as one history entry.

mod edits;

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use rackline_audio::{builtin, GraphSync, LiveGraph, PluginFactory, ProcessorState};
use rackline_types::{
    processor_node, project_node, ListenerId, NodeId, NodeIdAllocator, NodeKind, ProjectView,
    SharedListener, Tree,
};

use crate::command::Command;
use crate::config::Config;
use crate::devices::DeviceRegistry;
use crate::history::UndoHistory;
use crate::routing;
use crate::slots;

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("tree root is not a PROJECT node")]
    NotAProject,
    #[error("plugin factory cannot describe built-in '{0}'")]
    MissingBuiltin(&'static str),
}

/// The services a project talks to but does not own.
pub struct Host {
    pub graph: Arc<dyn LiveGraph>,
    pub factory: Rc<dyn PluginFactory>,
    pub devices: Box<dyn DeviceRegistry>,
}

/// An interactive edit whose intermediate steps stay out of history.
#[derive(Default)]
struct Preview {
    applied: Option<Command>,
}

pub struct Project {
    tree: Tree,
    history: UndoHistory,
    sync: Rc<RefCell<GraphSync>>,
    listener: ListenerId,
    allocator: NodeIdAllocator,
    factory: Rc<dyn PluginFactory>,
    devices: Box<dyn DeviceRegistry>,
    default_slots: u32,
    preview: Option<Preview>,
    scope_depth: usize,
}

impl Project {
    /// A new empty project with the global audio input, MIDI input and audio
    /// output devices in place.
    pub fn new(name: &str, host: Host, config: &Config) -> Result<Self, ProjectError> {
        let allocator = NodeIdAllocator::new();
        let global = |identifier: &'static str| {
            host.factory
                .describe(identifier)
                .map(|desc| processor_node(&desc, allocator.allocate(), 0))
                .ok_or(ProjectError::MissingBuiltin(identifier))
        };
        let inputs = vec![global(builtin::AUDIO_INPUT)?, global(builtin::MIDI_INPUT)?];
        let outputs = vec![global(builtin::AUDIO_OUTPUT)?];
        let root = project_node(
            name,
            inputs,
            outputs,
            config.visible_tracks(),
            config.visible_slots(),
        );
        Self::assemble(Tree::from_detached(root), allocator, host, config)
    }

    /// Wrap an existing (loaded) tree and bring the live graph up to it.
    pub fn open(tree: Tree, host: Host, config: &Config) -> Result<Self, ProjectError> {
        if tree.kind(tree.root()) != Some(NodeKind::Project) {
            return Err(ProjectError::NotAProject);
        }
        let allocator = NodeIdAllocator::new();
        if let Some(max) = ProjectView::wrap(&tree).and_then(|p| p.max_node_id()) {
            allocator.reserve(max);
        }
        Self::assemble(tree, allocator, host, config)
    }

    fn assemble(
        mut tree: Tree,
        allocator: NodeIdAllocator,
        host: Host,
        config: &Config,
    ) -> Result<Self, ProjectError> {
        let (min, max) = config.flush_interval();
        let sync = Rc::new(RefCell::new(
            GraphSync::new(host.graph, host.factory.clone(), allocator.clone())
                .with_flush_interval(min, max),
        ));
        sync.borrow_mut().attach(&mut tree);
        let shared: SharedListener = sync.clone();
        let listener = tree.add_listener(&shared);

        let project = Self {
            tree,
            history: UndoHistory::new(config.history_max_depth(), config.coalesce_window()),
            sync,
            listener,
            allocator,
            factory: host.factory,
            devices: host.devices,
            default_slots: config.default_slots(),
            preview: None,
            scope_depth: 0,
        };
        log::info!(
            target: "project",
            "opened '{}' with {} live processors",
            project.name(),
            project.sync.borrow().live_node_count()
        );
        Ok(project)
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn view(&self) -> Option<ProjectView<'_>> {
        ProjectView::wrap(&self.tree)
    }

    pub fn name(&self) -> &str {
        self.view().map(|p| p.name()).unwrap_or("")
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn sync(&self) -> Ref<'_, GraphSync> {
        self.sync.borrow()
    }

    pub fn graph(&self) -> Arc<dyn LiveGraph> {
        self.sync.borrow().graph().clone()
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.sync.borrow().is_live(id)
    }

    pub fn state_of(&self, id: NodeId) -> ProcessorState {
        self.sync.borrow().state_of(id)
    }

    pub fn devices(&self) -> &dyn DeviceRegistry {
        self.devices.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn is_previewing(&self) -> bool {
        self.preview.is_some()
    }

    // ── Edit flow ───────────────────────────────────────────────

    /// Probe `primary`, bundle the routing follow-up and perform both.
    /// Returns whether the tree changed.
    fn run(&mut self, name: &str, mut primary: Command, reset_inputs: bool) -> bool {
        self.unwind_preview_step();
        if !primary.perform_temporary(&mut self.tree) {
            log::debug!(target: "project", "'{}' rejected", name);
            return false;
        }
        let follow = routing::resolve(&self.tree, reset_inputs);
        primary.undo_temporary(&mut self.tree);

        let mut children = vec![primary];
        children.extend(follow);
        self.commit(Command::composite(name, children))
    }

    /// A routing pass with no edit in front of it.
    fn reroute(&mut self, name: &str, reset_inputs: bool) -> bool {
        self.unwind_preview_step();
        match routing::resolve(&self.tree, reset_inputs) {
            Some(follow) => self.commit(Command::composite(name, vec![follow])),
            None => false,
        }
    }

    /// Bring default connections up to date with the layout, e.g. after
    /// loading a file written by an older version.
    pub fn update_routing(&mut self) -> bool {
        self.reroute(routing::ROUTING_COMMAND, false)
    }

    fn commit(&mut self, mut command: Command) -> bool {
        self.sync.borrow_mut().pause();
        let performed = command.perform(&mut self.tree);
        self.sync.borrow_mut().resume();
        if !performed {
            return false;
        }
        match self.preview.as_mut() {
            Some(preview) => preview.applied = Some(command),
            None => self.history.push_performed(command),
        }
        true
    }

    fn unwind_preview_step(&mut self) {
        if let Some(mut previous) = self.preview.as_mut().and_then(|p| p.applied.take()) {
            self.sync.borrow_mut().pause();
            previous.undo(&mut self.tree);
            self.sync.borrow_mut().resume();
        }
    }

    pub fn undo(&mut self) -> bool {
        if self.preview.is_some() {
            self.end_preview(false);
        }
        self.close_coalescing();
        self.sync.borrow_mut().pause();
        let done = self.history.undo(&mut self.tree);
        self.sync.borrow_mut().resume();
        done
    }

    pub fn redo(&mut self) -> bool {
        if self.preview.is_some() {
            self.end_preview(false);
        }
        self.close_coalescing();
        self.sync.borrow_mut().pause();
        let done = self.history.redo(&mut self.tree);
        self.sync.borrow_mut().resume();
        done
    }

    /// Start an interactive edit. Live connection changes are held back and
    /// each edit made until `end_preview` replaces the previous one.
    pub fn begin_preview(&mut self) -> bool {
        if self.preview.is_some() {
            return false;
        }
        self.sync.borrow_mut().pause();
        self.preview = Some(Preview::default());
        true
    }

    /// Finish the interactive edit. With `commit`, the last previewed edit
    /// becomes one history entry; otherwise it is reverted. Returns whether
    /// a history entry was added.
    pub fn end_preview(&mut self, commit: bool) -> bool {
        let Some(preview) = self.preview.take() else {
            return false;
        };
        let mut pushed = false;
        if let Some(mut command) = preview.applied {
            if commit {
                self.history.push_performed(command);
                pushed = true;
            } else {
                command.undo(&mut self.tree);
            }
        }
        self.sync.borrow_mut().resume();
        pushed
    }

    /// Collect every edit until the matching `end_coalescing` into one
    /// history entry. Edits that cancel out leave no entry at all. Live
    /// connection changes are held back until the outermost scope closes.
    pub fn begin_coalescing(&mut self) {
        if self.scope_depth == 0 {
            self.sync.borrow_mut().pause();
        }
        self.scope_depth += 1;
        self.history.begin_coalescing();
    }

    /// Returns `false` when no scope was open.
    pub fn end_coalescing(&mut self) -> bool {
        if self.scope_depth == 0 {
            return false;
        }
        self.scope_depth -= 1;
        self.history.end_coalescing();
        if self.scope_depth == 0 {
            self.sync.borrow_mut().resume();
        }
        true
    }

    pub fn is_coalescing(&self) -> bool {
        self.scope_depth > 0
    }

    fn close_coalescing(&mut self) {
        while self.end_coalescing() {}
    }

    // ── Volatile state ──────────────────────────────────────────

    /// Write live plugin state into the tree.
    pub fn capture_state(&mut self) -> usize {
        self.sync.borrow_mut().capture_state(&mut self.tree)
    }

    /// Copy render-side parameter changes into the tree when due.
    pub fn poll(&mut self, now: Instant) -> usize {
        self.sync.borrow_mut().poll(&mut self.tree, now)
    }

    /// Normalize every lane's slots as one history entry.
    pub fn make_slots_valid(&mut self) -> bool {
        let lanes = self.tree.find_kind(NodeKind::Lane);
        let fixes: Vec<Command> = lanes
            .into_iter()
            .flat_map(|lane| slots::make_slots_valid(&self.tree, lane))
            .collect();
        if fixes.is_empty() {
            return false;
        }
        self.run("Normalize Slots", Command::composite("Normalize Slots", fixes), false)
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        self.tree.remove_listener(self.listener);
    }
}
