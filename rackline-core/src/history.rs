use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rackline_types::Tree;

use crate::command::{Command, MergeResult};

/// Linear undo/redo over performed commands.
///
/// Each entry is a command that has already been applied to the tree. Undo
/// moves the newest entry to the redo side after reversing it; any new push
/// clears the redo side.
pub struct UndoHistory {
    undo_stack: VecDeque<Command>,
    redo_stack: VecDeque<Command>,
    max_depth: usize,
    window: Duration,
    last_push_time: Option<Instant>,
    /// Nesting depth and number of entries pushed since the outermost
    /// `begin_coalescing`.
    scope: Option<(usize, usize)>,
}

impl UndoHistory {
    pub fn new(max_depth: usize, window: Duration) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
            window,
            last_push_time: None,
            scope: None,
        }
    }

    /// Record a command that was already performed on the tree.
    ///
    /// Outside a coalescing scope, a push that follows the previous one
    /// within the coalesce window is offered to it through `try_merge`.
    pub fn push_performed(&mut self, command: Command) {
        if command.is_empty_composite() {
            return;
        }
        let now = Instant::now();
        self.redo_stack.clear();

        if let Some((_, pushed)) = self.scope.as_mut() {
            *pushed += 1;
            self.push_back(command);
            self.last_push_time = Some(now);
            return;
        }

        let within_window = self
            .last_push_time
            .is_some_and(|t| now.duration_since(t) < self.window);
        self.last_push_time = Some(now);

        if within_window {
            if let Some(last) = self.undo_stack.back_mut() {
                match last.try_merge(&command, true) {
                    MergeResult::Merged => {
                        log::debug!(target: "history", "coalesced '{}'", command.name());
                        return;
                    }
                    MergeResult::Cancelled => {
                        log::debug!(
                            target: "history",
                            "'{}' cancelled previous entry",
                            command.name()
                        );
                        self.undo_stack.pop_back();
                        self.last_push_time = None;
                        return;
                    }
                    MergeResult::Rejected => {}
                }
            }
        }
        self.push_back(command);
    }

    /// Perform `command` and record it when it changed the tree.
    pub fn execute(&mut self, mut command: Command, tree: &mut Tree) -> bool {
        if !command.perform(tree) {
            log::debug!(target: "history", "'{}' had no effect", command.name());
            return false;
        }
        self.push_performed(command);
        true
    }

    pub fn undo(&mut self, tree: &mut Tree) -> bool {
        self.close_scope();
        self.last_push_time = None;
        let Some(mut command) = self.undo_stack.pop_back() else {
            return false;
        };
        log::debug!(target: "history", "undo '{}'", command.name());
        command.undo(tree);
        self.redo_stack.push_back(command);
        true
    }

    pub fn redo(&mut self, tree: &mut Tree) -> bool {
        self.close_scope();
        self.last_push_time = None;
        let Some(mut command) = self.redo_stack.pop_back() else {
            return false;
        };
        log::debug!(target: "history", "redo '{}'", command.name());
        if !command.perform(tree) {
            log::warn!(target: "history", "redo of '{}' had no effect; dropped", command.name());
            return false;
        }
        self.push_back(command);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.last_push_time = None;
        self.scope = None;
    }

    /// Start collecting pushes into a single entry (a drag, a preview).
    /// Scopes nest; only the outermost `end_coalescing` closes it.
    pub fn begin_coalescing(&mut self) {
        match self.scope.as_mut() {
            Some((depth, _)) => *depth += 1,
            None => self.scope = Some((1, 0)),
        }
    }

    pub fn end_coalescing(&mut self) {
        match self.scope.as_mut() {
            Some((depth, _)) if *depth > 1 => *depth -= 1,
            Some(_) => self.close_scope(),
            None => log::warn!(target: "history", "end_coalescing without begin"),
        }
    }

    pub fn is_coalescing(&self) -> bool {
        self.scope.is_some()
    }

    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn undo_name(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.name())
    }

    pub fn redo_name(&self) -> Option<&str> {
        self.redo_stack.back().map(|c| c.name())
    }

    fn push_back(&mut self, command: Command) {
        if self.undo_stack.len() >= self.max_depth {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(command);
    }

    /// Fold everything pushed during the scope into one simplified entry.
    fn close_scope(&mut self) {
        let Some((_, pushed)) = self.scope.take() else {
            return;
        };
        let pushed = pushed.min(self.undo_stack.len());
        if pushed == 0 {
            return;
        }
        let start = self.undo_stack.len() - pushed;
        let children: Vec<Command> = self.undo_stack.drain(start..).collect();
        let name = children[0].name().to_string();
        match Command::composite(&name, children).simplify() {
            Some(entry) => self.undo_stack.push_back(entry),
            None => log::debug!(target: "history", "coalescing scope cancelled out"),
        }
        self.last_push_time = None;
    }
}
