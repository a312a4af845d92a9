//! # rackline-core
//!
//! Editing layer for Rackline projects: commands with undo, the default
//! routing resolver, slot layout, device selection and project files. The
//! document tree and its typed views live in `rackline-types`; the live graph
//! that mirrors it lives in `rackline-audio`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::{rc::Rc, sync::Arc};
//! use rackline_audio::{builtin, BuiltinFactory, ProcessGraph};
//! use rackline_core::{config::Config, devices::StaticDevices, project::{Host, Project}};
//!
//! let host = Host {
//!     graph: Arc::new(ProcessGraph::new()),
//!     factory: Rc::new(BuiltinFactory::new()),
//!     devices: Box::new(StaticDevices::new()),
//! };
//! let mut project = Project::new("Demo", host, &Config::load())?;
//! let track = project.create_track("Drums", false).unwrap();
//! project.add_processor(&track, builtin::GAIN, 0);
//! project.undo();
//! ```
//!
//! ## Module Overview
//!
//! - [`command`]: reversible edits (`Command`) and their coalescing rules
//! - [`history`]: bounded undo/redo stacks with time-window coalescing
//! - [`routing`]: computes default connections from the track layout
//! - [`slots`]: slot shifting, normalization and the visible grid window
//! - [`devices`]: device registry seam and VIEW selection reconciliation
//! - [`persistence`]: JSON project files
//! - [`project`]: the open project; every user edit enters here
//! - [`config`]: TOML configuration (embedded defaults + user override)

pub mod command;
pub mod config;
pub mod devices;
pub mod history;
pub mod persistence;
pub mod project;
pub mod routing;
pub mod slots;

pub use command::{Command, MergeResult};
pub use config::Config;
pub use history::UndoHistory;
pub use persistence::{load_project, save_project, LoadedProject, PersistenceError};
pub use project::{Host, Project, ProjectError};
