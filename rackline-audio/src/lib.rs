//! Live signal-graph side of Rackline.
//!
//! `graph` holds the topology a render thread would run, `unit` the plugin
//! boundary, `param` the lock-free parameter bridge, and `sync` the tree
//! listener that keeps all of it in step with the project document.

pub mod graph;
pub mod node_registry;
pub mod param;
pub mod sync;
pub mod unit;

pub use graph::{GraphError, GraphOp, GraphResult, LiveGraph, ProcessGraph, RecordingGraph};
pub use node_registry::{NodeRegistry, ProcessorState};
pub use param::{AdaptiveInterval, ParameterCell};
pub use sync::GraphSync;
pub use unit::{
    builtin, BuiltinFactory, FactoryError, ParameterInfo, PluginFactory, ProcessingUnit,
};
