#![allow(dead_code)]
//! Shared fixtures for rackline-core integration tests.

use std::rc::Rc;
use std::sync::Arc;

use rackline_audio::unit::BasicUnit;
use rackline_audio::{
    BuiltinFactory, FactoryError, GraphOp, ParameterInfo, PluginFactory, ProcessingUnit,
    RecordingGraph,
};
use rackline_core::config::Config;
use rackline_core::devices::{DeviceKind, StaticDevices};
use rackline_core::project::{Host, Project};
use rackline_types::{ChannelLayout, Edge, NodeId, PluginDescription};

/// Mono instrument: MIDI in, one audio out.
pub const SYNTH: &str = "test.synth";
/// Stereo effect with one parameter.
pub const STEREO_FX: &str = "test.stereo-fx";

/// Plugins the built-in factory does not know about.
pub struct TestPlugins;

impl TestPlugins {
    fn entry(identifier: &str) -> Option<(&'static str, ChannelLayout, Vec<ParameterInfo>)> {
        match identifier {
            SYNTH => Some((
                "Synth",
                ChannelLayout::new(0, 1, true, false),
                vec![ParameterInfo::new("Cutoff", 0.5)],
            )),
            STEREO_FX => Some((
                "Stereo FX",
                ChannelLayout::new(2, 2, false, false),
                vec![ParameterInfo::new("Mix", 1.0)],
            )),
            _ => None,
        }
    }
}

impl PluginFactory for TestPlugins {
    fn describe(&self, identifier: &str) -> Option<PluginDescription> {
        let (name, layout, _) = Self::entry(identifier)?;
        Some(PluginDescription::new(identifier, name, layout))
    }

    fn instantiate(&self, identifier: &str) -> Result<Box<dyn ProcessingUnit>, FactoryError> {
        let (_, layout, parameters) = Self::entry(identifier)
            .ok_or_else(|| FactoryError::UnknownIdentifier(identifier.to_string()))?;
        Ok(Box::new(BasicUnit::new(layout, parameters)))
    }

    fn identifiers(&self) -> Vec<String> {
        vec![SYNTH.to_string(), STEREO_FX.to_string()]
    }
}

pub fn factory() -> Rc<dyn PluginFactory> {
    Rc::new(BuiltinFactory::with_external(Box::new(TestPlugins)))
}

/// A fresh project on a recording graph. Globals are ids 1 (audio in),
/// 2 (MIDI in) and 3 (audio out).
pub fn recorded_project() -> (Project, Arc<RecordingGraph>) {
    let graph = Arc::new(RecordingGraph::new());
    let host = Host {
        graph: graph.clone(),
        factory: factory(),
        devices: Box::new(
            StaticDevices::new()
                .with(DeviceKind::AudioInput, "Line In")
                .with(DeviceKind::AudioOutput, "Speakers"),
        ),
    };
    let project = Project::new("Scenario", host, &Config::default()).unwrap();
    (project, graph)
}

pub fn id(n: u32) -> NodeId {
    NodeId::new(n)
}

pub fn doc_edges(project: &Project) -> Vec<Edge> {
    let mut edges: Vec<Edge> = project
        .view()
        .unwrap()
        .connections()
        .iter()
        .map(|c| c.edge())
        .collect();
    edges.sort();
    edges
}

pub fn live_edges(project: &Project) -> Vec<Edge> {
    let mut edges = project.graph().connections();
    edges.sort();
    edges
}

pub fn is_edge_op(op: &GraphOp) -> bool {
    matches!(op, GraphOp::Connect(_) | GraphOp::Disconnect(_))
}
