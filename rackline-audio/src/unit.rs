//! Plugin boundary: processing units and the factories that build them.

use std::sync::Arc;

use rackline_types::{ChannelLayout, PluginDescription};
use serde::{Deserialize, Serialize};

use crate::param::ParameterCell;

/// Identifiers of the units every project can rely on.
pub mod builtin {
    pub const AUDIO_INPUT: &str = "rackline.audio-input";
    pub const AUDIO_OUTPUT: &str = "rackline.audio-output";
    pub const MIDI_INPUT: &str = "rackline.midi-input";
    pub const TRACK_INPUT: &str = "rackline.track-input";
    pub const TRACK_OUTPUT: &str = "rackline.track-output";
    pub const GAIN: &str = "rackline.gain";
    pub const TONE: &str = "rackline.tone";

    pub const ALL: [&str; 7] = [
        AUDIO_INPUT,
        AUDIO_OUTPUT,
        MIDI_INPUT,
        TRACK_INPUT,
        TRACK_OUTPUT,
        GAIN,
        TONE,
    ];
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum FactoryError {
    #[error("no plugin registered for identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("failed to instantiate '{identifier}': {reason}")]
    Instantiation { identifier: String, reason: String },
    #[error("unreadable plugin state: {0}")]
    BadState(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub default: f32,
}

impl ParameterInfo {
    pub fn new(name: &str, default: f32) -> Self {
        Self {
            name: name.to_string(),
            default,
        }
    }
}

/// A live processor instance as seen from the document side.
///
/// Parameter values are normalized to `0.0..=1.0`.
pub trait ProcessingUnit: Send {
    fn layout(&self) -> ChannelLayout;
    fn parameters(&self) -> Vec<ParameterInfo>;
    fn parameter(&self, index: usize) -> Option<f32>;
    fn set_parameter(&mut self, index: usize, value: f32);
    fn serialize(&self) -> Vec<u8>;
    fn restore(&mut self, state: &[u8]) -> Result<(), FactoryError>;
    fn set_bypassed(&mut self, bypassed: bool);

    /// Hand the unit the cells it reports render-side parameter changes through.
    fn bind_parameters(&mut self, _cells: &[Arc<ParameterCell>]) {}
}

pub trait PluginFactory {
    fn describe(&self, identifier: &str) -> Option<PluginDescription>;
    fn instantiate(&self, identifier: &str) -> Result<Box<dyn ProcessingUnit>, FactoryError>;

    fn identifiers(&self) -> Vec<String> {
        Vec::new()
    }
}

struct BuiltinEntry {
    name: &'static str,
    layout: ChannelLayout,
    parameters: &'static [(&'static str, f32)],
}

fn builtin_entry(identifier: &str) -> Option<BuiltinEntry> {
    let entry = |name, layout, parameters| BuiltinEntry {
        name,
        layout,
        parameters,
    };
    Some(match identifier {
        builtin::AUDIO_INPUT => entry("Audio Input", ChannelLayout::new(0, 2, false, false), &[]),
        builtin::AUDIO_OUTPUT => entry("Audio Output", ChannelLayout::new(2, 0, false, false), &[]),
        builtin::MIDI_INPUT => entry("MIDI Input", ChannelLayout::new(0, 0, false, true), &[]),
        builtin::TRACK_INPUT => entry("Track Input", ChannelLayout::new(2, 2, true, true), &[]),
        builtin::TRACK_OUTPUT => entry(
            "Track Output",
            ChannelLayout::new(2, 2, false, false),
            &[("Volume", 0.8), ("Pan", 0.5)],
        ),
        builtin::GAIN => entry("Gain", ChannelLayout::new(2, 2, false, false), &[("Gain", 0.5)]),
        builtin::TONE => entry("Tone", ChannelLayout::new(0, 2, true, false), &[("Level", 0.7)]),
        _ => return None,
    })
}

#[derive(Serialize, Deserialize)]
struct SavedValues {
    values: Vec<f32>,
}

/// A simple unit: fixed layout, a handful of parameters, JSON state.
pub struct BasicUnit {
    layout: ChannelLayout,
    parameters: Vec<ParameterInfo>,
    values: Vec<f32>,
    bypassed: bool,
    cells: Vec<Arc<ParameterCell>>,
}

impl BasicUnit {
    pub fn new(layout: ChannelLayout, parameters: Vec<ParameterInfo>) -> Self {
        let values = parameters.iter().map(|p| p.default).collect();
        Self {
            layout,
            parameters,
            values,
            bypassed: false,
            cells: Vec::new(),
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}

impl ProcessingUnit for BasicUnit {
    fn layout(&self) -> ChannelLayout {
        self.layout
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        self.parameters.clone()
    }

    fn parameter(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(v) = self.values.get_mut(index) {
            *v = value.clamp(0.0, 1.0);
            if let Some(cell) = self.cells.get(index) {
                cell.store(*v);
            }
        }
    }

    fn serialize(&self) -> Vec<u8> {
        serde_json::to_vec(&SavedValues {
            values: self.values.clone(),
        })
        .unwrap_or_default()
    }

    fn restore(&mut self, state: &[u8]) -> Result<(), FactoryError> {
        let saved: SavedValues =
            serde_json::from_slice(state).map_err(|e| FactoryError::BadState(e.to_string()))?;
        for (index, value) in saved.values.into_iter().enumerate() {
            self.set_parameter(index, value);
        }
        Ok(())
    }

    fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    fn bind_parameters(&mut self, cells: &[Arc<ParameterCell>]) {
        self.cells = cells.to_vec();
    }
}

/// Factory for the built-in identifiers, deferring anything else to an
/// optional external factory (plugin scanning lives outside the core).
#[derive(Default)]
pub struct BuiltinFactory {
    external: Option<Box<dyn PluginFactory>>,
}

impl BuiltinFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_external(external: Box<dyn PluginFactory>) -> Self {
        Self {
            external: Some(external),
        }
    }
}

impl PluginFactory for BuiltinFactory {
    fn describe(&self, identifier: &str) -> Option<PluginDescription> {
        match builtin_entry(identifier) {
            Some(entry) => Some(PluginDescription::new(identifier, entry.name, entry.layout)),
            None => self.external.as_ref()?.describe(identifier),
        }
    }

    fn instantiate(&self, identifier: &str) -> Result<Box<dyn ProcessingUnit>, FactoryError> {
        if let Some(entry) = builtin_entry(identifier) {
            let parameters = entry
                .parameters
                .iter()
                .map(|(name, default)| ParameterInfo::new(name, *default))
                .collect();
            return Ok(Box::new(BasicUnit::new(entry.layout, parameters)));
        }
        match &self.external {
            Some(external) => external.instantiate(identifier),
            None => Err(FactoryError::UnknownIdentifier(identifier.to_string())),
        }
    }

    fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = builtin::ALL.iter().map(|s| s.to_string()).collect();
        if let Some(external) = &self.external {
            ids.extend(external.identifiers());
        }
        ids
    }
}
