use std::collections::BTreeMap;

use rackline_types::{props, ProjectView, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
    MidiInput,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 3] = [
        DeviceKind::AudioInput,
        DeviceKind::AudioOutput,
        DeviceKind::MidiInput,
    ];

    /// VIEW property holding the selected device of this kind.
    pub fn view_property(&self) -> &'static str {
        match self {
            DeviceKind::AudioInput => props::AUDIO_INPUT_DEVICE,
            DeviceKind::AudioOutput => props::AUDIO_OUTPUT_DEVICE,
            DeviceKind::MidiInput => props::MIDI_INPUT_DEVICE,
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DeviceKind::AudioInput => "audio input",
            DeviceKind::AudioOutput => "audio output",
            DeviceKind::MidiInput => "MIDI input",
        })
    }
}

/// What the host knows about attached hardware.
pub trait DeviceRegistry {
    fn is_available(&self, kind: DeviceKind, name: &str) -> bool;
    fn set_enabled(&mut self, kind: DeviceKind, name: &str, enabled: bool);
}

/// Fixed device list, for tests and the command line.
#[derive(Debug, Default, Clone)]
pub struct StaticDevices {
    devices: BTreeMap<(DeviceKind, String), bool>,
}

impl StaticDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: DeviceKind, name: &str) -> Self {
        self.add(kind, name);
        self
    }

    pub fn add(&mut self, kind: DeviceKind, name: &str) {
        self.devices.entry((kind, name.to_string())).or_insert(false);
    }

    pub fn is_enabled(&self, kind: DeviceKind, name: &str) -> bool {
        self.devices
            .get(&(kind, name.to_string()))
            .copied()
            .unwrap_or(false)
    }

    pub fn names(&self, kind: DeviceKind) -> Vec<&str> {
        self.devices
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, n)| n.as_str())
            .collect()
    }
}

impl DeviceRegistry for StaticDevices {
    fn is_available(&self, kind: DeviceKind, name: &str) -> bool {
        self.devices.contains_key(&(kind, name.to_string()))
    }

    fn set_enabled(&mut self, kind: DeviceKind, name: &str, enabled: bool) {
        match self.devices.get_mut(&(kind, name.to_string())) {
            Some(state) => *state = enabled,
            None => log::warn!(target: "devices", "cannot enable unknown {} '{}'", kind, name),
        }
    }
}

/// Enable the devices VIEW selects and drop the selections that are not
/// attached. Returns one warning per dropped selection.
pub fn apply_selections(tree: &mut Tree, devices: &mut dyn DeviceRegistry) -> Vec<String> {
    let Some(view) = ProjectView::wrap(tree).and_then(|p| p.view_key()) else {
        return Vec::new();
    };
    let mut warnings = Vec::new();
    for kind in DeviceKind::ALL {
        let Some(name) = tree.get_str(view, kind.view_property()).map(str::to_string) else {
            continue;
        };
        if devices.is_available(kind, &name) {
            devices.set_enabled(kind, &name, true);
            continue;
        }
        let warning = format!("{} '{}' is not available; selection dropped", kind, name);
        log::warn!(target: "devices", "{}", warning);
        if let Err(e) = tree.remove_property(view, kind.view_property()) {
            log::warn!(target: "devices", "could not clear selection: {}", e);
        }
        warnings.push(warning);
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackline_types::project_node;

    #[test]
    fn static_devices_track_enablement() {
        let mut devices = StaticDevices::new()
            .with(DeviceKind::AudioOutput, "Speakers")
            .with(DeviceKind::MidiInput, "Keys");
        assert!(devices.is_available(DeviceKind::AudioOutput, "Speakers"));
        assert!(!devices.is_available(DeviceKind::AudioInput, "Speakers"));
        assert!(!devices.is_enabled(DeviceKind::MidiInput, "Keys"));
        devices.set_enabled(DeviceKind::MidiInput, "Keys", true);
        assert!(devices.is_enabled(DeviceKind::MidiInput, "Keys"));
        devices.set_enabled(DeviceKind::MidiInput, "Ghost", true);
        assert_eq!(devices.names(DeviceKind::MidiInput), vec!["Keys"]);
    }

    #[test]
    fn missing_selection_is_dropped() {
        let mut tree = Tree::from_detached(project_node("D", vec![], vec![], 4, 4));
        let view = ProjectView::wrap(&tree).unwrap().view_key().unwrap();
        tree.set_property(view, props::AUDIO_OUTPUT_DEVICE, "Speakers").unwrap();
        tree.set_property(view, props::MIDI_INPUT_DEVICE, "Gone").unwrap();

        let mut devices = StaticDevices::new().with(DeviceKind::AudioOutput, "Speakers");
        let warnings = apply_selections(&mut tree, &mut devices);

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Gone"));
        assert!(tree.property(view, props::MIDI_INPUT_DEVICE).is_none());
        assert_eq!(tree.get_str(view, props::AUDIO_OUTPUT_DEVICE), Some("Speakers"));
        assert!(devices.is_enabled(DeviceKind::AudioOutput, "Speakers"));
    }
}
