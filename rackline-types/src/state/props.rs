//! Property names used on project tree nodes.

// Shared
pub const NAME: &str = "name";

// Project
pub const PROJECT_VERSION: &str = "version";

// Track
pub const UUID: &str = "uuid";
pub const COLOUR: &str = "colour";
pub const SELECTED: &str = "selected";
pub const IS_MASTER: &str = "isMaster";

// Lane
pub const NUM_SLOTS: &str = "numSlots";

// Processor
pub const IDENTIFIER: &str = "identifier";
pub const NODE_ID: &str = "nodeId";
pub const SLOT: &str = "slot";
pub const BYPASSED: &str = "bypassed";
pub const ACCEPTS_MIDI: &str = "acceptsMidi";
pub const PRODUCES_MIDI: &str = "producesMidi";
pub const ALLOW_DEFAULT_CONNECTIONS: &str = "allowDefaultConnections";
pub const STATE: &str = "state";

// Channel
pub const INDEX: &str = "index";
pub const ABBREV: &str = "abbrev";
pub const IS_INPUT: &str = "isInput";
pub const IS_MIDI: &str = "isMidi";

// Parameter
pub const VALUE: &str = "value";

// Connection
pub const SOURCE_NODE: &str = "sourceNode";
pub const SOURCE_CHANNEL: &str = "sourceChannel";
pub const DEST_NODE: &str = "destNode";
pub const DEST_CHANNEL: &str = "destChannel";
pub const IS_CUSTOM: &str = "isCustom";

// View
pub const FOCUSED_TRACK: &str = "focusedTrack";
pub const GRID_TRACK_OFFSET: &str = "gridTrackOffset";
pub const GRID_SLOT_OFFSET: &str = "gridSlotOffset";
pub const VISIBLE_TRACKS: &str = "visibleTracks";
pub const VISIBLE_SLOTS: &str = "visibleSlots";
pub const AUDIO_INPUT_DEVICE: &str = "audioInputDevice";
pub const AUDIO_OUTPUT_DEVICE: &str = "audioOutputDevice";
pub const MIDI_INPUT_DEVICE: &str = "midiInputDevice";
