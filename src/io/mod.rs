// Purpose - external interfaces: MIDI framing and input normalization

pub mod converter;
pub mod input;
pub mod midi;

pub use converter::midi_to_control;
pub use input::{normalize, ControlEvent, InputEvent, NoteAction, NoteEvent};
pub use midi::{EchoKind, MidiEcho, MidiEvent, MidiNoteTracker, MidiRouting};
