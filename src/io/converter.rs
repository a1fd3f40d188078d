use crate::io::input::{ControlEvent, NoteAction, NoteEvent};
use crate::io::midi::{bend_position, MidiEvent, MidiRouting};

/// Turn a decoded MIDI message into a control event.
///
/// Messages on other channels, control/program changes and keys that fall
/// outside the note range are dropped.
pub fn midi_to_control(midi: MidiEvent, routing: &MidiRouting) -> Option<ControlEvent> {
    if midi.channel() != routing.input_channel {
        return None;
    }

    match midi {
        MidiEvent::NoteOn { key, velocity, .. } => Some(ControlEvent::Note(NoteEvent {
            note: routing.note_for_key(key)?,
            action: NoteAction::Press,
            velocity: velocity as f32 / 127.0,
        })),
        MidiEvent::NoteOff { key, velocity, .. } => Some(ControlEvent::Note(NoteEvent {
            note: routing.note_for_key(key)?,
            action: NoteAction::Release,
            velocity: velocity as f32 / 127.0,
        })),
        MidiEvent::PitchBend { value, .. } => Some(ControlEvent::PitchBend(bend_position(value))),
        MidiEvent::ControlChange { .. } | MidiEvent::ProgramChange { .. } => None,
    }
}
