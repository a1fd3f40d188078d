use crate::error::SynthError;
use crate::io::converter::midi_to_control;
use crate::io::midi::{MidiEvent, MidiRouting};
use crate::notes::{note_for_key, NoteId};

/*
Input Normalization
===================

Three sources feed the synth, each with its own idea of a note:

  computer keyboard   physical key code ("KeyQ")   → binding table lookup
  on-screen button    note name ("c1")             → parsed directly
  MIDI controller     3-byte channel message       → key number + octave offset

All of them collapse into one ControlEvent. Keyboard and buttons carry no
velocity, so they play at full velocity. Pitch bend only comes from MIDI
and travels as its own event, never through press/release.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteAction {
    Press,
    Release,
}

/// A normalized press or release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub note: NoteId,
    pub action: NoteAction,
    /// `0.0..=1.0`
    pub velocity: f32,
}

impl NoteEvent {
    pub fn press(note: NoteId, velocity: f32) -> Self {
        Self {
            note,
            action: NoteAction::Press,
            velocity,
        }
    }

    pub fn release(note: NoteId) -> Self {
        Self {
            note,
            action: NoteAction::Release,
            velocity: 0.0,
        }
    }
}

/// What the dispatcher acts on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    Note(NoteEvent),
    /// Bend position in `0.0..=1.0`, 0.5 is center.
    PitchBend(f32),
}

/// A raw event from one of the input sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent<'a> {
    Key { code: &'a str, action: NoteAction },
    Button { note: &'a str, action: NoteAction },
    Midi(&'a [u8]),
}

/// Map a raw input event to a control event.
///
/// `Ok(None)` means the event carries nothing to play (an unbound key, a
/// filtered MIDI message). A button naming a malformed note is an error.
pub fn normalize(
    event: InputEvent<'_>,
    routing: &MidiRouting,
) -> Result<Option<ControlEvent>, SynthError> {
    match event {
        InputEvent::Key { code, action } => {
            Ok(note_for_key(code).map(|note| ControlEvent::Note(full_velocity(note, action))))
        }
        InputEvent::Button { note, action } => {
            let note: NoteId = note.parse()?;
            Ok(Some(ControlEvent::Note(full_velocity(note, action))))
        }
        InputEvent::Midi(bytes) => {
            Ok(MidiEvent::parse(bytes).and_then(|midi| midi_to_control(midi, routing)))
        }
    }
}

fn full_velocity(note: NoteId, action: NoteAction) -> NoteEvent {
    NoteEvent {
        note,
        action,
        velocity: 1.0,
    }
}
