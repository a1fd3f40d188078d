//! Interfaces to the collaborators around the synth core.
//!
//! The core only calls out through these traits. Every trait has a no-op
//! implementation so hosts can leave out whatever they do not have.

use crate::graph::Endpoint;
use crate::io::MidiEcho;
use crate::notes::NoteId;

/// Visual "key is down" highlighting.
pub trait NoteIndicator: Send {
    fn set_active(&mut self, note: NoteId);
    fn clear_active(&mut self, note: NoteId);
}

/// Receives the echo of every played note for the MIDI output.
pub trait MidiOutput: Send {
    fn send(&mut self, echo: MidiEcho);
}

/// Recorder side: where voices should additionally route their output.
pub trait CaptureSource: Send {
    /// Active capture endpoint, if a recording is running.
    fn active_capture(&self) -> Option<Endpoint>;
}

/// Blocking user-facing notice, shown when the synth cannot start at all.
pub trait Notice: Send {
    fn show(&mut self, message: &str);
}

/// What the dead-note reconciler reads to decide whether anything is held.
pub trait ActivityProbe {
    /// Keys currently held on the MIDI input.
    fn midi_active_notes(&self) -> usize;
    /// Whether any on-screen key is visually active.
    fn any_button_active(&self) -> bool;
}

/// No-op collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl NoteIndicator for Silent {
    fn set_active(&mut self, _note: NoteId) {}
    fn clear_active(&mut self, _note: NoteId) {}
}

impl MidiOutput for Silent {
    fn send(&mut self, _echo: MidiEcho) {}
}

impl CaptureSource for Silent {
    fn active_capture(&self) -> Option<Endpoint> {
        None
    }
}

impl Notice for Silent {
    fn show(&mut self, _message: &str) {}
}

/// Reports nothing held anywhere, so every sweep releases.
impl ActivityProbe for Silent {
    fn midi_active_notes(&self) -> usize {
        0
    }

    fn any_button_active(&self) -> bool {
        false
    }
}

/// Probe built from two plain readings, for hosts that poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivitySnapshot {
    pub midi_active_notes: usize,
    pub any_button_active: bool,
}

impl ActivityProbe for ActivitySnapshot {
    fn midi_active_notes(&self) -> usize {
        self.midi_active_notes
    }

    fn any_button_active(&self) -> bool {
        self.any_button_active
    }
}

/// The collaborators the core talks to.
pub struct Collaborators {
    pub indicator: Box<dyn NoteIndicator>,
    pub midi_out: Box<dyn MidiOutput>,
    pub capture: Box<dyn CaptureSource>,
    pub notice: Box<dyn Notice>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            indicator: Box::new(Silent),
            midi_out: Box::new(Silent),
            capture: Box::new(Silent),
            notice: Box::new(Silent),
        }
    }
}
