//! Note identity: pitch-class names, frequencies and physical key bindings.
//!
//! Everything here is pure. The binding table is a process-wide constant.

/// Physical key code ↔ note table.
pub mod bindings;
/// Note name + transposition → Hz.
pub mod frequency;
/// Canonical `NoteId` and its grammar.
pub mod name;

pub use bindings::{key_for_note, note_for_key, KEY_BINDINGS};
pub use frequency::{
    base_frequency, bend_factor, resolve_frequency, transposition_factor, CENTER_BEND,
};
pub use name::{NoteId, PitchClass};
