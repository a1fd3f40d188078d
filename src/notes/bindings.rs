use crate::notes::name::NoteId;

/// Physical key codes in chromatic order.
///
/// Index `i` plays note index `i`: every 12 keys wrap into the next octave,
/// so the home row is octave 0, the top letter row octave 1 and the digit
/// row octave 2.
pub const KEY_BINDINGS: [&str; 36] = [
    "KeyA",
    "KeyS",
    "KeyD",
    "KeyF",
    "KeyG",
    "KeyH",
    "KeyJ",
    "KeyK",
    "KeyL",
    "Semicolon",
    "Quote",
    "Backslash",
    "KeyQ",
    "KeyW",
    "KeyE",
    "KeyR",
    "KeyT",
    "KeyY",
    "KeyU",
    "KeyI",
    "KeyO",
    "KeyP",
    "BracketLeft",
    "BracketRight",
    "Digit1",
    "Digit2",
    "Digit3",
    "Digit4",
    "Digit5",
    "Digit6",
    "Digit7",
    "Digit8",
    "Digit9",
    "Digit0",
    "Minus",
    "Equal",
];

/// Note bound to a physical key code, or `None` for unbound keys.
pub fn note_for_key(code: &str) -> Option<NoteId> {
    let index = KEY_BINDINGS.iter().position(|&k| k == code)?;
    NoteId::from_index(index as i32)
}

/// Key code bound to a note, or `None` if the note is outside the table.
pub fn key_for_note(note: NoteId) -> Option<&'static str> {
    let index = usize::try_from(note.index()).ok()?;
    KEY_BINDINGS.get(index).copied()
}
