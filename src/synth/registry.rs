use crate::notes::NoteId;
use crate::synth::generator::GeneratorId;
use crate::synth::voice::Voice;

/// A logically held note and the voices it sounds on.
pub struct HeldNote {
    pub note: NoteId,
    pub velocity: f32,
    pub voices: Vec<(GeneratorId, Voice)>,
}

/// Notes that are logically down, in press order.
///
/// Membership is the note-down state, not the lifetime of the audio
/// resources: a released note leaves immediately while its voices fade
/// elsewhere. A note id appears at most once.
#[derive(Default)]
pub struct VoiceRegistry {
    held: Vec<HeldNote>,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, note: NoteId) -> bool {
        self.held.iter().any(|h| h.note == note)
    }

    /// Add a held note. Returns it back if the note is already held.
    pub fn insert(&mut self, held: HeldNote) -> Result<(), HeldNote> {
        if self.contains(held.note) {
            return Err(held);
        }
        self.held.push(held);
        Ok(())
    }

    pub fn remove(&mut self, note: NoteId) -> Option<HeldNote> {
        let index = self.held.iter().position(|h| h.note == note)?;
        Some(self.held.remove(index))
    }

    pub fn get(&self, note: NoteId) -> Option<&HeldNote> {
        self.held.iter().find(|h| h.note == note)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeldNote> {
        self.held.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut HeldNote> {
        self.held.iter_mut()
    }

    /// Held notes in press order.
    pub fn notes(&self) -> impl Iterator<Item = NoteId> + '_ {
        self.held.iter().map(|h| h.note)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Take every held note out, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = HeldNote> + '_ {
        self.held.drain(..)
    }
}
