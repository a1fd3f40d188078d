use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SynthError;

/*
Note Names
==========

A note is a pitch class plus an octave, written lowercase with the octave
number glued on:

    c2   cs2   d2   eb2   e2   f2   fs2   g2   gs2   a2   bb2   b2

Sharps are spelled with a trailing `s`, flats with a trailing `b`. Both
spellings of a black key name the same note, so "ds3" and "eb3" parse to
equal NoteIds. Display always uses the canonical spelling above, which is
also what the on-screen keyboard writes into its buttons.

The octave is one optional digit, optionally negative ("c-1"). A missing
octave means octave 4, so "a" is A4 = 440 Hz.

Index Space
-----------

Every NoteId has a linear index:

    index = octave * 12 + semitone        (C = 0 ... B = 11)

The physical key table and the MIDI mapping are both chromatic runs over this
index, which is what makes key ↔ note ↔ MIDI lookups round-trip:

    index 0  = c0 = first bound key ("KeyA")
    index 60 = c5 = MIDI note 60 before the MIDI octave offset is applied
*/

/// One of the twelve semitones of an octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Eb,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    Bb,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Eb,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::Bb,
        PitchClass::B,
    ];

    /// Semitone index, C = 0 through B = 11.
    pub fn semitone(self) -> u8 {
        self as u8
    }

    /// Pitch class for a semitone index; wraps every 12.
    pub fn from_semitone(semitone: u8) -> Self {
        Self::ALL[(semitone % 12) as usize]
    }

    /// Canonical lowercase spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            PitchClass::C => "c",
            PitchClass::Cs => "cs",
            PitchClass::D => "d",
            PitchClass::Eb => "eb",
            PitchClass::E => "e",
            PitchClass::F => "f",
            PitchClass::Fs => "fs",
            PitchClass::G => "g",
            PitchClass::Gs => "gs",
            PitchClass::A => "a",
            PitchClass::Bb => "bb",
            PitchClass::B => "b",
        }
    }

    fn from_spelling(spelling: &str) -> Option<Self> {
        let pitch = match spelling {
            "c" => PitchClass::C,
            "cs" | "db" => PitchClass::Cs,
            "d" => PitchClass::D,
            "ds" | "eb" => PitchClass::Eb,
            "e" => PitchClass::E,
            "f" => PitchClass::F,
            "fs" | "gb" => PitchClass::Fs,
            "g" => PitchClass::G,
            "gs" | "ab" => PitchClass::Gs,
            "a" => PitchClass::A,
            "as" | "bb" => PitchClass::Bb,
            "b" => PitchClass::B,
            _ => return None,
        };
        Some(pitch)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical note identifier: pitch class + octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteId {
    pitch: PitchClass,
    octave: i8,
}

impl NoteId {
    pub const fn new(pitch: PitchClass, octave: i8) -> Self {
        Self { pitch, octave }
    }

    pub fn pitch(self) -> PitchClass {
        self.pitch
    }

    pub fn octave(self) -> i8 {
        self.octave
    }

    /// Linear chromatic index: `octave * 12 + semitone`.
    pub fn index(self) -> i32 {
        self.octave as i32 * 12 + self.pitch.semitone() as i32
    }

    /// Inverse of [`NoteId::index`]. Returns `None` when the octave does not fit.
    pub fn from_index(index: i32) -> Option<Self> {
        let octave = i8::try_from(index.div_euclid(12)).ok()?;
        let pitch = PitchClass::from_semitone(index.rem_euclid(12) as u8);
        Some(Self { pitch, octave })
    }

    /// Fixed linear MIDI mapping: runs of 12 starting at MIDI 0 = c0.
    pub fn from_midi(number: u8) -> Self {
        Self {
            pitch: PitchClass::from_semitone(number % 12),
            octave: (number / 12) as i8,
        }
    }

    /// MIDI note number for this note, if it is inside `0..=127`.
    pub fn to_midi(self) -> Option<u8> {
        u8::try_from(self.index()).ok().filter(|n| *n <= 127)
    }

    /// Shift by whole octaves.
    pub fn transpose_octaves(self, octaves: i8) -> Option<Self> {
        let octave = self.octave.checked_add(octaves)?;
        Some(Self { octave, ..self })
    }

    /// Semitone distance from A4 (the 440 Hz reference).
    pub fn semitones_from_a4(self) -> i32 {
        self.pitch.semitone() as i32 + (self.octave as i32 - 4) * 12 - 9
    }
}

impl FromStr for NoteId {
    type Err = SynthError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || SynthError::InvalidNoteName(input.to_string());
        let lower = input.to_ascii_lowercase();

        let letter = lower.chars().next().ok_or_else(invalid)?;
        if !('a'..='g').contains(&letter) {
            return Err(invalid());
        }

        // Letter plus an optional accidental, then the octave
        let (spelling, octave_str) = match lower.as_bytes().get(1) {
            Some(b's') | Some(b'b') => lower.split_at(2),
            _ => lower.split_at(1),
        };

        let pitch = PitchClass::from_spelling(spelling).ok_or_else(invalid)?;

        let octave = match octave_str {
            "" => 4,
            s => {
                let digits = s.strip_prefix('-').unwrap_or(s);
                if digits.len() != 1 || !digits.as_bytes()[0].is_ascii_digit() {
                    return Err(invalid());
                }
                s.parse::<i8>().map_err(|_| invalid())?
            }
        };

        Ok(Self { pitch, octave })
    }
}

impl TryFrom<String> for NoteId {
    type Error = SynthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteId> for String {
    fn from(note: NoteId) -> Self {
        note.to_string()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch, self.octave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_naturals_sharps_and_flats() {
        assert_eq!("c2".parse::<NoteId>().unwrap(), NoteId::new(PitchClass::C, 2));
        assert_eq!("fs2".parse::<NoteId>().unwrap(), NoteId::new(PitchClass::Fs, 2));
        assert_eq!("eb4".parse::<NoteId>().unwrap(), NoteId::new(PitchClass::Eb, 4));
    }

    #[test]
    fn enharmonic_spellings_are_equal() {
        let sharp: NoteId = "ds3".parse().unwrap();
        let flat: NoteId = "eb3".parse().unwrap();
        assert_eq!(sharp, flat);
        assert_eq!(sharp.to_string(), "eb3");
    }

    #[test]
    fn missing_octave_defaults_to_four() {
        let note: NoteId = "a".parse().unwrap();
        assert_eq!(note, NoteId::new(PitchClass::A, 4));
    }

    #[test]
    fn negative_octave() {
        let note: NoteId = "c-1".parse().unwrap();
        assert_eq!(note.octave(), -1);
        assert_eq!(note.to_string(), "c-1");
    }

    #[test]
    fn uppercase_is_accepted() {
        assert_eq!("G2".parse::<NoteId>().unwrap(), NoteId::new(PitchClass::G, 2));
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "h2", "c22", "c-", "cb2", "es1", "x", "c#2", "c 2"] {
            assert!(
                matches!(bad.parse::<NoteId>(), Err(SynthError::InvalidNoteName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn midi_mapping_is_linear() {
        assert_eq!(NoteId::from_midi(0), NoteId::new(PitchClass::C, 0));
        assert_eq!(NoteId::from_midi(60), NoteId::new(PitchClass::C, 5));
        assert_eq!(NoteId::from_midi(69), NoteId::new(PitchClass::A, 5));
        assert_eq!(NoteId::from_midi(60).to_midi(), Some(60));
    }

    #[test]
    fn out_of_range_midi_is_none() {
        assert_eq!(NoteId::new(PitchClass::C, -1).to_midi(), None);
        assert_eq!(NoteId::new(PitchClass::Gs, 10).to_midi(), None);
    }

    #[test]
    fn a4_is_the_reference() {
        assert_eq!(NoteId::new(PitchClass::A, 4).semitones_from_a4(), 0);
        assert_eq!(NoteId::new(PitchClass::C, 5).semitones_from_a4(), 3);
        assert_eq!(NoteId::new(PitchClass::A, 3).semitones_from_a4(), -12);
    }

    #[test]
    fn index_round_trips() {
        for index in -12..120 {
            let note = NoteId::from_index(index).unwrap();
            assert_eq!(note.index(), index);
        }
    }
}
