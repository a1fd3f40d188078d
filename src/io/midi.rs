use serde::{Deserialize, Serialize};

use crate::notes::NoteId;

/*
MIDI Channel-Voice Framing
==========================

    status byte        data 1        data 2
    1ccc nnnn          0xxx xxxx     0xxx xxxx
    │└┬┘ └┬─┘
    │ │   └── channel (0-15)
    │ └────── command (8 = note off, 9 = note on, 11 = control change,
    │                  12 = program change, 14 = pitch bend)
    └──────── always set on status bytes

Note on with velocity 0 is a note off (running-status controllers send it
that way). Pitch bend carries a 14-bit value split over the two data bytes,
least significant first; 8192 is the center.

System bytes (0xF0 and up) are not channel-voice messages. Active sensing
(0xFE) arrives as a lone byte several times a second and is ignored like the
rest of them.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: u16 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiEvent {
    /// Decode one channel-voice message. Anything else yields `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        if status < 0x80 || status >= 0xF0 {
            return None;
        }

        let command = status >> 4;
        let channel = status & 0x0F;
        let d1 = *data.first()? & 0x7F;
        let d2 = data.get(1).map(|b| b & 0x7F);

        match command {
            0x8 => Some(MidiEvent::NoteOff {
                channel,
                key: d1,
                velocity: d2?,
            }),
            0x9 => {
                let velocity = d2?;
                if velocity == 0 {
                    Some(MidiEvent::NoteOff {
                        channel,
                        key: d1,
                        velocity,
                    })
                } else {
                    Some(MidiEvent::NoteOn {
                        channel,
                        key: d1,
                        velocity,
                    })
                }
            }
            0xB => Some(MidiEvent::ControlChange {
                channel,
                controller: d1,
                value: d2?,
            }),
            0xC => Some(MidiEvent::ProgramChange {
                channel,
                program: d1,
            }),
            0xE => Some(MidiEvent::PitchBend {
                channel,
                value: ((d2? as u16) << 7) | d1 as u16,
            }),
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. }
            | MidiEvent::ProgramChange { channel, .. } => channel,
        }
    }
}

/// Map a 14-bit pitch-bend value onto `0.0..1.0` (center 0.5).
pub fn bend_position(value: u16) -> f32 {
    value.min(0x3FFF) as f32 / 16_384.0
}

/// Channel and octave alignment between a MIDI device and note ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiRouting {
    /// Only messages on this channel are played.
    pub input_channel: u8,
    /// Channel for echoing played notes back out. `None` disables the echo.
    pub output_channel: Option<u8>,
    /// Octaves added to a device note before it becomes a [`NoteId`].
    pub octave_offset: i8,
}

impl Default for MidiRouting {
    fn default() -> Self {
        Self {
            input_channel: 0,
            output_channel: None,
            octave_offset: -4,
        }
    }
}

impl MidiRouting {
    /// Note id for an inbound MIDI key, shifted by the octave offset.
    pub fn note_for_key(&self, key: u8) -> Option<NoteId> {
        NoteId::from_midi(key).transpose_octaves(self.octave_offset)
    }

    /// Outbound MIDI key for a note id (inverse of [`Self::note_for_key`]).
    pub fn key_for_note(&self, note: NoteId) -> Option<u8> {
        note.transpose_octaves(self.octave_offset.checked_neg()?)?
            .to_midi()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoKind {
    NoteOn,
    NoteOff,
}

/// A played note echoed to the MIDI output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEcho {
    pub kind: EchoKind,
    pub note: NoteId,
    /// `0.0..=1.0`
    pub velocity: f32,
}

impl MidiEcho {
    /// Encode for the routing's output channel.
    ///
    /// `None` when no output channel is set or the note falls outside the
    /// MIDI key range.
    pub fn to_bytes(&self, routing: &MidiRouting) -> Option<[u8; 3]> {
        let channel = routing.output_channel? & 0x0F;
        let key = routing.key_for_note(self.note)?;
        let velocity = (self.velocity.clamp(0.0, 1.0) * 127.0).round() as u8;
        let status = match self.kind {
            EchoKind::NoteOn => 0x90,
            EchoKind::NoteOff => 0x80,
        };
        Some([status | channel, key, velocity])
    }
}

/// Counts keys held on a MIDI input, from the raw message stream.
///
/// For hosts whose MIDI transport does not report held notes itself.
#[derive(Debug, Clone, Default)]
pub struct MidiNoteTracker {
    held: [u128; 16],
}

impl MidiNoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &MidiEvent) {
        match *event {
            MidiEvent::NoteOn { channel, key, .. } => {
                self.held[channel as usize & 0x0F] |= 1u128 << (key & 0x7F);
            }
            MidiEvent::NoteOff { channel, key, .. } => {
                self.held[channel as usize & 0x0F] &= !(1u128 << (key & 0x7F));
            }
            // All Notes Off / All Sound Off
            MidiEvent::ControlChange {
                channel,
                controller: 120 | 123,
                ..
            } => {
                self.held[channel as usize & 0x0F] = 0;
            }
            _ => {}
        }
    }

    pub fn active_count(&self) -> usize {
        self.held.iter().map(|bits| bits.count_ones() as usize).sum()
    }

    pub fn clear(&mut self) {
        self.held = [0; 16];
    }
}
