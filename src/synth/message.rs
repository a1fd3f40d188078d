#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::io::{ControlEvent, NoteAction, NoteEvent};
use crate::notes::NoteId;
use crate::synth::generator::GeneratorId;
use crate::synth::params::EnvelopeParams;

/// Commands sent to the thread that owns the dispatcher.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SynthMessage {
    NoteOn { note: NoteId, velocity: f32 },
    NoteOff { note: NoteId },
    PitchBend { bend: f32 },
    AllNotesOff,
    SetParams { generator: GeneratorId, params: EnvelopeParams },
    AddGenerator { params: EnvelopeParams },
    RemoveGenerator { generator: GeneratorId },
}

impl From<ControlEvent> for SynthMessage {
    fn from(event: ControlEvent) -> Self {
        match event {
            ControlEvent::Note(NoteEvent {
                note,
                action: NoteAction::Press,
                velocity,
            }) => SynthMessage::NoteOn { note, velocity },
            ControlEvent::Note(NoteEvent {
                note,
                action: NoteAction::Release,
                ..
            }) => SynthMessage::NoteOff { note },
            ControlEvent::PitchBend(bend) => SynthMessage::PitchBend { bend },
        }
    }
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}

/// Plain queue, for single-threaded hosts and tests.
impl MessageReceiver for std::collections::VecDeque<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        self.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_events_become_commands() {
        let c2: NoteId = "c2".parse().unwrap();
        assert_eq!(
            SynthMessage::from(ControlEvent::Note(NoteEvent::press(c2, 0.5))),
            SynthMessage::NoteOn {
                note: c2,
                velocity: 0.5
            }
        );
        assert_eq!(
            SynthMessage::from(ControlEvent::Note(NoteEvent::release(c2))),
            SynthMessage::NoteOff { note: c2 }
        );
        assert_eq!(
            SynthMessage::from(ControlEvent::PitchBend(0.75)),
            SynthMessage::PitchBend { bend: 0.75 }
        );
    }

    #[test]
    fn queue_pops_in_order() {
        let mut queue = std::collections::VecDeque::from([
            SynthMessage::AllNotesOff,
            SynthMessage::PitchBend { bend: 0.5 },
        ]);
        assert_eq!(MessageReceiver::pop(&mut queue), Some(SynthMessage::AllNotesOff));
        assert_eq!(
            MessageReceiver::pop(&mut queue),
            Some(SynthMessage::PitchBend { bend: 0.5 })
        );
        assert_eq!(MessageReceiver::pop(&mut queue), None);
    }
}
