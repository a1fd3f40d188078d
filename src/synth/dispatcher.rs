use tracing::{debug, info, warn};

use crate::error::{Result, SynthError};
use crate::graph::AudioGraph;
use crate::io::{ControlEvent, EchoKind, MidiEcho};
use crate::notes::{bend_factor, NoteId};
use crate::synth::generator::{GeneratorId, ToneGenerator};
use crate::synth::hooks::{CaptureSource, MidiOutput, NoteIndicator};
use crate::synth::message::{MessageReceiver, SynthMessage};
use crate::synth::params::EnvelopeParams;
use crate::synth::reconciler::HeldNotes;
use crate::synth::registry::{HeldNote, VoiceRegistry};
use crate::synth::voice::Voice;

/*
Note Dispatcher
===============

Per note id:

    Idle ──press──→ Sounding ──release──→ Releasing ──deadline──→ Idle
      ↑               │  ↺ press (no-op)      │
      └───────────────┴───────────────────────┘
                 (registry entry removed at release)

- press on a held note does nothing: one voice set per note, ever
- release removes the registry entry right away, so the same note can be
  pressed again while the old voices are still fading
- fading voices sit in their own list and are torn down by `service()`
  once the audio clock passes their deadline; they belong to themselves,
  never to the note id, so a re-press is never touched by an old teardown

Multiple tone generators: a press builds one voice per generator before
anything becomes visible. If any build fails, the voices already built
are disposed and the press is dropped as a whole.
*/

pub struct NoteDispatcher<G: AudioGraph> {
    graph: G,
    generators: Vec<ToneGenerator>,
    next_generator: u32,
    registry: VoiceRegistry,
    fading: Vec<Voice>,
    indicator: Box<dyn NoteIndicator>,
    midi_out: Box<dyn MidiOutput>,
    capture: Box<dyn CaptureSource>,
}

impl<G: AudioGraph> NoteDispatcher<G> {
    /// Dispatcher with one tone generator per parameter snapshot.
    ///
    /// An empty list gets one generator with default parameters.
    pub fn new(
        graph: G,
        generators: &[EnvelopeParams],
        indicator: Box<dyn NoteIndicator>,
        midi_out: Box<dyn MidiOutput>,
        capture: Box<dyn CaptureSource>,
    ) -> Result<Self> {
        let mut dispatcher = Self {
            graph,
            generators: Vec::new(),
            next_generator: 0,
            registry: VoiceRegistry::new(),
            fading: Vec::new(),
            indicator,
            midi_out,
            capture,
        };

        if generators.is_empty() {
            dispatcher.add_generator(EnvelopeParams::default())?;
        }
        for params in generators {
            dispatcher.add_generator(*params)?;
        }
        Ok(dispatcher)
    }

    /// Start a note. Returns `false` when the note is already held.
    pub fn press(&mut self, note: NoteId, velocity: f32) -> Result<bool> {
        if self.registry.contains(note) {
            return Ok(false);
        }

        let capture = self.capture.active_capture();
        let mut voices = Vec::with_capacity(self.generators.len());
        for generator in &self.generators {
            match Voice::build(&mut self.graph, note, velocity, generator, capture) {
                Ok(voice) => voices.push((generator.id(), voice)),
                Err(err) => {
                    for (_, mut voice) in voices {
                        voice.teardown(&mut self.graph);
                    }
                    return Err(err);
                }
            }
        }

        let held = HeldNote {
            note,
            velocity,
            voices,
        };
        if self.registry.insert(held).is_err() {
            // contains() was checked above; nothing else inserts
            return Ok(false);
        }

        self.indicator.set_active(note);
        self.midi_out.send(MidiEcho {
            kind: EchoKind::NoteOn,
            note,
            velocity,
        });
        debug!(%note, velocity, held = self.registry.len(), "note on");
        Ok(true)
    }

    /// Release a note. Returns `false` when the note was not held.
    pub fn release(&mut self, note: NoteId) -> Result<bool> {
        let Some(held) = self.registry.remove(note) else {
            return Ok(false);
        };

        for (generator, voice) in held.voices {
            self.fade_out(generator, voice);
        }

        self.indicator.clear_active(note);
        self.midi_out.send(MidiEcho {
            kind: EchoKind::NoteOff,
            note,
            velocity: 0.0,
        });
        debug!(%note, held = self.registry.len(), "note off");
        Ok(true)
    }

    fn fade_out(&mut self, generator: GeneratorId, mut voice: Voice) {
        match voice.release(&mut self.graph) {
            Ok(_) => self.fading.push(voice),
            Err(err) => {
                warn!(note = %voice.note(), %generator, %err, "release ramp failed, freeing now");
                voice.teardown(&mut self.graph);
            }
        }
    }

    /// Set the bend position for every generator and retune sounding voices.
    ///
    /// Out-of-range values are rejected and nothing changes.
    pub fn pitch_bend(&mut self, bend: f32) -> Result<()> {
        bend_factor(bend)?;

        for generator in &mut self.generators {
            generator.set_bend(bend);
        }

        for held in self.registry.iter_mut() {
            for (generator, voice) in &mut held.voices {
                if let Err(err) = voice.apply_bend(&mut self.graph, bend) {
                    warn!(note = %held.note, %generator, %err, "pitch bend not applied");
                }
            }
        }
        Ok(())
    }

    /// Tear down fading voices whose release has finished.
    ///
    /// Returns how many voices were freed.
    pub fn service(&mut self) -> usize {
        let now = self.graph.current_time();
        let before = self.fading.len();
        let graph = &mut self.graph;
        self.fading.retain_mut(|voice| {
            if voice.is_due(now) {
                voice.teardown(&mut *graph);
                false
            } else {
                true
            }
        });
        before - self.fading.len()
    }

    /// Release every held note, oldest first.
    pub fn release_all(&mut self) -> usize {
        let held: Vec<HeldNote> = self.registry.drain().collect();
        let count = held.len();
        for note in held {
            for (generator, voice) in note.voices {
                self.fade_out(generator, voice);
            }
            self.indicator.clear_active(note.note);
            self.midi_out.send(MidiEcho {
                kind: EchoKind::NoteOff,
                note: note.note,
                velocity: 0.0,
            });
        }
        count
    }

    /// Free every voice immediately, held or fading.
    pub fn shutdown(&mut self) {
        let held: Vec<HeldNote> = self.registry.drain().collect();
        for note in held {
            for (_, mut voice) in note.voices {
                voice.teardown(&mut self.graph);
            }
            self.indicator.clear_active(note.note);
        }
        for mut voice in self.fading.drain(..) {
            voice.teardown(&mut self.graph);
        }
        info!("dispatcher shut down");
    }

    /// Apply one control event, containing any failure.
    ///
    /// Errors are logged and the event is dropped; other notes are unaffected.
    pub fn dispatch(&mut self, event: ControlEvent) {
        if let Err(err) = self.apply(SynthMessage::from(event)) {
            warn!(?event, %err, "dropped control event");
        }
    }

    /// Apply every queued command.
    pub fn drain_messages<R: MessageReceiver + ?Sized>(&mut self, rx: &mut R) {
        while let Some(message) = rx.pop() {
            if let Err(err) = self.apply(message) {
                warn!(?message, %err, "dropped synth message");
            }
        }
    }

    fn apply(&mut self, message: SynthMessage) -> Result<()> {
        match message {
            SynthMessage::NoteOn { note, velocity } => self.press(note, velocity).map(drop),
            SynthMessage::NoteOff { note } => self.release(note).map(drop),
            SynthMessage::PitchBend { bend } => self.pitch_bend(bend),
            SynthMessage::AllNotesOff => {
                self.release_all();
                Ok(())
            }
            SynthMessage::SetParams { generator, params } => self.set_params(generator, params),
            SynthMessage::AddGenerator { params } => self.add_generator(params).map(drop),
            SynthMessage::RemoveGenerator { generator } => self.remove_generator(generator),
        }
    }

    pub fn add_generator(&mut self, params: EnvelopeParams) -> Result<GeneratorId> {
        params.validate()?;
        let id = GeneratorId(self.next_generator);
        self.next_generator += 1;
        self.generators.push(ToneGenerator::new(id, params));
        debug!(%id, "tone generator added");
        Ok(id)
    }

    /// Remove a generator and fade out the voices it is sounding.
    pub fn remove_generator(&mut self, id: GeneratorId) -> Result<()> {
        let index = self
            .generators
            .iter()
            .position(|g| g.id() == id)
            .ok_or(SynthError::UnknownGenerator(id.0))?;
        if self.generators.len() == 1 {
            return Err(SynthError::LastGenerator);
        }
        self.generators.remove(index);

        let mut orphaned = Vec::new();
        for held in self.registry.iter_mut() {
            let (gone, kept): (Vec<_>, Vec<_>) =
                held.voices.drain(..).partition(|(g, _)| *g == id);
            held.voices = kept;
            orphaned.extend(gone);
        }
        for (generator, voice) in orphaned {
            self.fade_out(generator, voice);
        }

        debug!(%id, "tone generator removed");
        Ok(())
    }

    /// Replace a generator's parameters. Sounding voices keep their old ones.
    ///
    /// Shaper curves are rebuilt here, not at press time.
    pub fn set_params(&mut self, id: GeneratorId, params: EnvelopeParams) -> Result<()> {
        params.validate()?;
        let generator = self
            .generators
            .iter_mut()
            .find(|g| g.id() == id)
            .ok_or(SynthError::UnknownGenerator(id.0))?;
        generator.set_params(params);
        Ok(())
    }

    /// Held notes in press order.
    pub fn active_notes(&self) -> Vec<NoteId> {
        self.registry.notes().collect()
    }

    pub fn is_held(&self, note: NoteId) -> bool {
        self.registry.contains(note)
    }

    pub fn registry(&self) -> &VoiceRegistry {
        &self.registry
    }

    /// Voices still fading out after release.
    pub fn fading_voices(&self) -> &[Voice] {
        &self.fading
    }

    pub fn generators(&self) -> &[ToneGenerator] {
        &self.generators
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }
}

impl<G: AudioGraph> HeldNotes for NoteDispatcher<G> {
    fn held_note_count(&self) -> usize {
        self.registry.len()
    }

    fn force_release_all(&mut self) -> usize {
        self.release_all()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::graph::{
        Automation, Endpoint, GraphError, NodeKey, NodeSpec, Param, SoftwareGraph,
    };
    use crate::io::NoteEvent;
    use crate::synth::hooks::Silent;
    use crate::synth::params::SourceWaveform;
    use crate::synth::voice::ResourceState;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn note(name: &str) -> NoteId {
        name.parse().unwrap()
    }

    fn params() -> EnvelopeParams {
        EnvelopeParams {
            pitch: -1,
            release: 0.5,
            ..EnvelopeParams::default()
        }
    }

    fn dispatcher(generators: &[EnvelopeParams]) -> NoteDispatcher<SoftwareGraph> {
        NoteDispatcher::new(
            SoftwareGraph::new(SAMPLE_RATE),
            generators,
            Box::new(Silent),
            Box::new(Silent),
            Box::new(Silent),
        )
        .unwrap()
    }

    #[derive(Clone, Default)]
    struct Log(Arc<Mutex<Vec<String>>>);

    impl Log {
        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl NoteIndicator for Log {
        fn set_active(&mut self, note: NoteId) {
            self.0.lock().unwrap().push(format!("+{note}"));
        }

        fn clear_active(&mut self, note: NoteId) {
            self.0.lock().unwrap().push(format!("-{note}"));
        }
    }

    impl MidiOutput for Log {
        fn send(&mut self, echo: MidiEcho) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{:?} {}", echo.kind, echo.note));
        }
    }

    #[test]
    fn press_then_release_leaves_registry_empty() {
        let mut synth = dispatcher(&[params()]);
        assert!(synth.press(note("c2"), 1.0).unwrap());
        assert!(synth.release(note("c2")).unwrap());
        assert!(synth.active_notes().is_empty());
        assert_eq!(synth.fading_voices().len(), 1);
    }

    #[test]
    fn double_press_is_idempotent() {
        let mut synth = dispatcher(&[params()]);
        assert!(synth.press(note("c2"), 1.0).unwrap());
        let nodes = synth.graph().node_count();

        assert!(!synth.press(note("c2"), 1.0).unwrap());
        assert_eq!(synth.active_notes(), vec![note("c2")]);
        assert_eq!(synth.graph().node_count(), nodes);
    }

    #[test]
    fn release_of_unknown_note_is_a_no_op() {
        let mut synth = dispatcher(&[params()]);
        assert!(!synth.release(note("c2")).unwrap());
    }

    #[test]
    fn hooks_see_press_and_release() {
        let log = Log::default();
        let mut synth = NoteDispatcher::new(
            SoftwareGraph::new(SAMPLE_RATE),
            &[params()],
            Box::new(log.clone()),
            Box::new(log.clone()),
            Box::new(Silent),
        )
        .unwrap();

        synth.press(note("c2"), 1.0).unwrap();
        synth.press(note("c2"), 1.0).unwrap();
        synth.release(note("c2")).unwrap();
        synth.release(note("c2")).unwrap();

        assert_eq!(
            log.entries(),
            ["+c2", "NoteOn c2", "-c2", "NoteOff c2"]
        );
    }

    #[test]
    fn fading_voices_are_freed_after_release_time() {
        let mut synth = dispatcher(&[params()]);
        synth.press(note("c2"), 1.0).unwrap();
        synth.release(note("c2")).unwrap();

        synth.graph_mut().advance(12_000); // 0.25 s
        assert_eq!(synth.service(), 0);
        assert!(synth.graph().node_count() > 0);

        synth.graph_mut().advance(12_000); // 0.5 s
        assert_eq!(synth.service(), 1);
        assert_eq!(synth.graph().node_count(), 0);
    }

    #[test]
    fn repress_during_fade_gets_a_fresh_voice() {
        let mut synth = dispatcher(&[params()]);
        synth.press(note("c2"), 1.0).unwrap();
        synth.release(note("c2")).unwrap();
        assert!(synth.press(note("c2"), 1.0).unwrap());

        let fresh = synth.registry().get(note("c2")).unwrap().voices[0]
            .1
            .source_node();

        synth.graph_mut().advance(48_000);
        assert_eq!(synth.service(), 1);

        assert!(synth.is_held(note("c2")));
        assert!(synth.graph().contains(fresh));
        let voice = &synth.registry().get(note("c2")).unwrap().voices[0].1;
        assert_eq!(voice.resource_state(), ResourceState::Active);
    }

    #[test]
    fn generators_fan_out_per_press() {
        let noise = EnvelopeParams {
            waveform: SourceWaveform::Noise,
            ..params()
        };
        let mut synth = dispatcher(&[params(), noise]);
        synth.press(note("c2"), 1.0).unwrap();

        let held = synth.registry().get(note("c2")).unwrap();
        assert_eq!(held.voices.len(), 2);
        assert_eq!(synth.registry().len(), 1);

        synth.release(note("c2")).unwrap();
        assert_eq!(synth.fading_voices().len(), 2);
    }

    #[test]
    fn pitch_bend_skips_noise_and_sticks_for_new_presses() {
        let noise = EnvelopeParams {
            waveform: SourceWaveform::Noise,
            ..params()
        };
        let mut synth = dispatcher(&[params(), noise]);
        synth.press(note("a4"), 1.0).unwrap();
        synth.pitch_bend(1.0).unwrap();

        let held = synth.registry().get(note("a4")).unwrap();
        assert_eq!(held.voices[0].1.frequency(), 660.0);
        assert_eq!(held.voices[1].1.frequency(), 440.0);

        synth.press(note("a3"), 1.0).unwrap();
        let later = synth.registry().get(note("a3")).unwrap();
        assert_eq!(later.voices[0].1.frequency(), 330.0);
    }

    #[test]
    fn rejected_bend_changes_nothing() {
        let mut synth = dispatcher(&[params()]);
        synth.press(note("a4"), 1.0).unwrap();
        assert!(matches!(
            synth.pitch_bend(-0.2),
            Err(SynthError::UnsupportedPitchBend(_))
        ));
        assert_eq!(synth.generators()[0].params().bend, 0.5);
        let held = synth.registry().get(note("a4")).unwrap();
        assert_eq!(held.voices[0].1.frequency(), 440.0);
    }

    #[test]
    fn params_are_read_at_press_time() {
        let mut synth = dispatcher(&[params()]);
        let id = synth.generators()[0].id();
        synth.press(note("a4"), 1.0).unwrap();

        let octave_up = EnvelopeParams { pitch: 0, ..params() };
        synth.set_params(id, octave_up).unwrap();
        synth.press(note("a3"), 1.0).unwrap();

        // The held a4 keeps its old tuning; a3 is built an octave up
        let first = &synth.registry().get(note("a4")).unwrap().voices[0].1;
        let second = &synth.registry().get(note("a3")).unwrap().voices[0].1;
        assert_eq!(first.frequency(), 440.0);
        assert_eq!(second.frequency(), 440.0);

        let invalid = EnvelopeParams { sustain: 200.0, ..params() };
        assert!(synth.set_params(id, invalid).is_err());
        assert_eq!(synth.generators()[0].params().pitch, 0);
    }

    #[test]
    fn presses_reuse_the_generator_curves() {
        let driven = EnvelopeParams {
            distortion: 30.0,
            overdrive: 4.0,
            ..params()
        };
        let mut synth = dispatcher(&[driven]);
        let curves = synth.generators()[0].curves().clone();
        let distortion = curves.distortion.unwrap();
        let overdrive = curves.overdrive.unwrap();
        let baseline = Arc::strong_count(&distortion);

        synth.press(note("c2"), 1.0).unwrap();
        synth.press(note("e2"), 1.0).unwrap();
        assert_eq!(Arc::strong_count(&distortion), baseline + 2);
        assert_eq!(Arc::strong_count(&overdrive), baseline + 2);

        synth.release_all();
        synth.graph_mut().advance(48_000);
        synth.service();
        assert_eq!(Arc::strong_count(&distortion), baseline);
    }

    #[test]
    fn out_of_range_pitch_is_refused_up_front() {
        let mut synth = dispatcher(&[params()]);
        let wild = EnvelopeParams {
            pitch: 127,
            ..params()
        };
        assert!(matches!(
            synth.add_generator(wild),
            Err(SynthError::InvalidParameter { param: "pitch", .. })
        ));
        let id = synth.generators()[0].id();
        assert!(synth.set_params(id, wild).is_err());
        assert_eq!(synth.generators().len(), 1);
    }

    #[test]
    fn unplayable_note_is_dropped_without_disturbing_others() {
        let mut synth = dispatcher(&[EnvelopeParams { pitch: 8, ..params() }]);
        // c1 · 2^9 is about 16.7 kHz; c4 would be over 130 kHz
        assert!(synth.press(note("c1"), 1.0).unwrap());
        let nodes = synth.graph().node_count();

        synth.dispatch(ControlEvent::Note(NoteEvent::press(note("c4"), 1.0)));
        assert_eq!(synth.active_notes(), vec![note("c1")]);
        assert_eq!(synth.graph().node_count(), nodes);

        let mut out = vec![0.0; 512];
        synth.graph_mut().render(&mut out);
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn removing_a_generator_fades_its_voices() {
        let mut synth = dispatcher(&[params(), params()]);
        let second = synth.generators()[1].id();
        synth.press(note("c2"), 1.0).unwrap();

        synth.remove_generator(second).unwrap();
        assert_eq!(synth.registry().get(note("c2")).unwrap().voices.len(), 1);
        assert_eq!(synth.fading_voices().len(), 1);

        let first = synth.generators()[0].id();
        assert!(matches!(
            synth.remove_generator(first),
            Err(SynthError::LastGenerator)
        ));
        assert!(matches!(
            synth.remove_generator(GeneratorId(99)),
            Err(SynthError::UnknownGenerator(99))
        ));
    }

    #[test]
    fn release_all_empties_registry() {
        let mut synth = dispatcher(&[params()]);
        for name in ["c1", "e1", "g1"] {
            synth.press(note(name), 0.8).unwrap();
        }
        assert_eq!(synth.force_release_all(), 3);
        assert_eq!(synth.held_note_count(), 0);
        assert_eq!(synth.fading_voices().len(), 3);
    }

    #[test]
    fn shutdown_frees_everything_now() {
        let mut synth = dispatcher(&[params()]);
        synth.press(note("c1"), 1.0).unwrap();
        synth.press(note("d1"), 1.0).unwrap();
        synth.release(note("d1")).unwrap();

        synth.shutdown();
        assert!(synth.active_notes().is_empty());
        assert!(synth.fading_voices().is_empty());
        assert_eq!(synth.graph().node_count(), 0);
    }

    #[test]
    fn drains_queued_messages_in_order() {
        let mut synth = dispatcher(&[params()]);
        let mut queue: VecDeque<SynthMessage> = VecDeque::from([
            SynthMessage::NoteOn {
                note: note("c2"),
                velocity: 1.0,
            },
            SynthMessage::NoteOn {
                note: note("d2"),
                velocity: 1.0,
            },
            SynthMessage::NoteOff { note: note("c2") },
            SynthMessage::PitchBend { bend: 7.0 },
        ]);

        synth.drain_messages(&mut queue);
        assert!(queue.is_empty());
        assert_eq!(synth.active_notes(), vec![note("d2")]);
    }

    /// Graph that refuses to create nodes once a budget is spent.
    struct Budgeted {
        inner: SoftwareGraph,
        remaining: usize,
    }

    impl AudioGraph for Budgeted {
        fn current_time(&self) -> f64 {
            self.inner.current_time()
        }

        fn sample_rate(&self) -> f32 {
            AudioGraph::sample_rate(&self.inner)
        }

        fn create_node(&mut self, spec: NodeSpec) -> std::result::Result<NodeKey, GraphError> {
            if self.remaining == 0 {
                return Err(GraphError::NonPositiveRamp(0.0));
            }
            self.remaining -= 1;
            self.inner.create_node(spec)
        }

        fn connect(&mut self, from: NodeKey, to: Endpoint) -> std::result::Result<(), GraphError> {
            self.inner.connect(from, to)
        }

        fn schedule(
            &mut self,
            node: NodeKey,
            param: Param,
            automation: Automation,
        ) -> std::result::Result<(), GraphError> {
            self.inner.schedule(node, param, automation)
        }

        fn start(&mut self, node: NodeKey, when: f64) -> std::result::Result<(), GraphError> {
            self.inner.start(node, when)
        }

        fn stop(&mut self, node: NodeKey, when: f64) -> std::result::Result<(), GraphError> {
            self.inner.stop(node, when)
        }

        fn dispose(&mut self, node: NodeKey) -> std::result::Result<(), GraphError> {
            self.inner.dispose(node)
        }
    }

    #[test]
    fn failed_fan_out_leaves_no_trace() {
        // Enough nodes for the first generator's voice, not the second
        let graph = Budgeted {
            inner: SoftwareGraph::new(SAMPLE_RATE),
            remaining: 8,
        };
        let mut synth = NoteDispatcher::new(
            graph,
            &[params(), params()],
            Box::new(Silent),
            Box::new(Silent),
            Box::new(Silent),
        )
        .unwrap();

        assert!(synth.press(note("c2"), 1.0).is_err());
        assert!(synth.active_notes().is_empty());
        assert_eq!(synth.graph().inner.node_count(), 0);

        // dispatch() contains the failure
        synth.dispatch(ControlEvent::Note(NoteEvent::press(note("c2"), 1.0)));
        assert!(synth.active_notes().is_empty());
    }
}
