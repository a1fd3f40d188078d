use std::collections::BTreeSet;

use proptest::prelude::*;
use saavy_keys::graph::{AudioGraph, Param, SoftwareGraph};
use saavy_keys::synth::{
    EnvelopeParams, LogicalState, NoteDispatcher, ResourceState, Silent, SourceWaveform,
};
use saavy_keys::NoteId;

const SAMPLE_RATE: f32 = 48_000.0;

fn note(name: &str) -> NoteId {
    name.parse().unwrap()
}

fn synth(generators: &[EnvelopeParams]) -> NoteDispatcher<SoftwareGraph> {
    NoteDispatcher::new(
        SoftwareGraph::with_seed(SAMPLE_RATE, 7),
        generators,
        Box::new(Silent),
        Box::new(Silent),
        Box::new(Silent),
    )
    .unwrap()
}

fn held(synth: &NoteDispatcher<SoftwareGraph>) -> BTreeSet<NoteId> {
    synth.active_notes().into_iter().collect()
}

fn set(names: &[&str]) -> BTreeSet<NoteId> {
    names.iter().map(|n| note(n)).collect()
}

fn seconds(s: f32) -> usize {
    (s * SAMPLE_RATE) as usize
}

fn rms(buf: &[f32]) -> f32 {
    (buf.iter().map(|x| x * x).sum::<f32>() / buf.len() as f32).sqrt()
}

#[test]
fn chord_builds_up_and_releases_note_by_note() {
    let mut synth = synth(&[]);
    assert!(held(&synth).is_empty());

    synth.press(note("c2"), 1.0).unwrap();
    assert_eq!(held(&synth), set(&["c2"]));

    synth.press(note("d2"), 1.0).unwrap();
    assert_eq!(held(&synth), set(&["c2", "d2"]));

    synth.release(note("c2")).unwrap();
    assert_eq!(held(&synth), set(&["d2"]));
}

#[test]
fn pressing_a_held_note_again_changes_nothing() {
    let mut synth = synth(&[]);
    assert!(synth.press(note("c2"), 1.0).unwrap());
    let nodes = synth.graph().node_count();

    assert!(!synth.press(note("c2"), 0.3).unwrap());
    assert_eq!(synth.graph().node_count(), nodes);
    assert_eq!(synth.registry().len(), 1);
    assert_eq!(synth.registry().get(note("c2")).unwrap().velocity, 1.0);
}

#[test]
fn releasing_one_note_leaves_another_untouched() {
    let mut synth = synth(&[EnvelopeParams {
        release: 0.5,
        ..EnvelopeParams::default()
    }]);
    synth.press(note("c2"), 1.0).unwrap();
    synth.press(note("e2"), 1.0).unwrap();

    let (source, frequency) = {
        let voice = &synth.registry().get(note("e2")).unwrap().voices[0].1;
        (voice.source_node(), voice.frequency())
    };

    synth.release(note("c2")).unwrap();
    synth.graph_mut().advance(seconds(1.0));
    assert_eq!(synth.service(), 1);

    let voice = &synth.registry().get(note("e2")).unwrap().voices[0].1;
    assert_eq!(voice.logical_state(), LogicalState::Down);
    assert_eq!(voice.resource_state(), ResourceState::Active);
    assert_eq!(voice.frequency(), frequency);
    assert!(synth.graph().contains(source));
    assert_eq!(
        synth.graph().param_value(source, Param::Frequency).unwrap(),
        frequency as f32
    );
}

#[test]
fn re_press_during_fade_survives_the_old_teardown() {
    let mut synth = synth(&[EnvelopeParams {
        release: 0.25,
        ..EnvelopeParams::default()
    }]);
    synth.press(note("g1"), 1.0).unwrap();
    synth.release(note("g1")).unwrap();
    assert!(synth.press(note("g1"), 1.0).unwrap());

    assert!(synth.is_held(note("g1")));
    assert_eq!(synth.fading_voices().len(), 1);

    synth.graph_mut().advance(seconds(0.5));
    assert_eq!(synth.service(), 1);
    assert!(synth.fading_voices().is_empty());

    let voice = &synth.registry().get(note("g1")).unwrap().voices[0].1;
    assert_eq!(voice.resource_state(), ResourceState::Active);
    assert!(voice.nodes().iter().all(|&key| synth.graph().contains(key)));
}

#[test]
fn released_note_falls_silent_and_frees_its_nodes() {
    let mut synth = synth(&[]);
    synth.press(note("c2"), 1.0).unwrap();

    let mut block = vec![0.0; seconds(0.1)];
    synth.graph_mut().render(&mut block);
    assert!(rms(&block[seconds(0.05)..]) > 0.05);

    synth.release(note("c2")).unwrap();
    synth.graph_mut().advance(seconds(0.01));
    assert_eq!(synth.service(), 1);
    assert_eq!(synth.graph().node_count(), 0);

    synth.graph_mut().render(&mut block);
    assert!(block.iter().all(|&s| s == 0.0));
}

#[test]
fn every_generator_sounds_each_note() {
    let mut synth = synth(&[
        EnvelopeParams::default(),
        EnvelopeParams {
            waveform: SourceWaveform::Noise,
            ..EnvelopeParams::default()
        },
        EnvelopeParams {
            waveform: SourceWaveform::Sawtooth,
            distortion: 20.0,
            ..EnvelopeParams::default()
        },
    ]);
    synth.press(note("a1"), 0.8).unwrap();

    let voices = &synth.registry().get(note("a1")).unwrap().voices;
    assert_eq!(voices.len(), 3);
    assert!(voices[0].1.filter_node().is_none());
    assert!(voices[1].1.filter_node().is_some());

    synth.release(note("a1")).unwrap();
    assert_eq!(synth.fading_voices().len(), 3);
}

#[test]
fn pitch_bend_retunes_held_notes_and_later_presses() {
    let mut synth = synth(&[]);
    synth.press(note("a1"), 1.0).unwrap();
    let centered = synth.registry().get(note("a1")).unwrap().voices[0].1.frequency();

    synth.pitch_bend(1.0).unwrap();
    let bent = synth.registry().get(note("a1")).unwrap().voices[0].1.frequency();
    assert!((bent / centered - 1.5).abs() < 1e-9);

    synth.press(note("a2"), 1.0).unwrap();
    let later = synth.registry().get(note("a2")).unwrap().voices[0].1.frequency();
    assert!((later / bent - 2.0).abs() < 1e-9);

    assert!(synth.pitch_bend(1.5).is_err());
    assert_eq!(synth.generators()[0].params().bend, 1.0);
}

#[test]
fn audio_clock_only_moves_forward() {
    let mut synth = synth(&[]);
    let start = synth.graph().current_time();
    synth.graph_mut().advance(128);
    assert!(synth.graph().current_time() > start);
}

#[derive(Debug, Clone)]
enum Step {
    Press(usize),
    Release(usize),
    Wait(u16),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..6).prop_map(Step::Press),
        (0usize..6).prop_map(Step::Release),
        (1u16..4_800).prop_map(Step::Wait),
    ]
}

const NAMES: [&str; 6] = ["c1", "e1", "g1", "c2", "e2", "g2"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Held notes track presses and releases exactly, and nothing leaks
    /// once everything has been let go.
    #[test]
    fn held_notes_follow_input(steps in prop::collection::vec(step(), 1..40)) {
        let mut synth = synth(&[EnvelopeParams {
            release: 0.05,
            ..EnvelopeParams::default()
        }]);
        let mut model = BTreeSet::new();

        for step in steps {
            match step {
                Step::Press(i) => {
                    let n = note(NAMES[i]);
                    prop_assert_eq!(synth.press(n, 1.0).unwrap(), model.insert(n));
                }
                Step::Release(i) => {
                    let n = note(NAMES[i]);
                    prop_assert_eq!(synth.release(n).unwrap(), model.remove(&n));
                }
                Step::Wait(frames) => {
                    synth.graph_mut().advance(frames as usize);
                    synth.service();
                }
            }
            prop_assert_eq!(held(&synth), model.clone());
        }

        synth.release_all();
        synth.graph_mut().advance(seconds(0.1));
        synth.service();
        prop_assert!(synth.fading_voices().is_empty());
        prop_assert_eq!(synth.graph().node_count(), 0);
    }
}
