use std::sync::Arc;

use tracing::warn;

use crate::error::{Result, SynthError};
use crate::graph::{AudioGraph, Automation, Endpoint, GraphError, NodeKey, NodeSpec, Param};
use crate::notes::{bend_factor, resolve_frequency, NoteId, CENTER_BEND};
use crate::synth::generator::{ShaperCurves, ToneGenerator};
use crate::synth::params::{EnvelopeParams, SourceKind};
use crate::{ATTACK_PEAK, GAIN_FLOOR};

/*
Voice Signal Chain
==================

One voice is one sounding note for one tone generator:

  source ─→ [band-pass] ─→ attack ─→ decay ─→ velocity ─→ [distortion]
     ─→ [overdrive] ─→ release ─→ volume ─┬─→ destination
                                          └─→ capture (when recording)

  source      oscillator at the note frequency, or looping noise whose
              band-pass sits at the note frequency
  attack      0.00001 at press, exponential ramp to 0.9 over
              max(threshold, attack)
  decay       holds 1 until the attack time, then exponential ramp to the
              sustain level (never exactly zero) over the decay time
  velocity    static multiplier
  shapers     inserted only when their amount is nonzero; the curve tables
              come from the tone generator and are shared, never rebuilt
  release     passthrough until release, then 0.9 → 0.00001 over
              max(threshold, release)
  volume      static master volume fraction

Two independent state variables track a voice:

  logical:   Down ──release()──→ Up
  resource:  Active ──release()──→ Fading(until) ──teardown()──→ Released

Release flips both at once and records when the fade ends. The owner
calls teardown() once the audio clock passes that deadline; nothing in
the voice infers one state from the other.

A resolved frequency must be finite and below Nyquist for the graph's
sample rate. Anything else is refused before a node is created, and a bend
that would leave that range is refused without retuning.
*/

/// Band-pass Q applied to noise sources.
pub const NOISE_Q: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalState {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceState {
    Active,
    /// Release ramp running; hardware may be freed at `until` (audio clock).
    Fading { until: f64 },
    Released,
}

pub struct Voice {
    note: NoteId,
    source_kind: SourceKind,
    source: NodeKey,
    /// Band-pass center for noise sources.
    filter: Option<NodeKey>,
    release_gain: NodeKey,
    /// Every node this voice owns, source first.
    nodes: Vec<NodeKey>,
    /// Base frequency with transposition, before bend.
    unbent_frequency: f64,
    frequency: f64,
    release_time: f64,
    logical: LogicalState,
    resource: ResourceState,
}

impl Voice {
    /// Build and start the signal chain for `note` from `generator`'s
    /// current snapshot.
    ///
    /// On failure every node created so far is disposed again.
    pub fn build<G: AudioGraph>(
        graph: &mut G,
        note: NoteId,
        velocity: f32,
        generator: &ToneGenerator,
        capture: Option<Endpoint>,
    ) -> Result<Self> {
        let params = generator.params();
        let unbent_frequency = resolve_frequency(note, params.pitch, CENTER_BEND)?;
        let frequency = resolve_frequency(note, params.pitch, params.bend)?;
        check_playable(note, frequency, graph.sample_rate())?;

        let mut builder = ChainBuilder {
            graph,
            nodes: Vec::with_capacity(10),
        };
        match builder.build(velocity, frequency as f32, params, generator.curves(), capture) {
            Ok(chain) => Ok(Self {
                note,
                source_kind: params.waveform.source_kind(),
                source: chain.source,
                filter: chain.filter,
                release_gain: chain.release_gain,
                nodes: builder.nodes,
                unbent_frequency,
                frequency,
                release_time: params.release_time(),
                logical: LogicalState::Down,
                resource: ResourceState::Active,
            }),
            Err(err) => {
                for node in builder.nodes {
                    let _ = builder.graph.dispose(node);
                }
                Err(err.into())
            }
        }
    }

    /// Schedule the release ramp and return when the fade ends.
    ///
    /// Calling it again on a released voice changes nothing.
    pub fn release<G: AudioGraph>(&mut self, graph: &mut G) -> Result<f64> {
        if let ResourceState::Fading { until } = self.resource {
            return Ok(until);
        }

        let now = graph.current_time();
        let until = now + self.release_time;
        self.logical = LogicalState::Up;
        self.resource = ResourceState::Fading { until };

        graph.schedule(
            self.release_gain,
            Param::Gain,
            Automation::SetValueAtTime {
                value: ATTACK_PEAK,
                time: now,
            },
        )?;
        graph.schedule(
            self.release_gain,
            Param::Gain,
            Automation::ExponentialRampToValueAtTime {
                value: GAIN_FLOOR,
                time: until,
            },
        )?;
        graph.stop(self.source, until)?;
        Ok(until)
    }

    /// Retune a sounding voice for a new bend position.
    ///
    /// Returns `false` without touching the graph when the source cannot be
    /// retuned live (noise).
    pub fn apply_bend<G: AudioGraph>(&mut self, graph: &mut G, bend: f32) -> Result<bool> {
        if !self.source_kind.supports_live_frequency_update() {
            return Ok(false);
        }

        let frequency = self.unbent_frequency * bend_factor(bend)?;
        check_playable(self.note, frequency, graph.sample_rate())?;
        let now = graph.current_time();
        graph.schedule(
            self.source,
            Param::Frequency,
            Automation::SetValueAtTime {
                value: frequency as f32,
                time: now,
            },
        )?;
        self.frequency = frequency;
        Ok(true)
    }

    /// Whether the fade has finished at audio time `now`.
    pub fn is_due(&self, now: f64) -> bool {
        matches!(self.resource, ResourceState::Fading { until } if now >= until)
    }

    /// Dispose every node. Safe to call more than once.
    pub fn teardown<G: AudioGraph>(&mut self, graph: &mut G) {
        if self.resource == ResourceState::Released {
            return;
        }
        for &node in &self.nodes {
            if let Err(err) = graph.dispose(node) {
                warn!(note = %self.note, %err, "voice node already gone");
            }
        }
        self.logical = LogicalState::Up;
        self.resource = ResourceState::Released;
    }

    pub fn note(&self) -> NoteId {
        self.note
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    /// Current source frequency in Hz (band-pass center for noise).
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn logical_state(&self) -> LogicalState {
        self.logical
    }

    pub fn resource_state(&self) -> ResourceState {
        self.resource
    }

    pub fn source_node(&self) -> NodeKey {
        self.source
    }

    pub fn filter_node(&self) -> Option<NodeKey> {
        self.filter
    }

    pub fn release_node(&self) -> NodeKey {
        self.release_gain
    }

    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }
}

fn check_playable(note: NoteId, frequency: f64, sample_rate: f32) -> Result<()> {
    let nyquist = sample_rate as f64 / 2.0;
    if frequency.is_finite() && frequency > 0.0 && frequency < nyquist {
        Ok(())
    } else {
        Err(SynthError::UnplayableFrequency {
            note,
            frequency,
            nyquist,
        })
    }
}

struct Chain {
    source: NodeKey,
    filter: Option<NodeKey>,
    release_gain: NodeKey,
}

/// Creates nodes while remembering each one, so a failed build can undo itself.
struct ChainBuilder<'g, G> {
    graph: &'g mut G,
    nodes: Vec<NodeKey>,
}

impl<G: AudioGraph> ChainBuilder<'_, G> {
    fn node(&mut self, spec: NodeSpec) -> std::result::Result<NodeKey, GraphError> {
        let key = self.graph.create_node(spec)?;
        self.nodes.push(key);
        Ok(key)
    }

    /// Create `spec` and connect `from` into it.
    fn then(&mut self, from: NodeKey, spec: NodeSpec) -> std::result::Result<NodeKey, GraphError> {
        let key = self.node(spec)?;
        self.graph.connect(from, Endpoint::Node(key))?;
        Ok(key)
    }

    fn build(
        &mut self,
        velocity: f32,
        frequency: f32,
        params: &EnvelopeParams,
        curves: &ShaperCurves,
        capture: Option<Endpoint>,
    ) -> std::result::Result<Chain, GraphError> {
        let now = self.graph.current_time();
        let attack_time = params.attack_time();
        let attack = params.attack as f64;

        let (source, filter, mut tail) = match params.waveform.source_kind() {
            SourceKind::Oscillator(waveform) => {
                let osc = self.node(NodeSpec::Oscillator {
                    waveform,
                    frequency,
                })?;
                (osc, None, osc)
            }
            SourceKind::Noise => {
                let noise = self.node(NodeSpec::Noise)?;
                let band = self.then(
                    noise,
                    NodeSpec::BandPass {
                        frequency,
                        q: NOISE_Q,
                    },
                )?;
                (noise, Some(band), band)
            }
        };

        let attack_gain = self.then(tail, NodeSpec::Gain { gain: 1.0 })?;
        self.graph.schedule(
            attack_gain,
            Param::Gain,
            Automation::SetValueAtTime {
                value: GAIN_FLOOR,
                time: now,
            },
        )?;
        self.graph.schedule(
            attack_gain,
            Param::Gain,
            Automation::ExponentialRampToValueAtTime {
                value: ATTACK_PEAK,
                time: now + attack_time,
            },
        )?;

        let decay_gain = self.then(attack_gain, NodeSpec::Gain { gain: 1.0 })?;
        self.graph.schedule(
            decay_gain,
            Param::Gain,
            Automation::SetValueAtTime {
                value: 1.0,
                time: now + attack,
            },
        )?;
        self.graph.schedule(
            decay_gain,
            Param::Gain,
            Automation::ExponentialRampToValueAtTime {
                value: params.sustain_level(),
                time: now + attack + params.decay as f64,
            },
        )?;

        tail = self.then(decay_gain, NodeSpec::Gain { gain: velocity })?;

        for curve in [&curves.distortion, &curves.overdrive].into_iter().flatten() {
            let curve = Arc::clone(curve);
            tail = self.then(tail, NodeSpec::Shaper { curve })?;
        }

        let release_gain = self.then(tail, NodeSpec::Gain { gain: 1.0 })?;
        let volume = self.then(
            release_gain,
            NodeSpec::Gain {
                gain: params.volume / 100.0,
            },
        )?;

        self.graph.connect(volume, Endpoint::Destination)?;
        if let Some(capture) = capture {
            self.graph.connect(volume, capture)?;
        }

        self.graph.start(source, now)?;

        Ok(Chain {
            source,
            filter,
            release_gain,
        })
    }
}
