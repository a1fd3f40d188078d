use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::dsp::Waveform;

/// Generation-checked handle to a node in an [`AudioGraph`].
///
/// A slot index is reused after its node is disposed; the generation makes
/// stale handles fail instead of touching the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}v{}", self.index, self.generation)
    }
}

/// Where a node's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Input of another node (including capture nodes).
    Node(NodeKey),
    /// The main output.
    Destination,
}

/// Automatable parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Frequency,
    Gain,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Frequency => f.write_str("frequency"),
            Param::Gain => f.write_str("gain"),
        }
    }
}

/// A scheduled parameter change on the audio clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Automation {
    SetValueAtTime { value: f32, time: f64 },
    ExponentialRampToValueAtTime { value: f32, time: f64 },
}

/// Construction recipe for a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    /// Periodic oscillator. Silent until started.
    Oscillator { waveform: Waveform, frequency: f32 },
    /// Looping read of the graph's noise buffer. Silent until started.
    Noise,
    /// Band-pass filter with an automatable center frequency.
    BandPass { frequency: f32, q: f32 },
    /// Multiplier with an automatable gain.
    Gain { gain: f32 },
    /// Waveshaper mapping samples through a transfer curve.
    ///
    /// The curve is shared, not copied, so building a shaper never
    /// recomputes or clones the table.
    Shaper { curve: Arc<[f32]> },
}

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("{0} does not exist")]
    UnknownNode(NodeKey),

    #[error("{node} has no {param} parameter")]
    UnsupportedParam { node: NodeKey, param: Param },

    #[error("{0} is not a source node")]
    NotASource(NodeKey),

    #[error("connecting {from} to {to} would create a cycle")]
    Cycle { from: NodeKey, to: NodeKey },

    #[error("exponential ramp target must be positive, got {0}")]
    NonPositiveRamp(f32),
}

/// The audio subsystem the synth schedules against.
///
/// Mirrors the observable behavior of a browser audio context: nodes are
/// created and wired up front, parameter changes are scheduled for future
/// times on the audio clock, and the clock only moves while audio renders.
pub trait AudioGraph {
    /// Audio clock in seconds.
    fn current_time(&self) -> f64;

    /// Frames per second the graph renders at.
    fn sample_rate(&self) -> f32;

    fn create_node(&mut self, spec: NodeSpec) -> Result<NodeKey, GraphError>;

    fn connect(&mut self, from: NodeKey, to: Endpoint) -> Result<(), GraphError>;

    fn schedule(
        &mut self,
        node: NodeKey,
        param: Param,
        automation: Automation,
    ) -> Result<(), GraphError>;

    fn start(&mut self, node: NodeKey, when: f64) -> Result<(), GraphError>;

    fn stop(&mut self, node: NodeKey, when: f64) -> Result<(), GraphError>;

    /// Disconnect and free a node. Its key becomes invalid.
    fn dispose(&mut self, node: NodeKey) -> Result<(), GraphError>;
}
