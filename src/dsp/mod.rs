//! Low-level DSP primitives used by the render nodes in [`crate::graph`].
//!
//! These components are allocation-free once constructed and realtime-safe,
//! so render nodes can embed them directly. They stay focused on the signal
//! math; scheduling and topology live in the graph.

/// Waveshaper transfer curves (distortion and overdrive).
pub mod distortion;
/// State-variable band-pass filter.
pub mod filter;
/// Phase-accumulator oscillator waveforms and noise fill.
pub mod oscillator;

pub use oscillator::Waveform;
