//! Audio-graph backend the synth schedules voices against.
//!
//! [`AudioGraph`] is the seam: voices create nodes, wire them, and schedule
//! parameter automation on the audio clock without ever touching samples.
//! [`SoftwareGraph`] is the in-process implementation that renders those
//! nodes block by block.

/// Gain node (static or automated multiplier).
pub mod amplify;
/// The `AudioGraph` trait, node recipes, keys, and errors.
pub mod backend;
/// Waveshaper node.
pub mod distortion;
/// Band-pass filter node.
pub mod filter;
/// Render-node trait and block context.
pub mod node;
/// Periodic oscillator and looping noise sources.
pub mod oscillator;
/// Automation timelines for node parameters.
pub mod param;
/// Slab-backed graph that renders in topological order.
pub mod software;

pub use backend::{AudioGraph, Automation, Endpoint, GraphError, NodeKey, NodeSpec, Param};
pub use software::SoftwareGraph;
