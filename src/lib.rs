//! saavy_keys - polyphonic keyboard synthesizer core.
//!
//! Keyboard, on-screen and MIDI input is normalized into note events, the
//! [`synth::NoteDispatcher`] keeps at most one voice per note, and every voice
//! builds its signal chain against an [`graph::AudioGraph`] by scheduling
//! parameter automation on the audio clock. [`graph::SoftwareGraph`] is the
//! in-process renderer used by the terminal binary and the tests.

pub mod config;
pub mod context;
pub mod dsp;
pub mod error;
pub mod graph; // Audio graph backend and render nodes
pub mod io;
pub mod notes; // Note names, frequencies and key bindings
pub mod synth; // Voices, dispatcher and dead-note reconciliation

pub use config::SynthConfig;
pub use context::{AppContext, Collaborators};
pub use error::SynthError;
pub use notes::{NoteId, PitchClass};

pub const MAX_BLOCK_SIZE: usize = 2048;

/// Smallest gain an exponential ramp may start from or target.
pub const GAIN_FLOOR: f32 = 0.00001;

/// Smallest sustain level handed to the decay ramp.
pub const SUSTAIN_FLOOR: f32 = 0.000001;

/// Peak gain reached by the attack stage.
pub const ATTACK_PEAK: f32 = 0.9;
