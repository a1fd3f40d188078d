//! Error types for the synthesizer core.
//!
//! Per-event failures (a bad note name, an out-of-range bend) are contained by
//! the dispatcher: they are logged and the event is dropped. Only
//! initialization and configuration errors travel further up.

use std::path::PathBuf;
use thiserror::Error;

use crate::graph::GraphError;
use crate::notes::NoteId;

/// Errors produced by the synthesizer core.
#[derive(Debug, Error)]
pub enum SynthError {
    /// A note identifier did not match the pitch-class grammar.
    #[error("invalid note name: {0:?}")]
    InvalidNoteName(String),

    /// Pitch bend outside `0.0..=1.0`.
    #[error("pitch bend {0} is outside 0.0..=1.0")]
    UnsupportedPitchBend(f32),

    /// The platform denied or lacks MIDI; MIDI stays disabled for the session.
    #[error("MIDI unavailable: {0}")]
    MidiUnavailable(String),

    /// No audio capability at all; the core refuses to start.
    #[error("audio unavailable: {0}")]
    AudioUnavailable(String),

    /// A note resolved to a frequency the graph cannot render.
    #[error("{note} resolves to {frequency} Hz, outside 0..{nyquist} Hz")]
    UnplayableFrequency {
        note: NoteId,
        frequency: f64,
        nyquist: f64,
    },

    /// The audio graph rejected an operation.
    #[error("audio graph error: {0}")]
    Graph(#[from] GraphError),

    /// A parameter snapshot failed validation.
    #[error("invalid parameter '{param}': {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        param: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// No tone generator with this id.
    #[error("unknown tone generator {0}")]
    UnknownGenerator(u32),

    /// The last tone generator cannot be removed.
    #[error("at least one tone generator must remain")]
    LastGenerator,

    /// Failed to read a config file.
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a config file.
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML.
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl SynthError {
    pub(crate) fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        SynthError::InvalidParameter {
            param,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = SynthError> = std::result::Result<T, E>;
