//! Configuration management (TOML).
//!
//! Holds the tone generator snapshots, MIDI routing, reconciler cadence and
//! the output sample-rate hint. A missing file means defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SynthError};
use crate::io::MidiRouting;
use crate::synth::EnvelopeParams;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Dead-note sweep interval in milliseconds (default: 100)
    #[serde(default = "default_reconcile_interval_ms")]
    pub reconcile_interval_ms: u64,
    /// Preferred output sample rate (default: 48000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// MIDI channels and octave alignment
    #[serde(default)]
    pub midi: MidiRouting,
    /// One entry per tone generator (default: one default generator)
    #[serde(default = "default_generators")]
    pub generators: Vec<EnvelopeParams>,
}

fn default_generators() -> Vec<EnvelopeParams> {
    vec![EnvelopeParams::default()]
}
fn default_reconcile_interval_ms() -> u64 {
    100
}
fn default_sample_rate() -> u32 {
    48_000
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_ms: default_reconcile_interval_ms(),
            sample_rate: default_sample_rate(),
            midi: MidiRouting::default(),
            generators: default_generators(),
        }
    }
}

impl SynthConfig {
    /// Load from a TOML file; a missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SynthError::ReadFile {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SynthError::WriteFile {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, text).map_err(|source| SynthError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.generators.is_empty() {
            return Err(SynthError::invalid("generators", "at least one is required"));
        }
        for params in &self.generators {
            params.validate()?;
        }
        if self.midi.input_channel > 15 {
            return Err(SynthError::invalid("midi.input_channel", "must be 0-15"));
        }
        if self.midi.output_channel.is_some_and(|ch| ch > 15) {
            return Err(SynthError::invalid("midi.output_channel", "must be 0-15"));
        }
        if self.reconcile_interval_ms == 0 {
            return Err(SynthError::invalid("reconcile_interval_ms", "must be positive"));
        }
        if self.sample_rate == 0 {
            return Err(SynthError::invalid("sample_rate", "must be positive"));
        }
        Ok(())
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }
}
