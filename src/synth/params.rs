use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::dsp::Waveform;
use crate::error::{Result, SynthError};
use crate::notes::CENTER_BEND;

/// Accepted octave transposition settings.
///
/// -1 leaves notes untransposed; each step above doubles the frequency once
/// more, so 8 lifts the base frequency by 2^9.
pub const PITCH_RANGE: RangeInclusive<i8> = -1..=8;

/// Sound source selected for a tone generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceWaveform {
    #[default]
    Sine,
    Square,
    Triangle,
    Sawtooth,
    Noise,
}

impl SourceWaveform {
    pub fn source_kind(self) -> SourceKind {
        match self {
            SourceWaveform::Sine => SourceKind::Oscillator(Waveform::Sine),
            SourceWaveform::Square => SourceKind::Oscillator(Waveform::Square),
            SourceWaveform::Triangle => SourceKind::Oscillator(Waveform::Triangle),
            SourceWaveform::Sawtooth => SourceKind::Oscillator(Waveform::Sawtooth),
            SourceWaveform::Noise => SourceKind::Noise,
        }
    }
}

/// What a voice's source node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Oscillator(Waveform),
    /// Looping noise buffer behind a band-pass filter.
    Noise,
}

impl SourceKind {
    /// Whether pitch bend may retune the source while it sounds.
    pub fn supports_live_frequency_update(self) -> bool {
        matches!(self, SourceKind::Oscillator(_))
    }
}

/// Parameter snapshot for one tone generator.
///
/// Read once per press; editing it never alters a voice already built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeParams {
    /// Shortest ramp duration in seconds.
    pub threshold: f32,
    /// Seconds.
    pub attack: f32,
    /// Seconds.
    pub decay: f32,
    /// Percent of peak, 0-100.
    pub sustain: f32,
    /// Seconds.
    pub release: f32,
    /// Distortion curve amount. 0 leaves the stage out.
    pub distortion: f32,
    /// Overdrive drive. 0 leaves the stage out.
    pub overdrive: f32,
    pub waveform: SourceWaveform,
    /// Octave transposition control, within [`PITCH_RANGE`].
    pub pitch: i8,
    /// Pitch-bend position, 0.5 is center.
    pub bend: f32,
    /// Master volume percent, 0-100.
    pub volume: f32,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            threshold: 0.001,
            attack: 0.0,
            decay: 0.0,
            sustain: 50.0,
            release: 0.0,
            distortion: 0.0,
            overdrive: 0.0,
            waveform: SourceWaveform::Sine,
            pitch: 3,
            bend: CENTER_BEND,
            volume: 99.0,
        }
    }
}

impl EnvelopeParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0) || !self.threshold.is_finite() {
            return Err(SynthError::invalid("threshold", "must be positive"));
        }

        for (name, value) in [
            ("attack", self.attack),
            ("decay", self.decay),
            ("release", self.release),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(SynthError::invalid(name, format!("{value} is not a duration")));
            }
        }

        for (name, value) in [("sustain", self.sustain), ("volume", self.volume)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(SynthError::invalid(name, format!("{value} is outside 0-100")));
            }
        }

        for (name, value) in [("distortion", self.distortion), ("overdrive", self.overdrive)] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(SynthError::invalid(name, format!("{value} is negative")));
            }
        }

        if !PITCH_RANGE.contains(&self.pitch) {
            return Err(SynthError::invalid(
                "pitch",
                format!(
                    "{} is outside {}..={}",
                    self.pitch,
                    PITCH_RANGE.start(),
                    PITCH_RANGE.end()
                ),
            ));
        }

        if !(0.0..=1.0).contains(&self.bend) {
            return Err(SynthError::UnsupportedPitchBend(self.bend));
        }

        Ok(())
    }

    /// Duration of the attack ramp.
    pub fn attack_time(&self) -> f64 {
        self.threshold.max(self.attack) as f64
    }

    /// Duration of the release ramp.
    pub fn release_time(&self) -> f64 {
        self.threshold.max(self.release) as f64
    }

    /// Level the decay stage settles at, never zero.
    pub fn sustain_level(&self) -> f32 {
        (self.sustain / 100.0).max(crate::SUSTAIN_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EnvelopeParams::default().validate().unwrap();
    }

    #[test]
    fn noise_cannot_be_retuned_live() {
        assert!(SourceWaveform::Square
            .source_kind()
            .supports_live_frequency_update());
        assert!(!SourceWaveform::Noise
            .source_kind()
            .supports_live_frequency_update());
    }

    #[test]
    fn zero_sustain_clamps_to_floor() {
        let params = EnvelopeParams {
            sustain: 0.0,
            ..EnvelopeParams::default()
        };
        assert_eq!(params.sustain_level(), crate::SUSTAIN_FLOOR);
    }

    #[test]
    fn short_ramps_are_raised_to_threshold() {
        let params = EnvelopeParams {
            attack: 0.0,
            release: 2.0,
            ..EnvelopeParams::default()
        };
        assert!((params.attack_time() - 0.001).abs() < 1e-9);
        assert_eq!(params.release_time(), 2.0);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad = [
            EnvelopeParams {
                sustain: 120.0,
                ..EnvelopeParams::default()
            },
            EnvelopeParams {
                volume: -1.0,
                ..EnvelopeParams::default()
            },
            EnvelopeParams {
                threshold: 0.0,
                ..EnvelopeParams::default()
            },
            EnvelopeParams {
                release: -0.5,
                ..EnvelopeParams::default()
            },
            EnvelopeParams {
                overdrive: -3.0,
                ..EnvelopeParams::default()
            },
            EnvelopeParams {
                attack: f32::NAN,
                ..EnvelopeParams::default()
            },
            EnvelopeParams {
                pitch: 127,
                ..EnvelopeParams::default()
            },
            EnvelopeParams {
                pitch: -2,
                ..EnvelopeParams::default()
            },
        ];
        for params in bad {
            assert!(
                matches!(
                    params.validate(),
                    Err(SynthError::InvalidParameter { .. })
                ),
                "{params:?} passed validation"
            );
        }
    }

    #[test]
    fn pitch_range_ends_are_valid() {
        for pitch in [*PITCH_RANGE.start(), *PITCH_RANGE.end()] {
            EnvelopeParams {
                pitch,
                ..EnvelopeParams::default()
            }
            .validate()
            .unwrap();
        }
    }

    #[test]
    fn rejects_bend_outside_unit_range() {
        let params = EnvelopeParams {
            bend: 1.5,
            ..EnvelopeParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SynthError::UnsupportedPitchBend(_))
        ));
    }

    #[test]
    fn parses_from_toml_with_defaults() {
        let params: EnvelopeParams = toml::from_str("waveform = \"noise\"\nrelease = 0.5").unwrap();
        assert_eq!(params.waveform, SourceWaveform::Noise);
        assert_eq!(params.release, 0.5);
        assert_eq!(params.sustain, 50.0);
    }
}
