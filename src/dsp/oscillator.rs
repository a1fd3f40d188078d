use std::f32::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

/*
Phase Accumulator
=================

Every periodic waveform is a function of a phase that runs from 0.0 to 1.0
once per cycle:

    phase += frequency / sample_rate      (wrap at 1.0)

  Sine:      sin(2π · phase)
  Square:    +1 for the first half of the cycle, -1 for the second
  Triangle:  rises -1 → +1 over the first half, falls back over the second
  Sawtooth:  ramps -1 → +1 across the whole cycle

Frequency is read every sample, so a frequency that changes mid-block (pitch
bend automation) bends the pitch smoothly without a phase jump.

The shapes are naive (not band-limited). At keyboard pitches the aliasing is
mostly masked by the envelope and shaping stages.
*/

/// Periodic oscillator shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

/// Phase state for one periodic oscillator.
#[derive(Debug, Clone, Default)]
pub struct PhaseOscillator {
    phase: f32,
}

impl PhaseOscillator {
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }

    /// Produce one sample and advance the phase.
    #[inline]
    pub fn next_sample(&mut self, waveform: Waveform, frequency: f32, sample_rate: f32) -> f32 {
        let p = self.phase;
        let sample = match waveform {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if p < 0.5 {
                    4.0 * p - 1.0
                } else {
                    3.0 - 4.0 * p
                }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
        };

        self.phase += frequency / sample_rate;
        self.phase -= self.phase.floor();

        sample
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Fill a buffer with uniform white noise in `[-1.0, 1.0)`.
pub fn fill_noise<R: Rng + ?Sized>(buffer: &mut [f32], rng: &mut R) {
    for sample in buffer.iter_mut() {
        *sample = rng.gen::<f32>() * 2.0 - 1.0;
    }
}
