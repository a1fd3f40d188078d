use std::f32::consts::TAU;

/*
Band-Pass Filter
================

Topology-preserving state-variable filter (two trapezoidal integrators). The
same structure yields low, band and high outputs at once; only the band
output is used here, to narrow a noise source around a note's pitch.

    g = tan(π · fc / fs)          (prewarped integrator gain)
    k = 1 / Q                     (damping)

Q = 1 matches the default band-pass of a browser audio context: wide enough
that noise still sounds like noise, narrow enough to carry pitch.
*/

/// State-variable filter producing its band-pass output.
#[derive(Debug, Clone)]
pub struct BandPass {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory
    q: f32,
}

impl BandPass {
    pub fn new(q: f32) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            q: q.max(0.01),
        }
    }

    #[inline]
    fn compute_g(cutoff_hz: f32, sample_rate: f32) -> f32 {
        // Keep the cutoff below Nyquist so tan() stays finite
        let fc = cutoff_hz.clamp(1.0, sample_rate * 0.49);
        (TAU * fc / (2.0 * sample_rate)).tan()
    }

    #[inline]
    fn next_sample(&mut self, sample: f32, k: f32, g: f32) -> f32 {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        v1
    }

    /// Filter a block in place at a fixed cutoff.
    pub fn render(&mut self, buffer: &mut [f32], cutoff_hz: f32, sample_rate: f32) {
        let g = Self::compute_g(cutoff_hz, sample_rate);
        let k = 1.0 / self.q;

        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample, k, g);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}
