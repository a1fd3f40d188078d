//! Waveshaper transfer curves.
//!
//! A waveshaper maps every input sample through a fixed transfer function
//! stored as a lookup table covering inputs from -1.0 to +1.0:
//!
//!   output = curve[(x + 1) / 2 · (N - 1)]     (linear interpolation)
//!
//! Inputs outside -1..1 clamp to the table ends.
//!
//! # Curves
//!
//! Distortion (ratio-based saturation), amount k:
//!   f(x) = ((3 + k) · x · 20°) / (π + k · |x|)
//!   - k = 0 is a quiet linear stage, so zero amount is bypassed instead
//!   - larger k flattens the curve toward a hard knee
//!
//! Overdrive (tanh soft clip), drive k:
//!   f(x) = tanh(k · x)
//!   - smooth, symmetric, never exceeds ±1
//!   - k around 3 gives warm saturation, 10+ approaches a square wave

use std::f32::consts::PI;

/// Points per generated curve.
pub const CURVE_SAMPLES: usize = 44_100;

fn build_curve(f: impl Fn(f32) -> f32) -> Vec<f32> {
    (0..CURVE_SAMPLES)
        .map(|i| {
            let x = (i as f32 * 2.0) / CURVE_SAMPLES as f32 - 1.0;
            f(x)
        })
        .collect()
}

/// Ratio-based soft saturation curve for a distortion amount.
pub fn distortion_curve(amount: f32) -> Vec<f32> {
    let deg = PI / 180.0;
    build_curve(|x| ((3.0 + amount) * x * 20.0 * deg) / (PI + amount * x.abs()))
}

/// Hyperbolic-tangent soft clip curve for an overdrive amount.
pub fn overdrive_curve(drive: f32) -> Vec<f32> {
    build_curve(|x| (drive * x).tanh())
}

/// Map one sample through a transfer curve.
#[inline]
pub fn shape(curve: &[f32], sample: f32) -> f32 {
    match curve.len() {
        0 => sample,
        1 => curve[0],
        len => {
            let last = (len - 1) as f32;
            let pos = ((sample.clamp(-1.0, 1.0) + 1.0) * 0.5) * last;
            let i = pos.floor() as usize;
            if i >= len - 1 {
                return curve[len - 1];
            }
            let frac = pos - i as f32;
            curve[i] + (curve[i + 1] - curve[i]) * frac
        }
    }
}

/// Apply a transfer curve to a buffer in place.
pub fn shape_buffer(buffer: &mut [f32], curve: &[f32]) {
    for sample in buffer.iter_mut() {
        *sample = shape(curve, *sample);
    }
}
