use crate::error::SynthError;
use crate::notes::name::NoteId;

/*
Frequency Resolution
====================

    distance = semitone + (octave - 4) * 12 - 9      (semitones from A4)
    base     = round2(440 * 2^(distance / 12))
    hz       = base * 2^(pitch + 1) * (0.5 + bend)

The base frequency is rounded to two decimals before anything else, so a
note's pitch is identical no matter which input device produced it.

Transposition doubles once for every step from 0 through `pitch` inclusive.
A pitch control at 0 therefore still lands one octave up, and -1 is the only
setting that leaves the base frequency alone. Settings below -1 double zero
times as well.

Bend is a continuous factor around its center: 0.5 is neutral, 0.0 halves
the frequency and 1.0 raises it by half. Values outside 0.0..=1.0 are
rejected rather than clamped.
*/

/// Neutral pitch-bend position.
pub const CENTER_BEND: f32 = 0.5;

/// Resolve a note to Hz with octave transposition and pitch bend applied.
pub fn resolve_frequency(note: NoteId, pitch: i8, bend: f32) -> Result<f64, SynthError> {
    Ok(base_frequency(note) * transposition_factor(pitch) * bend_factor(bend)?)
}

/// Parse a note name and resolve it.
pub fn resolve_frequency_str(name: &str, pitch: i8, bend: f32) -> Result<f64, SynthError> {
    resolve_frequency(name.parse()?, pitch, bend)
}

/// Untransposed, unbent frequency rounded to two decimals.
pub fn base_frequency(note: NoteId) -> f64 {
    let distance = note.semitones_from_a4() as f64;
    let freq = 440.0 * 2.0_f64.powf(distance / 12.0);
    (freq * 100.0).round() / 100.0
}

/// `2^(pitch + 1)`, with anything at or below -1 leaving the frequency unchanged.
pub fn transposition_factor(pitch: i8) -> f64 {
    let doublings = (pitch as i32 + 1).max(0);
    2.0_f64.powi(doublings)
}

/// Multiplier for a bend position, `0.5 + bend`.
pub fn bend_factor(bend: f32) -> Result<f64, SynthError> {
    if !(0.0..=1.0).contains(&bend) {
        return Err(SynthError::UnsupportedPitchBend(bend));
    }
    Ok(0.5 + bend as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::name::PitchClass;

    fn note(name: &str) -> NoteId {
        name.parse().unwrap()
    }

    #[test]
    fn a4_doubles_once_at_pitch_zero() {
        let hz = resolve_frequency(note("a4"), 0, CENTER_BEND).unwrap();
        assert_eq!(hz, 880.0);
    }

    #[test]
    fn pitch_minus_one_is_untransposed() {
        let hz = resolve_frequency(note("a4"), -1, CENTER_BEND).unwrap();
        assert_eq!(hz, 440.0);
    }

    #[test]
    fn pitch_below_minus_one_does_not_divide() {
        assert_eq!(transposition_factor(-5), 1.0);
        assert_eq!(transposition_factor(3), 16.0);
    }

    #[test]
    fn base_frequency_is_rounded_to_cents_of_a_hertz() {
        // C4 = 261.6255... Hz
        assert_eq!(base_frequency(NoteId::new(PitchClass::C, 4)), 261.63);
        assert_eq!(base_frequency(NoteId::new(PitchClass::A, 3)), 220.0);
    }

    #[test]
    fn bend_scales_around_center() {
        let low = resolve_frequency(note("a4"), -1, 0.0).unwrap();
        let high = resolve_frequency(note("a4"), -1, 1.0).unwrap();
        assert_eq!(low, 220.0);
        assert_eq!(high, 660.0);
    }

    #[test]
    fn bend_out_of_range_is_rejected() {
        assert!(matches!(
            resolve_frequency(note("a4"), 0, 1.5),
            Err(SynthError::UnsupportedPitchBend(_))
        ));
        assert!(matches!(
            bend_factor(-0.01),
            Err(SynthError::UnsupportedPitchBend(_))
        ));
        assert!(bend_factor(f32::NAN).is_err());
    }

    #[test]
    fn invalid_name_is_rejected() {
        assert!(matches!(
            resolve_frequency_str("h4", 0, CENTER_BEND),
            Err(SynthError::InvalidNoteName(_))
        ));
    }
}
