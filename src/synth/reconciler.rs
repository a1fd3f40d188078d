use std::time::{Duration, Instant};

use tracing::info;

use crate::synth::hooks::ActivityProbe;

/// Default sweep cadence.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Query/command pair the reconciler drives.
pub trait HeldNotes {
    fn held_note_count(&self) -> usize;

    /// Release every held note; returns how many were released.
    fn force_release_all(&mut self) -> usize;
}

/*
Dead-Note Reconciliation
========================

Release events get lost: a window loses focus mid-drag, a key-up arrives
while another app has the keyboard, a MIDI cable is pulled. Without a
safety net the note rings forever.

Every `interval`:

    midi notes held == 0  AND  no button active  AND  notes held > 0
        → force-release everything

The sweep never replaces the normal release path; it only bounds how long
a stuck note can survive to one interval.
*/

#[derive(Debug, Clone)]
pub struct DeadNoteReconciler {
    interval: Duration,
    last_sweep: Option<Instant>,
}

impl Default for DeadNoteReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl DeadNoteReconciler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sweep: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a sweep if an interval has passed since the last one.
    ///
    /// Returns the number of notes force-released.
    pub fn tick<H, P>(&mut self, now: Instant, notes: &mut H, probe: &P) -> usize
    where
        H: HeldNotes + ?Sized,
        P: ActivityProbe + ?Sized,
    {
        if let Some(last) = self.last_sweep {
            if now.saturating_duration_since(last) < self.interval {
                return 0;
            }
        }
        self.last_sweep = Some(now);
        Self::sweep(notes, probe)
    }

    /// One unconditional sweep.
    pub fn sweep<H, P>(notes: &mut H, probe: &P) -> usize
    where
        H: HeldNotes + ?Sized,
        P: ActivityProbe + ?Sized,
    {
        if probe.midi_active_notes() > 0 || probe.any_button_active() {
            return 0;
        }
        let held = notes.held_note_count();
        if held == 0 {
            return 0;
        }

        let released = notes.force_release_all();
        info!(released, "released stuck notes");
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::hooks::ActivitySnapshot;

    #[derive(Default)]
    struct Stuck {
        held: usize,
    }

    impl HeldNotes for Stuck {
        fn held_note_count(&self) -> usize {
            self.held
        }

        fn force_release_all(&mut self) -> usize {
            std::mem::take(&mut self.held)
        }
    }

    const IDLE: ActivitySnapshot = ActivitySnapshot {
        midi_active_notes: 0,
        any_button_active: false,
    };

    #[test]
    fn idle_inputs_release_stale_notes() {
        let mut notes = Stuck { held: 2 };
        let mut reconciler = DeadNoteReconciler::default();
        assert_eq!(reconciler.tick(Instant::now(), &mut notes, &IDLE), 2);
        assert_eq!(notes.held, 0);
    }

    #[test]
    fn held_midi_key_keeps_notes() {
        let mut notes = Stuck { held: 1 };
        let probe = ActivitySnapshot {
            midi_active_notes: 1,
            ..IDLE
        };
        assert_eq!(DeadNoteReconciler::sweep(&mut notes, &probe), 0);
        assert_eq!(notes.held, 1);
    }

    #[test]
    fn active_button_keeps_notes() {
        let mut notes = Stuck { held: 1 };
        let probe = ActivitySnapshot {
            any_button_active: true,
            ..IDLE
        };
        assert_eq!(DeadNoteReconciler::sweep(&mut notes, &probe), 0);
    }

    #[test]
    fn sweeps_at_most_once_per_interval() {
        let start = Instant::now();
        let mut notes = Stuck { held: 1 };
        let mut reconciler = DeadNoteReconciler::new(Duration::from_millis(100));

        let busy = ActivitySnapshot {
            any_button_active: true,
            ..IDLE
        };
        assert_eq!(reconciler.tick(start, &mut notes, &busy), 0);

        // Inputs go idle, but the next sweep is not due yet
        assert_eq!(
            reconciler.tick(start + Duration::from_millis(50), &mut notes, &IDLE),
            0
        );
        assert_eq!(notes.held, 1);

        assert_eq!(
            reconciler.tick(start + Duration::from_millis(100), &mut notes, &IDLE),
            1
        );
    }
}
