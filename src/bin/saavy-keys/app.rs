//! Wiring: audio stream, MIDI ports and the terminal UI around one synth

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use color_eyre::eyre::Result as EyreResult;
use rtrb::{Producer, RingBuffer};
use tracing::{error, info, warn};

use saavy_keys::io::MidiEcho;
use saavy_keys::synth::{ActivityProbe, MidiOutput, NoteIndicator, Notice, Silent, SynthMessage};
use saavy_keys::{Collaborators, NoteId, SynthConfig};

use super::audio::AudioOutput;
use super::midi::MidiPorts;
use super::ui::{KeyboardApp, UiChannels};

/// Synth commands queued per producer (keyboard, MIDI input)
const MESSAGE_QUEUE_SIZE: usize = 256;
/// Key-light and echo updates queued for the UI thread
const FEEDBACK_QUEUE_SIZE: usize = 512;
/// Samples buffered for the level meter
const METER_QUEUE_SIZE: usize = 4096;

/// Held-input readings shared between the UI, MIDI and audio threads.
#[derive(Debug, Default)]
pub struct Activity {
    pub midi_notes: AtomicUsize,
    pub keys_held: AtomicBool,
}

impl ActivityProbe for Activity {
    fn midi_active_notes(&self) -> usize {
        self.midi_notes.load(Ordering::Relaxed)
    }

    fn any_button_active(&self) -> bool {
        self.keys_held.load(Ordering::Relaxed)
    }
}

/// Key highlighting forwarded to the UI.
struct KeyLights(Producer<(NoteId, bool)>);

impl KeyLights {
    fn push(&mut self, note: NoteId, active: bool) {
        if self.0.push((note, active)).is_err() {
            warn!(%note, active, "key light queue full");
        }
    }
}

impl NoteIndicator for KeyLights {
    fn set_active(&mut self, note: NoteId) {
        self.push(note, true);
    }

    fn clear_active(&mut self, note: NoteId) {
        self.push(note, false);
    }
}

/// Echoes forwarded to whichever thread owns the MIDI output port.
struct EchoQueue(Producer<MidiEcho>);

impl MidiOutput for EchoQueue {
    fn send(&mut self, echo: MidiEcho) {
        if self.0.push(echo).is_err() {
            warn!(note = %echo.note, "MIDI echo queue full");
        }
    }
}

/// Start-up failures go to stderr; the UI is not up yet.
struct StderrNotice;

impl Notice for StderrNotice {
    fn show(&mut self, message: &str) {
        error!("{message}");
        eprintln!("{message}");
    }
}

pub fn run(config: SynthConfig, midi_port: Option<&str>) -> EyreResult<()> {
    let activity = Arc::new(Activity::default());

    let (keys_tx, keys_rx) = RingBuffer::<SynthMessage>::new(MESSAGE_QUEUE_SIZE);
    let (midi_tx, midi_rx) = RingBuffer::<SynthMessage>::new(MESSAGE_QUEUE_SIZE);
    let (lights_tx, lights_rx) = RingBuffer::<(NoteId, bool)>::new(FEEDBACK_QUEUE_SIZE);
    let (echo_tx, echo_rx) = RingBuffer::<MidiEcho>::new(FEEDBACK_QUEUE_SIZE);
    let (meter_tx, meter_rx) = RingBuffer::<f32>::new(METER_QUEUE_SIZE);

    // MIDI is optional: failures are reported and the session runs without it
    let midi = match MidiPorts::open(midi_port, config.midi, midi_tx, activity.clone()) {
        Ok(ports) => ports,
        Err(err) => {
            warn!(%err, "continuing without MIDI");
            MidiPorts::disabled(err.to_string())
        }
    };

    let collaborators = Collaborators {
        indicator: Box::new(KeyLights(lights_tx)),
        midi_out: Box::new(EchoQueue(echo_tx)),
        capture: Box::new(Silent),
        notice: Box::new(StderrNotice),
    };

    let audio = AudioOutput::start(
        &config,
        collaborators,
        [keys_rx, midi_rx],
        meter_tx,
        activity.clone(),
    )?;
    info!(
        sample_rate = audio.sample_rate(),
        channels = audio.channels(),
        midi = %midi.status(),
        "saavy-keys running"
    );

    let mut app = KeyboardApp::new(
        UiChannels {
            keys_tx,
            lights_rx,
            echo_rx,
            meter_rx,
        },
        activity,
        midi,
        config,
        audio.sample_rate(),
    );

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal);
    ratatui::restore();

    // Stop the stream before the synth it owns is dropped
    drop(audio);
    result
}
