//! Application context: the one running synth, constructed explicitly.
//!
//! Hosts create an [`AppContext`] once at startup, feed it input, tick it on
//! a timer and shut it down when done. Nothing about it is global.

use std::time::Instant;

use tracing::{info, warn};

use crate::config::SynthConfig;
use crate::error::{Result, SynthError};
use crate::graph::AudioGraph;
use crate::io::{normalize, InputEvent, MidiRouting};
use crate::synth::hooks::ActivityProbe;
use crate::synth::{DeadNoteReconciler, NoteDispatcher};

pub use crate::synth::hooks::Collaborators;

pub struct AppContext<G: AudioGraph> {
    dispatcher: NoteDispatcher<G>,
    reconciler: DeadNoteReconciler,
    routing: MidiRouting,
}

impl<G: AudioGraph> AppContext<G> {
    /// Open the audio graph and build the synth.
    ///
    /// When the graph cannot be opened the notice collaborator is shown one
    /// message and nothing else starts.
    pub fn init<F>(config: &SynthConfig, open_graph: F, collaborators: Collaborators) -> Result<Self>
    where
        F: FnOnce() -> Result<G>,
    {
        let Collaborators {
            indicator,
            midi_out,
            capture,
            mut notice,
        } = collaborators;

        config.validate()?;

        let graph = match open_graph() {
            Ok(graph) => graph,
            Err(err) => {
                let message = match err {
                    SynthError::AudioUnavailable(message) => message,
                    other => other.to_string(),
                };
                notice.show(&format!("Audio is not available: {message}"));
                return Err(SynthError::AudioUnavailable(message));
            }
        };

        let dispatcher =
            NoteDispatcher::new(graph, &config.generators, indicator, midi_out, capture)?;
        info!(
            generators = config.generators.len(),
            input_channel = config.midi.input_channel,
            "synth initialized"
        );

        Ok(Self {
            dispatcher,
            reconciler: DeadNoteReconciler::new(config.reconcile_interval()),
            routing: config.midi,
        })
    }

    /// Normalize and dispatch one raw input event.
    ///
    /// Bad input is logged and dropped.
    pub fn handle_input(&mut self, event: InputEvent<'_>) {
        match normalize(event, &self.routing) {
            Ok(Some(control)) => self.dispatcher.dispatch(control),
            Ok(None) => {}
            Err(err) => warn!(?event, %err, "dropped input event"),
        }
    }

    pub fn handle_midi(&mut self, bytes: &[u8]) {
        self.handle_input(InputEvent::Midi(bytes));
    }

    /// Free finished voices and run the dead-note sweep when due.
    pub fn tick<P: ActivityProbe + ?Sized>(&mut self, now: Instant, probe: &P) -> usize {
        self.dispatcher.service();
        self.reconciler.tick(now, &mut self.dispatcher, probe)
    }

    /// Free every voice immediately.
    pub fn shutdown(&mut self) {
        self.dispatcher.shutdown();
        info!("synth shut down");
    }

    pub fn routing(&self) -> &MidiRouting {
        &self.routing
    }

    pub fn set_routing(&mut self, routing: MidiRouting) {
        self.routing = routing;
    }

    pub fn dispatcher(&self) -> &NoteDispatcher<G> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut NoteDispatcher<G> {
        &mut self.dispatcher
    }
}
