//! MIDI ports: controller input feeding the synth and an optional echo output

use std::fmt::Display;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use rtrb::Producer;
use tracing::{info, warn};

use saavy_keys::io::{midi_to_control, MidiEcho, MidiEvent, MidiNoteTracker, MidiRouting};
use saavy_keys::synth::SynthMessage;
use saavy_keys::SynthError;

use super::app::Activity;

const CLIENT_NAME: &str = "saavy-keys";

pub struct MidiPorts {
    input: Option<(String, MidiInputConnection<()>)>,
    output: Option<(String, MidiOutputConnection)>,
    routing: MidiRouting,
    disabled_reason: Option<String>,
}

impl MidiPorts {
    /// Connect the first input port matching `filter` (any port when `None`).
    ///
    /// The output port is only opened when the routing names an output
    /// channel; failing to find one leaves echo off but keeps the input.
    pub fn open(
        filter: Option<&str>,
        routing: MidiRouting,
        mut synth_tx: Producer<SynthMessage>,
        activity: Arc<Activity>,
    ) -> Result<Self, SynthError> {
        let mut midi_in = MidiInput::new(CLIENT_NAME).map_err(unavailable)?;
        midi_in.ignore(Ignore::Sysex | Ignore::Time | Ignore::ActiveSense);

        let ports = midi_in.ports();
        let (port, name) = ports
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok().map(|name| (p, name)))
            .find(|(_, name)| filter.map_or(true, |f| name.contains(f)))
            .ok_or_else(|| SynthError::MidiUnavailable(no_port("input", filter)))?;
        let port = port.clone();

        let mut tracker = MidiNoteTracker::new();
        let connection = midi_in
            .connect(
                &port,
                "saavy-keys-in",
                move |_timestamp_us, bytes, _| {
                    let Some(event) = MidiEvent::parse(bytes) else {
                        return;
                    };
                    if event.channel() != routing.input_channel {
                        return;
                    }
                    tracker.observe(&event);
                    activity
                        .midi_notes
                        .store(tracker.active_count(), Ordering::Relaxed);

                    if let Some(control) = midi_to_control(event, &routing) {
                        if synth_tx.push(control.into()).is_err() {
                            warn!(?event, "synth queue full, MIDI event dropped");
                        }
                    }
                },
                (),
            )
            .map_err(unavailable)?;
        info!(port = %name, channel = routing.input_channel, "MIDI input connected");

        let output = match routing.output_channel {
            Some(_) => match open_output(filter) {
                Ok(output) => Some(output),
                Err(err) => {
                    warn!(%err, "MIDI echo disabled");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            input: Some((name, connection)),
            output,
            routing,
            disabled_reason: None,
        })
    }

    pub fn disabled(reason: String) -> Self {
        Self {
            input: None,
            output: None,
            routing: MidiRouting::default(),
            disabled_reason: Some(reason),
        }
    }

    pub fn send_echo(&mut self, echo: MidiEcho) {
        let Some((port, connection)) = self.output.as_mut() else {
            return;
        };
        let Some(bytes) = echo.to_bytes(&self.routing) else {
            return;
        };
        if let Err(err) = connection.send(&bytes) {
            warn!(%port, %err, "MIDI echo failed");
        }
    }

    pub fn status(&self) -> String {
        if let Some(reason) = &self.disabled_reason {
            return format!("off ({reason})");
        }
        let input = self.input.as_ref().map_or("-", |(name, _)| name.as_str());
        let output = self.output.as_ref().map_or("-", |(name, _)| name.as_str());
        format!("in: {input}  out: {output}")
    }
}

fn open_output(filter: Option<&str>) -> Result<(String, MidiOutputConnection), SynthError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(unavailable)?;
    let ports = midi_out.ports();
    let (port, name) = ports
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok().map(|name| (p, name)))
        .find(|(_, name)| filter.map_or(true, |f| name.contains(f)))
        .ok_or_else(|| SynthError::MidiUnavailable(no_port("output", filter)))?;
    let port = port.clone();

    let connection = midi_out
        .connect(&port, "saavy-keys-out")
        .map_err(unavailable)?;
    info!(port = %name, "MIDI output connected");
    Ok((name, connection))
}

fn no_port(direction: &str, filter: Option<&str>) -> String {
    match filter {
        Some(f) => format!("no MIDI {direction} port matching '{f}'"),
        None => format!("no MIDI {direction} ports"),
    }
}

fn unavailable(err: impl Display) -> SynthError {
    SynthError::MidiUnavailable(err.to_string())
}

/// `--list-midi`
pub fn print_ports() -> EyreResult<()> {
    let midi_in = MidiInput::new(CLIENT_NAME).wrap_err("failed to open MIDI input")?;
    println!("MIDI inputs:");
    for (i, port) in midi_in.ports().iter().enumerate() {
        let name = midi_in.port_name(port).unwrap_or_else(|_| "<unnamed>".into());
        println!("  {i}: {name}");
    }

    let midi_out = MidiOutput::new(CLIENT_NAME).wrap_err("failed to open MIDI output")?;
    println!("MIDI outputs:");
    for (i, port) in midi_out.ports().iter().enumerate() {
        let name = midi_out.port_name(port).unwrap_or_else(|_| "<unnamed>".into());
        println!("  {i}: {name}");
    }
    Ok(())
}
