//! Terminal keyboard view
//!
//! Three rows of twelve keys, one octave each, lit while the synth holds the
//! note. Key releases come from the terminal's keyboard enhancement when it
//! has one; otherwise a key counts as held until its auto-repeat stops.

use std::collections::{BTreeSet, HashMap};
use std::io::stdout;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::supports_keyboard_enhancement;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    DefaultTerminal, Frame,
};
use rtrb::{Consumer, Producer};
use tracing::{debug, warn};

use saavy_keys::io::{normalize, InputEvent, MidiEcho, NoteAction};
use saavy_keys::notes::{note_for_key, KEY_BINDINGS};
use saavy_keys::synth::SynthMessage;
use saavy_keys::{NoteId, SynthConfig};

use super::app::Activity;
use super::midi::MidiPorts;

/// Samples kept for the level meter
const VIS_BUFFER_SIZE: usize = 1024;

/// Without release events, a key is let go this long after its last repeat.
/// Longer than the usual auto-repeat delay so a held key never stutters.
const HOLD_TIMEOUT: Duration = Duration::from_millis(600);

const KEYS_PER_ROW: usize = 12;

/// Queue ends the UI thread owns.
pub struct UiChannels {
    pub keys_tx: Producer<SynthMessage>,
    pub lights_rx: Consumer<(NoteId, bool)>,
    pub echo_rx: Consumer<MidiEcho>,
    pub meter_rx: Consumer<f32>,
}

pub struct KeyboardApp {
    channels: UiChannels,
    activity: Arc<Activity>,
    midi: MidiPorts,
    config: SynthConfig,
    sample_rate: u32,
    /// Bound keys currently down, with when they were last seen
    held: HashMap<&'static str, Instant>,
    /// Notes the synth reports as sounding
    lit: BTreeSet<NoteId>,
    meter: Vec<f32>,
    release_events: bool,
    should_quit: bool,
}

impl KeyboardApp {
    pub fn new(
        channels: UiChannels,
        activity: Arc<Activity>,
        midi: MidiPorts,
        config: SynthConfig,
        sample_rate: u32,
    ) -> Self {
        Self {
            channels,
            activity,
            midi,
            config,
            sample_rate,
            held: HashMap::new(),
            lit: BTreeSet::new(),
            meter: Vec::with_capacity(VIS_BUFFER_SIZE),
            release_events: false,
            should_quit: false,
        }
    }

    /// Run the UI event loop
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        self.release_events = matches!(supports_keyboard_enhancement(), Ok(true));
        if self.release_events {
            execute!(
                stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        debug!(release_events = self.release_events, "keyboard input ready");

        let result = self.event_loop(terminal);

        if self.release_events {
            let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
        }
        self.held.clear();
        self.send(SynthMessage::AllNotesOff);
        result
    }

    fn event_loop(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_feedback();
            if !self.release_events {
                self.expire_held(Instant::now());
            }

            terminal.draw(|frame| self.render(frame))?;

            // ~60fps
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    /// Drain what the audio thread reported since the last frame
    fn poll_feedback(&mut self) {
        while let Ok((note, active)) = self.channels.lights_rx.pop() {
            if active {
                self.lit.insert(note);
            } else {
                self.lit.remove(&note);
            }
        }

        while let Ok(echo) = self.channels.echo_rx.pop() {
            self.midi.send_echo(echo);
        }

        while let Ok(sample) = self.channels.meter_rx.pop() {
            self.meter.push(sample);
        }
        if self.meter.len() > VIS_BUFFER_SIZE {
            let excess = self.meter.len() - VIS_BUFFER_SIZE;
            self.meter.drain(0..excess);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Press {
            match key.code {
                KeyCode::Esc => {
                    self.should_quit = true;
                    return;
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.should_quit = true;
                    return;
                }
                KeyCode::Char(' ') => {
                    self.held.clear();
                    self.sync_activity();
                    self.send(SynthMessage::AllNotesOff);
                    return;
                }
                _ => {}
            }
        }

        let Some(code) = physical_code(key.code) else {
            return;
        };
        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                if self.held.insert(code, Instant::now()).is_none() {
                    self.key_input(code, NoteAction::Press);
                }
            }
            KeyEventKind::Release => {
                if self.held.remove(code).is_some() {
                    self.key_input(code, NoteAction::Release);
                }
            }
        }
    }

    /// Release keys whose auto-repeat has stopped
    fn expire_held(&mut self, now: Instant) {
        let expired: Vec<&'static str> = self
            .held
            .iter()
            .filter(|&(_, &seen)| now.duration_since(seen) > HOLD_TIMEOUT)
            .map(|(&code, _)| code)
            .collect();
        for code in expired {
            self.held.remove(code);
            self.key_input(code, NoteAction::Release);
        }
    }

    fn sync_activity(&self) {
        self.activity
            .keys_held
            .store(!self.held.is_empty(), Ordering::Relaxed);
    }

    /// Callers update `held` first. Activity is stored before the push, which
    /// publishes it, so the reconciler never sees a fresh press alongside an
    /// idle keyboard.
    fn key_input(&mut self, code: &'static str, action: NoteAction) {
        self.sync_activity();
        match normalize(InputEvent::Key { code, action }, &self.config.midi) {
            Ok(Some(control)) => self.send(control.into()),
            Ok(None) => {}
            Err(err) => warn!(code, %err, "key dropped"),
        }
    }

    fn send(&mut self, message: SynthMessage) {
        if self.channels.keys_tx.push(message).is_err() {
            warn!(?message, "synth queue full");
        }
    }

    /// Render the UI
    fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Status bar
                Constraint::Length(5), // Keyboard
                Constraint::Length(3), // Held notes
                Constraint::Min(0),
                Constraint::Length(1), // Help bar
            ])
            .split(frame.area());

        self.render_status(frame, chunks[0]);
        self.render_keyboard(frame, chunks[1]);
        self.render_held(frame, chunks[2]);

        let help = Paragraph::new(" [Esc] Quit  [Space] All notes off  [A-=] Play")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[4]);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().title(" saavy-keys ").borders(Borders::ALL);
        let (peak, rms) = levels(&self.meter);

        let line = Line::from(vec![
            Span::styled(
                format!(" {:.1}kHz  ", self.sample_rate as f32 / 1000.0),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                format!("Generators: {}  ", self.config.generators.len()),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(
                format!("MIDI {}  ", self.midi.status()),
                Style::default().fg(Color::White),
            ),
            Span::styled(
                format!("Peak: {peak:.2}  RMS: {rms:.2}"),
                Style::default().fg(Color::Magenta),
            ),
        ]);

        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    fn render_keyboard(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().title(" Keyboard ").borders(Borders::ALL);

        // Highest octave on top, like the physical rows
        let lines: Vec<Line> = KEY_BINDINGS
            .chunks(KEYS_PER_ROW)
            .rev()
            .map(|row| Line::from(row.iter().map(|&code| self.key_span(code)).collect::<Vec<_>>()))
            .collect();

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn key_span(&self, code: &'static str) -> Span<'static> {
        let Some(note) = note_for_key(code) else {
            return Span::raw("      ");
        };
        let accidental = note.pitch().as_str().len() > 1;

        let style = if self.lit.contains(&note) {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD)
        } else if accidental {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White)
        };

        Span::styled(format!("{}:{:<4}", key_label(code), note.to_string()), style)
    }

    fn render_held(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().title(" Sounding ").borders(Borders::ALL);
        let names: Vec<String> = self.lit.iter().map(NoteId::to_string).collect();
        let text = if names.is_empty() {
            " -".to_string()
        } else {
            format!(" {}", names.join(" "))
        };
        frame.render_widget(Paragraph::new(text).block(block), area);
    }
}

fn levels(buffer: &[f32]) -> (f32, f32) {
    if buffer.is_empty() {
        return (0.0, 0.0);
    }
    let peak = buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
    (peak, rms)
}

/// Terminal key to the physical key code the binding table uses.
///
/// Terminals report characters, not scan codes, so this assumes a US layout.
fn physical_code(code: KeyCode) -> Option<&'static str> {
    let KeyCode::Char(c) = code else {
        return None;
    };
    let code = match c.to_ascii_lowercase() {
        'a' => "KeyA",
        's' => "KeyS",
        'd' => "KeyD",
        'f' => "KeyF",
        'g' => "KeyG",
        'h' => "KeyH",
        'j' => "KeyJ",
        'k' => "KeyK",
        'l' => "KeyL",
        ';' | ':' => "Semicolon",
        '\'' | '"' => "Quote",
        '\\' | '|' => "Backslash",
        'q' => "KeyQ",
        'w' => "KeyW",
        'e' => "KeyE",
        'r' => "KeyR",
        't' => "KeyT",
        'y' => "KeyY",
        'u' => "KeyU",
        'i' => "KeyI",
        'o' => "KeyO",
        'p' => "KeyP",
        '[' | '{' => "BracketLeft",
        ']' | '}' => "BracketRight",
        '1' | '!' => "Digit1",
        '2' | '@' => "Digit2",
        '3' | '#' => "Digit3",
        '4' | '$' => "Digit4",
        '5' | '%' => "Digit5",
        '6' | '^' => "Digit6",
        '7' | '&' => "Digit7",
        '8' | '*' => "Digit8",
        '9' | '(' => "Digit9",
        '0' | ')' => "Digit0",
        '-' | '_' => "Minus",
        '=' | '+' => "Equal",
        _ => return None,
    };
    Some(code)
}

fn key_label(code: &str) -> &str {
    match code {
        "Semicolon" => ";",
        "Quote" => "'",
        "Backslash" => "\\",
        "BracketLeft" => "[",
        "BracketRight" => "]",
        "Minus" => "-",
        "Equal" => "=",
        other => other
            .strip_prefix("Key")
            .or_else(|| other.strip_prefix("Digit"))
            .unwrap_or(other),
    }
}
