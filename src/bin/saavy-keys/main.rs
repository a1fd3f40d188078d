//! saavy-keys - play the synth from the computer keyboard or a MIDI controller
//!
//! Run with: cargo run --bin saavy-keys -- --config keys.toml

mod app;
mod audio;
mod midi;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::Parser;
use color_eyre::eyre::{Result as EyreResult, WrapErr};
use tracing_subscriber::EnvFilter;

use saavy_keys::SynthConfig;

#[derive(Parser)]
#[command(name = "saavy-keys")]
#[command(author, version, about = "Terminal keyboard synthesizer", long_about = None)]
struct Cli {
    /// TOML configuration file (missing file means defaults)
    #[arg(short, long, default_value = "saavy-keys.toml")]
    config: PathBuf,

    /// Connect to the first MIDI ports whose name contains this text
    #[arg(short, long)]
    midi_port: Option<String>,

    /// List MIDI ports and exit
    #[arg(long)]
    list_midi: bool,

    /// Log file (the terminal belongs to the UI)
    #[arg(long, default_value = "saavy-keys.log")]
    log: PathBuf,
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    if cli.list_midi {
        return midi::print_ports();
    }

    init_logging(&cli.log)?;
    let config = SynthConfig::load(&cli.config)
        .wrap_err_with(|| format!("failed to load {}", cli.config.display()))?;

    app::run(config, cli.midi_port.as_deref())
}

fn init_logging(path: &Path) -> EyreResult<()> {
    let file = std::fs::File::create(path)
        .wrap_err_with(|| format!("failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
