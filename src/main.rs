//! Application entry point — voice-emote.
//!
//! # Startup sequence
//!
//! 1. Parse CLI arguments and initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Connect the keyboard-emulator (or substitute [`NullPlayer`] for
//!    `--dry-run`).
//! 4. Build the tokio runtime and hand control to [`App::run`].
//!
//! The process exits 0 on a clean ctrl-c and 1 when startup fails; device
//! errors print the discovered port list so the user can pass `--port`.

use std::sync::{Arc, Mutex};

use clap::Parser;

use voice_emote::{
    app::App,
    audio::AudioSource,
    config::AppConfig,
    device::{discovery, DeviceLink},
    emote::{EmoteDriver, EmotePlayer, NullPlayer},
    stt::StubTranscriber,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Voice-controlled game emotes over a BLE keyboard-emulator.
#[derive(Debug, Parser)]
#[command(name = "voice-emote", version, about)]
struct Cli {
    /// Log emotes instead of sending them to hardware.
    #[arg(long)]
    dry_run: bool,

    /// Serial port of the keyboard-emulator (skips auto-discovery).
    #[arg(long)]
    port: Option<String>,

    /// Baud rate of the serial connection.
    #[arg(long)]
    baud: Option<u32>,

    /// Path to an alternative settings.toml.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// List available serial ports and exit.
    #[arg(long)]
    list_ports: bool,

    /// List available audio input devices and exit.
    #[arg(long)]
    list_devices: bool,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(cli) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.list_ports {
        return list_ports();
    }
    if cli.list_devices {
        return list_devices();
    }

    log::info!("voice-emote starting up");

    // Config problems never abort: malformed or unreadable files warn and
    // fall back to the built-in defaults.
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if let Some(port) = cli.port {
        config.device.port = Some(port);
    }
    if let Some(baud) = cli.baud {
        config.device.baud = baud;
    }

    // Device connection (skipped entirely for --dry-run).
    let (player, link): (Box<dyn EmotePlayer>, Option<Arc<Mutex<DeviceLink>>>) = if cli.dry_run {
        log::info!("dry run: emotes will be logged, not sent");
        (Box::new(NullPlayer), None)
    } else {
        let link = DeviceLink::connect(config.device.port.as_deref(), config.device.baud)
            .map_err(|e| {
                anyhow::anyhow!(
                    "{e}\n\nIs the keyboard-emulator plugged in? \
                     Run with --list-ports to inspect, or --port to override."
                )
            })?;
        let link = Arc::new(Mutex::new(link));
        let driver = EmoteDriver::shared(Arc::clone(&link));
        (Box::new(driver), Some(link))
    };

    // No recognition backend is bundled; VAD-driven emotes work, but the
    // toggle word and keyword triggers need a real Transcriber.  Start
    // active, since the spoken toggle can never be heard.
    log::warn!(
        "no speech-to-text backend configured; keyword triggers and the \
         toggle word will not fire"
    );
    let app = App::new(&config, player, link, Box::new(StubTranscriber))?;
    app.set_active(true);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    rt.block_on(app.run())
}

// ---------------------------------------------------------------------------
// Listing helpers
// ---------------------------------------------------------------------------

fn list_ports() -> anyhow::Result<()> {
    let ports = discovery::list_ports()?;
    if ports.is_empty() {
        println!("no serial ports found");
        return Ok(());
    }
    for port in &ports {
        let known = discovery::find_known_port(std::slice::from_ref(port)).is_some();
        let marker = if known { "  <- keyboard-emulator?" } else { "" };
        println!("{port}{marker}");
    }
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    let devices = AudioSource::list_devices()?;
    if devices.is_empty() {
        println!("no audio input devices found");
        return Ok(());
    }
    for device in devices {
        println!("[{}] {}", device.index, device.name);
    }
    Ok(())
}
