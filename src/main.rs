use enclave_brain::app::App;
use enclave_brain::catalogue::Installation;
use enclave_brain::config::AppConfig;
use enclave_brain::control::{ChannelInput, ControlInputSource, NoInput};
use enclave_brain::knob_simulator::KnobSimulator;
use enclave_brain::osc_sender;
use enclave_brain::parameter::remap;
#[cfg(feature = "hardware")]
use enclave_brain::serial_link;
use enclave_brain::simulation::ParamName;
use enclave_brain::sink::{
    ChannelFloodSink, ChannelSink, FloodLightSink, LogSink, MessageSink, NullFloodSink,
};
use enclave_brain::types::{ControlInput, ControlMessage, RgbPacket};

use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "enclave-brain")]
#[command(about = "Forest simulation and media cue orchestration for The Enclave")]
struct Cli {
    /// OSC target address (media server)
    #[arg(long, default_value = "127.0.0.1:8010")]
    osc_target: String,

    /// JSON config overriding the built-in tunables
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON scene table (defaults to the built-in table)
    #[arg(long)]
    scenes: Option<PathBuf>,

    /// JSON media catalogue (defaults to the built-in MadMapper catalogue)
    #[arg(long)]
    catalogue: Option<PathBuf>,

    /// Drift the knobs randomly instead of reading the control desk
    #[arg(long)]
    simulate_knobs: bool,

    /// Serial port of the control desk (auto-detected when omitted)
    #[arg(long)]
    port: Option<String>,

    /// Override the update rate (Hz)
    #[arg(long)]
    tick_hz: Option<u32>,

    /// Log control messages instead of sending OSC
    #[arg(long)]
    dry_run: bool,

    /// Seed for every random choice, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
    .unwrap_or_else(|e| exit_with(&e));
    if let Some(hz) = cli.tick_hz {
        config.tick_hz = hz;
    }
    config.validate().unwrap_or_else(|e| exit_with(&e));

    let installation = Installation::load(cli.scenes.as_deref(), cli.catalogue.as_deref())
        .unwrap_or_else(|e| exit_with(&e));

    info!("═══════════════════════════════════════════════");
    info!("  ENCLAVE BRAIN v{}", env!("CARGO_PKG_VERSION"));
    info!("  Tick: {} Hz", config.tick_hz);
    info!(
        "  Output: {}",
        if cli.dry_run { "DRY RUN (log only)".to_string() } else { format!("OSC → {}", cli.osc_target) }
    );
    info!("  Input: {}", if cli.simulate_knobs { "SIMULATED KNOBS" } else { "CONTROL DESK" });
    info!("═══════════════════════════════════════════════");

    // ─── OSC sender ─────────────────────────────────────────────────
    let sink: Box<dyn MessageSink> = if cli.dry_run {
        Box::new(LogSink)
    } else {
        let (tx, rx) = bounded::<ControlMessage>(4096);
        let target = cli.osc_target.clone();
        spawn("osc", move || {
            osc_sender::OscSender::new(rx, target).run();
        });
        Box::new(ChannelSink::new(tx))
    };

    // ─── Input source and flood lights ──────────────────────────────
    let (input, flood_sink): (Box<dyn ControlInputSource>, Box<dyn FloodLightSink>) =
        if cli.simulate_knobs {
            info!("Starting knob simulator...");
            let seed = cli.seed.unwrap_or_else(rand::random);
            let knobs = ParamName::ALL.map(|p| {
                let (lo, hi) = p.range();
                let initial = match p {
                    ParamName::ClimateChange => config.simulation.climate_change.initial,
                    ParamName::HumanActivity => config.simulation.human_activity.initial,
                    ParamName::Fate => config.simulation.fate.initial,
                };
                remap(initial, lo, hi, 0.0, 1.0)
            });
            (
                Box::new(KnobSimulator::new(seed).with_knobs(knobs)),
                Box::new(NullFloodSink),
            )
        } else {
            let (input_tx, input_rx) = bounded::<ControlInput>(1024);
            let (rgb_tx, rgb_rx) = bounded::<RgbPacket>(256);
            if start_serial(cli.port.clone(), input_tx, rgb_rx) {
                (
                    Box::new(ChannelInput::new(input_rx)),
                    Box::new(ChannelFloodSink::new(rgb_tx)),
                )
            } else {
                warn!("Running without the control desk");
                (Box::new(NoInput), Box::new(NullFloodSink))
            }
        };

    // ─── Fixed-tick loop ────────────────────────────────────────────
    let mut app = App::new(&config, installation, sink, flood_sink, input, cli.seed);
    let dt = config.tick_seconds();
    let period = Duration::from_secs_f64(dt);
    info!("Running. Press Ctrl+C to stop.");

    let mut next = Instant::now();
    loop {
        app.update(dt);

        next += period;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else if now - next > Duration::from_secs(1) {
            warn!("Update loop {:.0?} behind, resynchronising", now - next);
            next = now;
        }
    }
}

fn exit_with(e: &dyn std::error::Error) -> ! {
    error!("{}", e);
    process::exit(1);
}

/// Spawn a named thread. The loop never returns, so handles are not kept.
fn spawn<F>(name: &str, f: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = thread::Builder::new().name(name.into()).spawn(f) {
        error!("Failed to spawn {} thread: {}", name, e);
        process::exit(1);
    }
}

#[cfg(feature = "hardware")]
fn start_serial(
    port: Option<String>,
    input_tx: Sender<ControlInput>,
    rgb_rx: Receiver<RgbPacket>,
) -> bool {
    let Some(port) = port.or_else(serial_link::find_port) else {
        error!("No control desk serial port found. Run with --simulate-knobs for dev mode.");
        return false;
    };
    info!("Starting serial link on {}...", port);
    spawn("serial", move || {
        serial_link::SerialLink::new(port, input_tx, rgb_rx).run();
    });
    true
}

#[cfg(not(feature = "hardware"))]
fn start_serial(
    _port: Option<String>,
    _input_tx: Sender<ControlInput>,
    _rgb_rx: Receiver<RgbPacket>,
) -> bool {
    error!("The control desk requires the 'hardware' feature. Use --simulate-knobs.");
    false
}
