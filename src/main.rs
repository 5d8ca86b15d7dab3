//! SmartPlate: host entry point
//!
//! Runs the control plane against a simulated hotplate and serves the
//! JSON protocol over TCP.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RelayHeater<SimRelayPin>   SimThermalSensor   SimStirrer      │
//! │  (Actuator)                 (Sensor)           (Sensor)        │
//! │  TcpTransport   FsNoteStore   MonotonicClock   RestartLatch    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  Context: StateStore · ModeController · InboundQueue   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler: actuation · session · aggregation                  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `resetSystem` command stops the loops and exits with status 3 so a
//! process supervisor can start a fresh instance.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context as _, Result};
use clap::Parser;
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use smartplate::adapters::notes::FsNoteStore;
use smartplate::adapters::relay_heater::RelayHeater;
use smartplate::adapters::sim::{SimRelayPin, SimStirrer, SimThermalSensor};
use smartplate::adapters::system::RestartLatch;
use smartplate::adapters::tcp_transport::TcpTransport;
use smartplate::adapters::time::MonotonicClock;
use smartplate::config::ControllerConfig;
use smartplate::context::Context;
use smartplate::rpc::channels::InboundQueue;
use smartplate::scheduler;

/// Exit status asking the supervisor for a restart.
const RESTART_EXIT_CODE: i32 = 3;

/// SmartPlate heating controller
#[derive(Parser, Debug)]
#[command(name = "smartplate")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    listen: Option<String>,

    /// Notes directory, overrides the config file
    #[arg(long)]
    notes_dir: Option<String>,

    /// Ambient temperature of the simulated plate (°C)
    #[arg(long, default_value = "22.0")]
    ambient: f32,
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("╔══════════════════════════════════════╗");
    info!("║  SmartPlate v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1. Configuration ──────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => ControllerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    if let Some(addr) = args.listen {
        config.listen_addr = addr;
    }
    if let Some(dir) = args.notes_dir {
        config.notes_dir = dir;
    }

    // ── 2. Adapters ───────────────────────────────────────────
    let clock = MonotonicClock::new();
    let inbound = Arc::new(InboundQueue::new());
    let transport = TcpTransport::bind(&config.listen_addr, Arc::clone(&inbound))
        .with_context(|| format!("binding {}", config.listen_addr))?;
    let notes = FsNoteStore::open(&config.notes_dir)
        .with_context(|| format!("opening notes directory {}", config.notes_dir))?;
    let latch = RestartLatch::new();
    let shutdown = latch.flag();

    let relay = SimRelayPin::new();
    let heater = RelayHeater::new(relay.clone(), config.max_temperature, config.fault_clear_margin);
    let mut plate = SimThermalSensor::new(relay, clock, args.ambient);
    let mut stirrer = SimStirrer::new();

    // ── 3. Context ────────────────────────────────────────────
    let ctx = Context::new(
        config,
        heater,
        inbound,
        Box::new(clock),
        Box::new(notes),
        Box::new(transport),
        Box::new(latch.clone()),
    );

    let completions = Arc::new(AtomicU64::new(0));
    let fault_trips = Arc::new(AtomicU64::new(0));
    {
        let completions = Arc::clone(&completions);
        let fault_trips = Arc::clone(&fault_trips);
        let registered = ctx.store.with_lock(move |s| {
            s.modes.set_on_complete(move || {
                completions.fetch_add(1, Ordering::Relaxed);
            });
            s.modes.set_on_fault(move || {
                fault_trips.fetch_add(1, Ordering::Relaxed);
            });
        });
        if registered.is_none() {
            warn!("could not register mode callbacks: state lock busy");
        }
    }

    if !ctx.arm_initial_mode() {
        warn!("initial mode not armed: state lock busy");
    }

    // ── 4. Run ────────────────────────────────────────────────
    scheduler::run(&ctx, &mut plate, &mut stirrer, &shutdown)
        .context("starting control loops")?;

    info!(
        "loops stopped after {} completed run(s), {} fault tick(s)",
        completions.load(Ordering::Relaxed),
        fault_trips.load(Ordering::Relaxed)
    );

    if latch.requested() {
        info!("exiting for restart");
        std::process::exit(RESTART_EXIT_CODE);
    }
    Ok(())
}
