//! # rocker control unit runner
//!
//! Drives the motion core on a development host: the simulated driver/plant
//! stands in for the motor stage, a command script stands in for the host,
//! and the wall clock paces the scheduler.
//!
//! Loads the machine file (`--config`, compiled defaults if absent), performs
//! RT setup, then ticks until `--ticks` ticks ran or Ctrl-C. With `--report`
//! the final status is printed as JSON on stdout.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rocker_common::config::LogLevel;
use rocker_common::consts::DEFAULT_CONFIG_PATH;
use rocker_common::hal::CountingHeartbeat;
use rocker_common::protocol::Datagram;
use rocker_control_unit::config::{LoadedConfig, load_config};
use rocker_control_unit::cycle::{InstantClock, Scheduler, rt_setup};
use rocker_control_unit::sim::{ScriptFeeder, SimDriver, load_script};
use rocker_control_unit::transport::{FrameQueue, QueuedTransport};

/// rocker control unit: closed-loop stepper motion core runner
#[derive(Parser, Debug)]
#[command(name = "rocker_control_unit")]
#[command(version)]
#[command(about = "Closed-loop stepper motion core with a simulated motor stage")]
struct Args {
    /// Machine file (TOML). Compiled defaults are used when it does not exist.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Command script: one `<tick> <hex datagram>` per line.
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Stop after this many ticks (default: run until Ctrl-C).
    #[arg(long)]
    ticks: Option<u64>,

    /// CPU core to pin the loop to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Print the final status report as JSON.
    #[arg(long)]
    report: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let loaded = match load(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            setup_tracing(&args, LogLevel::default());
            error!("FATAL: {e}");
            process::exit(1);
        }
    };
    setup_tracing(&args, loaded.log_level);

    info!("rocker control unit v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, loaded) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("rocker control unit shutdown complete");
}

/// Machine file, or compiled defaults when the default path is missing.
fn load(args: &Args) -> Result<LoadedConfig, Box<dyn std::error::Error>> {
    if !args.config.exists() && args.config == PathBuf::from(DEFAULT_CONFIG_PATH) {
        return Ok(LoadedConfig::default());
    }
    Ok(load_config(&args.config)?)
}

fn run(args: &Args, loaded: LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let script = match &args.script {
        Some(path) => load_script(path)?,
        None => Vec::new(),
    };
    if script.is_empty() && args.ticks.is_none() {
        warn!("no command script and no tick limit, idling until Ctrl-C");
    }
    let mut feeder = ScriptFeeder::new(script);

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        cpu_core = args.cpu_core,
        priority = args.rt_priority,
        "RT setup complete"
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut queue: FrameQueue<Datagram> = FrameQueue::new();
    let (mut producer, consumer) = queue.split();
    let driver = SimDriver::new(&loaded.store).with_tick_period(loaded.tick_period);
    let mut scheduler = Scheduler::new(
        loaded.store,
        loaded.tick_period,
        QueuedTransport::new(consumer, Vec::new()),
        driver,
        InstantClock::new(),
        CountingHeartbeat::default(),
    );

    scheduler.run(&running, args.ticks, |tick| {
        for entry in feeder.due(tick) {
            producer.push(entry.frame);
        }
    })?;

    log_replies(scheduler.transport().sink());

    if args.report {
        println!("{}", serde_json::to_string_pretty(&scheduler.status_report())?);
    }
    Ok(())
}

/// Log every reply the host would have received.
fn log_replies(replies: &[Datagram]) {
    for frame in replies {
        match frame.parse_reply() {
            Ok(reply) => info!(
                instruction = reply.instruction,
                status = ?reply.status,
                value = reply.value,
                "reply"
            ),
            // Only text replies go out without a checksum.
            Err(_) => info!(
                version = %String::from_utf8_lossy(&frame.text_payload()),
                "text reply"
            ),
        }
    }
    info!(count = replies.len(), "replies sent");
}

/// Setup tracing: `--verbose` forces DEBUG, otherwise the machine file level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        "debug"
    } else {
        level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
