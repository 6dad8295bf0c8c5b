//! smcore-sim: host simulation runner.
//!
//! Drives an [`Executor`] at the configured tick period, optionally
//! injecting scripted events and faults, and prints progress and final
//! statistics.
//!
//! ```text
//!   scripted --post ──┐
//!   scripted --fault ─┤      ┌──────────┐       ┌─────────┐
//!   comm "good" feed ─┼────▶ │ Executor │ ────▶ │ LogSink │ ──▶ stderr
//!   tick loop ────────┘      └──────────┘       └─────────┘
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};

use smcore::adapters::console_log::ConsoleLogger;
use smcore::adapters::{LogSink, ManualClock, SystemClock};
use smcore::{Clock, CoreConfig, ErrorCode, ErrorLevel, Event, EventSlot, Executor};

/// Shared with anything that posts from outside the tick loop.
static SLOT: EventSlot = EventSlot::new();

/// Progress line period, in ticks.
const PROGRESS_EVERY: u32 = 100;

// ── CLI ───────────────────────────────────────────────────────

/// Run the state-machine core on the host.
#[derive(Parser, Debug)]
#[command(name = "smcore-sim", version, about, long_about = None)]
struct Cli {
    /// Number of ticks to run.
    #[arg(long, default_value_t = 1000)]
    ticks: u32,

    /// Config file: `.json`, or a postcard blob otherwise.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the wall clock and sleep one tick period per tick.
    #[arg(long)]
    realtime: bool,

    /// Post an event at a tick, e.g. `12:START`.  Repeatable.
    #[arg(long = "post", value_parser = parse_post)]
    posts: Vec<ScheduledPost>,

    /// Report a fault at a tick, e.g. `300:NORMAL:COMM_LOST`.  Repeatable.
    #[arg(long = "fault", value_parser = parse_fault)]
    faults: Vec<ScheduledFault>,

    /// Feed one good comm message every N ticks (0 = never).
    #[arg(long, default_value_t = 1)]
    good_every: u32,

    /// Print final statistics as JSON on stdout.
    #[arg(long)]
    stats_json: bool,

    /// Verbose output.  Repeat for more (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy)]
struct ScheduledPost {
    tick: u32,
    event: Event,
}

#[derive(Debug, Clone, Copy)]
struct ScheduledFault {
    tick: u32,
    level: ErrorLevel,
    code: ErrorCode,
}

fn parse_post(s: &str) -> std::result::Result<ScheduledPost, String> {
    let (tick, event) = s
        .split_once(':')
        .ok_or_else(|| format!("expected TICK:EVENT, got `{s}`"))?;
    Ok(ScheduledPost {
        tick: tick.parse().map_err(|e| format!("bad tick `{tick}`: {e}"))?,
        event: event.parse().map_err(|e| format!("{e}: `{event}`"))?,
    })
}

fn parse_fault(s: &str) -> std::result::Result<ScheduledFault, String> {
    let mut parts = s.splitn(3, ':');
    let (Some(tick), Some(level), Some(code)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected TICK:LEVEL:CODE, got `{s}`"));
    };
    Ok(ScheduledFault {
        tick: tick.parse().map_err(|e| format!("bad tick `{tick}`: {e}"))?,
        level: level.parse().map_err(|e| format!("{e}: `{level}`"))?,
        code: code.parse().map_err(|e| format!("{e}: `{code}`"))?,
    })
}

fn load_config(path: &Path) -> Result<CoreConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let config = if path.extension().is_some_and(|ext| ext == "json") {
        let text = std::str::from_utf8(&bytes).context("config is not UTF-8")?;
        CoreConfig::from_json(text)?
    } else {
        CoreConfig::decode(&bytes)?
    };
    Ok(config)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    ConsoleLogger::init(level).context("installing logger")?;

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CoreConfig::default(),
    };
    info!("smcore-sim v{} ({} ticks)", env!("CARGO_PKG_VERSION"), cli.ticks);

    if cli.realtime {
        let clock = SystemClock::new();
        let period = std::time::Duration::from_millis(u64::from(config.task_period_ms));
        run(&cli, config, clock, |_| std::thread::sleep(period))
    } else {
        let clock = ManualClock::new(0);
        run(&cli, config, &clock, |ms| clock.advance(ms))
    }
}

fn run<C: Clock>(
    cli: &Cli,
    config: CoreConfig,
    clock: C,
    mut wait_tick: impl FnMut(u32),
) -> Result<()> {
    let period = config.task_period_ms;
    let mut exec = Executor::new(&SLOT, clock, LogSink::new(), config)?;

    for tick in 0..cli.ticks {
        for post in cli.posts.iter().filter(|p| p.tick == tick) {
            if let Err(e) = SLOT.post(post.event) {
                warn!("tick {tick}: {e}");
            }
        }
        for fault in cli.faults.iter().filter(|f| f.tick == tick) {
            let d = exec.report_error(fault.level, fault.code);
            info!("tick {tick}: {} {} -> {:?}", fault.level, fault.code, d);
        }
        if cli.good_every != 0 && tick % cli.good_every == 0 {
            exec.signal_good_message();
        }

        let state = exec.execute();
        if tick % PROGRESS_EVERY == 0 {
            info!("iteration {tick} - state: {state}");
        }
        wait_tick(period);
    }

    let stats = exec.stats();
    info!(
        "simulation complete in {}: {} transitions, {} timeouts, {} unmatched, {} dropped",
        exec.current_state(),
        stats.transitions,
        stats.timeouts,
        stats.events_unmatched,
        stats.events_dropped
    );
    if cli.stats_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}
