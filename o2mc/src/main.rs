//! o2mc - command line client for an O2MC collector
//!
//! This tool provides commands for:
//! - Checking tracker configuration
//! - Sending a single event by hand
//! - Streaming events from stdin with the dispatch timer running
//!
//! Configuration is read from $XDG_CONFIG_HOME/o2mc/config.toml
//! (~/.config/o2mc/config.toml); `--app-id` and `--endpoint` override it.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use o2mc_core::{Config, DispatchOutcome, O2mc, TrackerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "o2mc")]
#[command(about = "Send tagged events to an O2MC collector")]
#[command(version)]
struct Args {
    /// Write logs to the state directory
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Application id (overrides tracker.app_id)
    #[arg(long, global = true)]
    app_id: Option<String>,

    /// Collector endpoint (overrides tracker.endpoint)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show tracker configuration
    Status,

    /// Track one event and dispatch it immediately
    Track {
        /// Event name
        name: String,

        /// Event value; parsed as JSON, sent as a string otherwise
        #[arg(short, long)]
        value: Option<String>,
    },

    /// Track one event per stdin line until EOF, dispatching periodically
    Run {
        /// Seconds between dispatches (default: from config)
        #[arg(short, long)]
        interval: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = if args.verbose {
        Some(o2mc_core::logging::init(&config.logging).context("failed to initialize logging")?)
    } else {
        None
    };

    let mut tracker = config.tracker;
    if let Some(app_id) = args.app_id {
        tracker.app_id = app_id;
    }
    if let Some(endpoint) = args.endpoint {
        tracker.endpoint = endpoint;
    }

    match args.command {
        Command::Status => cmd_status(&tracker),
        Command::Track { name, value } => cmd_track(tracker, name, value).await,
        Command::Run { interval } => cmd_run(tracker, interval).await,
    }
}

fn cmd_status(tracker: &TrackerConfig) -> Result<()> {
    println!("O2MC Tracker Configuration");
    println!("==========================");
    println!();

    let or_unset = |s: &str| {
        if s.is_empty() {
            "<not set>".to_string()
        } else {
            s.to_string()
        }
    };

    println!("Config File:     {}", Config::config_path().display());
    println!("App ID:          {}", or_unset(&tracker.app_id));
    println!("Endpoint:        {}", or_unset(&tracker.endpoint));
    println!("Interval:        {}s", tracker.dispatch_interval_secs);
    println!("Force Start:     {}", tracker.force_start_timer);
    println!("Timeout:         {}s", tracker.timeout_secs);
    println!("Max Retries:     {}", tracker.max_retries);

    println!();
    match tracker.validate() {
        Ok(()) => println!("Status: Ready to dispatch"),
        Err(e) => {
            println!("Status: Not ready ({})", e);
            println!();
            println!("Configure the tracker in config.toml:");
            println!();
            println!("  [tracker]");
            println!("  app_id = \"your-app-id\"");
            println!("  endpoint = \"https://collector.example.com\"");
        }
    }

    Ok(())
}

/// Interpret a CLI value as JSON, falling back to a plain string
fn parse_value(raw: String) -> serde_json::Value {
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
}

async fn cmd_track(mut tracker: TrackerConfig, name: String, value: Option<String>) -> Result<()> {
    // Dispatch by hand, no timer
    tracker.force_start_timer = false;
    let o2mc = O2mc::from_config(tracker).context("invalid tracker configuration")?;

    match value {
        Some(raw) => o2mc.tracker().track_with_properties(name, parse_value(raw)),
        None => o2mc.tracker().track(name),
    }

    report(o2mc.flush().await)
}

async fn cmd_run(mut tracker: TrackerConfig, interval: Option<f64>) -> Result<()> {
    if let Some(secs) = interval {
        tracker.dispatch_interval_secs = secs;
    }
    tracker.force_start_timer = true;

    let o2mc = O2mc::from_config(tracker).context("invalid tracker configuration")?;
    tracing::info!("Reading events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tracked = 0usize;
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        o2mc.tracker().track(name);
        tracked += 1;
    }

    let stats_before = o2mc.tracker().stats();
    let outcome = o2mc.shutdown().await;
    println!(
        "Tracked {} events ({} dispatched before EOF)",
        tracked, stats_before.events_sent
    );
    report(outcome)
}

fn report(outcome: DispatchOutcome) -> Result<()> {
    match outcome {
        DispatchOutcome::Sent { number, events } => {
            println!("Sent batch #{} with {} events", number, events);
            Ok(())
        }
        DispatchOutcome::Idle => {
            println!("Nothing to send");
            Ok(())
        }
        DispatchOutcome::Busy => bail!("a dispatch was already in progress"),
        DispatchOutcome::Failed { number, retries } => {
            bail!("batch #{} failed to dispatch (attempt {})", number, retries)
        }
        DispatchOutcome::Dropped { number, events } => {
            bail!("batch #{} with {} events was rejected", number, events)
        }
    }
}
