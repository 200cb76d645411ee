//! Headless arcade runner.
//!
//! Runs a game without presentation. Summaries and protocol responses go to
//! stdout as JSON; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read JSON commands from stdin
//! cargo run -p arcade_headless
//!
//! # Run a built-in scenario and record it
//! cargo run -p arcade_headless -- run --scenario invaders --record invaders.replay
//!
//! # Play the record back at double speed and check its final hash
//! cargo run -p arcade_headless -- replay --file invaders.replay --scenario invaders --rate 120 --verify
//!
//! # Print record metadata
//! cargo run -p arcade_headless -- inspect --file invaders.replay
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arcade_core::event::PlaybackRate;
use arcade_headless::{
    protocol::RecordInfo,
    runner::{self, HeadlessRunner, RunOptions},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "arcade_headless")]
#[command(about = "Headless arcade runner for scripted sessions and replay verification")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario's scripted inputs and print a summary
    Run {
        /// Scenario file, or a built-in name (platformer, invaders)
        #[arg(short, long)]
        scenario: Option<String>,

        /// Ticks to run instead of the scenario's own count
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Record the run to this file
        #[arg(short, long)]
        record: Option<PathBuf>,

        /// Include every object in the summary
        #[arg(long)]
        state: bool,
    },

    /// Play a recorded session
    Replay {
        /// Record file
        #[arg(short, long)]
        file: PathBuf,

        /// Scenario the record came from, or a built-in name
        #[arg(short, long)]
        scenario: Option<String>,

        /// Playback rate in ticks per second
        #[arg(long, default_value = "60")]
        rate: u32,

        /// Fail unless the replayed hash matches the recorded one
        #[arg(long)]
        verify: bool,
    },

    /// Print record metadata
    Inspect {
        /// Record file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Serve JSON commands on stdin (the default)
    Interactive {
        /// Scenario file, or a built-in name
        #[arg(short, long)]
        scenario: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for JSON)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            ticks,
            record,
            state,
        }) => cmd_run(scenario.as_deref(), ticks, record, state),
        Some(Commands::Replay {
            file,
            scenario,
            rate,
            verify,
        }) => cmd_replay(&file, scenario.as_deref(), rate, verify),
        Some(Commands::Inspect { file }) => cmd_inspect(&file),
        Some(Commands::Interactive { scenario }) => cmd_interactive(scenario.as_deref()),
        None => cmd_interactive(None),
    }
}

fn load_scenario(name_or_path: Option<&str>) -> Scenario {
    match Scenario::resolve(name_or_path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize output: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_run(scenario: Option<&str>, ticks: Option<u64>, record: Option<PathBuf>, state: bool) {
    let scenario = load_scenario(scenario);
    let options = RunOptions {
        ticks,
        record,
        include_state: state,
    };
    match runner::run_scenario(&scenario, &options) {
        Ok(summary) => print_json(&summary),
        Err(e) => {
            eprintln!("Run failed: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_replay(file: &Path, scenario: Option<&str>, rate: u32, verify: bool) {
    if verify {
        tracing::info!("Verifying replay: {}", file.display());
    } else {
        tracing::info!("Playing replay: {}", file.display());
    }

    let scenario = load_scenario(scenario);
    let record = match runner::load_record(file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to load replay: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("Loaded replay:");
    eprintln!("  Game: {}", scenario.game);
    eprintln!("  Inputs: {}", record.input_count());
    eprintln!("  Duration: {} ticks", record.duration());

    let summary = match runner::play_record(&scenario, record, PlaybackRate::from_ticks_per_second(rate)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Playback failed: {e}");
            std::process::exit(1);
        }
    };
    print_json(&summary);

    if verify {
        if summary.matches {
            eprintln!("PASS: Replay verification successful");
            eprintln!("  Expected hash: {}", summary.recorded_hash);
            eprintln!("  Actual hash:   {}", summary.replayed_hash);
        } else {
            eprintln!("FAIL: Replay produced different hash!");
            eprintln!("  Expected: {}", summary.recorded_hash);
            eprintln!("  Actual:   {}", summary.replayed_hash);
            std::process::exit(1);
        }
    }
}

fn cmd_inspect(file: &Path) {
    match runner::load_record(file) {
        Ok(record) => print_json(&RecordInfo::from(&record)),
        Err(e) => {
            eprintln!("Failed to load replay: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_interactive(scenario: Option<&str>) {
    let scenario = load_scenario(scenario);
    tracing::info!(scenario = %scenario.name, "Starting interactive session");
    let mut runner = match HeadlessRunner::new(&scenario) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to build scenario: {e}");
            std::process::exit(1);
        }
    };
    let stdin = std::io::stdin();
    if let Err(e) = runner.run(stdin.lock(), std::io::stdout()) {
        eprintln!("Session failed: {e}");
        std::process::exit(1);
    }
}
