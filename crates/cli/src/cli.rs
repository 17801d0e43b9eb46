//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::EventId;
use std::path::PathBuf;

/// Race Timer - lane scheduling, timing and standings for a multi-lane track
#[derive(Parser, Debug)]
#[command(
    name = "race-timer",
    author,
    version,
    about = "Multi-lane race timing core",
    long_about = "Timing core for a gravity track with a start gate and one finish sensor per lane.\n\n\
                  Schedules cars onto lanes, times each race from gate release, scores \n\
                  results and achievements, and broadcasts lifecycle bulletins to sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RACE_TIMER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RACE_TIMER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run races from the configured sensor source
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Print event standings from the result store
    Standings(StandingsArgs),

    /// Export event results as CSV
    Export(ExportArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "RACE_TIMER_CONFIG")]
    pub config: PathBuf,

    /// Override the event id from configuration
    #[arg(long, env = "RACE_TIMER_EVENT")]
    pub event: Option<EventId>,

    /// Replay a recorded session instead of the configured source
    #[arg(long, env = "RACE_TIMER_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Stop after this many completed races (0 = unlimited)
    #[arg(long, default_value = "0", env = "RACE_TIMER_MAX_RACES")]
    pub max_races: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "RACE_TIMER_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without racing
    #[arg(long)]
    pub dry_run: bool,

    /// Channel buffer size for internal queues
    #[arg(long, default_value = "256", env = "RACE_TIMER_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9100", env = "RACE_TIMER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml", env = "RACE_TIMER_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "RACE_TIMER_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the car roster
    #[arg(long)]
    pub cars: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Arguments for the `standings` command
#[derive(Parser, Debug)]
pub struct StandingsArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "RACE_TIMER_CONFIG")]
    pub config: PathBuf,

    /// Override the event id from configuration
    #[arg(long, env = "RACE_TIMER_EVENT")]
    pub event: Option<EventId>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `export` command
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "RACE_TIMER_CONFIG")]
    pub config: PathBuf,

    /// Override the event id from configuration
    #[arg(long, env = "RACE_TIMER_EVENT")]
    pub event: Option<EventId>,

    /// Output CSV path (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
