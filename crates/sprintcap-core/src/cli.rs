use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::timeoff::TimeOffKind;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sprintcap",
    version,
    about = "Sprint capacity from team work calendars and time off"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Team calendar file (TOML).
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the time-off store.
    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Override a config value, e.g. --set calendar.time_zone=Europe/Berlin.
    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    /// Print JSON instead of tables.
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Tell whether a date is a working day.
    IsWorkday { date: String },

    /// Count (or list) the working days between two dates, inclusive.
    Workdays {
        start: String,
        end: String,
        #[arg(long)]
        list: bool,
    },

    /// Capacity impact of stored time off on a sprint.
    Capacity {
        start: String,
        end: String,
        /// Only count these users.
        #[arg(long = "user")]
        users: Vec<String>,
    },

    /// Manage time-off entries.
    #[command(subcommand)]
    Timeoff(TimeoffCommand),

    /// List configured holidays.
    Holidays,

    /// Show the effective calendar configuration.
    Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TimeoffCommand {
    Add(TimeoffAddArgs),
    List {
        #[arg(long)]
        user: Option<String>,
    },
    Remove { id: String },
}

#[derive(Args, Debug, Clone)]
pub struct TimeoffAddArgs {
    pub user: String,
    pub start: String,
    pub end: String,
    #[arg(long)]
    pub half_day: bool,
    #[arg(long, default_value_t = TimeOffKind::Vacation)]
    pub kind: TimeOffKind,
    #[arg(long)]
    pub note: Option<String>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
