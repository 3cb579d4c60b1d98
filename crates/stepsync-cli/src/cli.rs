//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use time::Date;
use time::macros::format_description;

#[derive(Debug, Parser)]
#[command(name = "stepsync")]
#[command(author, version, about = "Explore step counts from a MIUI phone", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "STEPSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output (any non-false `NO_COLOR` value counts)
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a step database and summarize it
    Load(SourceArgs),

    /// Hourly steps for one day
    Day {
        #[command(flatten)]
        source: SourceArgs,

        /// Day to show (YYYY-MM-DD); defaults to the latest day with data
        #[arg(short, long, value_parser = parse_date)]
        date: Option<Date>,
    },

    /// Daily steps for one month
    Month {
        #[command(flatten)]
        source: SourceArgs,

        /// Year; defaults to the year of the latest data
        #[arg(short, long)]
        year: Option<i32>,

        /// Month number (1-12); defaults to the month of the latest data
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=12))]
        month: Option<u8>,
    },

    /// Monthly steps for one year
    Year {
        #[command(flatten)]
        source: SourceArgs,

        /// Year; defaults to the most recent year with data
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// List attached devices
    Devices,

    /// Attach a device over the network, then list devices
    Connect {
        /// Device address as host:port
        address: String,
    },

    /// Pull the database from a rooted phone and load it
    Sync {
        /// Attach this host:port first
        #[arg(long)]
        connect: Option<String>,

        /// Device id to pull from; defaults to the first one listed
        #[arg(short, long, env = "STEPSYNC_DEVICE")]
        device: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Database to read.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Step database; defaults to the configured local path
    pub path: Option<PathBuf>,
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}
