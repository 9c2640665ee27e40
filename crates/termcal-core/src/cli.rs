use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "termcal",
    version,
    about = "Academic calendar lookups: terms, week numbers, and event grouping",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", global = true, action = ArgAction::Count)]
    pub quiet: u8,

    /// Settings file (termcal.toml)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Term table JSON file
    #[arg(long = "terms", global = true)]
    pub terms: Option<PathBuf>,

    /// Academic year to resolve terms against
    #[arg(long = "year", global = true)]
    pub year: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the configured terms of the academic year
    Terms,

    /// Classify a date (ISO 8601 or "today") into a term and week
    Term {
        date: String,

        /// Use raw term boundaries, without the grace window before a
        /// term's start
        #[arg(long)]
        precise: bool,
    },

    /// Date of a week/day slot within a named term
    Date {
        term: String,

        /// 1-based week within the term
        week: i64,

        /// Day of week, 0 = Sunday .. 6 = Saturday; defaults to the
        /// term's start weekday
        day: Option<i64>,
    },

    /// Whole weeks between two dates
    Weeks { start: String, end: String },

    /// Group events from a JSON file ({"results": [...]}) by term
    Agenda {
        file: PathBuf,

        /// Emit the grouped buckets as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
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
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
