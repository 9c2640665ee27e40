pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod event;
pub mod render;
pub mod term;

pub use error::CalendarError;

use std::ffi::OsString;

use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting termcal CLI"
    );

    let cfg = config::Config::load(
        cli.config.as_deref(),
        cli.terms.as_deref(),
        cli.year.as_deref(),
    )?;
    debug!(files = ?cfg.loaded_files, year = %cfg.academic_year, "configuration loaded");

    let calendar = cfg.calendar()?;
    let mut renderer = render::Renderer::new(&cfg);

    commands::dispatch(&cfg, &calendar, &mut renderer, cli.command)?;

    info!("done");
    Ok(())
}
