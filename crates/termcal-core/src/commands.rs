use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::calendar::{AcademicCalendar, order_events_by_term, weeks_in_date_range};
use crate::cli::Command;
use crate::config::Config;
use crate::datetime::{Instant, iso_to_unix};
use crate::event::load_events;
use crate::render::Renderer;

#[instrument(skip(cfg, calendar, renderer, command))]
pub fn dispatch(
    cfg: &Config,
    calendar: &AcademicCalendar,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, year = %cfg.academic_year, "dispatching command");

    match command {
        Command::Terms => cmd_terms(cfg, calendar, renderer),
        Command::Term { date, precise } => cmd_term(cfg, calendar, renderer, &date, precise),
        Command::Date { term, week, day } => cmd_date(cfg, calendar, renderer, &term, week, day),
        Command::Weeks { start, end } => cmd_weeks(cfg, &start, &end),
        Command::Agenda { file, json } => cmd_agenda(cfg, calendar, renderer, &file, json),
    }
}

/// Resolves a date argument: "today" in the configured timezone, or an
/// ISO 8601 string.
fn parse_date_arg(cfg: &Config, raw: &str) -> anyhow::Result<Instant> {
    if raw.trim().eq_ignore_ascii_case("today") {
        let today = Utc::now().with_timezone(&cfg.timezone).date_naive();
        return Ok(crate::datetime::CalendarDate::new(today).to_instant());
    }

    iso_to_unix(raw).with_context(|| format!("invalid date argument '{raw}'"))
}

#[instrument(skip_all)]
fn cmd_terms(
    cfg: &Config,
    calendar: &AcademicCalendar,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    info!(count = calendar.terms().len(), "command terms");
    renderer.print_terms_table(calendar.terms(), &cfg.timezone)
}

#[instrument(skip(cfg, calendar, renderer))]
fn cmd_term(
    cfg: &Config,
    calendar: &AcademicCalendar,
    renderer: &mut Renderer,
    date: &str,
    precise: bool,
) -> anyhow::Result<()> {
    info!(date, precise, "command term");

    let instant = parse_date_arg(cfg, date)?;
    let found = calendar.term_for(instant, precise);
    let week = calendar.academic_week_number(instant, precise);

    renderer.print_classification(instant, found, week, &cfg.timezone)
}

#[instrument(skip(cfg, calendar, renderer))]
fn cmd_date(
    cfg: &Config,
    calendar: &AcademicCalendar,
    renderer: &mut Renderer,
    term: &str,
    week: i64,
    day: Option<i64>,
) -> anyhow::Result<()> {
    info!(term, week, ?day, "command date");

    let day = match day {
        Some(day) => day,
        None => calendar.first_day_of_term(term)?.weekday_sun0(),
    };

    let date = calendar
        .date_by_week_and_day(term, week, day)
        .with_context(|| format!("cannot resolve week {week} day {day} of term '{term}'"))?;

    renderer.print_date(date, &cfg.timezone)
}

#[instrument(skip(cfg))]
fn cmd_weeks(cfg: &Config, start: &str, end: &str) -> anyhow::Result<()> {
    info!(start, end, "command weeks");

    let start = parse_date_arg(cfg, start)?;
    let end = parse_date_arg(cfg, end)?;
    let weeks = weeks_in_date_range(start, end)?;

    println!("{weeks}");
    Ok(())
}

#[instrument(skip(cfg, calendar, renderer, file))]
fn cmd_agenda(
    cfg: &Config,
    calendar: &AcademicCalendar,
    renderer: &mut Renderer,
    file: &std::path::Path,
    json: bool,
) -> anyhow::Result<()> {
    info!(file = %file.display(), json, "command agenda");

    let events = load_events(file)?;
    let buckets = calendar.split_events_by_term(&events);
    let ordered = order_events_by_term(buckets);

    debug!(buckets = ordered.len(), events = events.len(), "grouped events");

    if json {
        println!("{}", serde_json::to_string_pretty(&ordered)?);
        return Ok(());
    }

    renderer.print_agenda(&ordered, &cfg.timezone)
}
