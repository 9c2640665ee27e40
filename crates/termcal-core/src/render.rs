use std::io::{self, IsTerminal, Write};

use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{OUT_OF_TERM, TermBucket, weeks_in_term};
use crate::config::Config;
use crate::datetime::{Instant, format_zoned_date};
use crate::term::Term;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self { color: cfg.color }
    }

    #[tracing::instrument(skip(self, terms, tz))]
    pub fn print_terms_table(&mut self, terms: &[Term], tz: &Tz) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = ["Term", "Label", "Starts", "Ends", "Weeks"];
        let mut rows = Vec::with_capacity(terms.len());
        for term in terms {
            rows.push(vec![
                self.paint(&term.name, "33"),
                term.label.clone(),
                format_zoned_date(term.start, tz)?,
                format_zoned_date(term.end, tz)?,
                weeks_in_term(term).to_string(),
            ]);
        }

        write_table(&mut out, &headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_classification(
        &mut self,
        date: Instant,
        term: Option<&Term>,
        week: i64,
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rendered = format_zoned_date(date, tz)?;

        match term {
            Some(term) => {
                writeln!(
                    out,
                    "{}: {}, week {}",
                    rendered,
                    self.paint(&term.label, "33"),
                    week
                )?;
            }
            None => {
                writeln!(out, "{rendered}: out of term")?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_date(&mut self, date: Instant, tz: &Tz) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", format_zoned_date(date, tz)?)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, buckets, tz))]
    pub fn print_agenda(&mut self, buckets: &[TermBucket], tz: &Tz) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        for bucket in buckets {
            let heading = if bucket.name == OUT_OF_TERM {
                "Out of term".to_string()
            } else {
                bucket.label.clone()
            };
            writeln!(
                out,
                "{} ({} to {})",
                self.paint(&heading, "1;33"),
                format_zoned_date(bucket.start, tz)?,
                format_zoned_date(bucket.end, tz)?
            )?;

            let mut rows = Vec::with_capacity(bucket.events.len());
            for event in &bucket.events {
                rows.push(vec![
                    event
                        .id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    format_zoned_date(event.start, tz)?,
                    event.display_name.clone(),
                ]);
            }
            write_table(&mut out, &["ID", "Date", "Event"], rows)?;
            writeln!(out)?;
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        write!(writer, "{:width$} ", header, width = widths[idx])?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let padding = widths[idx].saturating_sub(visible_width(cell));
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// Display width of a cell with ANSI color sequences stripped.
fn visible_width(cell: &str) -> usize {
    let mut out = String::with_capacity(cell.len());
    let mut escaped = false;

    for ch in cell.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        out.push(ch);
    }

    UnicodeWidthStr::width(out.as_str())
}
