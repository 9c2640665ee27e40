use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::calendar::AcademicCalendar;
use crate::term::Term;

const SETTINGS_FILE: &str = "termcal.toml";
const TERMS_FILE: &str = "terms.json";
const CONFIG_ENV_VAR: &str = "TERMCAL_CONFIG";
const TERMS_ENV_VAR: &str = "TERMCAL_TERMS";
const YEAR_ENV_VAR: &str = "TERMCAL_YEAR";
const TIMEZONE_ENV_VAR: &str = "TERMCAL_TIMEZONE";
const DEFAULT_TIMEZONE: &str = "Europe/London";

/// Optional `termcal.toml` settings.
#[derive(Debug, Default, Deserialize)]
struct Settings {
    timezone: Option<String>,
    academic_year: Option<String>,
    terms: Option<PathBuf>,
    color: Option<bool>,
}

/// Resolved application configuration: the term table keyed by academic
/// year, the selected year, and display settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub timezone: Tz,
    pub academic_year: String,
    pub color: bool,
    terms_by_year: HashMap<String, Vec<Term>>,
    pub loaded_files: Vec<PathBuf>,
}

impl Config {
    /// Loads settings and the term table. CLI flags win over env vars,
    /// which win over the settings file.
    #[tracing::instrument(skip_all)]
    pub fn load(
        config_override: Option<&Path>,
        terms_override: Option<&Path>,
        year_override: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut loaded_files = Vec::new();

        let settings = match resolve_settings_path(config_override) {
            Some(path) if path.exists() => {
                info!(file = %path.display(), "loading settings");
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let parsed: Settings = toml::from_str(&raw)
                    .with_context(|| format!("failed to parse {}", path.display()))?;
                loaded_files.push(path);
                parsed
            }
            Some(path) => {
                debug!(file = %path.display(), "no settings file; using defaults");
                Settings::default()
            }
            None => Settings::default(),
        };

        let terms_path = resolve_terms_path(terms_override, settings.terms.as_deref())
            .ok_or_else(|| {
                anyhow!(
                    "no term table configured; pass --terms, set {TERMS_ENV_VAR}, \
                     or add a `terms` path to {SETTINGS_FILE}"
                )
            })?;

        info!(file = %terms_path.display(), "loading term table");
        let raw = fs::read_to_string(&terms_path)
            .with_context(|| format!("failed to read {}", terms_path.display()))?;
        let terms_by_year: HashMap<String, Vec<Term>> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse term table {}", terms_path.display()))?;
        loaded_files.push(terms_path);

        if terms_by_year.is_empty() {
            return Err(anyhow!("term table is empty: no academic years configured"));
        }

        let academic_year = resolve_academic_year(
            year_override,
            settings.academic_year.as_deref(),
            &terms_by_year,
        )?;

        let timezone = resolve_timezone(settings.timezone.as_deref());

        debug!(
            year = %academic_year,
            timezone = %timezone,
            years = terms_by_year.len(),
            "configuration resolved"
        );

        Ok(Self {
            timezone,
            academic_year,
            color: settings.color.unwrap_or(true),
            terms_by_year,
            loaded_files,
        })
    }

    pub fn academic_years(&self) -> Vec<&str> {
        let mut years: Vec<&str> = self.terms_by_year.keys().map(String::as_str).collect();
        years.sort_unstable();
        years
    }

    /// Builds the mapper for the selected academic year.
    pub fn calendar(&self) -> anyhow::Result<AcademicCalendar> {
        let terms = self
            .terms_by_year
            .get(&self.academic_year)
            .ok_or_else(|| {
                anyhow!(
                    "no terms configured for academic year {} (known years: {})",
                    self.academic_year,
                    self.academic_years().join(", ")
                )
            })?;
        Ok(AcademicCalendar::new(terms.clone()))
    }
}

fn resolve_settings_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(raw) = std::env::var(CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let local = PathBuf::from(SETTINGS_FILE);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir().map(|dir| dir.join("termcal").join(SETTINGS_FILE))
}

fn resolve_terms_path(
    override_path: Option<&Path>,
    settings_path: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(raw) = std::env::var(TERMS_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    if let Some(path) = settings_path {
        return Some(path.to_path_buf());
    }

    let candidate = dirs::config_dir().map(|dir| dir.join("termcal").join(TERMS_FILE));
    candidate.filter(|path| path.exists())
}

fn resolve_academic_year(
    override_year: Option<&str>,
    settings_year: Option<&str>,
    terms_by_year: &HashMap<String, Vec<Term>>,
) -> anyhow::Result<String> {
    let chosen = override_year
        .map(str::to_string)
        .or_else(|| std::env::var(YEAR_ENV_VAR).ok().filter(|y| !y.trim().is_empty()))
        .or_else(|| settings_year.map(str::to_string));

    if let Some(year) = chosen {
        if !terms_by_year.contains_key(&year) {
            return Err(anyhow!(
                "academic year {} not present in the term table",
                year
            ));
        }
        return Ok(year);
    }

    // Fall back to the most recent configured year.
    let mut years: Vec<&String> = terms_by_year.keys().collect();
    years.sort_unstable();
    let latest = years
        .last()
        .ok_or_else(|| anyhow!("term table is empty"))?;
    warn!(year = %latest, "no academic year selected; using most recent");
    Ok((*latest).to_string())
}

fn resolve_timezone(settings_tz: Option<&str>) -> Tz {
    let raw = std::env::var(TIMEZONE_ENV_VAR)
        .ok()
        .filter(|tz| !tz.trim().is_empty())
        .or_else(|| settings_tz.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

    match raw.trim().parse::<Tz>() {
        Ok(tz) => {
            debug!(timezone = %tz, "configured display timezone");
            tz
        }
        Err(err) => {
            warn!(timezone = %raw, error = %err, "failed to parse timezone; using UTC");
            chrono_tz::UTC
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::Config;

    fn write_terms(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("terms.json");
        let mut file = std::fs::File::create(&path).expect("create terms file");
        write!(
            file,
            r#"{{
              "2014": [
                {{"name": "michaelmas", "label": "Michaelmas", "start": "2014-10-07", "end": "2014-12-05"}},
                {{"name": "lent", "label": "Lent", "start": "2015-01-13", "end": "2015-03-13"}}
              ],
              "2015": [
                {{"name": "michaelmas", "label": "Michaelmas", "start": "2015-10-06", "end": "2015-12-04"}}
              ]
            }}"#
        )
        .expect("write terms file");
        path
    }

    #[test]
    fn loads_terms_and_selects_requested_year() {
        let dir = TempDir::new().expect("tempdir");
        let terms = write_terms(&dir);

        let cfg = Config::load(None, Some(&terms), Some("2014")).expect("load config");
        assert_eq!(cfg.academic_year, "2014");

        let cal = cfg.calendar().expect("build calendar");
        assert_eq!(cal.terms().len(), 2);
        assert_eq!(cal.terms()[0].name, "michaelmas");
    }

    #[test]
    fn falls_back_to_most_recent_year() {
        let dir = TempDir::new().expect("tempdir");
        let terms = write_terms(&dir);

        let cfg = Config::load(None, Some(&terms), None).expect("load config");
        assert_eq!(cfg.academic_year, "2015");
    }

    #[test]
    fn rejects_unknown_year() {
        let dir = TempDir::new().expect("tempdir");
        let terms = write_terms(&dir);

        let err = Config::load(None, Some(&terms), Some("1999")).expect_err("unknown year");
        assert!(err.to_string().contains("1999"));
    }

    #[test]
    fn settings_file_supplies_year_and_timezone() {
        let dir = TempDir::new().expect("tempdir");
        let terms = write_terms(&dir);

        let settings = dir.path().join("termcal.toml");
        std::fs::write(
            &settings,
            format!(
                "timezone = \"Europe/London\"\nacademic_year = \"2014\"\nterms = \"{}\"\n",
                terms.display()
            ),
        )
        .expect("write settings");

        let cfg = Config::load(Some(&settings), None, None).expect("load config");
        assert_eq!(cfg.academic_year, "2014");
        assert_eq!(cfg.timezone, chrono_tz::Europe::London);
    }

    #[test]
    fn rejects_malformed_term_dates() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("terms.json");
        std::fs::write(
            &path,
            r#"{"2014": [{"name": "lent", "label": "Lent", "start": "13/01/2015", "end": "2015-03-13"}]}"#,
        )
        .expect("write terms");

        let err = Config::load(None, Some(&path), None).expect_err("bad date");
        assert!(err.to_string().contains("term table"));
    }
}
