use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datetime::{Instant, iso_date_serde};

/// An event as the mapper consumes it: only `start` and `end` matter for
/// classification, the rest is carried through for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default, rename = "displayName")]
    pub display_name: String,

    #[serde(with = "iso_date_serde")]
    pub start: Instant,

    #[serde(with = "iso_date_serde")]
    pub end: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EventPage {
    results: Vec<Event>,
}

/// Loads an event list from a JSON file shaped `{"results": [...]}`.
#[tracing::instrument(skip(path))]
pub fn load_events(path: &Path) -> anyhow::Result<Vec<Event>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let page: EventPage = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse events from {}", path.display()))?;

    debug!(count = page.results.len(), file = %path.display(), "loaded events");
    Ok(page.results)
}
