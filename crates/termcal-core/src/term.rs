use serde::{Deserialize, Serialize};

use crate::datetime::{Instant, iso_date_serde};

/// One term of an academic year. `start` and `end` are inclusive
/// boundaries; by institutional convention the start falls on a Tuesday.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Term {
    pub name: String,

    pub label: String,

    #[serde(with = "iso_date_serde")]
    pub start: Instant,

    #[serde(with = "iso_date_serde")]
    pub end: Instant,
}

impl Term {
    pub fn contains(&self, date: Instant) -> bool {
        self.start <= date && date <= self.end
    }
}
