use thiserror::Error;

/// Errors raised by the calendar mapper and its date conversions.
///
/// A date falling outside every configured term is not an error; lookups
/// report that case as `None` or week `0`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: i64, end: i64 },

    #[error("no term named '{0}' in the configured academic year")]
    NotFound(String),
}

impl CalendarError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
