use crate::source::SelectionWindow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateParseError {
    #[error("invalid date '{0}': use YYYY-MM-DD, YYYY-MM-DD HH:MM or YYYY-MM-DD HH:MM:SS")]
    Invalid(String),

    #[error("start date {start} is after end date {end}")]
    Reversed {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Which end of a range a date-only value stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Midnight.
    Start,
    /// 23:59:59 of the same day.
    End,
}

/// Parse a command-line date or date-time as UTC.
pub fn parse_cli_datetime(input: &str, bound: Bound) -> Result<DateTime<Utc>, DateParseError> {
    let input = input.trim();

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(dt.and_utc());
        }
    }

    let date = NaiveDate::parse_from_str(input, DATE_FORMAT)
        .map_err(|_| DateParseError::Invalid(input.to_string()))?;

    let time = match bound {
        Bound::Start => date.and_hms_opt(0, 0, 0),
        Bound::End => date.and_hms_opt(23, 59, 59),
    };

    time.map(|dt| dt.and_utc())
        .ok_or_else(|| DateParseError::Invalid(input.to_string()))
}

/// Build the selection window from the optional `--start-date`/`--end-date`.
pub fn window_from_args(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<SelectionWindow, DateParseError> {
    let start = start
        .map(|s| parse_cli_datetime(s, Bound::Start))
        .transpose()?;
    let end = end.map(|s| parse_cli_datetime(s, Bound::End)).transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(DateParseError::Reversed { start, end });
        }
    }

    Ok(SelectionWindow::new(start, end))
}
