//! Date expression parser
//!
//! Turns human date expressions into instants. Forms are tried in order,
//! case-insensitively:
//!
//! ```text
//! now                      current instant
//! today                    local midnight of the current day
//! 7d | 12h | 2w | 3m       now minus N days / hours / weeks / calendar months
//! 2024-03-05T08:30:00.250Z RFC 3339, with or without fractional seconds
//! 2024-03-05T08:30:00      local wall-clock time
//! 2024-03-05               local midnight
//! ```
//!
//! Relative expressions are evaluated against the wall clock at call time;
//! [`parse_instant_at`] takes the reference instant explicitly.

use crate::health::types::TimeInterval;
use chrono::{DateTime, Duration, Local, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Date expression errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DateParseError {
    /// Relative expression with a unit other than d, h, w or m
    #[error("invalid relative date unit '{unit}' in '{input}' (expected d, h, w or m)")]
    InvalidUnit { input: String, unit: String },

    /// Nothing in the grammar matched
    #[error("unparseable date expression '{0}'")]
    Unparseable(String),
}

/// Which side of a range failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSide {
    From,
    To,
}

impl RangeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeSide::From => "from",
            RangeSide::To => "to",
        }
    }
}

/// A range parse failure, tagged with the side that failed
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}: {error}", .side.as_str())]
pub struct RangeError {
    pub side: RangeSide,
    pub error: DateParseError,
}

fn relative_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d+)([a-z])$").ok())
        .as_ref()
}

/// Parse a date expression relative to the current wall clock
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    parse_instant_at(input, Local::now())
}

/// Parse a date expression relative to `now`
pub fn parse_instant_at(
    input: &str,
    now: DateTime<Local>,
) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = input.trim();
    let lowered = trimmed.to_lowercase();
    let unparseable = || DateParseError::Unparseable(input.to_string());

    match lowered.as_str() {
        "now" => return Ok(now.with_timezone(&Utc)),
        "today" => return start_of_day(now.date_naive()).ok_or_else(unparseable),
        _ => {}
    }

    let pattern = relative_pattern().ok_or_else(unparseable)?;
    if let Some(captures) = pattern.captures(&lowered) {
        let amount: u32 = captures[1].parse().map_err(|_| unparseable())?;
        let shifted = match &captures[2] {
            "d" => now.checked_sub_signed(Duration::days(i64::from(amount))),
            "h" => now.checked_sub_signed(Duration::hours(i64::from(amount))),
            "w" => now.checked_sub_signed(Duration::weeks(i64::from(amount))),
            "m" => now.checked_sub_months(Months::new(amount)),
            unit => {
                return Err(DateParseError::InvalidUnit {
                    input: input.to_string(),
                    unit: unit.to_string(),
                })
            }
        };
        return shifted.map(|dt| dt.with_timezone(&Utc)).ok_or_else(unparseable);
    }

    parse_absolute(trimmed).ok_or_else(unparseable)
}

/// Parse both ends of a range against one shared `now`
///
/// Ordering is not checked; callers that need `end > start` enforce it.
pub fn parse_range(from: &str, to: &str) -> Result<TimeInterval, RangeError> {
    parse_range_at(from, to, Local::now())
}

/// [`parse_range`] with an explicit reference instant
pub fn parse_range_at(
    from: &str,
    to: &str,
    now: DateTime<Local>,
) -> Result<TimeInterval, RangeError> {
    let start = parse_instant_at(from, now).map_err(|error| RangeError {
        side: RangeSide::From,
        error,
    })?;
    let end = parse_instant_at(to, now).map_err(|error| RangeError {
        side: RangeSide::To,
        error,
    })?;
    Ok(TimeInterval::new(start, end))
}

/// Local midnight at the start of `date`
pub fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    local_to_utc(&midnight)
}

fn local_to_utc(naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_absolute(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return local_to_utc(&naive);
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(start_of_day)
}
