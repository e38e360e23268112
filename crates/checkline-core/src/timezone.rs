use crate::error::CoreError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Validate IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<(), CoreError> {
    parse_timezone(timezone).map(|_| ())
}

pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone).map_err(|_| CoreError::InvalidTimezone(format!("Invalid timezone: {}", timezone)))
}

/// Wall-clock time of `instant` in `tz`
pub fn local_naive(instant: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

/// The calendar day status stamps use
pub fn local_today(tz: Tz) -> NaiveDate {
    local_naive(Utc::now(), tz).date()
}

/// Resolve a wall-clock time in `tz` to an instant.
///
/// Ambiguous times (fall back) take the earlier instant. Times skipped by a
/// spring-forward gap move one hour later.
pub fn from_local(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, CoreError> {
    if let Some(local) = tz.from_local_datetime(&naive).earliest() {
        return Ok(local.with_timezone(&Utc));
    }
    tz.from_local_datetime(&(naive + Duration::hours(1)))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| CoreError::InvalidTimezone(format!("{} does not exist in {}", naive, tz.name())))
}
