use anyhow::{anyhow, Result};
use checkline_core::models::DateValue;
use checkline_core::status::StatusTable;
use chrono::{NaiveDate, Timelike, Utc};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;

fn mentions_time(input: &str) -> bool {
    let lower = input.to_lowercase();
    lower.contains(':')
        || lower.split_whitespace().any(|word| {
            word == "noon"
                || word == "midnight"
                || ((word.ends_with("am") || word.ends_with("pm"))
                    && word.starts_with(|c: char| c.is_ascii_digit()))
        })
}

/// Parse a date typed by the user. ISO forms are taken as written;
/// anything else goes through natural-language parsing relative to now in
/// `tz`. Inputs that never mention a time of day are all-day dates.
pub fn parse_date_input(input: &str, tz: Tz) -> Result<DateValue> {
    if let Some(value) = DateValue::parse(input) {
        return Ok(value);
    }

    let now = Utc::now().with_timezone(&tz);
    let parsed = parse_date_string(input, now, Dialect::Us)
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))?;
    let local = parsed.naive_local();

    if mentions_time(input) {
        let minutes = local.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(local);
        Ok(DateValue::DateTime(minutes))
    } else {
        Ok(DateValue::Date(local.date()))
    }
}

/// A threshold date for `--after` options.
pub fn parse_day(input: &str, tz: Tz) -> Result<NaiveDate> {
    parse_date_input(input, tz).map(|value| value.date())
}

/// Accept a status symbol, or the name of a status in the table.
pub fn parse_status(input: &str, statuses: &StatusTable) -> Result<char> {
    let mut chars = input.chars();
    if let (Some(symbol), None) = (chars.next(), chars.next()) {
        return Ok(symbol);
    }

    let wanted = input.trim().to_lowercase();
    statuses
        .options()
        .iter()
        .find(|option| option.name.to_lowercase() == wanted)
        .map(|option| option.symbol)
        .ok_or_else(|| {
            let names: Vec<String> = statuses
                .options()
                .iter()
                .map(|option| format!("'{}' ({})", option.symbol, option.name))
                .collect();
            anyhow!("Unknown status '{}'. Use one of: {}", input, names.join(", "))
        })
}
