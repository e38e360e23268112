use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DateValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    Day,
    Week,
    Month,
    Year,
}

impl RecurrenceUnit {
    fn parse(word: &str) -> Option<(Self, bool)> {
        match word {
            "day" => Some((RecurrenceUnit::Day, false)),
            "days" => Some((RecurrenceUnit::Day, true)),
            "week" => Some((RecurrenceUnit::Week, false)),
            "weeks" => Some((RecurrenceUnit::Week, true)),
            "month" => Some((RecurrenceUnit::Month, false)),
            "months" => Some((RecurrenceUnit::Month, true)),
            "year" => Some((RecurrenceUnit::Year, false)),
            "years" => Some((RecurrenceUnit::Year, true)),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RecurrenceUnit::Day => "day",
            RecurrenceUnit::Week => "week",
            RecurrenceUnit::Month => "month",
            RecurrenceUnit::Year => "year",
        }
    }
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceRule {
    /// `every day`, `every 3 weeks`, ...
    Interval { unit: RecurrenceUnit, every: u32 },
    /// `every monday`: once a week, on that ISO weekday.
    Weekday(Weekday),
    /// `every weekday`: Monday through Friday.
    BusinessDay,
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceRule::Interval { unit, every: 1 } => write!(f, "every {}", unit.name()),
            RecurrenceRule::Interval { unit, every } => write!(f, "every {} {}s", every, unit.name()),
            RecurrenceRule::Weekday(weekday) => write!(f, "every {}", weekday_name(*weekday)),
            RecurrenceRule::BusinessDay => write!(f, "every weekday"),
        }
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Parse the recurrence grammar:
///
/// - `every day|week|month|year`
/// - `every weekday`
/// - `every <weekday name>`
/// - `every <N> day(s)|week(s)|month(s)|year(s)`
///
/// Matching ignores case and extra whitespace. Anything else is not a
/// recurrence and yields `None`.
pub fn parse_recurrence_pattern(text: &str) -> Option<RecurrenceRule> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    match words.as_slice() {
        ["every", "weekday"] => Some(RecurrenceRule::BusinessDay),
        ["every", word] => match RecurrenceUnit::parse(word) {
            Some((unit, false)) => Some(RecurrenceRule::Interval { unit, every: 1 }),
            Some((_, true)) => None,
            None => word.parse::<Weekday>().ok().map(RecurrenceRule::Weekday),
        },
        ["every", count, word] => {
            let every = count.parse::<u32>().ok().filter(|every| *every > 0)?;
            let (unit, _) = RecurrenceUnit::parse(word)?;
            Some(RecurrenceRule::Interval { unit, every })
        }
        _ => None,
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurrence: '{0}'. Expected e.g. 'every day', 'every 2 weeks', 'every monday' or 'every weekday'")]
pub struct ParseRecurrenceError(String);

impl FromStr for RecurrenceRule {
    type Err = ParseRecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_recurrence_pattern(s).ok_or_else(|| ParseRecurrenceError(s.to_string()))
    }
}

fn advance(anchor: NaiveDateTime, rule: &RecurrenceRule) -> Option<NaiveDateTime> {
    match rule {
        RecurrenceRule::BusinessDay => {
            let mut next = anchor.checked_add_signed(Duration::days(1))?;
            while next.weekday().number_from_monday() > 5 {
                next = next.checked_add_signed(Duration::days(1))?;
            }
            Some(next)
        }
        RecurrenceRule::Weekday(target) => {
            let week_later = anchor.checked_add_signed(Duration::weeks(1))?;
            let shift = target.num_days_from_monday() as i64
                - week_later.weekday().num_days_from_monday() as i64;
            let snapped = week_later.checked_add_signed(Duration::days(shift))?;
            if snapped > anchor {
                Some(snapped)
            } else {
                snapped.checked_add_signed(Duration::weeks(1))
            }
        }
        RecurrenceRule::Interval { unit, every } => match unit {
            RecurrenceUnit::Day => anchor.checked_add_signed(Duration::days(*every as i64)),
            RecurrenceUnit::Week => anchor.checked_add_signed(Duration::weeks(*every as i64)),
            RecurrenceUnit::Month => anchor.checked_add_months(Months::new(*every)),
            RecurrenceUnit::Year => anchor.checked_add_months(Months::new(every.checked_mul(12)?)),
        },
    }
}

/// Computes the occurrence following `anchor`.
///
/// # Behavior
/// - The result has a time of day iff `anchor` does
/// - `every weekday` steps day by day until Monday..=Friday
/// - `every <weekday>` jumps one week, snaps to that weekday within the
///   landing week, and adds another week if that is not after `anchor`
/// - Month and year steps clamp the day to the target month's length
/// - Dates beyond chrono's range leave `anchor` unchanged
pub fn next_occurrence(anchor: DateValue, rule: &RecurrenceRule) -> DateValue {
    match advance(anchor.naive(), rule) {
        Some(next) => anchor.with_naive(next),
        None => anchor,
    }
}

/// String form of [`next_occurrence`]: an unparseable anchor comes back
/// unchanged.
pub fn compute_next_occurrence(anchor: &str, rule: &RecurrenceRule) -> String {
    match DateValue::parse(anchor) {
        Some(value) => next_occurrence(value, rule).to_string(),
        None => anchor.to_string(),
    }
}

/// Successive occurrences after an anchor. Unbounded; callers `take` as
/// many as they want to materialize. Clone it to restart from the anchor.
#[derive(Debug, Clone)]
pub struct Occurrences {
    current: DateValue,
    rule: RecurrenceRule,
}

impl Iterator for Occurrences {
    type Item = DateValue;

    fn next(&mut self) -> Option<Self::Item> {
        let next = next_occurrence(self.current, &self.rule);
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(next)
    }
}

/// The occurrences strictly after `anchor`, in order.
pub fn generate_occurrence_sequence(anchor: DateValue, rule: RecurrenceRule) -> Occurrences {
    Occurrences {
        current: anchor,
        rule,
    }
}
