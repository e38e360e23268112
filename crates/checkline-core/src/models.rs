use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::config::CoreConfig;

/// Inline `[key:: value]` annotations in the order they were written.
pub type PropertyMap = IndexMap<String, String>;

/// One checklist line, split into the parts the rest of the crate edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLine {
    /// Exact indentation, preserved verbatim on reconstruction.
    pub indent: String,
    /// `-`, `*`, `+` or an ordinal such as `3.`.
    pub marker: String,
    pub status: char,
    pub tags_before: Vec<String>,
    pub tags_after: Vec<String>,
    pub properties_before: PropertyMap,
    pub properties_after: PropertyMap,
    pub content: String,
    /// Trailing `^anchor`, stored without the caret.
    pub block_reference: Option<String>,
}

impl TaskLine {
    /// A fresh open task with the given text and no annotations.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            indent: String::new(),
            marker: "-".to_string(),
            status: ' ',
            tags_before: Vec::new(),
            tags_after: Vec::new(),
            properties_before: PropertyMap::new(),
            properties_after: PropertyMap::new(),
            content: content.into(),
            block_reference: None,
        }
    }

    pub fn tags(&self) -> impl Iterator<Item = &String> {
        self.tags_before.iter().chain(self.tags_after.iter())
    }

    pub fn properties(&self) -> impl Iterator<Item = (&String, &String)> {
        self.properties_before.iter().chain(self.properties_after.iter())
    }
}

/// A task record the mutation and group layers can edit without knowing
/// whether it lives on a checklist line or in a document's metadata block.
pub trait TaskRecord: Clone + PartialEq {
    fn status(&self) -> char;
    fn set_status(&mut self, symbol: char);
    fn property(&self, key: &str) -> Option<String>;
    fn set_property(&mut self, key: &str, value: &str);
    /// Returns whether the property was present.
    fn remove_property(&mut self, key: &str) -> bool;
    fn content(&self) -> &str;
    fn set_content(&mut self, content: &str);

    /// Drop every task-specific field: status side effects, dates and
    /// recurrence. What remains is the record's plain content.
    fn strip_task(&mut self, config: &CoreConfig);

    fn has_property(&self, key: &str) -> bool {
        self.property(key).is_some()
    }

    /// Start date when present, else due date.
    fn occurrence_date(&self, config: &CoreConfig) -> Option<DateValue> {
        self.property(&config.start_key)
            .and_then(|value| DateValue::parse(&value))
            .or_else(|| {
                self.property(&config.due_key)
                    .and_then(|value| DateValue::parse(&value))
            })
    }
}

fn task_keys(config: &CoreConfig) -> Vec<&str> {
    let mut keys = vec![
        config.start_key.as_str(),
        config.due_key.as_str(),
        config.recurrence_key.as_str(),
        config.recurrence_id_key.as_str(),
    ];
    keys.extend(config.statuses.side_effect_properties());
    keys
}

impl TaskRecord for TaskLine {
    fn status(&self) -> char {
        self.status
    }

    fn set_status(&mut self, symbol: char) {
        self.status = symbol;
    }

    fn property(&self, key: &str) -> Option<String> {
        self.properties_before
            .get(key)
            .or_else(|| self.properties_after.get(key))
            .cloned()
    }

    fn set_property(&mut self, key: &str, value: &str) {
        if let Some(existing) = self.properties_before.get_mut(key) {
            *existing = value.to_string();
        } else {
            self.properties_after.insert(key.to_string(), value.to_string());
        }
    }

    fn remove_property(&mut self, key: &str) -> bool {
        let before = self.properties_before.shift_remove(key).is_some();
        let after = self.properties_after.shift_remove(key).is_some();
        before || after
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn set_content(&mut self, content: &str) {
        self.content = content.trim().to_string();
    }

    /// A checklist line cannot stop being one, so the checkbox is reset to
    /// the open status instead of removed.
    fn strip_task(&mut self, config: &CoreConfig) {
        for key in task_keys(config) {
            self.remove_property(key);
        }
        self.status = config.statuses.incomplete_symbol();
    }
}

/* ------------------------------ Metadata ------------------------------ */

/// A document's key/value header block. Backed by an ordered YAML mapping
/// so values the core does not understand survive a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Mapping);

impl Metadata {
    pub fn new() -> Self {
        Self(Mapping::new())
    }

    pub fn from_mapping(mapping: Mapping) -> Self {
        Self(mapping)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn into_mapping(self) -> Mapping {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Borrow a value only when it is stored as a YAML string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Any scalar value rendered as text.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        self.0
            .insert(Value::String(key.to_string()), Value::String(value.to_string()));
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.0.remove(key).is_some()
    }
}

/// A task stored as a whole document: status, title and dates all live in
/// the metadata block.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTask {
    pub metadata: Metadata,
    status_key: String,
    title_key: String,
}

impl DocumentTask {
    pub fn new(metadata: Metadata, config: &CoreConfig) -> Self {
        Self {
            metadata,
            status_key: config.status_key.clone(),
            title_key: config.title_key.clone(),
        }
    }

    pub fn into_metadata(self) -> Metadata {
        self.metadata
    }
}

impl TaskRecord for DocumentTask {
    fn status(&self) -> char {
        self.metadata
            .get_str(&self.status_key)
            .and_then(|value| value.chars().next())
            .unwrap_or(' ')
    }

    fn set_status(&mut self, symbol: char) {
        self.metadata.set_str(&self.status_key, &symbol.to_string());
    }

    fn property(&self, key: &str) -> Option<String> {
        self.metadata.get_string(key)
    }

    fn set_property(&mut self, key: &str, value: &str) {
        self.metadata.set_str(key, value);
    }

    fn remove_property(&mut self, key: &str) -> bool {
        self.metadata.remove(key)
    }

    fn content(&self) -> &str {
        self.metadata.get_str(&self.title_key).unwrap_or("")
    }

    fn set_content(&mut self, content: &str) {
        self.metadata.set_str(&self.title_key, content.trim());
    }

    fn strip_task(&mut self, config: &CoreConfig) {
        for key in task_keys(config) {
            self.metadata.remove(key);
        }
        self.metadata.remove(&self.status_key);
    }
}

/* ------------------------------ Dates ------------------------------ */

/// A stored date that may or may not carry a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateValue {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

impl DateValue {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            return Some(DateValue::Date(date));
        }
        for format in DATETIME_FORMATS {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(input, format) {
                return Some(DateValue::DateTime(datetime));
            }
        }
        DateTime::parse_from_rfc3339(input)
            .ok()
            .map(|datetime| DateValue::DateTime(datetime.naive_local()))
    }

    pub fn has_time(&self) -> bool {
        matches!(self, DateValue::DateTime(_))
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            DateValue::Date(date) => *date,
            DateValue::DateTime(datetime) => datetime.date(),
        }
    }

    /// Date-only values sit at midnight.
    pub fn naive(&self) -> NaiveDateTime {
        match self {
            DateValue::Date(date) => date.and_time(NaiveTime::MIN),
            DateValue::DateTime(datetime) => *datetime,
        }
    }

    /// Rebuild a value from `datetime` with the same precision as `self`.
    pub fn with_naive(&self, datetime: NaiveDateTime) -> Self {
        match self {
            DateValue::Date(_) => DateValue::Date(datetime.date()),
            DateValue::DateTime(_) => DateValue::DateTime(datetime),
        }
    }

    pub fn from_naive(datetime: NaiveDateTime, all_day: bool) -> Self {
        if all_day {
            DateValue::Date(datetime.date())
        } else {
            DateValue::DateTime(datetime)
        }
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            DateValue::DateTime(datetime) if datetime.second() != 0 => {
                write!(f, "{}", datetime.format("%Y-%m-%dT%H:%M:%S"))
            }
            DateValue::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%dT%H:%M")),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Invalid date: {0}")]
pub struct ParseDateValueError(String);

impl FromStr for DateValue {
    type Err = ParseDateValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateValue::parse(s).ok_or_else(|| ParseDateValueError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_value_parse_and_format() {
        let date = DateValue::parse("2024-03-04").unwrap();
        assert!(!date.has_time());
        assert_eq!(date.to_string(), "2024-03-04");

        let timed = DateValue::parse("2024-03-04T09:30").unwrap();
        assert!(timed.has_time());
        assert_eq!(timed.to_string(), "2024-03-04T09:30");

        let spaced = DateValue::parse("2024-03-04 09:30:15").unwrap();
        assert_eq!(spaced.to_string(), "2024-03-04T09:30:15");

        assert!(DateValue::parse("next tuesday").is_none());
        assert!("2024-13-01".parse::<DateValue>().is_err());
    }

    #[test]
    fn test_task_line_properties_stay_in_one_map() {
        let mut task = TaskLine::new("Water plants");
        task.properties_before.insert("due".to_string(), "2024-01-01".to_string());

        task.set_property("due", "2024-02-01");
        task.set_property("completion", "2024-01-15");

        assert_eq!(task.properties_before.get("due").unwrap(), "2024-02-01");
        assert!(!task.properties_after.contains_key("due"));
        assert_eq!(task.property("completion").as_deref(), Some("2024-01-15"));

        assert!(task.remove_property("due"));
        assert!(!task.remove_property("due"));
    }

    #[test]
    fn test_document_task_reads_metadata() {
        let config = CoreConfig::default();
        let mut metadata = Metadata::new();
        metadata.set_str("title", "Pay rent");
        metadata.set_str("status", "x");
        metadata
            .0
            .insert(Value::String("priority".to_string()), Value::Number(3.into()));

        let mut task = DocumentTask::new(metadata, &config);
        assert_eq!(task.status(), 'x');
        assert_eq!(task.content(), "Pay rent");
        assert_eq!(task.property("priority").as_deref(), Some("3"));

        task.set_property("due", "2024-05-01");
        task.strip_task(&config);
        assert!(!task.metadata.contains_key("status"));
        assert!(!task.metadata.contains_key("due"));
        assert!(task.metadata.contains_key("priority"));
    }
}
