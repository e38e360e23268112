//! Pure transforms over a single task record: status transitions (which may
//! spawn the next occurrence of a recurring task), date edits and text edits.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::analyzer::{ensure_single_line, find_content_fragments, has_embedded_tags};
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::format::reconstruct_task_line;
use crate::models::{DateValue, TaskRecord};
use crate::parser::parse_task_line;
use crate::recurrence::{next_occurrence, parse_recurrence_pattern};
use crate::status::StatusTable;

/// A record after an edit, and whether anything actually changed.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome<R> {
    pub record: R,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult<R> {
    Single { record: R, changed: bool },
    /// A recurring task was completed; `next` is the new open occurrence the
    /// caller should persist next to `completed`.
    Recurring { completed: R, next: R },
}

impl<R> TransitionResult<R> {
    pub fn record(&self) -> &R {
        match self {
            TransitionResult::Single { record, .. } => record,
            TransitionResult::Recurring { completed, .. } => completed,
        }
    }

    pub fn next(&self) -> Option<&R> {
        match self {
            TransitionResult::Single { .. } => None,
            TransitionResult::Recurring { next, .. } => Some(next),
        }
    }

    pub fn changed(&self) -> bool {
        match self {
            TransitionResult::Single { changed, .. } => *changed,
            TransitionResult::Recurring { .. } => true,
        }
    }
}

fn format_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Move `record` into status `symbol`, maintaining status side-effect
/// properties. Never spawns a next occurrence.
///
/// The previous status's property is removed unless the new status stamps
/// the same property or is flagged `preserve_old_prop`. The new status's
/// property, if any, receives `today`.
pub fn transition_status<R: TaskRecord>(
    record: &R,
    symbol: char,
    today: NaiveDate,
    statuses: &StatusTable,
) -> Result<EditOutcome<R>, CoreError> {
    let target = statuses.get(symbol).ok_or_else(|| {
        let known: Vec<String> = statuses
            .options()
            .iter()
            .map(|option| format!("'{}' ({})", option.symbol, option.name))
            .collect();
        CoreError::Validation(format!(
            "Unknown status '{}'. Known statuses: {}",
            symbol,
            known.join(", ")
        ))
    })?;

    let current = record.status();
    if current == symbol {
        return Ok(EditOutcome {
            record: record.clone(),
            changed: false,
        });
    }

    let mut updated = record.clone();
    if let Some(previous) = statuses.get(current).and_then(|option| option.property.as_deref()) {
        let same_property = target.property.as_deref() == Some(previous);
        if !same_property && !target.preserve_old_prop {
            updated.remove_property(previous);
        }
    }
    updated.set_status(symbol);
    if let Some(property) = &target.property {
        updated.set_property(property, &format_day(today));
    }

    Ok(EditOutcome {
        record: updated,
        changed: true,
    })
}

/// Status transition that also spawns the next occurrence when a recurring
/// task is completed.
///
/// # Behavior
/// - Completion only spawns when the record has a parseable recurrence and
///   a valid due date, and was not already in a completed status
/// - The spawned record is a clone reset to the open status, without any
///   status side-effect properties, with its due date advanced by the rule
/// - A start date moves by the same amount as the due date
pub fn apply_status_transition<R: TaskRecord>(
    record: &R,
    symbol: char,
    today: NaiveDate,
    config: &CoreConfig,
) -> Result<TransitionResult<R>, CoreError> {
    let outcome = transition_status(record, symbol, today, &config.statuses)?;

    let was_completed = config.statuses.is_completed(record.status());
    if !outcome.changed || was_completed || !config.statuses.is_completed(symbol) {
        return Ok(TransitionResult::Single {
            record: outcome.record,
            changed: outcome.changed,
        });
    }

    match spawn_next_occurrence(&outcome.record, config) {
        Some(next) => Ok(TransitionResult::Recurring {
            completed: outcome.record,
            next,
        }),
        None => Ok(TransitionResult::Single {
            record: outcome.record,
            changed: true,
        }),
    }
}

/// The next open occurrence of a recurring record, or `None` when the
/// record has no usable recurrence or due date.
pub fn spawn_next_occurrence<R: TaskRecord>(record: &R, config: &CoreConfig) -> Option<R> {
    let rule = record
        .property(&config.recurrence_key)
        .and_then(|text| parse_recurrence_pattern(&text))?;
    let due = record
        .property(&config.due_key)
        .and_then(|text| DateValue::parse(&text))?;

    let next_due = next_occurrence(due, &rule);
    let delta = next_due.naive() - due.naive();

    let mut next = record.clone();
    next.set_status(config.statuses.incomplete_symbol());
    for property in config.statuses.side_effect_properties() {
        next.remove_property(property);
    }
    next.set_property(&config.due_key, &next_due.to_string());

    if let Some(start_text) = record.property(&config.start_key) {
        match DateValue::parse(&start_text) {
            Some(start) => {
                let shifted = start.with_naive(start.naive() + delta);
                next.set_property(&config.start_key, &shifted.to_string());
            }
            None => warn!(start = %start_text, "Unparseable start date left unchanged on next occurrence"),
        }
    }

    debug!(due = %due, next_due = %next_due, rule = %rule, "Spawned next occurrence");
    Some(next)
}

/// New dates for a record, as wall-clock times in the caller's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateEdit {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub all_day: bool,
    pub was_all_day: bool,
    pub was_multi_day: bool,
}

impl DateEdit {
    /// Derive the previous all-day and multi-day flags from what `record`
    /// currently stores.
    pub fn for_record<R: TaskRecord>(
        record: &R,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        all_day: bool,
        config: &CoreConfig,
    ) -> Self {
        let due = record
            .property(&config.due_key)
            .and_then(|text| DateValue::parse(&text));
        let previous_start = record
            .property(&config.start_key)
            .and_then(|text| DateValue::parse(&text));

        Self {
            start,
            end,
            all_day,
            was_all_day: due.map(|due| !due.has_time()).unwrap_or(true),
            was_multi_day: match (previous_start, due) {
                (Some(start), Some(due)) => start.date() != due.date(),
                _ => false,
            },
        }
    }
}

fn format_edit_value(value: NaiveDateTime, all_day: bool) -> String {
    if all_day {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%dT%H:%M").to_string()
    }
}

/// Write new dates onto `record`, choosing exactly one of four branches:
///
/// 1. switching to all-day without an end: drop the start, write the due date
/// 2. collapsing a multi-day span without an end: same as 1
/// 3. an end is present: write start and due; an all-day end is exclusive,
///    so the stored due date is one day earlier but never before the start
/// 4. otherwise: rewrite only the due date from the new start
pub fn apply_date_edit<R: TaskRecord>(record: &R, edit: &DateEdit, config: &CoreConfig) -> EditOutcome<R> {
    let before = (
        record.property(&config.start_key),
        record.property(&config.due_key),
    );
    let mut updated = record.clone();

    let switching_to_all_day = edit.all_day && !edit.was_all_day && edit.end.is_none();
    let collapsing = edit.was_multi_day && edit.end.is_none();

    if switching_to_all_day || collapsing {
        updated.remove_property(&config.start_key);
        updated.set_property(&config.due_key, &format_edit_value(edit.start, edit.all_day));
    } else if let Some(end) = edit.end {
        let due = if edit.all_day { (end - Duration::days(1)).max(edit.start) } else { end };
        updated.set_property(&config.start_key, &format_edit_value(edit.start, edit.all_day));
        updated.set_property(&config.due_key, &format_edit_value(due, edit.all_day));
    } else {
        updated.set_property(&config.due_key, &format_edit_value(edit.start, edit.all_day));
    }

    let after = (
        updated.property(&config.start_key),
        updated.property(&config.due_key),
    );
    EditOutcome {
        changed: before != after,
        record: updated,
    }
}

/// Replace `original` with `replacement` in the record's content.
///
/// `fragments` are the record's free-text runs (see
/// [`find_content_fragments`]); more than one means the edit cannot be
/// localized and is refused.
pub fn apply_text_edit<R: TaskRecord>(
    record: &R,
    fragments: &[String],
    original: &str,
    replacement: &str,
) -> Result<EditOutcome<R>, CoreError> {
    if fragments.len() > 1 {
        let listed: Vec<String> = fragments.iter().map(|fragment| format!("\"{}\"", fragment)).collect();
        return Err(CoreError::Validation(format!(
            "Task text is split into {} separate fragments ({}); merge them before editing",
            fragments.len(),
            listed.join(", ")
        )));
    }
    ensure_single_line(replacement)?;
    if has_embedded_tags(replacement) {
        return Err(CoreError::Validation(format!(
            "New text \"{}\" has a tag glued to a word; separate tags with a space",
            replacement
        )));
    }

    let content = record.content();
    let new_content = if content == original {
        replacement.to_string()
    } else if !original.is_empty() && content.contains(original) {
        content.replacen(original, replacement, 1)
    } else {
        return Err(CoreError::Validation(format!(
            "Expected task text \"{}\" but found \"{}\"",
            original, content
        )));
    };

    let mut updated = record.clone();
    updated.set_content(&new_content);
    let changed = updated.content() != content;
    Ok(EditOutcome {
        record: updated,
        changed,
    })
}

/// Text edit straight on a checklist line; returns the rewritten line.
pub fn edit_task_line_text(line: &str, original: &str, replacement: &str) -> Result<EditOutcome<String>, CoreError> {
    let task = parse_task_line(line)?;
    let fragments = find_content_fragments(line, &task);
    let outcome = apply_text_edit(&task, &fragments, original, replacement)?;
    let rendered = if outcome.changed {
        reconstruct_task_line(&outcome.record)
    } else {
        line.to_string()
    };
    Ok(EditOutcome {
        changed: rendered != line,
        record: rendered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentTask, Metadata, TaskLine};
    use rstest::rstest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn line(text: &str) -> TaskLine {
        parse_task_line(text).unwrap()
    }

    fn at(text: &str) -> NaiveDateTime {
        DateValue::parse(text).unwrap().naive()
    }

    #[test]
    fn test_completion_stamps_date() {
        let config = CoreConfig::default();
        let result = apply_status_transition(&line("- [ ] Laundry"), 'x', today(), &config).unwrap();
        let task = result.record();
        assert_eq!(task.status, 'x');
        assert_eq!(task.property("completion").as_deref(), Some("2024-03-10"));
        assert!(result.next().is_none());
    }

    #[rstest]
    #[case('x', '-', Some("cancelled"), Some("completion"))]
    #[case('-', 'x', Some("completion"), Some("cancelled"))]
    #[case('x', ' ', None, Some("completion"))]
    #[case('-', '/', None, Some("cancelled"))]
    #[case('>', 'x', Some("completion"), Some("deferred"))]
    fn test_side_effects_are_exclusive(
        #[case] from: char,
        #[case] to: char,
        #[case] stamped: Option<&str>,
        #[case] removed: Option<&str>,
    ) {
        let statuses = StatusTable::default();
        let mut task = line("- [ ] Task");
        task.status = from;
        for property in ["completion", "cancelled", "deferred"] {
            if statuses.get(from).and_then(|o| o.property.as_deref()) == Some(property) {
                task.set_property(property, "2024-01-01");
            }
        }

        let outcome = transition_status(&task, to, today(), &statuses).unwrap();
        assert!(outcome.changed);
        if let Some(stamped) = stamped {
            assert_eq!(outcome.record.property(stamped).as_deref(), Some("2024-03-10"));
        }
        if let Some(removed) = removed {
            assert!(!outcome.record.has_property(removed), "{removed} should be gone");
        }
    }

    #[test]
    fn test_deferring_keeps_completion_date() {
        let statuses = StatusTable::default();
        let task = line("- [x] Report [completion:: 2024-03-01]");
        let outcome = transition_status(&task, '>', today(), &statuses).unwrap();
        assert_eq!(outcome.record.property("completion").as_deref(), Some("2024-03-01"));
        assert_eq!(outcome.record.property("deferred").as_deref(), Some("2024-03-10"));
    }

    #[test]
    fn test_same_status_is_unchanged() {
        let statuses = StatusTable::default();
        let task = line("- [x] Done [completion:: 2024-03-01]");
        let outcome = transition_status(&task, 'x', today(), &statuses).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.record, task);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let statuses = StatusTable::default();
        let error = transition_status(&line("- [ ] Task"), 'q', today(), &statuses).unwrap_err();
        assert!(matches!(error, CoreError::Validation(message) if message.contains("'q'")));
    }

    #[test]
    fn test_completing_recurring_task_spawns_next() {
        let config = CoreConfig::default();
        let task = line("- [ ] Review budget [recurrence:: every week] [due:: 2024-03-04]");

        let result = apply_status_transition(&task, 'x', today(), &config).unwrap();
        let TransitionResult::Recurring { completed, next } = result else {
            panic!("expected a recurring completion");
        };

        assert_eq!(completed.status, 'x');
        assert_eq!(completed.property("completion").as_deref(), Some("2024-03-10"));
        assert_eq!(completed.property("due").as_deref(), Some("2024-03-04"));
        assert_eq!(completed.content, "Review budget");

        assert_eq!(next.status, ' ');
        assert_eq!(next.property("due").as_deref(), Some("2024-03-11"));
        assert_eq!(next.property("recurrence").as_deref(), Some("every week"));
        for property in ["completion", "cancelled", "deferred"] {
            assert!(!next.has_property(property));
        }
    }

    #[test]
    fn test_next_occurrence_keeps_span() {
        let config = CoreConfig::default();
        let task = line("- [ ] Trip [start:: 2024-03-01T08:00] [due:: 2024-03-03] [recurrence:: every month]");
        let result = apply_status_transition(&task, 'x', today(), &config).unwrap();
        let next = result.next().unwrap();
        assert_eq!(next.property("due").as_deref(), Some("2024-04-03"));
        assert_eq!(next.property("start").as_deref(), Some("2024-04-01T08:00"));
    }

    #[test]
    fn test_unparseable_start_is_left_alone() {
        let config = CoreConfig::default();
        let task = line("- [ ] Gym [start:: soon] [due:: 2024-03-04] [recurrence:: every day]");
        let result = apply_status_transition(&task, 'x', today(), &config).unwrap();
        let next = result.next().unwrap();
        assert_eq!(next.property("start").as_deref(), Some("soon"));
        assert_eq!(next.property("due").as_deref(), Some("2024-03-05"));
    }

    #[test]
    fn test_recurring_task_without_due_does_not_spawn() {
        let config = CoreConfig::default();
        let task = line("- [ ] Stretch [recurrence:: every day]");
        let result = apply_status_transition(&task, 'x', today(), &config).unwrap();
        assert!(result.next().is_none());
        assert!(result.changed());
    }

    #[test]
    fn test_recompleting_does_not_spawn_twice() {
        let config = CoreConfig::default();
        let task = line("- [x] Review [recurrence:: every week] [due:: 2024-03-04]");
        let result = apply_status_transition(&task, 'X', today(), &config).unwrap();
        assert!(result.next().is_none());
    }

    #[test]
    fn test_document_task_completion_spawns_next() {
        let config = CoreConfig::default();
        let mut metadata = Metadata::new();
        metadata.set_str("title", "Water plants");
        metadata.set_str("due", "2024-03-04T18:00");
        metadata.set_str("recurrence", "every weekday");
        let task = DocumentTask::new(metadata, &config);

        let result = apply_status_transition(&task, 'x', today(), &config).unwrap();
        let next = result.next().unwrap();
        assert_eq!(next.status(), ' ');
        assert_eq!(next.property("due").as_deref(), Some("2024-03-05T18:00"));
    }

    #[test]
    fn test_date_edit_switch_to_all_day() {
        let config = CoreConfig::default();
        let task = line("- [ ] Call [start:: 2024-03-04T09:00] [due:: 2024-03-04T10:00]");
        let edit = DateEdit {
            start: at("2024-03-05"),
            end: None,
            all_day: true,
            was_all_day: false,
            was_multi_day: false,
        };
        let outcome = apply_date_edit(&task, &edit, &config);
        assert!(outcome.changed);
        assert!(!outcome.record.has_property("start"));
        assert_eq!(outcome.record.property("due").as_deref(), Some("2024-03-05"));
    }

    #[test]
    fn test_date_edit_collapses_multi_day() {
        let config = CoreConfig::default();
        let task = line("- [ ] Trip [start:: 2024-03-01] [due:: 2024-03-03]");
        let edit = DateEdit::for_record(&task, at("2024-03-08"), None, true, &config);
        assert!(edit.was_multi_day);
        let outcome = apply_date_edit(&task, &edit, &config);
        assert!(!outcome.record.has_property("start"));
        assert_eq!(outcome.record.property("due").as_deref(), Some("2024-03-08"));
    }

    #[test]
    fn test_date_edit_all_day_end_is_exclusive() {
        let config = CoreConfig::default();
        let task = line("- [ ] Trip [due:: 2024-03-01]");
        let edit = DateEdit::for_record(&task, at("2024-03-01"), Some(at("2024-03-04")), true, &config);
        let outcome = apply_date_edit(&task, &edit, &config);
        assert_eq!(outcome.record.property("start").as_deref(), Some("2024-03-01"));
        assert_eq!(outcome.record.property("due").as_deref(), Some("2024-03-03"));
    }

    #[test]
    fn test_date_edit_single_all_day_keeps_due_on_start() {
        let config = CoreConfig::default();
        let task = line("- [ ] Trip [due:: 2024-03-01]");
        let edit = DateEdit::for_record(&task, at("2024-03-04"), Some(at("2024-03-04")), true, &config);
        let outcome = apply_date_edit(&task, &edit, &config);
        assert_eq!(outcome.record.property("start").as_deref(), Some("2024-03-04"));
        assert_eq!(outcome.record.property("due").as_deref(), Some("2024-03-04"));
    }

    #[test]
    fn test_date_edit_timed_range() {
        let config = CoreConfig::default();
        let task = line("- [ ] Meeting [due:: 2024-03-01T09:00]");
        let edit = DateEdit::for_record(
            &task,
            at("2024-03-02T13:00"),
            Some(at("2024-03-02T14:30")),
            false,
            &config,
        );
        let outcome = apply_date_edit(&task, &edit, &config);
        assert_eq!(outcome.record.property("start").as_deref(), Some("2024-03-02T13:00"));
        assert_eq!(outcome.record.property("due").as_deref(), Some("2024-03-02T14:30"));
    }

    #[test]
    fn test_date_edit_moves_due_only() {
        let config = CoreConfig::default();
        let task = line("- [ ] Dentist [due:: 2024-03-01T09:00]");
        let edit = DateEdit::for_record(&task, at("2024-03-07T11:15"), None, false, &config);
        let outcome = apply_date_edit(&task, &edit, &config);
        assert_eq!(outcome.record.property("due").as_deref(), Some("2024-03-07T11:15"));
        assert!(!outcome.record.has_property("start"));

        let again = apply_date_edit(&outcome.record, &edit, &config);
        assert!(!again.changed);
    }

    #[test]
    fn test_text_edit_replaces_whole_or_part() {
        let task = line("- [ ] Buy milk #shop");
        let whole = apply_text_edit(&task, &["Buy milk".to_string()], "Buy milk", "Buy oat milk").unwrap();
        assert_eq!(whole.record.content, "Buy oat milk");

        let part = apply_text_edit(&task, &["Buy milk".to_string()], "milk", "bread").unwrap();
        assert_eq!(part.record.content, "Buy bread");
        assert_eq!(part.record.tags_after, vec!["#shop"]);
    }

    #[test]
    fn test_text_edit_on_empty_content() {
        let task = line("- [ ] #shop");
        let outcome = apply_text_edit(&task, &[], "", "Buy milk").unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.record.content, "Buy milk");
    }

    #[test]
    fn test_text_edit_rejects_mismatch_and_hazards() {
        let task = line("- [ ] Buy milk");
        let mismatch = apply_text_edit(&task, &[], "Sell milk", "x").unwrap_err();
        assert!(matches!(mismatch, CoreError::Validation(m) if m.contains("Sell milk") && m.contains("Buy milk")));

        let glued = apply_text_edit(&task, &[], "Buy milk", "Buy#milk").unwrap_err();
        assert!(matches!(glued, CoreError::Validation(_)));

        let empty_original = apply_text_edit(&task, &[], "", "x").unwrap_err();
        assert!(matches!(empty_original, CoreError::Validation(_)));

        let multiline = edit_task_line_text("- [ ] Buy milk", "milk", "milk\n- [x] injected").unwrap_err();
        assert!(matches!(multiline, CoreError::Validation(m) if m.contains("line breaks")));
    }

    #[test]
    fn test_split_content_edit_is_rejected() {
        let error = edit_task_line_text("- [ ] Water plants #home feed cat", "Water plants", "Water roses")
            .unwrap_err();
        let CoreError::Validation(message) = error else {
            panic!("expected validation error");
        };
        assert!(message.contains("\"Water plants\""));
        assert!(message.contains("\"feed cat\""));
    }

    #[test]
    fn test_line_text_edit_reconstructs() {
        let outcome = edit_task_line_text("\t- [ ] Buy milk [due:: 2024-01-01]", "milk", "eggs").unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.record, "\t- [ ] Buy eggs [due:: 2024-01-01]");
    }
}
