use checkline_core::models::DateValue;
use checkline_core::service::GroupReport;
use checkline_core::status::{StatusKind, StatusTable};
use chrono::NaiveDate;
use comfy_table::{Attribute, Cell, Color, Row, Table};

#[derive(Debug, Clone)]
pub struct ViewTask {
    /// 1-based, as shown to the user
    pub line: usize,
    pub status: char,
    pub content: String,
    pub tags: Vec<String>,
    pub due: Option<String>,
    pub recurrence: Option<String>,
}

fn status_kind(statuses: &StatusTable, symbol: char) -> Option<StatusKind> {
    statuses.get(symbol).map(|option| option.kind)
}

pub fn display_tasks(tasks: &[ViewTask], statuses: &StatusTable, today: NaiveDate) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Line", "Status", "Task", "Due", "Tags"]);

    for task in tasks {
        let kind = status_kind(statuses, task.status);
        let closed = matches!(kind, Some(StatusKind::Completed | StatusKind::Cancelled));

        let mut row = Row::new();
        row.add_cell(Cell::new(task.line));

        let label = statuses
            .get(task.status)
            .map(|option| option.name.clone())
            .unwrap_or_else(|| format!("[{}]", task.status));
        let status_cell = match kind {
            Some(StatusKind::Completed) => Cell::new(label).fg(Color::Green),
            Some(StatusKind::Cancelled) => Cell::new(label).fg(Color::DarkGrey),
            Some(StatusKind::InProgress) => Cell::new(label).fg(Color::Cyan),
            Some(StatusKind::Important) => Cell::new(label).fg(Color::Red),
            _ => Cell::new(label),
        };
        row.add_cell(status_cell);

        let mut name = String::new();
        if task.recurrence.is_some() {
            name.push_str("↻ ");
        }
        name.push_str(&task.content);
        let name_cell = if closed {
            Cell::new(name).add_attribute(Attribute::CrossedOut).fg(Color::DarkGrey)
        } else {
            Cell::new(name)
        };
        row.add_cell(name_cell);

        let due_cell = match &task.due {
            Some(due) => {
                let text = match &task.recurrence {
                    Some(rule) => format!("{} ({})", due, rule),
                    None => due.clone(),
                };
                match DateValue::parse(due).map(|value| value.date()) {
                    Some(date) if !closed && date < today => Cell::new(text).fg(Color::Red),
                    Some(date) if !closed && date == today => Cell::new(text).fg(Color::Yellow),
                    _ => Cell::new(text),
                }
            }
            None => Cell::new("-"),
        };
        row.add_cell(due_cell);

        row.add_cell(Cell::new(if task.tags.is_empty() {
            "-".to_string()
        } else {
            task.tags.join(", ")
        }));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_occurrences(rule: &str, occurrences: &[DateValue]) {
    let mut table = Table::new();
    table.set_header(vec!["#", rule]);
    for (index, occurrence) in occurrences.iter().enumerate() {
        table.add_row(vec![Cell::new(index + 1), Cell::new(occurrence.to_string())]);
    }
    println!("{table}");
}

pub fn display_group_report(report: &GroupReport) {
    if report.updated.is_empty() && report.removed.is_empty() {
        println!("Nothing to change.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Document", "Change"]);
    for doc in &report.updated {
        let renamed = report
            .renamed
            .iter()
            .find(|(from, _)| from == doc)
            .map(|(_, to)| format!("updated, renamed to {}", to));
        table.add_row(vec![
            Cell::new(doc.to_string()),
            Cell::new(renamed.unwrap_or_else(|| "updated".to_string())),
        ]);
    }
    for doc in &report.removed {
        table.add_row(vec![
            Cell::new(doc.to_string()),
            Cell::new("moved to trash").fg(Color::DarkGrey),
        ]);
    }
    println!("{table}");
}
