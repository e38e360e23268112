use anyhow::Result;
use checkline_core::service::TaskService;
use checkline_core::vault::Vault;
use chrono::{Days, NaiveDateTime};
use chrono_tz::Tz;

use crate::cli::{EditCommand, RescheduleCommand};
use crate::parser::parse_date_input;
use crate::util::{document_id, line_index};

pub async fn edit_task<V: Vault>(service: &TaskService<V>, command: EditCommand) -> Result<()> {
    let doc = document_id(&command.doc);
    let update = service
        .edit_line_text(&doc, line_index(command.line)?, &command.from, &command.to)
        .await?;

    if update.changed {
        println!("Updated line {}: {}", update.line + 1, update.text);
    } else {
        println!("Line {} unchanged.", update.line + 1);
    }
    Ok(())
}

/// Start, end and all-day flag as the vault stores them. An end typed
/// for an all-day range names its last day, while the stored end is
/// exclusive, so it moves one day forward.
pub fn resolve_range(
    start: &str,
    end: Option<&str>,
    all_day: bool,
    tz: Tz,
) -> Result<(NaiveDateTime, Option<NaiveDateTime>, bool)> {
    let start = parse_date_input(start, tz)?;
    let all_day = all_day || !start.has_time();
    let end = match end {
        Some(input) => {
            let end = parse_date_input(input, tz)?.naive();
            if all_day {
                Some(end.checked_add_days(Days::new(1)).unwrap_or(end))
            } else {
                Some(end)
            }
        }
        None => None,
    };
    Ok((start.naive(), end, all_day))
}

pub async fn reschedule_task<V: Vault>(service: &TaskService<V>, command: RescheduleCommand) -> Result<()> {
    let doc = document_id(&command.doc);
    let (start, end, all_day) = resolve_range(
        &command.start,
        command.end.as_deref(),
        command.all_day,
        service.timezone(),
    )?;

    let update = service
        .edit_line_dates(&doc, line_index(command.line)?, start, end, all_day)
        .await?;
    if update.changed {
        println!("Rescheduled line {}: {}", update.line + 1, update.text);
    } else {
        println!("Line {} already has these dates.", update.line + 1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_day_end_is_inclusive_on_the_command_line() {
        let tz: Tz = "UTC".parse().unwrap();
        let (start, end, all_day) = resolve_range("2024-03-04", Some("2024-03-06"), false, tz).unwrap();
        assert!(all_day);
        assert_eq!(start.to_string(), "2024-03-04 00:00:00");
        assert_eq!(end.unwrap().to_string(), "2024-03-07 00:00:00");
    }

    #[test]
    fn test_timed_range_is_kept() {
        let tz: Tz = "UTC".parse().unwrap();
        let (start, end, all_day) =
            resolve_range("2024-03-04T09:00", Some("2024-03-04T10:30"), false, tz).unwrap();
        assert!(!all_day);
        assert_eq!(start.to_string(), "2024-03-04 09:00:00");
        assert_eq!(end.unwrap().to_string(), "2024-03-04 10:30:00");
    }
}
