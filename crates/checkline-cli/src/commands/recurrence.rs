use anyhow::{anyhow, Result};
use checkline_core::error::CoreError;
use checkline_core::models::DateValue;
use checkline_core::recurrence::{generate_occurrence_sequence, parse_recurrence_pattern};
use checkline_core::service::TaskService;
use checkline_core::vault::Vault;

use crate::cli::RecurCommand;
use crate::parser::parse_date_input;
use crate::views::table::display_occurrences;

/// Print the first `count` occurrences of a rule, starting with the anchor.
pub fn preview<V: Vault>(service: &TaskService<V>, command: RecurCommand) -> Result<()> {
    let rule = parse_recurrence_pattern(&command.rule).ok_or_else(|| {
        anyhow!(CoreError::Validation(format!(
            "Unrecognized recurrence rule \"{}\"",
            command.rule
        )))
    })?;
    let anchor = match command.from.as_deref() {
        Some(input) => parse_date_input(input, service.timezone())?,
        None => DateValue::Date(service.today()),
    };

    let occurrences: Vec<DateValue> = std::iter::once(anchor)
        .chain(generate_occurrence_sequence(anchor, rule))
        .take(command.count)
        .collect();
    display_occurrences(&rule.to_string(), &occurrences);
    Ok(())
}
