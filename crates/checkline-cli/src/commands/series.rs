use anyhow::Result;
use checkline_core::group::ScheduleUpdate;
use checkline_core::service::{SeriesRequest, TaskService};
use checkline_core::vault::Vault;
use chrono::NaiveDate;
use dialoguer::Confirm;
use owo_colors::OwoColorize;
use std::path::Path;

use crate::cli::{
    SeriesCommand, SeriesCreateCommand, SeriesDeleteCommand, SeriesRescheduleCommand, SeriesStatusCommand,
    SeriesSubcommand, SeriesTextCommand,
};
use crate::commands::edit::resolve_range;
use crate::parser::{parse_day, parse_status};
use crate::util::resolve_series;
use crate::views::table::display_group_report;

pub async fn series_command<V: Vault>(service: &TaskService<V>, command: SeriesCommand) -> Result<()> {
    match command.command {
        SeriesSubcommand::Create(command) => create_series(service, command).await,
        SeriesSubcommand::Status(command) => set_series_status(service, command).await,
        SeriesSubcommand::Text(command) => retitle_series(service, command).await,
        SeriesSubcommand::Reschedule(command) => reschedule_series(service, command).await,
        SeriesSubcommand::Delete(command) => delete_series(service, command).await,
    }
}

fn threshold<V: Vault>(service: &TaskService<V>, after: Option<&str>) -> Result<Option<NaiveDate>> {
    after.map(|input| parse_day(input, service.timezone())).transpose()
}

async fn create_series<V: Vault>(service: &TaskService<V>, command: SeriesCreateCommand) -> Result<()> {
    let start = command.start.unwrap_or_else(|| service.today().to_string());
    let (start, end, all_day) = resolve_range(
        &start,
        command.end.as_deref(),
        command.all_day,
        service.timezone(),
    )?;

    let request = SeriesRequest {
        title: command.title,
        rule: command.every,
        start,
        end,
        all_day,
        child_count: command.count,
    };
    let created = service.create_series(Path::new(&command.dir), request).await?;

    println!(
        "{} {} ({})",
        "Created series".green().bold(),
        created.parent,
        created.recurrence_id.dimmed()
    );
    for child in &created.children {
        println!("  {}", child);
    }
    Ok(())
}

async fn set_series_status<V: Vault>(service: &TaskService<V>, command: SeriesStatusCommand) -> Result<()> {
    let (recurrence_id, origin) = resolve_series(service, &command.series).await?;
    let symbol = parse_status(&command.status, &service.config().statuses)?;
    let after = threshold(service, command.after.as_deref())?;

    let report = service
        .group_set_status(&recurrence_id, origin.as_ref(), symbol, after)
        .await?;
    display_group_report(&report);
    Ok(())
}

async fn retitle_series<V: Vault>(service: &TaskService<V>, command: SeriesTextCommand) -> Result<()> {
    let (recurrence_id, origin) = resolve_series(service, &command.series).await?;
    let report = service
        .group_update_text(&recurrence_id, origin.as_ref(), &command.text)
        .await?;
    display_group_report(&report);
    Ok(())
}

async fn reschedule_series<V: Vault>(service: &TaskService<V>, command: SeriesRescheduleCommand) -> Result<()> {
    let (recurrence_id, origin) = resolve_series(service, &command.series).await?;
    let (start, end, all_day) = resolve_range(
        &command.start,
        command.end.as_deref(),
        command.all_day,
        service.timezone(),
    )?;
    let after = threshold(service, command.after.as_deref())?;

    let update = ScheduleUpdate {
        start,
        end,
        all_day,
        rule: command.every,
    };
    let report = service
        .group_update_schedule(&recurrence_id, origin.as_ref(), &update, after)
        .await?;
    display_group_report(&report);
    Ok(())
}

async fn delete_series<V: Vault>(service: &TaskService<V>, command: SeriesDeleteCommand) -> Result<()> {
    let (recurrence_id, origin) = resolve_series(service, &command.series).await?;
    let after = threshold(service, command.after.as_deref())?;

    if !command.force {
        let group = service.load_group(&recurrence_id, origin.as_ref()).await?;
        let scope = match after {
            Some(date) => format!("occurrences after {}", date),
            None => format!("all {} occurrences", group.children.len()),
        };
        let confirmation = Confirm::new()
            .with_prompt(format!(
                "Delete {} of '{}'? The parent keeps its text but loses its schedule.",
                scope, group.parent.id
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    let report = service
        .group_delete(&recurrence_id, origin.as_ref(), after)
        .await?;
    display_group_report(&report);
    Ok(())
}
