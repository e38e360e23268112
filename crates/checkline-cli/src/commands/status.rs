use anyhow::Result;
use checkline_core::service::{LineUpdate, TaskService};
use checkline_core::vault::Vault;
use owo_colors::OwoColorize;

use crate::cli::{DoCommand, LineCommand, StatusCommand};
use crate::parser::parse_status;
use crate::util::{document_id, line_index};

fn report_line(update: &LineUpdate) {
    if !update.changed {
        println!("Line {} already up to date.", update.line + 1);
        return;
    }
    println!("{} {}", format!("Line {}:", update.line + 1).bold(), update.text);
    if let Some((line, text)) = &update.next {
        println!(
            "{} {}",
            format!("Next occurrence on line {}:", line + 1).green().bold(),
            text
        );
    }
}

/// Complete a task line, or the document's own task when no line is given.
pub async fn do_task<V: Vault>(service: &TaskService<V>, command: DoCommand) -> Result<()> {
    let doc = document_id(&command.doc);
    let symbol = service.config().statuses.completed_symbol();

    match command.line {
        Some(line) => {
            let update = service.set_line_status(&doc, line_index(line)?, symbol).await?;
            report_line(&update);
        }
        None => {
            let update = service.set_document_status(&doc, symbol).await?;
            if update.changed {
                println!("Completed {}", doc);
            } else {
                println!("{} is already completed.", doc);
            }
            if let Some(next) = update.next {
                println!("{} {}", "Created next occurrence:".green().bold(), next);
            }
        }
    }
    Ok(())
}

pub async fn set_status<V: Vault>(service: &TaskService<V>, command: StatusCommand) -> Result<()> {
    let doc = document_id(&command.doc);
    let symbol = parse_status(&command.status, &service.config().statuses)?;
    let update = service.set_line_status(&doc, line_index(command.line)?, symbol).await?;
    report_line(&update);
    Ok(())
}

pub async fn toggle_task<V: Vault>(service: &TaskService<V>, command: LineCommand) -> Result<()> {
    let doc = document_id(&command.doc);
    let update = service.toggle_line(&doc, line_index(command.line)?).await?;
    report_line(&update);
    Ok(())
}
