use anyhow::Result;
use checkline_core::analyzer::find_content_fragments;
use checkline_core::service::TaskService;
use checkline_core::vault::Vault;
use owo_colors::OwoColorize;

use crate::cli::ShowCommand;
use crate::util::{document_id, line_index};

pub async fn show_task<V: Vault>(service: &TaskService<V>, command: ShowCommand) -> Result<()> {
    let doc = document_id(&command.doc);
    let line = line_index(command.line)?;
    let raw = service.vault().read_line(&doc, line).await?;
    let task = service.task_at(&doc, line).await?;

    if command.json {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }

    let status = service
        .config()
        .statuses
        .get(task.status)
        .map(|option| option.name.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    println!("{} {}", "Task:".bold(), task.content);
    println!("{} [{}] {}", "Status:".bold(), task.status, status);
    if task.tags().next().is_some() {
        let tags: Vec<&str> = task.tags().map(String::as_str).collect();
        println!("{} {}", "Tags:".bold(), tags.join(" ").cyan());
    }
    for (key, value) in task.properties() {
        println!("{} {}", format!("{}:", key).bold(), value);
    }
    if let Some(anchor) = &task.block_reference {
        println!("{} ^{}", "Block:".bold(), anchor);
    }

    let fragments = find_content_fragments(&raw, &task);
    if fragments.len() > 1 {
        println!(
            "{} text is split into {} fragments; text edits are disabled for this line",
            "Note:".yellow().bold(),
            fragments.len()
        );
    }
    Ok(())
}
