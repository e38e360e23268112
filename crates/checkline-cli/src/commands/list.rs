use anyhow::Result;
use checkline_core::models::TaskRecord;
use checkline_core::service::TaskService;
use checkline_core::vault::Vault;

use crate::cli::ListCommand;
use crate::util::document_id;
use crate::views::table::{display_tasks, ViewTask};

pub async fn list_tasks<V: Vault>(service: &TaskService<V>, command: ListCommand) -> Result<()> {
    let doc = document_id(&command.doc);
    let config = service.config();

    let tasks: Vec<ViewTask> = service
        .list_tasks(&doc)
        .await?
        .into_iter()
        .map(|listed| ViewTask {
            line: listed.line + 1,
            status: listed.task.status,
            tags: listed.task.tags().cloned().collect(),
            due: listed.task.property(&config.due_key),
            recurrence: listed.task.property(&config.recurrence_key),
            content: listed.task.content,
        })
        .collect();

    display_tasks(&tasks, &config.statuses, service.today());
    Ok(())
}
