use anyhow::Result;
use checkline_core::service::TaskService;
use checkline_core::vault::Vault;

use crate::cli::AddCommand;
use crate::parser::parse_date_input;
use crate::util::document_id;

pub async fn add_task<V: Vault>(service: &TaskService<V>, command: AddCommand) -> Result<()> {
    let doc = document_id(&command.doc);
    let due = command
        .due
        .as_deref()
        .map(|input| parse_date_input(input, service.timezone()))
        .transpose()?;

    let update = service
        .append_task(&doc, &command.text, due, command.every.as_deref())
        .await?;
    println!("Added task on line {}: {}", update.line + 1, update.text);
    Ok(())
}
