use checkline_core::error::CoreError;
use checkline_core::service::TaskService;
use checkline_core::vault::FsVault;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;
mod parser;
mod timezone;
mod util;
mod views;

fn init_tracing() {
    // Opt-in via RUST_LOG; stdout stays reserved for command output.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = cli::Cli::parse();

    let mut config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable configuration");
            config::Config::default()
        }
    };
    if let Some(vault) = cli.vault {
        config.vault = PathBuf::from(vault);
    }

    let tz = match config.tz() {
        Ok(tz) => tz,
        Err(e) => {
            handle_error(e);
            std::process::exit(1);
        }
    };
    let service = TaskService::new(FsVault::new(&config.vault), config.core, tz);

    let result = match cli.command {
        cli::Commands::List(command) => commands::list::list_tasks(&service, command).await,
        cli::Commands::Show(command) => commands::show::show_task(&service, command).await,
        cli::Commands::Add(command) => commands::add::add_task(&service, command).await,
        cli::Commands::Do(command) => commands::status::do_task(&service, command).await,
        cli::Commands::Status(command) => commands::status::set_status(&service, command).await,
        cli::Commands::Toggle(command) => commands::status::toggle_task(&service, command).await,
        cli::Commands::Edit(command) => commands::edit::edit_task(&service, command).await,
        cli::Commands::Reschedule(command) => {
            commands::edit::reschedule_task(&service, command).await
        }
        cli::Commands::Recur(command) => commands::recurrence::preview(&service, command),
        cli::Commands::Series(command) => {
            commands::series::series_command(&service, command).await
        }
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    match err.downcast_ref::<CoreError>() {
        Some(CoreError::NotFound(s)) => {
            eprintln!("{} {} not found", "Error:".style(error_style), s);
        }
        Some(CoreError::Parse(line)) => {
            eprintln!(
                "{} Not a task line: {}",
                "Error:".style(error_style),
                line.yellow()
            );
        }
        Some(CoreError::Validation(s)) => {
            eprintln!("{} {}", "Error:".style(error_style), s);
        }
        Some(CoreError::AlreadyExists(path)) => {
            eprintln!(
                "{} '{}' already exists",
                "Error:".style(error_style),
                path.display().yellow()
            );
        }
        Some(CoreError::GroupApply(failure)) => {
            eprintln!(
                "{} Series update stopped partway: {}",
                "Error:".style(error_style),
                failure.source
            );
            eprintln!(
                "{} of {} documents were already written; re-run the command to finish.",
                failure.applied.yellow(),
                failure.total
            );
        }
        _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
    }
}
