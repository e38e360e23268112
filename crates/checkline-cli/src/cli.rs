use clap::{Parser, Subcommand};

/// Manage markdown checklist tasks and recurring series from the command line
#[derive(Parser, Debug)]
#[command(name = "checkline", author, version, about, long_about = None)]
pub struct Cli {
    /// Vault directory (overrides configuration)
    #[arg(long, global = true)]
    pub vault: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the tasks in a document
    List(ListCommand),
    /// Show the parsed form of one task line
    Show(ShowCommand),
    /// Append a task to a document
    Add(AddCommand),
    /// Mark a task line, or a document task, as completed
    Do(DoCommand),
    /// Set the status symbol of a task line
    Status(StatusCommand),
    /// Advance a task line to the next status
    Toggle(LineCommand),
    /// Replace text in a task line
    Edit(EditCommand),
    /// Move a task line to new dates
    Reschedule(RescheduleCommand),
    /// Preview the occurrences of a recurrence rule
    Recur(RecurCommand),
    /// Manage recurring series stored as documents
    Series(SeriesCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Document path, relative to the vault
    pub doc: String,
}

#[derive(Parser, Debug, Clone)]
pub struct LineCommand {
    /// Document path, relative to the vault
    pub doc: String,
    /// Line number (1-based)
    pub line: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    pub doc: String,
    pub line: usize,
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    pub doc: String,
    /// Task text; `#tags` and `[key:: value]` annotations are recognized
    pub text: String,
    /// Due date, e.g. '2024-03-04', 'tomorrow', 'next friday 14:00'
    #[arg(short, long)]
    pub due: Option<String>,
    /// Recurrence rule, e.g. 'every week', 'every 2 days', 'every monday'
    #[arg(short, long)]
    pub every: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct DoCommand {
    pub doc: String,
    /// Line number (1-based). Without it the document itself is the task.
    pub line: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct StatusCommand {
    pub doc: String,
    pub line: usize,
    /// Status symbol (' ', '/', 'x', '-', '>', '!', '?') or its name
    pub status: String,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    pub doc: String,
    pub line: usize,
    /// Text currently in the task
    #[arg(long)]
    pub from: String,
    /// Replacement text
    #[arg(long)]
    pub to: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RescheduleCommand {
    pub doc: String,
    pub line: usize,
    /// New start, e.g. '2024-03-04T09:00' or 'tomorrow 9am'
    pub start: String,
    /// Optional end
    #[arg(long)]
    pub end: Option<String>,
    /// Store dates without a time of day
    #[arg(long)]
    pub all_day: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RecurCommand {
    /// Recurrence rule, e.g. 'every 2 weeks'
    pub rule: String,
    /// First date of the series (defaults to today)
    #[arg(long)]
    pub from: Option<String>,
    /// Number of occurrences to show
    #[arg(long, default_value_t = 5)]
    pub count: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct SeriesCommand {
    #[command(subcommand)]
    pub command: SeriesSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SeriesSubcommand {
    /// Create a series: a parent document plus pre-created occurrences
    Create(SeriesCreateCommand),
    /// Set the status of every occurrence
    Status(SeriesStatusCommand),
    /// Retitle the series
    Text(SeriesTextCommand),
    /// Move the series to new dates or a new rule
    Reschedule(SeriesRescheduleCommand),
    /// Delete the series' occurrences and strip the parent
    Delete(SeriesDeleteCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct SeriesCreateCommand {
    pub title: String,
    /// Recurrence rule
    #[arg(long)]
    pub every: String,
    /// First occurrence (defaults to today)
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,
    #[arg(long)]
    pub all_day: bool,
    /// Directory inside the vault
    #[arg(long, default_value = ".")]
    pub dir: String,
    /// Number of occurrences to pre-create
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct SeriesStatusCommand {
    /// Recurrence id, or the path of any document in the series
    pub series: String,
    pub status: String,
    /// Only occurrences strictly after this date
    #[arg(long)]
    pub after: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SeriesTextCommand {
    pub series: String,
    pub text: String,
}

#[derive(Parser, Debug, Clone)]
pub struct SeriesRescheduleCommand {
    pub series: String,
    pub start: String,
    #[arg(long)]
    pub end: Option<String>,
    #[arg(long)]
    pub all_day: bool,
    /// New recurrence rule
    #[arg(long)]
    pub every: Option<String>,
    /// Only occurrences strictly after this date
    #[arg(long)]
    pub after: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SeriesDeleteCommand {
    pub series: String,
    /// Only occurrences strictly after this date
    #[arg(long)]
    pub after: Option<String>,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}
