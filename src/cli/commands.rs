use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "td", about = concat!("taskdeck v", env!("CARGO_PKG_VERSION"), " - a small task list with undo"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different data directory
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a task to the top of the list
    Add(AddArgs),
    /// List tasks through the current view (default command)
    List(ListArgs),
    /// Show or change the saved view settings
    View(ViewArgs),
    /// Show one task
    Show(IdArg),
    /// Toggle a task between pending and completed
    Done(IdArg),
    /// Change a task's text, priority, category or due date
    Edit(EditArgs),
    /// Delete a task (undoable for a short window)
    Rm(IdArg),
    /// Restore the most recently deleted task
    Undo,
    /// Move a task to where another task sits
    Mv(MvArgs),
    /// Remove completed tasks, or everything with --all
    Clear(ClearArgs),
    /// Show completion counts
    Stats,
    /// Show counts per category and priority
    Categories,
    /// Show the current completion streak
    Streak,
    /// Show productivity insights
    Insights,
    /// Show completions per day
    History(HistoryArgs),
    /// Write all tasks as JSON
    Export(ExportArgs),
    /// Merge tasks from an export file
    Import(ImportArgs),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Task args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct IdArg {
    /// Task ID
    pub id: String,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task text
    pub text: String,
    /// Priority (high, medium, low)
    #[arg(short, long)]
    pub priority: Option<String>,
    /// Category (work, personal, shopping, health, learning, other)
    #[arg(short, long)]
    pub category: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(short, long)]
    pub due: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID
    pub id: String,
    /// New text
    #[arg(long)]
    pub text: Option<String>,
    /// New priority
    #[arg(short, long)]
    pub priority: Option<String>,
    /// New category
    #[arg(short, long)]
    pub category: Option<String>,
    /// New due date (YYYY-MM-DD)
    #[arg(short, long, conflicts_with = "no_due")]
    pub due: Option<String>,
    /// Remove the due date
    #[arg(long)]
    pub no_due: bool,
}

#[derive(Args)]
pub struct MvArgs {
    /// Task to move
    pub dragged: String,
    /// Task whose position it takes
    pub target: String,
}

#[derive(Args)]
pub struct ClearArgs {
    /// Remove every task, not just completed ones (cannot be undone)
    #[arg(long)]
    pub all: bool,
}

// ---------------------------------------------------------------------------
// View args
// ---------------------------------------------------------------------------

// One-off view overrides; nothing is saved.
#[derive(Args, Default)]
pub struct ListArgs {
    /// Status filter (all, pending, completed)
    #[arg(short, long)]
    pub filter: Option<String>,
    /// Sort key (dateAdded, dueDate, priority, name, manual)
    #[arg(short, long)]
    pub sort: Option<String>,
    /// Case-insensitive search over text and category
    #[arg(short = 'q', long)]
    pub search: Option<String>,
}

// Saved view settings, applied to every later `list`.
#[derive(Args)]
pub struct ViewArgs {
    /// Status filter (all, pending, completed)
    #[arg(short, long)]
    pub filter: Option<String>,
    /// Sort key (dateAdded, dueDate, priority, name, manual)
    #[arg(short, long)]
    pub sort: Option<String>,
    /// Search query
    #[arg(short = 'q', long, conflicts_with = "clear_search")]
    pub search: Option<String>,
    /// Clear the saved search query
    #[arg(long)]
    pub clear_search: bool,
    /// Restore the configured defaults
    #[arg(long, conflicts_with_all = ["filter", "sort", "search", "clear_search"])]
    pub reset: bool,
}

// ---------------------------------------------------------------------------
// Analytics args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct HistoryArgs {
    /// Number of days ending today
    #[arg(long, default_value_t = 7)]
    pub days: u32,
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ExportArgs {
    /// Output file (default: stdout)
    pub file: Option<String>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Export file to merge ("-" for stdin)
    pub file: String,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the absolute path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
