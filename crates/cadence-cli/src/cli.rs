use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Expand, validate, edit and diff RFC 5545 recurrence sets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Additional configuration file merged over cadence.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the occurrences of a recurrence set
    Expand(ExpandCommand),
    /// Show the next occurrences after a point in time
    Next(NextCommand),
    /// Check that DTSTART is the first instance of its set
    Validate(ValidateCommand),
    /// Classify the change between two recurrence definitions
    Diff(DiffCommand),
    /// Add or remove dates and change the end of a recurrence set
    Edit(EditCommand),
}

/// Shared input arguments for commands that read one recurrence file
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// File holding DTSTART/RRULE/RDATE/EXDATE lines, or '-' for stdin
    pub file: String,

    /// Timezone for floating date-times (defaults to the configured zone)
    #[arg(long)]
    pub timezone: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ExpandCommand {
    #[command(flatten)]
    pub input: InputArgs,
    /// Only occurrences on or after this date (e.g., '2025-01-01', 'next monday')
    #[arg(long)]
    pub after: Option<String>,
    /// Only occurrences on or before this date
    #[arg(long)]
    pub before: Option<String>,
    /// Maximum number of occurrences to list (capped by max_occurrences)
    #[arg(long, short)]
    pub limit: Option<usize>,
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct NextCommand {
    #[command(flatten)]
    pub input: InputArgs,
    /// Reference point (defaults to now)
    #[arg(long)]
    pub after: Option<String>,
    /// Number of occurrences to show
    #[arg(short = 'n', long = "count")]
    pub count: Option<usize>,
    /// Count DTSTART itself as the first instance
    #[arg(long)]
    pub include_dtstart: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateCommand {
    #[command(flatten)]
    pub input: InputArgs,
    /// Evaluate as if no EXDATEs existed
    #[arg(long)]
    pub ignore_exdate: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DiffCommand {
    /// The definition occurrences were generated from
    pub old: String,
    /// The edited definition
    pub new: String,
    /// Timezone for floating date-times (defaults to the configured zone)
    #[arg(long)]
    pub timezone: Option<String>,
    /// Print JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(long, num_args = 1..)]
    pub add_rdate: Vec<String>,
    #[arg(long, num_args = 1..)]
    pub remove_rdate: Vec<String>,
    #[arg(long, num_args = 1..)]
    pub add_exdate: Vec<String>,
    #[arg(long, num_args = 1..)]
    pub remove_exdate: Vec<String>,

    /// New end of the rule (clears COUNT)
    #[arg(long, conflicts_with = "count")]
    pub until: Option<String>,
    /// New number of occurrences (clears UNTIL)
    #[arg(long)]
    pub count: Option<u32>,

    /// Write the result back to the file instead of printing it
    #[arg(long, short)]
    pub write: bool,
}
