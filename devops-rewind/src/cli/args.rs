//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// devops-rewind - record, replay, rewind and branch terminal sessions
#[derive(Parser, Debug)]
#[command(name = "devops-rewind")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Session database to use instead of the configured one
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
///
/// Every SESSION argument accepts a full id, a name, or a unique id prefix.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a new session interactively
    Record {
        /// Session name (defaults to session-YYYYMMDD-HHMMSS)
        name: Option<String>,

        /// Shell used to run commands
        #[arg(long)]
        shell: Option<String>,
    },

    /// List recorded sessions, newest first
    List {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: ListFormat,
    },

    /// Show a single step with its output
    Show {
        session: String,
        step: usize,
    },

    /// Replay a session with its original timing
    Replay {
        session: String,

        /// Playback speed multiplier (2.0 = twice as fast)
        #[arg(long, default_value = "1.0")]
        speed: f64,

        /// Wait for Enter between steps
        #[arg(long = "step")]
        step_mode: bool,

        /// First step to play
        #[arg(long = "from", default_value = "0")]
        from_step: usize,

        /// Last step to play (defaults to the final step)
        #[arg(long = "to")]
        to_step: Option<usize>,

        /// Stop at the first step that hits a stored breakpoint
        #[arg(long = "break")]
        stop_on_breakpoint: bool,
    },

    /// Show the state of a session right after a given step
    Rewind {
        session: String,

        #[arg(allow_negative_numbers = true)]
        step: i64,

        /// Branch from this step and keep recording in the branch
        #[arg(long = "exec")]
        re_exec: bool,
    },

    /// Fork a session at a step into a new branch session
    Branch {
        session: String,

        #[arg(allow_negative_numbers = true)]
        step: i64,

        /// Name for the branch (defaults to <name>-branch-<step>)
        #[arg(long)]
        name: Option<String>,

        /// Start recording in the new branch
        #[arg(long = "exec")]
        re_exec: bool,
    },

    /// Show the branch ancestry of a session
    Lineage {
        session: String,
    },

    /// Compare two sessions step by step
    Diff {
        session_a: String,
        session_b: String,

        /// First step position to compare
        #[arg(long = "from", default_value = "0")]
        from_step: usize,
    },

    /// Manage breakpoints
    #[command(subcommand)]
    Breakpoint(BreakpointCommands),

    /// Delete a session with its steps and breakpoints
    Delete {
        session: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Export a session to stdout
    Export {
        session: String,

        #[arg(long, value_enum, default_value = "sh")]
        format: ExportFormat,
    },

    /// Import a session from a JSON export
    Import {
        file: PathBuf,
    },

    /// Show the version
    Version,
}

/// Breakpoint subcommands.
#[derive(Subcommand, Debug)]
pub enum BreakpointCommands {
    /// Add a breakpoint (at least one condition is required)
    Add {
        session: String,

        /// Trigger at this step number
        step: Option<usize>,

        /// Trigger when this regex matches the command
        #[arg(long)]
        pattern: Option<String>,

        /// Trigger on any non-zero exit code
        #[arg(long)]
        on_error: bool,
    },

    /// List breakpoints of a session
    List {
        session: String,
    },

    /// Remove a breakpoint by id
    Remove {
        session: String,
        id: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Sh,
    Markdown,
    Json,
}
