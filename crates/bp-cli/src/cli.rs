//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Event-sourced project time tracker.
///
/// Records starts, stops and manual corrections to an append-only log and
/// rebuilds every total from it.
#[derive(Debug, Parser)]
#[command(name = "bp", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start tracking a project, stopping whatever is running.
    Start {
        /// Project id (e.g., p1) or name.
        project: String,
    },

    /// Stop the running project.
    Stop,

    /// Auto-pause the running project until `resume`.
    Pause,

    /// Resume the auto-paused project, deducting the pause.
    Resume,

    /// Add or remove minutes from a project.
    Adjust {
        /// Project id (e.g., p1) or name.
        project: String,

        /// Signed minutes (e.g., 30 or -15).
        #[arg(allow_hyphen_values = true)]
        minutes: i64,

        /// Why the correction was made.
        #[arg(short, long)]
        description: Option<String>,

        /// When the correction applies (ISO 8601 or relative, e.g., '2 hours ago').
        #[arg(long)]
        at: Option<String>,
    },

    /// Show what is running and today's totals.
    Status,

    /// Per-project totals for a period.
    Report {
        #[command(flatten)]
        period: PeriodArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Output as comma-separated values.
        #[arg(long, conflicts_with = "json")]
        csv: bool,
    },

    /// Day-by-day totals for a period.
    Daily {
        #[command(flatten)]
        period: PeriodArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Output as comma-separated values.
        #[arg(long, conflicts_with = "json")]
        csv: bool,
    },

    /// Dump raw events as JSON lines.
    Events {
        /// Only events at or after this time (ISO 8601 or relative).
        #[arg(long)]
        after: Option<String>,

        /// Only events at or before this time (ISO 8601 or relative).
        #[arg(long)]
        before: Option<String>,

        /// Only events for this project (id or name).
        #[arg(long)]
        project: Option<String>,
    },

    /// Manage projects.
    #[command(subcommand)]
    Projects(ProjectsAction),

    /// Watch for inactivity and auto-pause.
    ///
    /// Every line read from stdin counts as user activity. Exits at end of input.
    Watch,
}

/// Period selection shared by `report` and `daily`.
#[derive(Debug, Clone, Default, Args)]
pub struct PeriodArgs {
    /// Today.
    #[arg(long, group = "period")]
    pub day: bool,

    /// This week, Monday to Sunday (default).
    #[arg(long, group = "period")]
    pub week: bool,

    /// Last week.
    #[arg(long, group = "period")]
    pub last_week: bool,

    /// Start of a custom range (ISO 8601 or relative).
    #[arg(long, requires = "to", conflicts_with = "period")]
    pub from: Option<String>,

    /// End of a custom range (ISO 8601 or relative).
    #[arg(long, requires = "from", conflicts_with = "period")]
    pub to: Option<String>,
}

/// Project management actions.
#[derive(Debug, Subcommand)]
pub enum ProjectsAction {
    /// List projects.
    List {
        /// Include archived projects.
        #[arg(long)]
        all: bool,
    },

    /// Add a project.
    Add {
        /// Display name.
        name: String,
    },

    /// Rename a project.
    Rename {
        /// Project id or current name.
        project: String,

        /// New display name.
        name: String,
    },

    /// Hide a project from listings, keeping its history.
    Archive {
        /// Project id or name.
        project: String,
    },

    /// Restore an archived project.
    Unarchive {
        /// Project id or name.
        project: String,
    },
}
