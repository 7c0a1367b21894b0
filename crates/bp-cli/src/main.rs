use std::io;

use anyhow::{Context, Result};
use bp_core::TimeLedger;
use bp_db::Database;
use chrono::{Local, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bp_cli::commands::report::Period;
use bp_cli::commands::util::{OutputFormat, WriteLock};
use bp_cli::commands::watch::LockedLedger;
use bp_cli::commands::{daily, events, projects, report, status, track, watch};
use bp_cli::{Cli, Commands, Config, ProjectsAction};

/// Open the database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path).context("failed to open database")
}

/// Open the database and replay the event log.
fn open_ledger(config: &Config) -> Result<TimeLedger<Database>> {
    TimeLedger::recover(open_database(config)?).context("failed to replay event log")
}

/// Whether the command appends to the log or edits projects.
const fn writes(command: &Commands) -> bool {
    match command {
        Commands::Start { .. }
        | Commands::Stop
        | Commands::Pause
        | Commands::Resume
        | Commands::Adjust { .. } => true,
        Commands::Projects(action) => !matches!(action, ProjectsAction::List { .. }),
        Commands::Status
        | Commands::Report { .. }
        | Commands::Daily { .. }
        | Commands::Events { .. }
        | Commands::Watch => false,
    }
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    // Held until the command finishes; the ledger is replayed under it so
    // its live state cannot go stale before the append.
    let _lock = if writes(command) {
        Some(WriteLock::acquire(&config.database_path)?)
    } else {
        None
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let now = Utc::now();

    match command {
        Commands::Start { project } => {
            let mut ledger = open_ledger(&config)?;
            track::start(&mut out, &mut ledger, project, now)?;
        }
        Commands::Stop => {
            let mut ledger = open_ledger(&config)?;
            track::stop(&mut out, &mut ledger, now)?;
        }
        Commands::Pause => {
            let mut ledger = open_ledger(&config)?;
            track::pause(&mut out, &mut ledger, now)?;
        }
        Commands::Resume => {
            let mut ledger = open_ledger(&config)?;
            track::resume(&mut out, &mut ledger, now)?;
        }
        Commands::Adjust {
            project,
            minutes,
            description,
            at,
        } => {
            let mut ledger = open_ledger(&config)?;
            track::adjust(
                &mut out,
                &mut ledger,
                project,
                *minutes,
                description.clone(),
                at.as_deref(),
                now,
            )?;
        }
        Commands::Status => {
            let ledger = open_ledger(&config)?;
            status::run(&mut out, &ledger, &Local, now)?;
        }
        Commands::Report { period, json, csv } => {
            let ledger = open_ledger(&config)?;
            let period = Period::from_args(period, now)?;
            let format = OutputFormat::from_flags(*json, *csv);
            report::run(&mut out, &ledger, period, format, &Local, now)?;
        }
        Commands::Daily { period, json, csv } => {
            let ledger = open_ledger(&config)?;
            let period = Period::from_args(period, now)?;
            let format = OutputFormat::from_flags(*json, *csv);
            daily::run(&mut out, &ledger, period, format, &Local, now)?;
        }
        Commands::Events {
            after,
            before,
            project,
        } => {
            let ledger = open_ledger(&config)?;
            events::run(
                &mut out,
                &ledger,
                after.as_deref(),
                before.as_deref(),
                project.as_deref(),
                now,
            )?;
        }
        Commands::Projects(action) => {
            let mut db = open_database(&config)?;
            match action {
                ProjectsAction::List { all } => projects::list(&mut out, &db, *all)?,
                ProjectsAction::Add { name } => projects::add(&mut out, &mut db, name)?,
                ProjectsAction::Rename { project, name } => {
                    projects::rename(&mut out, &mut db, project, name)?;
                }
                ProjectsAction::Archive { project } => {
                    projects::set_active(&mut out, &mut db, project, false)?;
                }
                ProjectsAction::Unarchive { project } => {
                    projects::set_active(&mut out, &mut db, project, true)?;
                }
            }
        }
        Commands::Watch => {
            // Create the schema before the first idle transition needs it.
            drop(open_database(&config)?);
            drop(out);
            let access = LockedLedger::new(config.database_path.clone());
            watch::run(
                &mut io::stderr(),
                io::stdin().lock(),
                config.idle_config(),
                access,
            )?;
        }
    }

    Ok(())
}
