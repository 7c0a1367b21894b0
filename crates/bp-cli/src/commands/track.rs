//! Recording commands: start, stop, pause, resume and adjust.

use std::io::Write;

use anyhow::{Context, Result};
use bp_core::{StartOutcome, TimeLedger};
use bp_db::Database;
use chrono::{DateTime, Utc};

use super::util::{format_hms, parse_optional_datetime, project_label, resolve_project};

pub fn start<W: Write>(
    writer: &mut W,
    ledger: &mut TimeLedger<Database>,
    project: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let project = resolve_project(ledger.store(), project)?;
    if !project.active {
        anyhow::bail!(
            "Project {} ({}) is archived; run 'bp projects unarchive {}' first",
            project.name,
            project.id,
            project.id
        );
    }

    match ledger
        .start_at(&project.id, now)
        .context("failed to start tracking")?
    {
        StartOutcome::AlreadyRunning => {
            writeln!(writer, "Already tracking {} ({})", project.name, project.id)?;
        }
        StartOutcome::Started { switched_from } => {
            if let Some(stopped) = switched_from {
                let label = project_label(ledger.store(), &stopped.project_id)?;
                writeln!(writer, "Stopped {label} after {}", format_hms(stopped.elapsed))?;
            }
            writeln!(writer, "Started {} ({})", project.name, project.id)?;
        }
    }
    Ok(())
}

pub fn stop<W: Write>(
    writer: &mut W,
    ledger: &mut TimeLedger<Database>,
    now: DateTime<Utc>,
) -> Result<()> {
    match ledger
        .stop_at(now, false)
        .context("failed to stop tracking")?
    {
        Some(stopped) => {
            let label = project_label(ledger.store(), &stopped.project_id)?;
            writeln!(writer, "Stopped {label} after {}", format_hms(stopped.elapsed))?;
        }
        None => writeln!(writer, "Nothing is being tracked.")?,
    }
    Ok(())
}

pub fn pause<W: Write>(
    writer: &mut W,
    ledger: &mut TimeLedger<Database>,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(project_id) = ledger.current_project().cloned() else {
        writeln!(writer, "Nothing is being tracked.")?;
        return Ok(());
    };

    ledger.pause_at(now).context("failed to pause")?;
    let label = project_label(ledger.store(), &project_id)?;
    writeln!(writer, "Paused {label}. Run 'bp resume' to continue.")?;
    Ok(())
}

pub fn resume<W: Write>(
    writer: &mut W,
    ledger: &mut TimeLedger<Database>,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(resumed) = ledger.resume_at(now).context("failed to resume")? else {
        writeln!(writer, "Nothing is paused.")?;
        return Ok(());
    };

    let label = project_label(ledger.store(), &resumed.project_id)?;
    write!(
        writer,
        "Resumed {label} after a {} pause",
        format_hms(resumed.paused_for)
    )?;
    if resumed.deducted_minutes == 0 {
        writeln!(writer)?;
    } else {
        writeln!(writer, " ({} min deducted)", -resumed.deducted_minutes)?;
    }
    Ok(())
}

pub fn adjust<W: Write>(
    writer: &mut W,
    ledger: &mut TimeLedger<Database>,
    project: &str,
    minutes: i64,
    description: Option<String>,
    at: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let project = resolve_project(ledger.store(), project)?;
    let at = parse_optional_datetime(at, now)?.unwrap_or(now);

    ledger
        .add_adjustment_at(&project.id, minutes, description, at)
        .context("failed to record adjustment")?;
    writeln!(
        writer,
        "Adjusted {} ({}) by {minutes:+} min",
        project.name, project.id
    )?;
    Ok(())
}
