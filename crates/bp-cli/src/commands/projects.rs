//! Projects command: list, add, rename and archive projects.

use std::io::Write;

use anyhow::{Context, Result};
use bp_db::Database;

use super::util::resolve_project;

/// Lists projects in display order, marking archived ones.
pub fn list<W: Write>(writer: &mut W, db: &Database, include_archived: bool) -> Result<()> {
    let projects = db.list_projects(include_archived)?;
    if projects.is_empty() {
        writeln!(writer, "No projects yet. Add one with 'bp projects add <name>'.")?;
        return Ok(());
    }

    let width = projects
        .iter()
        .map(|p| p.id.as_str().len())
        .max()
        .unwrap_or(0);
    for project in projects {
        if project.active {
            writeln!(writer, "{:<width$}  {}", project.id, project.name)?;
        } else {
            writeln!(writer, "{:<width$}  {} (archived)", project.id, project.name)?;
        }
    }
    Ok(())
}

pub fn add<W: Write>(writer: &mut W, db: &mut Database, name: &str) -> Result<()> {
    let project = db.add_project(name).context("failed to add project")?;
    writeln!(writer, "Added {} ({})", project.name, project.id)?;
    Ok(())
}

pub fn rename<W: Write>(writer: &mut W, db: &mut Database, project: &str, name: &str) -> Result<()> {
    let project = resolve_project(db, project)?;
    db.rename_project(&project.id, name)
        .context("failed to rename project")?;
    writeln!(
        writer,
        "Renamed {} ({}) to {}",
        project.name,
        project.id,
        name.trim()
    )?;
    Ok(())
}

/// Archives or restores a project. History is kept either way.
pub fn set_active<W: Write>(
    writer: &mut W,
    db: &mut Database,
    project: &str,
    active: bool,
) -> Result<()> {
    let project = resolve_project(db, project)?;
    db.set_project_active(&project.id, active)
        .context("failed to update project")?;
    let verb = if active { "Unarchived" } else { "Archived" };
    writeln!(writer, "{verb} {} ({})", project.name, project.id)?;
    Ok(())
}
