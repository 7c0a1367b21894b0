//! Shared utilities for CLI commands.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use bp_core::ProjectId;
use bp_db::{Database, Project};
use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either ISO 8601 or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    // Try ISO 8601 first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try relative time: "N hours/minutes/days/weeks ago"
    let Some(caps) = RELATIVE_TIME_RE.captures(s.trim()) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    let duration = Duration::minutes(n * minutes_per_unit);
    Ok(now - duration)
}

/// Parses an optional datetime argument.
pub fn parse_optional_datetime(
    s: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_datetime(s, now)).transpose()
}

// ========== Project Lookup ==========

/// Finds a project by id (`p3`) or by case-insensitive name.
pub fn resolve_project(db: &Database, query: &str) -> Result<Project> {
    if let Ok(id) = ProjectId::new(query.trim()) {
        if let Some(project) = db.project(&id)? {
            return Ok(project);
        }
    }

    let wanted = query.trim().to_lowercase();
    let mut matches = db
        .list_projects(true)?
        .into_iter()
        .filter(|project| project.name.to_lowercase() == wanted);
    match (matches.next(), matches.next()) {
        (Some(project), None) => Ok(project),
        (Some(_), Some(_)) => {
            anyhow::bail!("Several projects are named '{query}'; use the project id")
        }
        (None, _) => anyhow::bail!(
            "No project '{query}'. Run 'bp projects list' to see ids, or 'bp projects add'"
        ),
    }
}

/// Display name for a project id, falling back to the id itself.
pub fn project_label(db: &Database, id: &ProjectId) -> Result<String> {
    Ok(db
        .project(id)?
        .map_or_else(|| id.to_string(), |project| project.name))
}

// ========== Duration Formatting ==========

fn sign(duration: Duration) -> &'static str {
    if duration < Duration::zero() { "-" } else { "" }
}

/// Formats as `HH:MM:SS`, with a leading `-` when negative.
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.num_seconds().abs();
    format!(
        "{}{:02}:{:02}:{:02}",
        sign(duration),
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Formats as `HH:MM`, with a leading `-` when negative.
pub fn format_hm(duration: Duration) -> String {
    let minutes = duration.num_minutes().abs();
    format!("{}{:02}:{:02}", sign(duration), minutes / 60, minutes % 60)
}

/// Formats as "Xh Ym" when at least an hour, otherwise "Xm".
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().abs();
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{}{hours}h {minutes}m", sign(duration))
    } else {
        format!("{}{minutes}m", sign(duration))
    }
}

// ========== Output Formats ==========

/// How `report` and `daily` render their data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl OutputFormat {
    /// Picks the format from the mutually exclusive `--json`/`--csv` flags.
    pub const fn from_flags(json: bool, csv: bool) -> Self {
        if json {
            Self::Json
        } else if csv {
            Self::Csv
        } else {
            Self::Text
        }
    }
}

/// Quotes a CSV field when it contains a delimiter, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Joins fields into one CSV record, without the line terminator.
pub fn csv_record<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|field| csv_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

// ========== Write Lock ==========

/// Path of the advisory lock file guarding `database_path`.
pub fn lock_path(database_path: &Path) -> PathBuf {
    let mut path = OsString::from(database_path.as_os_str());
    path.push(".lock");
    PathBuf::from(path)
}

/// Holds the single-writer lock until dropped.
#[derive(Debug)]
pub struct WriteLock {
    file: File,
}

impl WriteLock {
    /// Blocks until this process is the only writer of `database_path`.
    pub fn acquire(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            fs::create_dir_all(parent).context("failed to create database directory")?;
        }
        let file = File::create(lock_path(database_path)).context("failed to create lock file")?;
        file.lock_exclusive().context("failed to acquire lock")?;
        tracing::debug!(path = %database_path.display(), "acquired write lock");
        Ok(Self { file })
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        // Closing the file releases the lock as well.
        let _ = FileExt::unlock(&self.file);
    }
}
