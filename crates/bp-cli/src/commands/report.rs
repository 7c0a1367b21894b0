//! Report command for per-project totals.
//!
//! This module implements `bp report` with various period options
//! (--day, --week, --last-week, --from/--to) and output formats
//! (human-readable, JSON, CSV). The period types are shared with `bp daily`.

use std::fmt::Write;

use anyhow::Result;
use bp_core::calendar::{days_range, local_date};
use bp_core::{OrphanedSession, ProjectRef, ProjectSummary, ProjectTotalJson, TimeLedger};
use bp_db::Database;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use super::util::{
    OutputFormat, csv_record, format_duration, format_hm, parse_datetime, project_label,
};
use crate::cli::PeriodArgs;

/// Report period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    LastWeek,
    Range {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl Period {
    /// Resolves command-line flags; `--week` is the default.
    pub fn from_args(args: &PeriodArgs, now: DateTime<Utc>) -> Result<Self> {
        if let (Some(from), Some(to)) = (&args.from, &args.to) {
            return Ok(Self::Range {
                from: parse_datetime(from, now)?,
                to: parse_datetime(to, now)?,
            });
        }
        Ok(if args.day {
            Self::Day
        } else if args.last_week {
            Self::LastWeek
        } else {
            Self::Week
        })
    }
}

/// A period resolved against a time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub period: Period,
    /// First local day touched by the period.
    pub first_day: NaiveDate,
    /// Last local day touched by the period.
    pub last_day: NaiveDate,
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Inclusive end.
    pub end: DateTime<Utc>,
}

// ========== Period Date Calculation ==========

fn monday_of(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

/// Resolves `period` to local days and inclusive UTC bounds.
pub fn period_bounds<Tz: TimeZone>(period: Period, now: DateTime<Utc>, tz: &Tz) -> Result<Bounds> {
    let today = local_date(now, tz);
    let (first_day, last_day) = match period {
        Period::Day => (today, today),
        Period::Week => {
            let monday = monday_of(today);
            (monday, monday + Duration::days(6))
        }
        Period::LastWeek => {
            let monday = monday_of(today) - Duration::days(7);
            (monday, monday + Duration::days(6))
        }
        Period::Range { from, to } => {
            if from > to {
                anyhow::bail!("--from must not be after --to");
            }
            return Ok(Bounds {
                period,
                first_day: local_date(from, tz),
                last_day: local_date(to, tz),
                start: from,
                end: to,
            });
        }
    };

    let (start, end) = days_range(first_day, last_day, tz);
    Ok(Bounds {
        period,
        first_day,
        last_day,
        start,
        end,
    })
}

/// Header text for a period.
pub fn describe_period(bounds: &Bounds) -> String {
    match bounds.period {
        Period::Day => bounds.first_day.format("%A, %b %-d, %Y").to_string(),
        Period::Week | Period::LastWeek => {
            format!("Week of {}", bounds.first_day.format("%b %-d, %Y"))
        }
        Period::Range { .. } => format!(
            "{} to {}",
            bounds.first_day.format("%Y-%m-%d"),
            bounds.last_day.format("%Y-%m-%d")
        ),
    }
}

// ========== Progress Bar ==========

/// Generates a 10-character progress bar.
/// Values <5% of max get a single block for visibility.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: i64, max: i64) -> String {
    if max <= 0 || value <= 0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 {
        1
    } else {
        (ratio * 10.0).round().min(10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

// ========== Report Generation ==========

/// An orphaned session with its display name.
#[derive(Debug, Clone)]
pub struct LabeledOrphan {
    pub session: OrphanedSession,
    pub label: String,
    /// Start time in the report's zone.
    pub local_start: String,
}

/// Computed report data.
#[derive(Debug)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub bounds: Bounds,
    pub timezone: String,
    pub summary: ProjectSummary,
    pub orphans: Vec<LabeledOrphan>,
}

/// Generates report data from the ledger.
pub fn generate_report_data<Tz: TimeZone>(
    ledger: &TimeLedger<Database>,
    period: Period,
    tz: &Tz,
    timezone: String,
    now: DateTime<Utc>,
) -> Result<ReportData> {
    let bounds = period_bounds(period, now, tz)?;
    let db = ledger.store();

    let projects: Vec<ProjectRef> = db
        .list_projects(true)?
        .into_iter()
        .map(|project| ProjectRef {
            id: project.id,
            name: project.name,
        })
        .collect();
    let summary = ledger.project_summary_at(&projects, bounds.start, bounds.end, now)?;

    let mut orphans = Vec::new();
    for session in ledger.orphaned_sessions(bounds.start, bounds.end)? {
        orphans.push(LabeledOrphan {
            label: project_label(db, &session.project_id)?,
            local_start: session
                .started_at
                .with_timezone(tz)
                .naive_local()
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            session,
        });
    }

    Ok(ReportData {
        generated_at: now,
        bounds,
        timezone,
        summary,
        orphans,
    })
}

/// Formats the human-readable report output.
pub fn format_report(data: &ReportData) -> String {
    let mut output = String::new();

    writeln!(output, "TIME REPORT: {}", describe_period(&data.bounds)).unwrap();

    let entries: Vec<_> = data
        .summary
        .entries
        .iter()
        .filter(|entry| entry.total != Duration::zero())
        .collect();

    if entries.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "No time recorded for this period.").unwrap();
    } else {
        let width = entries
            .iter()
            .map(|entry| entry.project_name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Total".len());
        let max_minutes = entries
            .iter()
            .map(|entry| entry.total.num_minutes())
            .max()
            .unwrap_or(0);

        writeln!(output).unwrap();
        for entry in &entries {
            writeln!(
                output,
                "{:<width$}  {:>7}  {}",
                entry.project_name,
                format_duration(entry.total),
                progress_bar(entry.total.num_minutes(), max_minutes)
            )
            .unwrap();
        }
        writeln!(output, "{}", "─".repeat(width + 9)).unwrap();
        writeln!(
            output,
            "{:<width$}  {:>7}",
            "Total",
            format_duration(data.summary.grand_total())
        )
        .unwrap();
    }

    if !data.orphans.is_empty() {
        writeln!(output).unwrap();
        for orphan in &data.orphans {
            writeln!(
                output,
                "Warning: {} ({}) has a session started {} with no stop; it is not counted.",
                orphan.label, orphan.session.project_id, orphan.local_start
            )
            .unwrap();
        }
    }

    output
}

// ========== JSON Output ==========

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: String,
    pub timezone: &'a str,
    pub period: JsonPeriod,
    pub projects: Vec<ProjectTotalJson<'a>>,
    pub total_minutes: i64,
    pub orphaned_sessions: Vec<&'a OrphanedSession>,
}

#[derive(Debug, Serialize)]
pub struct JsonPeriod {
    pub start: String,
    pub end: String,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

/// Formats report data as JSON.
pub fn format_report_json(data: &ReportData) -> Result<String> {
    let report = JsonReport {
        generated_at: data.generated_at.to_rfc3339(),
        timezone: &data.timezone,
        period: JsonPeriod {
            start: data.bounds.start.to_rfc3339(),
            end: data.bounds.end.to_rfc3339(),
            first_day: data.bounds.first_day,
            last_day: data.bounds.last_day,
        },
        projects: data.summary.entries.iter().map(ProjectTotalJson::from).collect(),
        total_minutes: data.summary.grand_total().num_minutes(),
        orphaned_sessions: data.orphans.iter().map(|orphan| &orphan.session).collect(),
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

// ========== CSV Output ==========

/// Formats the ranked totals as CSV: `Project,Total,Hours` plus a total row.
pub fn format_report_csv(data: &ReportData) -> String {
    let mut output = String::new();
    writeln!(output, "{}", csv_record(["Project", "Total", "Hours"])).unwrap();
    for entry in &data.summary.entries {
        if entry.total == Duration::zero() {
            continue;
        }
        let total = format_hm(entry.total);
        let hours = format!("{:.2}", entry.total_hours());
        let record = csv_record([entry.project_name.as_str(), total.as_str(), hours.as_str()]);
        writeln!(output, "{record}").unwrap();
    }
    let grand_total = data.summary.grand_total();
    #[allow(clippy::cast_precision_loss)]
    let hours = format!("{:.2}", grand_total.num_seconds() as f64 / 3600.0);
    let total = format_hm(grand_total);
    writeln!(output, "{}", csv_record(["Total", total.as_str(), hours.as_str()])).unwrap();
    output
}

// ========== Public Interface ==========

/// Runs the report command.
pub fn run<W: std::io::Write, Tz: TimeZone>(
    writer: &mut W,
    ledger: &TimeLedger<Database>,
    period: Period,
    format: OutputFormat,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Result<()> {
    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
    let data = generate_report_data(ledger, period, tz, timezone, now)?;

    match format {
        OutputFormat::Text => write!(writer, "{}", format_report(&data))?,
        OutputFormat::Json => writeln!(writer, "{}", format_report_json(&data)?)?,
        OutputFormat::Csv => write!(writer, "{}", format_report_csv(&data))?,
    }

    Ok(())
}
