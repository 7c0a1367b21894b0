//! Daily command: a date × project table of worked time.

use std::fmt::Write;

use anyhow::Result;
use bp_core::{DailyBreakdown, DailyRow, TimeLedger};
use bp_db::Database;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use super::report::{Bounds, Period, describe_period, period_bounds};
use super::util::{OutputFormat, csv_record, format_hm, project_label};

/// Breakdown plus the labels needed to render it.
#[derive(Debug)]
pub struct DailyData {
    pub bounds: Bounds,
    pub breakdown: DailyBreakdown,
    /// `(id, display name)` for every project column, ordered by id.
    pub columns: Vec<(bp_core::ProjectId, String)>,
}

pub fn generate_daily_data<Tz: TimeZone>(
    ledger: &TimeLedger<Database>,
    period: Period,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Result<DailyData> {
    let bounds = period_bounds(period, now, tz)?;
    let breakdown =
        ledger.daily_breakdown_at(bounds.first_day, bounds.last_day, tz.clone(), now)?;

    let mut columns = Vec::new();
    for id in breakdown.projects() {
        columns.push((id.clone(), project_label(ledger.store(), id)?));
    }

    Ok(DailyData {
        bounds,
        breakdown,
        columns,
    })
}

/// Formats the breakdown as a table with signed `HH:MM` cells.
pub fn format_daily(data: &DailyData) -> String {
    let mut output = String::new();
    writeln!(output, "DAILY: {}", describe_period(&data.bounds)).unwrap();
    writeln!(output).unwrap();

    if data.breakdown.is_empty() {
        writeln!(output, "No time recorded for this period.").unwrap();
        return output;
    }

    let widths: Vec<usize> = data
        .columns
        .iter()
        .map(|(_, name)| name.chars().count().max(6))
        .collect();

    let mut header = format!("{:<10}", "Date");
    for ((_, name), width) in data.columns.iter().zip(&widths) {
        write!(header, "  {name:>width$}").unwrap();
    }
    write!(header, "  {:>6}", "Total").unwrap();
    writeln!(output, "{header}").unwrap();

    for date in data.breakdown.days.keys() {
        let mut line = date.format("%Y-%m-%d").to_string();
        for ((id, _), width) in data.columns.iter().zip(&widths) {
            let cell = format_hm(data.breakdown.get(*date, id));
            write!(line, "  {cell:>width$}").unwrap();
        }
        write!(line, "  {:>6}", format_hm(data.breakdown.day_total(*date))).unwrap();
        writeln!(output, "{line}").unwrap();
    }

    output
}

#[derive(Debug, Serialize)]
struct JsonDaily<'a> {
    first_day: chrono::NaiveDate,
    last_day: chrono::NaiveDate,
    rows: &'a [DailyRow],
}

pub fn format_daily_json(data: &DailyData) -> Result<String> {
    let rows = data.breakdown.rows();
    Ok(serde_json::to_string_pretty(&JsonDaily {
        first_day: data.bounds.first_day,
        last_day: data.bounds.last_day,
        rows: &rows,
    })?)
}

/// Formats the breakdown as CSV with one column per project.
pub fn format_daily_csv(data: &DailyData) -> String {
    let mut output = String::new();
    let header = std::iter::once("Date")
        .chain(data.columns.iter().map(|(_, name)| name.as_str()))
        .chain(std::iter::once("Total"));
    writeln!(output, "{}", csv_record(header)).unwrap();

    for date in data.breakdown.days.keys() {
        let cells = std::iter::once(date.format("%Y-%m-%d").to_string())
            .chain(
                data.columns
                    .iter()
                    .map(|(id, _)| format_hm(data.breakdown.get(*date, id))),
            )
            .chain(std::iter::once(format_hm(data.breakdown.day_total(*date))));
        writeln!(output, "{}", csv_record(cells)).unwrap();
    }
    output
}

/// Runs the daily command.
pub fn run<W: std::io::Write, Tz: TimeZone>(
    writer: &mut W,
    ledger: &TimeLedger<Database>,
    period: Period,
    format: OutputFormat,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Result<()> {
    let data = generate_daily_data(ledger, period, tz, now)?;
    match format {
        OutputFormat::Text => write!(writer, "{}", format_daily(&data))?,
        OutputFormat::Json => writeln!(writer, "{}", format_daily_json(&data)?)?,
        OutputFormat::Csv => write!(writer, "{}", format_daily_csv(&data))?,
    }
    Ok(())
}
