//! Status command: what is running and today's totals.

use std::io::Write;

use anyhow::Result;
use bp_core::TimeLedger;
use bp_db::Database;
use chrono::{DateTime, Duration, TimeZone, Utc};

use super::util::{format_hms, project_label};

pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    ledger: &TimeLedger<Database>,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Result<()> {
    let db = ledger.store();

    if let Some(live) = ledger.live_session() {
        writeln!(
            writer,
            "Tracking: {} ({}) for {}",
            project_label(db, &live.project_id)?,
            live.project_id,
            format_hms(live.elapsed_at(now))
        )?;
    } else if let Some(paused) = ledger.paused_state() {
        writeln!(
            writer,
            "Auto-paused: {} ({}) for {}",
            project_label(db, &paused.project_id)?,
            paused.project_id,
            format_hms(now - paused.pause_started_at)
        )?;
    } else {
        writeln!(writer, "Not tracking.")?;
    }

    let projects = db.list_projects(false)?;
    if projects.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "No projects yet. Add one with 'bp projects add <name>'.")?;
        return Ok(());
    }

    let ids: Vec<_> = projects.iter().map(|p| p.id.clone()).collect();
    let totals = ledger.today_totals_at(&ids, tz, now)?;
    let width = projects
        .iter()
        .map(|p| p.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Total".len());

    writeln!(writer)?;
    writeln!(writer, "Today:")?;
    for (project, (_, total)) in projects.iter().zip(&totals) {
        writeln!(writer, "  {:<width$}  {}", project.name, format_hms(*total))?;
    }
    let grand_total: Duration = totals.iter().map(|(_, total)| *total).sum();
    writeln!(writer, "  {:<width$}  {}", "Total", format_hms(grand_total))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use bp_core::ProjectId;
    use insta::assert_snapshot;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn pid(id: &str) -> ProjectId {
        ProjectId::new(id).unwrap()
    }

    fn render(ledger: &TimeLedger<Database>, now: DateTime<Utc>) -> String {
        let mut output = Vec::new();
        run(&mut output, ledger, &Utc, now).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn status_shows_live_project_and_today() {
        let mut db = Database::open_in_memory().unwrap();
        db.add_project("Alpha").unwrap();
        db.add_project("Beta").unwrap();
        let mut ledger = TimeLedger::new(db);

        // Yesterday's work does not count toward today.
        ledger.start_at(&pid("p1"), ts("2025-01-05T20:00:00Z")).unwrap();
        ledger.stop_at(ts("2025-01-05T22:00:00Z"), false).unwrap();

        ledger.start_at(&pid("p1"), ts("2025-01-06T09:00:00Z")).unwrap();
        ledger.stop_at(ts("2025-01-06T10:00:00Z"), false).unwrap();
        ledger
            .add_adjustment_at(&pid("p2"), 30, None, ts("2025-01-06T10:15:00Z"))
            .unwrap();
        ledger.start_at(&pid("p2"), ts("2025-01-06T10:30:00Z")).unwrap();

        assert_snapshot!(render(&ledger, ts("2025-01-06T11:00:00Z")), @r"
        Tracking: Beta (p2) for 00:30:00

        Today:
          Alpha  01:00:00
          Beta   01:00:00
          Total  02:00:00
        ");
    }

    #[test]
    fn status_shows_auto_paused_project() {
        let mut db = Database::open_in_memory().unwrap();
        db.add_project("Alpha").unwrap();
        let mut ledger = TimeLedger::new(db);

        ledger.start_at(&pid("p1"), ts("2025-01-06T09:00:00Z")).unwrap();
        ledger.pause_at(ts("2025-01-06T09:45:00Z")).unwrap();

        let output = render(&ledger, ts("2025-01-06T10:00:00Z"));
        assert!(output.starts_with("Auto-paused: Alpha (p1) for 00:15:00\n"));
        assert!(output.contains("  Alpha  00:45:00\n"));
    }

    #[test]
    fn status_without_projects() {
        let ledger = TimeLedger::new(Database::open_in_memory().unwrap());
        assert_snapshot!(render(&ledger, ts("2025-01-06T10:00:00Z")), @r"
        Not tracking.

        No projects yet. Add one with 'bp projects add <name>'.
        ");
    }
}
