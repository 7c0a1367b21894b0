//! Events command: dumps the raw log as JSONL.

use std::io::Write;

use anyhow::Result;
use bp_core::{EventQuery, EventRecord, TimeLedger};
use bp_db::Database;
use chrono::{DateTime, Utc};

use super::util::{parse_optional_datetime, resolve_project};

/// Writes every matching event as one JSON object per line.
pub fn run<W: Write>(
    writer: &mut W,
    ledger: &TimeLedger<Database>,
    after: Option<&str>,
    before: Option<&str>,
    project: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let query = EventQuery {
        project_id: project
            .map(|p| resolve_project(ledger.store(), p).map(|p| p.id))
            .transpose()?,
        start: parse_optional_datetime(after, now)?,
        end: parse_optional_datetime(before, now)?,
    };

    for event in ledger.events(&query)? {
        let json = serde_json::to_string(&EventRecord::from(event))?;
        writeln!(writer, "{json}")?;
    }

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

    fn sample_ledger() -> TimeLedger<Database> {
        let mut db = Database::open_in_memory().unwrap();
        db.add_project("Alpha").unwrap();
        db.add_project("Beta").unwrap();
        let mut ledger = TimeLedger::new(db);
        let p1 = ProjectId::new("p1").unwrap();
        let p2 = ProjectId::new("p2").unwrap();

        ledger.start_at(&p1, ts("2025-01-06T09:00:00Z")).unwrap();
        ledger.start_at(&p2, ts("2025-01-06T10:00:00Z")).unwrap();
        ledger
            .add_adjustment_at(&p1, -15, Some("lunch".to_string()), ts("2025-01-06T12:00:00Z"))
            .unwrap();
        ledger
    }

    fn render(
        ledger: &TimeLedger<Database>,
        after: Option<&str>,
        before: Option<&str>,
        project: Option<&str>,
    ) -> String {
        let mut output = Vec::new();
        run(
            &mut output,
            ledger,
            after,
            before,
            project,
            ts("2025-01-06T13:00:00Z"),
        )
        .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn dumps_full_log_in_order() {
        let ledger = sample_ledger();
        assert_snapshot!(render(&ledger, None, None, None), @r#"
        {"project_id":"p1","event":"start","timestamp":"2025-01-06T09:00:00.000000Z","auto_pause":false}
        {"project_id":"p1","event":"stop","timestamp":"2025-01-06T10:00:00.000000Z","auto_pause":false}
        {"project_id":"p2","event":"start","timestamp":"2025-01-06T10:00:00.000000Z","auto_pause":false}
        {"project_id":"p1","event":"adjustment","timestamp":"2025-01-06T12:00:00.000000Z","minutes":-15,"description":"lunch","auto_pause":false}
        "#);
    }

    #[test]
    fn filters_by_project_and_time() {
        let ledger = sample_ledger();

        let alpha = render(&ledger, Some("2025-01-06T10:00:00Z"), None, Some("alpha"));
        assert_eq!(alpha.lines().count(), 2);
        assert!(alpha.lines().all(|line| line.contains(r#""project_id":"p1""#)));

        let early = render(&ledger, None, Some("3 hours ago"), None);
        assert_eq!(early.lines().count(), 3);
    }

    #[test]
    fn unknown_project_is_an_error() {
        let ledger = sample_ledger();
        let err = run(
            &mut Vec::new(),
            &ledger,
            None,
            None,
            Some("Gamma"),
            ts("2025-01-06T13:00:00Z"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("No project 'Gamma'"));
    }
}
