//! Watch command: auto-pauses the running project when the user goes idle.
//!
//! Activity arrives as lines on stdin, so any editor or shell hook can feed
//! it. The watcher does not hold the write lock while it waits: each idle
//! transition takes the lock, reloads the ledger from disk and appends its
//! events, so other `bp` commands keep working in other terminals.

use std::error::Error;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bp_core::{AutoPause, IdleConfig, IdleCoordinator, LedgerAccess, LedgerError, TimeLedger};
use bp_db::Database;

use super::util::WriteLock;

/// Ledger access that re-reads the on-disk log under the write lock.
#[derive(Debug, Clone)]
pub struct LockedLedger {
    database_path: PathBuf,
}

impl LockedLedger {
    pub const fn new(database_path: PathBuf) -> Self {
        Self { database_path }
    }

    fn apply<T>(
        &self,
        f: impl FnOnce(&mut TimeLedger<Database>) -> Result<T, LedgerError>,
    ) -> Result<T> {
        let _lock = WriteLock::acquire(&self.database_path)?;
        let db = Database::open(&self.database_path).context("failed to open database")?;
        let mut ledger = TimeLedger::recover(db).context("failed to replay event log")?;
        Ok(f(&mut ledger)?)
    }
}

impl LedgerAccess for LockedLedger {
    type Store = Database;

    fn with_ledger<T>(
        &self,
        f: impl FnOnce(&mut TimeLedger<Self::Store>) -> Result<T, LedgerError>,
    ) -> Result<T, Box<dyn Error + Send + Sync>> {
        self.apply(f).map_err(Into::into)
    }
}

/// Feeds each input line to the idle coordinator until end of input.
pub fn run<W, R, A>(writer: &mut W, reader: R, config: IdleConfig, access: A) -> Result<()>
where
    W: Write,
    R: BufRead,
    A: LedgerAccess + 'static,
{
    let coordinator = IdleCoordinator::new(config);
    coordinator.set_listener(Arc::new(AutoPause::new(access)));
    coordinator
        .start()
        .context("failed to start idle watcher")?;

    writeln!(
        writer,
        "Watching for inactivity (idle after {}s). Close input to stop.",
        config.idle_timeout.as_secs()
    )?;
    writer.flush()?;

    let mut result = Ok(());
    for line in reader.lines() {
        if let Err(err) = line {
            result = Err(err).context("failed to read activity");
            break;
        }
        coordinator.notify_activity();
    }

    if !coordinator.stop() {
        tracing::warn!("idle watcher was detached on shutdown");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{BufReader, Read};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use bp_core::{EventKind, EventQuery, MemoryStore, ProjectId};
    use chrono::{DateTime, Duration as ChronoDuration, Utc};

    /// Yields one activity line after staying silent for `delay`.
    struct SlowInput {
        delay: Duration,
        sent: bool,
    }

    impl Read for SlowInput {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.sent {
                return Ok(0);
            }
            thread::sleep(self.delay);
            self.sent = true;
            buf[0] = b'\n';
            Ok(1)
        }
    }

    fn fast_config() -> IdleConfig {
        IdleConfig {
            idle_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            sleep_gap: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn silence_pauses_and_input_resumes() {
        let project = ProjectId::new("p1").unwrap();
        let ledger = Arc::new(Mutex::new(TimeLedger::new(MemoryStore::new())));
        ledger.lock().unwrap().start(&project).unwrap();

        let input = BufReader::new(SlowInput {
            delay: Duration::from_millis(400),
            sent: false,
        });
        let mut output = Vec::new();
        run(&mut output, input, fast_config(), Arc::clone(&ledger)).unwrap();

        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.current_project(), Some(&project));
        let kinds: Vec<_> = ledger
            .events(&EventQuery::all())
            .unwrap()
            .into_iter()
            .map(|e| (e.kind, e.auto_pause))
            .collect();
        // A sub-minute pause is not deducted.
        assert_eq!(
            kinds,
            [
                (EventKind::Start, false),
                (EventKind::AutoPause, true),
                (EventKind::Start, false),
            ]
        );
        assert!(
            String::from_utf8(output)
                .unwrap()
                .starts_with("Watching for inactivity")
        );
    }

    #[test]
    fn empty_input_returns_without_events() {
        let ledger = Arc::new(Mutex::new(TimeLedger::new(MemoryStore::new())));
        run(
            &mut Vec::new(),
            std::io::empty(),
            IdleConfig::default(),
            Arc::clone(&ledger),
        )
        .unwrap();
        assert!(ledger.lock().unwrap().store().is_empty());
    }

    #[test]
    fn locked_ledger_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bp.db");
        let project = ProjectId::new("p1").unwrap();

        let mut db = Database::open(&path).unwrap();
        db.add_project("Alpha").unwrap();
        TimeLedger::new(db).start(&project).unwrap();

        let access = LockedLedger::new(path.clone());
        let paused = access.with_ledger(|ledger| ledger.pause()).unwrap();
        assert!(paused);

        // A fresh process sees the auto-pause.
        let ledger = TimeLedger::recover(Database::open(&path).unwrap()).unwrap();
        assert!(!ledger.is_tracking());
        let events = ledger.events(&EventQuery::all()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::AutoPause);
    }

    #[test]
    fn stale_pause_from_earlier_process_is_not_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bp.db");
        let project = ProjectId::new("p1").unwrap();
        let now = DateTime::parse_from_rfc3339("2025-01-07T11:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let mut db = Database::open(&path).unwrap();
        db.add_project("Alpha").unwrap();
        let mut earlier = TimeLedger::new(db);
        earlier
            .start_at(&project, now - ChronoDuration::hours(26))
            .unwrap();
        earlier.pause_at(now - ChronoDuration::hours(24)).unwrap();
        drop(earlier);

        let coordinator = IdleCoordinator::new_at(IdleConfig::default(), now);
        coordinator.set_listener(Arc::new(AutoPause::new(LockedLedger::new(path.clone()))));
        let idle_at = now + ChronoDuration::minutes(10);
        coordinator.check_at(idle_at - ChronoDuration::seconds(1), idle_at);
        coordinator.notify_activity_at(idle_at + ChronoDuration::minutes(1));

        let ledger = TimeLedger::recover(Database::open(&path).unwrap()).unwrap();
        assert!(!ledger.is_tracking());
        let kinds: Vec<_> = ledger
            .events(&EventQuery::all())
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, [EventKind::Start, EventKind::AutoPause]);
    }
}
