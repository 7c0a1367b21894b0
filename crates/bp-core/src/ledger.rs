//! Live tracking state and history reconstruction over an [`EventStore`].
//!
//! The ledger is the only writer of events. It owns at most one
//! [`LiveSession`] and at most one [`PausedState`]; everything it reports
//! about the past is recomputed from the log.
//!
//! Every operation that depends on the wall clock has an `_at` variant
//! taking `now` explicitly; the plain variants use [`Utc::now`]. Recording
//! operations truncate `now` to the log's microsecond precision, so live and
//! paused state always equal the timestamps of their logged events.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::calendar::day_range;
use crate::daily::{DailyAggregator, DailyBreakdown};
use crate::event::{Event, stored_precision};
use crate::event_kind::EventKind;
use crate::replay::{OrphanedSession, orphans_from, replay};
use crate::store::{EventQuery, EventStore};
use crate::summary::{ProjectRef, ProjectSummary, SummaryBuilder};
use crate::types::ProjectId;

/// Pauses shorter than this many seconds are not deducted on resume.
pub const MIN_PAUSE_DEDUCTION_SECS: i64 = 60;

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The event store failed to append or query, including records whose
    /// timestamps could not be parsed.
    #[error("event store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    fn store<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Store(Box::new(err))
    }
}

/// The project currently being tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSession {
    pub project_id: ProjectId,
    /// Equals the timestamp of the `Start` event that opened this session.
    pub started_at: DateTime<Utc>,
    /// Time carried over from before `started_at`.
    pub accumulated: Duration,
}

impl LiveSession {
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        self.accumulated + (now - self.started_at)
    }
}

/// The project stopped by an automatic pause and waiting to resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PausedState {
    pub project_id: ProjectId,
    pub pause_started_at: DateTime<Utc>,
}

/// Per-project tracking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Idle,
    Running,
    AutoPaused,
}

/// A session the ledger just closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedSession {
    pub project_id: ProjectId,
    pub elapsed: Duration,
    pub auto_pause: bool,
}

/// Result of [`TimeLedger::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session began; `switched_from` is the session implicitly stopped.
    Started { switched_from: Option<StoppedSession> },
    /// The project was already live; nothing was recorded.
    AlreadyRunning,
}

/// Result of a successful [`TimeLedger::resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resumed {
    pub project_id: ProjectId,
    pub paused_for: Duration,
    /// Minutes recorded in the `PauseAdjustment` (zero or negative).
    pub deducted_minutes: i64,
}

/// Event-sourced time ledger.
#[derive(Debug)]
pub struct TimeLedger<S> {
    store: S,
    live: Option<LiveSession>,
    paused: Option<PausedState>,
}

impl<S: EventStore> TimeLedger<S> {
    /// A ledger with no live or paused state.
    pub const fn new(store: S) -> Self {
        Self {
            store,
            live: None,
            paused: None,
        }
    }

    /// A ledger whose live or paused state is rebuilt from the log tail.
    ///
    /// The most recent session event decides: an unterminated `Start`
    /// becomes the live session, an `AutoPause` becomes the paused state,
    /// and a `Stop` leaves the ledger idle.
    pub fn recover(store: S) -> Result<Self, LedgerError> {
        let events = store.query(&EventQuery::all()).map_err(LedgerError::store)?;
        let mut ledger = Self::new(store);

        let last_session_event = events
            .iter()
            .rev()
            .find(|event| event.kind == EventKind::Start || event.kind.is_terminator());

        match last_session_event {
            Some(event) if event.kind == EventKind::Start => {
                ledger.live = Some(LiveSession {
                    project_id: event.project_id.clone(),
                    started_at: event.timestamp,
                    accumulated: Duration::zero(),
                });
            }
            Some(event) if event.kind == EventKind::AutoPause => {
                ledger.paused = Some(PausedState {
                    project_id: event.project_id.clone(),
                    pause_started_at: event.timestamp,
                });
            }
            _ => {}
        }

        tracing::debug!(
            events = events.len(),
            live = ?ledger.live.as_ref().map(|l| l.project_id.as_str()),
            paused = ?ledger.paused.as_ref().map(|p| p.project_id.as_str()),
            "recovered ledger state"
        );
        Ok(ledger)
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub const fn live_session(&self) -> Option<&LiveSession> {
        self.live.as_ref()
    }

    pub const fn paused_state(&self) -> Option<&PausedState> {
        self.paused.as_ref()
    }

    pub const fn is_tracking(&self) -> bool {
        self.live.is_some()
    }

    pub fn current_project(&self) -> Option<&ProjectId> {
        self.live.as_ref().map(|live| &live.project_id)
    }

    /// Where `project_id` sits in the Idle/Running/AutoPaused machine.
    pub fn tracking_status(&self, project_id: &ProjectId) -> TrackingStatus {
        if self.current_project() == Some(project_id) {
            TrackingStatus::Running
        } else if self
            .paused
            .as_ref()
            .is_some_and(|paused| paused.project_id == *project_id)
        {
            TrackingStatus::AutoPaused
        } else {
            TrackingStatus::Idle
        }
    }

    // ========== Recording ==========

    pub fn start(&mut self, project_id: &ProjectId) -> Result<StartOutcome, LedgerError> {
        self.start_at(project_id, Utc::now())
    }

    /// Starts tracking `project_id`, stopping any other live project first.
    ///
    /// An explicit start discards a pending paused state.
    pub fn start_at(
        &mut self,
        project_id: &ProjectId,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome, LedgerError> {
        let now = stored_precision(now);
        if self.current_project() == Some(project_id) {
            tracing::debug!(project = %project_id, "already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let switched_from = self.stop_at(now, false)?;
        self.paused = None;

        self.append(&Event::start(project_id.clone(), now))?;
        self.live = Some(LiveSession {
            project_id: project_id.clone(),
            started_at: now,
            accumulated: Duration::zero(),
        });
        tracing::info!(project = %project_id, "started tracking");

        Ok(StartOutcome::Started { switched_from })
    }

    pub fn stop(&mut self, auto_pause: bool) -> Result<Option<StoppedSession>, LedgerError> {
        self.stop_at(Utc::now(), auto_pause)
    }

    /// Stops the live session, returning `None` when nothing is live.
    pub fn stop_at(
        &mut self,
        now: DateTime<Utc>,
        auto_pause: bool,
    ) -> Result<Option<StoppedSession>, LedgerError> {
        let Some(live) = self.live.as_ref() else {
            return Ok(None);
        };
        let now = stored_precision(now);

        let elapsed = live.elapsed_at(now);
        let project_id = live.project_id.clone();
        self.append(&Event::stop(project_id.clone(), now, auto_pause))?;
        self.live = None;
        tracing::info!(
            project = %project_id,
            elapsed_secs = elapsed.num_seconds(),
            auto_pause,
            "stopped tracking"
        );

        Ok(Some(StoppedSession {
            project_id,
            elapsed,
            auto_pause,
        }))
    }

    pub fn pause(&mut self) -> Result<bool, LedgerError> {
        self.pause_at(Utc::now())
    }

    /// Auto-pauses the live session. Returns `false` and changes nothing
    /// when nothing is live.
    pub fn pause_at(&mut self, now: DateTime<Utc>) -> Result<bool, LedgerError> {
        let now = stored_precision(now);
        let Some(live) = self.live.as_ref() else {
            tracing::debug!("pause requested with nothing live");
            return Ok(false);
        };

        let paused = PausedState {
            project_id: live.project_id.clone(),
            pause_started_at: now,
        };
        self.stop_at(now, true)?;
        tracing::info!(project = %paused.project_id, "auto-paused");
        self.paused = Some(paused);
        Ok(true)
    }

    pub fn resume(&mut self) -> Result<Option<Resumed>, LedgerError> {
        self.resume_at(Utc::now())
    }

    /// Resumes the auto-paused project, deducting the pause when it lasted
    /// at least [`MIN_PAUSE_DEDUCTION_SECS`]. Returns `None` when nothing is
    /// paused.
    pub fn resume_at(&mut self, now: DateTime<Utc>) -> Result<Option<Resumed>, LedgerError> {
        let now = stored_precision(now);
        let Some(paused) = self.paused.clone() else {
            tracing::debug!("resume requested with nothing paused");
            return Ok(None);
        };

        let paused_for = now - paused.pause_started_at;
        let deducted_minutes = if paused_for.num_seconds() >= MIN_PAUSE_DEDUCTION_SECS {
            let minutes = -paused_for.num_minutes();
            self.append(&Event::pause_adjustment(
                paused.project_id.clone(),
                minutes,
                now,
            ))?;
            minutes
        } else {
            0
        };

        self.paused = None;
        self.start_at(&paused.project_id, now)?;
        tracing::info!(
            project = %paused.project_id,
            paused_secs = paused_for.num_seconds(),
            deducted_minutes,
            "resumed"
        );

        Ok(Some(Resumed {
            project_id: paused.project_id,
            paused_for,
            deducted_minutes,
        }))
    }

    pub fn add_adjustment(
        &mut self,
        project_id: &ProjectId,
        minutes: i64,
        description: Option<String>,
    ) -> Result<(), LedgerError> {
        self.add_adjustment_at(project_id, minutes, description, Utc::now())
    }

    /// Records a signed-minutes correction. Zero is accepted.
    pub fn add_adjustment_at(
        &mut self,
        project_id: &ProjectId,
        minutes: i64,
        description: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.append(&Event::adjustment(
            project_id.clone(),
            minutes,
            description,
            stored_precision(at),
        ))?;
        tracing::info!(project = %project_id, minutes, "recorded adjustment");
        Ok(())
    }

    fn append(&mut self, event: &Event) -> Result<(), LedgerError> {
        self.store.append(event).map_err(LedgerError::store)
    }

    // ========== Queries ==========

    pub fn current_elapsed(&self) -> Duration {
        self.current_elapsed_at(Utc::now())
    }

    pub fn current_elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        self.live
            .as_ref()
            .map_or_else(Duration::zero, |live| live.elapsed_at(now))
    }

    pub fn calculate_project_time(
        &self,
        project_id: &ProjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Duration, LedgerError> {
        self.calculate_project_time_at(project_id, start, end, Utc::now())
    }

    /// Replays `project_id`'s events within `[start, end]`.
    ///
    /// An unterminated `Start` counts up to `now` only when `project_id` is
    /// the live project; otherwise it is orphaned and contributes nothing
    /// (see [`Self::orphaned_sessions`]).
    pub fn calculate_project_time_at(
        &self,
        project_id: &ProjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Duration, LedgerError> {
        let events = self.query(&EventQuery::project_range(project_id, start, end))?;
        let replayed = replay(&events);
        let is_live = self.current_project() == Some(project_id);
        tracing::debug!(
            project = %project_id,
            events = events.len(),
            total_secs = replayed.total.num_seconds(),
            is_live,
            "replayed project"
        );
        Ok(replayed.total_at(is_live, now))
    }

    /// Unterminated starts within `[start, end]` that are not the live
    /// session, ordered by time.
    pub fn orphaned_sessions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrphanedSession>, LedgerError> {
        let events = self.query(&EventQuery::range(start, end))?;

        let mut project_ids: Vec<&ProjectId> = events.iter().map(|e| &e.project_id).collect();
        project_ids.sort();
        project_ids.dedup();

        let mut orphans = Vec::new();
        for project_id in project_ids {
            let replayed = replay(events.iter().filter(|e| e.project_id == *project_id));
            let live_start = self
                .live
                .as_ref()
                .filter(|live| live.project_id == *project_id)
                .map(|live| live.started_at);
            orphans.extend(orphans_from(project_id, &replayed, live_start));
        }
        orphans.sort_by_key(|orphan| orphan.started_at);

        for orphan in &orphans {
            tracing::warn!(
                project = %orphan.project_id,
                started_at = %orphan.started_at,
                "session has no stop event"
            );
        }
        Ok(orphans)
    }

    pub fn today_time<Tz: TimeZone>(
        &self,
        project_id: &ProjectId,
        tz: &Tz,
    ) -> Result<Duration, LedgerError> {
        self.today_time_at(project_id, tz, Utc::now())
    }

    /// Time worked on `project_id` during the local day containing `now`.
    pub fn today_time_at<Tz: TimeZone>(
        &self,
        project_id: &ProjectId,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> Result<Duration, LedgerError> {
        let today = now.with_timezone(tz).date_naive();
        let (start, end) = day_range(today, tz);
        self.calculate_project_time_at(project_id, start, end, now)
    }

    /// Today's time for each project, in the given order.
    pub fn today_totals_at<Tz: TimeZone>(
        &self,
        project_ids: &[ProjectId],
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> Result<Vec<(ProjectId, Duration)>, LedgerError> {
        project_ids
            .iter()
            .map(|id| Ok((id.clone(), self.today_time_at(id, tz, now)?)))
            .collect()
    }

    pub fn project_summary(
        &self,
        projects: &[ProjectRef],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ProjectSummary, LedgerError> {
        self.project_summary_at(projects, start, end, Utc::now())
    }

    /// Totals for every project within `[start, end]`, ranked descending.
    pub fn project_summary_at(
        &self,
        projects: &[ProjectRef],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ProjectSummary, LedgerError> {
        let events = self.query(&EventQuery::range(start, end))?;
        Ok(SummaryBuilder::new()
            .with_live(self.current_project().cloned(), now)
            .build(projects, &events))
    }

    pub fn daily_breakdown<Tz: TimeZone>(
        &self,
        first: NaiveDate,
        last: NaiveDate,
        tz: Tz,
    ) -> Result<DailyBreakdown, LedgerError> {
        self.daily_breakdown_at(first, last, tz, Utc::now())
    }

    /// Per-day totals for the local days `first..=last`, with the live
    /// session counted up to `now`.
    pub fn daily_breakdown_at<Tz: TimeZone>(
        &self,
        first: NaiveDate,
        last: NaiveDate,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<DailyBreakdown, LedgerError> {
        let (start, end) = crate::calendar::days_range(first, last, &tz);
        let events = self.query(&EventQuery::range(start, end))?;
        let mut aggregator = DailyAggregator::new(tz);
        if let Some(project_id) = self.current_project() {
            aggregator = aggregator.with_live(project_id.clone(), now.min(end));
        }
        Ok(aggregator.aggregate(&events))
    }

    /// Raw events matching `query`, in log order.
    pub fn events(&self, query: &EventQuery) -> Result<Vec<Event>, LedgerError> {
        self.query(query)
    }

    fn query(&self, query: &EventQuery) -> Result<Vec<Event>, LedgerError> {
        self.store.query(query).map_err(LedgerError::store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::{EventRecord, parse_timestamp};
    use crate::store::MemoryStore;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn pid(id: &str) -> ProjectId {
        ProjectId::new(id).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        ts("2025-01-06T09:00:00Z")
    }

    fn ledger() -> TimeLedger<MemoryStore> {
        TimeLedger::new(MemoryStore::new())
    }

    fn kinds(ledger: &TimeLedger<MemoryStore>) -> Vec<EventKind> {
        ledger
            .events(&EventQuery::all())
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }

    #[test]
    fn start_stop_then_adjust() {
        let mut ledger = ledger();
        let a = pid("p1");
        ledger.start_at(&a, t0()).unwrap();
        let stopped = ledger
            .stop_at(t0() + Duration::minutes(90), false)
            .unwrap()
            .unwrap();
        assert_eq!(stopped.elapsed, Duration::minutes(90));

        let end = t0() + Duration::hours(2);
        let now = t0() + Duration::hours(3);
        assert_eq!(
            ledger.calculate_project_time_at(&a, t0(), end, now).unwrap(),
            Duration::minutes(90)
        );

        ledger
            .add_adjustment_at(&a, -15, None, t0() + Duration::minutes(91))
            .unwrap();
        assert_eq!(
            ledger.calculate_project_time_at(&a, t0(), end, now).unwrap(),
            Duration::minutes(75)
        );
    }

    #[test]
    fn stop_with_nothing_live_returns_none() {
        let mut ledger = ledger();
        assert_eq!(ledger.stop_at(t0(), false).unwrap(), None);
        assert!(ledger.store().is_empty());
    }

    #[test]
    fn switching_projects_stops_the_previous_one() {
        let mut ledger = ledger();
        let (a, b) = (pid("p1"), pid("p2"));
        let switch = t0() + Duration::minutes(40);

        ledger.start_at(&a, t0()).unwrap();
        let outcome = ledger.start_at(&b, switch).unwrap();
        let StartOutcome::Started {
            switched_from: Some(previous),
        } = &outcome
        else {
            panic!("expected an implicit stop, got {outcome:?}");
        };
        assert_eq!(previous.project_id, a);
        assert_eq!(previous.elapsed, Duration::minutes(40));

        assert_eq!(ledger.current_project(), Some(&b));
        let later = t0() + Duration::hours(5);
        assert_eq!(
            ledger
                .calculate_project_time_at(&a, t0(), later, later)
                .unwrap(),
            Duration::minutes(40)
        );
        assert_eq!(ledger.tracking_status(&a), TrackingStatus::Idle);
        assert_eq!(ledger.tracking_status(&b), TrackingStatus::Running);
    }

    #[test]
    fn starting_the_live_project_records_nothing() {
        let mut ledger = ledger();
        let a = pid("p1");
        ledger.start_at(&a, t0()).unwrap();
        let outcome = ledger.start_at(&a, t0() + Duration::minutes(5)).unwrap();
        assert_eq!(outcome, StartOutcome::AlreadyRunning);
        assert_eq!(ledger.store().len(), 1);
        assert_eq!(ledger.live_session().unwrap().started_at, t0());
    }

    #[test]
    fn pause_without_live_session_is_a_no_op() {
        let mut ledger = ledger();
        assert!(!ledger.pause_at(t0()).unwrap());
        assert!(ledger.store().is_empty());
        assert!(ledger.paused_state().is_none());
        assert!(!ledger.is_tracking());
    }

    #[test]
    fn resume_without_pause_is_a_no_op() {
        let mut ledger = ledger();
        ledger.start_at(&pid("p1"), t0()).unwrap();
        assert_eq!(ledger.resume_at(t0() + Duration::minutes(1)).unwrap(), None);
        assert_eq!(ledger.store().len(), 1);
    }

    #[test]
    fn pause_and_resume_deducts_whole_minutes() {
        let mut ledger = ledger();
        let a = pid("p1");
        let paused_at = t0() + Duration::minutes(30);
        let resumed_at = paused_at + Duration::minutes(12) + Duration::seconds(40);
        let stopped_at = resumed_at + Duration::minutes(20);

        ledger.start_at(&a, t0()).unwrap();
        assert!(ledger.pause_at(paused_at).unwrap());
        assert_eq!(ledger.tracking_status(&a), TrackingStatus::AutoPaused);
        assert!(!ledger.is_tracking());

        let resumed = ledger.resume_at(resumed_at).unwrap().unwrap();
        assert_eq!(resumed.deducted_minutes, -12);
        assert_eq!(ledger.tracking_status(&a), TrackingStatus::Running);
        ledger.stop_at(stopped_at, false).unwrap();

        assert_eq!(
            kinds(&ledger),
            [
                EventKind::Start,
                EventKind::AutoPause,
                EventKind::PauseAdjustment,
                EventKind::Start,
                EventKind::Stop,
            ]
        );

        let naive = Duration::minutes(30) + Duration::minutes(20);
        assert_eq!(
            ledger
                .calculate_project_time_at(&a, t0(), stopped_at, stopped_at)
                .unwrap(),
            naive - Duration::minutes(12)
        );
    }

    #[test]
    fn short_pause_records_no_adjustment() {
        let mut ledger = ledger();
        ledger.start_at(&pid("p1"), t0()).unwrap();
        ledger.pause_at(t0() + Duration::minutes(5)).unwrap();
        let resumed = ledger
            .resume_at(t0() + Duration::minutes(5) + Duration::seconds(59))
            .unwrap()
            .unwrap();
        assert_eq!(resumed.deducted_minutes, 0);
        assert!(!kinds(&ledger).contains(&EventKind::PauseAdjustment));
    }

    #[test]
    fn explicit_start_discards_pending_pause() {
        let mut ledger = ledger();
        ledger.start_at(&pid("p1"), t0()).unwrap();
        ledger.pause_at(t0() + Duration::minutes(5)).unwrap();
        ledger
            .start_at(&pid("p2"), t0() + Duration::minutes(10))
            .unwrap();
        assert!(ledger.paused_state().is_none());
        assert_eq!(ledger.resume_at(t0() + Duration::minutes(20)).unwrap(), None);
    }

    #[test]
    fn zero_minute_adjustment_is_recorded() {
        let mut ledger = ledger();
        ledger.add_adjustment_at(&pid("p1"), 0, None, t0()).unwrap();
        assert_eq!(kinds(&ledger), [EventKind::Adjustment]);
        assert!(!ledger.is_tracking());
    }

    #[test]
    fn current_elapsed_tracks_live_session() {
        let mut ledger = ledger();
        assert_eq!(ledger.current_elapsed_at(t0()), Duration::zero());
        ledger.start_at(&pid("p1"), t0()).unwrap();
        assert_eq!(
            ledger.current_elapsed_at(t0() + Duration::minutes(7)),
            Duration::minutes(7)
        );
    }

    #[test]
    fn live_session_counts_up_to_now() {
        let mut ledger = ledger();
        let a = pid("p1");
        ledger.start_at(&a, t0()).unwrap();
        let now = t0() + Duration::minutes(25);
        assert_eq!(
            ledger
                .calculate_project_time_at(&a, t0(), t0() + Duration::hours(1), now)
                .unwrap(),
            Duration::minutes(25)
        );
    }

    #[test]
    fn orphaned_start_is_excluded_and_reported() {
        let mut store = MemoryStore::new();
        store.append(&Event::start(pid("p1"), t0())).unwrap();
        let ledger = TimeLedger::new(store);

        let end = t0() + Duration::hours(2);
        assert_eq!(
            ledger
                .calculate_project_time_at(&pid("p1"), t0(), end, end)
                .unwrap(),
            Duration::zero()
        );

        let orphans = ledger.orphaned_sessions(t0(), end).unwrap();
        assert_eq!(
            orphans,
            [OrphanedSession {
                project_id: pid("p1"),
                started_at: t0(),
            }]
        );
    }

    #[test]
    fn malformed_timestamp_fails_the_query() {
        let mut store = MemoryStore::new();
        store.append(&Event::start(pid("p1"), t0())).unwrap();
        store.push_record(EventRecord {
            project_id: "p1".to_string(),
            event: "stop".to_string(),
            timestamp: "06/01/2025 10:00".to_string(),
            minutes: None,
            description: None,
            auto_pause: false,
        });
        let ledger = TimeLedger::new(store);

        let result = ledger.calculate_project_time_at(
            &pid("p1"),
            t0(),
            t0() + Duration::hours(2),
            t0(),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("06/01/2025 10:00"));
    }

    #[test]
    fn recover_restores_live_session() {
        let mut ledger = ledger();
        ledger.start_at(&pid("p1"), t0()).unwrap();
        ledger
            .start_at(&pid("p2"), t0() + Duration::minutes(10))
            .unwrap();

        let recovered = TimeLedger::recover(ledger.into_store()).unwrap();
        let live = recovered.live_session().unwrap();
        assert_eq!(live.project_id, pid("p2"));
        assert_eq!(live.started_at, t0() + Duration::minutes(10));
        assert!(recovered.paused_state().is_none());
    }

    #[test]
    fn recover_restores_paused_state() {
        let mut ledger = ledger();
        ledger.start_at(&pid("p1"), t0()).unwrap();
        ledger.pause_at(t0() + Duration::minutes(10)).unwrap();
        ledger
            .add_adjustment_at(&pid("p2"), 5, None, t0() + Duration::minutes(11))
            .unwrap();

        let mut recovered = TimeLedger::recover(ledger.into_store()).unwrap();
        assert!(!recovered.is_tracking());
        assert_eq!(
            recovered.paused_state().unwrap().pause_started_at,
            t0() + Duration::minutes(10)
        );

        let resumed = recovered
            .resume_at(t0() + Duration::minutes(15))
            .unwrap()
            .unwrap();
        assert_eq!(resumed.deducted_minutes, -5);
        assert_eq!(recovered.current_project(), Some(&pid("p1")));
    }

    #[test]
    fn recover_after_stop_is_idle() {
        let mut ledger = ledger();
        ledger.start_at(&pid("p1"), t0()).unwrap();
        ledger.stop_at(t0() + Duration::minutes(3), false).unwrap();

        let recovered = TimeLedger::recover(ledger.into_store()).unwrap();
        assert!(!recovered.is_tracking());
        assert!(recovered.paused_state().is_none());
    }

    #[test]
    fn today_time_uses_local_day_bounds() {
        let mut ledger = ledger();
        let a = pid("p1");
        ledger.start_at(&a, ts("2025-01-05T23:00:00Z")).unwrap();
        ledger
            .stop_at(ts("2025-01-05T23:30:00Z"), false)
            .unwrap();
        ledger.start_at(&a, ts("2025-01-06T08:00:00Z")).unwrap();
        ledger
            .stop_at(ts("2025-01-06T09:00:00Z"), false)
            .unwrap();

        let now = ts("2025-01-06T12:00:00Z");
        assert_eq!(
            ledger.today_time_at(&a, &Utc, now).unwrap(),
            Duration::hours(1)
        );
        let totals = ledger.today_totals_at(&[a, pid("p9")], &Utc, now).unwrap();
        assert_eq!(totals[1], (pid("p9"), Duration::zero()));
    }

    #[test]
    fn summary_and_daily_include_live_session() {
        let mut ledger = ledger();
        let (a, b) = (pid("p1"), pid("p2"));
        ledger.start_at(&a, ts("2025-01-06T09:00:00Z")).unwrap();
        ledger.start_at(&b, ts("2025-01-06T10:00:00Z")).unwrap();
        let now = ts("2025-01-06T13:00:00Z");

        let projects = vec![
            ProjectRef {
                id: a.clone(),
                name: "Alpha".to_string(),
            },
            ProjectRef {
                id: b.clone(),
                name: "Beta".to_string(),
            },
        ];
        let day = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let (start, end) = day_range(day, &Utc);
        let summary = ledger.project_summary_at(&projects, start, end, now).unwrap();
        assert_eq!(summary.entries[0].project_id, b);
        assert_eq!(summary.entries[0].total, Duration::hours(3));
        assert_eq!(summary.grand_total(), Duration::hours(4));

        let daily = ledger.daily_breakdown_at(day, day, Utc, now).unwrap();
        assert_eq!(daily.get(day, &a), Duration::hours(1));
        assert_eq!(daily.get(day, &b), Duration::hours(3));
    }

    #[test]
    fn sub_microsecond_start_matches_its_logged_event() {
        let mut ledger = ledger();
        let a = pid("p1");
        let start = t0() + Duration::nanoseconds(123_456_789);
        ledger.start_at(&a, start).unwrap();

        let events = ledger.events(&EventQuery::all()).unwrap();
        let live = ledger.live_session().unwrap();
        assert_eq!(live.started_at, events[0].timestamp);
        assert_eq!(live.started_at, t0() + Duration::microseconds(123_456));

        let now = t0() + Duration::minutes(30);
        assert!(ledger.orphaned_sessions(t0(), now).unwrap().is_empty());

        ledger.pause_at(now + Duration::nanoseconds(999)).unwrap();
        let paused = ledger.paused_state().unwrap().pause_started_at;
        let events = ledger.events(&EventQuery::all()).unwrap();
        assert_eq!(paused, events[1].timestamp);
    }
}
