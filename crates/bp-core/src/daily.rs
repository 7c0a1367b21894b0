//! Day-by-day breakdown of reconstructed sessions.
//!
//! Sessions that cross local midnight are split so each calendar day only
//! receives the part of the session that happened on it. Adjustments land on
//! the day of their own timestamp.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::calendar::{local_date, local_midnight};
use crate::event::Event;
use crate::event_kind::EventKind;
use crate::types::ProjectId;

/// Per-day, per-project durations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyBreakdown {
    pub days: BTreeMap<NaiveDate, BTreeMap<ProjectId, Duration>>,
}

impl DailyBreakdown {
    /// Duration for one project on one day, zero when absent.
    pub fn get(&self, date: NaiveDate, project_id: &ProjectId) -> Duration {
        self.days
            .get(&date)
            .and_then(|projects| projects.get(project_id))
            .copied()
            .unwrap_or_else(Duration::zero)
    }

    /// Sum across all projects for one day.
    pub fn day_total(&self, date: NaiveDate) -> Duration {
        self.days
            .get(&date)
            .map_or_else(Duration::zero, |projects| projects.values().copied().sum())
    }

    /// Every project appearing on any day, sorted by id.
    pub fn projects(&self) -> BTreeSet<&ProjectId> {
        self.days.values().flat_map(BTreeMap::keys).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    fn add(&mut self, date: NaiveDate, project_id: &ProjectId, amount: Duration) {
        *self
            .days
            .entry(date)
            .or_default()
            .entry(project_id.clone())
            .or_insert_with(Duration::zero) += amount;
    }
}

/// A day row flattened for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub project_id: ProjectId,
    pub minutes: i64,
}

impl DailyBreakdown {
    /// Flattens into rows ordered by date, then project id.
    pub fn rows(&self) -> Vec<DailyRow> {
        self.days
            .iter()
            .flat_map(|(date, projects)| {
                projects.iter().map(|(project_id, duration)| DailyRow {
                    date: *date,
                    project_id: project_id.clone(),
                    minutes: duration.num_minutes(),
                })
            })
            .collect()
    }
}

/// Splits sessions across local calendar days in a given time zone.
#[derive(Debug, Clone)]
pub struct DailyAggregator<Tz: TimeZone> {
    tz: Tz,
    live: Option<(ProjectId, DateTime<Utc>)>,
}

impl<Tz: TimeZone> DailyAggregator<Tz> {
    pub const fn new(tz: Tz) -> Self {
        Self { tz, live: None }
    }

    /// Closes `project_id`'s unterminated session at `now` instead of
    /// ignoring it.
    #[must_use]
    pub fn with_live(mut self, project_id: ProjectId, now: DateTime<Utc>) -> Self {
        self.live = Some((project_id, now));
        self
    }

    /// Builds the breakdown for events from any number of projects.
    pub fn aggregate(&self, events: &[Event]) -> DailyBreakdown {
        let mut ordered: Vec<&Event> = events.iter().collect();
        ordered.sort_by_key(|event| event.timestamp);

        let mut breakdown = DailyBreakdown::default();
        let mut open: HashMap<&ProjectId, DateTime<Utc>> = HashMap::new();

        for event in ordered {
            match event.kind {
                EventKind::Start => {
                    open.insert(&event.project_id, event.timestamp);
                }
                EventKind::Stop | EventKind::AutoPause => {
                    if let Some(start) = open.remove(&event.project_id) {
                        self.split_session(&mut breakdown, &event.project_id, start, event.timestamp);
                    }
                }
                EventKind::Adjustment | EventKind::PauseAdjustment => {
                    let date = local_date(event.timestamp, &self.tz);
                    breakdown.add(date, &event.project_id, event.adjustment_delta());
                }
            }
        }

        if let Some((project_id, now)) = &self.live {
            if let Some(start) = open.get(project_id) {
                self.split_session(&mut breakdown, project_id, *start, *now);
            }
        }

        breakdown
    }

    fn split_session(
        &self,
        breakdown: &mut DailyBreakdown,
        project_id: &ProjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) {
        if end < start {
            return;
        }
        let first_day = local_date(start, &self.tz);
        let last_day = local_date(end, &self.tz);

        if first_day == last_day {
            breakdown.add(first_day, project_id, end - start);
            return;
        }

        let mut day = first_day;
        let mut segment_start = start;
        while day < last_day {
            let next_midnight = local_midnight(day + Duration::days(1), &self.tz);
            breakdown.add(day, project_id, next_midnight - segment_start);
            segment_start = next_midnight;
            day += Duration::days(1);
        }
        breakdown.add(last_day, project_id, end - segment_start);
    }
}
