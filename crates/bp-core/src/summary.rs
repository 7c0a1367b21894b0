//! Per-project totals for a date range, ranked by time worked.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::event::Event;
use crate::replay::replay;
use crate::types::ProjectId;

/// A project as the summary needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub id: ProjectId,
    pub name: String,
}

/// One ranked summary line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTotal {
    pub project_id: ProjectId,
    pub project_name: String,
    pub total: Duration,
}

impl ProjectTotal {
    /// Total as fractional hours.
    #[allow(clippy::cast_precision_loss)]
    pub fn total_hours(&self) -> f64 {
        self.total.num_seconds() as f64 / 3600.0
    }
}

/// Ranked totals for a range plus their sum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSummary {
    pub entries: Vec<ProjectTotal>,
}

impl ProjectSummary {
    /// Sum of every entry.
    pub fn grand_total(&self) -> Duration {
        self.entries.iter().map(|entry| entry.total).sum()
    }
}

/// JSON shape of one summary line.
#[derive(Debug, Serialize)]
pub struct ProjectTotalJson<'a> {
    pub project_id: &'a ProjectId,
    pub project_name: &'a str,
    pub total_minutes: i64,
    pub total_hours: f64,
}

impl<'a> From<&'a ProjectTotal> for ProjectTotalJson<'a> {
    fn from(entry: &'a ProjectTotal) -> Self {
        Self {
            project_id: &entry.project_id,
            project_name: &entry.project_name,
            total_minutes: entry.total.num_minutes(),
            total_hours: entry.total_hours(),
        }
    }
}

/// Builds a [`ProjectSummary`] from the events of a range.
#[derive(Debug, Clone, Default)]
pub struct SummaryBuilder {
    live: Option<ProjectId>,
    now: Option<DateTime<Utc>>,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `project_id`'s unterminated session up to `now`.
    #[must_use]
    pub fn with_live(mut self, project_id: Option<ProjectId>, now: DateTime<Utc>) -> Self {
        self.live = project_id;
        self.now = Some(now);
        self
    }

    /// Replays each project independently and ranks them by total,
    /// descending. Equal totals keep the order of `projects`.
    pub fn build(&self, projects: &[ProjectRef], events: &[Event]) -> ProjectSummary {
        let mut by_project: HashMap<&ProjectId, Vec<&Event>> = HashMap::new();
        for event in events {
            by_project.entry(&event.project_id).or_default().push(event);
        }

        let mut entries: Vec<ProjectTotal> = projects
            .par_iter()
            .map(|project| {
                let replayed = by_project
                    .get(&project.id)
                    .map(|events| replay(events.iter().copied()))
                    .unwrap_or_else(|| replay(std::iter::empty()));
                let is_live = self.live.as_ref() == Some(&project.id);
                let total = match self.now {
                    Some(now) => replayed.total_at(is_live, now),
                    None => replayed.total,
                };
                ProjectTotal {
                    project_id: project.id.clone(),
                    project_name: project.name.clone(),
                    total,
                }
            })
            .collect();

        // sort_by is stable
        entries.sort_by(|a, b| b.total.cmp(&a.total));
        ProjectSummary { entries }
    }
}
