//! Duration reconstruction by replaying the event log.
//!
//! Replay is a pure function of the events it is given: each `Start` opens a
//! session, the next `Stop`/`AutoPause` closes it, and adjustments add their
//! signed minutes regardless of session state.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::event::Event;
use crate::event_kind::EventKind;
use crate::types::ProjectId;

/// Result of replaying one project's events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    /// Closed sessions plus adjustments.
    pub total: Duration,
    /// A `Start` still waiting for its terminator at the end of the events.
    pub open_start: Option<DateTime<Utc>>,
    /// Starts that were superseded by a later `Start` before any terminator.
    pub superseded_starts: Vec<DateTime<Utc>>,
}

impl Replay {
    /// Total including the still-running interval up to `now` when the open
    /// start belongs to the live session.
    pub fn total_at(&self, is_live: bool, now: DateTime<Utc>) -> Duration {
        match self.open_start {
            Some(start) if is_live => self.total + (now - start),
            _ => self.total,
        }
    }
}

/// A `Start` with no matching terminator that is not the live session.
///
/// These intervals contribute nothing to computed totals; they typically
/// come from a process that exited mid-session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedSession {
    pub project_id: ProjectId,
    pub started_at: DateTime<Utc>,
}

/// Replays a single project's events, which must already be in log order.
pub fn replay<'a, I>(events: I) -> Replay
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut total = Duration::zero();
    let mut last_start: Option<DateTime<Utc>> = None;
    let mut superseded_starts = Vec::new();

    for event in events {
        match event.kind {
            EventKind::Start => {
                if let Some(previous) = last_start.replace(event.timestamp) {
                    superseded_starts.push(previous);
                }
            }
            EventKind::Stop | EventKind::AutoPause => {
                if let Some(start) = last_start.take() {
                    total += event.timestamp - start;
                }
            }
            EventKind::Adjustment | EventKind::PauseAdjustment => {
                total += event.adjustment_delta();
            }
        }
    }

    Replay {
        total,
        open_start: last_start,
        superseded_starts,
    }
}

/// Collects orphaned sessions from one project's replay.
///
/// `live_start` is the live session's start when this project is live.
pub fn orphans_from(
    project_id: &ProjectId,
    replay: &Replay,
    live_start: Option<DateTime<Utc>>,
) -> Vec<OrphanedSession> {
    let mut orphans: Vec<OrphanedSession> = replay
        .superseded_starts
        .iter()
        .map(|&started_at| OrphanedSession {
            project_id: project_id.clone(),
            started_at,
        })
        .collect();

    if let Some(open) = replay.open_start {
        if live_start != Some(open) {
            orphans.push(OrphanedSession {
                project_id: project_id.clone(),
                started_at: open,
            });
        }
    }
    orphans
}
