//! Ledger events and their wire representation.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event_kind::{EventKind, UnknownEventKind};
use crate::types::{ProjectId, ValidationError};

/// One immutable, timestamped fact in the ledger.
///
/// Events are only ever appended. Ordering is by `timestamp`, with ties
/// broken by append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EventRecord", into = "EventRecord")]
pub struct Event {
    pub project_id: ProjectId,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    /// Signed minutes, present only for adjustment kinds.
    pub minutes: Option<i64>,
    pub description: Option<String>,
    pub auto_pause: bool,
}

impl Event {
    /// A session start.
    pub const fn start(project_id: ProjectId, timestamp: DateTime<Utc>) -> Self {
        Self {
            project_id,
            kind: EventKind::Start,
            timestamp,
            minutes: None,
            description: None,
            auto_pause: false,
        }
    }

    /// A session end, either manual (`Stop`) or idle-driven (`AutoPause`).
    pub const fn stop(project_id: ProjectId, timestamp: DateTime<Utc>, auto_pause: bool) -> Self {
        Self {
            project_id,
            kind: if auto_pause {
                EventKind::AutoPause
            } else {
                EventKind::Stop
            },
            timestamp,
            minutes: None,
            description: None,
            auto_pause,
        }
    }

    /// A manual correction of `minutes` (may be negative or zero).
    pub const fn adjustment(
        project_id: ProjectId,
        minutes: i64,
        description: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            project_id,
            kind: EventKind::Adjustment,
            timestamp,
            minutes: Some(minutes),
            description,
            auto_pause: false,
        }
    }

    /// The correction recorded on resume, removing idle time.
    pub const fn pause_adjustment(
        project_id: ProjectId,
        minutes: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            project_id,
            kind: EventKind::PauseAdjustment,
            timestamp,
            minutes: Some(minutes),
            description: None,
            auto_pause: true,
        }
    }

    /// The signed duration this event contributes regardless of session state.
    ///
    /// Zero for non-adjustment kinds and for adjustments without minutes.
    pub fn adjustment_delta(&self) -> Duration {
        if self.kind.is_adjustment() {
            Duration::minutes(self.minutes.unwrap_or(0))
        } else {
            Duration::zero()
        }
    }
}

/// Errors converting a stored record into an [`Event`].
#[derive(Debug, Error)]
pub enum EventParseError {
    /// The timestamp is not valid RFC 3339.
    #[error("invalid timestamp {timestamp:?}")]
    TimestampParse {
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// The `event` field names no known kind.
    #[error(transparent)]
    UnknownKind(#[from] UnknownEventKind),
    /// The project id is blank.
    #[error(transparent)]
    Project(#[from] ValidationError),
}

/// The on-disk/on-wire shape of an event.
///
/// ```json
/// { "project_id": "p1", "event": "adjustment", "timestamp": "2025-01-01T10:00:00.000000Z",
///   "minutes": -15, "description": "lunch", "auto_pause": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub project_id: String,
    pub event: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub auto_pause: bool,
}

impl TryFrom<EventRecord> for Event {
    type Error = EventParseError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&record.timestamp)?;
        let kind: EventKind = record.event.parse()?;
        let minutes = if kind.is_adjustment() {
            record.minutes
        } else {
            None
        };
        Ok(Self {
            project_id: ProjectId::new(record.project_id)?,
            kind,
            timestamp,
            minutes,
            description: record.description,
            auto_pause: record.auto_pause,
        })
    }
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        Self {
            project_id: event.project_id.into(),
            event: event.kind.as_str().to_string(),
            timestamp: format_timestamp(event.timestamp),
            minutes: event.minutes,
            description: event.description,
            auto_pause: event.auto_pause,
        }
    }
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        event.clone().into()
    }
}

/// Parses an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, EventParseError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| EventParseError::TimestampParse {
            timestamp: timestamp.to_string(),
            source,
        })
}

/// `timestamp` at the microsecond precision the log stores.
pub fn stored_precision(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(6)
}

/// Formats a timestamp as fixed-width RFC 3339 in UTC.
///
/// Fixed width keeps lexicographic order equal to chronological order.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}
