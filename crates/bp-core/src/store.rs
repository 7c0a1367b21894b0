//! The append-only event store contract.

use chrono::{DateTime, Utc};

use crate::event::{Event, EventParseError, EventRecord};
use crate::types::ProjectId;

/// Filter for [`EventStore::query`]. Both bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub project_id: Option<ProjectId>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EventQuery {
    /// Every event in the log.
    pub fn all() -> Self {
        Self::default()
    }

    /// Events for one project within `[start, end]`.
    pub fn project_range(project_id: &ProjectId, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            project_id: Some(project_id.clone()),
            start: Some(start),
            end: Some(end),
        }
    }

    /// Events for every project within `[start, end]`.
    pub const fn range(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            project_id: None,
            start: Some(start),
            end: Some(end),
        }
    }

    /// Whether `event` passes this filter.
    pub fn matches(&self, event: &Event) -> bool {
        self.project_id
            .as_ref()
            .is_none_or(|id| *id == event.project_id)
            && self.start.is_none_or(|start| event.timestamp >= start)
            && self.end.is_none_or(|end| event.timestamp <= end)
    }
}

/// An append-only log of ledger events.
///
/// Appends take `&mut self`, so a single owner serializes writes.
/// `query` must return a consistent snapshot ordered by timestamp then
/// append order, and must fail rather than skip a record it cannot parse.
pub trait EventStore {
    /// The store's error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Durably persists one event.
    fn append(&mut self, event: &Event) -> Result<(), Self::Error>;

    /// Returns the events matching `query`, in log order.
    fn query(&self, query: &EventQuery) -> Result<Vec<Event>, Self::Error>;
}

/// An in-memory [`EventStore`] holding wire records.
///
/// Records are parsed on every query, mirroring a persistent store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<EventRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw record without validation.
    pub fn push_record(&mut self, record: EventRecord) {
        self.records.push(record);
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl EventStore for MemoryStore {
    type Error = EventParseError;

    fn append(&mut self, event: &Event) -> Result<(), Self::Error> {
        self.records.push(EventRecord::from(event));
        Ok(())
    }

    fn query(&self, query: &EventQuery) -> Result<Vec<Event>, Self::Error> {
        let mut events = Vec::new();
        for record in &self.records {
            let event = Event::try_from(record.clone())?;
            if query.matches(&event) {
                events.push(event);
            }
        }
        // Stable sort keeps append order for equal timestamps.
        events.sort_by_key(|event| event.timestamp);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::parse_timestamp;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn pid(id: &str) -> ProjectId {
        ProjectId::new(id).unwrap()
    }

    #[test]
    fn query_orders_by_timestamp_then_append_order() {
        let mut store = MemoryStore::new();
        store
            .append(&Event::stop(pid("p1"), ts("2025-01-01T10:00:00Z"), false))
            .unwrap();
        store
            .append(&Event::start(pid("p1"), ts("2025-01-01T09:00:00Z")))
            .unwrap();
        store
            .append(&Event::adjustment(pid("p1"), 5, None, ts("2025-01-01T10:00:00Z")))
            .unwrap();

        let events = store.query(&EventQuery::all()).unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, ["start", "stop", "adjustment"]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let mut store = MemoryStore::new();
        for at in ["2025-01-01T08:00:00Z", "2025-01-01T09:00:00Z", "2025-01-01T10:00:00Z"] {
            store.append(&Event::start(pid("p1"), ts(at))).unwrap();
        }
        store
            .append(&Event::start(pid("p2"), ts("2025-01-01T09:30:00Z")))
            .unwrap();

        let query = EventQuery::project_range(
            &pid("p1"),
            ts("2025-01-01T09:00:00Z"),
            ts("2025-01-01T10:00:00Z"),
        );
        let events = store.query(&query).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.project_id == pid("p1")));
    }

    #[test]
    fn malformed_record_fails_the_whole_query() {
        let mut store = MemoryStore::new();
        store
            .append(&Event::start(pid("p1"), ts("2025-01-01T09:00:00Z")))
            .unwrap();
        store.push_record(EventRecord {
            project_id: "p1".to_string(),
            event: "stop".to_string(),
            timestamp: "not a time".to_string(),
            minutes: None,
            description: None,
            auto_pause: false,
        });

        let result = store.query(&EventQuery::all());
        assert!(matches!(
            result,
            Err(EventParseError::TimestampParse { .. })
        ));
    }
}
