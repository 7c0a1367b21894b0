//! Storage layer for the time tracker.
//!
//! Provides persistence for the event log and the project list using
//! `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved into a `Mutex` and shared with the idle watcher,
//! but cannot be shared across threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in fixed-width RFC 3339 with microseconds
//! (e.g., `2024-01-15T10:30:00.000000Z`), so lexicographic order matches
//! chronological order for everything this crate writes. Rows written by
//! other tools may use a different precision; queries therefore re-sort by
//! the parsed timestamp before returning.
//!
//! ## Append Order
//!
//! `events.seq` is an `AUTOINCREMENT` key. Events with equal timestamps are
//! returned in `seq` order, which is the order they were appended.

use std::path::Path;

use bp_core::{
    Event, EventParseError, EventQuery, EventRecord, EventStore, ProjectId, ValidationError,
};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored event could not be parsed.
    #[error("invalid event at seq {seq}: {source}")]
    InvalidEvent {
        seq: i64,
        #[source]
        source: EventParseError,
    },
    /// A stored project id is blank.
    #[error(transparent)]
    InvalidProjectId(#[from] ValidationError),
    /// No project has the given id.
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),
    /// Project names must not be blank.
    #[error("project name cannot be empty")]
    EmptyName,
}

/// A tracked project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Archived projects keep their history but are hidden from listings.
    pub active: bool,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), "opened database");
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Events table: the append-only ledger log
            -- timestamp: RFC 3339 text (e.g., '2024-01-15T10:30:00.000000Z')
            -- event: kind (e.g., 'start', 'pause_adjustment')
            -- minutes: signed, only meaningful for adjustments
            CREATE TABLE IF NOT EXISTS events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id TEXT NOT NULL,
                event TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                minutes INTEGER,
                description TEXT,
                auto_pause INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_events_project_timestamp
                ON events(project_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                position INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ========== Events ==========

    /// Inserts a raw record without validating it.
    ///
    /// Used for importing and for exercising error paths; the ledger always
    /// goes through [`EventStore::append`].
    pub fn insert_record(&mut self, record: &EventRecord) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO events (project_id, event, timestamp, minutes, description, auto_pause)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                record.project_id,
                record.event,
                record.timestamp,
                record.minutes,
                record.description,
                record.auto_pause,
            ],
        )?;
        Ok(())
    }

    /// Number of events in the log.
    pub fn event_count(&self) -> Result<usize, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn select_records(
        &self,
        project_id: Option<&ProjectId>,
    ) -> Result<Vec<(i64, EventRecord)>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT seq, project_id, event, timestamp, minutes, description, auto_pause
            FROM events
            WHERE ?1 IS NULL OR project_id = ?1
            ORDER BY timestamp ASC, seq ASC
            ",
        )?;
        let rows = stmt.query_map(params![project_id.map(ProjectId::as_str)], |row| {
            Ok((
                row.get(0)?,
                EventRecord {
                    project_id: row.get(1)?,
                    event: row.get(2)?,
                    timestamp: row.get(3)?,
                    minutes: row.get(4)?,
                    description: row.get(5)?,
                    auto_pause: row.get(6)?,
                },
            ))
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    // ========== Projects ==========

    /// Lists projects in creation order, optionally including archived ones.
    pub fn list_projects(&self, include_archived: bool) -> Result<Vec<Project>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, name, active
            FROM projects
            WHERE active = 1 OR ?1
            ORDER BY position ASC
            ",
        )?;
        let rows = stmt.query_map([include_archived], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;
        let mut projects = Vec::new();
        for row in rows {
            let (id, name, active) = row?;
            projects.push(project_from_row(id, name, active)?);
        }
        Ok(projects)
    }

    /// Looks up one project, archived or not.
    pub fn project(&self, id: &ProjectId) -> Result<Option<Project>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, active FROM projects WHERE id = ?",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, name, active)| project_from_row(id, name, active))
            .transpose()
    }

    /// Creates a project named `name` with the next free `pN` id.
    pub fn add_project(&mut self, name: &str) -> Result<Project, DbError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DbError::EmptyName);
        }

        let tx = self.conn.transaction()?;
        let next_number = {
            let mut stmt = tx.prepare("SELECT id FROM projects")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut highest = 0;
            for row in rows {
                highest = highest.max(id_number(&row?).unwrap_or(0));
            }
            highest + 1
        };
        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM projects",
            [],
            |row| row.get(0),
        )?;
        let id = format!("p{next_number}");
        tx.execute(
            "INSERT INTO projects (id, name, active, position) VALUES (?, ?, 1, ?)",
            params![id, name, position],
        )?;
        tx.commit()?;

        tracing::info!(project = %id, name, "added project");
        Ok(Project {
            id: ProjectId::new(id)?,
            name: name.to_string(),
            active: true,
        })
    }

    pub fn rename_project(&mut self, id: &ProjectId, name: &str) -> Result<(), DbError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DbError::EmptyName);
        }
        let changed = self.conn.execute(
            "UPDATE projects SET name = ? WHERE id = ?",
            params![name, id.as_str()],
        )?;
        if changed == 0 {
            return Err(DbError::ProjectNotFound(id.clone()));
        }
        tracing::info!(project = %id, name, "renamed project");
        Ok(())
    }

    /// Archives (`active = false`) or restores a project.
    pub fn set_project_active(&mut self, id: &ProjectId, active: bool) -> Result<(), DbError> {
        let changed = self.conn.execute(
            "UPDATE projects SET active = ? WHERE id = ?",
            params![active, id.as_str()],
        )?;
        if changed == 0 {
            return Err(DbError::ProjectNotFound(id.clone()));
        }
        tracing::info!(project = %id, active, "updated project");
        Ok(())
    }
}

impl EventStore for Database {
    type Error = DbError;

    fn append(&mut self, event: &Event) -> Result<(), Self::Error> {
        self.insert_record(&EventRecord::from(event))?;
        tracing::debug!(project = %event.project_id, kind = %event.kind, "appended event");
        Ok(())
    }

    fn query(&self, query: &EventQuery) -> Result<Vec<Event>, Self::Error> {
        let records = self.select_records(query.project_id.as_ref())?;
        let scanned = records.len();

        let mut events = Vec::new();
        for (seq, record) in records {
            let event =
                Event::try_from(record).map_err(|source| DbError::InvalidEvent { seq, source })?;
            if query.matches(&event) {
                events.push(event);
            }
        }
        // Rows arrive in seq order within equal text timestamps; the stable
        // sort keeps that order.
        events.sort_by_key(|event| event.timestamp);

        tracing::debug!(scanned, matched = events.len(), "queried events");
        Ok(events)
    }
}

fn project_from_row(id: String, name: String, active: bool) -> Result<Project, DbError> {
    Ok(Project {
        id: ProjectId::new(id)?,
        name,
        active,
    })
}

/// Numeric suffix of a `pN` id.
fn id_number(id: &str) -> Option<u64> {
    id.strip_prefix('p')?.parse().ok()
}
