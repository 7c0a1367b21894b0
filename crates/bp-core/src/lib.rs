//! Core domain logic for the time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - The event log: the append-only record of starts, stops and adjustments
//! - The ledger: live tracking state and totals rebuilt from the log
//! - Reports: ranked project summaries and per-day breakdowns
//! - Idle detection: auto-pausing when the user stops interacting

pub mod autopause;
pub mod calendar;
pub mod daily;
pub mod event;
pub mod event_kind;
pub mod idle;
pub mod ledger;
pub mod replay;
pub mod store;
pub mod summary;
pub mod types;

pub use autopause::{AutoPause, LedgerAccess};
pub use daily::{DailyAggregator, DailyBreakdown, DailyRow};
pub use event::{
    Event, EventParseError, EventRecord, format_timestamp, parse_timestamp, stored_precision,
};
pub use event_kind::{EventKind, UnknownEventKind};
pub use idle::{
    HookResult, IdleCause, IdleConfig, IdleCoordinator, IdleEpisode, IdleListener,
};
pub use ledger::{
    LedgerError, LiveSession, PausedState, Resumed, StartOutcome, StoppedSession, TimeLedger,
    TrackingStatus,
};
pub use replay::OrphanedSession;
pub use store::{EventQuery, EventStore, MemoryStore};
pub use summary::{ProjectRef, ProjectSummary, ProjectTotal, ProjectTotalJson, SummaryBuilder};
pub use types::{ProjectId, ValidationError};
