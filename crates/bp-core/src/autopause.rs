//! Wiring between idle detection and the ledger.

use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::idle::{HookResult, IdleEpisode, IdleListener};
use crate::ledger::{LedgerError, TimeLedger};
use crate::store::EventStore;

/// Access to a ledger for the duration of one idle transition.
///
/// In-process callers share an `Arc<Mutex<TimeLedger>>`; a CLI whose log is
/// also written by other processes can instead reload the ledger under a
/// file lock on every call.
pub trait LedgerAccess: Send + Sync {
    type Store: EventStore;

    fn with_ledger<T>(
        &self,
        f: impl FnOnce(&mut TimeLedger<Self::Store>) -> Result<T, LedgerError>,
    ) -> Result<T, Box<dyn Error + Send + Sync>>;
}

impl<S: EventStore + Send> LedgerAccess for Arc<Mutex<TimeLedger<S>>> {
    type Store = S;

    fn with_ledger<T>(
        &self,
        f: impl FnOnce(&mut TimeLedger<Self::Store>) -> Result<T, LedgerError>,
    ) -> Result<T, Box<dyn Error + Send + Sync>> {
        let mut ledger = self.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut *ledger)?)
    }
}

/// Pauses the ledger when the user goes idle and resumes it on activity.
///
/// Only a pause this listener made is ever resumed. A paused state left in
/// the log by an earlier process stays paused until an explicit resume.
pub struct AutoPause<A> {
    access: A,
    /// `pause_started_at` of the pause made by the current idle episode.
    own_pause: Mutex<Option<DateTime<Utc>>>,
}

impl<A: LedgerAccess> AutoPause<A> {
    pub const fn new(access: A) -> Self {
        Self {
            access,
            own_pause: Mutex::new(None),
        }
    }

    fn own_pause(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.own_pause.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A: LedgerAccess> IdleListener for AutoPause<A> {
    fn on_idle(&self, episode: &IdleEpisode) -> HookResult {
        let paused_at = self.access.with_ledger(|ledger| {
            Ok(if ledger.pause_at(episode.detected_at)? {
                ledger.paused_state().map(|paused| paused.pause_started_at)
            } else {
                None
            })
        })?;
        if paused_at.is_none() {
            tracing::debug!("idle with nothing live");
        }
        *self.own_pause() = paused_at;
        Ok(())
    }

    fn on_resume(&self, _episode: &IdleEpisode, resumed_at: DateTime<Utc>) -> HookResult {
        let Some(paused_at) = self.own_pause().take() else {
            tracing::debug!("activity after an idle episode that paused nothing");
            return Ok(());
        };

        let resumed = self.access.with_ledger(|ledger| {
            let still_ours = ledger
                .paused_state()
                .is_some_and(|paused| paused.pause_started_at == paused_at);
            if still_ours {
                ledger.resume_at(resumed_at)
            } else {
                Ok(None)
            }
        })?;
        if resumed.is_none() {
            tracing::info!("auto-pause was superseded; not resuming");
        }
        Ok(())
    }
}
