//! Idle and system-sleep detection.
//!
//! [`IdleCoordinator`] watches activity signals and a background poll loop.
//! When the user has been inactive for the idle timeout it fires the idle
//! hook; the next activity after that fires the resume hook. Each hook fires
//! at most once per idle episode.
//!
//! # Locking
//!
//! The activity state (`last_activity` plus the current episode) sits behind
//! one mutex that is only held for a read-modify-write. A second mutex owns
//! the hooks and stays held while a hook runs; it is taken before the state
//! mutex, never after.
//!
//! A hook may therefore only use the state accessors: [`IdleCoordinator::is_idle`],
//! [`IdleCoordinator::idle_time`] and [`IdleCoordinator::reset`] (plus their
//! `_at` forms). Calling `notify_activity`, `check_at`, any `set_*` method or
//! [`IdleCoordinator::stop`] from a hook can deadlock.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

/// What a hook returns; errors are logged and never stop the watcher.
pub type HookResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type IdleHook = Box<dyn Fn(&IdleEpisode) -> HookResult + Send + Sync>;
type ResumeHook = Box<dyn Fn(&IdleEpisode, DateTime<Utc>) -> HookResult + Send + Sync>;

/// Timing configuration for idle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleConfig {
    /// Inactivity needed before the idle hook fires.
    pub idle_timeout: StdDuration,
    /// How often the watcher polls.
    pub poll_interval: StdDuration,
    /// A poll-to-poll gap longer than this means the host was suspended.
    pub sleep_gap: StdDuration,
    /// How long [`IdleCoordinator::stop`] waits for the watcher to exit.
    pub stop_timeout: StdDuration,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            idle_timeout: StdDuration::from_secs(5 * 60),
            poll_interval: StdDuration::from_secs(1),
            sleep_gap: StdDuration::from_secs(5),
            stop_timeout: StdDuration::from_secs(2),
        }
    }
}

/// Why an idle episode began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleCause {
    /// No activity for the idle timeout.
    Inactivity,
    /// The watcher observed a sleep gap.
    SystemSleep,
}

/// One idle episode, from the last activity to its detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleEpisode {
    pub idle_since: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    pub cause: IdleCause,
}

/// Observer for idle transitions.
pub trait IdleListener: Send + Sync {
    /// Called once when an idle episode begins.
    fn on_idle(&self, episode: &IdleEpisode) -> HookResult;

    /// Called once when activity ends the episode.
    fn on_resume(&self, episode: &IdleEpisode, resumed_at: DateTime<Utc>) -> HookResult;
}

#[derive(Default)]
struct Hooks {
    on_idle: Option<IdleHook>,
    on_resume: Option<ResumeHook>,
}

#[derive(Debug)]
struct ActivityState {
    last_activity: DateTime<Utc>,
    episode: Option<IdleEpisode>,
}

impl ActivityState {
    /// One poll step. Returns the episode that just began, if any.
    fn poll(
        &mut self,
        config: &IdleConfig,
        last_poll: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<IdleEpisode> {
        if self.episode.is_some() {
            return None;
        }

        let slept = now - last_poll > to_chrono(config.sleep_gap);
        if slept && self.last_activity > last_poll {
            // Activity seen after a suspension happened on wake; the gap
            // itself was inactive.
            self.last_activity = last_poll;
        }

        if now - self.last_activity < to_chrono(config.idle_timeout) {
            return None;
        }

        let episode = IdleEpisode {
            idle_since: self.last_activity,
            detected_at: now,
            cause: if slept {
                IdleCause::SystemSleep
            } else {
                IdleCause::Inactivity
            },
        };
        self.episode = Some(episode);
        Some(episode)
    }
}

struct Shared {
    config: IdleConfig,
    state: Mutex<ActivityState>,
    hooks: Mutex<Hooks>,
    accepting: AtomicBool,
}

impl Shared {
    fn check(&self, last_poll: DateTime<Utc>, now: DateTime<Utc>) {
        let hooks = lock(&self.hooks);
        if !self.accepting.load(Ordering::SeqCst) {
            return;
        }

        let started = lock(&self.state).poll(&self.config, last_poll, now);
        let Some(episode) = started else {
            return;
        };

        tracing::info!(
            idle_since = %episode.idle_since,
            cause = ?episode.cause,
            "user went idle"
        );
        if let Some(on_idle) = hooks.on_idle.as_ref() {
            run_hook("idle", || on_idle(&episode));
        }
    }

    fn activity(&self, now: DateTime<Utc>) {
        {
            let mut state = lock(&self.state);
            if state.episode.is_none() {
                state.last_activity = now;
                return;
            }
        }

        let hooks = lock(&self.hooks);
        let ended = {
            let mut state = lock(&self.state);
            state.last_activity = now;
            state.episode.take()
        };
        let Some(episode) = ended else {
            return;
        };
        if !self.accepting.load(Ordering::SeqCst) {
            return;
        }

        tracing::info!(
            idle_secs = (now - episode.idle_since).num_seconds(),
            "user active again"
        );
        if let Some(on_resume) = hooks.on_resume.as_ref() {
            run_hook("resume", || on_resume(&episode, now));
        }
    }
}

struct Worker {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Drives automatic pause/resume from activity signals.
///
/// The coordinator knows nothing about what its hooks do; wire them with
/// [`set_listener`](Self::set_listener) or the individual setters.
pub struct IdleCoordinator {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl IdleCoordinator {
    pub fn new(config: IdleConfig) -> Self {
        Self::new_at(config, Utc::now())
    }

    /// A coordinator whose last activity is `now`.
    pub fn new_at(config: IdleConfig, now: DateTime<Utc>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(ActivityState {
                    last_activity: now,
                    episode: None,
                }),
                hooks: Mutex::new(Hooks::default()),
                accepting: AtomicBool::new(true),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &IdleConfig {
        &self.shared.config
    }

    pub fn set_idle_callback<F>(&self, callback: F)
    where
        F: Fn(&IdleEpisode) -> HookResult + Send + Sync + 'static,
    {
        lock(&self.shared.hooks).on_idle = Some(Box::new(callback));
    }

    pub fn set_resume_callback<F>(&self, callback: F)
    where
        F: Fn(&IdleEpisode, DateTime<Utc>) -> HookResult + Send + Sync + 'static,
    {
        lock(&self.shared.hooks).on_resume = Some(Box::new(callback));
    }

    /// Routes both hooks to `listener`.
    pub fn set_listener<L: IdleListener + 'static>(&self, listener: Arc<L>) {
        let on_resume = Arc::clone(&listener);
        let mut hooks = lock(&self.shared.hooks);
        hooks.on_idle = Some(Box::new(move |episode: &IdleEpisode| {
            listener.on_idle(episode)
        }));
        hooks.on_resume = Some(Box::new(
            move |episode: &IdleEpisode, at: DateTime<Utc>| on_resume.on_resume(episode, at),
        ));
    }

    /// Records user activity now.
    pub fn notify_activity(&self) {
        self.notify_activity_at(Utc::now());
    }

    /// Records user activity; ends the idle episode if there is one.
    pub fn notify_activity_at(&self, now: DateTime<Utc>) {
        self.shared.activity(now);
    }

    /// Runs one poll step as the watcher would, comparing against the
    /// previous poll at `last_poll`.
    pub fn check_at(&self, last_poll: DateTime<Utc>, now: DateTime<Utc>) {
        self.shared.check(last_poll, now);
    }

    pub fn is_idle(&self) -> bool {
        lock(&self.shared.state).episode.is_some()
    }

    pub fn idle_time(&self) -> Duration {
        self.idle_time_at(Utc::now())
    }

    /// How long the current idle episode has lasted; zero when active.
    pub fn idle_time_at(&self, now: DateTime<Utc>) -> Duration {
        let state = lock(&self.shared.state);
        if state.episode.is_some() {
            now - state.last_activity
        } else {
            Duration::zero()
        }
    }

    pub fn reset(&self) {
        self.reset_at(Utc::now());
    }

    /// Marks activity at `now` without firing any hook.
    pub fn reset_at(&self, now: DateTime<Utc>) {
        let mut state = lock(&self.shared.state);
        state.last_activity = now;
        state.episode = None;
    }

    pub fn is_running(&self) -> bool {
        lock(&self.worker).is_some()
    }

    /// Spawns the watcher thread. Does nothing if it is already running.
    pub fn start(&self) -> std::io::Result<()> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(());
        }

        self.reset_at(Utc::now());
        self.shared.accepting.store(true, Ordering::SeqCst);

        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("idle-watcher".to_string())
            .spawn(move || watch(&shared, &stop_rx, &done_tx))?;

        *worker = Some(Worker {
            stop_tx,
            done_rx,
            handle,
        });
        tracing::info!(
            idle_timeout_secs = self.shared.config.idle_timeout.as_secs(),
            poll_ms = self.shared.config.poll_interval.as_millis(),
            "idle watcher started"
        );
        Ok(())
    }

    /// Stops the watcher and waits up to `stop_timeout` for it to exit.
    ///
    /// No hook fires after this returns, including from activity
    /// notifications. Returns `false` if the watcher had to be detached.
    pub fn stop(&self) -> bool {
        self.shared.accepting.store(false, Ordering::SeqCst);

        let joined = match lock(&self.worker).take() {
            None => true,
            Some(worker) => {
                // The watcher may already be gone; that is fine.
                let _ = worker.stop_tx.send(());
                match worker.done_rx.recv_timeout(self.shared.config.stop_timeout) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        if worker.handle.join().is_err() {
                            tracing::error!("idle watcher panicked");
                        }
                        true
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        tracing::warn!("idle watcher did not stop in time; detaching");
                        false
                    }
                }
            }
        };

        // Wait out a hook that was already running.
        drop(lock(&self.shared.hooks));
        tracing::debug!(joined, "idle watcher stopped");
        joined
    }
}

impl Drop for IdleCoordinator {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

fn watch(shared: &Shared, stop_rx: &Receiver<()>, done_tx: &Sender<()>) {
    let mut last_poll = Utc::now();
    loop {
        match stop_rx.recv_timeout(shared.config.poll_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        let now = Utc::now();
        shared.check(last_poll, now);
        last_poll = now;
    }
    let _ = done_tx.send(());
}

fn run_hook(name: &str, hook: impl FnOnce() -> HookResult) {
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(hook = name, error = %err, "idle hook failed"),
        Err(_) => tracing::error!(hook = name, "idle hook panicked"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_chrono(duration: StdDuration) -> Duration {
    Duration::from_std(duration).unwrap_or_else(|_| Duration::days(365 * 100))
}
