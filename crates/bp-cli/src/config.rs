//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bp_core::IdleConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Seconds without activity before the watcher auto-pauses.
    pub idle_timeout_secs: u64,
    /// How often the watcher polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// A poll arriving this many seconds late is treated as system sleep.
    pub sleep_gap_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("sleep_gap_secs", &self.sleep_gap_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let idle = IdleConfig::default();
        Self {
            database_path: data_dir.join("bp.db"),
            idle_timeout_secs: idle.idle_timeout.as_secs(),
            poll_interval_ms: u64::try_from(idle.poll_interval.as_millis()).unwrap_or(1000),
            sleep_gap_secs: idle.sleep_gap.as_secs(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (BP_*)
        figment = figment.merge(Env::prefixed("BP_"));

        figment.extract()
    }

    /// Idle watcher settings.
    ///
    /// A sleep gap no longer than the poll interval would report every late
    /// poll as a suspension, so it falls back to the default.
    pub fn idle_config(&self) -> IdleConfig {
        let defaults = IdleConfig::default();
        let poll_interval = Duration::from_millis(self.poll_interval_ms.max(1));
        let mut sleep_gap = Duration::from_secs(self.sleep_gap_secs);
        if sleep_gap <= poll_interval {
            tracing::warn!(
                sleep_gap_secs = self.sleep_gap_secs,
                poll_interval_ms = self.poll_interval_ms,
                "sleep gap must exceed the poll interval; using the default"
            );
            sleep_gap = defaults.sleep_gap.max(poll_interval * 2);
        }
        IdleConfig {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            poll_interval,
            sleep_gap,
            ..defaults
        }
    }
}

/// Returns the platform-specific config directory for bp.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("bp"))
}

/// Returns the platform-specific data directory for bp.
///
/// On Linux: `~/.local/share/bp`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("bp"))
}
