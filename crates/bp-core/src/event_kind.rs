//! Event kind enum as the single source of truth for ledger event strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of fact the time ledger records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Tracking began for a project.
    Start,
    /// Tracking was stopped manually.
    Stop,
    /// Tracking was stopped because the user went idle.
    AutoPause,
    /// A manual signed-minutes correction.
    Adjustment,
    /// A signed-minutes correction recorded on resume, removing idle time.
    PauseAdjustment,
}

impl EventKind {
    /// String representation used in the wire format and the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::AutoPause => "auto_pause",
            Self::Adjustment => "adjustment",
            Self::PauseAdjustment => "pause_adjustment",
        }
    }

    /// Whether this event closes an open session.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(self, Self::Stop | Self::AutoPause)
    }

    /// Whether this event carries a signed `minutes` value.
    #[must_use]
    pub const fn is_adjustment(&self) -> bool {
        matches!(self, Self::Adjustment | Self::PauseAdjustment)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "auto_pause" => Ok(Self::AutoPause),
            "adjustment" => Ok(Self::Adjustment),
            "pause_adjustment" => Ok(Self::PauseAdjustment),
            _ => Err(UnknownEventKind(s.to_string())),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event kind strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind(String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind: {}", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_variants() {
        let variants = [
            EventKind::Start,
            EventKind::Stop,
            EventKind::AutoPause,
            EventKind::Adjustment,
            EventKind::PauseAdjustment,
        ];

        for variant in &variants {
            let s = variant.to_string();
            let parsed: EventKind = s.parse().expect("should parse");
            assert_eq!(parsed, *variant, "roundtrip failed for {variant:?}");
        }
    }

    #[test]
    fn only_stop_and_auto_pause_terminate() {
        assert!(EventKind::Stop.is_terminator());
        assert!(EventKind::AutoPause.is_terminator());
        assert!(!EventKind::Start.is_terminator());
        assert!(!EventKind::Adjustment.is_terminator());
        assert!(!EventKind::PauseAdjustment.is_terminator());
    }

    #[test]
    fn serializes_as_snake_case_string() {
        let json = serde_json::to_string(&EventKind::PauseAdjustment).unwrap();
        assert_eq!(json, "\"pause_adjustment\"");
    }

    #[test]
    fn unknown_kind_errors() {
        let result: Result<EventKind, _> = "resume".parse();
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "unknown event kind: resume");
    }
}
