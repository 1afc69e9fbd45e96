//! Phase windows and phase keys.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Name of the distinguished phase centred on the event anchor
pub const EVENT_PHASE: &str = "event";

/// Key used for records that fall outside every window
pub const UNPHASED: &str = "none";

/// Key used for aggregates that span all phases
pub const ALL_PHASES: &str = "all";

/// A named half-open interval `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseWindow {
    pub name: String,
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PhaseWindow {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// The symmetric window `[anchor - tolerance, anchor + tolerance]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWindow {
    pub anchor: DateTime<Utc>,
    pub tolerance: Duration,
    pub label: String,
}

impl EventWindow {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        (timestamp - self.anchor).abs() <= self.tolerance
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.anchor - self.tolerance
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.anchor + self.tolerance
    }
}

/// Phase membership of a record or aggregate group.
///
/// Serialized as a plain string: the phase name, `none` or `all`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PhaseKey {
    Phase(String),
    Unphased,
    All,
}

impl PhaseKey {
    pub fn named(name: impl Into<String>) -> Self {
        PhaseKey::Phase(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            PhaseKey::Phase(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_event(&self) -> bool {
        self.name() == Some(EVENT_PHASE)
    }
}

impl From<Option<&str>> for PhaseKey {
    fn from(name: Option<&str>) -> Self {
        match name {
            Some(name) => PhaseKey::Phase(name.to_string()),
            None => PhaseKey::Unphased,
        }
    }
}

impl From<String> for PhaseKey {
    fn from(value: String) -> Self {
        match value.as_str() {
            UNPHASED => PhaseKey::Unphased,
            ALL_PHASES => PhaseKey::All,
            _ => PhaseKey::Phase(value),
        }
    }
}

impl From<PhaseKey> for String {
    fn from(key: PhaseKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for PhaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKey::Phase(name) => f.write_str(name),
            PhaseKey::Unphased => f.write_str(UNPHASED),
            PhaseKey::All => f.write_str(ALL_PHASES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 10, 8, 0, 0, 0).unwrap();
        let window = PhaseWindow::new("post_week1", "Week 1", start, end);

        assert!(window.contains(start));
        assert!(!window.contains(end));
    }

    #[test]
    fn test_event_window_is_closed() {
        let anchor = Utc.with_ymd_and_hms(2025, 9, 30, 11, 0, 0).unwrap();
        let window = EventWindow {
            anchor,
            tolerance: Duration::hours(24),
            label: "Event".to_string(),
        };

        assert!(window.contains(anchor - Duration::hours(24)));
        assert!(window.contains(anchor + Duration::hours(24)));
        assert!(!window.contains(anchor + Duration::hours(24) + Duration::seconds(1)));
    }

    #[test]
    fn test_phase_key_string_form() {
        let json = serde_json::to_string(&PhaseKey::Unphased).unwrap();
        assert_eq!(json, "\"none\"");

        let parsed: PhaseKey = serde_json::from_str("\"court_action\"").unwrap();
        assert_eq!(parsed, PhaseKey::named("court_action"));
    }
}
