//! Timestamp → phase assignment.
//!
//! The event window wins over every other window. Outside it, the first
//! configured window containing the timestamp wins; windows are checked at
//! construction so that at most one can match.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::config::ConfigError;
use crate::domain::{EventWindow, PhaseKey, PhaseWindow, Record, EVENT_PHASE};
use crate::domain::phase::{ALL_PHASES, UNPHASED};

/// Validated phase configuration
#[derive(Debug, Clone)]
pub struct PhaseClassifier {
    windows: Vec<PhaseWindow>,
    event: EventWindow,
    fingerprint: String,
}

impl PhaseClassifier {
    /// Validate windows and build the classifier.
    ///
    /// Fails on inverted or out-of-order windows, duplicate or reserved
    /// names, negative tolerance, and any two windows that overlap outside
    /// the event tolerance region.
    pub fn new(windows: Vec<PhaseWindow>, event: EventWindow) -> Result<Self, ConfigError> {
        if event.tolerance < chrono::Duration::zero() {
            return Err(ConfigError::NegativeTolerance);
        }
        let start = event.anchor.checked_sub_signed(event.tolerance);
        let end = event.anchor.checked_add_signed(event.tolerance);
        if start.is_none() || end.is_none() {
            return Err(ConfigError::ToleranceOutOfRange(event.tolerance.num_hours()));
        }

        for (i, window) in windows.iter().enumerate() {
            if [EVENT_PHASE, UNPHASED, ALL_PHASES].contains(&window.name.as_str()) {
                return Err(ConfigError::ReservedName(window.name.clone()));
            }
            if window.start >= window.end {
                return Err(ConfigError::InvertedWindow {
                    name: window.name.clone(),
                    start: window.start,
                    end: window.end,
                });
            }
            if windows[..i].iter().any(|w| w.name == window.name) {
                return Err(ConfigError::DuplicatePhase(window.name.clone()));
            }
            if let Some(previous) = i.checked_sub(1).map(|p| &windows[p]) {
                if window.start < previous.start {
                    return Err(ConfigError::OutOfOrder {
                        previous: previous.name.clone(),
                        name: window.name.clone(),
                    });
                }
            }
        }

        for (i, first) in windows.iter().enumerate() {
            for second in &windows[i + 1..] {
                let start = first.start.max(second.start);
                let end = first.end.min(second.end);
                if start >= end {
                    continue;
                }
                let inside_event = start >= event.start() && end <= event.end();
                if !inside_event {
                    return Err(ConfigError::Overlap {
                        first: first.name.clone(),
                        second: second.name.clone(),
                    });
                }
            }
        }

        let fingerprint = fingerprint(&windows, &event);
        Ok(Self {
            windows,
            event,
            fingerprint,
        })
    }

    /// Build from the built-in methodology table, which is checked by test
    /// rather than at runtime
    pub(crate) fn trusted(windows: Vec<PhaseWindow>, event: EventWindow) -> Self {
        let fingerprint = fingerprint(&windows, &event);
        Self {
            windows,
            event,
            fingerprint,
        }
    }

    /// Phase name for `timestamp`, or `None` when it falls in no window
    pub fn classify(&self, timestamp: DateTime<Utc>) -> Option<&str> {
        if self.event.contains(timestamp) {
            return Some(EVENT_PHASE);
        }

        self.windows
            .iter()
            .find(|w| w.contains(timestamp))
            .map(|w| w.name.as_str())
    }

    pub fn key_for(&self, timestamp: DateTime<Utc>) -> PhaseKey {
        PhaseKey::from(self.classify(timestamp))
    }

    pub fn classify_record(&self, record: &Record) -> PhaseKey {
        self.key_for(record.timestamp)
    }

    /// Phase names in chronological order, the event phase placed by the
    /// start of its tolerance window
    pub fn canonical_order(&self) -> Vec<String> {
        let mut starts: Vec<(DateTime<Utc>, &str)> = self
            .windows
            .iter()
            .map(|w| (w.start, w.name.as_str()))
            .collect();
        starts.push((self.event.start(), EVENT_PHASE));
        starts.sort_by_key(|(start, _)| *start);
        starts.into_iter().map(|(_, name)| name.to_string()).collect()
    }

    /// Human-readable label for a phase name
    pub fn label(&self, name: &str) -> Option<&str> {
        if name == EVENT_PHASE {
            return Some(&self.event.label);
        }
        self.windows
            .iter()
            .find(|w| w.name == name)
            .map(|w| w.label.as_str())
    }

    pub fn windows(&self) -> &[PhaseWindow] {
        &self.windows
    }

    pub fn event(&self) -> &EventWindow {
        &self.event
    }

    /// Stable identity of this phase configuration
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint(windows: &[PhaseWindow], event: &EventWindow) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.anchor.to_rfc3339().as_bytes());
    hasher.update(event.tolerance.num_seconds().to_le_bytes());
    for window in windows {
        hasher.update(window.name.as_bytes());
        hasher.update(window.start.to_rfc3339().as_bytes());
        hasher.update(window.end.to_rfc3339().as_bytes());
    }
    hex::encode(&hasher.finalize()[..8])
}
