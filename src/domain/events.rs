//! Curated real-world events used to annotate the timeline.
//!
//! Verified events are reference data. They are never derived from records
//! and never feed back into statistics.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Source verification strength, 1 (strongest) to 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "LevelRepr", into = "u8")]
pub struct VerificationLevel(u8);

impl VerificationLevel {
    pub fn new(level: u8) -> Option<Self> {
        (1..=4).contains(&level).then_some(Self(level))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl From<VerificationLevel> for u8 {
    fn from(level: VerificationLevel) -> Self {
        level.0
    }
}

/// Accepts either `2` or `"L2"` in config files
#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Number(u8),
    Text(String),
}

impl TryFrom<LevelRepr> for VerificationLevel {
    type Error = String;

    fn try_from(repr: LevelRepr) -> Result<Self, Self::Error> {
        let level = match repr {
            LevelRepr::Number(n) => n,
            LevelRepr::Text(s) => s
                .trim()
                .trim_start_matches(['L', 'l'])
                .parse::<u8>()
                .map_err(|_| format!("invalid verification level: {}", s))?,
        };
        VerificationLevel::new(level).ok_or_else(|| format!("verification level out of range: {}", level))
    }
}

/// A journalist-verified occurrence on the study timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedEvent {
    pub date: NaiveDate,

    #[serde(alias = "event", alias = "label")]
    pub description: String,

    #[serde(alias = "verification")]
    pub verification_level: VerificationLevel,

    /// Reporting outlet(s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Phase the curator expects this event to affect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_impact: Option<String>,
}

impl VerifiedEvent {
    pub fn new(date: NaiveDate, description: impl Into<String>, level: VerificationLevel) -> Self {
        Self {
            date,
            description: description.into(),
            verification_level: level,
            source: None,
            phase_impact: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Instant used for phase resolution: midnight UTC of `date`
    pub fn instant(&self) -> DateTime<Utc> {
        self.date.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}
