//! Group keys and aggregate statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::phase::PhaseKey;
use super::record::{Emotion, Platform};

/// Extra grouping dimension beyond phase and platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Neighborhood,
    Topic,
}

/// Topic slot within the topic dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicSlot {
    Id(i32),
    /// Topic modeling is disabled for this study
    Unavailable,
}

impl fmt::Display for TopicSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicSlot::Id(id) => write!(f, "{}", id),
            TopicSlot::Unavailable => f.write_str("unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "dimension", content = "value")]
pub enum DimensionValue {
    Neighborhood(String),
    Topic(TopicSlot),
}

impl DimensionValue {
    pub fn dimension(&self) -> Dimension {
        match self {
            DimensionValue::Neighborhood(_) => Dimension::Neighborhood,
            DimensionValue::Topic(_) => Dimension::Topic,
        }
    }

    pub fn value(&self) -> String {
        match self {
            DimensionValue::Neighborhood(name) => name.clone(),
            DimensionValue::Topic(slot) => slot.to_string(),
        }
    }
}

/// Identity of one aggregate group.
///
/// `platform: None` pools all platforms; `dimension: None` means the
/// group is not split by an extra dimension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub phase: PhaseKey,
    pub platform: Option<Platform>,
    pub dimension: Option<DimensionValue>,
}

impl GroupKey {
    pub fn new(phase: PhaseKey, platform: Option<Platform>, dimension: Option<DimensionValue>) -> Self {
        Self {
            phase,
            platform,
            dimension,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let platform = self.platform.map(|p| p.as_str()).unwrap_or("all");
        write!(f, "{}/{}", self.phase, platform)?;
        if let Some(ref dim) = self.dimension {
            write!(f, "/{:?}={}", dim.dimension(), dim.value())?;
        }
        Ok(())
    }
}

/// The quantity being aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "field", content = "emotion")]
pub enum LabelField {
    Sentiment,
    Emotion(Emotion),
    DominantEmotion,
}

impl LabelField {
    /// Every field the analyzer reports, numeric fields first
    pub fn all() -> Vec<LabelField> {
        let mut fields = vec![LabelField::Sentiment];
        fields.extend(Emotion::ALL.iter().map(|e| LabelField::Emotion(*e)));
        fields.push(LabelField::DominantEmotion);
        fields
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, LabelField::DominantEmotion)
    }

    pub fn scale(&self) -> Scale {
        match self {
            LabelField::Sentiment => Scale::Polarity,
            _ => Scale::Probability,
        }
    }

    pub fn name(&self) -> String {
        match self {
            LabelField::Sentiment => "sentiment".to_string(),
            LabelField::Emotion(e) => format!("emotion:{}", e),
            LabelField::DominantEmotion => "dominant_emotion".to_string(),
        }
    }
}

impl fmt::Display for LabelField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Bounded range of a numeric field, used to normalize changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// [0, 1]
    Probability,
    /// [-1, 1]
    Polarity,
}

impl Scale {
    pub fn range(&self) -> f64 {
        match self {
            Scale::Probability => 1.0,
            Scale::Polarity => 2.0,
        }
    }
}

/// Bootstrap interval, or a marker that one cannot be computed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Interval {
    Bounded { low: f64, high: f64 },
    /// Fewer than two samples; `estimate` is the point value if any
    Undefined { estimate: Option<f64> },
}

impl Interval {
    pub fn is_defined(&self) -> bool {
        matches!(self, Interval::Bounded { .. })
    }

    pub fn low(&self) -> Option<f64> {
        match self {
            Interval::Bounded { low, .. } => Some(*low),
            Interval::Undefined { .. } => None,
        }
    }

    pub fn high(&self) -> Option<f64> {
        match self {
            Interval::Bounded { high, .. } => Some(*high),
            Interval::Undefined { .. } => None,
        }
    }
}

/// A point estimate with its sample count and interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f64,
    pub n: usize,
    pub interval: Interval,
}

/// Share of one label within a dominant-emotion distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelShare {
    pub label: Emotion,
    pub share: Estimate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StatOutcome {
    Mean(Estimate),
    Distribution {
        modal: Emotion,
        n: usize,
        /// Sorted by share descending, then label name
        shares: Vec<LabelShare>,
    },
    /// No record in the group contributed a value
    InsufficientData,
}

/// Final statistic for one (group, field) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStat {
    pub key: GroupKey,
    pub field: LabelField,
    /// All records in the group, contributing or not
    pub total_n: usize,
    pub confidence_level: f64,
    pub outcome: StatOutcome,
}

impl AggregateStat {
    pub fn mean(&self) -> Option<&Estimate> {
        match self.outcome {
            StatOutcome::Mean(ref estimate) => Some(estimate),
            _ => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self.outcome, StatOutcome::InsufficientData)
    }

    /// Number of contributing records
    pub fn n(&self) -> usize {
        match self.outcome {
            StatOutcome::Mean(ref estimate) => estimate.n,
            StatOutcome::Distribution { n, .. } => n,
            StatOutcome::InsufficientData => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_scales() {
        assert_eq!(LabelField::Sentiment.scale().range(), 2.0);
        assert_eq!(LabelField::Emotion(Emotion::Fear).scale().range(), 1.0);
        assert!(!LabelField::DominantEmotion.is_numeric());
        assert_eq!(LabelField::all().len(), 10);
    }

    #[test]
    fn test_group_key_display() {
        let key = GroupKey::new(
            PhaseKey::named("pre"),
            Some(Platform::Reddit),
            Some(DimensionValue::Neighborhood("Woodlawn".to_string())),
        );
        assert_eq!(key.to_string(), "pre/reddit/Neighborhood=Woodlawn");

        let pooled = GroupKey::new(PhaseKey::All, None, None);
        assert_eq!(pooled.to_string(), "all/all");
    }
}
