//! Analyzed records and the stage outputs that enrich them.
//!
//! A record is created by ingestion and then filled in by each analysis
//! stage (sentiment, emotion, topic, geo). Once a phase is assigned the
//! record is frozen; only a full phase recompute may clear it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::phase::PhaseKey;

/// Errors raised while building or enriching records
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("Sentiment {value} for record {id} is outside [-1, 1]")]
    SentimentOutOfRange { id: String, value: f64 },

    #[error("Emotion score {value} for {emotion} is outside [0, 1]")]
    EmotionOutOfRange { emotion: Emotion, value: f64 },

    #[error("Record {0} already has a phase assigned")]
    PhaseAlreadyAssigned(String),

    #[error("Record {0} is phase-tagged and can no longer be enriched")]
    Frozen(String),

    #[error("Record {0} was ingested twice")]
    Duplicate(String),

    #[error("Unknown record: {0}")]
    Unknown(String),
}

/// Where a record was collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Reddit,
    #[serde(alias = "news_comment")]
    News,
    Synthetic,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Reddit, Platform::News, Platform::Synthetic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::News => "news",
            Platform::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The eight target emotions scored upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Fear,
    Anger,
    Sadness,
    Joy,
    Surprise,
    Disgust,
    Gratitude,
    Pride,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Fear,
        Emotion::Anger,
        Emotion::Sadness,
        Emotion::Joy,
        Emotion::Surprise,
        Emotion::Disgust,
        Emotion::Gratitude,
        Emotion::Pride,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Fear => "fear",
            Emotion::Anger => "anger",
            Emotion::Sadness => "sadness",
            Emotion::Joy => "joy",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Gratitude => "gratitude",
            Emotion::Pride => "pride",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-size emotion probabilities; `None` means the label was not scored
/// or did not pass the upstream confidence cut.
///
/// Serialized as a `{label: probability}` map. Deserialization keeps the
/// values as read; ranges are checked by [`EmotionScores::validate`] when
/// the scores reach a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Emotion, f64>", into = "BTreeMap<Emotion, f64>")]
pub struct EmotionScores([Option<f64>; 8]);

impl EmotionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, validating the probability range
    pub fn with(mut self, emotion: Emotion, value: f64) -> Result<Self, RecordError> {
        self.set(emotion, value)?;
        Ok(self)
    }

    pub fn set(&mut self, emotion: Emotion, value: f64) -> Result<(), RecordError> {
        check_probability(emotion, value)?;
        self.0[emotion.index()] = Some(value);
        Ok(())
    }

    /// First score outside [0, 1], if any
    pub fn validate(&self) -> Result<(), RecordError> {
        self.iter()
            .try_for_each(|(emotion, value)| check_probability(emotion, value))
    }

    pub fn get(&self, emotion: Emotion) -> Option<f64> {
        self.0[emotion.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// Present scores in canonical emotion order
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL
            .iter()
            .filter_map(|e| self.get(*e).map(|v| (*e, v)))
    }

    /// Highest-scoring label at or above `threshold`.
    ///
    /// Ties go to the alphabetically first label name.
    pub fn dominant(&self, threshold: f64) -> Option<Emotion> {
        self.iter()
            .filter(|(_, v)| *v >= threshold)
            .max_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then_with(|| b.0.as_str().cmp(a.0.as_str()))
            })
            .map(|(e, _)| e)
    }
}

fn check_probability(emotion: Emotion, value: f64) -> Result<(), RecordError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RecordError::EmotionOutOfRange { emotion, value })
    }
}

impl From<BTreeMap<Emotion, f64>> for EmotionScores {
    fn from(map: BTreeMap<Emotion, f64>) -> Self {
        let mut scores = Self::new();
        for (emotion, value) in map {
            scores.0[emotion.index()] = Some(value);
        }
        scores
    }
}

impl From<EmotionScores> for BTreeMap<Emotion, f64> {
    fn from(scores: EmotionScores) -> Self {
        scores.iter().collect()
    }
}

/// One analyzed post or comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable unique identifier
    pub id: String,

    /// When the post was written (UTC)
    pub timestamp: DateTime<Utc>,

    #[serde(alias = "platform")]
    pub source_platform: Platform,

    /// Upstream dedup fingerprint (opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_hash: Option<String>,

    /// Compound sentiment in [-1, 1]; absent if the scorer failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,

    #[serde(default)]
    pub emotion_scores: EmotionScores,

    /// Topic model output, -1 for outliers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<i32>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub geo_tags: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    phase: Option<PhaseKey>,
}

impl Record {
    /// Create a bare record with no stage outputs yet
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, platform: Platform) -> Self {
        Self {
            id: id.into(),
            timestamp,
            source_platform: platform,
            text_hash: None,
            sentiment: None,
            emotion_scores: EmotionScores::new(),
            topic_id: None,
            geo_tags: BTreeSet::new(),
            phase: None,
        }
    }

    pub fn with_sentiment(mut self, compound: f64) -> Self {
        self.sentiment = Some(compound);
        self
    }

    pub fn with_emotions(mut self, scores: EmotionScores) -> Self {
        self.emotion_scores = scores;
        self
    }

    pub fn with_topic(mut self, topic_id: i32) -> Self {
        self.topic_id = Some(topic_id);
        self
    }

    pub fn with_geo<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.geo_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Check numeric ranges that serde cannot enforce on its own
    pub fn validate(&self) -> Result<(), RecordError> {
        if let Some(value) = self.sentiment {
            if !(-1.0..=1.0).contains(&value) {
                return Err(RecordError::SentimentOutOfRange {
                    id: self.id.clone(),
                    value,
                });
            }
        }
        self.emotion_scores.validate()
    }

    pub fn phase(&self) -> Option<&PhaseKey> {
        self.phase.as_ref()
    }

    pub fn dominant_emotion(&self, threshold: f64) -> Option<Emotion> {
        self.emotion_scores.dominant(threshold)
    }

    /// Assign the phase once; a second assignment is refused
    pub fn assign_phase(&mut self, phase: PhaseKey) -> Result<(), RecordError> {
        if self.phase.is_some() {
            return Err(RecordError::PhaseAlreadyAssigned(self.id.clone()));
        }
        self.phase = Some(phase);
        Ok(())
    }

    /// Drop the phase ahead of a full recompute
    pub(crate) fn clear_phase(&mut self) {
        self.phase = None;
    }

    /// Apply one stage's output in place
    pub fn apply(&mut self, enrichment: &Enrichment) -> Result<(), RecordError> {
        if self.phase.is_some() {
            return Err(RecordError::Frozen(self.id.clone()));
        }

        match enrichment {
            Enrichment::Sentiment { compound } => {
                let previous = self.sentiment;
                self.sentiment = *compound;
                if let Err(e) = self.validate() {
                    self.sentiment = previous;
                    return Err(e);
                }
            }
            Enrichment::Emotions { scores } => {
                scores.validate()?;
                self.emotion_scores = *scores;
            }
            Enrichment::Topic { topic_id } => {
                self.topic_id = *topic_id;
            }
            Enrichment::Geo { neighborhoods } => {
                self.geo_tags = neighborhoods.clone();
            }
        }
        Ok(())
    }
}

/// Output of a single upstream analysis stage for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Enrichment {
    /// Sentiment scorer; `None` when scoring failed
    Sentiment { compound: Option<f64> },

    /// Emotion tagger
    Emotions { scores: EmotionScores },

    /// Topic model; `None` when the record was not modeled
    Topic { topic_id: Option<i32> },

    /// Neighborhood tagger
    Geo {
        #[serde(default)]
        neighborhoods: BTreeSet<String>,
    },
}
