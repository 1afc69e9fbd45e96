//! Domain types for tidemark.
//!
//! This module contains the core data structures:
//! - Record: one analyzed post, enriched in place by upstream stages
//! - Corpus: the record set rebuilt from the record log
//! - Phase: windows and phase keys
//! - Stats: group keys and aggregate statistics
//! - Events: verified real-world events

pub mod corpus;
pub mod events;
pub mod phase;
pub mod record;
pub mod stats;

// Re-export commonly used types
pub use corpus::{Corpus, RecordEvent};
pub use events::{VerificationLevel, VerifiedEvent};
pub use phase::{EventWindow, PhaseKey, PhaseWindow, EVENT_PHASE};
pub use record::{Emotion, EmotionScores, Enrichment, Platform, Record, RecordError};
pub use stats::{
    AggregateStat, Dimension, DimensionValue, Estimate, GroupKey, Interval, LabelField,
    LabelShare, Scale, StatOutcome, TopicSlot,
};
