//! Core analysis engine.
//!
//! This module contains:
//! - PhaseClassifier: Timestamp to phase assignment
//! - Aggregator: Grouping and per-field reduction
//! - Bootstrap: Seeded percentile intervals
//! - Trajectory: Shape of a field across phases
//! - Correlator: Verified event overlay
//! - RecordStore: Append-only record log
//! - Analyzer: Batch execution engine

pub mod aggregator;
pub mod analyzer;
pub mod bootstrap;
pub mod correlator;
pub mod phase_classifier;
pub mod record_store;
pub mod topics;
pub mod trajectory;

// Re-export commonly used types
pub use aggregator::{aggregate, daily_series, AggregateDraft, DailyPoint, GroupSpec, Grouping, Summary};
pub use analyzer::{Analyzer, StudyReport};
pub use bootstrap::{bootstrap_ci, group_seed, BootstrapSettings};
pub use correlator::{correlate, event_on, events_for_phase, AnnotatedEvent};
pub use phase_classifier::PhaseClassifier;
pub use record_store::RecordStore;
pub use topics::TopicBackend;
pub use trajectory::{classify_trajectory, PhasePoint, Trajectory, TrajectoryRecord};
