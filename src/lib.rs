//! tidemark - Longitudinal sentiment phase analysis
//!
//! Turns a stream of scored posts into per-phase, per-platform and
//! per-neighborhood statistics with bootstrap intervals, classifies how
//! each measure moves across the study's phases, and places verified
//! real-world events on the same timeline.
//!
//! # Architecture
//!
//! Records are event-sourced:
//! - Upstream stages append `ingested` and `enriched` events to a JSONL log
//! - The corpus is derived by replaying the log
//! - Phases are tagged once per phase configuration fingerprint
//!
//! # Modules
//!
//! - `config`: Study configuration (phase windows, thresholds, bootstrap)
//! - `core`: Analysis engine (classifier, aggregator, bootstrap, trajectory)
//! - `domain`: Data structures (Record, PhaseKey, AggregateStat)
//! - `export`: Flat tables and JSONL writers
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Analyze a record log with the built-in methodology
//! tidemark run --records records.jsonl --out out/
//!
//! # Which phase does a timestamp fall in?
//! tidemark classify 2025-09-30T00:10:00Z
//!
//! # Verified events on the phase timeline
//! tidemark events
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod export;

// Re-export main types at crate root for convenience
pub use config::{ConfigError, StudyConfig};
pub use core::{Analyzer, PhaseClassifier, StudyReport};
pub use domain::{AggregateStat, Corpus, PhaseKey, Record, VerifiedEvent};
pub use export::{write_exports, AggregateRow};
