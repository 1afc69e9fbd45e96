//! Batch analysis of a study corpus.
//!
//! Tags phases, aggregates every field over every grouping, bootstraps
//! intervals on blocking workers, then classifies trajectories and builds
//! the event overlay. Each group is independent, and its bootstrap seed is
//! derived from its own identity, so worker completion order never shows
//! in the output.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::aggregator::{
    aggregate, daily_series, undeclared_neighborhoods, AggregateDraft, DailyPoint, GroupSpec,
    Grouping,
};
use super::bootstrap::estimate;
use super::correlator::{correlate, AnnotatedEvent};
use super::phase_classifier::PhaseClassifier;
use super::trajectory::{trajectory_for, TrajectoryRecord};
use crate::config::StudyConfig;
use crate::domain::{
    AggregateStat, Corpus, Dimension, DimensionValue, GroupKey, LabelField, PhaseKey, Platform,
    Record,
};

/// Groupings reported for every field
pub const GROUPINGS: [Grouping; 6] = [
    // phase x platform
    Grouping {
        by_phase: true,
        by_platform: true,
        dimension: None,
    },
    // phase, platforms pooled
    Grouping {
        by_phase: true,
        by_platform: false,
        dimension: None,
    },
    // platform contrast across the whole study
    Grouping {
        by_phase: false,
        by_platform: true,
        dimension: None,
    },
    // global
    Grouping {
        by_phase: false,
        by_platform: false,
        dimension: None,
    },
    Grouping {
        by_phase: true,
        by_platform: false,
        dimension: Some(Dimension::Neighborhood),
    },
    Grouping {
        by_phase: true,
        by_platform: false,
        dimension: Some(Dimension::Topic),
    },
];

/// Everything one analysis run produces
#[derive(Debug, Clone, PartialEq)]
pub struct StudyReport {
    /// Fingerprint of the phase configuration used
    pub phase_fingerprint: String,
    /// Phases in chronological order
    pub phase_order: Vec<String>,
    pub topic_backend: String,
    pub seed: u64,
    pub resamples: usize,
    pub total_records: usize,
    pub unphased_records: usize,
    pub aggregates: BTreeMap<(LabelField, GroupKey), AggregateStat>,
    pub trajectories: Vec<TrajectoryRecord>,
    pub overlay: Vec<AnnotatedEvent>,
    pub daily: Vec<DailyPoint>,
}

impl StudyReport {
    pub fn stat(&self, field: LabelField, key: &GroupKey) -> Option<&AggregateStat> {
        self.aggregates.get(&(field, key.clone()))
    }

    /// All statistics for one field, in key order
    pub fn stats_for(&self, field: LabelField) -> impl Iterator<Item = &AggregateStat> + '_ {
        self.aggregates
            .iter()
            .filter(move |((f, _), _)| *f == field)
            .map(|(_, stat)| stat)
    }

    pub fn trajectory(
        &self,
        field: LabelField,
        platform: Option<Platform>,
        dimension: Option<&DimensionValue>,
    ) -> Option<&TrajectoryRecord> {
        self.trajectories.iter().find(|t| {
            t.field == field && t.platform == platform && t.dimension.as_ref() == dimension
        })
    }
}

/// Runs the full analysis for one study configuration
pub struct Analyzer {
    config: StudyConfig,
}

impl Analyzer {
    pub fn new(config: StudyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn classifier(&self) -> &PhaseClassifier {
        &self.config.classifier
    }

    /// Analyze `corpus`, tagging its records first if needed
    #[instrument(skip(self, corpus), fields(records = corpus.len()))]
    pub async fn run(&self, corpus: &mut Corpus) -> Result<StudyReport> {
        let classifier = &self.config.classifier;
        let tagged = corpus
            .tag_phases(classifier.fingerprint(), |r| classifier.classify_record(r))
            .context("Failed to tag record phases")?;
        info!(tagged, fingerprint = classifier.fingerprint(), "Phase tagging done");

        let records = corpus.records();
        let unphased_records = records
            .iter()
            .filter(|r| r.phase() == Some(&PhaseKey::Unphased))
            .count();
        if unphased_records > 0 {
            info!(unphased_records, "Records outside every phase window");
        }

        for (hash, ids) in corpus.duplicate_text_hashes() {
            warn!(text_hash = %hash, ids = ?ids, "Records share a text hash");
        }

        let extra = undeclared_neighborhoods(records, &self.config.neighborhoods);
        if !extra.is_empty() {
            debug!(neighborhoods = ?extra, "Records tagged with undeclared neighborhoods");
        }

        let phase_order = classifier.canonical_order();
        let mut phases: Vec<PhaseKey> = phase_order.iter().map(PhaseKey::named).collect();
        phases.push(PhaseKey::Unphased);

        let mut workers = JoinSet::new();
        for grouping in GROUPINGS {
            let plan = GroupSpec {
                grouping,
                phases: phases.clone(),
                platforms: Platform::ALL.to_vec(),
                neighborhoods: self.config.neighborhoods.clone(),
                topics: self.config.topics.clone(),
            };

            for field in LabelField::all() {
                let drafts: Vec<AggregateDraft> = aggregate(
                    records,
                    &plan,
                    field,
                    self.config.thresholds.emotion_confidence,
                )
                .into_values()
                .collect();

                let settings = self.config.bootstrap;
                workers.spawn_blocking(move || {
                    drafts
                        .iter()
                        .map(|draft| estimate(draft, &settings))
                        .collect::<Vec<AggregateStat>>()
                });
            }
        }

        let mut aggregates = BTreeMap::new();
        while let Some(joined) = workers.join_next().await {
            let stats = joined.context("Bootstrap worker failed")?;
            for stat in stats {
                aggregates.insert((stat.field, stat.key.clone()), stat);
            }
        }
        debug!(groups = aggregates.len(), "Aggregates estimated");

        let trajectories = self.trajectories(&aggregates, &phase_order, records);
        let overlay = correlate(&self.config.verified_events, classifier);
        let daily = daily_series(records);

        info!(
            groups = aggregates.len(),
            trajectories = trajectories.len(),
            events = overlay.len(),
            days = daily.len(),
            "Analysis complete"
        );

        Ok(StudyReport {
            phase_fingerprint: classifier.fingerprint().to_string(),
            phase_order,
            topic_backend: self.config.topics.name().to_string(),
            seed: self.config.bootstrap.seed,
            resamples: self.config.bootstrap.resamples,
            total_records: records.len(),
            unphased_records,
            aggregates,
            trajectories,
            overlay,
            daily,
        })
    }

    fn trajectories(
        &self,
        aggregates: &BTreeMap<(LabelField, GroupKey), AggregateStat>,
        order: &[String],
        records: &[Record],
    ) -> Vec<TrajectoryRecord> {
        let mut series: Vec<(Option<Platform>, Option<DimensionValue>)> = vec![(None, None)];
        series.extend(Platform::ALL.iter().map(|p| (Some(*p), None)));
        series.extend(
            self.config
                .neighborhoods
                .iter()
                .map(|n| (None, Some(DimensionValue::Neighborhood(n.clone())))),
        );
        series.extend(
            self.config
                .topics
                .universe(records)
                .into_iter()
                .map(|slot| (None, Some(DimensionValue::Topic(slot)))),
        );

        let effect_size = self.config.thresholds.trajectory_effect_size;
        let mut out = Vec::new();
        for field in LabelField::all().into_iter().filter(|f| f.is_numeric()) {
            for (platform, dimension) in &series {
                out.push(trajectory_for(
                    |key: &GroupKey| aggregates.get(&(field, key.clone())),
                    order,
                    field,
                    *platform,
                    dimension.clone(),
                    effect_size,
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StatOutcome;
    use chrono::{TimeZone, Utc};

    fn small_config() -> StudyConfig {
        let mut config = StudyConfig::methodology();
        config.bootstrap.resamples = 50;
        config
    }

    #[tokio::test]
    async fn test_run_on_empty_corpus() {
        let mut corpus = Corpus::new();
        let report = Analyzer::new(small_config()).run(&mut corpus).await.unwrap();

        assert_eq!(report.total_records, 0);
        assert!(report.aggregates.values().all(|s| s.is_insufficient()));
        assert_eq!(report.overlay.len(), 7);
        assert!(report.daily.is_empty());
    }

    #[tokio::test]
    async fn test_global_group_counts_unphased() {
        let early = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
        let inside = Utc.with_ymd_and_hms(2025, 9, 20, 0, 0, 0).unwrap();
        let mut corpus = Corpus::from_records(vec![
            Record::new("a", early, Platform::Reddit).with_sentiment(0.5),
            Record::new("b", inside, Platform::Reddit).with_sentiment(0.1),
        ])
        .unwrap();

        let report = Analyzer::new(small_config()).run(&mut corpus).await.unwrap();
        assert_eq!(report.unphased_records, 1);

        let global = GroupKey::new(PhaseKey::All, None, None);
        let stat = report.stat(LabelField::Sentiment, &global).unwrap();
        assert_eq!(stat.total_n, 2);
        match stat.outcome {
            StatOutcome::Mean(ref estimate) => assert!((estimate.value - 0.3).abs() < 1e-12),
            ref other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rerun_tags_records_added_since_last_run() {
        let inside = Utc.with_ymd_and_hms(2025, 9, 20, 0, 0, 0).unwrap();
        let mut corpus =
            Corpus::from_records(vec![Record::new("a", inside, Platform::Reddit).with_sentiment(0.2)])
                .unwrap();
        let analyzer = Analyzer::new(small_config());
        analyzer.run(&mut corpus).await.unwrap();

        corpus
            .insert(Record::new("b", inside, Platform::Reddit).with_sentiment(0.4))
            .unwrap();
        let report = analyzer.run(&mut corpus).await.unwrap();

        assert_eq!(corpus.get("b").unwrap().phase(), Some(&PhaseKey::named("pre")));
        assert_eq!(report.unphased_records, 0);

        let pre = GroupKey::new(PhaseKey::named("pre"), Some(Platform::Reddit), None);
        assert_eq!(report.stat(LabelField::Sentiment, &pre).unwrap().total_n, 2);
        let none = GroupKey::new(PhaseKey::Unphased, Some(Platform::Reddit), None);
        assert_eq!(report.stat(LabelField::Sentiment, &none).unwrap().total_n, 0);
    }
}
