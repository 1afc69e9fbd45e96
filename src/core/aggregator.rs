//! Group records and reduce each group to a draft statistic.
//!
//! Every declared group key appears in the output, even when no record
//! falls into it, so that "no signal" stays distinguishable from "no group".
//! Drafts keep their contributing values in a canonical (sorted) order, so
//! both the point estimates and the later bootstrap do not depend on the
//! order records were supplied in.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::topics::TopicBackend;
use crate::domain::{
    Dimension, DimensionValue, Emotion, GroupKey, LabelField, PhaseKey, Platform, Record,
};

/// Which record attributes split the groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grouping {
    pub by_phase: bool,
    pub by_platform: bool,
    pub dimension: Option<Dimension>,
}

/// Grouping plus the key universe that must be reported
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub grouping: Grouping,
    /// Phase keys to declare; include `Unphased` for exhaustive grouping
    pub phases: Vec<PhaseKey>,
    pub platforms: Vec<Platform>,
    pub neighborhoods: Vec<String>,
    pub topics: TopicBackend,
}

impl GroupSpec {
    /// Keys that must be present in the output
    pub fn declared_keys(&self, records: &[Record]) -> Vec<GroupKey> {
        let phases = if self.grouping.by_phase {
            self.phases.clone()
        } else {
            vec![PhaseKey::All]
        };

        let platforms: Vec<Option<Platform>> = if self.grouping.by_platform {
            self.platforms.iter().copied().map(Some).collect()
        } else {
            vec![None]
        };

        let dimensions: Vec<Option<DimensionValue>> = match self.grouping.dimension {
            None => vec![None],
            Some(Dimension::Neighborhood) => self
                .neighborhoods
                .iter()
                .map(|n| Some(DimensionValue::Neighborhood(n.clone())))
                .collect(),
            Some(Dimension::Topic) => self
                .topics
                .universe(records)
                .into_iter()
                .map(|slot| Some(DimensionValue::Topic(slot)))
                .collect(),
        };

        let mut keys = Vec::with_capacity(phases.len() * platforms.len() * dimensions.len());
        for phase in &phases {
            for platform in &platforms {
                for dimension in &dimensions {
                    keys.push(GroupKey::new(phase.clone(), *platform, dimension.clone()));
                }
            }
        }
        keys
    }

    /// Keys a single record belongs to (zero or more)
    pub fn keys_for(&self, record: &Record) -> Vec<GroupKey> {
        let phase = if self.grouping.by_phase {
            record.phase().cloned().unwrap_or(PhaseKey::Unphased)
        } else {
            PhaseKey::All
        };
        let platform = self.grouping.by_platform.then_some(record.source_platform);

        match self.grouping.dimension {
            None => vec![GroupKey::new(phase, platform, None)],
            Some(Dimension::Neighborhood) => record
                .geo_tags
                .iter()
                .map(|n| {
                    GroupKey::new(
                        phase.clone(),
                        platform,
                        Some(DimensionValue::Neighborhood(n.clone())),
                    )
                })
                .collect(),
            Some(Dimension::Topic) => self
                .topics
                .slot_for(record)
                .map(|slot| GroupKey::new(phase, platform, Some(DimensionValue::Topic(slot))))
                .into_iter()
                .collect(),
        }
    }
}

/// Reduced contents of one group, before interval estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Summary {
    /// Contributing values, sorted ascending
    Numeric { values: Vec<f64> },

    /// Dominant-label counts among records that have one
    Distribution { counts: BTreeMap<Emotion, usize> },

    /// No record contributed a value
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateDraft {
    pub key: GroupKey,
    pub field: LabelField,
    /// Records in the group, whether or not they contributed
    pub total_n: usize,
    pub summary: Summary,
}

impl AggregateDraft {
    /// Number of contributing records
    pub fn n(&self) -> usize {
        match self.summary {
            Summary::Numeric { ref values } => values.len(),
            Summary::Distribution { ref counts } => counts.values().sum(),
            Summary::InsufficientData => 0,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        match self.summary {
            Summary::Numeric { ref values } => mean(values),
            _ => None,
        }
    }

    /// Label shares, highest first, ties by label name
    pub fn pmf(&self) -> Vec<(Emotion, f64)> {
        let counts = match self.summary {
            Summary::Distribution { ref counts } => counts,
            _ => return Vec::new(),
        };
        let n = counts.values().sum::<usize>() as f64;
        let mut shares: Vec<(Emotion, f64)> = counts
            .iter()
            .map(|(label, count)| (*label, *count as f64 / n))
            .collect();
        shares.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.as_str().cmp(b.0.as_str()))
        });
        shares
    }

    pub fn modal(&self) -> Option<Emotion> {
        self.pmf().first().map(|(label, _)| *label)
    }
}

/// Mean of `values`, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[derive(Default)]
struct Accumulator {
    total_n: usize,
    values: Vec<f64>,
    counts: BTreeMap<Emotion, usize>,
}

/// Group `records` per `plan` and reduce `field` within each group.
///
/// `emotion_threshold` is the dominant-emotion cut-off.
pub fn aggregate(
    records: &[Record],
    plan: &GroupSpec,
    field: LabelField,
    emotion_threshold: f64,
) -> BTreeMap<GroupKey, AggregateDraft> {
    let mut groups: BTreeMap<GroupKey, Accumulator> = plan
        .declared_keys(records)
        .into_iter()
        .map(|key| (key, Accumulator::default()))
        .collect();

    for record in records {
        for key in plan.keys_for(record) {
            let acc = groups.entry(key).or_default();
            acc.total_n += 1;

            match field {
                LabelField::Sentiment => acc.values.extend(record.sentiment),
                LabelField::Emotion(emotion) => {
                    acc.values.extend(record.emotion_scores.get(emotion))
                }
                LabelField::DominantEmotion => {
                    if let Some(label) = record.dominant_emotion(emotion_threshold) {
                        *acc.counts.entry(label).or_default() += 1;
                    }
                }
            }
        }
    }

    groups
        .into_iter()
        .map(|(key, mut acc)| {
            let summary = if field.is_numeric() {
                if acc.values.is_empty() {
                    Summary::InsufficientData
                } else {
                    acc.values.sort_by(f64::total_cmp);
                    Summary::Numeric { values: acc.values }
                }
            } else if acc.counts.is_empty() {
                Summary::InsufficientData
            } else {
                Summary::Distribution { counts: acc.counts }
            };

            let draft = AggregateDraft {
                key: key.clone(),
                field,
                total_n: acc.total_n,
                summary,
            };
            (key, draft)
        })
        .collect()
}

/// Daily volume and mean scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub n_posts: usize,
    pub sentiment_mean: Option<f64>,
    /// Mean per emotion over records that scored it
    pub emotion_means: BTreeMap<Emotion, f64>,
}

/// Per-UTC-day series over all records, ordered by date
pub fn daily_series(records: &[Record]) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, Vec<&Record>> = BTreeMap::new();
    for record in records {
        days.entry(record.timestamp.date_naive())
            .or_default()
            .push(record);
    }

    days.into_iter()
        .map(|(date, group)| {
            let mut sentiments: Vec<f64> = group.iter().filter_map(|r| r.sentiment).collect();
            sentiments.sort_by(f64::total_cmp);

            let emotion_means = Emotion::ALL
                .iter()
                .filter_map(|emotion| {
                    let mut values: Vec<f64> = group
                        .iter()
                        .filter_map(|r| r.emotion_scores.get(*emotion))
                        .collect();
                    values.sort_by(f64::total_cmp);
                    mean(&values).map(|m| (*emotion, m))
                })
                .collect();

            DailyPoint {
                date,
                n_posts: group.len(),
                sentiment_mean: mean(&sentiments),
                emotion_means,
            }
        })
        .collect()
}

/// Neighborhoods present on records but missing from `declared`
pub fn undeclared_neighborhoods(records: &[Record], declared: &[String]) -> BTreeSet<String> {
    records
        .iter()
        .flat_map(|r| r.geo_tags.iter())
        .filter(|n| !declared.contains(n))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EmotionScores, TopicSlot};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap as Map;

    fn plan(grouping: Grouping) -> GroupSpec {
        GroupSpec {
            grouping,
            phases: vec![
                PhaseKey::named("pre"),
                PhaseKey::named("event"),
                PhaseKey::Unphased,
            ],
            platforms: Platform::ALL.to_vec(),
            neighborhoods: vec!["Woodlawn".to_string(), "South Shore".to_string()],
            topics: TopicBackend::Model { labels: Map::new() },
        }
    }

    fn phase_platform() -> Grouping {
        Grouping {
            by_phase: true,
            by_platform: true,
            dimension: None,
        }
    }

    fn tagged(id: &str, phase: PhaseKey, platform: Platform) -> Record {
        let mut r = Record::new(
            id,
            Utc.with_ymd_and_hms(2025, 9, 20, 12, 0, 0).unwrap(),
            platform,
        );
        r.assign_phase(phase).unwrap();
        r
    }

    #[test]
    fn test_mean_excludes_missing_but_total_counts_all() {
        let records = vec![
            tagged("a", PhaseKey::named("pre"), Platform::Reddit).with_sentiment(0.5),
            tagged("b", PhaseKey::named("pre"), Platform::Reddit),
            tagged("c", PhaseKey::named("pre"), Platform::Reddit).with_sentiment(-0.1),
        ];
        let out = aggregate(&records, &plan(phase_platform()), LabelField::Sentiment, 0.3);
        let key = GroupKey::new(PhaseKey::named("pre"), Some(Platform::Reddit), None);
        let draft = &out[&key];

        assert_eq!(draft.total_n, 3);
        assert_eq!(draft.n(), 2);
        assert!((draft.mean().unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_empty_group_is_insufficient_not_missing() {
        let out = aggregate(&[], &plan(phase_platform()), LabelField::Sentiment, 0.3);
        assert_eq!(out.len(), 9);

        let key = GroupKey::new(PhaseKey::named("event"), Some(Platform::News), None);
        assert_eq!(out[&key].summary, Summary::InsufficientData);
        assert_eq!(out[&key].total_n, 0);
    }

    #[test]
    fn test_pmf_and_modal_tie_break() {
        let anger = EmotionScores::new().with(Emotion::Anger, 0.8).unwrap();
        let sad = EmotionScores::new().with(Emotion::Sadness, 0.7).unwrap();
        let weak = EmotionScores::new().with(Emotion::Joy, 0.1).unwrap();

        let records = vec![
            tagged("a", PhaseKey::named("pre"), Platform::News).with_emotions(sad),
            tagged("b", PhaseKey::named("pre"), Platform::News).with_emotions(anger),
            tagged("c", PhaseKey::named("pre"), Platform::News).with_emotions(weak),
        ];
        let out = aggregate(
            &records,
            &plan(phase_platform()),
            LabelField::DominantEmotion,
            0.3,
        );
        let draft = &out[&GroupKey::new(PhaseKey::named("pre"), Some(Platform::News), None)];

        assert_eq!(draft.total_n, 3);
        assert_eq!(draft.n(), 2);
        assert_eq!(draft.pmf(), vec![(Emotion::Anger, 0.5), (Emotion::Sadness, 0.5)]);
        assert_eq!(draft.modal(), Some(Emotion::Anger));
    }

    #[test]
    fn test_neighborhood_groups_multi_tag_and_undeclared() {
        let records = vec![
            tagged("a", PhaseKey::named("pre"), Platform::Reddit)
                .with_sentiment(0.2)
                .with_geo(["Woodlawn", "South Shore"]),
            tagged("b", PhaseKey::named("pre"), Platform::Reddit)
                .with_sentiment(0.4)
                .with_geo(["Hyde Park"]),
            tagged("c", PhaseKey::named("pre"), Platform::Reddit).with_sentiment(0.9),
        ];
        let grouping = Grouping {
            by_phase: true,
            by_platform: false,
            dimension: Some(Dimension::Neighborhood),
        };
        let out = aggregate(&records, &plan(grouping), LabelField::Sentiment, 0.3);

        let hood = |name: &str| {
            GroupKey::new(
                PhaseKey::named("pre"),
                None,
                Some(DimensionValue::Neighborhood(name.to_string())),
            )
        };
        assert_eq!(out[&hood("Woodlawn")].n(), 1);
        assert_eq!(out[&hood("South Shore")].n(), 1);
        assert_eq!(out[&hood("Hyde Park")].n(), 1);
        assert_eq!(
            undeclared_neighborhoods(&records, &plan(grouping).neighborhoods),
            ["Hyde Park".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn test_disabled_topics_yield_marker() {
        let records = vec![
            tagged("a", PhaseKey::named("pre"), Platform::Reddit)
                .with_sentiment(0.2)
                .with_topic(4),
        ];
        let mut plan = plan(Grouping {
            by_phase: true,
            by_platform: false,
            dimension: Some(Dimension::Topic),
        });
        plan.topics = TopicBackend::Disabled;

        let out = aggregate(&records, &plan, LabelField::Sentiment, 0.3);
        let key = GroupKey::new(
            PhaseKey::named("pre"),
            None,
            Some(DimensionValue::Topic(TopicSlot::Unavailable)),
        );
        assert_eq!(out[&key].summary, Summary::InsufficientData);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_reordering_does_not_change_output() {
        let mut records: Vec<Record> = (0..20)
            .map(|i| {
                tagged(&format!("r{}", i), PhaseKey::named("pre"), Platform::Reddit)
                    .with_sentiment((i as f64 * 0.37).sin())
            })
            .collect();
        let forward = aggregate(&records, &plan(phase_platform()), LabelField::Sentiment, 0.3);
        records.reverse();
        let backward = aggregate(&records, &plan(phase_platform()), LabelField::Sentiment, 0.3);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_daily_series() {
        let t1 = Utc.with_ymd_and_hms(2025, 10, 2, 1, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 10, 2, 23, 0, 0).unwrap();
        let t3 = Utc.with_ymd_and_hms(2025, 10, 1, 5, 0, 0).unwrap();
        let fear = EmotionScores::new().with(Emotion::Fear, 0.6).unwrap();
        let records = vec![
            Record::new("a", t1, Platform::Reddit).with_sentiment(0.5).with_emotions(fear),
            Record::new("b", t2, Platform::News),
            Record::new("c", t3, Platform::News).with_sentiment(-0.5),
        ];

        let series = daily_series(&records);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(series[1].n_posts, 2);
        assert_eq!(series[1].sentiment_mean, Some(0.5));
        assert_eq!(series[1].emotion_means.get(&Emotion::Fear), Some(&0.6));
        assert!(series[0].emotion_means.is_empty());
    }
}
