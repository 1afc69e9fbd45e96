//! Topic capability selected once per study.
//!
//! Topic output may come from a full topic model, from the keyword
//! fallback, or not at all. The backend decides which topic slots exist
//! and how records map onto them; aggregation never checks which one is
//! active.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Record, TopicSlot};

/// Topic id conventionally used for unclustered records
pub const OUTLIER_TOPIC: i32 = -1;

/// Keyword topics used when the topic model is unavailable
pub const KEYWORD_TOPICS: [(i32, &str); 10] = [
    (0, "Raid Operations"),
    (1, "Helicopters & Flashbangs"),
    (2, "Property Damage"),
    (3, "Legal Aid & Rights"),
    (4, "Child & Family Trauma"),
    (5, "Community Organizing"),
    (6, "Mutual Aid & Resources"),
    (7, "Political Response"),
    (8, "Media Coverage"),
    (9, "Housing & Displacement"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicBackend {
    /// Topic ids come from a fitted topic model
    Model { labels: BTreeMap<i32, String> },

    /// Topic ids come from the keyword lexicon
    KeywordFallback { labels: BTreeMap<i32, String> },

    /// No topic output for this study
    Disabled,
}

impl TopicBackend {
    pub fn name(&self) -> &'static str {
        match self {
            TopicBackend::Model { .. } => "model",
            TopicBackend::KeywordFallback { .. } => "keyword_fallback",
            TopicBackend::Disabled => "disabled",
        }
    }

    /// Slot a record contributes to, if any
    pub fn slot_for(&self, record: &Record) -> Option<TopicSlot> {
        match self {
            TopicBackend::Disabled => None,
            _ => record.topic_id.map(TopicSlot::Id),
        }
    }

    /// Every slot that must appear in topic-scoped output, observed or not
    pub fn universe(&self, records: &[Record]) -> Vec<TopicSlot> {
        let observed = records.iter().filter_map(|r| r.topic_id);

        let ids: BTreeSet<i32> = match self {
            TopicBackend::Model { .. } => observed.collect(),
            TopicBackend::KeywordFallback { .. } => KEYWORD_TOPICS
                .iter()
                .map(|(id, _)| *id)
                .chain(std::iter::once(OUTLIER_TOPIC))
                .chain(observed)
                .collect(),
            TopicBackend::Disabled => return vec![TopicSlot::Unavailable],
        };

        ids.into_iter().map(TopicSlot::Id).collect()
    }

    /// Display label for a slot
    pub fn label(&self, slot: TopicSlot) -> String {
        let id = match slot {
            TopicSlot::Id(id) => id,
            TopicSlot::Unavailable => return "Topics unavailable".to_string(),
        };
        if id == OUTLIER_TOPIC {
            return "Outlier".to_string();
        }

        match self {
            TopicBackend::Model { labels } => labels
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("Topic_{}", id)),
            TopicBackend::KeywordFallback { labels } => labels
                .get(&id)
                .cloned()
                .or_else(|| {
                    KEYWORD_TOPICS
                        .iter()
                        .find(|(k, _)| *k == id)
                        .map(|(_, label)| label.to_string())
                })
                .unwrap_or_else(|| format!("Topic_{}", id)),
            TopicBackend::Disabled => "Topics unavailable".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;
    use chrono::{TimeZone, Utc};

    fn records() -> Vec<Record> {
        let t = Utc.with_ymd_and_hms(2025, 10, 5, 0, 0, 0).unwrap();
        vec![
            Record::new("a", t, Platform::Reddit).with_topic(3),
            Record::new("b", t, Platform::News).with_topic(14),
            Record::new("c", t, Platform::News),
        ]
    }

    #[test]
    fn test_model_universe_is_observed() {
        let backend = TopicBackend::Model {
            labels: BTreeMap::new(),
        };
        assert_eq!(
            backend.universe(&records()),
            vec![TopicSlot::Id(3), TopicSlot::Id(14)]
        );
        assert_eq!(backend.label(TopicSlot::Id(14)), "Topic_14");
    }

    #[test]
    fn test_keyword_universe_includes_lexicon() {
        let backend = TopicBackend::KeywordFallback {
            labels: BTreeMap::new(),
        };
        let universe = backend.universe(&records());
        assert_eq!(universe.len(), 12);
        assert_eq!(universe[0], TopicSlot::Id(OUTLIER_TOPIC));
        assert_eq!(backend.label(TopicSlot::Id(9)), "Housing & Displacement");
        assert_eq!(backend.label(TopicSlot::Id(-1)), "Outlier");
    }

    #[test]
    fn test_disabled_ignores_record_topics() {
        let backend = TopicBackend::Disabled;
        let rs = records();
        assert_eq!(backend.slot_for(&rs[0]), None);
        assert_eq!(backend.universe(&rs), vec![TopicSlot::Unavailable]);
    }
}
