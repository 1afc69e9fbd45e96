//! The record set, rebuilt by replaying ingestion and enrichment events.
//!
//! Each upstream stage emits its output independently; the corpus folds
//! them into one logical record per id.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::phase::PhaseKey;
use super::record::{Enrichment, Record, RecordError};

/// One line of the record log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordEvent {
    /// A record entered the study
    Ingested { record: Record },

    /// An analysis stage produced output for an existing record
    Enriched { id: String, enrichment: Enrichment },
}

/// All records of a study, in ingestion order
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    records: Vec<Record>,
    index: HashMap<String, usize>,

    /// Fingerprint of the phase configuration the records were tagged with
    tagged_with: Option<String>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a corpus from records that are already fully enriched
    pub fn from_records(records: Vec<Record>) -> Result<Self, RecordError> {
        let mut corpus = Self::new();
        for record in records {
            corpus.insert(record)?;
        }
        Ok(corpus)
    }

    /// Replay a record log. Events that cannot be applied are logged and
    /// skipped; the rest of the log still applies.
    pub fn from_events(events: &[RecordEvent]) -> Self {
        let mut corpus = Self::new();
        let mut skipped = 0usize;

        for event in events {
            if let Err(e) = corpus.apply_event(event) {
                warn!(error = %e, "Skipping record event");
                skipped += 1;
            }
        }

        debug!(records = corpus.len(), skipped, "Corpus rebuilt from events");
        corpus
    }

    /// Apply a single event
    pub fn apply_event(&mut self, event: &RecordEvent) -> Result<(), RecordError> {
        match event {
            RecordEvent::Ingested { record } => self.insert(record.clone()),
            RecordEvent::Enriched { id, enrichment } => self.enrich(id, enrichment),
        }
    }

    /// Add a record. Phases are computed, never ingested, so any phase the
    /// record carries is dropped.
    pub fn insert(&mut self, mut record: Record) -> Result<(), RecordError> {
        if self.index.contains_key(&record.id) {
            return Err(RecordError::Duplicate(record.id));
        }
        record.validate()?;
        record.clear_phase();
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Update a record in place with one stage's output
    pub fn enrich(&mut self, id: &str, enrichment: &Enrichment) -> Result<(), RecordError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| RecordError::Unknown(id.to_string()))?;
        self.records[idx].apply(enrichment)
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.index.get(id).map(|&idx| &self.records[idx])
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn tagged_with(&self) -> Option<&str> {
        self.tagged_with.as_deref()
    }

    /// Assign every record's phase for the configuration identified by
    /// `fingerprint`.
    ///
    /// Tagging again with the same fingerprint only tags records inserted
    /// since the last pass. A new fingerprint clears all phases and
    /// recomputes them. Returns the number of records (re)tagged.
    pub fn tag_phases<F>(&mut self, fingerprint: &str, classify: F) -> Result<usize, RecordError>
    where
        F: Fn(&Record) -> PhaseKey,
    {
        if self.tagged_with.is_some() && self.tagged_with.as_deref() != Some(fingerprint) {
            debug!(fingerprint, "Phase configuration changed, recomputing all phases");
            for record in &mut self.records {
                record.clear_phase();
            }
        }

        let mut tagged = 0;
        for record in self.records.iter_mut().filter(|r| r.phase().is_none()) {
            let phase = classify(record);
            record.assign_phase(phase)?;
            tagged += 1;
        }

        self.tagged_with = Some(fingerprint.to_string());
        Ok(tagged)
    }

    /// Text hashes shared by more than one record, with the offending ids
    pub fn duplicate_text_hashes(&self) -> Vec<(String, Vec<String>)> {
        let mut by_hash: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for record in &self.records {
            if let Some(ref hash) = record.text_hash {
                by_hash.entry(hash).or_default().push(record.id.clone());
            }
        }

        by_hash
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(hash, ids)| (hash.to_string(), ids))
            .collect()
    }
}
