//! Append-only record log with file-based persistence.
//!
//! Upstream stages append newline-delimited JSON (JSONL) events to one
//! file: an `ingested` line per record followed by any number of
//! `enriched` lines. A line may also hold a bare, already-enriched record,
//! which is read as its own `ingested` event.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::domain::{Corpus, Enrichment, Record, RecordEvent};

/// Parse one log line. Lines carrying a `kind` are events; anything else
/// is a bare record.
fn parse_line(line: &str) -> Result<RecordEvent> {
    let value: serde_json::Value = serde_json::from_str(line).context("Invalid JSON")?;
    if value.get("kind").is_some() {
        serde_json::from_value(value).context("Invalid record event")
    } else {
        let record = serde_json::from_value(value).context("Invalid record")?;
        Ok(RecordEvent::Ingested { record })
    }
}

/// File-based record log using JSONL format
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// Open a record log, creating its parent directory if needed
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &RecordEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open record log: {}", self.path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize record event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write record event")?;
        file.flush().await.context("Failed to flush record event")?;

        Ok(())
    }

    pub async fn ingest(&self, record: &Record) -> Result<()> {
        self.append(&RecordEvent::Ingested {
            record: record.clone(),
        })
        .await
    }

    pub async fn enrich(&self, id: &str, enrichment: Enrichment) -> Result<()> {
        self.append(&RecordEvent::Enriched {
            id: id.to_string(),
            enrichment,
        })
        .await
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<RecordEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open record log: {}", self.path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let event = parse_line(&line).with_context(|| {
                format!("Failed to parse line {} of {}", line_no, self.path.display())
            })?;
            events.push(event);
        }

        debug!(path = %self.path.display(), events = events.len(), "Replayed record log");
        Ok(events)
    }

    /// Replay the log into a corpus and report text-hash collisions
    pub async fn load_corpus(&self) -> Result<Corpus> {
        let events = self.replay().await?;
        let corpus = Corpus::from_events(&events);

        for (hash, ids) in corpus.duplicate_text_hashes() {
            warn!(text_hash = %hash, ids = ?ids, "Records share a text hash");
        }

        info!(records = corpus.len(), path = %self.path.display(), "Loaded corpus");
        Ok(corpus)
    }
}
