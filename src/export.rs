//! Flat tabular output for storage and the presentation layer.
//!
//! Aggregates flatten to one row per group key and statistic. Every table
//! is written as JSONL next to a small JSON manifest describing the run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::core::analyzer::StudyReport;
use crate::domain::{AggregateStat, Estimate, Interval, StatOutcome};

pub const AGGREGATES_FILE: &str = "aggregates.jsonl";
pub const TRAJECTORIES_FILE: &str = "trajectories.jsonl";
pub const OVERLAY_FILE: &str = "overlay.jsonl";
pub const DAILY_FILE: &str = "daily.jsonl";
pub const MANIFEST_FILE: &str = "manifest.json";

/// One row of the aggregate table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub field: String,
    pub phase: String,
    /// Platform name or `all`
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_value: Option<String>,
    /// `mean`, `share:<label>` or `insufficient_data`
    pub statistic: String,
    pub value: Option<f64>,
    pub n: usize,
    pub total_n: usize,
    pub ci_low: Option<f64>,
    pub ci_high: Option<f64>,
    /// False when the group had fewer than two contributors
    pub ci_defined: bool,
    pub confidence_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modal: Option<String>,
}

impl AggregateRow {
    fn base(stat: &AggregateStat, statistic: String) -> Self {
        let dimension = stat.key.dimension.as_ref();
        Self {
            field: stat.field.name(),
            phase: stat.key.phase.to_string(),
            platform: stat
                .key
                .platform
                .map(|p| p.to_string())
                .unwrap_or_else(|| "all".to_string()),
            dimension: dimension.map(|d| format!("{:?}", d.dimension()).to_lowercase()),
            dimension_value: dimension.map(|d| d.value()),
            statistic,
            value: None,
            n: 0,
            total_n: stat.total_n,
            ci_low: None,
            ci_high: None,
            ci_defined: false,
            confidence_level: stat.confidence_level,
            modal: None,
        }
    }

    fn with_estimate(mut self, estimate: &Estimate) -> Self {
        self.value = Some(estimate.value);
        self.n = estimate.n;
        self.ci_defined = estimate.interval.is_defined();
        match estimate.interval {
            Interval::Bounded { low, high } => {
                self.ci_low = Some(low);
                self.ci_high = Some(high);
            }
            // both bounds collapse onto the point estimate
            Interval::Undefined { estimate } => {
                self.ci_low = estimate;
                self.ci_high = estimate;
            }
        }
        self
    }
}

/// Flatten one statistic into its rows
pub fn rows_for(stat: &AggregateStat) -> Vec<AggregateRow> {
    match stat.outcome {
        StatOutcome::InsufficientData => {
            vec![AggregateRow::base(stat, "insufficient_data".to_string())]
        }
        StatOutcome::Mean(ref estimate) => {
            vec![AggregateRow::base(stat, "mean".to_string()).with_estimate(estimate)]
        }
        StatOutcome::Distribution {
            modal, ref shares, ..
        } => shares
            .iter()
            .map(|share| {
                let mut row = AggregateRow::base(stat, format!("share:{}", share.label))
                    .with_estimate(&share.share);
                row.modal = Some(modal.to_string());
                row
            })
            .collect(),
    }
}

impl StudyReport {
    /// The whole aggregate table, in key order
    pub fn aggregate_rows(&self) -> Vec<AggregateRow> {
        self.aggregates.values().flat_map(rows_for).collect()
    }
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    phase_fingerprint: &'a str,
    phase_order: &'a [String],
    topic_backend: &'a str,
    seed: u64,
    resamples: usize,
    total_records: usize,
    unphased_records: usize,
}

/// Write every report table under `dir`, returning the files written
pub async fn write_exports(report: &StudyReport, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

    let rows = report.aggregate_rows();
    let written = vec![
        write_jsonl(&dir.join(AGGREGATES_FILE), &rows).await?,
        write_jsonl(&dir.join(TRAJECTORIES_FILE), &report.trajectories).await?,
        write_jsonl(&dir.join(OVERLAY_FILE), &report.overlay).await?,
        write_jsonl(&dir.join(DAILY_FILE), &report.daily).await?,
        write_manifest(&dir.join(MANIFEST_FILE), report).await?,
    ];

    info!(dir = %dir.display(), rows = rows.len(), "Exports written");
    Ok(written)
}

async fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<PathBuf> {
    let mut content = String::new();
    for item in items {
        let line = serde_json::to_string(item).context("Failed to serialize export row")?;
        content.push_str(&line);
        content.push('\n');
    }

    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write export: {}", path.display()))?;
    Ok(path.to_path_buf())
}

async fn write_manifest(path: &Path, report: &StudyReport) -> Result<PathBuf> {
    let manifest = Manifest {
        phase_fingerprint: &report.phase_fingerprint,
        phase_order: &report.phase_order,
        topic_backend: &report.topic_backend,
        seed: report.seed,
        resamples: report.resamples,
        total_records: report.total_records,
        unphased_records: report.unphased_records,
    };
    let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;

    fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
    Ok(path.to_path_buf())
}
