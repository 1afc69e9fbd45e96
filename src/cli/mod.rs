//! Command-line interface for tidemark.
//!
//! Provides commands for running a study over a record log, classifying
//! individual timestamps, listing the verified event overlay, and showing
//! the resolved configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::config::StudyConfig;
use crate::core::{correlate, Analyzer, RecordStore};
use crate::domain::LabelField;
use crate::export::write_exports;

/// tidemark - Longitudinal sentiment phase analysis
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Study config file (defaults to .tidemark/study.yaml or the built-in methodology)
    #[arg(short, long, global = true, env = "TIDEMARK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a record log and write the export tables
    Run {
        /// Record log (JSONL of record events or bare records)
        #[arg(short, long)]
        records: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "tidemark-out")]
        out: PathBuf,

        /// Override the bootstrap seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of bootstrap resamples
        #[arg(long)]
        resamples: Option<usize>,
    },

    /// Show the phase each timestamp falls in
    Classify {
        /// RFC 3339 timestamps, e.g. 2025-09-30T00:10:00Z
        #[arg(required = true)]
        timestamps: Vec<String>,
    },

    /// List verified events with their resolved phases
    Events,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = StudyConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Run {
                records,
                out,
                seed,
                resamples,
            } => run_study(config, &records, &out, seed, resamples).await,
            Commands::Classify { timestamps } => classify(&config, &timestamps),
            Commands::Events => list_events(&config),
            Commands::Config => show_config(&config),
        }
    }
}

/// Run the full analysis and export it
async fn run_study(
    mut config: StudyConfig,
    records_path: &Path,
    out: &Path,
    seed: Option<u64>,
    resamples: Option<usize>,
) -> Result<()> {
    if let Some(seed) = seed {
        config.bootstrap.seed = seed;
    }
    if let Some(resamples) = resamples {
        anyhow::ensure!(resamples > 0, "--resamples must be at least 1");
        config.bootstrap.resamples = resamples;
    }

    if !records_path.exists() {
        anyhow::bail!("Record log not found: {}", records_path.display());
    }

    let store = RecordStore::open(records_path).await?;
    let mut corpus = store.load_corpus().await?;

    let analyzer = Analyzer::new(config);
    let report = analyzer.run(&mut corpus).await?;
    let written = write_exports(&report, out).await?;

    println!("Records:  {} ({} unphased)", report.total_records, report.unphased_records);
    println!("Phases:   {}", report.phase_order.join(" → "));
    println!("Topics:   {}", report.topic_backend);
    println!("Seed:     {} ({} resamples)", report.seed, report.resamples);
    println!();
    println!("Trajectories (all platforms):");
    for field in LabelField::all().into_iter().filter(|f| f.is_numeric()) {
        if let Some(t) = report.trajectory(field, None, None) {
            let change = t
                .net_change
                .map(|c| format!("{:+.3}", c))
                .unwrap_or_else(|| "-".to_string());
            println!("  {:<18} {:<18} {}", field.name(), t.trajectory, change);
        }
    }
    println!();
    for path in written {
        println!("Wrote {}", path.display());
    }

    Ok(())
}

fn classify(config: &StudyConfig, timestamps: &[String]) -> Result<()> {
    for raw in timestamps {
        let t: DateTime<Utc> = DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid RFC 3339 timestamp: {}", raw))?
            .with_timezone(&Utc);
        let phase = config.classifier.key_for(t);
        let label = phase
            .name()
            .and_then(|name| config.classifier.label(name))
            .unwrap_or("(outside every phase)");
        println!("{}  {:<14} {}", t.to_rfc3339(), phase.to_string(), label);
    }
    Ok(())
}

fn list_events(config: &StudyConfig) -> Result<()> {
    let overlay = correlate(&config.verified_events, &config.classifier);

    if overlay.is_empty() {
        println!("No verified events configured.");
        return Ok(());
    }

    println!("{:<12} {:<4} {:<14} EVENT", "DATE", "LVL", "PHASE");
    println!("{}", "-".repeat(64));
    for annotated in &overlay {
        let event = &annotated.event;
        println!(
            "{:<12} {:<4} {:<14} {}",
            event.date,
            event.verification_level.to_string(),
            annotated.phase.to_string(),
            event.description
        );
        if let Some(ref source) = event.source {
            println!("{:<32} ({})", "", source);
        }
    }

    Ok(())
}

fn show_config(config: &StudyConfig) -> Result<()> {
    let classifier = &config.classifier;

    println!("Config file: {}", config.config_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(none - using methodology defaults)".to_string()));
    println!("Fingerprint: {}", classifier.fingerprint());
    println!();
    println!("Event window:");
    let event = classifier.event();
    println!("  Anchor:    {}", event.anchor.to_rfc3339());
    println!("  Tolerance: ±{}h", event.tolerance.num_hours());
    println!();
    println!("Phases:");
    for window in classifier.windows() {
        println!(
            "  {:<14} [{} , {})  {}",
            window.name,
            window.start.to_rfc3339(),
            window.end.to_rfc3339(),
            window.label
        );
    }
    println!();
    println!("Thresholds:");
    println!("  Emotion confidence:     {}", config.thresholds.emotion_confidence);
    println!("  Trajectory effect size: {}", config.thresholds.trajectory_effect_size);
    println!();
    println!("Bootstrap:");
    println!("  Resamples:  {}", config.bootstrap.resamples);
    println!("  Confidence: {}", config.bootstrap.confidence);
    println!("  Seed:       {}", config.bootstrap.seed);
    println!();
    println!("Topics: {}", config.topics.name());
    println!("Neighborhoods: {}", config.neighborhoods.join(", "));

    Ok(())
}
