//! Study configuration.
//!
//! Configuration sources (highest priority first):
//! 1. Explicit path (`--config`)
//! 2. Environment variable (TIDEMARK_CONFIG)
//! 3. Config file (.tidemark/study.yaml, searched upward from the current directory)
//! 4. User config (~/.tidemark/study.yaml)
//! 5. Built-in methodology defaults
//!
//! The resolved [`StudyConfig`] is passed explicitly to every component;
//! nothing reads configuration from global state.

pub mod methodology;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::core::bootstrap::BootstrapSettings;
use crate::core::phase_classifier::PhaseClassifier;
use crate::core::topics::TopicBackend;
use crate::domain::{EventWindow, PhaseWindow, VerifiedEvent};

/// Configuration errors. All of them are fatal at load time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Phase configuration has no event anchor")]
    MissingEventAnchor,

    #[error("Phase '{name}' must start before it ends ({start} >= {end})")]
    InvertedWindow {
        name: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Phase '{name}' starts before the preceding phase '{previous}'")]
    OutOfOrder { previous: String, name: String },

    #[error("Phase windows '{first}' and '{second}' overlap outside the event tolerance")]
    Overlap { first: String, second: String },

    #[error("Duplicate phase name: {0}")]
    DuplicatePhase(String),

    #[error("Phase name '{0}' is reserved")]
    ReservedName(String),

    #[error("Event tolerance must not be negative")]
    NegativeTolerance,

    #[error("Event tolerance of {0} hours is out of range")]
    ToleranceOutOfRange(i64),

    #[error("{name} must be within {range}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("Bootstrap needs at least one resample")]
    NoResamples,
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub event: Option<EventConfig>,
    #[serde(default)]
    pub phases: Option<Vec<PhaseConfig>>,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    #[serde(default)]
    pub neighborhoods: Option<Vec<String>>,
    #[serde(default)]
    pub verified_events: Option<Vec<VerifiedEvent>>,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventConfig {
    pub anchor: Option<DateTime<Utc>>,
    pub tolerance_hours: Option<i64>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhaseConfig {
    pub name: String,
    pub label: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdsConfig {
    pub emotion_confidence: Option<f64>,
    pub trajectory_effect_size: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    pub resamples: Option<usize>,
    pub confidence: Option<f64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicsConfig {
    #[serde(default)]
    pub backend: TopicBackendKind,
    #[serde(default)]
    pub labels: BTreeMap<i32, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicBackendKind {
    Model,
    #[default]
    KeywordFallback,
    Disabled,
}

/// Numeric cut-offs used by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum probability for a dominant emotion
    pub emotion_confidence: f64,
    /// Minimum normalized change for a trajectory shape
    pub trajectory_effect_size: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            emotion_confidence: 0.3,
            trajectory_effect_size: 0.1,
        }
    }
}

/// Resolved, validated study configuration
#[derive(Debug, Clone)]
pub struct StudyConfig {
    pub classifier: PhaseClassifier,
    pub thresholds: Thresholds,
    pub bootstrap: BootstrapSettings,
    pub topics: TopicBackend,
    pub neighborhoods: Vec<String>,
    pub verified_events: Vec<VerifiedEvent>,
    /// Path to config file (if one was used)
    pub config_file: Option<PathBuf>,
}

impl StudyConfig {
    /// The built-in seven-phase study
    pub fn methodology() -> Self {
        let classifier =
            PhaseClassifier::trusted(methodology::phase_windows(), methodology::event_window());

        Self {
            classifier,
            thresholds: Thresholds::default(),
            bootstrap: BootstrapSettings::default(),
            topics: TopicBackend::KeywordFallback {
                labels: BTreeMap::new(),
            },
            neighborhoods: methodology::DEFAULT_NEIGHBORHOODS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            verified_events: methodology::verified_events(),
            config_file: None,
        }
    }

    /// Parse and validate YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_yaml::from_str(content).context("Failed to parse study config YAML")?;
        Ok(file.resolve()?)
    }

    /// Load and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = load_config_file(path)?;
        let mut config = file
            .resolve()
            .with_context(|| format!("Invalid study config: {}", path.display()))?;
        config.config_file = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load configuration from all sources
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(env_path) = std::env::var("TIDEMARK_CONFIG") {
            return Self::from_file(Path::new(&env_path));
        }

        match find_config_file() {
            Some(path) => Self::from_file(&path),
            None => {
                debug!("No study config found, using methodology defaults");
                Ok(Self::methodology())
            }
        }
    }
}

impl ConfigFile {
    /// Validate and resolve into a [`StudyConfig`]
    pub fn resolve(self) -> Result<StudyConfig, ConfigError> {
        let defaults = StudyConfig::methodology();

        let event = match (self.event, self.phases.is_some()) {
            (Some(event), _) => {
                let anchor = event.anchor.ok_or(ConfigError::MissingEventAnchor)?;
                let hours = event.tolerance_hours.unwrap_or(24);
                EventWindow {
                    anchor,
                    tolerance: Duration::try_hours(hours)
                        .ok_or(ConfigError::ToleranceOutOfRange(hours))?,
                    label: event.label.unwrap_or_else(|| "Event Window".to_string()),
                }
            }
            (None, true) => return Err(ConfigError::MissingEventAnchor),
            (None, false) => defaults.classifier.event().clone(),
        };

        let windows = match self.phases {
            Some(phases) => phases
                .into_iter()
                .map(|p| {
                    let label = p.label.unwrap_or_else(|| p.name.clone());
                    PhaseWindow::new(p.name, label, p.start, p.end)
                })
                .collect(),
            None => defaults.classifier.windows().to_vec(),
        };

        let classifier = PhaseClassifier::new(windows, event)?;

        let thresholds = Thresholds {
            emotion_confidence: unit_interval(
                "thresholds.emotion_confidence",
                self.thresholds
                    .emotion_confidence
                    .unwrap_or(defaults.thresholds.emotion_confidence),
            )?,
            trajectory_effect_size: unit_interval(
                "thresholds.trajectory_effect_size",
                self.thresholds
                    .trajectory_effect_size
                    .unwrap_or(defaults.thresholds.trajectory_effect_size),
            )?,
        };

        let bootstrap = BootstrapSettings {
            resamples: self.bootstrap.resamples.unwrap_or(defaults.bootstrap.resamples),
            confidence: self.bootstrap.confidence.unwrap_or(defaults.bootstrap.confidence),
            seed: self.bootstrap.seed.unwrap_or(defaults.bootstrap.seed),
        };
        if bootstrap.resamples == 0 {
            return Err(ConfigError::NoResamples);
        }
        if !(bootstrap.confidence > 0.0 && bootstrap.confidence < 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "bootstrap.confidence",
                value: bootstrap.confidence,
                range: "(0, 1)",
            });
        }

        let labels = self.topics.labels;
        let topics = match self.topics.backend {
            TopicBackendKind::Model => TopicBackend::Model { labels },
            TopicBackendKind::KeywordFallback => TopicBackend::KeywordFallback { labels },
            TopicBackendKind::Disabled => TopicBackend::Disabled,
        };

        Ok(StudyConfig {
            classifier,
            thresholds,
            bootstrap,
            topics,
            neighborhoods: self.neighborhoods.unwrap_or(defaults.neighborhoods),
            verified_events: self.verified_events.unwrap_or(defaults.verified_events),
            config_file: None,
        })
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            range: "[0, 1]",
        })
    }
}

/// Find config file by searching current directory and parents, then home
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".tidemark").join("study.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    let user_config = dirs::home_dir()?.join(".tidemark").join("study.yaml");
    user_config.exists().then_some(user_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
