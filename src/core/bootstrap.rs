//! Percentile bootstrap intervals.
//!
//! Every interval is driven by its own `StdRng`, seeded from the study seed
//! and the identity of the group and field it belongs to. Results therefore
//! do not depend on which worker computes a group or in what order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use super::aggregator::{AggregateDraft, Summary};
use crate::domain::{
    AggregateStat, Emotion, Estimate, GroupKey, Interval, LabelField, LabelShare, StatOutcome,
};

/// Resampling parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootstrapSettings {
    pub resamples: usize,
    /// Two-sided confidence level, e.g. 0.95
    pub confidence: f64,
    pub seed: u64,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            resamples: 1000,
            confidence: 0.95,
            seed: 42,
        }
    }
}

/// Percentile bootstrap interval for the mean of `values`.
///
/// Fewer than two values give [`Interval::Undefined`]. The returned bounds
/// always contain the sample mean.
pub fn bootstrap_ci(values: &[f64], resamples: usize, confidence: f64, seed: u64) -> Interval {
    let n = values.len();
    let point = if n == 0 {
        None
    } else {
        Some(values.iter().sum::<f64>() / n as f64)
    };

    let point = match point {
        Some(p) if n >= 2 && resamples > 0 => p,
        estimate => return Interval::Undefined { estimate },
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut means: Vec<f64> = (0..resamples)
        .map(|_| {
            let total: f64 = (0..n).map(|_| values[rng.gen_range(0..n)]).sum();
            total / n as f64
        })
        .collect();
    means.sort_by(f64::total_cmp);

    let alpha = (1.0 - confidence) / 2.0;
    let last = means.len() - 1;
    let low_idx = ((alpha * means.len() as f64) as usize).min(last);
    let high_idx = (((1.0 - alpha) * means.len() as f64) as usize).min(last);

    Interval::Bounded {
        low: means[low_idx].min(point),
        high: means[high_idx].max(point),
    }
}

/// Seed for one (group, field) interval
pub fn group_seed(seed: u64, key: &GroupKey, field: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(key.to_string().as_bytes());
    hasher.update(field.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Turn a draft into a final statistic with intervals
pub fn estimate(draft: &AggregateDraft, settings: &BootstrapSettings) -> AggregateStat {
    let outcome = match draft.summary {
        Summary::InsufficientData => StatOutcome::InsufficientData,
        Summary::Numeric { ref values } => {
            let seed = group_seed(settings.seed, &draft.key, &draft.field.name());
            let interval = bootstrap_ci(values, settings.resamples, settings.confidence, seed);
            StatOutcome::Mean(Estimate {
                value: values.iter().sum::<f64>() / values.len() as f64,
                n: values.len(),
                interval,
            })
        }
        Summary::Distribution { .. } => distribution(draft, settings),
    };

    AggregateStat {
        key: draft.key.clone(),
        field: draft.field,
        total_n: draft.total_n,
        confidence_level: settings.confidence,
        outcome,
    }
}

/// Shares get their interval from the mean of a 0/1 indicator per label
fn distribution(draft: &AggregateDraft, settings: &BootstrapSettings) -> StatOutcome {
    let counts = match draft.summary {
        Summary::Distribution { ref counts } => counts,
        _ => return StatOutcome::InsufficientData,
    };
    let n = draft.n();
    let pmf = draft.pmf();
    let modal = match pmf.first() {
        Some((label, _)) => *label,
        None => return StatOutcome::InsufficientData,
    };

    let shares = pmf
        .iter()
        .map(|(label, share)| {
            let hits = counts.get(label).copied().unwrap_or(0);
            let indicator = indicator(hits, n);
            let field = format!("{}:{}", LabelField::DominantEmotion, label);
            let seed = group_seed(settings.seed, &draft.key, &field);

            LabelShare {
                label: *label,
                share: Estimate {
                    value: *share,
                    n,
                    interval: bootstrap_ci(
                        &indicator,
                        settings.resamples,
                        settings.confidence,
                        seed,
                    ),
                },
            }
        })
        .collect();

    StatOutcome::Distribution { modal, n, shares }
}

fn indicator(hits: usize, n: usize) -> Vec<f64> {
    let mut values = vec![0.0; n - hits.min(n)];
    values.resize(n, 1.0);
    values
}

/// Modal label of a distribution outcome
pub fn modal_of(stat: &AggregateStat) -> Option<Emotion> {
    match stat.outcome {
        StatOutcome::Distribution { modal, .. } => Some(modal),
        _ => None,
    }
}
