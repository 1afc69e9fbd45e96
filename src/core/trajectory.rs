//! Qualitative shape of a field's mean across ordered phases.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{
    AggregateStat, DimensionValue, GroupKey, LabelField, PhaseKey, Platform, Scale, EVENT_PHASE,
};

/// Fewest phase points a trajectory is reported for
pub const MIN_POINTS: usize = 3;

/// Slack for threshold comparisons, so a change that equals the effect
/// size up to rounding still counts
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "label")]
pub enum Trajectory {
    Rising,
    Declining,
    PeakAtEvent,
    Stable,
    Volatile,
    InsufficientData { points: usize },
}

impl Trajectory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trajectory::Rising => "rising",
            Trajectory::Declining => "declining",
            Trajectory::PeakAtEvent => "peak_at_event",
            Trajectory::Stable => "stable",
            Trajectory::Volatile => "volatile",
            Trajectory::InsufficientData { .. } => "insufficient_data",
        }
    }
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One phase mean in a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasePoint {
    pub phase: String,
    pub mean: f64,
}

impl PhasePoint {
    pub fn new(phase: impl Into<String>, mean: f64) -> Self {
        Self {
            phase: phase.into(),
            mean,
        }
    }
}

/// Classify a series given in canonical phase order.
///
/// Checked in order: peak at event, rising, declining, stable. Anything
/// left over is volatile. Changes are measured as a fraction of the
/// field's scale.
pub fn classify_trajectory(points: &[PhasePoint], scale: Scale, effect_size: f64) -> Trajectory {
    if points.len() < MIN_POINTS {
        return Trajectory::InsufficientData {
            points: points.len(),
        };
    }

    let range = scale.range();
    let values: Vec<f64> = points.iter().map(|p| p.mean).collect();

    if is_peak_at_event(points, &values, range, effect_size) {
        return Trajectory::PeakAtEvent;
    }

    let (ups, downs) = values.windows(2).fold((0usize, 0usize), |(up, down), pair| {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            (up + 1, down)
        } else if delta < 0.0 {
            (up, down + 1)
        } else {
            (up, down)
        }
    });

    let net = (values[values.len() - 1] - values[0]) / range;
    if net >= effect_size - EPSILON && ups > downs {
        return Trajectory::Rising;
    }
    if net <= -(effect_size - EPSILON) && downs > ups {
        return Trajectory::Declining;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let max_deviation = values
        .iter()
        .map(|v| (v - mean).abs() / range)
        .fold(0.0, f64::max);
    if max_deviation < effect_size {
        return Trajectory::Stable;
    }

    Trajectory::Volatile
}

fn is_peak_at_event(points: &[PhasePoint], values: &[f64], range: f64, effect_size: f64) -> bool {
    let event_idx = match points.iter().position(|p| p.phase == EVENT_PHASE) {
        Some(idx) if idx > 0 && idx < points.len() - 1 => idx,
        _ => return false,
    };

    let peak = values[event_idx];
    let before = values[..event_idx].iter().copied().fold(f64::MIN, f64::max);
    let after = values[event_idx + 1..].iter().copied().fold(f64::MIN, f64::max);

    (peak - before) / range >= effect_size - EPSILON
        && (peak - after) / range >= effect_size - EPSILON
}

/// Classified series for one (field, platform, dimension)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub field: LabelField,
    /// `None` pools all platforms
    pub platform: Option<Platform>,
    pub dimension: Option<DimensionValue>,
    pub points: Vec<PhasePoint>,
    pub trajectory: Trajectory,
    /// Last minus first phase mean, when there are at least two points
    pub net_change: Option<f64>,
}

/// Collect the phase means for one series in `order`.
///
/// Phases whose group has no mean (insufficient data) are skipped.
pub fn phase_points<'a, I>(
    stats: I,
    order: &[String],
    platform: Option<Platform>,
    dimension: Option<&DimensionValue>,
) -> Vec<PhasePoint>
where
    I: Fn(&GroupKey) -> Option<&'a AggregateStat>,
{
    order
        .iter()
        .filter_map(|phase| {
            let key = GroupKey::new(PhaseKey::named(phase.as_str()), platform, dimension.cloned());
            let stat = stats(&key)?;
            stat.mean().map(|estimate| PhasePoint::new(phase.as_str(), estimate.value))
        })
        .collect()
}

/// Build and classify the series for one (field, platform, dimension)
pub fn trajectory_for<'a, I>(
    stats: I,
    order: &[String],
    field: LabelField,
    platform: Option<Platform>,
    dimension: Option<DimensionValue>,
    effect_size: f64,
) -> TrajectoryRecord
where
    I: Fn(&GroupKey) -> Option<&'a AggregateStat>,
{
    let points = phase_points(stats, order, platform, dimension.as_ref());
    let trajectory = classify_trajectory(&points, field.scale(), effect_size);
    let net_change = match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => Some(last.mean - first.mean),
        _ => None,
    };

    TrajectoryRecord {
        field,
        platform,
        dimension,
        points,
        trajectory,
        net_change,
    }
}
