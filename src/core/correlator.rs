//! Place verified events on the phase timeline.
//!
//! Events are resolved through the same classifier used for records, so
//! overlay markers always land in the phase whose data they annotate.
//! Nothing here touches aggregate statistics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::phase_classifier::PhaseClassifier;
use crate::domain::{PhaseKey, VerifiedEvent};

/// A verified event with its resolved phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedEvent {
    #[serde(flatten)]
    pub event: VerifiedEvent,
    pub phase: PhaseKey,
}

/// Resolve every event's phase, ordered by date (input order on ties)
pub fn correlate(events: &[VerifiedEvent], classifier: &PhaseClassifier) -> Vec<AnnotatedEvent> {
    let mut overlay: Vec<AnnotatedEvent> = events
        .iter()
        .map(|event| {
            let phase = classifier.key_for(event.instant());
            if let Some(ref declared) = event.phase_impact {
                if phase.name() != Some(declared.as_str()) {
                    warn!(
                        date = %event.date,
                        declared = %declared,
                        resolved = %phase,
                        "Verified event phase_impact disagrees with resolved phase"
                    );
                }
            }
            AnnotatedEvent {
                event: event.clone(),
                phase,
            }
        })
        .collect();

    // Vec::sort_by_key is stable
    overlay.sort_by_key(|a| a.event.date);
    overlay
}

pub fn events_for_phase<'a>(
    overlay: &'a [AnnotatedEvent],
    phase: &'a PhaseKey,
) -> impl Iterator<Item = &'a AnnotatedEvent> + 'a {
    overlay.iter().filter(move |a| &a.phase == phase)
}

/// First event dated `date`, if any
pub fn event_on(overlay: &[AnnotatedEvent], date: NaiveDate) -> Option<&AnnotatedEvent> {
    overlay.iter().find(|a| a.event.date == date)
}
