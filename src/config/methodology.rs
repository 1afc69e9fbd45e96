//! Built-in study defaults: the seven-phase window table, the event anchor
//! and the verified event timeline.
//!
//! All instants are UTC. The anchor is 06:00 CDT on 2025-09-30.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::{EventWindow, PhaseWindow, VerificationLevel, VerifiedEvent};

pub const DEFAULT_NEIGHBORHOODS: [&str; 6] = [
    "South Shore",
    "South Chicago",
    "Woodlawn",
    "Greater Grand Crossing",
    "Avalon Park",
    "Calumet Heights",
];

/// Literal UTC instant. Only used in `const` items, so an invalid literal
/// fails the build instead of falling back at runtime.
const fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => match date.and_hms_opt(hour, 0, 0) {
            Some(naive) => naive.and_utc(),
            None => panic!("invalid built-in hour"),
        },
        None => panic!("invalid built-in date"),
    }
}

const ANCHOR: DateTime<Utc> = utc(2025, 9, 30, 11);
const SEP_16: DateTime<Utc> = utc(2025, 9, 16, 0);
const SEP_30: DateTime<Utc> = utc(2025, 9, 30, 0);
const OCT_1: DateTime<Utc> = utc(2025, 10, 1, 0);
const OCT_8: DateTime<Utc> = utc(2025, 10, 8, 0);
const OCT_15: DateTime<Utc> = utc(2025, 10, 15, 0);
const NOV_7: DateTime<Utc> = utc(2025, 11, 7, 0);
const DEC_1: DateTime<Utc> = utc(2025, 12, 1, 0);
const DEC_13: DateTime<Utc> = utc(2025, 12, 13, 0);

pub fn event_window() -> EventWindow {
    EventWindow {
        anchor: ANCHOR,
        tolerance: Duration::hours(24),
        label: "Event Window (±24h)".to_string(),
    }
}

pub fn phase_windows() -> Vec<PhaseWindow> {
    vec![
        PhaseWindow::new("pre", "Pre-Raid Baseline", SEP_16, SEP_30),
        PhaseWindow::new("post_week1", "Post-Raid Week 1", OCT_1, OCT_8),
        PhaseWindow::new("post_week2", "Post-Raid Week 2", OCT_8, OCT_15),
        PhaseWindow::new(
            "post_weeks3_5",
            "Extended Monitoring",
            OCT_15,
            NOV_7,
        ),
        PhaseWindow::new("court_action", "Court Action & Tenants Union", NOV_7, DEC_1),
        PhaseWindow::new("displacement", "Forced Displacement", DEC_1, DEC_13),
    ]
}

pub fn verified_events() -> Vec<VerifiedEvent> {
    const BLOCK_CLUB: &str = "Block Club Chicago";
    let timeline: [(u32, u32, &str, u8, &str); 7] = [
        (9, 30, "Operation Midway Blitz (t=0)", 1, "Block Club Chicago, AP, WBEZ"),
        (10, 1, "Residents Return to Ransacked Apts", 2, BLOCK_CLUB),
        (10, 24, "Distress Calls Investigation Published", 2, BLOCK_CLUB),
        (11, 7, "Judge Orders Building Cleared", 2, BLOCK_CLUB),
        (11, 24, "Tenants Union Formed", 2, BLOCK_CLUB),
        (12, 8, "Eviction Deadline Denied Extension", 2, BLOCK_CLUB),
        (12, 12, "Building Vacated", 2, BLOCK_CLUB),
    ];

    timeline
        .iter()
        .filter_map(|(month, day, description, level, source)| {
            let date = NaiveDate::from_ymd_opt(2025, *month, *day)?;
            let level = VerificationLevel::new(*level)?;
            Some(VerifiedEvent::new(date, *description, level).with_source(*source))
        })
        .collect()
}
