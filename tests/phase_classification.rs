//! Phase Classification Integration Tests
//!
//! Tests for the built-in seven-phase table, event precedence, gap
//! handling and configuration validation.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tidemark::config::StudyConfig;
use tidemark::domain::{EventWindow, PhaseKey, PhaseWindow};
use tidemark::{ConfigError, PhaseClassifier};

fn at(m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, m, d, h, min, 0).unwrap()
}

#[test]
fn test_methodology_scenario() {
    let config = StudyConfig::methodology();
    let classifier = &config.classifier;

    let timestamps = [
        at(9, 20, 12, 0),
        at(9, 30, 0, 10),
        at(10, 3, 9, 0),
        at(11, 20, 18, 0),
    ];
    let phases: Vec<Option<&str>> = timestamps.iter().map(|t| classifier.classify(*t)).collect();

    assert_eq!(
        phases,
        vec![
            Some("pre"),
            Some("event"),
            Some("post_week1"),
            Some("court_action")
        ]
    );
}

#[test]
fn test_every_phase_reachable() {
    let config = StudyConfig::methodology();
    let classifier = &config.classifier;

    let cases = [
        (at(9, 16, 0, 0), "pre"),
        (at(9, 29, 10, 59), "pre"),
        (at(9, 29, 11, 0), "event"),
        (at(10, 1, 11, 0), "event"),
        (at(10, 1, 11, 1), "post_week1"),
        (at(10, 8, 0, 0), "post_week2"),
        (at(10, 15, 0, 0), "post_weeks3_5"),
        (at(11, 7, 0, 0), "court_action"),
        (at(12, 1, 0, 0), "displacement"),
    ];
    for (t, expected) in cases {
        assert_eq!(classifier.classify(t), Some(expected), "at {}", t);
    }
}

#[test]
fn test_outside_windows_unphased() {
    let config = StudyConfig::methodology();
    let classifier = &config.classifier;

    assert_eq!(classifier.classify(at(9, 15, 23, 59)), None);
    // end bound is exclusive
    assert_eq!(classifier.key_for(at(12, 13, 0, 0)), PhaseKey::Unphased);
}

#[test]
fn test_classification_is_idempotent() {
    let config = StudyConfig::methodology();
    let classifier = &config.classifier;

    let mut t = at(9, 10, 0, 0);
    while t < at(12, 20, 0, 0) {
        let first = classifier.classify(t).map(str::to_string);
        let second = classifier.classify(t).map(str::to_string);
        assert_eq!(first, second);
        if let Some(name) = first {
            assert!(classifier.canonical_order().contains(&name));
        }
        t += Duration::hours(7);
    }
}

#[test]
fn test_canonical_order() {
    let config = StudyConfig::methodology();
    assert_eq!(
        config.classifier.canonical_order(),
        vec![
            "pre",
            "event",
            "post_week1",
            "post_week2",
            "post_weeks3_5",
            "court_action",
            "displacement"
        ]
    );
}

#[test]
fn test_duplicate_names_rejected() {
    let event = EventWindow {
        anchor: at(9, 30, 11, 0),
        tolerance: Duration::hours(24),
        label: "Event".to_string(),
    };
    let windows = vec![
        PhaseWindow::new("pre", "Pre", at(9, 1, 0, 0), at(9, 10, 0, 0)),
        PhaseWindow::new("pre", "Pre again", at(9, 10, 0, 0), at(9, 20, 0, 0)),
    ];

    let err = PhaseClassifier::new(windows, event).unwrap_err();
    assert_eq!(err, ConfigError::DuplicatePhase("pre".to_string()));
}

#[test]
fn test_negative_tolerance_rejected() {
    let event = EventWindow {
        anchor: at(9, 30, 11, 0),
        tolerance: Duration::hours(-1),
        label: "Event".to_string(),
    };
    let err = PhaseClassifier::new(Vec::new(), event).unwrap_err();
    assert_eq!(err, ConfigError::NegativeTolerance);
}
