//! Analyzer Integration Tests
//!
//! Runs whole studies from a record log to exported tables and checks
//! reproducibility and graceful degradation.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;
use tidemark::config::StudyConfig;
use tidemark::core::{event_on, Analyzer, RecordStore, TopicBackend};
use tidemark::domain::{
    Corpus, DimensionValue, Emotion, EmotionScores, Enrichment, GroupKey, Interval, LabelField,
    PhaseKey, Platform, Record, StatOutcome, TopicSlot,
};
use tidemark::export::{write_exports, AggregateRow, AGGREGATES_FILE, OVERLAY_FILE};

fn config() -> StudyConfig {
    let mut config = StudyConfig::methodology();
    config.bootstrap.resamples = 200;
    config
}

/// Fear peaks around the event, sentiment recovers slowly afterwards
fn records() -> Vec<Record> {
    let start = Utc.with_ymd_and_hms(2025, 9, 16, 3, 0, 0).unwrap();
    (0..240)
        .map(|i| {
            let t = start + Duration::hours(i as i64 * 9);
            let days = (t - Utc.with_ymd_and_hms(2025, 9, 30, 11, 0, 0).unwrap()).num_hours() as f64 / 24.0;
            let fear = (0.8 - days.abs() * 0.05).clamp(0.05, 0.95);
            let sentiment = (-0.6 + days.max(0.0) * 0.01).clamp(-1.0, 1.0);

            let scores = EmotionScores::new()
                .with(Emotion::Fear, fear)
                .unwrap()
                .with(Emotion::Gratitude, 0.2)
                .unwrap();
            let mut record = Record::new(format!("p{:03}", i), t, Platform::ALL[i % 2])
                .with_sentiment(if days < 0.0 { 0.1 } else { sentiment })
                .with_emotions(scores)
                .with_topic((i % 10) as i32);
            if i % 3 == 0 {
                record = record.with_geo(["South Shore"]);
            }
            record
        })
        .collect()
}

#[tokio::test]
async fn test_fixed_seed_runs_are_identical() {
    let analyzer = Analyzer::new(config());

    let mut first = Corpus::from_records(records()).unwrap();
    let mut second = Corpus::from_records(records()).unwrap();
    let a = analyzer.run(&mut first).await.unwrap();
    let b = analyzer.run(&mut second).await.unwrap();
    assert_eq!(a, b);

    // re-running on an already tagged corpus is a no-op for tagging
    let c = analyzer.run(&mut first).await.unwrap();
    assert_eq!(a, c);
}

#[tokio::test]
async fn test_trajectories_and_intervals() {
    let mut corpus = Corpus::from_records(records()).unwrap();
    let report = Analyzer::new(config()).run(&mut corpus).await.unwrap();

    let fear = report
        .trajectory(LabelField::Emotion(Emotion::Fear), None, None)
        .unwrap();
    assert_eq!(fear.points.len(), 7);
    assert_eq!(fear.trajectory.as_str(), "peak_at_event");

    let gratitude = report
        .trajectory(LabelField::Emotion(Emotion::Gratitude), None, None)
        .unwrap();
    assert_eq!(gratitude.trajectory.as_str(), "stable");

    for stat in report.stats_for(LabelField::Sentiment) {
        if let Some(estimate) = stat.mean() {
            match estimate.interval {
                Interval::Bounded { low, high } => {
                    assert!(estimate.n >= 2);
                    assert!(low <= estimate.value && estimate.value <= high);
                }
                Interval::Undefined { .. } => assert!(estimate.n < 2),
            }
        }
    }

    let dominant = report
        .stat(
            LabelField::DominantEmotion,
            &GroupKey::new(PhaseKey::named("event"), None, None),
        )
        .unwrap();
    match dominant.outcome {
        StatOutcome::Distribution { modal, .. } => assert_eq!(modal, Emotion::Fear),
        ref other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_topics_disabled_degrades_gracefully() {
    let mut config = config();
    config.topics = TopicBackend::Disabled;

    let mut corpus = Corpus::from_records(records()).unwrap();
    let report = Analyzer::new(config).run(&mut corpus).await.unwrap();

    let unavailable = Some(DimensionValue::Topic(TopicSlot::Unavailable));
    let topic_stats: Vec<_> = report
        .stats_for(LabelField::Sentiment)
        .filter(|s| s.key.dimension == unavailable)
        .collect();
    assert_eq!(topic_stats.len(), 8);
    assert!(topic_stats.iter().all(|s| s.is_insufficient()));

    let pre = report
        .stat(
            LabelField::Sentiment,
            &GroupKey::new(PhaseKey::named("pre"), Some(Platform::Reddit), None),
        )
        .unwrap();
    assert!(pre.mean().is_some());
}

#[tokio::test]
async fn test_overlay_matches_record_phases() {
    let mut corpus = Corpus::new();
    let report = Analyzer::new(config()).run(&mut corpus).await.unwrap();

    let dates: Vec<NaiveDate> = report.overlay.iter().map(|a| a.event.date).collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);

    let court = event_on(&report.overlay, NaiveDate::from_ymd_opt(2025, 11, 7).unwrap()).unwrap();
    assert_eq!(court.phase, PhaseKey::named("court_action"));
}

#[tokio::test]
async fn test_record_log_to_exports() {
    let temp = TempDir::new().unwrap();
    let store = RecordStore::open(temp.path().join("records.jsonl")).await.unwrap();

    for record in records().iter().take(60) {
        let base = Record::new(record.id.clone(), record.timestamp, record.source_platform);
        store.ingest(&base).await.unwrap();
        store
            .enrich(&record.id, Enrichment::Sentiment { compound: record.sentiment })
            .await
            .unwrap();
        store
            .enrich(
                &record.id,
                Enrichment::Emotions {
                    scores: record.emotion_scores,
                },
            )
            .await
            .unwrap();
    }

    let mut corpus = store.load_corpus().await.unwrap();
    assert_eq!(corpus.len(), 60);

    let report = Analyzer::new(config()).run(&mut corpus).await.unwrap();
    let out = temp.path().join("out");
    let written = write_exports(&report, &out).await.unwrap();
    assert_eq!(written.len(), 5);

    let content = std::fs::read_to_string(out.join(AGGREGATES_FILE)).unwrap();
    let rows: Vec<AggregateRow> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows, report.aggregate_rows());
    assert!(rows.iter().any(|r| r.statistic == "insufficient_data"));
    assert!(rows.iter().any(|r| r.statistic.starts_with("share:")));

    let overlay = std::fs::read_to_string(out.join(OVERLAY_FILE)).unwrap();
    assert_eq!(overlay.lines().count(), 7);
}

#[test]
fn test_config_file_changes_retag() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("study.yaml");
    std::fs::write(
        &path,
        r#"
event:
  anchor: 2025-10-10T00:00:00Z
  tolerance_hours: 6
phases:
  - name: before
    start: 2025-09-01T00:00:00Z
    end: 2025-10-10T00:00:00Z
  - name: after
    start: 2025-10-10T00:00:00Z
    end: 2025-12-31T00:00:00Z
bootstrap:
  resamples: 100
"#,
    )
    .unwrap();

    let custom = StudyConfig::load(Some(path.as_path())).unwrap();
    let mut corpus = Corpus::from_records(records()).unwrap();

    tokio_test::block_on(async {
        let default_report = Analyzer::new(config()).run(&mut corpus).await.unwrap();
        let custom_report = Analyzer::new(custom).run(&mut corpus).await.unwrap();

        assert_ne!(default_report.phase_fingerprint, custom_report.phase_fingerprint);
        assert_eq!(custom_report.phase_order, vec!["before", "event", "after"]);
        assert!(corpus
            .records()
            .iter()
            .all(|r| r.phase().and_then(|p| p.name()) != Some("pre")));
    });
}
