//! Drain cycle tests: scripted source → runner → recording sink
//!
//! These tests verify one full cycle end to end:
//! 1. Rows are read and classified
//! 2. Accepted points are flushed in fixed-size batches
//! 3. The source is truncated afterwards, unless the read was incomplete
//!
//! Run with: cargo test -p trace-drain --test pipeline -- --nocapture

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use trace_drain::testing::{MockPointSink, MockTraceSource};
use trace_drain::{
    ClassifyTarget, CycleRunner, DrainError, FieldValue, KeywordClassifier, TraceRecord,
    Transformer,
};

fn record(i: usize, request: &str) -> TraceRecord {
    TraceRecord::new(format!("00000000-0000-0000-0000-{:012}", i), request)
        .with_client("10.0.0.7")
        .with_command("QUERY")
        .with_coordinator("10.0.0.1")
        .with_duration(100 + i as i64)
        .with_started_at(Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap())
}

fn selects(n: usize) -> Vec<TraceRecord> {
    (0..n).map(|i| record(i, "SELECT * FROM ks.t")).collect()
}

fn runner(source: &Arc<MockTraceSource>, sink: &Arc<MockPointSink>) -> CycleRunner {
    CycleRunner::new(source.clone(), sink.clone())
}

#[tokio::test]
async fn test_unclassified_records_are_discarded() {
    let source = Arc::new(MockTraceSource::new().with_records(vec![
        record(1, "Execute batch of CQL3 queries"),
        record(2, "Preparing statement"),
        record(3, "select lowercase does not count"),
    ]));
    let sink = Arc::new(MockPointSink::new());

    let report = runner(&source, &sink).run_cycle().await.unwrap();

    assert_eq!(report.records_read, 3);
    assert_eq!(report.records_discarded, 3);
    assert_eq!(report.points_written, 0);
    assert_eq!(sink.write_attempts(), 0);
    assert_eq!(source.truncate_count(), 1);
}

#[tokio::test]
async fn test_type_tag_follows_keyword_priority() {
    let source = Arc::new(MockTraceSource::new().with_records(vec![
        record(1, "SELECT a FROM t"),
        record(2, "INSERT INTO t (a) VALUES (1)"),
        record(3, "UPDATE t SET a = 1"),
        record(4, "INSERT INTO t (a) SELECT a FROM u"),
        record(5, "UPDATE t SET note = 'INSERT'"),
    ]));
    let sink = Arc::new(MockPointSink::new());

    runner(&source, &sink).run_cycle().await.unwrap();

    let types: Vec<String> = sink
        .written_points()
        .iter()
        .map(|p| p.tag("type").unwrap_or_default().to_string())
        .collect();
    assert_eq!(types, vec!["SELECT", "INSERT", "UPDATE", "SELECT", "INSERT"]);
}

#[tokio::test]
async fn test_batches_partition_accepted_points() {
    for total in [0usize, 1, 9, 10, 11, 25, 30] {
        let mut records = selects(total);
        // Interleave rows that must not count toward any batch
        records.extend((0..7).map(|i| record(1000 + i, "Preparing statement")));

        let source = Arc::new(MockTraceSource::new().with_records(records));
        let sink = Arc::new(MockPointSink::new());

        let report = runner(&source, &sink)
            .with_batch_size(10)
            .run_cycle()
            .await
            .unwrap();

        let sizes = sink.batch_sizes();
        assert_eq!(sizes.iter().sum::<usize>(), total, "total {}", total);
        if let Some((last, full)) = sizes.split_last() {
            assert!(full.iter().all(|&s| s == 10), "sizes {:?}", sizes);
            assert!(*last >= 1 && *last <= 10, "sizes {:?}", sizes);
        }
        assert_eq!(report.points_written as usize, total);
        assert_eq!(report.records_discarded, 7);
        assert_eq!(source.truncate_count(), 1);
    }
}

#[tokio::test]
async fn test_empty_source() {
    let source = Arc::new(MockTraceSource::new());
    let sink = Arc::new(MockPointSink::new());

    let report = runner(&source, &sink).run_cycle().await.unwrap();

    assert_eq!(report.records_read, 0);
    assert_eq!(sink.write_attempts(), 0);
    assert_eq!(source.truncate_count(), 1);
    assert!(report.truncated);
    assert!(!report.has_failures());
}

#[tokio::test]
async fn test_1500_records_flush_1000_then_500() {
    let source = Arc::new(MockTraceSource::new().with_records(selects(1500)));
    let sink = Arc::new(MockPointSink::new());

    let report = runner(&source, &sink).run_cycle().await.unwrap();

    assert_eq!(sink.batch_sizes(), vec![1000, 500]);
    assert_eq!(report.batches_written, 2);
    assert_eq!(report.points_written, 1500);
    assert_eq!(source.truncate_count(), 1);
    assert_eq!(source.remaining(), 0);

    // Rows keep their read order across batches
    let points = sink.written_points();
    assert_eq!(points[0].tag("session_id"), Some("00000000-0000-0000-0000-000000000000"));
    assert_eq!(points[1000].tag("session_id"), Some("00000000-0000-0000-0000-000000001000"));
}

#[tokio::test]
async fn test_exactly_one_batch_worth() {
    let source = Arc::new(MockTraceSource::new().with_records(selects(1000)));
    let sink = Arc::new(MockPointSink::new());

    runner(&source, &sink).run_cycle().await.unwrap();

    assert_eq!(sink.batch_sizes(), vec![1000]);
}

#[tokio::test]
async fn test_select_with_empty_parameters() {
    let source = Arc::new(MockTraceSource::new().with_records(vec![record(1, "SELECT * FROM x")]));
    let sink = Arc::new(MockPointSink::new());

    runner(&source, &sink).run_cycle().await.unwrap();

    let points = sink.written_points();
    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(point.measurement(), "sessions");
    assert_eq!(point.tag("type"), Some("SELECT"));
    assert_eq!(
        point.field("request"),
        Some(&FieldValue::String("SELECT * FROM x".to_string()))
    );
    assert_eq!(
        point.field("parameters"),
        Some(&FieldValue::String("{}".to_string()))
    );
    assert_eq!(point.field("duration"), Some(&FieldValue::Integer(101)));
}

#[tokio::test]
async fn test_first_flush_failure_does_not_stop_cycle() {
    let source = Arc::new(MockTraceSource::new().with_records(selects(1500)));
    let sink = Arc::new(MockPointSink::new().fail_on_write(1, "503 Service Unavailable"));

    let report = runner(&source, &sink).run_cycle().await.unwrap();

    assert_eq!(sink.write_attempts(), 2);
    assert_eq!(sink.batch_sizes(), vec![500]);
    assert_eq!(report.batches_failed, 1);
    assert_eq!(report.points_failed, 1000);
    assert_eq!(report.points_written, 500);
    assert_eq!(report.points_accepted(), 1500);
    // Failed rows are not re-delivered
    assert_eq!(source.truncate_count(), 1);
    assert_eq!(source.remaining(), 0);
}

#[tokio::test]
async fn test_stream_failure_skips_truncate() {
    let source = Arc::new(
        MockTraceSource::new()
            .with_records(selects(1500))
            .fail_stream_after(1200, "page fetch timed out"),
    );
    let sink = Arc::new(MockPointSink::new());

    let err = runner(&source, &sink).run_cycle().await.unwrap_err();

    assert!(matches!(err, DrainError::SourceStream(_)));
    assert!(err.is_fatal());
    assert_eq!(source.truncate_count(), 0);
    assert_eq!(source.remaining(), 1500);
    // The first full batch had already gone out
    assert_eq!(sink.batch_sizes(), vec![1000]);
}

#[tokio::test]
async fn test_open_failure_is_fatal() {
    let source = Arc::new(MockTraceSource::new().fail_open("unconfigured table sessions"));
    let sink = Arc::new(MockPointSink::new());

    let err = runner(&source, &sink).run_cycle().await.unwrap_err();

    assert!(matches!(err, DrainError::SourceQuery(_)));
    assert!(err.is_fatal());
    assert_eq!(source.truncate_count(), 0);
}

#[tokio::test]
async fn test_truncate_failure_is_not_fatal() {
    let source = Arc::new(
        MockTraceSource::new()
            .with_records(selects(3))
            .fail_truncate("Cannot achieve consistency level ALL"),
    );
    let sink = Arc::new(MockPointSink::new());

    let report = runner(&source, &sink).run_cycle().await.unwrap();

    assert_eq!(report.points_written, 3);
    assert!(!report.truncated);
    assert!(report.has_failures());
    assert_eq!(source.truncate_count(), 1);
}

#[tokio::test]
async fn test_next_cycle_sees_only_new_rows() {
    let source = Arc::new(MockTraceSource::new().with_records(selects(5)));
    let sink = Arc::new(MockPointSink::new());
    let runner = runner(&source, &sink);

    runner.run_cycle().await.unwrap();
    source.push_records(vec![record(99, "UPDATE t SET a = 2")]);
    let report = runner.run_cycle().await.unwrap();

    assert_eq!(report.records_read, 1);
    assert_eq!(sink.batch_sizes(), vec![5, 1]);
    assert_eq!(runner.cycles_completed(), 2);
}

#[tokio::test]
async fn test_classify_on_parameters() {
    let transformer = Transformer::new(
        "sessions",
        ClassifyTarget::Parameters,
        Arc::new(KeywordClassifier::default()),
    );
    let source = Arc::new(MockTraceSource::new().with_records(vec![
        record(1, "Execute CQL3 query").with_parameter("query", "INSERT INTO t (a) VALUES (1)"),
        record(2, "SELECT * FROM x"),
    ]));
    let sink = Arc::new(MockPointSink::new());

    let report = runner(&source, &sink)
        .with_transformer(transformer)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.records_discarded, 1);
    let points = sink.written_points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].tag("type"), Some("INSERT"));
}
