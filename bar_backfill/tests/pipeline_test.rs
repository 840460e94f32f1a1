use std::sync::Arc;

use bar_backfill::report::OutcomeStatus;
use tokio_util::sync::CancellationToken;

mod common;

use common::{Canned, FakeSource, FlakySink, TestStore};

#[tokio::test]
async fn drops_under_threshold_are_counted_and_the_rest_written() {
    let store = TestStore::new();
    let bad: Vec<usize> = (0..100).step_by(10).collect(); // 10 bad records
    let source = Arc::new(FakeSource::new().with("AAPL", Canned::Records(common::hourly_records(100, &bad))));
    let pipeline = common::pipeline(source, store.writer(), 0.2);

    let outcome = pipeline
        .process("AAPL", &common::template(), &CancellationToken::new())
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Ok);
    assert_eq!(outcome.bar_count, 90);
    assert_eq!(outcome.dropped, 10);
    assert!(outcome.error.is_none());
    assert_eq!(store.intraday_rows("AAPL"), 90);
}

#[tokio::test]
async fn drops_over_threshold_fail_the_symbol_and_write_nothing() {
    let store = TestStore::new();
    let bad: Vec<usize> = (0..30).collect(); // 30 bad records
    let source = Arc::new(FakeSource::new().with("AAPL", Canned::Records(common::hourly_records(100, &bad))));
    let pipeline = common::pipeline(source, store.writer(), 0.2);

    let outcome = pipeline
        .process("AAPL", &common::template(), &CancellationToken::new())
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.bar_count, 0);
    assert_eq!(outcome.dropped, 30);
    assert!(outcome.error.unwrap().contains("threshold"));
    assert_eq!(store.intraday_rows("AAPL"), 0);
}

#[tokio::test]
async fn partial_fetch_writes_what_arrived() {
    let store = TestStore::new();
    let source = Arc::new(FakeSource::new().with("MSFT", Canned::Partial(common::hourly_records(40, &[]))));
    let pipeline = common::pipeline(source, store.writer(), 0.2);

    let outcome = pipeline
        .process("MSFT", &common::template(), &CancellationToken::new())
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Partial);
    assert_eq!(outcome.bar_count, 40);
    assert!(outcome.error.unwrap().contains("503"));
    assert_eq!(store.intraday_rows("MSFT"), 40);
}

#[tokio::test]
async fn zero_records_is_an_empty_success() {
    let store = TestStore::new();
    let source = Arc::new(FakeSource::new().with("XYZ", Canned::Records(Vec::new())));
    let pipeline = common::pipeline(source, store.writer(), 0.2);

    let outcome = pipeline
        .process("XYZ", &common::template(), &CancellationToken::new())
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Empty);
    assert_eq!(outcome.bar_count, 0);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn terminal_fetch_fails_without_writing() {
    let store = TestStore::new();
    let source = Arc::new(FakeSource::new().with("BAD", Canned::Terminal));
    let pipeline = common::pipeline(source, store.writer(), 0.2);

    let outcome = pipeline
        .process("BAD", &common::template(), &CancellationToken::new())
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.error.unwrap().contains("404"));
    assert!(!outcome.transient);
    assert_eq!(store.total_intraday_rows(), 0);
}

#[tokio::test]
async fn reprocessing_a_symbol_is_idempotent() {
    let store = TestStore::new();
    let source = Arc::new(FakeSource::new().with("AAPL", Canned::Records(common::hourly_records(24, &[]))));
    let pipeline = common::pipeline(source, store.writer(), 0.2);
    let cancel = CancellationToken::new();

    pipeline.process("AAPL", &common::template(), &cancel).await;
    let again = pipeline.process("AAPL", &common::template(), &cancel).await;

    assert_eq!(again.status, OutcomeStatus::Ok);
    assert_eq!(store.intraday_rows("AAPL"), 24);
}

#[tokio::test]
async fn transient_write_failure_is_flagged_not_retried() {
    let source = Arc::new(FakeSource::new().with("AAPL", Canned::Records(common::hourly_records(5, &[]))));
    let sink = Arc::new(FlakySink::failing(1));
    let pipeline = common::pipeline(source.clone(), sink.clone(), 0.2);

    let outcome = pipeline
        .process("AAPL", &common::template(), &CancellationToken::new())
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.transient);
    assert_eq!(source.calls(), 1);
    assert!(sink.written.lock().unwrap().is_empty());
}
