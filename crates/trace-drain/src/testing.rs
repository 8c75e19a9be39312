//! Testing utilities
//!
//! In-memory source and sink for driving the cycle runner without a cluster
//! or an InfluxDB instance.
//!
//! ```rust,ignore
//! use trace_drain::testing::{MockPointSink, MockTraceSource};
//!
//! let source = Arc::new(MockTraceSource::new().with_records(records));
//! let sink = Arc::new(MockPointSink::new().fail_on_write(1, "503"));
//!
//! let runner = CycleRunner::new(source.clone(), sink.clone());
//! let report = runner.run_cycle().await?;
//!
//! assert_eq!(sink.batch_sizes(), vec![1000, 500]);
//! assert_eq!(source.truncate_count(), 1);
//! ```

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::batch::Batch;
use crate::error::{DrainError, Result};
use crate::point::TimeSeriesPoint;
use crate::record::TraceRecord;
use crate::sink::PointSink;
use crate::source::TraceSource;

// ============================================================================
// Mock Source
// ============================================================================

/// Scripted trace source.
///
/// Truncating really clears the scripted rows, so a second cycle sees an
/// empty table unless more rows are pushed in between.
#[derive(Debug, Default)]
pub struct MockTraceSource {
    records: Arc<Mutex<Vec<TraceRecord>>>,
    open_error: Arc<Mutex<Option<String>>>,
    stream_error_after: Arc<Mutex<Option<(usize, String)>>>,
    truncate_error: Arc<Mutex<Option<String>>>,
    reads: Arc<Mutex<usize>>,
    truncates: Arc<Mutex<usize>>,
}

impl MockTraceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rows returned by the next read
    pub fn with_records(self, records: Vec<TraceRecord>) -> Self {
        *self.records.lock() = records;
        self
    }

    /// Add rows, as if written between cycles
    pub fn push_records(&self, records: impl IntoIterator<Item = TraceRecord>) {
        self.records.lock().extend(records);
    }

    /// Make opening the query fail
    pub fn fail_open(self, message: impl Into<String>) -> Self {
        *self.open_error.lock() = Some(message.into());
        self
    }

    /// Yield `n` rows, then a stream error
    pub fn fail_stream_after(self, n: usize, message: impl Into<String>) -> Self {
        *self.stream_error_after.lock() = Some((n, message.into()));
        self
    }

    /// Make truncation fail
    pub fn fail_truncate(self, message: impl Into<String>) -> Self {
        *self.truncate_error.lock() = Some(message.into());
        self
    }

    /// Rows still in the table
    pub fn remaining(&self) -> usize {
        self.records.lock().len()
    }

    pub fn read_count(&self) -> usize {
        *self.reads.lock()
    }

    /// Number of truncate calls, including failed ones
    pub fn truncate_count(&self) -> usize {
        *self.truncates.lock()
    }
}

#[async_trait]
impl TraceSource for MockTraceSource {
    fn name(&self) -> &str {
        "mock-source"
    }

    async fn read(&self) -> Result<BoxStream<'static, Result<TraceRecord>>> {
        *self.reads.lock() += 1;

        if let Some(msg) = self.open_error.lock().clone() {
            return Err(DrainError::source_query(msg));
        }

        let mut items: Vec<Result<TraceRecord>> =
            self.records.lock().iter().cloned().map(Ok).collect();

        if let Some((n, msg)) = self.stream_error_after.lock().clone() {
            items.truncate(n);
            items.push(Err(DrainError::source_stream(msg)));
        }

        Ok(stream::iter(items).boxed())
    }

    async fn truncate(&self) -> Result<()> {
        *self.truncates.lock() += 1;

        if let Some(msg) = self.truncate_error.lock().clone() {
            return Err(DrainError::truncate(msg));
        }
        self.records.lock().clear();
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        match self.open_error.lock().clone() {
            Some(msg) => Err(DrainError::connection(msg)),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Mock Sink
// ============================================================================

/// Sink that records every batch it receives
#[derive(Debug, Default)]
pub struct MockPointSink {
    batches: Arc<Mutex<Vec<Batch>>>,
    attempts: Arc<Mutex<usize>>,
    fail_on: Arc<Mutex<Vec<usize>>>,
    fail_message: Arc<Mutex<Option<String>>>,
    fail_all: Arc<Mutex<bool>>,
}

impl MockPointSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the n-th write call (1-based)
    pub fn fail_on_write(self, n: usize, message: impl Into<String>) -> Self {
        self.fail_on.lock().push(n);
        *self.fail_message.lock() = Some(message.into());
        self
    }

    /// Fail every write and check
    pub fn fail_with(self, message: impl Into<String>) -> Self {
        *self.fail_all.lock() = true;
        *self.fail_message.lock() = Some(message.into());
        self
    }

    /// Batches written successfully, in order
    pub fn written_batches(&self) -> Vec<Batch> {
        self.batches.lock().clone()
    }

    /// Sizes of successfully written batches, in order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().iter().map(Batch::len).collect()
    }

    /// All successfully written points, in order
    pub fn written_points(&self) -> Vec<TimeSeriesPoint> {
        self.batches
            .lock()
            .iter()
            .flat_map(|b| b.points().to_vec())
            .collect()
    }

    pub fn written_count(&self) -> usize {
        self.batches.lock().iter().map(Batch::len).sum()
    }

    /// Number of write calls, including failed ones
    pub fn write_attempts(&self) -> usize {
        *self.attempts.lock()
    }

    fn message(&self) -> String {
        self.fail_message
            .lock()
            .clone()
            .unwrap_or_else(|| "mock error".into())
    }
}

#[async_trait]
impl PointSink for MockPointSink {
    fn name(&self) -> &str {
        "mock-sink"
    }

    async fn write(&self, batch: &Batch) -> Result<()> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            *attempts += 1;
            *attempts
        };

        if *self.fail_all.lock() || self.fail_on.lock().contains(&attempt) {
            return Err(DrainError::write(self.message()));
        }

        self.batches.lock().push(batch.clone());
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        if *self.fail_all.lock() {
            return Err(DrainError::connection(self.message()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_truncate_clears() {
        let source = MockTraceSource::new().with_records(vec![TraceRecord::new("a", "SELECT 1")]);

        let rows: Vec<_> = source.read().await.unwrap().collect().await;
        assert_eq!(rows.len(), 1);

        source.truncate().await.unwrap();
        assert_eq!(source.remaining(), 0);
        assert_eq!(source.truncate_count(), 1);

        let rows: Vec<_> = source.read().await.unwrap().collect().await;
        assert!(rows.is_empty());
        assert_eq!(source.read_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_source_stream_error() {
        let source = MockTraceSource::new()
            .with_records(vec![
                TraceRecord::new("a", "SELECT 1"),
                TraceRecord::new("b", "SELECT 2"),
            ])
            .fail_stream_after(1, "page timeout");

        let rows: Vec<_> = source.read().await.unwrap().collect().await;
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_ok());
        assert!(matches!(rows[1], Err(DrainError::SourceStream(_))));
    }

    #[tokio::test]
    async fn test_mock_sink_fail_on_write() {
        let sink = MockPointSink::new().fail_on_write(1, "503");
        let batch = Batch::from_points(Vec::new());

        assert!(sink.write(&batch).await.is_err());
        assert!(sink.write(&batch).await.is_ok());
        assert_eq!(sink.write_attempts(), 2);
        assert_eq!(sink.written_batches().len(), 1);
    }
}
