//! Cycle runner - drains the source into the sink on a fixed interval
//!
//! One cycle:
//!
//! ```text
//! read ──▶ transform ──▶ batcher ──▶ sink.write   (per full batch)
//!                                  └▶ sink.write   (remainder at end of stream)
//!                                       └▶ source.truncate
//! ```
//!
//! Failure policy:
//! - opening the query or fetching a page fails: the error is returned, the
//!   source is not truncated, and the caller ends the process
//! - a point cannot be built, a batch write fails, or truncation fails: the
//!   error is logged and the cycle carries on
//!
//! A failed batch is not retried. Truncation still runs afterwards, so those
//! rows are gone (at-most-once delivery).

use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::batch::{Batch, Batcher, DEFAULT_BATCH_SIZE};
use crate::error::{CycleState, Result};
use crate::sink::PointSink;
use crate::source::TraceSource;
use crate::transform::Transformer;

/// Outcome of one drain cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Rows pulled from the source
    pub records_read: u64,
    /// Rows that matched no category
    pub records_discarded: u64,
    /// Rows that matched but could not be turned into a point
    pub points_rejected: u64,
    pub points_written: u64,
    pub points_failed: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
    /// Whether the source table was cleared
    pub truncated: bool,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Points accepted by the transformer
    pub fn points_accepted(&self) -> u64 {
        self.points_written + self.points_failed
    }

    pub fn has_failures(&self) -> bool {
        self.batches_failed > 0 || self.points_rejected > 0 || !self.truncated
    }
}

/// Drives drain cycles against one source and one sink
pub struct CycleRunner {
    source: Arc<dyn TraceSource>,
    sink: Arc<dyn PointSink>,
    transformer: Transformer,
    batch_size: usize,
    interval: Duration,
    state: RwLock<CycleState>,
    cycles_completed: AtomicU64,
}

impl CycleRunner {
    pub fn new(source: Arc<dyn TraceSource>, sink: Arc<dyn PointSink>) -> Self {
        Self {
            source,
            sink,
            transformer: Transformer::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            interval: Duration::from_secs(300),
            state: RwLock::new(CycleState::Idle),
            cycles_completed: AtomicU64::new(0),
        }
    }

    pub fn with_transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Current phase
    pub fn state(&self) -> CycleState {
        *self.state.read()
    }

    /// Number of cycles that ran to completion
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    /// Run cycles forever, one per interval.
    ///
    /// The first cycle starts one interval after the call. A cycle that
    /// overruns the interval delays the next tick; cycles never overlap.
    /// Returns only on a fatal error.
    pub async fn run(&self) -> Result<()> {
        info!(
            source = self.source.name(),
            sink = self.sink.name(),
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Cycle runner started"
        );

        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            debug!("Tick, starting drain cycle");
            self.run_cycle().await?;
        }
    }

    /// Run a single drain → transform → flush → truncate pass
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        *self.state.write() = CycleState::Draining;
        let result = self.drain_once().await;
        *self.state.write() = CycleState::Idle;

        match &result {
            Ok(report) => {
                self.cycles_completed.fetch_add(1, Ordering::Relaxed);
                info!(
                    records = report.records_read,
                    discarded = report.records_discarded,
                    rejected = report.points_rejected,
                    written = report.points_written,
                    failed = report.points_failed,
                    batches = report.batches_written,
                    batches_failed = report.batches_failed,
                    truncated = report.truncated,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Drain cycle complete"
                );
            }
            Err(e) => {
                error!(error = %e, "Drain cycle aborted, source left untouched");
            }
        }

        result
    }

    async fn drain_once(&self) -> Result<CycleReport> {
        let started = Instant::now();
        let mut report = CycleReport::default();
        let mut batcher = Batcher::new(self.batch_size);

        let mut records = self.source.read().await?;

        while let Some(record) = records.next().await {
            let record = record?;
            report.records_read += 1;

            match self.transformer.transform(&record) {
                Ok(Some(point)) => {
                    if let Some(batch) = batcher.add(point) {
                        self.flush(batch, &mut report).await;
                    }
                }
                Ok(None) => {
                    report.records_discarded += 1;
                }
                Err(e) => {
                    warn!(session_id = %record.session_id, error = %e, "Skipping record");
                    report.points_rejected += 1;
                }
            }
        }
        drop(records);

        if let Some(batch) = batcher.drain() {
            self.flush(batch, &mut report).await;
        }

        match self.source.truncate().await {
            Ok(()) => report.truncated = true,
            Err(e) => error!(source = self.source.name(), error = %e, "Failed to truncate source"),
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }

    async fn flush(&self, batch: Batch, report: &mut CycleReport) {
        let count = batch.len() as u64;
        match self.sink.write(&batch).await {
            Ok(()) => {
                report.batches_written += 1;
                report.points_written += count;
            }
            Err(e) => {
                error!(sink = self.sink.name(), points = count, error = %e, "Failed to write batch");
                report.batches_failed += 1;
                report.points_failed += count;
            }
        }
    }
}
