//! trace-drain - Periodic transfer of Cassandra/Scylla trace sessions into InfluxDB
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────┐     ┌─────────┐     ┌────────────┐
//! │ system_traces    │────▶│ Transformer │────▶│ Batcher │────▶│  InfluxDB  │
//! │   .sessions      │     │ (classify)  │     │ (1000)  │     │  /write    │
//! └──────────────────┘     └─────────────┘     └─────────┘     └────────────┘
//!          ▲                                                          │
//!          └──────────────────────── TRUNCATE ◀───────────────────────┘
//! ```
//!
//! Every interval the [`CycleRunner`] reads the whole trace table, keeps the
//! rows whose request text contains one of the configured keywords, writes
//! them as points in fixed-size batches, and then truncates the table.
//!
//! # Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trace_drain::{CqlTraceSource, CycleRunner, DrainConfig, InfluxSink};
//!
//! let config = DrainConfig::from_file("trace-drain.yaml")?;
//! let source = Arc::new(CqlTraceSource::connect(&config.source).await?);
//! let sink = Arc::new(InfluxSink::new(&config.sink)?);
//!
//! let runner = CycleRunner::new(source, sink)
//!     .with_batch_size(config.pipeline.batch_size)
//!     .with_interval(config.pipeline.interval());
//!
//! let report = runner.run_cycle().await?;
//! println!("wrote {} points", report.points_written);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Drain every 5 minutes until interrupted
//! trace-drain -c trace-drain.yaml
//!
//! # Single cycle
//! trace-drain -c trace-drain.yaml once
//!
//! # Check connectivity to both stores
//! trace-drain -c trace-drain.yaml check
//! ```

pub mod batch;
pub mod classify;
pub mod config;
pub mod error;
pub mod point;
pub mod record;
pub mod runner;
pub mod sink;
pub mod source;
pub mod testing;
pub mod transform;
pub mod types;

pub use batch::{Batch, Batcher};
pub use classify::{Classifier, ClassifyTarget, KeywordClassifier};
pub use config::DrainConfig;
pub use error::{CycleState, DrainError, Result};
pub use point::{FieldValue, TimeSeriesPoint};
pub use record::TraceRecord;
pub use runner::{CycleReport, CycleRunner};
pub use sink::{InfluxSink, PointSink};
pub use source::{CqlTraceSource, TraceSource};
pub use transform::Transformer;
pub use types::SensitiveString;
