//! Trace record sources

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::record::TraceRecord;

pub mod cql;

pub use self::cql::CqlTraceSource;

/// Something the pipeline can drain trace records from and clear afterwards.
///
/// Every call to [`TraceSource::read`] runs the query again, so a stream only
/// yields the rows present at that moment. An `Err` from `read` means the
/// query could not be opened; an `Err` item means a page could not be fetched
/// and the drain is incomplete.
#[async_trait]
pub trait TraceSource: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Open a lazily paged stream over all current rows
    async fn read(&self) -> Result<BoxStream<'static, Result<TraceRecord>>>;

    /// Remove every row from the trace table
    async fn truncate(&self) -> Result<()>;

    /// Verify the source is reachable
    async fn check(&self) -> Result<()>;
}
