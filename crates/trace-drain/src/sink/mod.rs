//! Point sinks

use async_trait::async_trait;

use crate::batch::Batch;
use crate::error::Result;

pub mod influx;

pub use influx::InfluxSink;

/// Destination for batches of points.
///
/// One call to [`PointSink::write`] is one write request: the batch lands
/// entirely or the call fails.
#[async_trait]
pub trait PointSink: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Write a non-empty batch
    async fn write(&self, batch: &Batch) -> Result<()>;

    /// Verify the destination is reachable
    async fn check(&self) -> Result<()>;
}
