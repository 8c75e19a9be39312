//! Batch accumulation
//!
//! ```rust,ignore
//! let mut batcher = Batcher::new(1000);
//!
//! for point in points {
//!     if let Some(batch) = batcher.add(point) {
//!         sink.write(&batch).await?;
//!     }
//! }
//!
//! if let Some(batch) = batcher.drain() {
//!     sink.write(&batch).await?;
//! }
//! ```

use crate::point::TimeSeriesPoint;

/// Default number of points per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Accumulates points into batches of at most `max_size`.
///
/// A full batch is not handed out when it fills up but when the next point
/// arrives: that point triggers the flush of the full batch and then starts
/// the new one. A cycle that produces exactly `max_size` points therefore
/// gets its only batch from [`Batcher::drain`].
#[derive(Debug)]
pub struct Batcher {
    max_size: usize,
    points: Vec<TimeSeriesPoint>,
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl Batcher {
    /// Create a batcher; a `max_size` of zero is treated as one
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            points: Vec::with_capacity(max_size.min(DEFAULT_BATCH_SIZE)),
        }
    }

    /// Add a point.
    ///
    /// Returns the previous batch when it was already at capacity.
    pub fn add(&mut self, point: TimeSeriesPoint) -> Option<Batch> {
        let full = if self.points.len() >= self.max_size {
            self.take_batch()
        } else {
            None
        };
        self.points.push(point);
        full
    }

    /// Hand out whatever is left, or `None` when nothing is buffered
    pub fn drain(&mut self) -> Option<Batch> {
        self.take_batch()
    }

    fn take_batch(&mut self) -> Option<Batch> {
        if self.points.is_empty() {
            return None;
        }
        let capacity = self.max_size.min(DEFAULT_BATCH_SIZE);
        let points = std::mem::replace(&mut self.points, Vec::with_capacity(capacity));
        Some(Batch { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// An ordered group of points written in one call
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    points: Vec<TimeSeriesPoint>,
}

impl Batch {
    pub fn from_points(points: Vec<TimeSeriesPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeSeriesPoint> {
        self.points.iter()
    }
}

impl IntoIterator for Batch {
    type Item = TimeSeriesPoint;
    type IntoIter = std::vec::IntoIter<TimeSeriesPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a TimeSeriesPoint;
    type IntoIter = std::slice::Iter<'a, TimeSeriesPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::FieldValue;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn test_point(id: i64) -> TimeSeriesPoint {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), FieldValue::Integer(id));
        TimeSeriesPoint::new(
            "test",
            BTreeMap::new(),
            fields,
            Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        )
        .unwrap()
    }

    fn id_of(point: &TimeSeriesPoint) -> i64 {
        point.field("id").and_then(|v| v.as_i64()).unwrap()
    }

    #[test]
    fn test_flush_on_next_point() {
        let mut batcher = Batcher::new(3);

        assert!(batcher.add(test_point(1)).is_none());
        assert!(batcher.add(test_point(2)).is_none());
        // Reaching capacity does not flush yet
        assert!(batcher.add(test_point(3)).is_none());
        assert_eq!(batcher.len(), 3);

        // The fourth point flushes the first three and is kept
        let batch = batcher.add(test_point(4)).unwrap();
        assert_eq!(batch.iter().map(id_of).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(batcher.len(), 1);

        let rest = batcher.drain().unwrap();
        assert_eq!(rest.iter().map(id_of).collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_exact_capacity_drains_once() {
        let mut batcher = Batcher::new(2);
        assert!(batcher.add(test_point(1)).is_none());
        assert!(batcher.add(test_point(2)).is_none());

        assert_eq!(batcher.drain().unwrap().len(), 2);
        assert!(batcher.drain().is_none());
    }

    #[test]
    fn test_empty_drain() {
        let mut batcher = Batcher::default();
        assert!(batcher.is_empty());
        assert!(batcher.drain().is_none());
        assert_eq!(batcher.max_size(), DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_partition_sizes() {
        let mut batcher = Batcher::new(1000);
        let mut sizes = Vec::new();
        for i in 0..1500 {
            if let Some(batch) = batcher.add(test_point(i)) {
                sizes.push(batch.len());
            }
        }
        if let Some(batch) = batcher.drain() {
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![1000, 500]);
    }

    #[test]
    fn test_zero_size_clamped() {
        let mut batcher = Batcher::new(0);
        assert!(batcher.add(test_point(1)).is_none());
        assert_eq!(batcher.add(test_point(2)).unwrap().len(), 1);
    }

    #[test]
    fn test_unbounded_size_does_not_preallocate() {
        let mut batcher = Batcher::new(usize::MAX);
        assert_eq!(batcher.max_size(), usize::MAX);
        for i in 0..3 {
            assert!(batcher.add(test_point(i)).is_none());
        }
        assert_eq!(batcher.drain().unwrap().len(), 3);
        assert!(batcher.drain().is_none());
    }
}
