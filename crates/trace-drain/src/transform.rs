//! Turns trace records into tagged time-series points

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::classify::{ClassifyTarget, Classifier, KeywordClassifier};
use crate::error::{DrainError, Result};
use crate::point::{FieldValue, TimeSeriesPoint};
use crate::record::TraceRecord;

/// Default destination measurement
pub const DEFAULT_MEASUREMENT: &str = "sessions";

/// Tag carrying the classification result
pub const TYPE_TAG: &str = "type";

/// Record → point mapping.
///
/// Every call builds fresh tag and field maps, so nothing from one record can
/// leak into the next.
#[derive(Clone)]
pub struct Transformer {
    measurement: String,
    target: ClassifyTarget,
    classifier: Arc<dyn Classifier>,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(
            DEFAULT_MEASUREMENT,
            ClassifyTarget::default(),
            Arc::new(KeywordClassifier::default()),
        )
    }
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("measurement", &self.measurement)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Transformer {
    pub fn new(
        measurement: impl Into<String>,
        target: ClassifyTarget,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            target,
            classifier,
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn target(&self) -> ClassifyTarget {
        self.target
    }

    /// Map one record.
    ///
    /// `Ok(None)` means the record matched no category and is dropped.
    /// `Err` means it matched but no valid point could be built from it.
    pub fn transform(&self, record: &TraceRecord) -> Result<Option<TimeSeriesPoint>> {
        let parameters = serialize_parameters(record)?;

        let inspected = match self.target {
            ClassifyTarget::Request => record.request.as_str(),
            ClassifyTarget::Parameters => parameters.as_str(),
        };
        let Some(kind) = self.classifier.classify(inspected) else {
            return Ok(None);
        };

        let started_at = record.started_at.ok_or_else(|| {
            DrainError::point(format!("session {} has no started_at", record.session_id))
        })?;

        let mut tags = BTreeMap::new();
        tags.insert("session_id".to_string(), record.session_id.clone());
        tags.insert("client".to_string(), record.client.clone());
        tags.insert("command".to_string(), record.command.clone());
        tags.insert("coordinator".to_string(), record.coordinator.clone());
        tags.insert(TYPE_TAG.to_string(), kind);

        let mut fields = BTreeMap::new();
        fields.insert("duration".to_string(), FieldValue::Integer(record.duration));
        fields.insert("parameters".to_string(), FieldValue::String(parameters));
        fields.insert(
            "request".to_string(),
            FieldValue::String(record.request.clone()),
        );
        fields.insert(
            "started_at".to_string(),
            FieldValue::String(started_at.to_rfc3339()),
        );

        TimeSeriesPoint::new(&self.measurement, tags, fields, started_at).map(Some)
    }
}

/// JSON text of the parameters map, keys sorted
fn serialize_parameters(record: &TraceRecord) -> Result<String> {
    let sorted: BTreeMap<&String, &String> = record.parameters.iter().collect();
    Ok(serde_json::to_string(&sorted)?)
}
