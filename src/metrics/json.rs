//! JSON encoding of a named metric
//!
//! Used both for the snapshot file (one object per line) and the HTTP API:
//!
//! ```json
//! {"id":"requests","type":"counter","delta":8}
//! {"id":"temp","type":"gauge","value":19.0}
//! ```

use serde::{Deserialize, Serialize};

use super::{MetricError, MetricKind, MetricValue, NamedMetric};

/// Wire representation of a named metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonMetric {
    /// Metric name
    pub id: String,

    /// Type tag, `gauge` or `counter`
    #[serde(rename = "type")]
    pub kind: String,

    /// Counter delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,

    /// Gauge reading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl JsonMetric {
    pub fn from_named(metric: &NamedMetric) -> Self {
        let (delta, value) = match metric.value {
            MetricValue::Gauge(v) => (None, Some(v)),
            MetricValue::Counter(d) => (Some(d), None),
        };

        Self {
            id: metric.name.clone(),
            kind: metric.kind().to_string(),
            delta,
            value,
        }
    }

    /// Lookup body without a value, as sent to `POST /value/`
    pub fn key(kind: MetricKind, name: impl Into<String>) -> Self {
        Self {
            id: name.into(),
            kind: kind.to_string(),
            delta: None,
            value: None,
        }
    }

    /// Extract the metric value, the field matching the type tag must be set
    pub fn value(&self) -> Result<MetricValue, MetricError> {
        match self.kind.parse()? {
            MetricKind::Gauge => self
                .value
                .map(MetricValue::Gauge)
                .ok_or(MetricError::MissingField {
                    kind: MetricKind::Gauge,
                    field: "value",
                }),
            MetricKind::Counter => self
                .delta
                .map(MetricValue::Counter)
                .ok_or(MetricError::MissingField {
                    kind: MetricKind::Counter,
                    field: "delta",
                }),
        }
    }

    pub fn into_named(self) -> Result<NamedMetric, MetricError> {
        let value = self.value()?;
        Ok(NamedMetric::new(self.id, value))
    }
}

/// Encode a metric as a single snapshot line (without the trailing newline)
pub fn to_line(metric: &NamedMetric) -> serde_json::Result<String> {
    serde_json::to_string(&JsonMetric::from_named(metric))
}

/// Decode a single snapshot line
pub fn from_line(line: &str) -> Result<NamedMetric, String> {
    let json: JsonMetric = serde_json::from_str(line).map_err(|e| e.to_string())?;
    json.into_named().map_err(|e| e.to_string())
}
