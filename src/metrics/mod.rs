//! Metric value model
//!
//! The store knows exactly two kinds of metrics:
//!
//! - **Gauge**: an instantaneous floating-point reading, updates replace it
//! - **Counter**: an accumulating signed integer, updates add to it
//!
//! A metric is addressed by its kind *and* its name, so a gauge and a counter
//! may share a name without colliding.

pub mod json;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use json::JsonMetric;

/// Kind of a metric, also used as the type tag on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(MetricError::UnknownType(other.to_string())),
        }
    }
}

/// A single metric value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Latest reading, last write wins
    Gauge(f64),

    /// Accumulated delta, writes are summed
    Counter(i64),
}

impl MetricValue {
    /// Parse a textual value according to the given type tag
    ///
    /// Gauges are parsed as decimal floats and must be finite, counters as
    /// decimal integers.
    pub fn parse(kind: &str, text: &str) -> Result<Self, MetricError> {
        let kind: MetricKind = kind.parse()?;
        let invalid = |reason: String| MetricError::InvalidValue {
            kind,
            value: text.to_string(),
            reason,
        };

        match kind {
            MetricKind::Gauge => {
                let value = MetricValue::Gauge(text.parse().map_err(|e| invalid(format!("{e}")))?);
                value.validate()?;
                Ok(value)
            }
            MetricKind::Counter => text
                .parse()
                .map(MetricValue::Counter)
                .map_err(|e| invalid(format!("{e}"))),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }

    /// Reject values the JSON encoding cannot carry (NaN and infinite gauges)
    pub fn validate(&self) -> Result<(), MetricError> {
        match self {
            MetricValue::Gauge(value) if !value.is_finite() => Err(MetricError::InvalidValue {
                kind: MetricKind::Gauge,
                value: value.to_string(),
                reason: "gauge readings must be finite".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Fold an incoming value into this one
    ///
    /// Gauges are replaced by the incoming reading, counters are summed.
    /// Merging values of different kinds fails with
    /// [`MetricError::TypeMismatch`].
    pub fn merge(self, incoming: MetricValue) -> Result<MetricValue, MetricError> {
        match (self, incoming) {
            (MetricValue::Gauge(_), MetricValue::Gauge(new)) => Ok(MetricValue::Gauge(new)),
            (MetricValue::Counter(old), MetricValue::Counter(delta)) => old
                .checked_add(delta)
                .map(MetricValue::Counter)
                .ok_or(MetricError::Overflow { stored: old, delta }),
            (stored, incoming) => Err(MetricError::TypeMismatch {
                stored: stored.kind(),
                incoming: incoming.kind(),
            }),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // `Display` for f64 is the shortest representation that parses back
            // to the same value
            MetricValue::Gauge(value) => write!(f, "{value}"),
            MetricValue::Counter(value) => write!(f, "{value}"),
        }
    }
}

/// A metric value together with its name
#[derive(Debug, Clone, PartialEq)]
pub struct NamedMetric {
    pub name: String,
    pub value: MetricValue,
}

impl NamedMetric {
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricValue::Gauge(value))
    }

    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        Self::new(name, MetricValue::Counter(delta))
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

/// Errors of the metric value model
#[derive(Debug, Clone, PartialEq)]
pub enum MetricError {
    /// The type tag is neither `gauge` nor `counter`
    UnknownType(String),

    /// The textual value could not be parsed for its kind
    InvalidValue {
        kind: MetricKind,
        value: String,
        reason: String,
    },

    /// Stored and incoming values are of different kinds
    TypeMismatch {
        stored: MetricKind,
        incoming: MetricKind,
    },

    /// Adding the delta would overflow the counter
    Overflow { stored: i64, delta: i64 },

    /// A JSON metric lacks the field required by its type
    MissingField {
        kind: MetricKind,
        field: &'static str,
    },
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricError::UnknownType(kind) => write!(f, "unknown metric type: {}", kind),
            MetricError::InvalidValue {
                kind,
                value,
                reason,
            } => write!(f, "invalid {} value {:?}: {}", kind, value, reason),
            MetricError::TypeMismatch { stored, incoming } => write!(
                f,
                "type mismatch: cannot merge {} into stored {}",
                incoming, stored
            ),
            MetricError::Overflow { stored, delta } => {
                write!(f, "counter overflow: {} + {}", stored, delta)
            }
            MetricError::MissingField { kind, field } => {
                write!(f, "{} metric has no {}", kind, field)
            }
        }
    }
}

impl std::error::Error for MetricError {}
