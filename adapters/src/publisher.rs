//! Abstractions over the monitoring entity and metric publishing façade.
//!
//! Collected data is attached to logical entities; each entity owns any
//! number of metric sets, and every metric set is a flat collection of named
//! values tagged with the kind of metric they represent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::errors::Result;

/// How a metric value is interpreted by the consumer of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Identifying string attached to the sample.
    Attribute,
    /// Point-in-time numeric measurement.
    Gauge,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Attribute => write!(f, "attribute"),
            SourceType::Gauge => write!(f, "gauge"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricValue {
    Int(i64),
    Text(String),
}

/// A key/value pair used both for entity identity and metric set tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Entry point of the publishing façade.
pub trait MetricsPublisher: Send + Sync {
    /// Creates the entity identified by `name`, `entity_type` and
    /// `id_attributes`, or returns the existing one.
    fn entity(
        &self,
        name: &str,
        entity_type: &str,
        id_attributes: &[Attribute],
    ) -> Result<Arc<dyn Entity>>;
}

pub trait Entity: Send + Sync {
    fn display_name(&self) -> &str;

    fn new_metric_set(&self, event_type: &str, attributes: &[Attribute]) -> Box<dyn MetricSet>;
}

pub trait MetricSet: Send {
    fn set_metric(&mut self, name: &str, value: MetricValue, kind: SourceType) -> Result<()>;
}
