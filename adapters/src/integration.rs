//! In-memory implementation of the publishing façade.
//!
//! `Integration` accumulates entities and their metric sets for one
//! collection cycle and renders them as an integration payload (protocol
//! version 3) once collection has finished.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{AdapterError, Result};
use crate::publisher::{Attribute, Entity, MetricSet, MetricValue, MetricsPublisher, SourceType};

const PROTOCOL_VERSION: &str = "3";
const EVENT_TYPE_KEY: &str = "event_type";

type MetricSetData = Arc<Mutex<Map<String, Value>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Integration {
    name: String,
    version: String,
    entities: Mutex<Vec<Arc<IntegrationEntity>>>,
}

impl Integration {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            entities: Mutex::new(Vec::new()),
        }
    }

    pub fn entity_count(&self) -> usize {
        lock(&self.entities).len()
    }

    /// Snapshot of everything published so far.
    pub fn payload(&self) -> IntegrationPayload {
        let data = lock(&self.entities)
            .iter()
            .map(|entity| EntityData {
                entity: EntityMetadata {
                    name: entity.name.clone(),
                    entity_type: entity.entity_type.clone(),
                    id_attributes: entity.id_attributes.clone(),
                },
                metrics: lock(&entity.metric_sets)
                    .iter()
                    .map(|set| lock(set).clone())
                    .collect(),
            })
            .collect();

        IntegrationPayload {
            name: self.name.clone(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            integration_version: self.version.clone(),
            data,
        }
    }

    /// Metric sets recorded for the entity called `name`, in creation order.
    pub fn metric_sets(&self, name: &str) -> Vec<Map<String, Value>> {
        self.payload()
            .data
            .into_iter()
            .filter(|data| data.entity.name == name)
            .flat_map(|data| data.metrics)
            .collect()
    }
}

impl MetricsPublisher for Integration {
    fn entity(
        &self,
        name: &str,
        entity_type: &str,
        id_attributes: &[Attribute],
    ) -> Result<Arc<dyn Entity>> {
        if name.is_empty() || entity_type.is_empty() {
            return Err(AdapterError::EntityError {
                name: name.to_string(),
                message: "entity name and type must not be empty".to_string(),
            });
        }

        let mut entities = lock(&self.entities);
        if let Some(existing) = entities.iter().find(|entity| {
            entity.name == name
                && entity.entity_type == entity_type
                && entity.id_attributes == id_attributes
        }) {
            return Ok(existing.clone());
        }

        let entity = Arc::new(IntegrationEntity {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            id_attributes: id_attributes.to_vec(),
            metric_sets: Mutex::new(Vec::new()),
        });
        entities.push(entity.clone());
        Ok(entity)
    }
}

pub struct IntegrationEntity {
    name: String,
    entity_type: String,
    id_attributes: Vec<Attribute>,
    metric_sets: Mutex<Vec<MetricSetData>>,
}

impl Entity for IntegrationEntity {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn new_metric_set(&self, event_type: &str, attributes: &[Attribute]) -> Box<dyn MetricSet> {
        let mut values = Map::new();
        values.insert(EVENT_TYPE_KEY.to_string(), Value::from(event_type));
        for attribute in attributes {
            values.insert(attribute.key.clone(), Value::from(attribute.value.as_str()));
        }

        let data = Arc::new(Mutex::new(values));
        lock(&self.metric_sets).push(data.clone());
        Box::new(IntegrationMetricSet { values: data })
    }
}

struct IntegrationMetricSet {
    values: MetricSetData,
}

impl MetricSet for IntegrationMetricSet {
    fn set_metric(&mut self, name: &str, value: MetricValue, kind: SourceType) -> Result<()> {
        let marshal_error = |message: &str| AdapterError::MarshalError {
            metric: name.to_string(),
            message: message.to_string(),
        };

        if name.is_empty() || name == EVENT_TYPE_KEY {
            return Err(marshal_error("invalid metric name"));
        }

        let value = match (kind, value) {
            (SourceType::Gauge, MetricValue::Int(number)) => Value::from(number),
            (SourceType::Attribute, MetricValue::Text(text)) => Value::from(text),
            (kind, _) => return Err(marshal_error(&format!("value does not fit a {kind} metric"))),
        };

        lock(&self.values).insert(name.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationPayload {
    pub name: String,
    pub protocol_version: String,
    pub integration_version: String,
    pub data: Vec<EntityData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityData {
    pub entity: EntityMetadata,
    pub metrics: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id_attributes: Vec<Attribute>,
}
