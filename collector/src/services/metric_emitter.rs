//! Maps lag metrics of one consumer group onto the publishing façade.
//!
//! Which record field becomes which metric is described by static tables of
//! `{field, metric name, kind}` entries; absent optional values are skipped
//! rather than sent as zero.

use adapters::{Attribute, Entity, MetricSet, MetricValue, MetricsPublisher, SourceType};
use std::sync::Arc;
use tracing::error;

use super::lag_calculator::{GroupRollup, PartitionLagMetric};
use crate::errors::{error_chain, GroupError};

pub const ENTITY_TYPE: &str = "ka-consumerGroup";
pub const EVENT_TYPE: &str = "KafkaOffsetSample";
pub const ROLLUP_EVENT_TYPE: &str = "KafkaConsumerGroupSample";
pub const CLUSTER_NAME_ATTRIBUTE: &str = "clusterName";

/// Binds one record field to the metric it is published as.
pub struct MetricField<T> {
    pub field: &'static str,
    pub metric_name: &'static str,
    pub kind: SourceType,
    pub value: fn(&T) -> Option<MetricValue>,
}

pub const PARTITION_LAG_FIELDS: &[MetricField<PartitionLagMetric>] = &[
    MetricField {
        field: "topic",
        metric_name: "topic",
        kind: SourceType::Attribute,
        value: topic_value,
    },
    MetricField {
        field: "partition",
        metric_name: "partition",
        kind: SourceType::Attribute,
        value: partition_value,
    },
    MetricField {
        field: "consumerOffset",
        metric_name: "kafka.consumerOffset",
        kind: SourceType::Gauge,
        value: consumer_offset_value,
    },
    MetricField {
        field: "highWaterMark",
        metric_name: "kafka.highWaterMark",
        kind: SourceType::Gauge,
        value: high_water_mark_value,
    },
    MetricField {
        field: "consumerLag",
        metric_name: "kafka.consumerLag",
        kind: SourceType::Gauge,
        value: consumer_lag_value,
    },
];

pub const GROUP_ROLLUP_FIELDS: &[MetricField<GroupRollup>] = &[
    MetricField {
        field: "totalLag",
        metric_name: "kafka.consumerGroup.totalLag",
        kind: SourceType::Gauge,
        value: total_lag_value,
    },
    MetricField {
        field: "maxLag",
        metric_name: "kafka.consumerGroup.maxLag",
        kind: SourceType::Gauge,
        value: max_lag_value,
    },
    MetricField {
        field: "activeConsumers",
        metric_name: "kafka.consumerGroup.activeConsumers",
        kind: SourceType::Gauge,
        value: active_consumers_value,
    },
];

fn topic_value(metric: &PartitionLagMetric) -> Option<MetricValue> {
    Some(MetricValue::Text(metric.topic.clone()))
}

fn partition_value(metric: &PartitionLagMetric) -> Option<MetricValue> {
    Some(MetricValue::Text(metric.partition.clone()))
}

fn consumer_offset_value(metric: &PartitionLagMetric) -> Option<MetricValue> {
    metric.consumer_offset.map(MetricValue::Int)
}

fn high_water_mark_value(metric: &PartitionLagMetric) -> Option<MetricValue> {
    metric.high_water_mark.map(MetricValue::Int)
}

fn consumer_lag_value(metric: &PartitionLagMetric) -> Option<MetricValue> {
    metric.consumer_lag.map(MetricValue::Int)
}

fn total_lag_value(rollup: &GroupRollup) -> Option<MetricValue> {
    rollup.total_lag.map(MetricValue::Int)
}

fn max_lag_value(rollup: &GroupRollup) -> Option<MetricValue> {
    rollup.max_lag.map(MetricValue::Int)
}

fn active_consumers_value(rollup: &GroupRollup) -> Option<MetricValue> {
    rollup
        .active_consumers
        .and_then(|count| i64::try_from(count).ok())
        .map(MetricValue::Int)
}

/// Writes every present field of `record` into `metric_set`, stopping at the
/// first rejected value.
pub fn marshal<T>(
    metric_set: &mut dyn MetricSet,
    record: &T,
    fields: &[MetricField<T>],
) -> adapters::Result<()> {
    for field in fields {
        if let Some(value) = (field.value)(record) {
            metric_set.set_metric(field.metric_name, value, field.kind)?;
        }
    }
    Ok(())
}

/// Outcome of emitting one group.
#[derive(Debug, Default)]
pub struct Emission {
    /// Partition metric sets marshaled without error.
    pub emitted: usize,
    pub errors: Vec<GroupError>,
}

#[derive(Clone)]
pub struct MetricEmitter {
    publisher: Arc<dyn MetricsPublisher>,
    cluster_name: String,
}

impl MetricEmitter {
    pub fn new(publisher: Arc<dyn MetricsPublisher>, cluster_name: impl Into<String>) -> Self {
        Self {
            publisher,
            cluster_name: cluster_name.into(),
        }
    }

    fn sample_attributes(&self, entity: &dyn Entity) -> Vec<Attribute> {
        let display_name = entity.display_name();
        vec![
            Attribute::new("displayName", display_name),
            Attribute::new("entityName", format!("consumerGroup:{display_name}")),
            Attribute::new(CLUSTER_NAME_ATTRIBUTE, self.cluster_name.as_str()),
        ]
    }

    /// Publishes one metric set per partition metric. A rollup, when given,
    /// goes out as a separate sample and only if the group has partition
    /// metrics. A record that fails to marshal is logged and skipped.
    pub fn emit(
        &self,
        group_id: &str,
        metrics: &[PartitionLagMetric],
        rollup: Option<&GroupRollup>,
    ) -> Emission {
        let mut emission = Emission::default();

        let id_attributes = [Attribute::new(CLUSTER_NAME_ATTRIBUTE, self.cluster_name.as_str())];
        let entity = match self.publisher.entity(group_id, ENTITY_TYPE, &id_attributes) {
            Ok(entity) => entity,
            Err(source) => {
                let err = GroupError::Entity {
                    group: group_id.to_string(),
                    source,
                };
                error!(group = group_id, "{}", error_chain(&err));
                emission.errors.push(err);
                return emission;
            }
        };
        let attributes = self.sample_attributes(entity.as_ref());

        for metric in metrics {
            let mut metric_set = entity.new_metric_set(EVENT_TYPE, &attributes);
            match marshal(metric_set.as_mut(), metric, PARTITION_LAG_FIELDS) {
                Ok(()) => emission.emitted += 1,
                Err(source) => {
                    let err = GroupError::Marshal {
                        group: group_id.to_string(),
                        sample: format!("{}/{}", metric.topic, metric.partition),
                        source,
                    };
                    error!(group = group_id, "Error marshaling offset metrics: {}", error_chain(&err));
                    emission.errors.push(err);
                }
            }
        }

        if let Some(rollup) = rollup.filter(|_| !metrics.is_empty()) {
            let mut metric_set = entity.new_metric_set(ROLLUP_EVENT_TYPE, &attributes);
            if let Err(source) = marshal(metric_set.as_mut(), rollup, GROUP_ROLLUP_FIELDS) {
                let err = GroupError::Marshal {
                    group: group_id.to_string(),
                    sample: "rollup".to_string(),
                    source,
                };
                error!(group = group_id, "Error marshaling rollup metrics: {}", error_chain(&err));
                emission.errors.push(err);
            }
        }

        emission
    }
}
