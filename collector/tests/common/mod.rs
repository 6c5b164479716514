#![allow(dead_code)]

use adapters::{
    AdapterError, AdminConnector, Attribute, ClusterAdmin, ConsumerGroupDescriptor, Entity,
    GroupMember, Integration, MetricSet, MetricValue, MetricsPublisher, OffsetRecord, SourceType,
    TopicPartition, TopicPartitionSet, WatermarkRecord,
};
use async_trait::async_trait;
use laggaze::CollectorConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Requests seen by the mock admin, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCall {
    ListGroups,
    DescribeGroups(Vec<String>),
    TopicPartitions(String),
    FetchOffsets(String),
    FetchWatermarks(Vec<String>),
}

/// In-memory cluster admin with failure injection.
#[derive(Default)]
pub struct MockClusterAdmin {
    groups: Vec<ConsumerGroupDescriptor>,
    topics: BTreeMap<String, Vec<i32>>,
    offsets: BTreeMap<String, OffsetRecord>,
    watermarks: WatermarkRecord,
    failing_offset_groups: BTreeSet<String>,
    failing_watermark_topics: BTreeSet<String>,
    offset_delays: BTreeMap<String, Duration>,
    fail_list: bool,
    fail_describe: bool,
    calls: Mutex<Vec<AdminCall>>,
}

impl MockClusterAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a group whose single member owns `assignment`.
    pub fn with_group(mut self, group_id: &str, assignment: &[(&str, &[i32])]) -> Self {
        let member = GroupMember {
            member_id: format!("{group_id}-member-0"),
            client_id: format!("{group_id}-client"),
            client_host: "/10.0.0.1".to_string(),
            assignment: assignment
                .iter()
                .map(|(topic, partitions)| (topic.to_string(), partitions.to_vec()))
                .collect::<TopicPartitionSet>(),
        };
        self.groups.push(ConsumerGroupDescriptor::new(group_id, vec![member]));
        self
    }

    pub fn with_topic(mut self, topic: &str, partitions: &[i32]) -> Self {
        self.topics.insert(topic.to_string(), partitions.to_vec());
        self
    }

    pub fn with_offset(mut self, group_id: &str, topic: &str, partition: i32, offset: i64) -> Self {
        self.offsets
            .entry(group_id.to_string())
            .or_default()
            .insert(TopicPartition::new(topic, partition), Some(offset));
        self
    }

    pub fn with_watermark(mut self, topic: &str, partition: i32, high: i64) -> Self {
        self.watermarks
            .insert(TopicPartition::new(topic, partition), Some(high));
        self
    }

    pub fn failing_offsets_for(mut self, group_id: &str) -> Self {
        self.failing_offset_groups.insert(group_id.to_string());
        self
    }

    pub fn failing_watermarks_for(mut self, topic: &str) -> Self {
        self.failing_watermark_topics.insert(topic.to_string());
        self
    }

    pub fn delaying_offsets_for(mut self, group_id: &str, delay: Duration) -> Self {
        self.offset_delays.insert(group_id.to_string(), delay);
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_describe(mut self) -> Self {
        self.fail_describe = true;
        self
    }

    pub fn calls(&self) -> Vec<AdminCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: AdminCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ClusterAdmin for MockClusterAdmin {
    async fn list_consumer_groups(&self) -> adapters::Result<BTreeMap<String, String>> {
        self.record(AdminCall::ListGroups);
        if self.fail_list {
            return Err(AdapterError::ListGroupsError("broker unavailable".to_string()));
        }
        Ok(self
            .groups
            .iter()
            .map(|group| (group.id.clone(), "consumer".to_string()))
            .collect())
    }

    async fn describe_consumer_groups(
        &self,
        group_ids: &[String],
    ) -> adapters::Result<Vec<ConsumerGroupDescriptor>> {
        self.record(AdminCall::DescribeGroups(group_ids.to_vec()));
        if self.fail_describe {
            return Err(AdapterError::DescribeGroupsError("coordinator not available".to_string()));
        }
        Ok(self
            .groups
            .iter()
            .filter(|group| group_ids.contains(&group.id))
            .cloned()
            .collect())
    }

    async fn topic_partitions(&self, topic: &str) -> adapters::Result<Vec<i32>> {
        self.record(AdminCall::TopicPartitions(topic.to_string()));
        self.topics
            .get(topic)
            .cloned()
            .ok_or_else(|| AdapterError::MetadataError {
                topic: topic.to_string(),
                message: "unknown topic".to_string(),
            })
    }

    async fn fetch_committed_offsets(
        &self,
        group_id: &str,
        partitions: &TopicPartitionSet,
    ) -> adapters::Result<OffsetRecord> {
        self.record(AdminCall::FetchOffsets(group_id.to_string()));
        if let Some(delay) = self.offset_delays.get(group_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_offset_groups.contains(group_id) {
            return Err(AdapterError::OffsetFetchError {
                group: group_id.to_string(),
                message: "not coordinator".to_string(),
            });
        }
        let committed = self.offsets.get(group_id);
        Ok(partitions
            .topic_partitions()
            .map(|tp| {
                let offset = committed.and_then(|record| record.get(&tp).copied().flatten());
                (tp, offset)
            })
            .collect())
    }

    async fn fetch_high_water_marks(
        &self,
        partitions: &TopicPartitionSet,
    ) -> adapters::Result<WatermarkRecord> {
        self.record(AdminCall::FetchWatermarks(
            partitions.topics().map(str::to_string).collect(),
        ));
        if let Some(topic) = partitions
            .topics()
            .find(|topic| self.failing_watermark_topics.contains(*topic))
        {
            return Err(AdapterError::WatermarkFetchError(format!(
                "leader not available for {topic}"
            )));
        }
        Ok(partitions
            .topic_partitions()
            .map(|tp| {
                let high = self.watermarks.get(&tp).copied().flatten();
                (tp, high)
            })
            .collect())
    }
}

pub struct MockConnector {
    admin: Arc<MockClusterAdmin>,
    fail: bool,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(admin: Arc<MockClusterAdmin>) -> Self {
        Self {
            admin,
            fail: false,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn failing(admin: Arc<MockClusterAdmin>) -> Self {
        Self {
            fail: true,
            ..Self::new(admin)
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdminConnector for MockConnector {
    async fn connect(&self) -> adapters::Result<Arc<dyn ClusterAdmin>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AdapterError::ConnectionError("connection refused".to_string()));
        }
        Ok(self.admin.clone())
    }
}

/// Publisher that rejects chosen entities and partition samples, delegating
/// everything else to an in-memory integration.
pub struct FailingPublisher {
    inner: Arc<Integration>,
    failing_entities: BTreeSet<String>,
    failing_partitions: BTreeSet<String>,
}

impl FailingPublisher {
    pub fn new(inner: Arc<Integration>) -> Self {
        Self {
            inner,
            failing_entities: BTreeSet::new(),
            failing_partitions: BTreeSet::new(),
        }
    }

    pub fn failing_entity(mut self, name: &str) -> Self {
        self.failing_entities.insert(name.to_string());
        self
    }

    /// Rejects the `partition` attribute of samples for this partition id.
    pub fn failing_partition(mut self, partition: &str) -> Self {
        self.failing_partitions.insert(partition.to_string());
        self
    }
}

impl MetricsPublisher for FailingPublisher {
    fn entity(
        &self,
        name: &str,
        entity_type: &str,
        id_attributes: &[Attribute],
    ) -> adapters::Result<Arc<dyn Entity>> {
        if self.failing_entities.contains(name) {
            return Err(AdapterError::EntityError {
                name: name.to_string(),
                message: "rejected by test".to_string(),
            });
        }
        let inner = self.inner.entity(name, entity_type, id_attributes)?;
        Ok(Arc::new(FailingEntity {
            inner,
            failing_partitions: self.failing_partitions.clone(),
        }))
    }
}

struct FailingEntity {
    inner: Arc<dyn Entity>,
    failing_partitions: BTreeSet<String>,
}

impl Entity for FailingEntity {
    fn display_name(&self) -> &str {
        self.inner.display_name()
    }

    fn new_metric_set(&self, event_type: &str, attributes: &[Attribute]) -> Box<dyn MetricSet> {
        Box::new(FailingMetricSet {
            inner: self.inner.new_metric_set(event_type, attributes),
            failing_partitions: self.failing_partitions.clone(),
        })
    }
}

struct FailingMetricSet {
    inner: Box<dyn MetricSet>,
    failing_partitions: BTreeSet<String>,
}

impl MetricSet for FailingMetricSet {
    fn set_metric(&mut self, name: &str, value: MetricValue, kind: SourceType) -> adapters::Result<()> {
        if let MetricValue::Text(text) = &value {
            if name == "partition" && self.failing_partitions.contains(text) {
                return Err(AdapterError::MarshalError {
                    metric: name.to_string(),
                    message: "rejected by test".to_string(),
                });
            }
        }
        self.inner.set_metric(name, value, kind)
    }
}

pub fn integration() -> Arc<Integration> {
    Arc::new(Integration::new("com.laggaze.test", "0.0.0"))
}

pub fn pattern_config(pattern: &str) -> CollectorConfig {
    CollectorConfig {
        cluster_name: "primary".to_string(),
        consumer_group_regex: Some(pattern.to_string()),
        ..Default::default()
    }
}

pub fn explicit_config(groups: &[(&str, &[&str])]) -> CollectorConfig {
    CollectorConfig {
        cluster_name: "primary".to_string(),
        consumer_groups: Some(
            groups
                .iter()
                .map(|(group, topics)| {
                    (group.to_string(), topics.iter().map(|t| t.to_string()).collect())
                })
                .collect(),
        ),
        ..Default::default()
    }
}
