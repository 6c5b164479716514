//! Kafka implementation of `ClusterAdmin` backed by librdkafka.
//!
//! Every librdkafka call used here blocks the calling thread until the broker
//! answers or the request timeout expires, so each request runs on the
//! blocking thread pool. Committed offsets can only be read through a client
//! configured with the group's id, hence a short-lived consumer is created per
//! offset fetch; metadata, group and watermark requests share one client.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::groups::GroupInfo;
use rdkafka::{Offset, TopicPartitionList};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::assignment::decode_member_assignment;
use crate::errors::{AdapterError, Result};
use crate::models::{
    ConsumerGroupDescriptor, GroupMember, OffsetRecord, TopicPartition, TopicPartitionSet,
    WatermarkRecord,
};
use crate::{AdminConnector, ClusterAdmin};

const ADMIN_GROUP_ID: &str = "laggaze-admin";

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KafkaConnection {
    pub bootstrap_servers: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Extra librdkafka properties (security settings and the like).
    #[serde(default)]
    pub client_config: BTreeMap<String, String>,
}

impl KafkaConnection {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            request_timeout_ms: default_request_timeout_ms(),
            client_config: BTreeMap::new(),
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", self.bootstrap_servers.as_str());
        for (key, value) in &self.client_config {
            config.set(key.as_str(), value.as_str());
        }
        config
    }
}

#[async_trait]
impl AdminConnector for KafkaConnection {
    async fn connect(&self) -> Result<Arc<dyn ClusterAdmin>> {
        let admin = KafkaAdmin::new(self.clone()).await?;
        Ok(Arc::new(admin))
    }
}

pub struct KafkaAdmin {
    base_config: ClientConfig,
    consumer: Arc<BaseConsumer>,
    timeout: Duration,
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| AdapterError::TaskError(err.to_string()))?
}

impl KafkaAdmin {
    /// Connects to the cluster and verifies it answers a metadata request.
    pub async fn new(connection: KafkaConnection) -> Result<Self> {
        let timeout = Duration::from_millis(connection.request_timeout_ms);
        let base_config = connection.client_config();
        let mut admin_config = base_config.clone();
        admin_config.set("group.id", ADMIN_GROUP_ID);

        let consumer = run_blocking(move || {
            let consumer = admin_config
                .create::<BaseConsumer>()
                .map_err(|err| AdapterError::ConnectionError(err.to_string()))?;
            consumer
                .fetch_metadata(None, timeout)
                .map_err(|err| AdapterError::ConnectionError(err.to_string()))?;
            Ok(consumer)
        })
        .await?;

        debug!(bootstrap_servers = %connection.bootstrap_servers, "Connected to Kafka cluster");

        Ok(Self {
            base_config,
            consumer: Arc::new(consumer),
            timeout,
        })
    }
}

fn describe_group(info: &GroupInfo) -> ConsumerGroupDescriptor {
    let members = info
        .members()
        .iter()
        .map(|member| {
            let assignment = match member.assignment() {
                Some(bytes) => decode_member_assignment(bytes).unwrap_or_else(|err| {
                    warn!(group = info.name(), member = member.id(), "Ignoring member assignment: {}", err);
                    TopicPartitionSet::new()
                }),
                None => TopicPartitionSet::new(),
            };
            GroupMember {
                member_id: member.id().to_string(),
                client_id: member.client_id().to_string(),
                client_host: member.client_host().to_string(),
                assignment,
            }
        })
        .collect();

    ConsumerGroupDescriptor {
        id: info.name().to_string(),
        state: info.state().to_string(),
        members,
    }
}

#[async_trait]
impl ClusterAdmin for KafkaAdmin {
    async fn list_consumer_groups(&self) -> Result<BTreeMap<String, String>> {
        let consumer = self.consumer.clone();
        let timeout = self.timeout;
        run_blocking(move || {
            let groups = consumer
                .fetch_group_list(None, timeout)
                .map_err(|err| AdapterError::ListGroupsError(err.to_string()))?;
            Ok(groups
                .groups()
                .iter()
                .map(|group| (group.name().to_string(), group.protocol_type().to_string()))
                .collect())
        })
        .await
    }

    async fn describe_consumer_groups(
        &self,
        group_ids: &[String],
    ) -> Result<Vec<ConsumerGroupDescriptor>> {
        let consumer = self.consumer.clone();
        let timeout = self.timeout;
        let group_ids = group_ids.to_vec();
        run_blocking(move || {
            let mut descriptors = Vec::with_capacity(group_ids.len());
            for group_id in &group_ids {
                let list = consumer
                    .fetch_group_list(Some(group_id.as_str()), timeout)
                    .map_err(|err| {
                        AdapterError::DescribeGroupsError(format!("{group_id}: {err}"))
                    })?;
                descriptors.extend(list.groups().iter().map(describe_group));
            }
            Ok(descriptors)
        })
        .await
    }

    async fn topic_partitions(&self, topic: &str) -> Result<Vec<i32>> {
        let consumer = self.consumer.clone();
        let timeout = self.timeout;
        let topic = topic.to_string();
        run_blocking(move || {
            let metadata_error = |message: String| AdapterError::MetadataError {
                topic: topic.clone(),
                message,
            };
            let metadata = consumer
                .fetch_metadata(Some(topic.as_str()), timeout)
                .map_err(|err| metadata_error(err.to_string()))?;
            let topic_metadata = metadata
                .topics()
                .iter()
                .find(|candidate| candidate.name() == topic)
                .ok_or_else(|| metadata_error("topic not present in metadata".to_string()))?;
            if let Some(err) = topic_metadata.error() {
                return Err(metadata_error(format!("{err:?}")));
            }
            Ok(topic_metadata
                .partitions()
                .iter()
                .map(|partition| partition.id())
                .collect())
        })
        .await
    }

    async fn fetch_committed_offsets(
        &self,
        group_id: &str,
        partitions: &TopicPartitionSet,
    ) -> Result<OffsetRecord> {
        let mut config = self.base_config.clone();
        config
            .set("group.id", group_id)
            .set("enable.auto.commit", "false");
        let timeout = self.timeout;
        let group = group_id.to_string();
        let partitions = partitions.clone();

        run_blocking(move || {
            let offset_error = |message: String| AdapterError::OffsetFetchError {
                group: group.clone(),
                message,
            };
            let consumer = config
                .create::<BaseConsumer>()
                .map_err(|err| offset_error(err.to_string()))?;

            let mut request = TopicPartitionList::new();
            for tp in partitions.topic_partitions() {
                request.add_partition(&tp.topic, tp.partition);
            }

            let committed = consumer
                .committed_offsets(request, timeout)
                .map_err(|err| offset_error(err.to_string()))?;

            Ok(committed
                .elements()
                .iter()
                .map(|element| {
                    let offset = match element.offset() {
                        Offset::Offset(offset) if offset >= 0 => Some(offset),
                        _ => None,
                    };
                    (TopicPartition::new(element.topic(), element.partition()), offset)
                })
                .collect())
        })
        .await
    }

    async fn fetch_high_water_marks(
        &self,
        partitions: &TopicPartitionSet,
    ) -> Result<WatermarkRecord> {
        let consumer = self.consumer.clone();
        let timeout = self.timeout;
        let partitions = partitions.clone();

        run_blocking(move || {
            let mut record = WatermarkRecord::new();
            let mut last_error = None;
            for tp in partitions.topic_partitions() {
                match consumer.fetch_watermarks(&tp.topic, tp.partition, timeout) {
                    Ok((_low, high)) => {
                        record.insert(tp, Some(high));
                    }
                    Err(err) => {
                        debug!(topic = %tp.topic, partition = tp.partition, "Failed to fetch watermark: {}", err);
                        last_error = Some(err.to_string());
                        record.insert(tp, None);
                    }
                }
            }

            match last_error {
                Some(err) if record.values().all(Option::is_none) => {
                    Err(AdapterError::WatermarkFetchError(err))
                }
                _ => Ok(record),
            }
        })
        .await
    }
}
