//! Core `adapters` crate for abstracting broker cluster interactions.
//!
//! This crate defines the `ClusterAdmin` trait, which outlines the
//! administrative requests the collector needs from a message broker cluster,
//! the publishing façade the collected metrics are handed to, and provides a
//! central point for accessing concrete implementations (Kafka, in-memory
//! integration payload).

pub mod assignment;
pub mod errors;
pub mod integration;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod models;
pub mod publisher;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use errors::{AdapterError, Result};
pub use integration::Integration;
pub use models::{
    ConsumerGroupDescriptor, GroupMember, OffsetRecord, TopicPartition, TopicPartitionSet,
    WatermarkRecord,
};
pub use publisher::{Attribute, Entity, MetricSet, MetricValue, MetricsPublisher, SourceType};

/// Administrative view of a broker cluster.
///
/// Implementations must be safe for concurrent use: one handle is shared by
/// every per-group collection task.
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// Lists every consumer group known to the cluster, keyed by group id,
    /// with the group's protocol type as value.
    async fn list_consumer_groups(&self) -> Result<BTreeMap<String, String>>;

    async fn describe_consumer_groups(
        &self,
        group_ids: &[String],
    ) -> Result<Vec<ConsumerGroupDescriptor>>;

    /// Partition ids of `topic` according to the current cluster metadata.
    async fn topic_partitions(&self, topic: &str) -> Result<Vec<i32>>;

    /// Committed offsets of `group_id` for every partition in `partitions`.
    async fn fetch_committed_offsets(
        &self,
        group_id: &str,
        partitions: &TopicPartitionSet,
    ) -> Result<OffsetRecord>;

    /// Latest available offset of every partition in `partitions`.
    async fn fetch_high_water_marks(&self, partitions: &TopicPartitionSet)
        -> Result<WatermarkRecord>;
}

/// Establishes the administrative connection used for one collection cycle.
#[async_trait]
pub trait AdminConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ClusterAdmin>>;
}
