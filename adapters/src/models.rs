//! Generic data models for the `adapters` crate.
//!
//! These models define common, abstracted representations of broker-side
//! entities (consumer groups, their members, topic partitions and the offset
//! records read for them) that any admin adapter produces, allowing the
//! collector services to work against a consistent data format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single partition of a topic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

/// Mapping from topic name to the partitions that must be queried for it.
///
/// Partition lists are kept sorted and free of duplicates so that merging the
/// assignments of several group members yields a stable set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicPartitionSet(BTreeMap<String, Vec<i32>>);

impl TopicPartitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the partition list of `topic`. Empty lists are not stored.
    pub fn insert_topic(&mut self, topic: impl Into<String>, partitions: Vec<i32>) {
        let topic = topic.into();
        if partitions.is_empty() {
            self.0.remove(&topic);
            return;
        }
        let mut partitions = partitions;
        partitions.sort_unstable();
        partitions.dedup();
        self.0.insert(topic, partitions);
    }

    pub fn insert_partition(&mut self, topic: impl Into<String>, partition: i32) {
        let partitions = self.0.entry(topic.into()).or_default();
        if let Err(pos) = partitions.binary_search(&partition) {
            partitions.insert(pos, partition);
        }
    }

    /// Adds every partition of `other` to this set.
    pub fn merge(&mut self, other: &TopicPartitionSet) {
        for (topic, partitions) in &other.0 {
            for partition in partitions {
                self.insert_partition(topic.as_str(), *partition);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of topics in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn partition_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn partitions(&self, topic: &str) -> Option<&[i32]> {
        self.0.get(topic).map(Vec::as_slice)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[i32])> {
        self.0.iter().map(|(topic, partitions)| (topic.as_str(), partitions.as_slice()))
    }

    /// Flattens the set into individual topic partitions, ordered by topic then partition.
    pub fn topic_partitions(&self) -> impl Iterator<Item = TopicPartition> + '_ {
        self.0.iter().flat_map(|(topic, partitions)| {
            partitions
                .iter()
                .map(move |partition| TopicPartition::new(topic.as_str(), *partition))
        })
    }
}

impl FromIterator<(String, Vec<i32>)> for TopicPartitionSet {
    fn from_iter<I: IntoIterator<Item = (String, Vec<i32>)>>(iter: I) -> Self {
        let mut set = TopicPartitionSet::new();
        for (topic, partitions) in iter {
            set.insert_topic(topic, partitions);
        }
        set
    }
}

/// Committed offset per partition for one consumer group. `None` means the
/// group has no committed offset for the partition or it could not be read.
pub type OffsetRecord = BTreeMap<TopicPartition, Option<i64>>;

/// High-water mark per partition. `None` means the watermark could not be read.
pub type WatermarkRecord = BTreeMap<TopicPartition, Option<i64>>;

/// A consumer group as described by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerGroupDescriptor {
    pub id: String,
    pub state: String,
    pub members: Vec<GroupMember>,
}

impl ConsumerGroupDescriptor {
    pub fn new(id: impl Into<String>, members: Vec<GroupMember>) -> Self {
        Self {
            id: id.into(),
            state: String::new(),
            members,
        }
    }

    /// Union of the partitions currently assigned to the group's members.
    pub fn assigned_partitions(&self) -> TopicPartitionSet {
        let mut assigned = TopicPartitionSet::new();
        for member in &self.members {
            assigned.merge(&member.assignment);
        }
        assigned
    }

    /// Members that currently own at least one partition.
    pub fn active_consumers(&self) -> usize {
        self.members
            .iter()
            .filter(|member| !member.assignment.is_empty())
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub member_id: String,
    pub client_id: String,
    pub client_host: String,
    pub assignment: TopicPartitionSet,
}
