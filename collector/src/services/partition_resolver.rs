//! Resolves configured topic names into the partitions to query.
//!
//! Only the explicit group mapping needs this: it names topics, and the
//! partitions behind them come from current cluster metadata.

use adapters::{ClusterAdmin, TopicPartitionSet};
use tracing::error;

/// Looks up the partitions of every topic in `topics`. Topics that cannot be
/// resolved or have no partitions are logged and left out.
pub async fn resolve_topic_partitions(
    admin: &dyn ClusterAdmin,
    group_id: &str,
    topics: &[String],
) -> TopicPartitionSet {
    let mut resolved = TopicPartitionSet::new();
    for topic in topics {
        match admin.topic_partitions(topic).await {
            Ok(partitions) if partitions.is_empty() => {
                error!(group = group_id, topic = %topic, "Topic has no partitions");
            }
            Ok(partitions) => resolved.insert_topic(topic.as_str(), partitions),
            Err(err) => {
                error!(group = group_id, topic = %topic, "Failed to get partitions for topic: {}", err);
            }
        }
    }
    resolved
}
