//! Committed offset and high water mark retrieval for one group.
//!
//! High water marks only ever grow. Reading the group's offsets first and the
//! watermarks second therefore guarantees `watermark >= offset` for every
//! partition read in the same pass, so the computed lag is never negative.

use adapters::{ClusterAdmin, OffsetRecord, TopicPartitionSet, WatermarkRecord};
use tracing::info;

use crate::errors::{error_chain, GroupError};

pub async fn fetch_offsets(
    admin: &dyn ClusterAdmin,
    group_id: &str,
    partitions: &TopicPartitionSet,
) -> Result<OffsetRecord, GroupError> {
    admin
        .fetch_committed_offsets(group_id, partitions)
        .await
        .map_err(|source| GroupError::OffsetFetch {
            group: group_id.to_string(),
            source,
        })
}

/// Watermarks are group independent; `group_id` only labels the error.
pub async fn fetch_watermarks(
    admin: &dyn ClusterAdmin,
    group_id: &str,
    partitions: &TopicPartitionSet,
) -> Result<WatermarkRecord, GroupError> {
    admin
        .fetch_high_water_marks(partitions)
        .await
        .map_err(|source| GroupError::WatermarkFetch {
            group: group_id.to_string(),
            source,
        })
}

/// Offsets and watermarks read for one group, with any fetch failures.
/// A failed fetch leaves its record empty.
#[derive(Debug, Default)]
pub struct GroupOffsets {
    pub offsets: OffsetRecord,
    pub watermarks: WatermarkRecord,
    pub errors: Vec<GroupError>,
}

/// Fetches offsets, then watermarks. A failure on either side is logged and
/// recorded; the other side is still fetched.
pub async fn fetch_group_offsets(
    admin: &dyn ClusterAdmin,
    group_id: &str,
    partitions: &TopicPartitionSet,
) -> GroupOffsets {
    let mut fetched = GroupOffsets::default();

    match fetch_offsets(admin, group_id, partitions).await {
        Ok(offsets) => fetched.offsets = offsets,
        Err(err) => {
            info!(group = group_id, "{}", error_chain(&err));
            fetched.errors.push(err);
        }
    }

    match fetch_watermarks(admin, group_id, partitions).await {
        Ok(watermarks) => fetched.watermarks = watermarks,
        Err(err) => {
            info!(group = group_id, "{}", error_chain(&err));
            fetched.errors.push(err);
        }
    }

    fetched
}
