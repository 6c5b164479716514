//! Lag computation.
//!
//! Merges the committed offsets and high water marks of one group into one
//! metric per partition. Missing values stay missing: zero is a valid offset,
//! so it is never used as a stand-in.

use adapters::{OffsetRecord, TopicPartition, WatermarkRecord};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionLagMetric {
    pub topic: String,
    pub partition: String,
    pub consumer_offset: Option<i64>,
    pub high_water_mark: Option<i64>,
    /// Set only when both the offset and the high water mark are known.
    pub consumer_lag: Option<i64>,
}

impl PartitionLagMetric {
    pub fn new(tp: &TopicPartition, consumer_offset: Option<i64>, high_water_mark: Option<i64>) -> Self {
        let consumer_lag = match (consumer_offset, high_water_mark) {
            (Some(offset), Some(high)) => Some(high.saturating_sub(offset)),
            _ => None,
        };
        Self {
            topic: tp.topic.clone(),
            partition: tp.partition.to_string(),
            consumer_offset,
            high_water_mark,
            consumer_lag,
        }
    }
}

/// One metric for every partition present in either record, ordered by topic
/// then partition.
pub fn calculate_lag(offsets: &OffsetRecord, watermarks: &WatermarkRecord) -> Vec<PartitionLagMetric> {
    let partitions: BTreeSet<&TopicPartition> = offsets.keys().chain(watermarks.keys()).collect();

    partitions
        .into_iter()
        .map(|tp| {
            PartitionLagMetric::new(
                tp,
                offsets.get(tp).copied().flatten(),
                watermarks.get(tp).copied().flatten(),
            )
        })
        .collect()
}

/// Group level summary of the partition metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRollup {
    pub total_lag: Option<i64>,
    pub max_lag: Option<i64>,
    /// Members owning partitions; unknown for explicitly configured groups.
    pub active_consumers: Option<usize>,
}

impl GroupRollup {
    pub fn from_metrics(metrics: &[PartitionLagMetric], active_consumers: Option<usize>) -> Self {
        let lags = metrics.iter().filter_map(|metric| metric.consumer_lag);
        let (total_lag, max_lag) = lags.fold((None, None), |(total, max): (Option<i64>, Option<i64>), lag| {
            (
                Some(total.unwrap_or(0).saturating_add(lag)),
                Some(max.map_or(lag, |max| max.max(lag))),
            )
        });

        Self {
            total_lag,
            max_lag,
            active_consumers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(values: &[(&str, i32, Option<i64>)]) -> OffsetRecord {
        values
            .iter()
            .map(|(topic, partition, value)| (TopicPartition::new(*topic, *partition), *value))
            .collect()
    }

    #[test]
    fn lag_is_watermark_minus_offset() {
        let offsets = record(&[("topicA", 0, Some(100))]);
        let watermarks = record(&[("topicA", 0, Some(150))]);

        let metrics = calculate_lag(&offsets, &watermarks);

        assert_eq!(
            metrics,
            vec![PartitionLagMetric {
                topic: "topicA".to_string(),
                partition: "0".to_string(),
                consumer_offset: Some(100),
                high_water_mark: Some(150),
                consumer_lag: Some(50),
            }]
        );
    }

    #[test]
    fn missing_side_leaves_lag_absent() {
        let offsets = record(&[("orders", 0, Some(10)), ("orders", 1, None)]);
        let watermarks = record(&[("orders", 1, Some(40)), ("orders", 2, Some(7))]);

        let metrics = calculate_lag(&offsets, &watermarks);

        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].consumer_offset, Some(10));
        assert_eq!(metrics[0].high_water_mark, None);
        assert_eq!(metrics[1].consumer_offset, None);
        assert_eq!(metrics[1].high_water_mark, Some(40));
        assert_eq!(metrics[2].consumer_offset, None);
        assert!(metrics.iter().all(|metric| metric.consumer_lag.is_none()));
    }

    #[test]
    fn zero_offset_is_a_real_value() {
        let metrics = calculate_lag(&record(&[("orders", 0, Some(0))]), &record(&[("orders", 0, Some(0))]));

        assert_eq!(metrics[0].consumer_lag, Some(0));
    }

    #[test]
    fn metrics_are_ordered_by_topic_then_partition() {
        let offsets = record(&[("b", 1, Some(1)), ("a", 10, Some(1)), ("a", 2, Some(1))]);

        let order: Vec<(String, String)> = calculate_lag(&offsets, &OffsetRecord::new())
            .into_iter()
            .map(|metric| (metric.topic, metric.partition))
            .collect();

        assert_eq!(
            order,
            [("a", "2"), ("a", "10"), ("b", "1")].map(|(t, p)| (t.to_string(), p.to_string()))
        );
    }

    #[test]
    fn rollup_sums_and_maxes_known_lags() {
        let offsets = record(&[("orders", 0, Some(5)), ("orders", 1, Some(0)), ("orders", 2, None)]);
        let watermarks = record(&[("orders", 0, Some(15)), ("orders", 1, Some(30)), ("orders", 2, Some(9))]);

        let rollup = GroupRollup::from_metrics(&calculate_lag(&offsets, &watermarks), Some(2));

        assert_eq!(rollup.total_lag, Some(40));
        assert_eq!(rollup.max_lag, Some(30));
        assert_eq!(rollup.active_consumers, Some(2));
    }

    #[test]
    fn rollup_without_lags_is_absent() {
        let rollup = GroupRollup::from_metrics(&calculate_lag(&record(&[("orders", 0, Some(3))]), &OffsetRecord::new()), None);

        assert_eq!(rollup.total_lag, None);
        assert_eq!(rollup.max_lag, None);
    }
}
