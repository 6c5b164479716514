//! Module for the offset collection services.
//!
//! These services select the consumer groups to monitor, read committed
//! offsets and high water marks from the cluster, turn them into per-partition
//! lag metrics, and hand the result to the publishing façade. The coordinator
//! orchestrates them for one collection cycle.

pub mod coordinator;
pub mod group_selector;
pub mod lag_calculator;
pub mod metric_emitter;
pub mod offset_fetcher;
pub mod partition_resolver;
