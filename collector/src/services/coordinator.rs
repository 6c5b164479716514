//! Orchestration of one offset collection cycle.
//!
//! Selection problems are fatal and end the cycle before any group is
//! touched. Once groups are selected, every group is attempted: pattern
//! selected groups run as concurrent tasks that are all awaited before the
//! cycle completes, explicitly configured groups run one after another.
//! Whatever goes wrong inside a group stays on that group's report.

use adapters::{AdminConnector, ClusterAdmin, ConsumerGroupDescriptor, MetricsPublisher, TopicPartitionSet};
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::group_selector::{select_matching_groups, GroupSelection};
use super::lag_calculator::{calculate_lag, GroupRollup};
use super::metric_emitter::MetricEmitter;
use super::offset_fetcher::fetch_group_offsets;
use super::partition_resolver::resolve_topic_partitions;
use crate::config::CollectorConfig;
use crate::errors::{CollectorError, GroupError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    Pattern,
    Explicit,
}

/// What happened to one consumer group during the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub group_id: String,
    /// Partition metric sets handed to the publisher.
    pub partitions_emitted: usize,
    pub errors: Vec<GroupError>,
}

impl GroupReport {
    fn new(group_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            partitions_emitted: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub mode: CollectionMode,
    /// Reports of every attempted group, sorted by group id.
    pub groups: Vec<GroupReport>,
    /// Groups listed by the cluster that did not match the pattern.
    pub unmatched_groups: Vec<String>,
}

impl CollectionSummary {
    pub fn group(&self, group_id: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|report| report.group_id == group_id)
    }

    pub fn failed_groups(&self) -> impl Iterator<Item = &GroupReport> {
        self.groups.iter().filter(|report| !report.is_clean())
    }
}

/// Runs one collection cycle.
///
/// Configuration is checked before the admin connection is opened, so a
/// configuration error has no side effects at all.
pub async fn collect(
    config: &CollectorConfig,
    connector: &dyn AdminConnector,
    publisher: Arc<dyn MetricsPublisher>,
) -> Result<CollectionSummary, CollectorError> {
    config.validate()?;
    let selection = GroupSelection::from_config(config)?;
    let admin = connector
        .connect()
        .await
        .map_err(CollectorError::AdminHandleError)?;

    let coordinator = CollectionCoordinator::new(
        admin,
        MetricEmitter::new(publisher, config.cluster_name.as_str()),
    )
    .with_group_rollup(config.collect_group_rollup)
    .with_concurrency_limit(config.max_concurrent_groups.and_then(NonZeroUsize::new));

    match selection {
        GroupSelection::Pattern(pattern) => coordinator.collect_matching(&pattern).await,
        GroupSelection::Explicit(groups) => Ok(coordinator.collect_explicit(&groups).await),
    }
}

pub struct CollectionCoordinator {
    admin: Arc<dyn ClusterAdmin>,
    emitter: MetricEmitter,
    group_rollup: bool,
    concurrency_limit: Option<NonZeroUsize>,
}

impl CollectionCoordinator {
    pub fn new(admin: Arc<dyn ClusterAdmin>, emitter: MetricEmitter) -> Self {
        Self {
            admin,
            emitter,
            group_rollup: false,
            concurrency_limit: None,
        }
    }

    pub fn with_group_rollup(mut self, enabled: bool) -> Self {
        self.group_rollup = enabled;
        self
    }

    /// Caps the number of groups collected at once in pattern mode. `None`
    /// runs every matched group at the same time.
    pub fn with_concurrency_limit(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Collects every group whose id matches `pattern`, one task per group.
    pub async fn collect_matching(&self, pattern: &Regex) -> Result<CollectionSummary, CollectorError> {
        let selected = select_matching_groups(self.admin.as_ref(), pattern).await?;
        info!(
            matched = selected.matched.len(),
            unmatched = selected.unmatched.len(),
            "Collecting consumer offsets for matching consumer groups"
        );

        let semaphore = self
            .concurrency_limit
            .map(|limit| Arc::new(Semaphore::new(limit.get())));
        let tasks: Vec<(String, JoinHandle<GroupReport>)> = selected
            .matched
            .into_iter()
            .map(|descriptor| {
                let group_id = descriptor.id.clone();
                let admin = self.admin.clone();
                let emitter = self.emitter.clone();
                let semaphore = semaphore.clone();
                let group_rollup = self.group_rollup;
                let handle = tokio::spawn(async move {
                    let _permit = match semaphore {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    collect_assigned_group(admin.as_ref(), &emitter, &descriptor, group_rollup).await
                });
                (group_id, handle)
            })
            .collect();

        // Barrier: the cycle only completes once every task has finished.
        let mut groups = Vec::with_capacity(tasks.len());
        for (group_id, handle) in tasks {
            match handle.await {
                Ok(report) => groups.push(report),
                Err(err) => {
                    let err = GroupError::TaskAborted {
                        group: group_id.clone(),
                        message: err.to_string(),
                    };
                    error!(group = %group_id, "{}", err);
                    let mut report = GroupReport::new(&group_id);
                    report.errors.push(err);
                    groups.push(report);
                }
            }
        }
        groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));

        Ok(CollectionSummary {
            mode: CollectionMode::Pattern,
            groups,
            unmatched_groups: selected.unmatched,
        })
    }

    /// Collects the explicitly configured groups one at a time.
    pub async fn collect_explicit(&self, groups: &[(String, Vec<String>)]) -> CollectionSummary {
        warn!("Argument 'consumer_groups' is deprecated and will be removed in a future version. Use 'consumer_group_regex' instead.");

        let mut reports = Vec::with_capacity(groups.len());
        for (group_id, topics) in groups {
            let partitions = resolve_topic_partitions(self.admin.as_ref(), group_id, topics).await;
            if partitions.is_empty() {
                let err = GroupError::NoTopicPartitions {
                    group: group_id.clone(),
                };
                error!(group = %group_id, topics = ?topics, "No topic partitions resolved for consumer group, skipping");
                let mut report = GroupReport::new(group_id);
                report.errors.push(err);
                reports.push(report);
                continue;
            }

            let report = collect_group(
                self.admin.as_ref(),
                &self.emitter,
                group_id,
                &partitions,
                None,
                self.group_rollup,
            )
            .await;
            reports.push(report);
        }
        reports.sort_by(|a, b| a.group_id.cmp(&b.group_id));

        CollectionSummary {
            mode: CollectionMode::Explicit,
            groups: reports,
            unmatched_groups: Vec::new(),
        }
    }
}

/// Collects a pattern matched group over its members' current assignment.
async fn collect_assigned_group(
    admin: &dyn ClusterAdmin,
    emitter: &MetricEmitter,
    descriptor: &ConsumerGroupDescriptor,
    group_rollup: bool,
) -> GroupReport {
    debug!(group = %descriptor.id, "Collecting offsets for consumer group");

    let partitions = descriptor.assigned_partitions();
    if partitions.is_empty() {
        let err = GroupError::NoTopicPartitions {
            group: descriptor.id.clone(),
        };
        error!(group = %descriptor.id, "Consumer group has no assigned partitions");
        let mut report = GroupReport::new(&descriptor.id);
        report.errors.push(err);
        return report;
    }

    collect_group(
        admin,
        emitter,
        &descriptor.id,
        &partitions,
        Some(descriptor.active_consumers()),
        group_rollup,
    )
    .await
}

/// Fetches offsets then watermarks for `partitions`, computes lag and emits.
async fn collect_group(
    admin: &dyn ClusterAdmin,
    emitter: &MetricEmitter,
    group_id: &str,
    partitions: &TopicPartitionSet,
    active_consumers: Option<usize>,
    group_rollup: bool,
) -> GroupReport {
    let mut report = GroupReport::new(group_id);

    let fetched = fetch_group_offsets(admin, group_id, partitions).await;
    report.errors.extend(fetched.errors);

    let metrics = calculate_lag(&fetched.offsets, &fetched.watermarks);
    let rollup = group_rollup.then(|| GroupRollup::from_metrics(&metrics, active_consumers));

    let emission = emitter.emit(group_id, &metrics, rollup.as_ref());
    report.partitions_emitted = emission.emitted;
    report.errors.extend(emission.errors);

    debug!(
        group = group_id,
        partitions = report.partitions_emitted,
        errors = report.errors.len(),
        "Finished collecting consumer group"
    );
    report
}
