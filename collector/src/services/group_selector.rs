//! Selection of the consumer groups a collection cycle covers.
//!
//! A pattern selects groups by listing and describing every group in the
//! cluster; the deprecated explicit mapping names groups and their topics
//! directly in configuration.

use adapters::{ClusterAdmin, ConsumerGroupDescriptor};
use regex::Regex;
use tracing::debug;

use crate::config::CollectorConfig;
use crate::errors::CollectorError;

#[derive(Debug, Clone)]
pub enum GroupSelection {
    Pattern(Regex),
    /// Group id and configured topic names, in iteration order.
    Explicit(Vec<(String, Vec<String>)>),
}

impl GroupSelection {
    /// Picks the selection mode. A pattern takes precedence over the explicit
    /// mapping; having neither is a configuration error.
    pub fn from_config(config: &CollectorConfig) -> Result<Self, CollectorError> {
        if let Some(pattern) = &config.consumer_group_regex {
            let regex = Regex::new(pattern).map_err(|err| {
                CollectorError::ConfigurationError(format!(
                    "invalid consumer_group_regex '{pattern}': {err}"
                ))
            })?;
            return Ok(GroupSelection::Pattern(regex));
        }

        match &config.consumer_groups {
            Some(groups) if !groups.is_empty() => Ok(GroupSelection::Explicit(
                groups
                    .iter()
                    .map(|(group, topics)| (group.clone(), topics.clone()))
                    .collect(),
            )),
            _ => Err(CollectorError::ConfigurationError(
                "either consumer_group_regex or consumer_groups (deprecated) must be set"
                    .to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchedGroups {
    pub matched: Vec<ConsumerGroupDescriptor>,
    pub unmatched: Vec<String>,
}

/// Lists and describes every consumer group, keeping those whose id matches
/// `pattern`. Listing or describing failures are fatal for the cycle.
pub async fn select_matching_groups(
    admin: &dyn ClusterAdmin,
    pattern: &Regex,
) -> Result<MatchedGroups, CollectorError> {
    let group_ids: Vec<String> = admin
        .list_consumer_groups()
        .await
        .map_err(CollectorError::GroupListError)?
        .into_keys()
        .collect();
    debug!(groups = ?group_ids, "Retrieved the list of consumer groups");

    let descriptors = admin
        .describe_consumer_groups(&group_ids)
        .await
        .map_err(CollectorError::GroupDescribeError)?;
    debug!("Retrieved the descriptions of all consumer groups");

    let mut selected = MatchedGroups::default();
    for descriptor in descriptors {
        if pattern.is_match(&descriptor.id) {
            selected.matched.push(descriptor);
        } else {
            selected.unmatched.push(descriptor.id);
        }
    }

    if !selected.unmatched.is_empty() {
        debug!(
            groups = ?selected.unmatched,
            "Skipped collecting consumer offsets for unmatched consumer groups"
        );
    }

    Ok(selected)
}
