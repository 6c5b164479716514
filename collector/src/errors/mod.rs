//! Collector error types.
//!
//! `CollectorError` covers the fatal conditions that abort a whole collection
//! cycle. `GroupError` covers everything that is contained to a single group:
//! those are logged, recorded on the group's report, and never stop the cycle.

use adapters::AdapterError;
use std::error::Error as StdError;
use thiserror::Error;

/// Renders an error followed by its sources, joined by `": "`.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Failed to create cluster admin")]
    AdminHandleError(#[source] AdapterError),

    #[error("Failed to get list of consumer groups")]
    GroupListError(#[source] AdapterError),

    #[error("Failed to get consumer group descriptions")]
    GroupDescribeError(#[source] AdapterError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("No topic partitions to collect for consumer group '{group}'")]
    NoTopicPartitions { group: String },

    #[error("Failed to collect consumer offsets for group '{group}'")]
    OffsetFetch { group: String, source: AdapterError },

    #[error("Failed to collect high water marks for group '{group}'")]
    WatermarkFetch { group: String, source: AdapterError },

    #[error("Failed to create entity for consumer group '{group}'")]
    Entity { group: String, source: AdapterError },

    #[error("Failed to marshal {sample} metrics for consumer group '{group}'")]
    Marshal {
        group: String,
        sample: String,
        source: AdapterError,
    },

    #[error("Collection task for consumer group '{group}' did not complete: {message}")]
    TaskAborted { group: String, message: String },
}

impl GroupError {
    /// Errors raised while handing data to the publishing façade.
    pub fn is_emission_error(&self) -> bool {
        matches!(self, GroupError::Entity { .. } | GroupError::Marshal { .. })
    }

    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            GroupError::OffsetFetch { .. } | GroupError::WatermarkFetch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_error_is_reported_once_in_the_chain() {
        let err = GroupError::OffsetFetch {
            group: "billing".to_string(),
            source: AdapterError::OffsetFetchError {
                group: "billing".to_string(),
                message: "not coordinator".to_string(),
            },
        };

        let rendered = error_chain(&err);

        assert!(rendered.starts_with("Failed to collect consumer offsets for group 'billing': "));
        assert_eq!(rendered.matches("not coordinator").count(), 1);
    }

    #[test]
    fn fatal_errors_keep_the_adapter_error_as_source() {
        let err = CollectorError::GroupListError(AdapterError::ListGroupsError(
            "broker unavailable".to_string(),
        ));

        assert_eq!(err.to_string(), "Failed to get list of consumer groups");
        assert_eq!(
            error_chain(&err).matches("broker unavailable").count(),
            1
        );
    }
}
