//! Central module for collector configuration settings.
//!
//! This module handles loading and validating the parameters of a collection
//! cycle: how consumer groups are selected, the cluster name attached to every
//! entity, concurrency limits, and the broker connection block. Configuration
//! is read from a JSON file and then overridden by environment variables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::CollectorError;

pub const ENV_CLUSTER_NAME: &str = "CLUSTER_NAME";
pub const ENV_CONSUMER_GROUP_REGEX: &str = "CONSUMER_GROUP_REGEX";
pub const ENV_CONSUMER_GROUPS: &str = "CONSUMER_GROUPS";
pub const ENV_BOOTSTRAP_SERVERS: &str = "KAFKA_BOOTSTRAP_SERVERS";
pub const ENV_MAX_CONCURRENT_GROUPS: &str = "MAX_CONCURRENT_GROUPS";

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Attached to every emitted entity as an identifying attribute.
    #[serde(default)]
    pub cluster_name: String,
    /// Selects regex mode when set.
    #[serde(default)]
    pub consumer_group_regex: Option<String>,
    /// Deprecated explicit group id to topic names mapping.
    #[serde(default)]
    pub consumer_groups: Option<BTreeMap<String, Vec<String>>>,
    /// Upper bound on concurrently collected groups in regex mode.
    #[serde(default)]
    pub max_concurrent_groups: Option<usize>,
    /// Publishes a per-group lag summary as a separate sample. Off by default.
    #[serde(default)]
    pub collect_group_rollup: bool,
    #[serde(default)]
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub client_config: BTreeMap<String, String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            request_timeout_ms: default_request_timeout_ms(),
            client_config: BTreeMap::new(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            cluster_name: String::new(),
            consumer_group_regex: None,
            consumer_groups: None,
            max_concurrent_groups: None,
            collect_group_rollup: false,
            broker: BrokerConfig::default(),
        }
    }
}

impl CollectorConfig {
    pub fn from_json(content: &str) -> Result<Self, CollectorError> {
        serde_json::from_str(content)
            .map_err(|err| CollectorError::ConfigurationError(format!("invalid config: {err}")))
    }

    /// Loads the configuration file at `path` (defaults when `None`), applies
    /// environment overrides, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, CollectorError> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|err| {
                    CollectorError::ConfigurationError(format!(
                        "cannot read {}: {err}",
                        path.display()
                    ))
                })?;
                Self::from_json(&content)?
            }
            None => Self::default(),
        };

        let config = config.with_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides looked up by environment variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, CollectorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(cluster_name) = lookup(ENV_CLUSTER_NAME) {
            self.cluster_name = cluster_name;
        }
        if let Some(pattern) = lookup(ENV_CONSUMER_GROUP_REGEX).filter(|p| !p.is_empty()) {
            self.consumer_group_regex = Some(pattern);
        }
        if let Some(groups) = lookup(ENV_CONSUMER_GROUPS).filter(|g| !g.is_empty()) {
            let groups = serde_json::from_str(&groups).map_err(|err| {
                CollectorError::ConfigurationError(format!("{ENV_CONSUMER_GROUPS}: {err}"))
            })?;
            self.consumer_groups = Some(groups);
        }
        if let Some(servers) = lookup(ENV_BOOTSTRAP_SERVERS) {
            self.broker.bootstrap_servers = servers;
        }
        if let Some(limit) = lookup(ENV_MAX_CONCURRENT_GROUPS) {
            let limit = limit.parse::<usize>().map_err(|err| {
                CollectorError::ConfigurationError(format!("{ENV_MAX_CONCURRENT_GROUPS}: {err}"))
            })?;
            self.max_concurrent_groups = Some(limit);
        }
        Ok(self)
    }

    /// Checks settings that would only fail once the cycle is running.
    /// Group selection is validated when a cycle starts.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.cluster_name.trim().is_empty() {
            return Err(CollectorError::ConfigurationError(
                "cluster_name must be set".to_string(),
            ));
        }
        if self.max_concurrent_groups == Some(0) {
            return Err(CollectorError::ConfigurationError(
                "max_concurrent_groups must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
