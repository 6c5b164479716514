//! Custom error types specific to the `adapters` crate.
//!
//! This module defines errors that can occur while connecting to the broker
//! cluster, issuing administrative requests, decoding broker payloads, or
//! publishing metrics, providing a unified error type for every collaborator
//! the collector talks to.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Failed to connect to the cluster: {0}")]
    ConnectionError(String),

    #[error("Failed to list consumer groups: {0}")]
    ListGroupsError(String),

    #[error("Failed to describe consumer groups: {0}")]
    DescribeGroupsError(String),

    #[error("Failed to fetch metadata for topic '{topic}': {message}")]
    MetadataError { topic: String, message: String },

    #[error("Failed to fetch committed offsets for group '{group}': {message}")]
    OffsetFetchError { group: String, message: String },

    #[error("Failed to fetch high water marks: {0}")]
    WatermarkFetchError(String),

    #[error("Malformed member assignment: {0}")]
    AssignmentDecodeError(String),

    #[error("Failed to create entity '{name}': {message}")]
    EntityError { name: String, message: String },

    #[error("Failed to set metric '{metric}': {message}")]
    MarshalError { metric: String, message: String },

    #[error("Background task failed: {0}")]
    TaskError(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
