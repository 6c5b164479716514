//! Consumer group offset and lag collection.
//!
//! One call to [`collect`] selects the consumer groups to monitor, reads their
//! committed offsets and the partitions' high water marks, computes lag, and
//! publishes one sample per partition through the metrics façade.

pub mod config;
pub mod errors;
pub mod services;

pub use config::CollectorConfig;
pub use errors::{CollectorError, GroupError};
pub use services::coordinator::{
    collect, CollectionCoordinator, CollectionMode, CollectionSummary, GroupReport,
};
