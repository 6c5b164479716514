//! Main entry point for the laggaze collector.
//!
//! This file initializes logging, loads the configuration, connects to the
//! Kafka cluster, runs one offset collection cycle and writes the resulting
//! integration payload to stdout.

use adapters::kafka::KafkaConnection;
use adapters::Integration;
use laggaze::errors::error_chain;
use laggaze::{collect, CollectorConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "LAGGAZE_CONFIG";
const INTEGRATION_NAME: &str = "com.laggaze.kafka-offsets";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the payload, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn kafka_connection(config: &CollectorConfig) -> KafkaConnection {
    KafkaConnection {
        bootstrap_servers: config.broker.bootstrap_servers.clone(),
        request_timeout_ms: config.broker.request_timeout_ms,
        client_config: config.broker.client_config.clone(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);
    let config = match CollectorConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", error_chain(&err));
            return ExitCode::FAILURE;
        }
    };

    let integration = Arc::new(Integration::new(INTEGRATION_NAME, env!("CARGO_PKG_VERSION")));
    let summary = match collect(&config, &kafka_connection(&config), integration.clone()).await {
        Ok(summary) => summary,
        Err(err) => {
            error!("{}", error_chain(&err));
            return ExitCode::FAILURE;
        }
    };

    for report in summary.failed_groups() {
        warn!(group = %report.group_id, errors = report.errors.len(), "Consumer group collected with errors");
    }
    info!(
        cluster = %config.cluster_name,
        groups = summary.groups.len(),
        unmatched = summary.unmatched_groups.len(),
        "Offset collection finished"
    );

    match serde_json::to_string(&integration.payload()) {
        Ok(payload) => {
            println!("{payload}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Failed to serialize integration payload: {}", err);
            ExitCode::FAILURE
        }
    }
}
