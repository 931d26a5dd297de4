//! Tracing and metrics exporter setup for Herald binaries

use crate::config::ObservabilityConfig;
use crate::errors::{RankingError, Result};
use crate::metrics::{self, METRICS_PREFIX, PROPAGATION_BUCKETS, QUERY_BUCKETS};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    // try_init: a subscriber may already be installed (tests, embedding hosts)
    let _ = if config.json_logging {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Install the Prometheus exporter if a metrics port is configured
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_rank_duration_seconds", METRICS_PREFIX)),
            QUERY_BUCKETS,
        )
        .and_then(|b| {
            b.set_buckets_for_metric(
                Matcher::Full(format!("{}_propagation_duration_seconds", METRICS_PREFIX)),
                PROPAGATION_BUCKETS,
            )
        })
        .and_then(|b| b.install())
        .map_err(|e| RankingError::Internal {
            message: format!("Failed to install metrics exporter: {}", e),
        })?;

    metrics::register_metrics();
    tracing::info!(port = config.metrics_port, "Prometheus exporter listening");
    Ok(())
}
