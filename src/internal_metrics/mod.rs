//! # Internal Metrics Module
//!
//! Metrics are recorded through the `metrics` facade at their call sites
//! (mostly the dispatch engine). Without an installed recorder every call is
//! a no-op, which is what tests and deployments with metrics disabled get.
//!
//! When enabled, `MetricsBuilder` installs a Prometheus recorder and hands
//! back the handle that the API router renders on `GET /metrics`.

use crate::config::MetricsConfig;
use anyhow::Result;
use metrics::Unit;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Registers descriptions for every metric the gateway emits.
pub fn describe_metrics() {
    metrics::describe_counter!("dispatch_requests_total", Unit::Count, "Total number of dispatch requests, labeled by endpoint and HTTP status.");
    metrics::describe_counter!("notifications_total", Unit::Count, "Total number of driver invocations, labeled by backend, driver and outcome.");
    metrics::describe_histogram!("driver_notify_duration_seconds", Unit::Seconds, "The time a single driver call took, labeled by driver.");
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder as the global recorder.
    ///
    /// Returns `Ok(None)` when metrics are disabled. Fails if another global
    /// recorder is already installed.
    pub fn build(self) -> Result<Option<PrometheusHandle>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )?
            .build_recorder();
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

        describe_metrics();
        info!("Prometheus metrics enabled on /metrics");
        Ok(Some(handle))
    }
}
