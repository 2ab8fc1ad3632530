//! Conversion of Prometheus Alertmanager alerts into native payloads.

use crate::core::{NativePayload, VendorAlert, VendorAlertBatch};
use serde_json::Map;

/// The `who` of every payload produced from a Prometheus alert.
pub const PROMETHEUS_WHO: &str = "Prometheus";

/// Flattens a batch into one native payload per alert, preserving order.
pub fn convert_batch(batch: VendorAlertBatch) -> impl Iterator<Item = NativePayload> {
    batch.alerts.into_iter().map(convert_alert)
}

/// Converts a single alert.
pub fn convert_alert(alert: VendorAlert) -> NativePayload {
    NativePayload {
        region: alert.labels.region,
        severity: alert.labels.severity,
        description: alert.description,
        who: PROMETHEUS_WHO.to_string(),
        what: alert.summary,
        affected_hosts: alert.labels.affected_hosts,
        extra: Map::new(),
    }
}
