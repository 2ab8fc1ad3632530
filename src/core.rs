//! Core domain types and the driver capability contract.
//!
//! This module defines the payload shapes accepted by the gateway, the
//! per-driver outcome records produced by a dispatch, and the `Driver` trait
//! that every notification backend driver implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// The message returned to callers in place of an unexpected driver error.
pub const GENERIC_DRIVER_ERROR: &str = "Something has went wrong!";

/// The gateway's own alert shape.
///
/// Unknown fields sent by the caller are kept in `extra` so that drivers and
/// the echoed dispatch result see the payload exactly as it was submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NativePayload {
    pub region: String,
    pub severity: String,
    pub description: String,
    /// Who raised the alert.
    pub who: String,
    /// Short summary of what happened.
    pub what: String,
    pub affected_hosts: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A Prometheus Alertmanager webhook body, as accepted by `/prometheus_notify`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VendorAlertBatch {
    pub alerts: Vec<VendorAlert>,
}

/// One alert entry of a `VendorAlertBatch`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VendorAlert {
    pub labels: VendorLabels,
    pub description: String,
    pub summary: String,
}

/// The labels of a vendor alert that the gateway relies on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VendorLabels {
    pub region: String,
    pub severity: String,
    pub affected_hosts: Vec<String>,
}

/// What happened when a single driver was asked to deliver a payload.
///
/// Serializes as `{"status": bool}` or `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DriverOutcome {
    Status { status: bool },
    Error { error: String },
}

impl DriverOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, DriverOutcome::Error { .. })
    }
}

/// The aggregated outcome of a native dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchResult {
    /// The payload that was dispatched.
    pub payload: NativePayload,
    /// Outcomes keyed by backend name, then by driver type.
    pub result: BTreeMap<String, BTreeMap<String, DriverOutcome>>,
    /// Number of attempted driver invocations.
    pub total: u64,
    /// Invocations where the driver confirmed delivery.
    pub passed: u64,
    /// Invocations where the driver reported an unsuccessful delivery.
    pub failed: u64,
    /// Invocations that raised an error.
    pub errors: u64,
}

impl DispatchResult {
    pub fn new(payload: NativePayload) -> Self {
        Self {
            payload,
            result: BTreeMap::new(),
            total: 0,
            passed: 0,
            failed: 0,
            errors: 0,
        }
    }

    /// Records the outcome of one driver invocation and updates the counters.
    pub fn record(&mut self, backend: &str, driver_type: &str, outcome: DriverOutcome) {
        self.total += 1;
        match &outcome {
            DriverOutcome::Status { status: true } => self.passed += 1,
            DriverOutcome::Status { status: false } => self.failed += 1,
            DriverOutcome::Error { .. } => self.errors += 1,
        }
        self.result
            .entry(backend.to_string())
            .or_default()
            .insert(driver_type.to_string(), outcome);
    }
}

/// Errors a driver may raise from `notify`.
#[derive(Error, Debug)]
pub enum DriverError {
    /// A recoverable failure whose message is safe to show to the caller.
    #[error("{0}")]
    Explained(String),

    /// Anything else. The message is logged but never returned to the caller.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl DriverError {
    pub fn explained(message: impl Into<String>) -> Self {
        DriverError::Explained(message.into())
    }

    /// The message that may be shown to the caller for this error.
    pub fn public_message(&self) -> String {
        match self {
            DriverError::Explained(message) => message.clone(),
            DriverError::Unexpected(_) => GENERIC_DRIVER_ERROR.to_string(),
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Delivers notifications through one concrete mechanism (chat, webhook, ...).
#[async_trait]
pub trait Driver: Send + Sync {
    /// The driver type this instance was registered under (e.g., "slack").
    fn name(&self) -> &str;

    /// Attempts to deliver a payload.
    ///
    /// # Returns
    /// * `Ok(true)` if delivery was confirmed
    /// * `Ok(false)` if the attempt was made but not accepted (e.g., recipient rejected)
    /// * `Err(DriverError::Explained)` for a recoverable failure with a user-facing message
    /// * `Err(DriverError::Unexpected)` for anything else
    async fn notify(&self, payload: &NativePayload) -> Result<bool, DriverError>;
}
