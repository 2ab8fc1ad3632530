//! Notification drivers and the registry that constructs them.
//!
//! Every driver implements `core::Driver`. The built-in set is closed: new
//! driver types are added by registering a constructor with the
//! `DriverRegistry`, never by extending an existing driver.

pub mod log;
pub mod registry;
pub mod slack;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod webhook;

pub use registry::{DriverConstructor, DriverRegistry, RegistryError};

use crate::config::DriverConfig;
use crate::core::DriverError;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{error, warn};

/// Request timeout for HTTP drivers without an explicit `timeout_seconds`.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Reads a required URL setting and checks that it parses.
pub(crate) fn require_url(driver: &str, config: &DriverConfig, key: &str) -> Result<String, RegistryError> {
    let url = config
        .get_str(key)
        .ok_or_else(|| RegistryError::configuration(driver, format!("'{}' is required", key)))?;
    reqwest::Url::parse(url).map_err(|e| {
        RegistryError::configuration(driver, format!("'{}' is not a valid URL: {}", key, e))
    })?;
    Ok(url.to_string())
}

/// Builds the HTTP client an HTTP driver keeps for its lifetime.
pub(crate) fn http_client(driver: &str, config: &DriverConfig) -> Result<reqwest::Client, RegistryError> {
    let timeout = match config.get("timeout_seconds") {
        None => DEFAULT_HTTP_TIMEOUT_SECS,
        Some(_) => config.get_u64("timeout_seconds").ok_or_else(|| {
            RegistryError::configuration(driver, "'timeout_seconds' must be a non-negative integer")
        })?,
    };
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .map_err(|e| RegistryError::configuration(driver, e.to_string()))
}

/// Maps an HTTP response onto the driver contract.
///
/// 2xx is a confirmed delivery, 4xx a rejected one, anything else an
/// explained failure.
pub(crate) fn classify_response(service: &str, status: StatusCode, body: &str) -> Result<bool, DriverError> {
    if status.is_success() {
        Ok(true)
    } else if status.is_client_error() {
        warn!(service, status = %status, body = %body, "Notification was rejected");
        Ok(false)
    } else {
        error!(service, status = %status, body = %body, "Notification endpoint failed");
        Err(DriverError::Explained(format!(
            "{} responded with status {}",
            service,
            status.as_u16()
        )))
    }
}

/// Maps a transport error onto the driver contract.
pub(crate) fn classify_send_error(service: &str, err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        DriverError::Explained(format!("{} request timed out", service))
    } else if err.is_connect() {
        DriverError::Explained(format!("{} is unreachable", service))
    } else {
        DriverError::Unexpected(anyhow::Error::new(err).context(format!("{} request failed", service)))
    }
}
