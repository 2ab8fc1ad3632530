//! A driver that writes notifications to the structured log.

use crate::config::DriverConfig;
use crate::core::{Driver, DriverError, NativePayload};
use crate::drivers::RegistryError;
use async_trait::async_trait;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Info,
    Warn,
}

/// Logs every payload it receives and always reports success.
#[derive(Debug)]
pub struct LogDriver {
    level: LogLevel,
}

impl LogDriver {
    pub const TYPE: &'static str = "log";

    /// Accepts an optional `level` of "info" (default) or "warn".
    pub fn from_config(config: &DriverConfig) -> Result<Self, RegistryError> {
        let level = match config.get("level") {
            None => LogLevel::Info,
            Some(_) => match config.get_str("level") {
                Some("info") => LogLevel::Info,
                Some("warn") => LogLevel::Warn,
                _ => {
                    return Err(RegistryError::configuration(
                        Self::TYPE,
                        "'level' must be \"info\" or \"warn\"",
                    ))
                }
            },
        };
        Ok(Self { level })
    }
}

#[async_trait]
impl Driver for LogDriver {
    fn name(&self) -> &str {
        Self::TYPE
    }

    async fn notify(&self, payload: &NativePayload) -> Result<bool, DriverError> {
        match self.level {
            LogLevel::Info => info!(?payload, "Received notification"),
            LogLevel::Warn => warn!(?payload, "Received notification"),
        }
        Ok(true)
    }
}
