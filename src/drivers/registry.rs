//! Maps driver type names to constructors.

use crate::config::{BackendsConfig, DriverConfig};
use crate::core::Driver;
use crate::drivers::{log::LogDriver, slack::SlackDriver, webhook::WebhookDriver};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Builds a driver instance from its configuration.
pub type DriverConstructor =
    Arc<dyn Fn(&DriverConfig) -> Result<Arc<dyn Driver>, RegistryError> + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown driver type '{0}'")]
    UnknownDriverType(String),

    #[error("Driver '{driver}' is misconfigured: {reason}")]
    Configuration { driver: String, reason: String },

    #[error("Driver type '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl RegistryError {
    pub fn configuration(driver: &str, reason: impl Into<String>) -> Self {
        RegistryError::Configuration {
            driver: driver.to_string(),
            reason: reason.into(),
        }
    }
}

/// The set of driver types the gateway can construct.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    constructors: BTreeMap<String, DriverConstructor>,
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("driver_types", &self.driver_types())
            .finish()
    }
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in driver.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, DriverConstructor); 3] = [
            (SlackDriver::TYPE, Arc::new(build_slack)),
            (WebhookDriver::TYPE, Arc::new(build_webhook)),
            (LogDriver::TYPE, Arc::new(build_log)),
        ];
        for (name, constructor) in builtins {
            registry.constructors.insert(name.to_string(), constructor);
        }
        registry
    }

    /// Registers a constructor under `name`.
    pub fn register<F>(&mut self, name: &str, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn(&DriverConfig) -> Result<Arc<dyn Driver>, RegistryError> + Send + Sync + 'static,
    {
        if self.constructors.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        self.constructors
            .insert(name.to_string(), Arc::new(constructor));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered driver types, sorted.
    pub fn driver_types(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Constructs a new driver instance.
    ///
    /// Construction errors are returned as-is; the registry never retries.
    pub fn build(&self, name: &str, config: &DriverConfig) -> Result<Arc<dyn Driver>, RegistryError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| RegistryError::UnknownDriverType(name.to_string()))?;
        constructor(config)
    }

    /// Logs a warning for every configured driver type this registry cannot build.
    ///
    /// Returns the offending `(backend, driver)` pairs.
    pub fn check_backends(&self, backends: &BackendsConfig) -> Vec<(String, String)> {
        let mut unknown = Vec::new();
        for (backend, drivers) in backends {
            for driver in drivers.keys() {
                if !self.contains(driver) {
                    warn!(backend = %backend, driver = %driver, "Configured driver type is not registered");
                    unknown.push((backend.clone(), driver.clone()));
                }
            }
        }
        unknown
    }
}

fn build_slack(config: &DriverConfig) -> Result<Arc<dyn Driver>, RegistryError> {
    Ok(Arc::new(SlackDriver::from_config(config)?))
}

fn build_webhook(config: &DriverConfig) -> Result<Arc<dyn Driver>, RegistryError> {
    Ok(Arc::new(WebhookDriver::from_config(config)?))
}

fn build_log(config: &DriverConfig) -> Result<Arc<dyn Driver>, RegistryError> {
    Ok(Arc::new(LogDriver::from_config(config)?))
}
