//! Configuration management for the notification gateway
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer built-in defaults, a TOML or JSON file,
//! `NOTIFY_`-prefixed environment variables and command-line arguments.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "NOTIFY_CONF";
/// Configuration file used when neither `--config` nor `NOTIFY_CONF` is set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/notify/config.json";

/// Drivers of one backend, keyed by driver type.
pub type BackendConfig = BTreeMap<String, DriverConfig>;
/// All configured backends, keyed by backend name.
pub type BackendsConfig = BTreeMap<String, BackendConfig>;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Dispatch engine settings.
    pub dispatch: DispatchConfig,
    /// Prometheus exporter settings.
    pub metrics: MetricsConfig,
    /// Backend name -> driver type -> driver configuration.
    #[serde(default)]
    pub notify_backends: BackendsConfig,
}

/// HTTP listener settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Dispatch engine settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Upper bound for a single driver call. `0` disables the bound.
    pub driver_timeout_seconds: Option<u64>,
    /// Driver calls of one request that may run at the same time.
    #[serde(default = "default_max_concurrent_invocations")]
    pub max_concurrent_invocations: usize,
}

fn default_max_concurrent_invocations() -> usize {
    32
}

impl DispatchConfig {
    pub fn driver_timeout(&self) -> Option<Duration> {
        self.driver_timeout_seconds
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct MetricsConfig {
    /// Serve `GET /metrics` from the main listener.
    #[serde(default)]
    pub enabled: bool,
}

/// A single scalar (or list of scalars) in a driver configuration.
///
/// Mappings are deliberately not representable, which keeps driver
/// configurations flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<ConfigValue>),
}

impl fmt::Display for ConfigValue {
    /// Renders an unambiguous representation: strings are quoted and floats
    /// always carry a decimal point, so `"1"`, `1` and `1.0` never collide.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Float(x) => write!(f, "{:?}", x),
            ConfigValue::Text(s) => write!(f, "{:?}", s),
            ConfigValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

/// The flat configuration of one driver.
///
/// Keys are kept sorted, so iteration order does not depend on the order in
/// which the configuration was written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverConfig(BTreeMap<String, ConfigValue>);

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful in tests.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ConfigValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.0.get(key) {
            Some(ConfigValue::Integer(i)) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for DriverConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Config {
    /// Loads the application configuration.
    ///
    /// The file is taken from `--config`, then `NOTIFY_CONF`, then
    /// `/etc/notify/config.json`. A missing file is an error.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = Self::resolve_path(cli);
        if !path.exists() {
            anyhow::bail!("configuration file {:?} does not exist", path);
        }

        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => figment.merge(Json::file(&path)),
            _ => figment.merge(Toml::file(&path)),
        };

        let config: Config = figment
            // Allow overriding with environment variables, e.g., NOTIFY_SERVER__PORT=8080
            .merge(Env::prefixed("NOTIFY_").ignore(&["conf"]).split("__"))
            .merge(cli.clone())
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration, falling back to the defaults (and therefore
    /// an empty backend set) when loading fails.
    ///
    /// The load error is handed back so the caller can report it once
    /// logging is initialised.
    pub fn load_or_default(cli: &Cli) -> (Self, Option<anyhow::Error>) {
        match Self::load(cli) {
            Ok(config) => (config, None),
            Err(err) => {
                let mut config = Config::default();
                // Command-line overrides still apply to the fallback.
                if let Ok(with_cli) = Figment::new()
                    .merge(Serialized::defaults(Config::default()))
                    .merge(cli.clone())
                    .extract::<Config>()
                {
                    config = with_cli;
                }
                (config, Some(err))
            }
        }
    }

    /// Returns the configuration file path for the given arguments.
    pub fn resolve_path(cli: &Cli) -> PathBuf {
        cli.config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Checks constraints that the type system does not express.
    pub fn validate(&self) -> Result<()> {
        for (backend, drivers) in &self.notify_backends {
            if backend.trim().is_empty() {
                anyhow::bail!("backend names must not be empty");
            }
            if backend.contains(',') {
                anyhow::bail!("backend name '{}' must not contain ','", backend);
            }
            if drivers.keys().any(|driver| driver.trim().is_empty()) {
                anyhow::bail!("backend '{}' has a driver with an empty type", backend);
            }
        }
        Ok(())
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            dispatch: DispatchConfig {
                driver_timeout_seconds: Some(30),
                max_concurrent_invocations: default_max_concurrent_invocations(),
            },
            metrics: MetricsConfig { enabled: false },
            notify_backends: BackendsConfig::new(),
        }
    }
}
