// Memoization of driver instances per (driver type, configuration).

use crate::config::DriverConfig;
use crate::core::Driver;
use crate::drivers::{DriverRegistry, RegistryError};
use moka::future::Cache;
use std::sync::Arc;
use tracing::debug;

/// Derives the cache key for a driver type and its configuration.
///
/// The key is `<driver_type>.<hash>`, where the hash covers the
/// configuration entries in key order. Equal configurations therefore map to
/// the same key no matter how they were written.
pub fn cache_key(driver_type: &str, config: &DriverConfig) -> String {
    let data = config
        .iter()
        .map(|(key, value)| format!("{:?}:{}", key, value))
        .collect::<Vec<_>>()
        .join("|");
    format!("{}.{}", driver_type, blake3::hash(data.as_bytes()).to_hex())
}

/// A process-wide cache of constructed drivers.
///
/// Entries are never evicted: the number of distinct keys is bounded by the
/// configuration, which is loaded once.
pub struct DriverCache {
    registry: Arc<DriverRegistry>,
    instances: Cache<String, Arc<dyn Driver>>,
}

impl DriverCache {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self {
            registry,
            instances: Cache::builder().build(),
        }
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Returns the cached driver for this type and configuration, building
    /// it on first use.
    ///
    /// Concurrent callers with the same key share a single construction.
    /// Failed constructions are not cached, so a later call retries.
    pub async fn get_driver(
        &self,
        driver_type: &str,
        config: &DriverConfig,
    ) -> Result<Arc<dyn Driver>, RegistryError> {
        let key = cache_key(driver_type, config);
        self.instances
            .try_get_with(key.clone(), async {
                debug!(key = %key, "Constructing driver instance");
                self.registry.build(driver_type, config)
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// The number of cached instances.
    pub async fn len(&self) -> u64 {
        self.instances.run_pending_tasks().await;
        self.instances.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
