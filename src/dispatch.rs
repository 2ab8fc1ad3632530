//! The dispatch engine.
//!
//! A `Dispatcher` owns everything a dispatch needs: the configured backends,
//! the driver registry and the driver instance cache. It is built once at
//! startup and shared by reference between requests.
//!
//! Every dispatch runs in three phases:
//! 1. validate the payload and the requested backend set,
//! 2. resolve (fetch or construct) every driver instance involved,
//! 3. invoke the drivers concurrently, at most `max_concurrent` at a time,
//!    and merge the outcomes in (backend, driver type) order.
//!
//! Nothing is invoked unless the first two phases succeed, so a request is
//! either rejected as a whole or attempted as a whole.

use crate::cache::DriverCache;
use crate::config::{BackendsConfig, Config};
use crate::core::{DispatchResult, Driver, DriverError, DriverOutcome, NativePayload};
use crate::drivers::{DriverRegistry, RegistryError};
use crate::prometheus;
use crate::validation::{validate_native_payload, validate_vendor_payload, ValidationError};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// Errors that reject a dispatch as a whole.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Bad Payload: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unexpected backends: {}", .0.join(", "))]
    UnknownBackends(Vec<String>),

    #[error("Backend '{backend}': {source}")]
    DriverUnavailable {
        backend: String,
        source: RegistryError,
    },
}

/// Outcome of a Prometheus batch dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of driver invocations performed.
    pub attempted: usize,
    /// One message per failed invocation, in dispatch order.
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Splits the `{backends}` path segment into a set of backend names.
///
/// Blank entries are dropped and duplicates collapse.
pub fn parse_backends(spec: &str) -> BTreeSet<String> {
    spec.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// A resolved driver, ready to be invoked.
struct Target {
    backend: String,
    driver_type: String,
    driver: Arc<dyn Driver>,
}

pub struct Dispatcher {
    backends: BackendsConfig,
    cache: DriverCache,
    driver_timeout: Option<Duration>,
    max_concurrent: usize,
}

/// Concurrency limit of a `Dispatcher` built without configuration.
pub const DEFAULT_MAX_CONCURRENT_INVOCATIONS: usize = 32;

impl Dispatcher {
    pub fn new(backends: BackendsConfig, registry: Arc<DriverRegistry>) -> Self {
        Self {
            backends,
            cache: DriverCache::new(registry),
            driver_timeout: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT_INVOCATIONS,
        }
    }

    pub fn from_config(config: &Config, registry: Arc<DriverRegistry>) -> Self {
        Self::new(config.notify_backends.clone(), registry)
            .with_driver_timeout(config.dispatch.driver_timeout())
            .with_max_concurrency(config.dispatch.max_concurrent_invocations)
    }

    /// Bounds the duration of every single driver call.
    pub fn with_driver_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.driver_timeout = timeout;
        self
    }

    /// Limits how many driver calls of one dispatch run at the same time.
    /// `0` is treated as `1`.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrent = limit.max(1);
        self
    }

    pub fn backend_names(&self) -> impl Iterator<Item = &String> {
        self.backends.keys()
    }

    pub fn cache(&self) -> &DriverCache {
        &self.cache
    }

    /// Validates and dispatches a native payload to the requested backends.
    #[instrument(skip_all, fields(backends = ?requested))]
    pub async fn dispatch(
        &self,
        payload: &Value,
        requested: &BTreeSet<String>,
    ) -> Result<DispatchResult, DispatchError> {
        let payload = validate_native_payload(payload)?;
        self.dispatch_payload(payload, requested).await
    }

    /// Dispatches an already validated native payload.
    pub async fn dispatch_payload(
        &self,
        payload: NativePayload,
        requested: &BTreeSet<String>,
    ) -> Result<DispatchResult, DispatchError> {
        self.check_backends(requested)?;
        let targets = self.resolve_targets(requested).await?;

        let payload = Arc::new(payload);
        let outcomes: Vec<_> = stream::iter(
            targets
                .iter()
                .map(|target| self.invoke(target, payload.clone()))
                .collect::<Vec<_>>(),
        )
        .buffered(self.max_concurrent)
        .collect()
        .await;

        let mut result = DispatchResult::new((*payload).clone());
        for (target, outcome) in targets.iter().zip(outcomes) {
            let outcome = match outcome {
                Ok(status) => DriverOutcome::Status { status },
                Err(err) => DriverOutcome::Error {
                    error: err.public_message(),
                },
            };
            result.record(&target.backend, &target.driver_type, outcome);
        }
        debug!(
            total = result.total,
            passed = result.passed,
            failed = result.failed,
            errors = result.errors,
            "Dispatch finished"
        );
        Ok(result)
    }

    /// Validates a Prometheus batch, converts every alert and dispatches each
    /// of them to the requested backends.
    ///
    /// The report only lists errors; a driver returning `false` is not one.
    #[instrument(skip_all, fields(backends = ?requested))]
    pub async fn dispatch_prometheus(
        &self,
        payload: &Value,
        requested: &BTreeSet<String>,
    ) -> Result<BatchReport, DispatchError> {
        let batch = validate_vendor_payload(payload)?;
        let payloads: Vec<Arc<NativePayload>> =
            prometheus::convert_batch(batch).map(Arc::new).collect();
        self.check_backends(requested)?;
        let targets = self.resolve_targets(requested).await?;

        let invocations: Vec<(&Target, Arc<NativePayload>)> = payloads
            .iter()
            .flat_map(|payload| targets.iter().map(move |target| (target, payload.clone())))
            .collect();
        let outcomes: Vec<_> = stream::iter(
            invocations
                .iter()
                .map(|(target, payload)| self.invoke(target, payload.clone()))
                .collect::<Vec<_>>(),
        )
        .buffered(self.max_concurrent)
        .collect()
        .await;

        let mut report = BatchReport {
            attempted: outcomes.len(),
            errors: Vec::new(),
        };
        for ((target, _), outcome) in invocations.into_iter().zip(outcomes) {
            if let Err(err) = outcome {
                report.errors.push(format!(
                    "Backend '{}' driver '{}': {}",
                    target.backend,
                    target.driver_type,
                    err.public_message()
                ));
            }
        }
        Ok(report)
    }

    /// Fails with every requested backend that is not configured.
    fn check_backends(&self, requested: &BTreeSet<String>) -> Result<(), DispatchError> {
        let unknown: Vec<String> = requested
            .iter()
            .filter(|name| !self.backends.contains_key(*name))
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::UnknownBackends(unknown))
        }
    }

    /// Fetches or constructs every driver of the requested backends, in
    /// (backend, driver type) order.
    async fn resolve_targets(
        &self,
        requested: &BTreeSet<String>,
    ) -> Result<Vec<Target>, DispatchError> {
        let mut targets = Vec::new();
        for backend in requested {
            let Some(drivers) = self.backends.get(backend) else {
                continue;
            };
            for (driver_type, driver_config) in drivers {
                let driver = self
                    .cache
                    .get_driver(driver_type, driver_config)
                    .await
                    .map_err(|source| {
                        error!(backend = %backend, driver = %driver_type, error = %source, "Failed to initialise driver");
                        DispatchError::DriverUnavailable {
                            backend: backend.clone(),
                            source,
                        }
                    })?;
                targets.push(Target {
                    backend: backend.clone(),
                    driver_type: driver_type.clone(),
                    driver,
                });
            }
        }
        Ok(targets)
    }

    /// Runs one driver call on its own task, so that a panicking driver only
    /// fails its own invocation.
    async fn invoke(&self, target: &Target, payload: Arc<NativePayload>) -> Result<bool, DriverError> {
        let driver = target.driver.clone();
        let driver_timeout = self.driver_timeout;
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            match driver_timeout {
                Some(limit) => match tokio::time::timeout(limit, driver.notify(&payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(DriverError::Explained(format!(
                        "Timed out after {:?}",
                        limit
                    ))),
                },
                None => driver.notify(&payload).await,
            }
        });
        let result = match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(DriverError::Unexpected(anyhow::anyhow!(
                "driver task failed: {}",
                join_error
            ))),
        };

        metrics::histogram!("driver_notify_duration_seconds", "driver" => target.driver_type.clone())
            .record(started.elapsed().as_secs_f64());
        let outcome = match &result {
            Ok(true) => "passed",
            Ok(false) => "failed",
            Err(_) => "error",
        };
        metrics::counter!(
            "notifications_total",
            "backend" => target.backend.clone(),
            "driver" => target.driver_type.clone(),
            "outcome" => outcome
        )
        .increment(1);

        match &result {
            Err(DriverError::Explained(message)) => {
                warn!(backend = %target.backend, driver = %target.driver_type, error = %message, "Driver reported an error");
            }
            Err(DriverError::Unexpected(err)) => {
                error!(backend = %target.backend, driver = %target.driver_type, error = ?err, "Driver failed unexpectedly");
            }
            Ok(status) => {
                debug!(backend = %target.backend, driver = %target.driver_type, status, "Driver finished");
            }
        }
        result
    }
}
