//! The main application logic, decoupled from the entry point.

use crate::{
    api::{self, AppState},
    config::Config,
    dispatch::Dispatcher,
    drivers::DriverRegistry,
    internal_metrics::MetricsBuilder,
};
use anyhow::{Context, Result};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, instrument, warn};

/// A bound, ready-to-serve instance of the gateway.
pub struct App {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests until `shutdown_rx` turns `true` or its sender is
    /// dropped, then lets in-flight requests finish.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        info!(addr = %self.local_addr, "Listening for notifications");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                // A dropped sender also stops the server.
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
                info!("Shutdown signal received, draining in-flight requests...");
            })
            .await?;
        info!("HTTP server stopped.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Components can be overridden for testing purposes.
pub struct AppBuilder {
    config: Config,
    registry_override: Option<DriverRegistry>,
    metrics_handle: Option<PrometheusHandle>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry_override: None,
            metrics_handle: None,
        }
    }

    /// Replaces the built-in driver registry.
    pub fn registry_override(mut self, registry: DriverRegistry) -> Self {
        self.registry_override = Some(registry);
        self
    }

    /// Serves `/metrics` from an already installed recorder instead of
    /// installing a new one.
    pub fn metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Wires registry, dispatcher and router, and binds the listener.
    #[instrument(skip_all)]
    pub async fn build(self) -> Result<App> {
        let config = self.config;

        let registry = self
            .registry_override
            .unwrap_or_else(DriverRegistry::with_builtin_drivers);
        let unknown = registry.check_backends(&config.notify_backends);
        if !unknown.is_empty() {
            warn!(
                count = unknown.len(),
                "Some configured drivers will fail on dispatch"
            );
        }

        let dispatcher = Arc::new(Dispatcher::from_config(&config, Arc::new(registry)));

        let metrics = match self.metrics_handle {
            Some(handle) => Some(handle),
            None => MetricsBuilder::new(config.metrics.clone()).build()?,
        };

        let router = api::router(AppState {
            dispatcher,
            metrics,
        });

        let bind_addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", bind_addr))?;
        let local_addr = listener.local_addr()?;

        Ok(App {
            listener,
            router,
            local_addr,
        })
    }
}
