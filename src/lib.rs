/// Notify Gateway - an HTTP gateway fanning alerts out to notification backends
///
/// This library provides the payload validation, driver registry and cache,
/// and the concurrent dispatch engine behind the gateway's HTTP routes.
pub mod api;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod drivers;
pub mod formatting;
pub mod internal_metrics;
pub mod prometheus;
pub mod validation;

// Re-export core types for convenience
pub use crate::core::*;
