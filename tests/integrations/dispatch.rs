//! Integration tests for the dispatch engine.

use notify_gateway::{
    dispatch::{parse_backends, DispatchError, Dispatcher},
    drivers::{
        testing::{Script, ScriptedDriver},
        RegistryError,
    },
    DriverOutcome, GENERIC_DRIVER_ERROR,
};
use serde_json::json;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::{backends, native_payload, scripted_registry};

fn status(status: bool) -> DriverOutcome {
    DriverOutcome::Status { status }
}

fn error(message: &str) -> DriverOutcome {
    DriverOutcome::Error {
        error: message.to_string(),
    }
}

#[tokio::test]
async fn test_dispatch_to_all_backends_succeeds() {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let beta = ScriptedDriver::delivering("beta", true);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["alpha", "beta"]), ("ops", &["alpha"])]),
        Arc::new(scripted_registry(&[("alpha", &alpha), ("beta", &beta)])),
    );

    let result = dispatcher
        .dispatch(&native_payload(), &parse_backends("oncall,ops"))
        .await
        .unwrap();

    assert_eq!(result.total, 3);
    assert_eq!(result.passed, 3);
    assert_eq!(result.failed, 0);
    assert_eq!(result.errors, 0);
    assert_eq!(result.result["oncall"]["alpha"], status(true));
    assert_eq!(result.result["oncall"]["beta"], status(true));
    assert_eq!(result.result["ops"]["alpha"], status(true));
    assert_eq!(result.payload.region, "eu-west-1");

    // Same driver type with the same configuration: one instance, two calls.
    assert_eq!(alpha.calls(), 2);
    assert_eq!(alpha.constructions(), 1);
}

#[tokio::test]
async fn test_explained_error_does_not_affect_other_drivers() {
    let slack = ScriptedDriver::explaining("slack", "Channel is archived");
    let pager = ScriptedDriver::delivering("pager", false);
    let mail = ScriptedDriver::delivering("mail", true);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["slack", "pager", "mail"])]),
        Arc::new(scripted_registry(&[
            ("slack", &slack),
            ("pager", &pager),
            ("mail", &mail),
        ])),
    );

    let result = dispatcher
        .dispatch(&native_payload(), &parse_backends("oncall"))
        .await
        .unwrap();

    assert_eq!(result.result["oncall"]["slack"], error("Channel is archived"));
    assert_eq!(result.result["oncall"]["pager"], status(false));
    assert_eq!(result.result["oncall"]["mail"], status(true));
    assert_eq!(
        (result.total, result.passed, result.failed, result.errors),
        (3, 1, 1, 1)
    );
}

#[tokio::test]
async fn test_unexpected_errors_are_replaced_by_generic_message() {
    let broken = ScriptedDriver::failing("broken", "connection pool poisoned at 0xdeadbeef");
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["broken"])]),
        Arc::new(scripted_registry(&[("broken", &broken)])),
    );

    let result = dispatcher
        .dispatch(&native_payload(), &parse_backends("oncall"))
        .await
        .unwrap();

    assert_eq!(result.result["oncall"]["broken"], error(GENERIC_DRIVER_ERROR));
    assert_eq!(result.errors, 1);
    let body = serde_json::to_string(&result).unwrap();
    assert!(!body.contains("0xdeadbeef"));
}

#[tokio::test]
async fn test_panicking_driver_is_reported_as_unexpected_error() {
    let crashing = ScriptedDriver::new("crashing", Script::Panic);
    let healthy = ScriptedDriver::delivering("healthy", true);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["crashing", "healthy"])]),
        Arc::new(scripted_registry(&[("crashing", &crashing), ("healthy", &healthy)])),
    );

    let result = dispatcher
        .dispatch(&native_payload(), &parse_backends("oncall"))
        .await
        .unwrap();

    assert_eq!(result.result["oncall"]["crashing"], error(GENERIC_DRIVER_ERROR));
    assert_eq!(result.result["oncall"]["healthy"], status(true));
}

#[tokio::test]
async fn test_hanging_driver_times_out() {
    let stuck = ScriptedDriver::new("stuck", Script::Hang);
    let quick = ScriptedDriver::delivering("quick", true);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["stuck", "quick"])]),
        Arc::new(scripted_registry(&[("stuck", &stuck), ("quick", &quick)])),
    )
    .with_driver_timeout(Some(Duration::from_secs(1)));

    let result = dispatcher
        .dispatch(&native_payload(), &parse_backends("oncall"))
        .await
        .unwrap();

    assert_eq!(result.result["oncall"]["stuck"], error("Timed out after 1s"));
    assert_eq!(result.result["oncall"]["quick"], status(true));
}

#[tokio::test]
async fn test_drivers_are_invoked_concurrently() {
    let delay = Duration::from_millis(400);
    let first = ScriptedDriver::delayed("first", Script::Deliver(true), delay);
    let second = ScriptedDriver::delayed("second", Script::Deliver(true), delay);
    let third = ScriptedDriver::delayed("third", Script::Deliver(true), delay);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["first", "second"]), ("ops", &["third"])]),
        Arc::new(scripted_registry(&[
            ("first", &first),
            ("second", &second),
            ("third", &third),
        ])),
    );

    let started = Instant::now();
    let result = dispatcher
        .dispatch(&native_payload(), &parse_backends("oncall,ops"))
        .await
        .unwrap();

    assert_eq!(result.passed, 3);
    assert!(
        started.elapsed() < delay * 2,
        "dispatch took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_unknown_backends_invoke_nothing() {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["alpha"])]),
        Arc::new(scripted_registry(&[("alpha", &alpha)])),
    );

    let err = dispatcher
        .dispatch(&native_payload(), &parse_backends("zeta,oncall,beta"))
        .await
        .unwrap_err();

    match &err {
        DispatchError::UnknownBackends(names) => {
            assert_eq!(names, &vec!["beta".to_string(), "zeta".to_string()])
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.to_string(), "Unexpected backends: beta, zeta");
    assert_eq!(alpha.calls(), 0);
}

#[tokio::test]
async fn test_invalid_payload_invokes_nothing() {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["alpha"])]),
        Arc::new(scripted_registry(&[("alpha", &alpha)])),
    );

    let mut payload = native_payload();
    payload.as_object_mut().unwrap().remove("region");
    let err = dispatcher
        .dispatch(&payload, &parse_backends("oncall"))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Validation(_)));
    assert_eq!(err.to_string(), "Bad Payload: 'region' is a required property");
    assert_eq!(alpha.calls(), 0);
}

#[tokio::test]
async fn test_construction_failure_invokes_nothing() {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["alpha", "pager"])]),
        Arc::new(scripted_registry(&[("alpha", &alpha)])),
    );

    let err = dispatcher
        .dispatch(&native_payload(), &parse_backends("oncall"))
        .await
        .unwrap_err();

    match err {
        DispatchError::DriverUnavailable { backend, source } => {
            assert_eq!(backend, "oncall");
            assert_eq!(source, RegistryError::UnknownDriverType("pager".to_string()));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(alpha.calls(), 0);
}

#[tokio::test]
async fn test_driver_instances_are_reused_across_dispatches() {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["alpha"]), ("ops", &["alpha"])]),
        Arc::new(scripted_registry(&[("alpha", &alpha)])),
    );

    for _ in 0..3 {
        dispatcher
            .dispatch(&native_payload(), &parse_backends("oncall,ops"))
            .await
            .unwrap();
    }

    assert_eq!(alpha.calls(), 6);
    assert_eq!(alpha.constructions(), 1);
    assert_eq!(dispatcher.cache().len().await, 1);
}

#[tokio::test]
async fn test_empty_backend_set_yields_empty_result() {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["alpha"])]),
        Arc::new(scripted_registry(&[("alpha", &alpha)])),
    );

    let result = dispatcher
        .dispatch(&native_payload(), &parse_backends(""))
        .await
        .unwrap();

    assert!(result.result.is_empty());
    assert_eq!(
        (result.total, result.passed, result.failed, result.errors),
        (0, 0, 0, 0)
    );
    assert_eq!(alpha.calls(), 0);
}

#[tokio::test]
async fn test_unknown_payload_fields_reach_drivers() {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["alpha"])]),
        Arc::new(scripted_registry(&[("alpha", &alpha)])),
    );

    let mut payload = native_payload();
    payload
        .as_object_mut()
        .unwrap()
        .insert("runbook".to_string(), json!("https://wiki/disk"));
    let result = dispatcher
        .dispatch(&payload, &parse_backends("oncall"))
        .await
        .unwrap();

    let delivered = alpha.payloads();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].extra["runbook"], json!("https://wiki/disk"));
    assert_eq!(serde_json::to_value(&result.payload).unwrap(), payload);
}

#[tokio::test]
async fn test_sub_second_timeout_is_reported_precisely() {
    let stuck = ScriptedDriver::new("stuck", Script::Hang);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["stuck"])]),
        Arc::new(scripted_registry(&[("stuck", &stuck)])),
    )
    .with_driver_timeout(Some(Duration::from_millis(200)));

    let result = dispatcher
        .dispatch(&native_payload(), &parse_backends("oncall"))
        .await
        .unwrap();

    assert_eq!(result.result["oncall"]["stuck"], error("Timed out after 200ms"));
}

#[tokio::test]
async fn test_concurrency_limit_bounds_parallel_invocations() {
    let delay = Duration::from_millis(200);
    let first = ScriptedDriver::delayed("first", Script::Deliver(true), delay);
    let second = ScriptedDriver::delayed("second", Script::Deliver(true), delay);
    let third = ScriptedDriver::delayed("third", Script::Deliver(false), delay);
    let dispatcher = Dispatcher::new(
        backends(&[("oncall", &["first", "second", "third"])]),
        Arc::new(scripted_registry(&[
            ("first", &first),
            ("second", &second),
            ("third", &third),
        ])),
    )
    .with_max_concurrency(1);

    let started = Instant::now();
    let result = dispatcher
        .dispatch(&native_payload(), &parse_backends("oncall"))
        .await
        .unwrap();

    // One call at a time: the delays add up.
    assert!(started.elapsed() >= delay * 3, "dispatch took {:?}", started.elapsed());
    assert_eq!(result.result["oncall"]["first"], status(true));
    assert_eq!(result.result["oncall"]["third"], status(false));
    assert_eq!((result.passed, result.failed), (2, 1));
}
