//! End-to-end tests of the `/notify` route and the auxiliary endpoints.

use anyhow::Result;
use notify_gateway::{
    config::DriverConfig,
    drivers::testing::ScriptedDriver,
    GENERIC_DRIVER_ERROR,
};
use serde_json::{json, Value};
use std::time::Duration;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::{app::TestAppBuilder, backends, native_payload, scripted_registry};

#[tokio::test]
async fn test_notify_returns_dispatch_result() -> Result<()> {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let beta = ScriptedDriver::failing("beta", "boom");
    let app = TestAppBuilder::new()
        .with_backends(backends(&[("oncall", &["alpha", "beta"]), ("ops", &["alpha"])]))
        .with_registry(scripted_registry(&[("alpha", &alpha), ("beta", &beta)]))
        .build()
        .await?;

    let response = app.post_json("/notify/oncall,ops", &native_payload()).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["payload"], native_payload());
    assert_eq!(
        body["result"],
        json!({
            "oncall": {
                "alpha": { "status": true },
                "beta": { "error": GENERIC_DRIVER_ERROR }
            },
            "ops": { "alpha": { "status": true } }
        })
    );
    assert_eq!(body["total"], 3);
    assert_eq!(body["passed"], 2);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["errors"], 1);

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_notify_parses_body_without_json_content_type() -> Result<()> {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let app = TestAppBuilder::new()
        .with_backends(backends(&[("oncall", &["alpha"])]))
        .with_registry(scripted_registry(&[("alpha", &alpha)]))
        .build()
        .await?;

    let response = app
        .post_raw(
            "/notify/oncall",
            r#"{"region":"eu","severity":"low","description":"d","who":"ci","what":"w","affected_hosts":[]}"#,
        )
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(alpha.calls(), 1);

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_notify_rejects_missing_payload() -> Result<()> {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let app = TestAppBuilder::new()
        .with_backends(backends(&[("oncall", &["alpha"])]))
        .with_registry(scripted_registry(&[("alpha", &alpha)]))
        .build()
        .await?;

    for body in ["", "{}", "null", "not json", "0", "0.0", "false"] {
        let response = app.post_raw("/notify/oncall", body).await;
        assert_eq!(response.status(), 400, "body {:?}", body);
        assert_eq!(
            response.json::<Value>().await?,
            json!({ "error": "Missed Payload" })
        );
    }
    assert_eq!(alpha.calls(), 0);

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_notify_rejects_bad_payload() -> Result<()> {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let app = TestAppBuilder::new()
        .with_backends(backends(&[("oncall", &["alpha"])]))
        .with_registry(scripted_registry(&[("alpha", &alpha)]))
        .build()
        .await?;

    let mut payload = native_payload();
    payload["affected_hosts"] = json!("db-1");
    let response = app.post_json("/notify/oncall", &payload).await;

    assert_eq!(response.status(), 400);
    assert_eq!(
        response.json::<Value>().await?,
        json!({ "error": "Bad Payload: 'affected_hosts' must be a list of strings" })
    );
    assert_eq!(alpha.calls(), 0);

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_notify_rejects_unknown_backends() -> Result<()> {
    let alpha = ScriptedDriver::delivering("alpha", true);
    let app = TestAppBuilder::new()
        .with_backends(backends(&[("oncall", &["alpha"])]))
        .with_registry(scripted_registry(&[("alpha", &alpha)]))
        .build()
        .await?;

    let response = app.post_json("/notify/oncall,missing", &native_payload()).await;

    assert_eq!(response.status(), 400);
    assert_eq!(
        response.json::<Value>().await?,
        json!({ "error": "Unexpected backends: missing" })
    );
    assert_eq!(alpha.calls(), 0);

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_misconfigured_driver_fails_request() -> Result<()> {
    let mut backends = backends(&[("ops", &["log"])]);
    backends
        .get_mut("ops")
        .unwrap()
        .insert("slack".to_string(), DriverConfig::new().with("channel", "#ops"));
    let app = TestAppBuilder::new()
        .with_backends(backends)
        .build()
        .await?;

    let response = app.post_json("/notify/ops", &native_payload()).await;

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await?;
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Backend 'ops'"), "{}", message);
    assert!(message.contains("webhook_url"), "{}", message);

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_builtin_log_driver_delivers() -> Result<()> {
    let app = TestAppBuilder::new()
        .with_backends(backends(&[("smoke", &["log"])]))
        .build()
        .await?;

    let response = app.post_json("/notify/smoke", &native_payload()).await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["result"]["smoke"]["log"], json!({ "status": true }));

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_healthz() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;

    let response = app.client.get(app.url("/healthz")).send().await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await?, json!({ "status": "ok" }));

    // Metrics are disabled by default.
    let response = app.client.get(app.url("/metrics")).send().await?;
    assert_eq!(response.status(), 404);

    app.shutdown(Duration::from_secs(5)).await
}
