//! Structural validation of inbound payloads.
//!
//! Validation only checks presence and shape of the required fields. Values
//! are never range-checked. A payload that passes validation is converted
//! into its typed form, so downstream code never sees a missing key.

use crate::core::{NativePayload, VendorAlertBatch};
use serde_json::{Map, Value};
use thiserror::Error;

/// Fields every native payload must carry.
pub const NATIVE_REQUIRED_FIELDS: [&str; 6] = [
    "region",
    "severity",
    "description",
    "who",
    "what",
    "affected_hosts",
];

const LABEL_REQUIRED_FIELDS: [&str; 3] = ["region", "severity", "affected_hosts"];
const ALERT_REQUIRED_FIELDS: [&str; 2] = ["description", "summary"];

/// A payload failed structural validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn at(path: &str, message: String) -> Self {
        if path.is_empty() {
            ValidationError(message)
        } else {
            ValidationError(format!("{}: {}", path, message))
        }
    }
}

/// Returns true for bodies that carry nothing to dispatch.
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Validates a native payload and converts it into a `NativePayload`.
pub fn validate_native_payload(value: &Value) -> Result<NativePayload, ValidationError> {
    let object = expect_object(value, "")?;
    for field in NATIVE_REQUIRED_FIELDS {
        match field {
            "affected_hosts" => expect_string_list(object, field, "")?,
            _ => expect_string(object, field, "")?,
        }
    }
    serde_json::from_value(value.clone()).map_err(|e| ValidationError(e.to_string()))
}

/// Validates a vendor alert batch and converts it into a `VendorAlertBatch`.
///
/// Fields outside of the ones the adapter reads are ignored.
pub fn validate_vendor_payload(value: &Value) -> Result<VendorAlertBatch, ValidationError> {
    let object = expect_object(value, "")?;
    let alerts = match object.get("alerts") {
        None => return Err(required("alerts", "")),
        Some(Value::Array(alerts)) => alerts,
        Some(_) => return Err(ValidationError("'alerts' must be a list".to_string())),
    };

    for (i, alert) in alerts.iter().enumerate() {
        let path = format!("alerts[{}]", i);
        let alert = expect_object(alert, &path)?;
        for field in ALERT_REQUIRED_FIELDS {
            expect_string(alert, field, &path)?;
        }

        let labels_path = format!("{}.labels", path);
        let labels = match alert.get("labels") {
            None => return Err(required("labels", &path)),
            Some(labels) => expect_object(labels, &labels_path)?,
        };
        for field in LABEL_REQUIRED_FIELDS {
            match field {
                "affected_hosts" => expect_string_list(labels, field, &labels_path)?,
                _ => expect_string(labels, field, &labels_path)?,
            }
        }
    }

    let batch = VendorAlertBatch {
        alerts: alerts
            .iter()
            .map(|alert| serde_json::from_value(alert.clone()))
            .collect::<Result<_, _>>()
            .map_err(|e| ValidationError(e.to_string()))?,
    };
    Ok(batch)
}

fn required(field: &str, path: &str) -> ValidationError {
    ValidationError::at(path, format!("'{}' is a required property", field))
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ValidationError> {
    value
        .as_object()
        .ok_or_else(|| ValidationError::at(path, "payload must be an object".to_string()))
}

fn expect_string(object: &Map<String, Value>, field: &str, path: &str) -> Result<(), ValidationError> {
    match object.get(field) {
        None => Err(required(field, path)),
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(ValidationError::at(
            path,
            format!("'{}' must be a string", field),
        )),
    }
}

fn expect_string_list(
    object: &Map<String, Value>,
    field: &str,
    path: &str,
) -> Result<(), ValidationError> {
    match object.get(field) {
        None => Err(required(field, path)),
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => Ok(()),
        Some(_) => Err(ValidationError::at(
            path,
            format!("'{}' must be a list of strings", field),
        )),
    }
}
