// src/formatting.rs

use crate::core::NativePayload;

/// A trait for rendering a payload into a single chat message.
pub trait TextFormatter: Send + Sync {
    fn format(&self, payload: &NativePayload) -> String;
}

/// A formatter for Slack that puts the actionable parts first.
pub struct SlackTextFormatter;

impl SlackTextFormatter {
    fn format_headline(&self, payload: &NativePayload) -> String {
        let marker = severity_to_emoji(&payload.severity).unwrap_or(":grey_question:");
        format!(
            "{} *[{}] {}* ({}) reported by {}",
            marker,
            payload.severity.to_uppercase(),
            payload.what,
            payload.region,
            payload.who
        )
    }

    fn format_hosts(&self, hosts: &[String]) -> String {
        match hosts.len() {
            0 => "No affected hosts".to_string(),
            1..=5 => format!("Hosts: {}", hosts.join(", ")),
            n => format!("Hosts: {} (+{} more)", hosts[..5].join(", "), n - 5),
        }
    }
}

impl TextFormatter for SlackTextFormatter {
    fn format(&self, payload: &NativePayload) -> String {
        format!(
            "{}\n{}\n```\n{}\n```",
            self.format_headline(payload),
            self.format_hosts(&payload.affected_hosts),
            payload.description
        )
    }
}

/// Maps well-known severity names to a Slack emoji.
fn severity_to_emoji(severity: &str) -> Option<&'static str> {
    match severity.to_ascii_lowercase().as_str() {
        "critical" | "fatal" => Some(":rotating_light:"),
        "high" | "error" => Some(":red_circle:"),
        "medium" | "warning" | "warn" => Some(":large_orange_circle:"),
        "low" | "info" => Some(":large_blue_circle:"),
        _ => None,
    }
}
