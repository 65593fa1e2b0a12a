//! Discord webhook message format.

use serde::Serialize;

use super::{AlertEvent, AlertKind};
use crate::clock::format_duration;

pub const DOWN_COLOR: u32 = 0xFF0000;
pub const UP_COLOR: u32 = 0x00FF00;

// Discord rejects embeds whose description exceeds 4096 characters.
const MAX_TRACE_CHARS: usize = 4000;
const MAX_FIELD_CHARS: usize = 1024;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
}

fn field(name: &str, value: impl Into<String>, inline: bool) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: value.into(),
        inline,
    }
}

/// Keep at most `max` characters, marking the cut.
fn excerpt(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(4)).collect();
    cut.push_str("\n...");
    cut
}

/// Build the embed for a transition, as seen from `hostname`.
pub fn build_payload(event: &AlertEvent, hostname: &str) -> WebhookPayload {
    let target = &event.target;

    let mut fields = vec![
        field("Target", target.display_name(), true),
        field("Hostname", hostname, true),
        field("IP", target.address.as_str(), true),
        field("IP Version", target.family.label(), true),
        field("Port", target.port.to_string(), true),
        field("Delay (s)", event.interval.as_secs().to_string(), true),
        field("Timeout (s)", event.timeout.as_secs().to_string(), true),
        field("Status", event.status(), true),
    ];

    let (title, color, description) = match &event.kind {
        AlertKind::Down { error, trace } => {
            fields.push(field("Error", excerpt(error, MAX_FIELD_CHARS), false));
            let description = if trace.is_empty() {
                String::new()
            } else {
                format!("```text\n{}\n```", excerpt(trace, MAX_TRACE_CHARS))
            };
            ("Port monitor alert (DOWN)", DOWN_COLOR, description)
        }
        AlertKind::Up { downtime } => {
            fields.push(field("Downtime", format_duration(*downtime), false));
            ("Port monitor recovery (UP)", UP_COLOR, String::new())
        }
    };

    WebhookPayload {
        content: None,
        embeds: vec![Embed {
            title: title.to_string(),
            description,
            color,
            fields,
            timestamp: event.at.to_rfc3339(),
        }],
    }
}
