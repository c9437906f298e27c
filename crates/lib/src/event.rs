//! Inbound error event from the monitoring source.
//!
//! The sender's payload is not validated; every field is optional and unknown
//! fields are carried through `extra` so the notifier can re-transmit the
//! event without losing anything the schema does not name.

use serde::{Deserialize, Serialize};

/// Card name used when the event carries no usable title.
pub const DEFAULT_CARD_NAME: &str = "sentry report error";

/// Error event as POSTed by the monitoring source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub event: EventInfo,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Nested event detail; only the title is used by the relay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventInfo {
    /// Title for the created card; missing or empty titles fall back to DEFAULT_CARD_NAME.
    pub fn title_or_default(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => DEFAULT_CARD_NAME,
        }
    }
}
