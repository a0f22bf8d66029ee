//! Chat widget event model
//!
//! The widget reports every event as a `(type, detail)` pair. Only bot
//! messages (`message_received` carrying a `SEND_MESSAGE` detail) have text
//! worth speaking; everything else is ignored by the adapter.

use serde::{Deserialize, Serialize};

/// Event type for messages delivered to the widget
pub const MESSAGE_RECEIVED: &str = "message_received";

/// Detail type for a text message sent by the bot
pub const SEND_MESSAGE: &str = "SEND_MESSAGE";

/// One event emitted by the chat widget
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WidgetEvent {
    /// Event type (e.g. `message_received`)
    #[serde(rename = "type")]
    pub kind: String,

    /// Event detail, absent for lifecycle events
    #[serde(default)]
    pub detail: Option<EventDetail>,
}

/// Detail attached to a widget event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDetail {
    /// Detail type (e.g. `SEND_MESSAGE`)
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub payload: Option<MessagePayload>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub text: Option<String>,
}

impl WidgetEvent {
    /// Create an event without detail
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: None,
        }
    }

    /// Create a `message_received` / `SEND_MESSAGE` event
    pub fn bot_message(text: impl Into<String>) -> Self {
        Self {
            kind: MESSAGE_RECEIVED.to_string(),
            detail: Some(EventDetail {
                kind: SEND_MESSAGE.to_string(),
                payload: Some(MessagePayload {
                    text: Some(text.into()),
                }),
            }),
        }
    }

    /// Whether this is a bot text message
    pub fn is_bot_message(&self) -> bool {
        self.kind == MESSAGE_RECEIVED
            && self
                .detail
                .as_ref()
                .map(|d| d.kind == SEND_MESSAGE)
                .unwrap_or(false)
    }

    /// Raw text of a bot message, if present and non-empty
    pub fn message_text(&self) -> Option<&str> {
        if !self.is_bot_message() {
            return None;
        }

        self.detail
            .as_ref()
            .and_then(|d| d.payload.as_ref())
            .and_then(|p| p.text.as_deref())
            .filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bot_message() {
        let json = r#"{
            "type": "message_received",
            "detail": {
                "type": "SEND_MESSAGE",
                "payload": { "text": "Hi there", "buttons": [] },
                "id": 17
            }
        }"#;

        let event: WidgetEvent = serde_json::from_str(json).unwrap();
        assert!(event.is_bot_message());
        assert_eq!(event.message_text(), Some("Hi there"));
    }

    #[test]
    fn test_other_detail_type_has_no_text() {
        let json = r#"{
            "type": "message_received",
            "detail": { "type": "SHOW_TYPING", "payload": { "text": "..." } }
        }"#;

        let event: WidgetEvent = serde_json::from_str(json).unwrap();
        assert!(!event.is_bot_message());
        assert_eq!(event.message_text(), None);
    }

    #[test]
    fn test_lifecycle_event_without_detail() {
        let event: WidgetEvent = serde_json::from_str(r#"{"type": "widget_opened"}"#).unwrap();
        assert_eq!(event.kind, "widget_opened");
        assert_eq!(event.message_text(), None);
    }

    #[test]
    fn test_empty_or_missing_text() {
        assert_eq!(WidgetEvent::bot_message("").message_text(), None);

        let json = r#"{"type": "message_received", "detail": {"type": "SEND_MESSAGE"}}"#;
        let event: WidgetEvent = serde_json::from_str(json).unwrap();
        assert!(event.is_bot_message());
        assert_eq!(event.message_text(), None);
    }
}
