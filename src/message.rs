//! Message parsing: turning a raw JSON line from the CLI into a typed [`Message`].
//!
//! The CLI's stream-json output carries a `stream_event` wrapper around
//! partial-message deltas when `include_partial_messages` is enabled; every
//! other line is a complete message tagged by its `type` field. Parsing never
//! inspects control envelopes — those are intercepted and consumed by
//! [`crate::control::ProtocolHandler`] before a line ever reaches this module.

use serde_json::Value;

use crate::error::{ClaudeError, Result};
use crate::types::Message;

/// Parse a raw JSON value from the CLI into a [`Message`].
///
/// # Errors
/// Returns [`ClaudeError::MessageParse`] if the value's `type` field is
/// missing, unrecognized, or the payload doesn't match the expected shape for
/// its type.
pub fn parse_message(value: Value) -> Result<Message> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ClaudeError::message_parse("missing 'type' field", Some(value.clone())))?
        .to_string();

    serde_json::from_value(value.clone()).map_err(|e| {
        ClaudeError::message_parse(format!("failed to parse '{kind}' message: {e}"), Some(value))
    })
}

/// The `kind` a [`Message`] reports for logging/dispatch purposes, independent
/// of the nested content-block variants carried inside `User`/`Assistant`.
#[must_use]
pub fn message_kind(message: &Message) -> &'static str {
    match message {
        Message::User { .. } => "user",
        Message::Assistant { .. } => "assistant",
        Message::System { .. } => "system",
        Message::Result { .. } => "result",
        Message::StreamEvent { .. } => "stream_event",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_system_init_message() {
        let raw = serde_json::json!({
            "type": "system",
            "subtype": "init",
            "session_id": "session_123",
            "model": "claude-sonnet-4-20250514",
        });
        let msg = parse_message(raw).unwrap();
        assert_eq!(message_kind(&msg), "system");
    }

    #[test]
    fn parses_result_message() {
        let raw = serde_json::json!({
            "type": "result",
            "subtype": "success",
            "duration_ms": 100,
            "duration_api_ms": 80,
            "is_error": false,
            "num_turns": 1,
            "session_id": "session_123",
        });
        let msg = parse_message(raw).unwrap();
        assert!(matches!(msg, Message::Result { .. }));
    }

    #[test]
    fn rejects_missing_type() {
        let raw = serde_json::json!({"foo": "bar"});
        assert!(parse_message(raw).is_err());
    }

    #[test]
    fn rejects_unknown_type() {
        let raw = serde_json::json!({"type": "not_a_real_message_type"});
        assert!(parse_message(raw).is_err());
    }
}
