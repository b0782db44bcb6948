//! Control protocol: envelopes, request/response correlation, and CLI-initiated
//! callback dispatch.
//!
//! The CLI subprocess and the SDK exchange two kinds of traffic over the same
//! line-delimited JSON stream as conversation messages:
//!
//! - SDK-initiated control requests (`interrupt`, `set_permission_mode`, ...),
//!   acknowledged by a `control_response` carrying the same `request_id`.
//! - CLI-initiated control requests (`hook_callback`, `can_use_tool`,
//!   `mcp_message`), which the SDK must answer with its own `control_response`
//!   echoing the CLI's `request_id`.
//!
//! `ProtocolHandler` owns the correlation state for both directions and the
//! classification logic that tells a control envelope apart from a regular
//! `Message`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::error::{ClaudeError, Result};
use crate::types::{HookEvent, PermissionRequest, PermissionResult, RequestId, ToolPermissionContext};

/// Default timeout for an SDK-initiated control request awaiting its `control_response`.
pub const CONTROL_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// An outbound control request, or a reply the SDK is sending back for a
/// CLI-initiated request.
#[derive(Debug, Clone)]
pub enum ControlRequest {
    /// Interrupt the current turn.
    Interrupt {
        /// Correlation id; filled in by the writer if `None`.
        request_id: Option<String>,
    },
    /// Send a user message through the control channel.
    SendMessage {
        /// Message content.
        content: String,
        /// Correlation id.
        request_id: Option<String>,
    },
    /// Switch model for the session.
    SetModel {
        /// New model name.
        model: String,
        /// Correlation id.
        request_id: Option<String>,
    },
    /// Switch permission mode for the session.
    SetPermissionMode {
        /// New mode.
        mode: crate::types::PermissionMode,
        /// Correlation id.
        request_id: Option<String>,
    },
    /// Adjust max thinking tokens for the session.
    SetMaxThinkingTokens {
        /// New budget.
        max_thinking_tokens: u32,
        /// Correlation id.
        request_id: Option<String>,
    },
    /// Reply to a `hook_callback` request the CLI sent us.
    HookResponse {
        /// The CLI's `request_id` this replies to.
        request_id: String,
        /// Serialized `HookOutput`.
        response: Value,
    },
    /// Reply to a `can_use_tool` request the CLI sent us.
    PermissionResponse {
        /// The CLI's `request_id` this replies to.
        request_id: String,
        /// Permission decision.
        result: PermissionResult,
    },
    /// Reply to an `mcp_message` request the CLI sent us.
    McpResponse {
        /// The CLI's `request_id` this replies to.
        request_id: String,
        /// The raw JSON-RPC response produced by the in-process MCP server.
        response: Value,
    },
}

/// Payload of a CLI-originated `control_response` (reply to something we sent).
#[derive(Debug, Clone)]
pub struct ControlResponsePayload {
    /// Correlation id matching our original request.
    pub request_id: String,
    /// `"success"` or `"error"`.
    pub subtype: String,
    /// Response payload on success.
    pub response: Option<Value>,
    /// Error message on failure.
    pub error: Option<String>,
}

/// Payload of a CLI-originated `control_request` (the CLI asking us something).
#[derive(Debug, Clone)]
pub struct ControlRequestPayload {
    /// Correlation id we must echo back in our reply.
    pub request_id: String,
    /// `"hook_callback"`, `"can_use_tool"`, or `"mcp_message"`.
    pub subtype: String,
    /// Raw request body.
    pub raw: Value,
}

/// Handshake acknowledgement payload (bidirectional `initialize` exchange).
#[derive(Debug, Clone)]
pub struct InitResponsePayload {
    /// Raw handshake result (capabilities, commands, etc).
    pub data: Value,
}

/// A parsed control-plane envelope, distinct from a conversation `Message`.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// The CLI's reply to our own `initialize` handshake request.
    InitResponse(InitResponsePayload),
    /// The CLI's reply to an SDK-initiated control request.
    Response(ControlResponsePayload),
    /// A CLI-initiated control request.
    Request(ControlRequestPayload),
    /// The CLI's own `initialize` control request (server-mode handshake).
    Init(Value),
}

/// A resolved CLI-initiated hook callback, ready for `HookManager::invoke`.
#[derive(Debug, Clone)]
pub struct HookCallbackRequest {
    /// Correlation id to echo back in the response.
    pub request_id: String,
    /// Which hook event this is.
    pub event: HookEvent,
    /// Event data to pass to the callback.
    pub event_data: Value,
    /// Tool name, if this hook event is tool-scoped.
    pub tool_name: Option<String>,
}

/// Owns control-protocol correlation state: pending SDK-initiated requests,
/// the monotonic id counter, and the channels used to hand CLI-initiated
/// hook/permission requests off to their handler tasks.
pub struct ProtocolHandler {
    initialized: AtomicBool,
    request_counter: AtomicU64,
    pending: Mutex<HashMap<String, oneshot::Sender<ControlResponsePayload>>>,
    hook_tx: Option<mpsc::UnboundedSender<HookCallbackRequest>>,
    permission_tx: Option<mpsc::UnboundedSender<(RequestId, PermissionRequest)>>,
    mcp_tx: Option<mpsc::UnboundedSender<(String, Value)>>,
}

impl ProtocolHandler {
    /// Create a new, uninitialized protocol handler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            request_counter: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            hook_tx: None,
            permission_tx: None,
            mcp_tx: None,
        }
    }

    /// Wire up the channel that delivers CLI-initiated hook callbacks.
    pub fn set_hook_channel(&mut self, tx: mpsc::UnboundedSender<HookCallbackRequest>) {
        self.hook_tx = Some(tx);
    }

    /// Wire up the channel that delivers CLI-initiated permission requests.
    pub fn set_permission_channel(
        &mut self,
        tx: mpsc::UnboundedSender<(RequestId, PermissionRequest)>,
    ) {
        self.permission_tx = Some(tx);
    }

    /// Wire up the channel that delivers CLI-initiated `mcp_message` requests.
    pub fn set_mcp_channel(&mut self, tx: mpsc::UnboundedSender<(String, Value)>) {
        self.mcp_tx = Some(tx);
    }

    /// Mark the handshake as complete (or bypass it, for CLIs that don't use one).
    pub fn set_initialized(&self, value: bool) {
        self.initialized.store(value, Ordering::SeqCst);
    }

    /// Whether the handshake has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Generate a monotonic request id in the CLI's expected format.
    pub fn generate_request_id(&self) -> String {
        let n = self.request_counter.fetch_add(1, Ordering::SeqCst);
        let suffix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
            ^ u128::from(std::process::id());
        format!("req_{n}_{suffix:x}")
    }

    /// Classify a raw JSON line as a control envelope, or reject it so the
    /// caller can fall back to `message::parse_message`.
    ///
    /// # Errors
    /// Returns an error if the value's `type` field is not a recognized
    /// control envelope type.
    pub fn deserialize_message(&self, raw: &str) -> Result<ControlMessage> {
        let value: Value = serde_json::from_str(raw)?;
        self.classify(value)
    }

    fn classify(&self, value: Value) -> Result<ControlMessage> {
        let msg_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ClaudeError::control_protocol("missing type field"))?;

        match msg_type {
            "control_response" => {
                let response = value
                    .get("response")
                    .cloned()
                    .ok_or_else(|| ClaudeError::control_protocol("missing response field"))?;
                let request_id = response
                    .get("request_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ClaudeError::control_protocol("missing request_id"))?
                    .to_string();
                let subtype = response
                    .get("subtype")
                    .and_then(Value::as_str)
                    .unwrap_or("success")
                    .to_string();
                let payload = ControlResponsePayload {
                    request_id,
                    error: response
                        .get("error")
                        .and_then(Value::as_str)
                        .map(String::from),
                    response: response.get("response").cloned(),
                    subtype,
                };
                Ok(ControlMessage::Response(payload))
            }
            "control_request" => {
                let request_id = value
                    .get("request_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ClaudeError::control_protocol("missing request_id"))?
                    .to_string();
                let request = value
                    .get("request")
                    .cloned()
                    .ok_or_else(|| ClaudeError::control_protocol("missing request field"))?;
                let subtype = request
                    .get("subtype")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(ControlMessage::Request(ControlRequestPayload {
                    request_id,
                    subtype,
                    raw: request,
                }))
            }
            other => Err(ClaudeError::control_protocol(format!(
                "not a control envelope: {other}"
            ))),
        }
    }

    /// Resolve the oneshot waiter for an SDK-initiated request, if one is registered.
    ///
    /// # Errors
    /// Propagates nothing on its own; logs and ignores unmatched ids, since
    /// fire-and-forget requests (interrupt, `set_model`) don't always register a waiter.
    pub async fn handle_response(&self, response: ControlResponsePayload) -> Result<()> {
        let mut pending = self.pending.lock().await;
        if let Some(tx) = pending.remove(&response.request_id) {
            let _ = tx.send(response);
        } else {
            tracing::trace!(request_id = %response.request_id, "control_response for unknown/fire-and-forget request");
        }
        Ok(())
    }

    /// Handle the handshake acknowledgement.
    ///
    /// # Errors
    /// Currently infallible; kept fallible for symmetry with `handle_response`.
    pub fn handle_init_response(&self, _response: &InitResponsePayload) -> Result<()> {
        self.set_initialized(true);
        Ok(())
    }

    /// Route a CLI-initiated control request to the appropriate handler channel.
    ///
    /// Unroutable subtypes (unknown, or channel not configured) are dropped
    /// with a warning rather than erroring the connection.
    pub async fn dispatch_incoming_request(&self, request: ControlRequestPayload) {
        match request.subtype.as_str() {
            "hook_callback" => {
                let Some(ref tx) = self.hook_tx else {
                    tracing::warn!("received hook_callback but no hook channel is configured");
                    return;
                };
                match Self::parse_hook_callback(&request) {
                    Ok(parsed) => {
                        let _ = tx.send(parsed);
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to parse hook_callback request"),
                }
            }
            "can_use_tool" => {
                let Some(ref tx) = self.permission_tx else {
                    tracing::warn!("received can_use_tool but no permission channel is configured");
                    return;
                };
                match Self::parse_permission_request(&request) {
                    Ok((request_id, req)) => {
                        let _ = tx.send((request_id, req));
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to parse can_use_tool request"),
                }
            }
            "mcp_message" => {
                let Some(ref tx) = self.mcp_tx else {
                    tracing::warn!("received mcp_message but no MCP channel is configured");
                    return;
                };
                let _ = tx.send((request.request_id.clone(), request.raw.clone()));
            }
            other => {
                tracing::debug!(subtype = other, "unhandled CLI-initiated control request");
            }
        }
    }

    fn parse_hook_callback(request: &ControlRequestPayload) -> Result<HookCallbackRequest> {
        let event_name = request
            .raw
            .get("hook_event_name")
            .or_else(|| request.raw.get("event"))
            .and_then(Value::as_str)
            .ok_or_else(|| ClaudeError::hook("hook_callback missing hook_event_name"))?;
        let event: HookEvent = serde_json::from_value(Value::String(event_name.to_string()))
            .map_err(|e| ClaudeError::hook(format!("unknown hook event '{event_name}': {e}")))?;
        let tool_name = request
            .raw
            .get("tool_name")
            .and_then(Value::as_str)
            .map(String::from);
        let event_data = request
            .raw
            .get("input")
            .or_else(|| request.raw.get("event_data"))
            .cloned()
            .unwrap_or_else(|| request.raw.clone());
        Ok(HookCallbackRequest {
            request_id: request.request_id.clone(),
            event,
            event_data,
            tool_name,
        })
    }

    fn parse_permission_request(
        request: &ControlRequestPayload,
    ) -> Result<(RequestId, PermissionRequest)> {
        let tool_name = request
            .raw
            .get("tool_name")
            .and_then(Value::as_str)
            .ok_or_else(|| ClaudeError::hook("can_use_tool missing tool_name"))?
            .to_string();
        let tool_input = request
            .raw
            .get("input")
            .or_else(|| request.raw.get("tool_input"))
            .cloned()
            .unwrap_or(Value::Null);
        let suggestions = request
            .raw
            .get("permission_suggestions")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        let context = ToolPermissionContext::new(suggestions);
        Ok((
            RequestId::from(request.request_id.clone()),
            PermissionRequest {
                tool_name: crate::types::ToolName::from(tool_name),
                tool_input,
                context,
            },
        ))
    }

    /// Build an `Interrupt` request for the writer to send.
    #[must_use]
    pub fn create_interrupt_request(&self) -> ControlRequest {
        ControlRequest::Interrupt { request_id: None }
    }

    /// Build a reply for a `hook_callback` request.
    #[must_use]
    pub fn create_hook_response(&self, request_id: String, response: Value) -> ControlRequest {
        ControlRequest::HookResponse {
            request_id,
            response,
        }
    }

    /// Build a reply for a `can_use_tool` request.
    #[must_use]
    pub fn create_permission_response(
        &self,
        request_id: RequestId,
        result: PermissionResult,
    ) -> ControlRequest {
        ControlRequest::PermissionResponse {
            request_id: request_id.to_string(),
            result,
        }
    }

    /// Build a reply for an `mcp_message` request.
    #[must_use]
    pub fn create_mcp_response(&self, request_id: String, response: Value) -> ControlRequest {
        ControlRequest::McpResponse {
            request_id,
            response,
        }
    }

    /// Register a oneshot waiter for an SDK-initiated request and return its id.
    pub async fn register_pending(&self, request_id: String) -> oneshot::Receiver<ControlResponsePayload> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id, tx);
        rx
    }

    /// Drop all pending waiters, failing them with a connection-closed error.
    ///
    /// Called during `close()` so in-flight `await_response` callers don't hang forever.
    pub async fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        pending.clear();
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a `ControlRequest` destined for the CLI into its wire envelope,
/// assigning a fresh id to request variants that don't carry one yet.
#[must_use]
pub fn encode_control_request(protocol: &ProtocolHandler, request: ControlRequest) -> Value {
    match request {
        ControlRequest::Interrupt { request_id } => serde_json::json!({
            "type": "control_request",
            "request_id": request_id.unwrap_or_else(|| protocol.generate_request_id()),
            "request": {"subtype": "interrupt"},
        }),
        ControlRequest::SendMessage { content, request_id } => serde_json::json!({
            "type": "control_request",
            "request_id": request_id.unwrap_or_else(|| protocol.generate_request_id()),
            "request": {
                "subtype": "send_message",
                "message": {"role": "user", "content": content},
            },
        }),
        ControlRequest::SetModel { model, request_id } => serde_json::json!({
            "type": "control_request",
            "request_id": request_id.unwrap_or_else(|| protocol.generate_request_id()),
            "request": {"subtype": "set_model", "model": model},
        }),
        ControlRequest::SetPermissionMode { mode, request_id } => serde_json::json!({
            "type": "control_request",
            "request_id": request_id.unwrap_or_else(|| protocol.generate_request_id()),
            "request": {"subtype": "set_permission_mode", "mode": mode},
        }),
        ControlRequest::SetMaxThinkingTokens {
            max_thinking_tokens,
            request_id,
        } => serde_json::json!({
            "type": "control_request",
            "request_id": request_id.unwrap_or_else(|| protocol.generate_request_id()),
            "request": {
                "subtype": "set_max_thinking_tokens",
                "max_thinking_tokens": max_thinking_tokens,
            },
        }),
        ControlRequest::HookResponse {
            request_id,
            response,
        } => serde_json::json!({
            "type": "control_response",
            "response": {
                "subtype": "success",
                "request_id": request_id,
                "response": response,
            },
        }),
        ControlRequest::PermissionResponse { request_id, result } => serde_json::json!({
            "type": "control_response",
            "response": {
                "subtype": "success",
                "request_id": request_id,
                "response": result,
            },
        }),
        ControlRequest::McpResponse {
            request_id,
            response,
        } => serde_json::json!({
            "type": "control_response",
            "response": {
                "subtype": "success",
                "request_id": request_id,
                "response": response,
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_control_response() {
        let handler = ProtocolHandler::new();
        let raw = serde_json::json!({
            "type": "control_response",
            "response": {"subtype": "success", "request_id": "req_0_1", "response": {"ok": true}},
        })
        .to_string();

        match handler.deserialize_message(&raw).unwrap() {
            ControlMessage::Response(payload) => {
                assert_eq!(payload.request_id, "req_0_1");
                assert_eq!(payload.subtype, "success");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn classifies_control_request() {
        let handler = ProtocolHandler::new();
        let raw = serde_json::json!({
            "type": "control_request",
            "request_id": "req_1",
            "request": {"subtype": "can_use_tool", "tool_name": "Bash"},
        })
        .to_string();

        match handler.deserialize_message(&raw).unwrap() {
            ControlMessage::Request(payload) => {
                assert_eq!(payload.subtype, "can_use_tool");
                assert_eq!(payload.request_id, "req_1");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_control_messages() {
        let handler = ProtocolHandler::new();
        let raw = serde_json::json!({"type": "assistant"}).to_string();
        assert!(handler.deserialize_message(&raw).is_err());
    }

    #[test]
    fn request_ids_are_monotonic_and_unique() {
        let handler = ProtocolHandler::new();
        let a = handler.generate_request_id();
        let b = handler.generate_request_id();
        assert_ne!(a, b);
        assert!(a.starts_with("req_0_"));
        assert!(b.starts_with("req_1_"));
    }

    #[tokio::test]
    async fn handle_response_resolves_pending_waiter() {
        let handler = ProtocolHandler::new();
        let rx = handler.register_pending("req_x".to_string()).await;
        handler
            .handle_response(ControlResponsePayload {
                request_id: "req_x".to_string(),
                subtype: "success".to_string(),
                response: Some(serde_json::json!({"done": true})),
                error: None,
            })
            .await
            .unwrap();
        let resolved = rx.await.unwrap();
        assert_eq!(resolved.request_id, "req_x");
    }
}
