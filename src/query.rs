//! One-shot queries: [`query()`] is the simple entry point for a single
//! prompt/response exchange.
//!
//! Internally this is a router, not a separate transport. A query that
//! configures none of hooks, a permission callback, an in-process MCP
//! server, a non-default permission mode, or an explicit agent set never
//! needs the bidirectional control protocol, so it talks to the CLI over the
//! plain one-shot streaming path: a single prompt record, stdout read to the
//! final `result` message, no control-request round-trips possible. As soon
//! as any of those features are configured, the CLI may send `hook_callback`,
//! `can_use_tool`, or `mcp_message` control requests mid-turn and something
//! has to answer them, so the router falls back to a full
//! [`ClaudeSDKClient`] under the hood and just drives it for a single turn.
//! [`crate::types::PreferredTransport`] overrides this inference either way.

use futures::Stream;

use crate::client::ClaudeSDKClient;
use crate::error::Result;
use crate::message::parse_message;
use crate::transport::{PromptInput, SubprocessTransport, Transport};
use crate::types::{
    ClaudeAgentOptions, McpServerConfig, McpServers, Message, PermissionMode, PreferredTransport,
};

/// Run a single prompt against Claude Code and stream back the response.
///
/// Picks the cheapest transport that can serve the request: plain CLI
/// one-shot mode when no hooks or permission callback are configured, or a
/// full [`ClaudeSDKClient`] when the CLI might need to call back into the
/// process mid-turn.
///
/// The returned stream yields every message the CLI emits and ends after the
/// terminal `result` message (or when the underlying transport closes).
///
/// # Errors
/// Returns an error if the CLI cannot be found or the initial connection
/// fails.
pub async fn query(
    prompt: impl Into<String>,
    options: Option<ClaudeAgentOptions>,
) -> Result<impl Stream<Item = Result<Message>>> {
    let prompt = prompt.into();
    let options = options.unwrap_or_default();

    if needs_control_protocol(&options) {
        query_via_control_client(prompt, options).await
    } else {
        query_via_cli_only(prompt, options).await
    }
}

/// Router predicate: true iff the CLI might send a control request mid-turn
/// that something needs to answer (a hook, a permission callback, an
/// in-process MCP server), or permission mode/agent selection diverge from
/// the defaults the CLI-only path assumes. Pure and O(1) over `options`;
/// `preferred_transport` overrides the inference either way.
fn needs_control_protocol(options: &ClaudeAgentOptions) -> bool {
    match options.preferred_transport {
        Some(PreferredTransport::Cli) => return false,
        Some(PreferredTransport::Control) => return true,
        None => {}
    }

    let hooks_configured = options.hooks.as_ref().is_some_and(|h| !h.is_empty());
    let mcp_configured = matches!(&options.mcp_servers, McpServers::Dict(servers)
        if servers.values().any(|c| matches!(c, McpServerConfig::Sdk(_))));
    let non_default_permission_mode = options
        .permission_mode
        .is_some_and(|mode| mode != PermissionMode::Default);

    hooks_configured
        || options.can_use_tool.is_some()
        || mcp_configured
        || non_default_permission_mode
        || options.agents.is_some()
}

async fn query_via_cli_only(
    prompt: String,
    options: ClaudeAgentOptions,
) -> Result<impl Stream<Item = Result<Message>>> {
    let mut transport = SubprocessTransport::new(PromptInput::String(prompt), options, None)?;
    transport.connect().await?;

    Ok(async_stream::stream! {
        let mut rx = transport.read_messages();
        while let Some(raw) = rx.recv().await {
            match raw {
                Ok(value) => {
                    let message = parse_message(value);
                    let is_result = matches!(message, Ok(Message::Result { .. }));
                    yield message;
                    if is_result {
                        break;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
        let _ = transport.close().await;
    })
}

async fn query_via_control_client(
    prompt: String,
    options: ClaudeAgentOptions,
) -> Result<impl Stream<Item = Result<Message>>> {
    let mut client = ClaudeSDKClient::new(options, None).await?;
    client.send_message(prompt).await?;

    Ok(async_stream::stream! {
        while let Some(result) = client.next_message().await {
            let is_result = matches!(&result, Ok(Message::Result { .. }));
            yield result;
            if is_result {
                break;
            }
        }
        let _ = client.close().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_options_use_the_cli_only_path() {
        let options = ClaudeAgentOptions::default();
        assert!(!needs_control_protocol(&options));
    }

    #[tokio::test]
    async fn hooks_force_the_control_client_path() {
        use crate::hooks::HookMatcherBuilder;
        use crate::types::HookEvent;
        use std::collections::HashMap;

        let hook = crate::hooks::HookManager::callback(|_data, _tool, _ctx| async move {
            Ok(crate::types::HookOutput::default())
        });
        let matcher = HookMatcherBuilder::new(Some("*")).add_hook(hook).build();
        let mut hooks = HashMap::new();
        hooks.insert(HookEvent::PreToolUse, vec![matcher]);

        let options = ClaudeAgentOptions::builder().hooks(hooks).build();
        assert!(needs_control_protocol(&options));
    }

    #[test]
    fn can_use_tool_forces_the_control_client_path() {
        let callback = crate::PermissionManager::callback(|_n, _i, _c| async move {
            Ok(crate::types::PermissionResult::Allow(
                crate::types::PermissionResultAllow {
                    updated_input: None,
                    updated_permissions: None,
                },
            ))
        });
        let options = ClaudeAgentOptions::builder().can_use_tool(callback).build();
        assert!(needs_control_protocol(&options));
    }
}
