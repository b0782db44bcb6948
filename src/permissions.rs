//! Permission control for tool execution.
//!
//! `PermissionManager` sits in front of the single user-supplied
//! [`CanUseToolCallback`], applying the allow/disallow tool lists from
//! [`crate::types::ClaudeAgentOptions`] before ever invoking it. This mirrors
//! the CLI's own layering: static lists are cheap and checked first, the
//! callback is the expensive/interactive fallback.

use std::sync::Arc;

use crate::callbacks::PermissionCallback;
use crate::error::Result;
use crate::types::{
    CanUseToolCallback, PermissionResult, PermissionResultAllow, PermissionResultDeny, ToolName,
    ToolPermissionContext,
};

/// Coordinates allow/disallow lists and the user's permission callback.
pub struct PermissionManager {
    callback: Option<CanUseToolCallback>,
    allowed_tools: Option<Vec<ToolName>>,
    disallowed_tools: Vec<ToolName>,
}

impl PermissionManager {
    /// Create a manager with no callback and no restrictions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            callback: None,
            allowed_tools: None,
            disallowed_tools: Vec::new(),
        }
    }

    /// Set the user-supplied permission callback.
    pub fn set_callback(&mut self, callback: CanUseToolCallback) {
        self.callback = Some(callback);
    }

    /// Restrict tool use to this allowlist. `None` means no restriction.
    pub fn set_allowed_tools(&mut self, tools: Option<Vec<ToolName>>) {
        self.allowed_tools = tools;
    }

    /// Deny these tools outright, before the callback ever runs.
    pub fn set_disallowed_tools(&mut self, tools: Vec<ToolName>) {
        self.disallowed_tools = tools;
    }

    /// Decide whether `tool_name` may run with `tool_input`.
    ///
    /// Checks the disallow list, then the allow list (if set), then falls
    /// through to the user callback. With no callback configured, unlisted
    /// tools are allowed by default — matching the CLI's own permissive
    /// default when no `can_use_tool` hook is registered.
    ///
    /// # Errors
    /// Propagates errors raised by the user's permission callback.
    pub async fn can_use_tool(
        &self,
        tool_name: ToolName,
        tool_input: serde_json::Value,
        context: ToolPermissionContext,
    ) -> Result<PermissionResult> {
        if self.disallowed_tools.contains(&tool_name) {
            return Ok(PermissionResult::Deny(PermissionResultDeny {
                message: format!("Tool '{tool_name}' is in the disallowed list"),
                interrupt: false,
            }));
        }

        if let Some(ref allowed) = self.allowed_tools {
            if !allowed.is_empty() && !allowed.contains(&tool_name) {
                return Ok(PermissionResult::Deny(PermissionResultDeny {
                    message: format!("Tool '{tool_name}' is not in the allowed list"),
                    interrupt: false,
                }));
            }
        }

        match &self.callback {
            Some(callback) => {
                callback
                    .call(tool_name.to_string(), tool_input, context)
                    .await
            }
            None => Ok(PermissionResult::Allow(PermissionResultAllow {
                updated_input: None,
                updated_permissions: None,
            })),
        }
    }

    /// Create a [`CanUseToolCallback`] from a closure.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use anthropic_agent_sdk::PermissionManager;
    /// use anthropic_agent_sdk::types::{PermissionResult, PermissionResultAllow};
    ///
    /// let callback = PermissionManager::callback(|_tool_name, _input, _ctx| async move {
    ///     Ok(PermissionResult::Allow(PermissionResultAllow {
    ///         updated_input: None,
    ///         updated_permissions: None,
    ///     }))
    /// });
    /// ```
    pub fn callback<F, Fut>(f: F) -> CanUseToolCallback
    where
        F: Fn(String, serde_json::Value, ToolPermissionContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<PermissionResult>> + Send + 'static,
    {
        Arc::new(crate::callbacks::FnPermissionCallback::new(
            move |tool_name, input, context| Box::pin(f(tool_name, input, context)),
        ))
    }
}

impl Default for PermissionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`PermissionManager`].
#[derive(Default)]
pub struct PermissionManagerBuilder {
    callback: Option<CanUseToolCallback>,
    allowed_tools: Option<Vec<ToolName>>,
    disallowed_tools: Vec<ToolName>,
}

impl PermissionManagerBuilder {
    /// Start a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the permission callback.
    #[must_use]
    pub fn callback(mut self, callback: CanUseToolCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Set the tool allowlist.
    #[must_use]
    pub fn allowed_tools(mut self, tools: Vec<ToolName>) -> Self {
        self.allowed_tools = Some(tools);
        self
    }

    /// Set the tool denylist.
    #[must_use]
    pub fn disallowed_tools(mut self, tools: Vec<ToolName>) -> Self {
        self.disallowed_tools = tools;
        self
    }

    /// Build the manager.
    #[must_use]
    pub fn build(self) -> PermissionManager {
        PermissionManager {
            callback: self.callback,
            allowed_tools: self.allowed_tools,
            disallowed_tools: self.disallowed_tools,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disallowed_tool_is_denied_before_callback_runs() {
        let mut manager = PermissionManager::new();
        manager.set_disallowed_tools(vec![ToolName::from("Bash")]);
        manager.set_callback(PermissionManager::callback(|_n, _i, _c| async move {
            panic!("callback should not run for disallowed tools");
        }));

        let result = manager
            .can_use_tool(
                ToolName::from("Bash"),
                serde_json::json!({}),
                ToolPermissionContext::new(vec![]),
            )
            .await
            .unwrap();
        assert!(matches!(result, PermissionResult::Deny(_)));
    }

    #[tokio::test]
    async fn allowed_list_restricts_to_named_tools() {
        let mut manager = PermissionManager::new();
        manager.set_allowed_tools(Some(vec![ToolName::from("Read")]));

        let result = manager
            .can_use_tool(
                ToolName::from("Write"),
                serde_json::json!({}),
                ToolPermissionContext::new(vec![]),
            )
            .await
            .unwrap();
        assert!(matches!(result, PermissionResult::Deny(_)));

        let result = manager
            .can_use_tool(
                ToolName::from("Read"),
                serde_json::json!({}),
                ToolPermissionContext::new(vec![]),
            )
            .await
            .unwrap();
        assert!(matches!(result, PermissionResult::Allow(_)));
    }

    #[tokio::test]
    async fn no_callback_and_no_lists_allows_by_default() {
        let manager = PermissionManager::new();
        let result = manager
            .can_use_tool(
                ToolName::from("AnyTool"),
                serde_json::json!({}),
                ToolPermissionContext::new(vec![]),
            )
            .await
            .unwrap();
        assert!(matches!(result, PermissionResult::Allow(_)));
    }

    #[tokio::test]
    async fn builder_wires_up_callback_and_lists() {
        let manager = PermissionManagerBuilder::new()
            .disallowed_tools(vec![ToolName::from("Bash")])
            .build();
        let result = manager
            .can_use_tool(
                ToolName::from("Bash"),
                serde_json::json!({}),
                ToolPermissionContext::new(vec![]),
            )
            .await
            .unwrap();
        assert!(matches!(result, PermissionResult::Deny(_)));
    }
}
