//! Composing the [`query()`](crate::query) primitive into higher-level
//! workflows: bounded parallel fan-out, sequential pipelines with optional
//! context threading, and retry with exponential backoff.
//!
//! Every path here drives one-shot queries rather than a shared
//! [`ClaudeSDKClient`](crate::client::ClaudeSDKClient); a failure in one query
//! never tears down another. Cancelling the [`CancellationToken`] passed to a
//! `*_cancellable` method cascades to every in-flight query's transport.

use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;

use crate::message::message_kind;
use crate::query::query;
use crate::types::{ClaudeAgentOptions, ContentBlock, Message, SessionId};

/// Outcome of a single query run by the orchestrator.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// The prompt that was sent (after context-prepending for pipeline steps).
    pub prompt: String,
    /// Every message the query produced, in arrival order.
    pub messages: Vec<Message>,
    /// Total cost in USD, taken from the terminal `result` message if present.
    pub cost: Option<f64>,
    /// Session ID the CLI assigned, if a `result` message was observed.
    pub session_id: Option<SessionId>,
    /// `true` if the query terminated with `result/success`, or produced at
    /// least one assistant message and no error result.
    pub success: bool,
    /// Error messages accumulated along the way (transport errors, non-success
    /// result errors).
    pub errors: Vec<String>,
    /// Wall-clock duration of the query, in milliseconds.
    pub duration_ms: u64,
}

/// Retry configuration for [`Orchestrator::query_with_retry`].
///
/// Backoff doubles after every failed attempt, starting at `backoff_ms`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first, on query-level failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default two retries / one-second backoff.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of additional attempts after the first.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial backoff, in milliseconds.
    #[must_use]
    pub fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.backoff_ms = backoff_ms;
        self
    }

    fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let ms = self.backoff_ms.saturating_mul(1u64 << attempt.min(32));
        std::time::Duration::from_millis(ms)
    }
}

/// Namespace for the parallel/pipeline/retry query compositions.
pub struct Orchestrator;

impl Orchestrator {
    /// Run `queries` with up to `max_concurrent` in flight at once.
    ///
    /// Results preserve input order regardless of completion order. A query
    /// failing doesn't stop the others; failures are reported per-entry.
    pub async fn query_parallel(
        queries: Vec<(String, ClaudeAgentOptions)>,
        max_concurrent: usize,
    ) -> Vec<QueryResult> {
        Self::query_parallel_cancellable(queries, max_concurrent, CancellationToken::new()).await
    }

    /// Like [`Self::query_parallel`], cancelling every in-flight query's
    /// transport when `cancel` fires.
    pub async fn query_parallel_cancellable(
        queries: Vec<(String, ClaudeAgentOptions)>,
        max_concurrent: usize,
        cancel: CancellationToken,
    ) -> Vec<QueryResult> {
        let max_concurrent = max_concurrent.max(1);
        let total = queries.len();

        let completed = stream::iter(queries.into_iter().enumerate())
            .map(|(index, (prompt, options))| {
                let child = cancel.child_token();
                async move { (index, run_single_query(prompt, options, child).await) }
            })
            .buffer_unordered(max_concurrent)
            .collect::<Vec<_>>()
            .await;

        let mut ordered: Vec<Option<QueryResult>> = (0..total).map(|_| None).collect();
        for (index, result) in completed {
            ordered[index] = Some(result);
        }
        ordered
            .into_iter()
            .map(|r| r.expect("buffer_unordered yields exactly one result per input index"))
            .collect()
    }

    /// Run `queries` sequentially. When `use_context` is set, the concatenated
    /// assistant text of each step is prepended to the next prompt. A failing
    /// step aborts the pipeline; the partial trace up to and including the
    /// failure is returned.
    pub async fn query_pipeline(
        queries: Vec<(String, ClaudeAgentOptions)>,
        use_context: bool,
    ) -> Vec<QueryResult> {
        Self::query_pipeline_cancellable(queries, use_context, CancellationToken::new()).await
    }

    /// Like [`Self::query_pipeline`], stopping early if `cancel` fires.
    pub async fn query_pipeline_cancellable(
        queries: Vec<(String, ClaudeAgentOptions)>,
        use_context: bool,
        cancel: CancellationToken,
    ) -> Vec<QueryResult> {
        let mut results = Vec::with_capacity(queries.len());
        let mut previous_context: Option<String> = None;

        for (prompt, options) in queries {
            if cancel.is_cancelled() {
                break;
            }

            let prompt = match (&previous_context, use_context) {
                (Some(context), true) => {
                    format!("--- Context from previous response ---\n{context}\n\n{prompt}")
                }
                _ => prompt,
            };

            let result = run_single_query(prompt, options, cancel.child_token()).await;
            let failed = !result.success;

            if use_context {
                previous_context = Some(assistant_text(&result.messages));
            }

            results.push(result);

            if failed {
                break;
            }
        }

        results
    }

    /// Run one query, retrying up to `policy.max_retries` additional times on
    /// query-level failure (transport error or non-success result), with
    /// exponential backoff starting at `policy.backoff_ms`. Content Claude
    /// returns never triggers a retry.
    pub async fn query_with_retry(
        prompt: String,
        options: ClaudeAgentOptions,
        policy: RetryPolicy,
    ) -> QueryResult {
        Self::query_with_retry_cancellable(prompt, options, policy, CancellationToken::new()).await
    }

    /// Like [`Self::query_with_retry`], aborting the retry loop if `cancel`
    /// fires.
    pub async fn query_with_retry_cancellable(
        prompt: String,
        options: ClaudeAgentOptions,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> QueryResult {
        let mut attempt = 0;
        loop {
            let result = run_single_query(prompt.clone(), options.clone(), cancel.child_token()).await;
            if result.success || attempt >= policy.max_retries || cancel.is_cancelled() {
                return result;
            }

            tracing::warn!(
                attempt,
                errors = ?result.errors,
                "orchestrator retry after query-level failure"
            );

            tokio::select! {
                () = tokio::time::sleep(policy.delay_for_attempt(attempt)) => {}
                () = cancel.cancelled() => return result,
            }
            attempt += 1;
        }
    }
}

async fn run_single_query(
    prompt: String,
    options: ClaudeAgentOptions,
    cancel: CancellationToken,
) -> QueryResult {
    let started = std::time::Instant::now();
    let mut messages = Vec::new();
    let mut errors = Vec::new();
    let mut cost = None;
    let mut session_id = None;
    let mut saw_assistant = false;
    let mut saw_error_result = false;
    let mut saw_success_result = false;

    match query(prompt.clone(), Some(options)).await {
        Ok(stream) => {
            let mut stream = Box::pin(stream);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        errors.push("cancelled".to_string());
                        break;
                    }
                    next = stream.next() => {
                        let Some(item) = next else { break };
                        match item {
                            Ok(message) => {
                                record_message_outcome(
                                    &message,
                                    &mut saw_assistant,
                                    &mut saw_success_result,
                                    &mut saw_error_result,
                                    &mut cost,
                                    &mut session_id,
                                    &mut errors,
                                );
                                let is_terminal = matches!(message, Message::Result { .. });
                                messages.push(message);
                                if is_terminal {
                                    break;
                                }
                            }
                            Err(e) => {
                                errors.push(e.to_string());
                                break;
                            }
                        }
                    }
                }
            }
        }
        Err(e) => errors.push(e.to_string()),
    }

    let success = (saw_success_result || (saw_assistant && !saw_error_result)) && errors.is_empty();

    QueryResult {
        prompt,
        messages,
        cost,
        session_id,
        success,
        errors,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}

#[allow(clippy::too_many_arguments)]
fn record_message_outcome(
    message: &Message,
    saw_assistant: &mut bool,
    saw_success_result: &mut bool,
    saw_error_result: &mut bool,
    cost: &mut Option<f64>,
    session_id: &mut Option<SessionId>,
    errors: &mut Vec<String>,
) {
    match message {
        Message::Assistant { .. } => *saw_assistant = true,
        Message::Result {
            subtype,
            is_error,
            total_cost_usd,
            session_id: result_session_id,
            errors: result_errors,
            ..
        } => {
            *cost = *total_cost_usd;
            *session_id = Some(result_session_id.clone());
            if *is_error || subtype != "success" {
                *saw_error_result = true;
                if result_errors.is_empty() {
                    errors.push(format!("result subtype '{subtype}'"));
                } else {
                    errors.extend(result_errors.iter().cloned());
                }
            } else {
                *saw_success_result = true;
            }
        }
        _ => {
            tracing::trace!(kind = message_kind(message), "orchestrator observed message");
        }
    }
}

fn assistant_text(messages: &[Message]) -> String {
    messages
        .iter()
        .filter_map(|message| match message {
            Message::Assistant { message, .. } => Some(&message.content),
            _ => None,
        })
        .flatten()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_result(session: &str) -> QueryResult {
        QueryResult {
            prompt: "p".to_string(),
            messages: Vec::new(),
            cost: Some(0.01),
            session_id: Some(SessionId::from(session)),
            success: true,
            errors: Vec::new(),
            duration_ms: 5,
        }
    }

    #[test]
    fn retry_policy_backoff_doubles() {
        let policy = RetryPolicy::new().with_backoff_ms(100);
        assert_eq!(policy.delay_for_attempt(0), std::time::Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), std::time::Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), std::time::Duration::from_millis(400));
    }

    #[test]
    fn assistant_text_concatenates_text_blocks_only() {
        use crate::types::AssistantMessageContent;

        let messages = vec![
            Message::Assistant {
                parent_tool_use_id: None,
                message: AssistantMessageContent {
                    model: "claude".to_string(),
                    content: vec![
                        ContentBlock::Text { text: "hello".to_string() },
                        ContentBlock::Thinking { thinking: "ignored".to_string(), signature: String::new() },
                    ],
                },
                session_id: None,
            },
            Message::Assistant {
                parent_tool_use_id: None,
                message: AssistantMessageContent {
                    model: "claude".to_string(),
                    content: vec![ContentBlock::Text { text: "world".to_string() }],
                },
                session_id: None,
            },
        ];

        assert_eq!(assistant_text(&messages), "hello\nworld");
    }

    #[test]
    fn query_result_success_helper_builds_expected_shape() {
        let result = success_result("abc");
        assert!(result.success);
        assert_eq!(result.session_id.unwrap().as_ref(), "abc");
    }
}
