//! Multi-consumer message fan-out for [`crate::client::ClaudeSDKClient`].
//!
//! Mirrors the hook/permission/MCP dispatch channels' `mpsc` + registry-table
//! shape: each subscriber gets its own bounded delivery channel registered
//! under a [`SubscriberRef`]; the reader task fans every conversation message
//! out to all of them. Delivery is non-blocking — a subscriber that can't
//! keep up has the new message dropped rather than blocking the reader, with
//! a per-subscriber dropped-count. Unsubscribing just removes the map entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::types::Message;

/// Bound on each subscriber's delivery channel. Once full, further messages
/// for that subscriber are dropped (the new message, not the queued ones)
/// rather than backing up the reader task.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// Opaque handle returned by [`SubscriberRegistry::subscribe`], used to
/// unsubscribe later. Unique for the lifetime of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberRef(u64);

/// Predicate deciding whether a subscriber receives a given message.
/// `None` means "receive everything".
pub type MessageFilter = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

struct Subscriber {
    sink: mpsc::Sender<Message>,
    filter: Option<MessageFilter>,
    dropped: Arc<AtomicU64>,
}

/// `ref -> sink` fan-out table. Owned by the Client and mutated only through
/// `subscribe`/`unsubscribe`; `dispatch` is read-only over the table.
#[derive(Default)]
pub struct SubscriberRegistry {
    next_ref: u64,
    subscribers: HashMap<SubscriberRef, Subscriber>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its ref plus the receiving half
    /// of its delivery channel. `filter`, if given, is evaluated against
    /// every message before delivery; messages it rejects are never counted
    /// as dropped.
    pub fn subscribe(&mut self, filter: Option<MessageFilter>) -> (SubscriberRef, mpsc::Receiver<Message>) {
        let (sink, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let r = SubscriberRef(self.next_ref);
        self.next_ref += 1;
        self.subscribers.insert(
            r,
            Subscriber {
                sink,
                filter,
                dropped: Arc::new(AtomicU64::new(0)),
            },
        );
        (r, rx)
    }

    /// Remove a subscriber. After this returns, no further messages are
    /// delivered to `r` — the entry is simply dropped from the map, an O(1)
    /// operation. Unsubscribing a ref that is already gone is a no-op.
    pub fn unsubscribe(&mut self, r: SubscriberRef) {
        self.subscribers.remove(&r);
    }

    /// Number of messages dropped for `r` due to backpressure. Returns
    /// `None` if `r` was never registered or has been unsubscribed.
    #[must_use]
    pub fn dropped_count(&self, r: SubscriberRef) -> Option<u64> {
        self.subscribers
            .get(&r)
            .map(|s| s.dropped.load(Ordering::Relaxed))
    }

    /// Whether any subscriber is currently registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Fan `message` out to every subscriber whose filter accepts it.
    /// Non-blocking: a full channel drops this message for that subscriber
    /// and bumps its dropped-count, the reader task never waits.
    pub fn dispatch(&self, message: &Message) {
        for subscriber in self.subscribers.values() {
            if let Some(filter) = &subscriber.filter {
                if !filter(message) {
                    continue;
                }
            }
            if let Err(mpsc::error::TrySendError::Full(_)) = subscriber.sink.try_send(message.clone()) {
                subscriber.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // A closed receiver (subscriber dropped its stream without
            // calling unsubscribe) also yields Err; there's nothing to do
            // here but let `unsubscribe` reclaim the slot on the caller's
            // next call, same as the dropped-count case.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssistantMessageContent, ContentBlock};

    fn text_message(text: &str) -> Message {
        Message::Assistant {
            parent_tool_use_id: None,
            message: AssistantMessageContent {
                model: "claude".to_string(),
                content: vec![ContentBlock::Text { text: text.to_string() }],
            },
            session_id: None,
        }
    }

    #[tokio::test]
    async fn subscribe_receives_dispatched_messages() {
        let mut registry = SubscriberRegistry::new();
        let (_r, mut rx) = registry.subscribe(None);

        registry.dispatch(&text_message("hello"));

        let received = rx.recv().await.expect("message delivered");
        assert!(matches!(received, Message::Assistant { .. }));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let mut registry = SubscriberRegistry::new();
        let (r, mut rx) = registry.subscribe(None);

        registry.unsubscribe(r);
        registry.dispatch(&text_message("after unsubscribe"));

        // Sender side was dropped with the registry entry, so recv() sees EOF
        // rather than blocking forever.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn filter_rejects_nonmatching_messages() {
        let mut registry = SubscriberRegistry::new();
        let filter: MessageFilter = Arc::new(|m: &Message| matches!(m, Message::Result { .. }));
        let (_r, mut rx) = registry.subscribe(Some(filter));

        registry.dispatch(&text_message("filtered out"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_count_increments_when_channel_is_full() {
        let mut registry = SubscriberRegistry::new();
        let (r, mut rx) = registry.subscribe(None);

        for _ in 0..SUBSCRIBER_CHANNEL_CAPACITY + 5 {
            registry.dispatch(&text_message("flood"));
        }

        assert!(registry.dropped_count(r).unwrap_or(0) > 0);

        // Drain so the receiver doesn't outlive the test holding a full channel.
        while rx.try_recv().is_ok() {}
    }

    #[test]
    fn dropped_count_is_none_after_unsubscribe() {
        let mut registry = SubscriberRegistry::new();
        let (r, _rx) = registry.subscribe(None);
        registry.unsubscribe(r);
        assert_eq!(registry.dropped_count(r), None);
    }
}
