// SPDX-License-Identifier: MIT

//! The chat-transport trait and the rate-limiting/retrying wrapper around it (§4.6).

use crate::error::TransportError;
use crate::ratelimit::{backoff_for_attempt, TokenBucket};
use async_trait::async_trait;
use ojb_core::Clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// One inline button: its visible label and the callback token carried in its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub callback_token: String,
}

/// An inline keyboard: rows of buttons, rendered beneath a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn single_column(buttons: Vec<Button>) -> Self {
        Self { rows: buttons.into_iter().map(|b| vec![b]).collect() }
    }
}

/// An inbound button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    pub callback_token: String,
    pub chat_id: String,
    pub message_id: String,
    pub from_user: String,
}

/// The raw chat-transport operations (§6). A production implementation speaks HTTP to a
/// specific chat backend; `FakeTransport` below drives every test in this crate and its
/// dependents.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<String, TransportError>;

    async fn edit(&self, chat_id: &str, message_id: &str, text: &str) -> Result<(), TransportError>;

    async fn delete(&self, chat_id: &str, message_id: &str) -> Result<(), TransportError>;

    /// Drain whatever inbound button-press events have arrived since the last call (§6). A
    /// production implementation backs this with long-polling or a webhook queue; callers are
    /// expected to call it on a short interval from the event loop.
    async fn poll_updates(&self) -> Result<Vec<CallbackEvent>, TransportError>;
}

/// Wraps a raw [`Transport`] with rate limiting and retry, the only way this bus should ever
/// call out to the chat backend.
///
/// Dedup is deliberately *not* handled here: the dedup store is Bus-private state (§5), so the
/// Bus event loop consults it before deciding whether to call [`ChatAdapter::edit`] at all.
pub struct ChatAdapter<T: Transport, C: Clock> {
    transport: T,
    aggregate_bucket: TokenBucket<C>,
    per_chat_buckets: Mutex<HashMap<String, TokenBucket<C>>>,
    clock: C,
    max_retries: u32,
}

impl<T: Transport, C: Clock> ChatAdapter<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Self {
            transport,
            aggregate_bucket: TokenBucket::new(clock.clone(), 30, Duration::from_secs(1)),
            per_chat_buckets: Mutex::new(HashMap::new()),
            clock,
            max_retries: 3,
        }
    }

    /// The wrapped transport, for tests that need to inspect a `FakeTransport`'s recorded calls.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn send(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<String, TransportError> {
        self.with_retry(chat_id, || {
            let keyboard = keyboard.clone();
            async move { self.transport.send(chat_id, text, keyboard).await }
        })
        .await
    }

    /// Edit a message. "Content not modified" is swallowed and reported as success (§4.6, §7).
    pub async fn edit(&self, chat_id: &str, message_id: &str, text: &str) -> Result<(), TransportError> {
        match self.with_retry(chat_id, || async { self.transport.edit(chat_id, message_id, text).await }).await
        {
            Ok(()) => Ok(()),
            Err(TransportError::ContentNotModified) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn delete(&self, chat_id: &str, message_id: &str) -> Result<(), TransportError> {
        self.with_retry(chat_id, || async { self.transport.delete(chat_id, message_id).await }).await
    }

    /// Poll for inbound callback events. Deliberately bypasses `with_retry`'s outbound rate
    /// limiting: polling is an inbound read, not a call charged against the chat backend's
    /// outbound budget.
    pub async fn poll_updates(&self) -> Result<Vec<CallbackEvent>, TransportError> {
        self.transport.poll_updates().await
    }

    async fn with_retry<F, Fut, R>(&self, chat_id: &str, call: F) -> Result<R, TransportError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<R, TransportError>>,
    {
        self.wait_for_capacity(chat_id).await;

        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(TransportError::RateLimited { retry_after_secs }) => {
                    tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                    attempt += 1;
                    if attempt >= self.max_retries {
                        return Err(TransportError::RetriesExhausted { attempts: attempt });
                    }
                }
                Err(TransportError::ContentNotModified) => return Err(TransportError::ContentNotModified),
                Err(TransportError::RateLimitedGeneric) => {
                    if let Some(delay) = backoff_for_attempt(attempt, self.max_retries) {
                        tracing::warn!(%chat_id, attempt, "generic rate limit signalled, backing off");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    } else {
                        return Err(TransportError::RetriesExhausted { attempts: attempt });
                    }
                }
                // Non-rate errors propagate immediately (§4.6, §7): no retry, no backoff.
                Err(other) => return Err(other),
            }
        }
    }

    async fn wait_for_capacity(&self, chat_id: &str) {
        loop {
            let has_per_chat = {
                let mut buckets = self.per_chat_buckets.lock();
                let bucket = buckets
                    .entry(chat_id.to_string())
                    .or_insert_with(|| TokenBucket::new(self.clock.clone(), 20, Duration::from_secs(60)));
                bucket.try_take()
            };
            if has_per_chat && self.aggregate_bucket.try_take() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTransport, RecordedCall};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RecordedCall {
        Send { chat_id: String, text: String, keyboard: Option<Keyboard> },
        Edit { chat_id: String, message_id: String, text: String },
        Delete { chat_id: String, message_id: String },
    }

    /// In-memory transport used to drive this crate's and its dependents' test suites.
    #[derive(Default)]
    pub struct FakeTransport {
        inner: Mutex<FakeState>,
    }

    #[derive(Default)]
    struct FakeState {
        calls: Vec<RecordedCall>,
        next_message_id: u64,
        fail_next_with: Option<TransportError>,
        pending_updates: Vec<CallbackEvent>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.inner.lock().calls.clone()
        }

        /// Make the next call fail with `error` (consumed after one use).
        pub fn fail_next(&self, error: TransportError) {
            self.inner.lock().fail_next_with = Some(error);
        }

        /// Queue an inbound callback event for the next `poll_updates` to return.
        pub fn push_update(&self, event: CallbackEvent) {
            self.inner.lock().pending_updates.push(event);
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(
            &self,
            chat_id: &str,
            text: &str,
            keyboard: Option<Keyboard>,
        ) -> Result<String, TransportError> {
            let mut state = self.inner.lock();
            if let Some(err) = state.fail_next_with.take() {
                return Err(err);
            }
            state.next_message_id += 1;
            let id = state.next_message_id.to_string();
            state.calls.push(RecordedCall::Send {
                chat_id: chat_id.to_string(),
                text: text.to_string(),
                keyboard,
            });
            Ok(id)
        }

        async fn edit(&self, chat_id: &str, message_id: &str, text: &str) -> Result<(), TransportError> {
            let mut state = self.inner.lock();
            if let Some(err) = state.fail_next_with.take() {
                return Err(err);
            }
            state.calls.push(RecordedCall::Edit {
                chat_id: chat_id.to_string(),
                message_id: message_id.to_string(),
                text: text.to_string(),
            });
            Ok(())
        }

        async fn delete(&self, chat_id: &str, message_id: &str) -> Result<(), TransportError> {
            let mut state = self.inner.lock();
            if let Some(err) = state.fail_next_with.take() {
                return Err(err);
            }
            state.calls.push(RecordedCall::Delete {
                chat_id: chat_id.to_string(),
                message_id: message_id.to_string(),
            });
            Ok(())
        }

        async fn poll_updates(&self) -> Result<Vec<CallbackEvent>, TransportError> {
            let mut state = self.inner.lock();
            if let Some(err) = state.fail_next_with.take() {
                return Err(err);
            }
            Ok(std::mem::take(&mut state.pending_updates))
        }
    }
}
