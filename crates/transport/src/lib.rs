// SPDX-License-Identifier: MIT
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! Chat-transport adapter: the only component that knows the chat backend's wire format,
//! markup dialect, and rate limits (§4.6).

mod adapter;
mod error;
mod markup;
mod ratelimit;

pub use adapter::{Button, CallbackEvent, ChatAdapter, Keyboard, Transport};
pub use error::TransportError;
pub use markup::{escape, truncate, Truncated};
pub use ratelimit::{backoff_for_attempt, TokenBucket};

#[cfg(any(test, feature = "test-support"))]
pub use adapter::{FakeTransport, RecordedCall};
